//! Job request validation command.

use std::io::Read;

use anyhow::{bail, Context as _, Result};
use serde::Serialize;
use tc_jobs::overlap::job_uniqueness_messages;
use tc_jobs::request::{RawJobRequest, ResolvedJob};

use super::{now_arg, ValidateArgs};
use crate::context::Context;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateReport {
    job: ResolvedJob,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    conflicts: Vec<String>,
}

/// Run the validate command.
pub fn run(args: ValidateArgs, ctx: &Context) -> Result<()> {
    let store = ctx.load_store(args.store.as_deref())?;
    let body = read_request(&args.request, ctx)?;
    let raw = RawJobRequest::from_json(&body)
        .with_context(|| format!("Failed to decode job request: {}", args.request))?;

    let mut validator = ctx.validator(&store);
    if let Some(now) = now_arg(args.now.as_deref())? {
        validator = validator.with_now(now);
    }

    let job = match validator.validate(&raw) {
        Ok(job) => job,
        Err(errs) => bail!("Invalid job request: {}", errs),
    };

    let conflicts = match &args.asset_url {
        Some(asset_url) => {
            let candidate = job.candidate(asset_url.as_str());
            job_uniqueness_messages(&store, &candidate, &ctx.config.validator.deadline())
        }
        None => Vec::new(),
    };

    if ctx.output.is_json() {
        ctx.output.json(&ValidateReport { job, conflicts });
        return Ok(());
    }

    ctx.output.success("Job request is valid");
    ctx.output.job(&job);
    if args.asset_url.is_some() {
        ctx.output.conflicts(&conflicts);
    }
    Ok(())
}

fn read_request(source: &str, ctx: &Context) -> Result<String> {
    if source == "-" {
        let mut body = String::new();
        std::io::stdin()
            .read_to_string(&mut body)
            .context("Failed to read job request from stdin")?;
        return Ok(body);
    }
    let path = ctx.resolve_path(source);
    std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read job request: {}", path.display()))
}
