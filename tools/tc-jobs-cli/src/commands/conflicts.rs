//! Overlap check command.

use anyhow::{Context as _, Result};
use tc_jobs::overlap::{detect_conflicts, JobWindow};
use tc_jobs::resolve::resolve_delivery_service;
use tc_jobs::time::parse_timestamp_str;
use tc_jobs::ttl::normalize_ttl;

use super::{delivery_service_arg, ttl_arg, ConflictsArgs};
use crate::context::Context;

/// Run the conflicts command.
pub fn run(args: ConflictsArgs, ctx: &Context) -> Result<()> {
    let store = ctx.load_store(args.store.as_deref())?;
    let deadline = ctx.config.validator.deadline();

    let delivery_service_id =
        resolve_delivery_service(&delivery_service_arg(&args.ds), &store, &deadline)
            .with_context(|| format!("Failed to resolve Delivery Service {}", args.ds))?;
    let start_time = parse_timestamp_str(&args.start)
        .with_context(|| format!("Invalid --start value: {}", args.start))?;
    let ttl_hours = normalize_ttl(&ttl_arg(&args.ttl))
        .with_context(|| format!("Invalid --ttl value: {}", args.ttl))?;

    let candidate = JobWindow {
        asset_url: args.asset_url,
        delivery_service_id,
        start_time,
        ttl_hours,
    };
    ctx.output.debug(&format!(
        "Checking {} from {} to {}",
        candidate.asset_url,
        candidate.start_time,
        candidate.end_time()
    ));

    let conflicts = detect_conflicts(&store, &candidate, &deadline)
        .context("Failed to enumerate existing jobs")?;

    if ctx.output.is_json() {
        ctx.output.json(&conflicts);
        return Ok(());
    }

    ctx.output.conflicts(&conflicts);
    Ok(())
}
