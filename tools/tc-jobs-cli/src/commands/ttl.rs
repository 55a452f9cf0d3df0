//! TTL normalization command.

use anyhow::{Context as _, Result};
use tc_jobs::ttl::normalize_ttl;

use super::{ttl_arg, TtlArgs};
use crate::context::Context;

/// Run the ttl command.
pub fn run(args: TtlArgs, ctx: &Context) -> Result<()> {
    let hours = normalize_ttl(&ttl_arg(&args.value))
        .with_context(|| format!("Invalid TTL: {}", args.value))?;

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({ "hours": hours.get() }));
        return Ok(());
    }

    ctx.output.kv("Hours", &hours.get().to_string());
    Ok(())
}
