//! Timestamp decoding command.

use anyhow::{Context as _, Result};
use tc_jobs::time::parse_timestamp_str;

use super::ParseTimeArgs;
use crate::context::Context;

/// Run the parse-time command.
pub fn run(args: ParseTimeArgs, ctx: &Context) -> Result<()> {
    let t = parse_timestamp_str(&args.value)
        .with_context(|| format!("Failed to decode timestamp: {}", args.value))?;

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "rfc3339": t.to_rfc3339(),
            "epoch": t.timestamp(),
        }));
        return Ok(());
    }

    ctx.output.kv("RFC 3339", &t.to_rfc3339());
    ctx.output.kv("Epoch", &t.timestamp().to_string());
    Ok(())
}
