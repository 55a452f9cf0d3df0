//! CLI command implementations.

pub mod conflicts;
pub mod parse_time;
pub mod ttl;
pub mod validate;

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use tc_jobs::request::DeliveryServiceRef;
use tc_jobs::ttl::TtlInput;

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Store fixture (TOML or JSON).
    #[arg(short, long)]
    pub store: Option<String>,

    /// Job request body, as a JSON file path or `-` for stdin.
    #[arg(short, long)]
    pub request: String,

    /// Asset URL to check for overlapping jobs once the request is valid.
    #[arg(short, long)]
    pub asset_url: Option<String>,

    /// Validate as of this instant instead of the current time.
    #[arg(long)]
    pub now: Option<String>,
}

/// Arguments for the conflicts command.
#[derive(Args)]
pub struct ConflictsArgs {
    /// Store fixture (TOML or JSON).
    #[arg(short, long)]
    pub store: Option<String>,

    /// Delivery Service ID or XML-ID.
    #[arg(long)]
    pub ds: String,

    /// Asset URL of the proposed job.
    #[arg(short, long)]
    pub asset_url: String,

    /// Start of the proposed job.
    #[arg(long)]
    pub start: String,

    /// TTL of the proposed job, in hours or as a duration.
    #[arg(long)]
    pub ttl: String,
}

/// Arguments for the parse-time command.
#[derive(Args)]
pub struct ParseTimeArgs {
    /// Timestamp to decode.
    pub value: String,
}

/// Arguments for the ttl command.
#[derive(Args)]
pub struct TtlArgs {
    /// Number of hours or a duration string such as `121m`.
    pub value: String,
}

/// Read a Delivery Service reference the way a JSON body would carry it.
pub(crate) fn delivery_service_arg(value: &str) -> DeliveryServiceRef {
    match value.parse::<f64>() {
        Ok(n) => DeliveryServiceRef::Numeric(n),
        Err(_) => DeliveryServiceRef::XmlId(value.to_string()),
    }
}

/// Read a TTL the way a JSON body would carry it.
pub(crate) fn ttl_arg(value: &str) -> TtlInput {
    match value.parse::<f64>() {
        Ok(hours) => TtlInput::Hours(hours),
        Err(_) => TtlInput::Duration(value.to_string()),
    }
}

/// Parse an optional `--now` override.
pub(crate) fn now_arg(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|v| tc_jobs::time::parse_timestamp_str(v).with_context(|| format!("Invalid --now value: {}", v)))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_service_arg() {
        assert_eq!(delivery_service_arg("12"), DeliveryServiceRef::Numeric(12.0));
        assert_eq!(delivery_service_arg("demo1"), DeliveryServiceRef::XmlId("demo1".into()));
    }

    #[test]
    fn test_ttl_arg() {
        assert_eq!(ttl_arg("2.5"), TtlInput::Hours(2.5));
        assert_eq!(ttl_arg("121m"), TtlInput::Duration("121m".into()));
    }

    #[test]
    fn test_now_arg() {
        assert!(now_arg(None).unwrap().is_none());
        assert_eq!(now_arg(Some("1534869508")).unwrap().map(|t| t.timestamp()), Some(1534869508));
        assert!(now_arg(Some("yesterday")).is_err());
    }
}
