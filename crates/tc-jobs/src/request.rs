//! Raw job requests and their validated form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::DeliveryServiceId;
use crate::overlap::JobWindow;
use crate::time::TimestampInput;
use crate::ttl::{TtlHours, TtlInput};

/// A reference to a Delivery Service as a client may send it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeliveryServiceRef {
    /// Integral ID; any fractional part is discarded.
    Numeric(f64),
    /// Textual XML-ID.
    XmlId(String),
}

impl DeliveryServiceRef {
    /// Zero and the empty string count as absent.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Numeric(n) => *n == 0.0,
            Self::XmlId(s) => s.is_empty(),
        }
    }
}

impl From<u64> for DeliveryServiceRef {
    fn from(id: u64) -> Self {
        Self::Numeric(id as f64)
    }
}

impl From<&str> for DeliveryServiceRef {
    fn from(xml_id: &str) -> Self {
        Self::XmlId(xml_id.to_string())
    }
}

impl std::fmt::Display for DeliveryServiceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{}", n),
            Self::XmlId(s) => write!(f, "{}", s),
        }
    }
}

/// Unvalidated input to create or modify a content invalidation job.
///
/// Missing and `null` fields both decode to `None` so the validator can
/// report them alongside every other problem.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawJobRequest {
    /// Delivery Service ID or XML-ID.
    #[serde(default)]
    pub delivery_service: Option<DeliveryServiceRef>,
    /// Path regular expression; must start with `/` or `\/`.
    #[serde(default)]
    pub regex: Option<String>,
    /// When the job comes into effect.
    #[serde(default)]
    pub start_time: Option<TimestampInput>,
    /// Duration string or number of hours.
    #[serde(default)]
    pub ttl: Option<TtlInput>,
}

impl RawJobRequest {
    /// Decode a request body.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    /// Set the Delivery Service reference.
    pub fn with_delivery_service(mut self, reference: impl Into<DeliveryServiceRef>) -> Self {
        self.delivery_service = Some(reference.into());
        self
    }

    /// Set the regular expression.
    pub fn with_regex(mut self, regex: impl Into<String>) -> Self {
        self.regex = Some(regex.into());
        self
    }

    /// Set the start time.
    pub fn with_start_time(mut self, start: impl Into<TimestampInput>) -> Self {
        self.start_time = Some(start.into());
        self
    }

    /// Set the TTL.
    pub fn with_ttl(mut self, ttl: impl Into<TtlInput>) -> Self {
        self.ttl = Some(ttl.into());
        self
    }
}

/// A job request after every field has been validated and resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedJob {
    pub delivery_service_id: DeliveryServiceId,
    pub regex: String,
    pub start_time: DateTime<Utc>,
    pub ttl_hours: TtlHours,
}

impl ResolvedJob {
    /// The window this job will occupy once persisted under `asset_url`.
    pub fn candidate(&self, asset_url: impl Into<String>) -> JobWindow {
        JobWindow {
            asset_url: asset_url.into(),
            delivery_service_id: self.delivery_service_id,
            start_time: self.start_time,
            ttl_hours: self.ttl_hours,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_mixed_types() {
        let raw: RawJobRequest = serde_json::from_value(json!({
            "deliveryService": 2.34,
            "regex": "/foo",
            "startTime": 1534869508,
            "ttl": "48h"
        }))
        .unwrap();
        assert_eq!(raw.delivery_service, Some(DeliveryServiceRef::Numeric(2.34)));
        assert_eq!(raw.start_time, Some(TimestampInput::Epoch(1534869508)));
        assert_eq!(raw.ttl, Some(TtlInput::Duration("48h".into())));
    }

    #[test]
    fn test_decode_missing_and_null_fields() {
        let raw = RawJobRequest::from_json(r#"{"deliveryService": "demo1", "ttl": null}"#).unwrap();
        assert_eq!(raw.delivery_service, Some(DeliveryServiceRef::XmlId("demo1".into())));
        assert!(raw.regex.is_none());
        assert!(raw.start_time.is_none());
        assert!(raw.ttl.is_none());
    }

    #[test]
    fn test_decode_rejects_unsupported_identifier() {
        assert!(RawJobRequest::from_json(r#"{"deliveryService": false}"#).is_err());
    }

    #[test]
    fn test_builder() {
        let raw = RawJobRequest::default()
            .with_delivery_service(7u64)
            .with_regex("/path/.*")
            .with_start_time("2030-01-01T00:00:00Z")
            .with_ttl("24h");
        assert_eq!(raw.delivery_service, Some(DeliveryServiceRef::Numeric(7.0)));
        assert_eq!(raw.regex.as_deref(), Some("/path/.*"));
    }
}
