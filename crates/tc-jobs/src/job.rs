//! Content invalidation job representations.
//!
//! Three shapes are in circulation:
//!
//! - [`InvalidationJob`]: the legacy materialized job, whose TTL lives in a
//!   free-text `parameters` field and whose start time uses [`LegacyTime`].
//! - [`InvalidationJobV4`]: the current API shape with typed TTL and
//!   invalidation type.
//! - [`InvalidationJobCreateV4`] and [`UserInvalidationJobInput`]: user
//!   input, checked by [`JobValidator`](crate::validate::JobValidator).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{JobError, ValidationErrors};
use crate::ids::JobId;
use crate::time::{LegacyTime, TimestampInput};
use crate::validate::{must_be_in_future, must_be_within_two_days};

/// Keyword carried by every legacy job.
pub const PURGE_KEYWORD: &str = "PURGE";

/// Marker appended to a legacy asset URL to flag a REFETCH job.
pub const LEGACY_REFETCH_SUFFIX: &str = "##REFETCH##";

/// How caches treat content matched by a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InvalidationType {
    /// Revalidate with the origin.
    #[default]
    Refresh,
    /// Fetch again unconditionally.
    Refetch,
}

impl InvalidationType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Refresh => "REFRESH",
            Self::Refetch => "REFETCH",
        }
    }
}

impl fmt::Display for InvalidationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvalidationType {
    type Err = String;

    /// Case sensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REFRESH" => Ok(Self::Refresh),
            "REFETCH" => Ok(Self::Refetch),
            _ => Err("must be either REFRESH or REFETCH (case sensitive)".to_string()),
        }
    }
}

/// Decode the TTL from a job's `parameters` field, which reads `TTL:<n>h`.
pub fn parse_ttl_parameter(parameters: &str) -> Result<u64, JobError> {
    let invalid = || JobError::InvalidParameters(parameters.to_string());

    let mut parts = parameters.split(':');
    let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    if key != "TTL" {
        return Err(invalid());
    }
    let hours = value.strip_suffix('h').ok_or_else(invalid)?;
    hours.parse::<u64>().map_err(|_| invalid())
}

/// Encode a TTL for a job's `parameters` field.
pub fn ttl_parameter(hours: u64) -> String {
    format!("TTL:{}h", hours)
}

/// Check that a string is an absolute URL.
fn is_absolute_url(s: &str) -> bool {
    s.parse::<http::Uri>()
        .map(|uri| uri.scheme().is_some() && uri.host().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false)
}

fn require(errs: &mut ValidationErrors, field: &str, value: Option<&str>) -> bool {
    match value {
        Some(v) if !v.is_empty() => true,
        _ => {
            errs.push(format!("{}: cannot be blank", field));
            false
        }
    }
}

fn check_asset_url(errs: &mut ValidationErrors, asset_url: Option<&str>) {
    if require(errs, "assetUrl", asset_url) && !asset_url.is_some_and(is_absolute_url) {
        errs.push("assetUrl: must be a valid URL");
    }
}

fn check_materialized_start(errs: &mut ValidationErrors, start: DateTime<Utc>, now: DateTime<Utc>) {
    if !must_be_within_two_days(start, now) {
        errs.push("startTime: must be within two days from now");
    }
    if !must_be_in_future(start, now) {
        errs.push("startTime: cannot be in the past");
    }
}

/// A materialized job in the legacy representation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationJob {
    #[serde(default)]
    pub asset_url: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    /// XML-ID of the Delivery Service.
    #[serde(default)]
    pub delivery_service: Option<String>,
    #[serde(default)]
    pub id: Option<JobId>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub parameters: Option<String>,
    #[serde(default)]
    pub start_time: Option<LegacyTime>,
}

impl InvalidationJob {
    /// TTL in hours decoded from `parameters`; `0` when absent or malformed.
    pub fn ttl_hours(&self) -> u64 {
        self.parameters
            .as_deref()
            .and_then(|p| parse_ttl_parameter(p).ok())
            .unwrap_or(0)
    }

    /// Check that every field is present and the start time is within two days.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ValidationErrors> {
        let mut errs = ValidationErrors::new();
        check_asset_url(&mut errs, self.asset_url.as_deref());
        require(&mut errs, "createdBy", self.created_by.as_deref());
        require(&mut errs, "deliveryService", self.delivery_service.as_deref());
        if self.id.map_or(true, |id| id.get() == 0) {
            errs.push("id: cannot be blank");
        }
        require(&mut errs, "keyword", self.keyword.as_deref());
        require(&mut errs, "parameters", self.parameters.as_deref());

        match &self.start_time {
            Some(start) => check_materialized_start(&mut errs, start.to_utc(), now),
            None => errs.push("startTime: cannot be blank"),
        }
        errs.into_result()
    }
}

impl From<&InvalidationJobV4> for InvalidationJob {
    fn from(job: &InvalidationJobV4) -> Self {
        let mut asset_url = job.asset_url.clone();
        if job.invalidation_type == InvalidationType::Refetch {
            asset_url.push_str(LEGACY_REFETCH_SUFFIX);
        }
        Self {
            asset_url: Some(asset_url),
            created_by: Some(job.created_by.clone()),
            delivery_service: Some(job.delivery_service.clone()),
            id: Some(job.id),
            keyword: Some(PURGE_KEYWORD.to_string()),
            parameters: Some(ttl_parameter(job.ttl_hours)),
            start_time: Some(LegacyTime::from(job.start_time)),
        }
    }
}

/// A content invalidation job as returned by API version 4.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationJobV4 {
    pub id: JobId,
    pub asset_url: String,
    pub created_by: String,
    pub delivery_service: String,
    pub ttl_hours: u64,
    pub invalidation_type: InvalidationType,
    pub start_time: DateTime<Utc>,
}

impl InvalidationJobV4 {
    /// Check that every field is present and the start time is within two days.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ValidationErrors> {
        let mut errs = ValidationErrors::new();
        require(&mut errs, "deliveryService", Some(&self.delivery_service));
        check_asset_url(&mut errs, Some(&self.asset_url));
        require(&mut errs, "createdBy", Some(&self.created_by));
        if self.id.get() == 0 {
            errs.push("id: cannot be blank");
        }
        if self.ttl_hours == 0 {
            errs.push("ttlHours: cannot be blank");
        }
        check_materialized_start(&mut errs, self.start_time, now);
        errs.into_result()
    }

    /// The legacy representation of this job.
    pub fn to_legacy(&self) -> InvalidationJob {
        InvalidationJob::from(self)
    }
}

impl TryFrom<InvalidationJob> for InvalidationJobV4 {
    type Error = JobError;

    fn try_from(job: InvalidationJob) -> Result<Self, Self::Error> {
        let ttl_hours = job.ttl_hours();
        let asset_url = job.asset_url.ok_or(JobError::Missing("assetUrl"))?;
        let (asset_url, invalidation_type) = match asset_url.strip_suffix(LEGACY_REFETCH_SUFFIX) {
            Some(url) => (url.to_string(), InvalidationType::Refetch),
            None => (asset_url, InvalidationType::Refresh),
        };
        Ok(Self {
            id: job.id.ok_or(JobError::Missing("id"))?,
            asset_url,
            created_by: job.created_by.ok_or(JobError::Missing("createdBy"))?,
            delivery_service: job
                .delivery_service
                .ok_or(JobError::Missing("deliveryService"))?,
            ttl_hours,
            invalidation_type,
            start_time: job
                .start_time
                .ok_or(JobError::Missing("startTime"))?
                .to_utc(),
        })
    }
}

impl fmt::Display for InvalidationJobV4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"InvalidationJobV4{{ID: {}, AssetURL: "{}", CreatedBy: "{}", DeliveryService: "{}", TTLHours: {}, InvalidationType: "{}", StartTime: "{}"}}"#,
            self.id,
            self.asset_url,
            self.created_by,
            self.delivery_service,
            self.ttl_hours,
            self.invalidation_type,
            self.start_time.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        )
    }
}

/// User input to create a job through API version 4.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationJobCreateV4 {
    /// XML-ID of the Delivery Service.
    #[serde(default)]
    pub delivery_service: String,
    #[serde(default)]
    pub regex: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ttl_hours: u32,
    /// `REFRESH` or `REFETCH`, checked during validation.
    #[serde(default)]
    pub invalidation_type: String,
}

/// User input to create a job through the legacy user endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInvalidationJobInput {
    #[serde(default)]
    pub ds_id: Option<u64>,
    #[serde(default)]
    pub regex: Option<String>,
    #[serde(default)]
    pub start_time: Option<TimestampInput>,
    /// Whole hours.
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub urgent: Option<bool>,
}
