//! Job request validation.
//!
//! Every check runs regardless of the others and all failures are reported
//! together. Storage failures are logged and either collapsed into an opaque
//! message or, for the dynamic TTL maximum, ignored.

use chrono::{DateTime, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, warn};

use crate::config::ValidatorConfig;
use crate::deadline::Deadline;
use crate::error::{StoreError, ValidationErrors};
use crate::ids::DeliveryServiceId;
use crate::job::{InvalidationJobCreateV4, InvalidationType, UserInvalidationJobInput};
use crate::request::{DeliveryServiceRef, RawJobRequest, ResolvedJob};
use crate::resolve::{resolve_delivery_service, Resolver};
use crate::store::JobStore;
use crate::time::parse_timestamp;
use crate::ttl::{TtlInput, MAX_TTL_HOURS};

/// How far ahead of now a materialized job may start, in hours.
pub const MATERIALIZED_START_WINDOW_HOURS: i64 = 48;

/// Job regular expressions must start with `/` or `\/`.
static JOB_REGEX_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\\?/").unwrap());

const REGEX_PREFIX_MESSAGE: &str = r"regex: must start with '/' (or '\/')";

/// Start time is strictly after `now`.
pub fn must_be_in_future(start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    start > now
}

/// Start time is no more than [`MATERIALIZED_START_WINDOW_HOURS`] after `now`.
pub fn must_be_within_two_days(start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    TimeDelta::try_hours(MATERIALIZED_START_WINDOW_HOURS)
        .and_then(|window| now.checked_add_signed(window))
        .map_or(true, |limit| start <= limit)
}

/// Check if a job regex has an acceptable prefix.
pub fn has_job_regex_prefix(regex: &str) -> bool {
    JOB_REGEX_PREFIX.is_match(regex)
}

/// Push blank, prefix, and compile errors for a job regex. Returns the
/// regex when it is present.
fn check_regex<'r>(errs: &mut ValidationErrors, regex: Option<&'r str>, compile_prefix: &str) -> Option<&'r str> {
    match regex {
        None | Some("") => {
            errs.push("regex: cannot be blank");
            None
        }
        Some(r) => {
            if !has_job_regex_prefix(r) {
                errs.push(REGEX_PREFIX_MESSAGE);
            }
            if let Err(e) = Regex::new(r) {
                errs.push(format!("{}{}", compile_prefix, e));
            }
            Some(r)
        }
    }
}

/// Validates job requests against one store.
pub struct JobValidator<'s, S: JobStore + ?Sized> {
    store: &'s S,
    config: ValidatorConfig,
    now: Option<DateTime<Utc>>,
}

impl<'s, S: JobStore + ?Sized> JobValidator<'s, S> {
    /// Create a validator with the default configuration.
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            config: ValidatorConfig::default(),
            now: None,
        }
    }

    /// Use a specific configuration.
    pub fn with_config(mut self, config: ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Pin "now" instead of reading the clock.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    /// The dynamic TTL maximum in hours, `None` when it is not configured.
    pub fn configured_max_ttl_hours(&self, deadline: &Deadline) -> Result<Option<u64>, StoreError> {
        deadline.check("max TTL lookup")?;
        match self
            .store
            .parameter(&self.config.max_reval_parameter, &self.config.reval_config_file)
        {
            Ok(value) => value
                .parse::<u64>()
                .map(|days| Some(days.saturating_mul(24)))
                .map_err(|e| StoreError::Decode(format!("{}: {:?}: {}", self.config.max_reval_parameter, value, e))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Check if REFETCH jobs are switched on. Lookup failures mean "no".
    pub fn refetch_allowed(&self, deadline: &Deadline) -> bool {
        if let Err(e) = deadline.check("refetch parameter lookup") {
            error!(error = %e, "querying refetch parameter");
            return false;
        }
        match self
            .store
            .parameter(&self.config.refetch_parameter, &self.config.global_config_file)
        {
            Ok(value) => value.trim().eq_ignore_ascii_case("true"),
            Err(e) => {
                error!(error = %e, parameter = %self.config.refetch_parameter, "querying refetch parameter");
                false
            }
        }
    }

    /// Validate a raw request, resolving its identifier and TTL.
    ///
    /// On failure the error lists every violated constraint.
    pub fn validate(&self, raw: &RawJobRequest) -> Result<ResolvedJob, ValidationErrors> {
        let now = self.now();
        let deadline = self.config.deadline();
        let resolver = Resolver::new(raw, self.store).with_deadline(deadline);
        let mut errs = ValidationErrors::new();

        if raw.delivery_service.as_ref().map_or(true, DeliveryServiceRef::is_blank) {
            errs.push("deliveryService: cannot be blank");
        }
        let regex = check_regex(
            &mut errs,
            raw.regex.as_deref(),
            "regex: is not a valid Regular Expression: ",
        );
        if raw.ttl.as_ref().map_or(true, TtlInput::is_blank) {
            errs.push("ttl: cannot be blank");
        }

        let delivery_service_id = raw
            .delivery_service
            .as_ref()
            .and_then(|_| match resolver.delivery_service_id() {
                Ok(id) => Some(id),
                Err(e) => {
                    errs.push(e.to_string());
                    None
                }
            });

        let start_time = match &raw.start_time {
            None => {
                errs.push("startTime: cannot be blank");
                None
            }
            Some(input) => match parse_timestamp(input) {
                Ok(start) => {
                    if !must_be_in_future(start, now) {
                        errs.push("startTime: must be in the future");
                    }
                    Some(start)
                }
                Err(e) => {
                    errs.push(format!("startTime: {}", e));
                    None
                }
            },
        };

        let ttl_hours = raw.ttl.as_ref().and_then(|_| match resolver.ttl_hours() {
            Ok(hours) => Some(hours),
            Err(_) => {
                errs.push("ttl: must be a number of hours, or a duration string e.g. '48h'");
                None
            }
        });
        if let Some(hours) = ttl_hours {
            match self.configured_max_ttl_hours(&deadline) {
                Ok(Some(max)) if hours.get() > max => {
                    errs.push(format!("ttl: cannot exceed {}!", max));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "max TTL lookup failed, not enforcing a configured maximum");
                }
            }
        }

        match (delivery_service_id, regex, start_time, ttl_hours) {
            (Some(delivery_service_id), Some(regex), Some(start_time), Some(ttl_hours))
                if errs.is_empty() =>
            {
                debug!(ds = %delivery_service_id, ttl = %ttl_hours, "job request valid");
                Ok(ResolvedJob {
                    delivery_service_id,
                    regex: regex.to_string(),
                    start_time,
                    ttl_hours,
                })
            }
            _ => {
                debug!(errors = %errs, "job request rejected");
                Err(errs)
            }
        }
    }

    /// Validate input to the legacy user job endpoint.
    pub fn validate_user_input(&self, input: &UserInvalidationJobInput) -> Result<(), ValidationErrors> {
        let now = self.now();
        let deadline = self.config.deadline();
        let mut errs = ValidationErrors::new();

        check_regex(
            &mut errs,
            input.regex.as_deref(),
            "regex: is not a valid regular expression: ",
        );
        if input.ds_id.map_or(true, |id| id == 0) {
            errs.push("dsId: cannot be blank");
        }
        if input.ttl.map_or(true, |ttl| ttl == 0) {
            errs.push("ttl: cannot be blank");
        }

        match input.start_time.as_ref().map(parse_timestamp) {
            None => errs.push("startTime: cannot be blank"),
            Some(Err(e)) => errs.push(format!("startTime: {}", e)),
            Some(Ok(start)) if !must_be_within_two_days(start, now) => {
                errs.push("startTime: must be within two days");
            }
            Some(Ok(_)) => {}
        }

        if let Some(id) = input.ds_id {
            let exists = deadline
                .check("delivery service lookup")
                .map_err(StoreError::from)
                .and_then(|()| self.store.delivery_service_exists(DeliveryServiceId::new(id)));
            match exists {
                Ok(true) => {}
                Ok(false) => errs.push("no Delivery Service corresponding to 'dsId'"),
                Err(e) => {
                    error!(error = %e, ds = id, "checking for delivery service existence");
                    errs.push("no Delivery Service corresponding to 'dsId'");
                }
            }
        }

        if let Some(ttl) = input.ttl {
            match self.configured_max_ttl_hours(&deadline) {
                Ok(None) if ttl > MAX_TTL_HOURS => {
                    errs.push(format!("ttl: cannot exceed {}", MAX_TTL_HOURS));
                }
                Ok(Some(max)) if ttl > max => errs.push(format!("ttl: cannot exceed {}", max)),
                Err(e) => {
                    warn!(error = %e, "max TTL lookup failed, not enforcing a configured maximum");
                    if ttl < 1 {
                        errs.push("ttl: must be at least 1");
                    }
                }
                Ok(_) if ttl < 1 => errs.push("ttl: must be at least 1"),
                Ok(_) => {}
            }
        }

        errs.into_result()
    }

    /// Validate input to the API version 4 job creation endpoint.
    ///
    /// Stricter than [`validate`](Self::validate): a missing or unreadable
    /// TTL maximum rejects the job.
    pub fn validate_create_v4(&self, job: &InvalidationJobCreateV4) -> Result<(), ValidationErrors> {
        let now = self.now();
        let deadline = self.config.deadline();
        let mut errs = ValidationErrors::new();

        if job.delivery_service.is_empty() {
            errs.push("deliveryService: cannot be blank");
        }
        check_regex(
            &mut errs,
            Some(job.regex.as_str()),
            "regex: is not a valid Regular Expression: ",
        );
        if job.start_time.is_none() {
            errs.push("startTime: cannot be blank");
        }
        if job.ttl_hours == 0 {
            errs.push("ttlHours: cannot be blank");
        }
        let invalidation_type = if job.invalidation_type.is_empty() {
            errs.push("invalidationType: cannot be blank");
            None
        } else {
            match job.invalidation_type.parse::<InvalidationType>() {
                Ok(t) => Some(t),
                Err(e) => {
                    errs.push(format!("invalidationType: {}", e));
                    None
                }
            }
        };

        if !job.delivery_service.is_empty() {
            let reference = DeliveryServiceRef::XmlId(job.delivery_service.clone());
            if let Err(e) = resolve_delivery_service(&reference, self.store, &deadline) {
                errs.push(format!("Delivery Service is invalid: {}", e));
            }
        }

        if let Some(start) = job.start_time {
            if !must_be_in_future(start, now) {
                errs.push("startTime: must be in the future");
            }
        }

        match self.configured_max_ttl_hours(&deadline) {
            Ok(Some(max)) if u64::from(job.ttl_hours) > max => {
                errs.push(format!("TTL is invalid: cannot exceed {}", max));
            }
            Ok(Some(_)) => {}
            Ok(None) => {
                error!(parameter = %self.config.max_reval_parameter, "max TTL parameter not found");
                errs.push("TTL is invalid");
            }
            Err(e) => {
                error!(error = %e, "querying max TTL parameter");
                errs.push("TTL is invalid");
            }
        }

        if invalidation_type == Some(InvalidationType::Refetch) && !self.refetch_allowed(&deadline) {
            errs.push(
                "invalidationType is not allowed since 'refetch_enabled' parameter doesn't exists or the value is not set to a case-insensitive 'true'",
            );
        }

        errs.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{LookupKind, MemoryStore};
    use crate::ttl::{TtlHours, TtlInput};
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_delivery_service(1, "demo1")
            .with_parameter("maxRevalDurationDays", "regex_revalidate.config", "3")
    }

    fn request() -> RawJobRequest {
        RawJobRequest::from_json(
            &json!({
                "deliveryService": "demo1",
                "regex": "/path/.*\\.jpg",
                "startTime": "2030-01-01T06:00:00Z",
                "ttl": "48h"
            })
            .to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_prefix_rule() {
        assert!(has_job_regex_prefix("/foo"));
        assert!(has_job_regex_prefix(r"\/foo"));
        assert!(!has_job_regex_prefix("foo"));
        assert!(!has_job_regex_prefix(r"\\/foo"));
    }

    #[test]
    fn test_start_rules_are_distinct() {
        let soon = now() + TimeDelta::try_hours(1).unwrap();
        let later = now() + TimeDelta::try_hours(49).unwrap();
        assert!(must_be_in_future(soon, now()));
        assert!(must_be_in_future(later, now()));
        assert!(!must_be_in_future(now(), now()));
        assert!(must_be_within_two_days(soon, now()));
        assert!(!must_be_within_two_days(later, now()));
        assert!(must_be_within_two_days(now() - TimeDelta::try_hours(1).unwrap(), now()));
    }

    #[test]
    fn test_valid_request() {
        let store = store();
        let job = JobValidator::new(&store).with_now(now()).validate(&request()).unwrap();
        assert_eq!(job.delivery_service_id, DeliveryServiceId::new(1));
        assert_eq!(job.ttl_hours, TtlHours::new(48));
        assert_eq!(job.regex, "/path/.*\\.jpg");
    }

    #[test]
    fn test_all_failures_are_reported() {
        let store = store();
        let errs = JobValidator::new(&store)
            .with_now(now())
            .validate(&RawJobRequest::default())
            .unwrap_err();
        assert_eq!(
            errs.to_string(),
            "deliveryService: cannot be blank, regex: cannot be blank, ttl: cannot be blank, startTime: cannot be blank"
        );
        assert_eq!(store.lookup_count(), 0);
    }

    #[test]
    fn test_zero_ttl_is_blank() {
        let store = store();
        let validator = JobValidator::new(&store).with_now(now());

        let errs = validator.validate(&request().with_ttl(TtlInput::Hours(0.0))).unwrap_err();
        assert_eq!(errs.messages(), ["ttl: cannot be blank"]);

        let errs = validator.validate(&request().with_ttl("")).unwrap_err();
        assert_eq!(errs.messages()[0], "ttl: cannot be blank");
    }

    #[test]
    fn test_empty_delivery_service_is_blank() {
        let store = store();
        let validator = JobValidator::new(&store).with_now(now());

        let errs = validator.validate(&request().with_delivery_service("")).unwrap_err();
        assert_eq!(
            errs.messages(),
            [
                "deliveryService: cannot be blank",
                "No DeliveryService exists matching identifier: "
            ]
        );

        let raw = request().with_delivery_service(DeliveryServiceRef::Numeric(0.0));
        let errs = validator.validate(&raw).unwrap_err();
        assert_eq!(errs.messages()[0], "deliveryService: cannot be blank");
        assert_eq!(errs.len(), 2);
    }

    #[test]
    fn test_independent_failures() {
        let store = store();
        let raw = RawJobRequest::default()
            .with_delivery_service("missing")
            .with_regex("foo(")
            .with_start_time("2029-12-31T00:00:00Z")
            .with_ttl("30m");
        let errs = JobValidator::new(&store).with_now(now()).validate(&raw).unwrap_err();
        assert_eq!(errs.len(), 5);
        assert_eq!(errs.messages()[0], r"regex: must start with '/' (or '\/')");
        assert!(errs.messages()[1].starts_with("regex: is not a valid Regular Expression: "));
        assert_eq!(errs.messages()[2], "No DeliveryService exists matching identifier: missing");
        assert_eq!(errs.messages()[3], "startTime: must be in the future");
        assert_eq!(
            errs.messages()[4],
            "ttl: must be a number of hours, or a duration string e.g. '48h'"
        );
    }

    #[test]
    fn test_unparseable_start_time() {
        let store = store();
        let raw = request().with_start_time("next tuesday");
        let errs = JobValidator::new(&store).with_now(now()).validate(&raw).unwrap_err();
        assert!(errs.messages()[0].starts_with("startTime: invalid timestamp"));
    }

    #[test]
    fn test_fractional_start_time_is_reported() {
        let store = store();
        let raw = RawJobRequest::from_json(
            r#"{"deliveryService": "demo1", "regex": "/a", "startTime": 1534869508.5, "ttl": 48}"#,
        )
        .unwrap();
        let errs = JobValidator::new(&store).with_now(now()).validate(&raw).unwrap_err();
        assert_eq!(errs.messages().len(), 1);
        assert!(errs.messages()[0].starts_with("startTime: invalid timestamp"));
    }

    #[test]
    fn test_dynamic_maximum_enforced() {
        let store = store();
        let raw = request().with_ttl(TtlInput::Hours(73.0));
        let errs = JobValidator::new(&store).with_now(now()).validate(&raw).unwrap_err();
        assert_eq!(errs.messages(), ["ttl: cannot exceed 72!"]);
    }

    #[test]
    fn test_dynamic_maximum_not_found_means_unlimited() {
        let store = MemoryStore::new().with_delivery_service(1, "demo1");
        let raw = request().with_ttl("1000h");
        let job = JobValidator::new(&store).with_now(now()).validate(&raw).unwrap();
        assert_eq!(job.ttl_hours, TtlHours::new(1000));
    }

    #[test]
    fn test_dynamic_maximum_failure_is_swallowed() {
        let store = store().failing(LookupKind::Parameter);
        let raw = request().with_ttl("1000h");
        assert!(JobValidator::new(&store).with_now(now()).validate(&raw).is_ok());

        let garbled = MemoryStore::new()
            .with_delivery_service(1, "demo1")
            .with_parameter("maxRevalDurationDays", "regex_revalidate.config", "ninety");
        assert!(JobValidator::new(&garbled).with_now(now()).validate(&raw).is_ok());
    }

    #[test]
    fn test_storage_failure_is_opaque() {
        let store = store().failing(LookupKind::DeliveryService);
        let errs = JobValidator::new(&store).with_now(now()).validate(&request()).unwrap_err();
        assert_eq!(errs.messages(), ["Unknown error occurred"]);
    }

    #[test]
    fn test_exhausted_budget() {
        let store = store();
        let config = ValidatorConfig::default().with_lookup_timeout(std::time::Duration::ZERO);
        let errs = JobValidator::new(&store)
            .with_config(config)
            .with_now(now())
            .validate(&request().with_ttl("1000h"))
            .unwrap_err();
        assert_eq!(errs.messages(), ["Unknown error occurred"]);
        assert_eq!(store.lookup_count(), 0);
    }

    #[test]
    fn test_user_input() {
        let store = store();
        let validator = JobValidator::new(&store).with_now(now());
        let mut input = UserInvalidationJobInput {
            ds_id: Some(1),
            regex: Some("/foo".into()),
            start_time: Some("2030-01-01 12:00:00".into()),
            ttl: Some(24),
            urgent: None,
        };
        assert!(validator.validate_user_input(&input).is_ok());

        input.ttl = Some(100);
        input.ds_id = Some(9);
        input.start_time = Some("2030-01-05 00:00:00".into());
        let errs = validator.validate_user_input(&input).unwrap_err();
        assert_eq!(
            errs.messages(),
            [
                "startTime: must be within two days",
                "no Delivery Service corresponding to 'dsId'",
                "ttl: cannot exceed 72",
            ]
        );
    }

    #[test]
    fn test_user_input_ttl_bounds() {
        let store = MemoryStore::new().with_delivery_service(1, "demo1");
        let validator = JobValidator::new(&store).with_now(now());
        let mut input = UserInvalidationJobInput {
            ds_id: Some(1),
            regex: Some("/foo".into()),
            start_time: Some("2030-01-01 12:00:00".into()),
            ttl: Some(MAX_TTL_HOURS + 1),
            urgent: Some(true),
        };
        let errs = validator.validate_user_input(&input).unwrap_err();
        assert_eq!(errs.messages(), [format!("ttl: cannot exceed {}", MAX_TTL_HOURS)]);

        input.ttl = Some(0);
        let errs = validator.validate_user_input(&input).unwrap_err();
        assert_eq!(errs.messages(), ["ttl: cannot be blank", "ttl: must be at least 1"]);
    }

    fn create_v4() -> InvalidationJobCreateV4 {
        InvalidationJobCreateV4 {
            delivery_service: "demo1".into(),
            regex: "/foo".into(),
            start_time: Some(now() + TimeDelta::try_hours(1).unwrap()),
            ttl_hours: 24,
            invalidation_type: "REFRESH".into(),
        }
    }

    #[test]
    fn test_create_v4() {
        let store = store();
        let validator = JobValidator::new(&store).with_now(now());
        assert!(validator.validate_create_v4(&create_v4()).is_ok());

        let mut job = create_v4();
        job.ttl_hours = 100;
        job.invalidation_type = "refetch".into();
        job.delivery_service = "nope".into();
        let errs = validator.validate_create_v4(&job).unwrap_err();
        assert_eq!(
            errs.messages(),
            [
                "invalidationType: must be either REFRESH or REFETCH (case sensitive)",
                "Delivery Service is invalid: No DeliveryService exists matching identifier: nope",
                "TTL is invalid: cannot exceed 72",
            ]
        );
    }

    #[test]
    fn test_create_v4_requires_max_ttl() {
        let store = MemoryStore::new().with_delivery_service(1, "demo1");
        let errs = JobValidator::new(&store)
            .with_now(now())
            .validate_create_v4(&create_v4())
            .unwrap_err();
        assert_eq!(errs.messages(), ["TTL is invalid"]);
    }

    #[test]
    fn test_create_v4_refetch_switch() {
        let mut job = create_v4();
        job.invalidation_type = "REFETCH".into();

        let off = store();
        let errs = JobValidator::new(&off).with_now(now()).validate_create_v4(&job).unwrap_err();
        assert!(errs.contains("'refetch_enabled'"));

        let on = store().with_parameter("refetch_enabled", "global", " True ");
        assert!(JobValidator::new(&on).with_now(now()).validate_create_v4(&job).is_ok());
    }
}
