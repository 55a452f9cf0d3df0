//! Temporal and URL conflict detection between a new job and persisted ones.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::deadline::Deadline;
use crate::error::JobError;
use crate::ids::DeliveryServiceId;
use crate::store::{ExistingJobRecord, JobStore};
use crate::ttl::TtlHours;

/// How many records are scanned between deadline checks.
const DEADLINE_CHECK_INTERVAL: usize = 256;

/// The window a candidate job will occupy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobWindow {
    pub asset_url: String,
    pub delivery_service_id: DeliveryServiceId,
    pub start_time: DateTime<Utc>,
    pub ttl_hours: TtlHours,
}

impl JobWindow {
    /// End of the window, saturating at the latest representable instant.
    pub fn end_time(&self) -> DateTime<Utc> {
        window_end(self.start_time, self.ttl_hours.get())
    }
}

/// An existing job whose window collides with the candidate's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub asset_url: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalidation request duplicate found for {}, start:{} end:{}",
            self.asset_url, self.start_time, self.end_time
        )
    }
}

fn window_end(start: DateTime<Utc>, ttl_hours: u64) -> DateTime<Utc> {
    i64::try_from(ttl_hours)
        .ok()
        .and_then(TimeDelta::try_hours)
        .and_then(|ttl| start.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Check one persisted record against the candidate.
fn conflict_with(candidate: &JobWindow, existing: &ExistingJobRecord) -> Option<Conflict> {
    if !existing.asset_url.ends_with(&candidate.asset_url) || existing.ttl_hours == 0 {
        return None;
    }

    let existing_start = existing.start_time;
    let existing_end = window_end(existing_start, existing.ttl_hours);
    let start = candidate.start_time;
    let end = candidate.end_time();

    let start_inside = existing_start < start && start < existing_end;
    let end_inside = existing_start < end && end < existing_end;
    // Compares the candidate start with itself, so it never holds.
    #[allow(clippy::eq_op)]
    let encloses = existing_end < end && start < start;

    (start_inside || end_inside || encloses).then(|| Conflict {
        asset_url: existing.asset_url.clone(),
        start_time: existing_start,
        end_time: existing_end,
    })
}

/// Every record in `existing` that conflicts with `candidate`, in order.
pub fn find_conflicts(candidate: &JobWindow, existing: &[ExistingJobRecord]) -> Vec<Conflict> {
    existing
        .iter()
        .filter_map(|record| conflict_with(candidate, record))
        .collect()
}

/// Fetch the candidate's Delivery Service jobs and report every conflict.
///
/// Records are fetched fresh on each call and never cached.
pub fn detect_conflicts<S: JobStore + ?Sized>(
    store: &S,
    candidate: &JobWindow,
    deadline: &Deadline,
) -> Result<Vec<Conflict>, JobError> {
    deadline.check("job enumeration")?;
    let existing = store.jobs_for_delivery_service(candidate.delivery_service_id)?;

    let mut conflicts = Vec::new();
    for (i, record) in existing.iter().enumerate() {
        if i % DEADLINE_CHECK_INTERVAL == 0 {
            deadline.check("overlap scan")?;
        }
        if let Some(conflict) = conflict_with(candidate, record) {
            debug!(
                asset_url = %conflict.asset_url,
                start = %conflict.start_time,
                end = %conflict.end_time,
                "invalidation job overlap"
            );
            conflicts.push(conflict);
        }
    }
    Ok(conflicts)
}

/// Conflict messages for the candidate, ready to hand back to a user.
///
/// A failure to enumerate jobs becomes a single message instead of an error.
pub fn job_uniqueness_messages<S: JobStore + ?Sized>(
    store: &S,
    candidate: &JobWindow,
    deadline: &Deadline,
) -> Vec<String> {
    match detect_conflicts(store, candidate, deadline) {
        Ok(conflicts) => conflicts.iter().map(ToString::to_string).collect(),
        Err(e) => {
            error!(error = %e, ds = %candidate.delivery_service_id, "enumerating invalidation jobs");
            vec!["unable to query for invalidation jobs while validating job uniqueness".to_string()]
        }
    }
}
