//! Content invalidation ("purge") job validation for Traffic Ops.
//!
//! This crate checks user requests to invalidate cached content and detects
//! collisions with jobs that are already scheduled:
//!
//! - **Timestamps**: epoch seconds, RFC 3339 and two legacy layouts, plus the
//!   fixed legacy representation of materialized jobs
//! - **TTLs**: duration strings or hours, normalized to whole hours
//! - **Identifiers**: Delivery Service IDs or XML-IDs, resolved once per request
//! - **Validation**: every violated constraint reported at once
//! - **Overlap**: conflicting windows for the same content
//!
//! Storage is reached only through the [`JobStore`] trait, one call at a time.
//!
//! # Example
//!
//! ```rust,ignore
//! use tc_jobs::prelude::*;
//!
//! let store = MemoryStore::new().with_delivery_service(1, "demo1");
//! let raw = RawJobRequest::from_json(
//!     r#"{"deliveryService": "demo1", "regex": "/images/.*", "startTime": "2030-01-01T00:00:00Z", "ttl": "48h"}"#,
//! )?;
//!
//! let job = JobValidator::new(&store).validate(&raw)?;
//! let candidate = job.candidate("http://origin.demo1.example/images/.*");
//! for conflict in detect_conflicts(&store, &candidate, &Deadline::none())? {
//!     println!("{}", conflict);
//! }
//! ```

pub mod config;
pub mod deadline;
pub mod error;
pub mod ids;

pub mod job;
pub mod memory;
pub mod overlap;
pub mod request;
pub mod resolve;
pub mod store;
pub mod time;
pub mod ttl;
pub mod validate;

pub use config::ValidatorConfig;
pub use deadline::{Deadline, DeadlineExceeded};
pub use error::{JobError, StoreError, ValidationErrors};
pub use ids::*;
pub use store::{ExistingJobRecord, JobStore};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::ValidatorConfig;
    pub use crate::deadline::{Deadline, DeadlineExceeded};
    pub use crate::error::{JobError, StoreError, ValidationErrors};
    pub use crate::ids::*;
    pub use crate::store::{ExistingJobRecord, JobStore};

    // Inputs
    pub use crate::request::{DeliveryServiceRef, RawJobRequest, ResolvedJob};
    pub use crate::time::{parse_timestamp, parse_timestamp_str, LegacyTime, TimestampInput};
    pub use crate::ttl::{normalize_ttl, TtlHours, TtlInput, MAX_TTL_HOURS};

    // Resolution and validation
    pub use crate::resolve::{resolve_delivery_service, Resolver};
    pub use crate::validate::{must_be_in_future, must_be_within_two_days, JobValidator};

    // Overlap
    pub use crate::overlap::{
        detect_conflicts, find_conflicts, job_uniqueness_messages, Conflict, JobWindow,
    };

    // Job representations
    pub use crate::job::{
        parse_ttl_parameter, InvalidationJob, InvalidationJobCreateV4, InvalidationJobV4,
        InvalidationType, UserInvalidationJobInput,
    };

    pub use crate::memory::MemoryStore;
}
