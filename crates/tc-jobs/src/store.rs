//! The storage collaborator consumed by validation and overlap detection.
//!
//! Every method is one query against a caller-supplied transaction. The
//! core never commits, rolls back, or opens a connection of its own, and it
//! issues calls one at a time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::ids::DeliveryServiceId;

/// A persisted job as seen during overlap detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingJobRecord {
    pub asset_url: String,
    /// `0` means the job has no duration and never conflicts.
    pub ttl_hours: u64,
    pub start_time: DateTime<Utc>,
}

/// Read-only queries against a Traffic Ops database transaction.
pub trait JobStore {
    /// Check whether a Delivery Service with this ID exists.
    fn delivery_service_exists(&self, id: DeliveryServiceId) -> Result<bool, StoreError>;

    /// Look up the ID of the Delivery Service with this XML-ID.
    ///
    /// Returns [`StoreError::NotFound`] when no row matches.
    fn delivery_service_id(&self, xml_id: &str) -> Result<DeliveryServiceId, StoreError>;

    /// Read a single parameter value by name and config file.
    ///
    /// Returns [`StoreError::NotFound`] when no row matches.
    fn parameter(&self, name: &str, config_file: &str) -> Result<String, StoreError>;

    /// Every job belonging to a Delivery Service.
    fn jobs_for_delivery_service(
        &self,
        id: DeliveryServiceId,
    ) -> Result<Vec<ExistingJobRecord>, StoreError>;
}

impl<S: JobStore + ?Sized> JobStore for &S {
    fn delivery_service_exists(&self, id: DeliveryServiceId) -> Result<bool, StoreError> {
        (**self).delivery_service_exists(id)
    }

    fn delivery_service_id(&self, xml_id: &str) -> Result<DeliveryServiceId, StoreError> {
        (**self).delivery_service_id(xml_id)
    }

    fn parameter(&self, name: &str, config_file: &str) -> Result<String, StoreError> {
        (**self).parameter(name, config_file)
    }

    fn jobs_for_delivery_service(
        &self,
        id: DeliveryServiceId,
    ) -> Result<Vec<ExistingJobRecord>, StoreError> {
        (**self).jobs_for_delivery_service(id)
    }
}
