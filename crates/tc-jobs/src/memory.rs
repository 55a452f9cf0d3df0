//! In-memory [`JobStore`] for tests, fixtures, and offline tooling.
//!
//! Tables can be built in code or deserialized from a TOML/JSON fixture.
//! Every lookup is counted, and any kind of lookup can be made to fail.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::ids::DeliveryServiceId;
use crate::store::{ExistingJobRecord, JobStore};

/// A row of the Delivery Service table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryServiceRow {
    pub id: DeliveryServiceId,
    pub xml_id: String,
}

/// A row of the parameter table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterRow {
    pub name: String,
    pub config_file: String,
    pub value: String,
}

/// A row of the job table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRow {
    pub delivery_service_id: DeliveryServiceId,
    pub asset_url: String,
    #[serde(default)]
    pub ttl_hours: u64,
    pub start_time: DateTime<Utc>,
}

/// Kinds of lookup, for counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    DeliveryService,
    Parameter,
    Jobs,
}

/// An in-memory stand-in for a database transaction.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    #[serde(default)]
    delivery_services: Vec<DeliveryServiceRow>,
    #[serde(default)]
    parameters: Vec<ParameterRow>,
    #[serde(default)]
    jobs: Vec<JobRow>,
    #[serde(skip)]
    failing: HashSet<LookupKind>,
    #[serde(skip)]
    lookups: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a fixture from TOML.
    pub fn from_toml(content: &str) -> Result<Self, StoreError> {
        toml::from_str(content).map_err(|e| StoreError::Decode(e.to_string()))
    }

    /// Load a fixture from JSON.
    pub fn from_json(content: &str) -> Result<Self, StoreError> {
        serde_json::from_str(content).map_err(|e| StoreError::Decode(e.to_string()))
    }

    /// Add a Delivery Service.
    pub fn with_delivery_service(mut self, id: u64, xml_id: impl Into<String>) -> Self {
        self.delivery_services.push(DeliveryServiceRow {
            id: DeliveryServiceId::new(id),
            xml_id: xml_id.into(),
        });
        self
    }

    /// Add a parameter.
    pub fn with_parameter(
        mut self,
        name: impl Into<String>,
        config_file: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.parameters.push(ParameterRow {
            name: name.into(),
            config_file: config_file.into(),
            value: value.into(),
        });
        self
    }

    /// Add a persisted job.
    pub fn with_job(
        mut self,
        delivery_service_id: u64,
        asset_url: impl Into<String>,
        ttl_hours: u64,
        start_time: DateTime<Utc>,
    ) -> Self {
        self.jobs.push(JobRow {
            delivery_service_id: DeliveryServiceId::new(delivery_service_id),
            asset_url: asset_url.into(),
            ttl_hours,
            start_time,
        });
        self
    }

    /// Make every lookup of `kind` fail with a query error.
    pub fn failing(mut self, kind: LookupKind) -> Self {
        self.failing.insert(kind);
        self
    }

    /// Number of lookups served so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn begin(&self, kind: LookupKind) -> Result<(), StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&kind) {
            return Err(StoreError::Query(format!("{:?} lookup failed", kind)));
        }
        Ok(())
    }
}

impl JobStore for MemoryStore {
    fn delivery_service_exists(&self, id: DeliveryServiceId) -> Result<bool, StoreError> {
        self.begin(LookupKind::DeliveryService)?;
        Ok(self.delivery_services.iter().any(|ds| ds.id == id))
    }

    fn delivery_service_id(&self, xml_id: &str) -> Result<DeliveryServiceId, StoreError> {
        self.begin(LookupKind::DeliveryService)?;
        self.delivery_services
            .iter()
            .find(|ds| ds.xml_id == xml_id)
            .map(|ds| ds.id)
            .ok_or(StoreError::NotFound)
    }

    fn parameter(&self, name: &str, config_file: &str) -> Result<String, StoreError> {
        self.begin(LookupKind::Parameter)?;
        self.parameters
            .iter()
            .find(|p| p.name == name && p.config_file == config_file)
            .map(|p| p.value.clone())
            .ok_or(StoreError::NotFound)
    }

    fn jobs_for_delivery_service(
        &self,
        id: DeliveryServiceId,
    ) -> Result<Vec<ExistingJobRecord>, StoreError> {
        self.begin(LookupKind::Jobs)?;
        Ok(self
            .jobs
            .iter()
            .filter(|job| job.delivery_service_id == id)
            .map(|job| ExistingJobRecord {
                asset_url: job.asset_url.clone(),
                ttl_hours: job.ttl_hours,
                start_time: job.start_time,
            })
            .collect())
    }
}
