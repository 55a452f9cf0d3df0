//! Identifier resolution and per-request memoization.

use std::cell::OnceCell;

use tracing::error;

use crate::deadline::Deadline;
use crate::error::JobError;
use crate::ids::DeliveryServiceId;
use crate::request::{DeliveryServiceRef, RawJobRequest};
use crate::store::JobStore;
use crate::ttl::{normalize_ttl, TtlHours};

/// Resolve a Delivery Service reference to its integral ID with one lookup.
///
/// Numeric references are checked for existence; XML-IDs are looked up.
/// Storage failures other than "not found" are logged and reported as the
/// opaque [`JobError::ResolutionFailed`].
pub fn resolve_delivery_service<S: JobStore + ?Sized>(
    reference: &DeliveryServiceRef,
    store: &S,
    deadline: &Deadline,
) -> Result<DeliveryServiceId, JobError> {
    if let Err(e) = deadline.check("delivery service lookup") {
        error!(error = %e, reference = %reference, "delivery service lookup skipped");
        return Err(JobError::ResolutionFailed);
    }

    match reference {
        DeliveryServiceRef::Numeric(n) => {
            if *n < 0.0 {
                return Err(JobError::NegativeId);
            }
            let id = DeliveryServiceId::new(n.trunc() as u64);
            match store.delivery_service_exists(id) {
                Ok(true) => Ok(id),
                Ok(false) => Err(JobError::NotFound(format!(
                    "No Delivery Service exists matching identifier: {}",
                    n
                ))),
                Err(e) => {
                    error!(error = %e, id = %id, "checking for delivery service existence");
                    Err(JobError::ResolutionFailed)
                }
            }
        }
        DeliveryServiceRef::XmlId(xml_id) => match store.delivery_service_id(xml_id) {
            Ok(id) => Ok(id),
            Err(e) if e.is_not_found() => Err(JobError::NotFound(format!(
                "No DeliveryService exists matching identifier: {}",
                xml_id
            ))),
            Err(e) => {
                error!(error = %e, xml_id = %xml_id, "looking up delivery service by xml_id");
                Err(JobError::ResolutionFailed)
            }
        },
    }
}

/// Resolves the loosely-typed fields of one [`RawJobRequest`], at most once each.
///
/// Successful results are cached for the lifetime of the resolver; failures
/// are not, so a retry recomputes. The cache is `!Sync` and is
/// never shared between requests.
pub struct Resolver<'a, S: JobStore + ?Sized> {
    request: &'a RawJobRequest,
    store: &'a S,
    deadline: Deadline,
    delivery_service_id: OnceCell<DeliveryServiceId>,
    ttl_hours: OnceCell<TtlHours>,
}

impl<'a, S: JobStore + ?Sized> Resolver<'a, S> {
    /// Create a resolver for one request.
    pub fn new(request: &'a RawJobRequest, store: &'a S) -> Self {
        Self {
            request,
            store,
            deadline: Deadline::none(),
            delivery_service_id: OnceCell::new(),
            ttl_hours: OnceCell::new(),
        }
    }

    /// Bound every storage call by `deadline`.
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// The integral ID of the referenced Delivery Service.
    pub fn delivery_service_id(&self) -> Result<DeliveryServiceId, JobError> {
        if let Some(id) = self.delivery_service_id.get() {
            return Ok(*id);
        }
        let reference = self
            .request
            .delivery_service
            .as_ref()
            .ok_or(JobError::Missing("deliveryService"))?;
        let id = resolve_delivery_service(reference, self.store, &self.deadline)?;
        Ok(*self.delivery_service_id.get_or_init(|| id))
    }

    /// The TTL in whole hours.
    pub fn ttl_hours(&self) -> Result<TtlHours, JobError> {
        if let Some(hours) = self.ttl_hours.get() {
            return Ok(*hours);
        }
        let input = self.request.ttl.as_ref().ok_or(JobError::Missing("ttl"))?;
        let hours = normalize_ttl(input)?;
        Ok(*self.ttl_hours.get_or_init(|| hours))
    }

    /// Check if the TTL has been resolved and cached.
    pub fn has_cached_ttl(&self) -> bool {
        self.ttl_hours.get().is_some()
    }

    /// Check if the Delivery Service ID has been resolved and cached.
    pub fn has_cached_delivery_service_id(&self) -> bool {
        self.delivery_service_id.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{LookupKind, MemoryStore};
    use crate::ttl::TtlInput;
    use std::time::Duration;

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_delivery_service(1, "demo1")
            .with_delivery_service(2, "demo2")
    }

    #[test]
    fn test_numeric_reference_discards_fraction() {
        let id = resolve_delivery_service(&DeliveryServiceRef::Numeric(2.34), &store(), &Deadline::none());
        assert_eq!(id.unwrap(), DeliveryServiceId::new(2));
    }

    #[test]
    fn test_xml_id_reference() {
        let id = resolve_delivery_service(&"demo1".into(), &store(), &Deadline::none());
        assert_eq!(id.unwrap(), DeliveryServiceId::new(1));
    }

    #[test]
    fn test_not_found_messages() {
        let err = resolve_delivery_service(&5u64.into(), &store(), &Deadline::none()).unwrap_err();
        assert_eq!(err.to_string(), "No Delivery Service exists matching identifier: 5");

        let err = resolve_delivery_service(&"nope".into(), &store(), &Deadline::none()).unwrap_err();
        assert_eq!(err.to_string(), "No DeliveryService exists matching identifier: nope");
    }

    #[test]
    fn test_negative_id_skips_lookup() {
        let store = store();
        let err = resolve_delivery_service(&DeliveryServiceRef::Numeric(-1.0), &store, &Deadline::none());
        assert!(matches!(err, Err(JobError::NegativeId)));
        assert_eq!(store.lookup_count(), 0);
    }

    #[test]
    fn test_storage_failure_is_opaque() {
        let store = store().failing(LookupKind::DeliveryService);
        for reference in [DeliveryServiceRef::Numeric(1.0), "demo1".into()] {
            let err = resolve_delivery_service(&reference, &store, &Deadline::none()).unwrap_err();
            assert!(matches!(err, JobError::ResolutionFailed));
            assert_eq!(err.to_string(), "Unknown error occurred");
        }
    }

    #[test]
    fn test_expired_deadline_is_opaque() {
        let store = store();
        let err = resolve_delivery_service(&"demo1".into(), &store, &Deadline::after(Duration::ZERO));
        assert!(matches!(err, Err(JobError::ResolutionFailed)));
        assert_eq!(store.lookup_count(), 0);
    }

    #[test]
    fn test_resolver_memoizes_delivery_service() {
        let store = store();
        let request = RawJobRequest::default().with_delivery_service("demo2");
        let resolver = Resolver::new(&request, &store);

        let first = resolver.delivery_service_id().unwrap();
        assert_eq!(store.lookup_count(), 1);
        let second = resolver.delivery_service_id().unwrap();
        assert_eq!(store.lookup_count(), 1);
        assert_eq!(first, second);
        assert!(resolver.has_cached_delivery_service_id());
    }

    #[test]
    fn test_resolver_memoizes_ttl() {
        let store = store();
        let request = RawJobRequest::default().with_ttl("121m");
        let resolver = Resolver::new(&request, &store);
        assert!(!resolver.has_cached_ttl());
        assert_eq!(resolver.ttl_hours().unwrap(), TtlHours::new(2));
        assert!(resolver.has_cached_ttl());
        assert_eq!(resolver.ttl_hours().unwrap(), TtlHours::new(2));
        assert_eq!(store.lookup_count(), 0);
    }

    #[test]
    fn test_failed_ttl_is_not_cached() {
        let store = store();
        for bad in [TtlInput::Hours(-1.0), TtlInput::Hours(crate::ttl::MAX_TTL_HOURS as f64)] {
            let request = RawJobRequest::default().with_ttl(bad);
            let resolver = Resolver::new(&request, &store);
            assert!(resolver.ttl_hours().is_err());
            assert!(!resolver.has_cached_ttl());
        }
    }

    #[test]
    fn test_failed_lookup_is_not_cached() {
        let store = store();
        let request = RawJobRequest::default().with_delivery_service("missing");
        let resolver = Resolver::new(&request, &store);
        assert!(resolver.delivery_service_id().is_err());
        assert!(resolver.delivery_service_id().is_err());
        assert!(!resolver.has_cached_delivery_service_id());
        assert_eq!(store.lookup_count(), 2);
    }

    #[test]
    fn test_missing_fields() {
        let store = store();
        let request = RawJobRequest::default();
        let resolver = Resolver::new(&request, &store);
        assert!(matches!(resolver.delivery_service_id(), Err(JobError::Missing("deliveryService"))));
        assert!(matches!(resolver.ttl_hours(), Err(JobError::Missing("ttl"))));
    }
}
