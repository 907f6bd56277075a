use std::time::Duration;
use shared::types::Scope;
use thiserror::Error;
use super::entity::ServiceDetails;

/// Normalized discovery notifications, delivered one at a time.
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    DomainDiscovered(Scope),
    ServiceTypeDiscovered {
        scope: Scope,
        service_type: String,
    },
    /// A browse "item new": still has to be resolved
    ServiceFound {
        scope: Scope,
        name: String,
        service_type: String,
    },
    ServiceResolved {
        scope: Scope,
        name: String,
        service_type: String,
        details: ServiceDetails,
    },
    ResolveFailed {
        scope: Scope,
        name: String,
        service_type: String,
        error: ResolveError,
    },
    ServiceRemoved {
        scope: Scope,
        name: String,
        service_type: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no resolution within {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Requests the index issues to the discovery transport. All of them are
/// fire-and-forget; results come back later as [`DiscoveryEvent`]s.
pub trait Transport: Send {
    fn subscribe_service_types(&self, scope: &Scope);

    fn subscribe_services(&self, scope: &Scope, service_type: &str);

    fn resolve(&self, scope: &Scope, name: &str, service_type: &str);
}
