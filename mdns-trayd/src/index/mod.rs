//! Live index of discovered domains, service types, hosts and service instances.
//!
//! The index applies discovery events one at a time and reports the resulting
//! lifecycle transitions to a [`LifecycleObserver`]. Hosts exist only while they
//! own at least one service; service types are kept once seen.

pub mod entity;
pub mod event;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use shared::types::Scope;

pub use entity::{Host, IpProtocol, ServiceDetails, ServiceId, ServiceInstance, ServiceType};
pub use event::{DiscoveryEvent, ResolveError, Transport};

/// Receives lifecycle transitions while the index is being mutated.
///
/// `service_removed` is called while the instance is still attached to its
/// host and type, and `host_removed` just before the host record is dropped.
pub trait LifecycleObserver {
    fn service_type_created(&mut self, _service_type: &ServiceType) {}

    fn host_created(&mut self, host: &Host);

    fn host_removed(&mut self, host: &Host);

    fn service_created(&mut self, service: &ServiceInstance);

    fn service_removed(&mut self, service: &ServiceInstance);

    fn resolve_failed(&mut self, scope: &Scope, name: &str, service_type: &str, error: &ResolveError) {
        tracing::warn!("Failed to resolve {} ({}) in {}: {}", name, service_type, scope, error);
    }
}

#[derive(Debug, Default)]
struct ScopeRecord {
    hosts: HashMap<String, Host>,
    types: HashMap<String, ServiceType>,
    /// Owning host FQDN of every instance in the scope
    locations: HashMap<ServiceId, String>,
    /// Whether service types of the scope are being browsed
    types_subscribed: bool,
}

pub struct DiscoveryIndex {
    scopes: HashMap<Scope, ScopeRecord>,
    transport: Box<dyn Transport>,
}

impl DiscoveryIndex {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            scopes: HashMap::new(),
            transport,
        }
    }

    /// Dispatch one discovery event
    pub fn apply(&mut self, event: DiscoveryEvent, observer: &mut dyn LifecycleObserver) {
        match event {
            DiscoveryEvent::DomainDiscovered(scope) => self.on_domain_discovered(scope),
            DiscoveryEvent::ServiceTypeDiscovered { scope, service_type } => {
                self.on_service_type_discovered(scope, service_type, observer)
            }
            DiscoveryEvent::ServiceFound { scope, name, service_type } => {
                self.on_service_found(&scope, &name, &service_type)
            }
            DiscoveryEvent::ServiceResolved { scope, name, service_type, details } => {
                self.on_service_added(scope, name, service_type, details, observer)
            }
            DiscoveryEvent::ResolveFailed { scope, name, service_type, error } => {
                observer.resolve_failed(&scope, &name, &service_type, &error)
            }
            DiscoveryEvent::ServiceRemoved { scope, name, service_type } => {
                self.on_service_removed(&scope, &name, &service_type, observer)
            }
        }
    }

    /// Establish a scope and start browsing its service types.
    pub fn on_domain_discovered(&mut self, scope: Scope) {
        let record = self.scopes.entry(scope.clone()).or_default();
        if record.types_subscribed {
            tracing::debug!("Domain {} already known", scope);
            return;
        }

        tracing::info!("New domain: {}", scope);
        self.transport.subscribe_service_types(&scope);
        record.types_subscribed = true;
    }

    /// Record a service type and start browsing its instances.
    pub fn on_service_type_discovered(
        &mut self,
        scope: Scope,
        service_type: String,
        observer: &mut dyn LifecycleObserver,
    ) {
        let record = self.scopes.entry(scope.clone()).or_default();
        let (entry, created) = match record.types.entry(service_type.clone()) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => (entry.insert(ServiceType::new(scope, service_type)), true),
        };

        if entry.is_subscribed() {
            tracing::debug!(
                "Service type {} already known in {} ({} instances)",
                entry.name(),
                entry.scope(),
                entry.items().count()
            );
            return;
        }

        tracing::info!("Browsing service type {} in {}", entry.name(), entry.scope());
        self.transport.subscribe_services(entry.scope(), entry.name());
        entry.mark_subscribed();
        if created {
            observer.service_type_created(entry);
        }
    }

    /// A browsed instance appeared; ask the transport to resolve it.
    pub fn on_service_found(&self, scope: &Scope, name: &str, service_type: &str) {
        tracing::debug!("Resolving {} ({}) in {}", name, service_type, scope);
        self.transport.resolve(scope, name, service_type);
    }

    /// Apply a resolved instance: create its host and the instance when they
    /// are new, otherwise refresh the instance's attributes in place.
    pub fn on_service_added(
        &mut self,
        scope: Scope,
        name: String,
        service_type: String,
        details: ServiceDetails,
        observer: &mut dyn LifecycleObserver,
    ) {
        let record = self.scopes.entry(scope.clone()).or_default();
        let id = ServiceId::new(name, service_type);
        let fqdn = details.fqdn.clone();

        // Re-resolved onto another host: leave the old one first
        if let Some(current) = record.locations.get(&id) {
            if *current != fqdn {
                tracing::debug!(
                    "Service {} ({}) moved from {} to {}",
                    id.name,
                    id.service_type,
                    current,
                    fqdn
                );
                Self::detach(record, &id, observer);
            }
        }

        if !record.types.contains_key(&id.service_type) {
            let entry = record
                .types
                .entry(id.service_type.clone())
                .or_insert_with(|| ServiceType::new(scope.clone(), id.service_type.clone()));
            observer.service_type_created(entry);
        }

        let host = match record.hosts.entry(fqdn.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                tracing::debug!("New host: {} in {}", fqdn, scope);
                let host = entry.insert(Host::new(scope.clone(), fqdn.clone()));
                observer.host_created(host);
                host
            }
        };

        match host.services.entry(id.clone()) {
            Entry::Occupied(entry) => {
                let service = entry.into_mut();
                tracing::debug!(
                    "Refreshing service {} ({}) on {}, known since {}",
                    id.name,
                    id.service_type,
                    fqdn,
                    service.discovered_at()
                );
                service.refresh(details);
            }
            Entry::Vacant(entry) => {
                if let Some(service_type) = record.types.get_mut(&id.service_type) {
                    service_type.attach(&id.name);
                }
                record.locations.insert(id.clone(), fqdn);
                let service = entry.insert(ServiceInstance::new(scope, id, details));
                tracing::debug!(
                    "New service {} ({}) on {} at {:?} port {} ({:?})",
                    service.name(),
                    service.service_type(),
                    service.host_fqdn(),
                    service.address(),
                    service.port(),
                    service.protocol()
                );
                observer.service_created(service);
            }
        }
    }

    /// Remove an instance; the host goes with its last service.
    /// Unknown instances are ignored.
    pub fn on_service_removed(
        &mut self,
        scope: &Scope,
        name: &str,
        service_type: &str,
        observer: &mut dyn LifecycleObserver,
    ) {
        let id = ServiceId::new(name, service_type);
        let removed = match self.scopes.get_mut(scope) {
            Some(record) => Self::detach(record, &id, observer),
            None => false,
        };

        if !removed {
            tracing::debug!("Ignoring removal of unknown service {} ({}) in {}", name, service_type, scope);
        }
    }

    fn detach(record: &mut ScopeRecord, id: &ServiceId, observer: &mut dyn LifecycleObserver) -> bool {
        let Some(fqdn) = record.locations.remove(id) else {
            return false;
        };
        let Some(host) = record.hosts.get_mut(&fqdn) else {
            return false;
        };
        let Some(service) = host.services.get(id) else {
            return false;
        };

        observer.service_removed(service);
        host.services.remove(id);
        if let Some(service_type) = record.types.get_mut(&id.service_type) {
            service_type.detach(&id.name);
        }

        if host.services.is_empty() {
            observer.host_removed(host);
            record.hosts.remove(&fqdn);
        }

        true
    }

    pub fn host(&self, scope: &Scope, fqdn: &str) -> Option<&Host> {
        self.scopes.get(scope)?.hosts.get(fqdn)
    }

    pub fn service(&self, scope: &Scope, name: &str, service_type: &str) -> Option<&ServiceInstance> {
        let record = self.scopes.get(scope)?;
        let id = ServiceId::new(name, service_type);
        let fqdn = record.locations.get(&id)?;
        record.hosts.get(fqdn)?.services.get(&id)
    }

    pub fn service_type(&self, scope: &Scope, service_type: &str) -> Option<&ServiceType> {
        self.scopes.get(scope)?.types.get(service_type)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.scopes.values().flat_map(|record| record.hosts.values())
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceInstance> {
        self.hosts().flat_map(|host| host.services())
    }
}
