//! View-model kept in step with the discovery index.
//!
//! Lifecycle callbacks update two groupings incrementally (by host and by
//! service type) and trigger the configured actions and notifications right
//! away. Rendering the menu is left to the caller, who coalesces bursts with a
//! [`Debouncer`](debounce::Debouncer).

pub mod debounce;
pub mod hash;
pub mod render;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use shared::protocol::{type_label, type_tag};
use shared::types::{HostMenu, MenuEntry, MenuSnapshot, Scope, ServiceRef, ServiceTypeMenu};
use crate::actions::{ActionRunner, ActivationError, Entity, EventKind};
use crate::index::{DiscoveryIndex, Host, LifecycleObserver, ServiceId, ServiceInstance, ServiceType};
use crate::notify::Notifier;

/// Instances of one type, merged across scopes: (name, host) -> scopes seen in
type TypeItems = BTreeMap<(String, String), BTreeSet<Scope>>;

pub struct PresentationSync {
    by_host: BTreeMap<Scope, BTreeMap<String, BTreeSet<ServiceId>>>,
    by_type: BTreeMap<String, TypeItems>,
    aliases: HashMap<String, String>,
    actions: Box<dyn ActionRunner>,
    notifier: Box<dyn Notifier>,
    changed: bool,
}

impl PresentationSync {
    pub fn new(
        aliases: HashMap<String, String>,
        actions: Box<dyn ActionRunner>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            by_host: BTreeMap::new(),
            by_type: BTreeMap::new(),
            aliases,
            actions,
            notifier,
            changed: false,
        }
    }

    /// Whether the views changed since the last call
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    /// Run the click action of a service
    pub fn activate(&mut self, index: &DiscoveryIndex, target: &ServiceRef) -> Result<(), ActivationError> {
        let service = index
            .service(&target.scope(), &target.name, &target.service_type)
            .ok_or_else(|| ActivationError::NotFound(target.clone()))?;

        if self.actions.run_action(EventKind::Activated, Entity::Service(service)) {
            Ok(())
        } else {
            Err(ActivationError::NoAction(target.service_type.clone()))
        }
    }

    /// Build the menu from the views
    pub fn snapshot(&self) -> MenuSnapshot {
        let hosts = self
            .by_host
            .iter()
            .flat_map(|(scope, hosts)| {
                hosts.iter().map(move |(fqdn, services)| HostMenu {
                    interface: scope.interface.clone(),
                    domain: scope.domain.clone(),
                    fqdn: fqdn.clone(),
                    entries: services
                        .iter()
                        .map(|id| MenuEntry {
                            title: format!("{} ({})", id.name, self.tag(&id.service_type)),
                            target: ServiceRef {
                                interface: scope.interface.clone(),
                                domain: scope.domain.clone(),
                                name: id.name.clone(),
                                service_type: id.service_type.clone(),
                            },
                        })
                        .collect(),
                })
            })
            .collect();

        let service_types = self
            .by_type
            .iter()
            .map(|(service_type, items)| ServiceTypeMenu {
                service_type: service_type.clone(),
                title: self.title(service_type),
                entries: items
                    .iter()
                    .filter_map(|((name, fqdn), scopes)| {
                        let scope = scopes.iter().next()?;
                        Some(MenuEntry {
                            title: format!("{} ({})", name, fqdn),
                            target: ServiceRef {
                                interface: scope.interface.clone(),
                                domain: scope.domain.clone(),
                                name: name.clone(),
                                service_type: service_type.clone(),
                            },
                        })
                    })
                    .collect(),
            })
            .collect();

        MenuSnapshot { hosts, service_types }
    }

    fn title(&self, service_type: &str) -> String {
        self.aliases
            .get(service_type)
            .cloned()
            .unwrap_or_else(|| type_label(service_type))
    }

    fn tag(&self, service_type: &str) -> String {
        self.aliases
            .get(service_type)
            .cloned()
            .unwrap_or_else(|| type_tag(service_type))
    }
}

impl LifecycleObserver for PresentationSync {
    fn service_type_created(&mut self, service_type: &ServiceType) {
        self.by_type.entry(service_type.name().to_string()).or_default();
        self.changed = true;
    }

    fn host_created(&mut self, host: &Host) {
        self.by_host
            .entry(host.scope().clone())
            .or_default()
            .entry(host.fqdn().to_string())
            .or_default();
        self.changed = true;

        self.actions.run_action(EventKind::Created, Entity::Host(host));
        self.notifier.notify(&format!("New host: {}", host.fqdn()));
    }

    fn host_removed(&mut self, host: &Host) {
        self.actions.run_action(EventKind::Removed, Entity::Host(host));
        self.notifier.notify(&format!("Removed host: {}", host.fqdn()));

        if let Some(hosts) = self.by_host.get_mut(host.scope()) {
            hosts.remove(host.fqdn());
            if hosts.is_empty() {
                self.by_host.remove(host.scope());
            }
        }
        self.changed = true;
    }

    fn service_created(&mut self, service: &ServiceInstance) {
        self.by_host
            .entry(service.scope().clone())
            .or_default()
            .entry(service.host_fqdn().to_string())
            .or_default()
            .insert(service.id().clone());
        self.by_type
            .entry(service.service_type().to_string())
            .or_default()
            .entry((service.name().to_string(), service.host_fqdn().to_string()))
            .or_default()
            .insert(service.scope().clone());
        self.changed = true;

        self.actions.run_action(EventKind::Created, Entity::Service(service));
        self.notifier.notify(&format!(
            "New service: \"{}\" type: {} on {}",
            service.name(),
            service.service_type(),
            service.host_fqdn()
        ));
    }

    fn service_removed(&mut self, service: &ServiceInstance) {
        self.actions.run_action(EventKind::Removed, Entity::Service(service));
        self.notifier.notify(&format!(
            "Removed service: \"{}\" type: {} on {}",
            service.name(),
            service.service_type(),
            service.host_fqdn()
        ));

        if let Some(services) = self
            .by_host
            .get_mut(service.scope())
            .and_then(|hosts| hosts.get_mut(service.host_fqdn()))
        {
            services.remove(service.id());
        }

        if let Some(items) = self.by_type.get_mut(service.service_type()) {
            let key = (service.name().to_string(), service.host_fqdn().to_string());
            if let Some(scopes) = items.get_mut(&key) {
                scopes.remove(service.scope());
                if scopes.is_empty() {
                    items.remove(&key);
                }
            }
        }
        self.changed = true;
    }
}
