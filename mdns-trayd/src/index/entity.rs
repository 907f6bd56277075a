use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::IpAddr;
use chrono::{DateTime, Utc};
use shared::types::Scope;

/// Key of a service instance within a scope. A name alone is not unique:
/// the same name may be announced for several types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId {
    pub name: String,
    pub service_type: String,
}

impl ServiceId {
    pub fn new(name: impl Into<String>, service_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_type: service_type.into(),
        }
    }
}

/// Address family a service was resolved on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpProtocol {
    V4,
    V6,
    #[default]
    Unspec,
}

impl IpProtocol {
    pub fn of(address: &IpAddr) -> Self {
        match address {
            IpAddr::V4(_) => IpProtocol::V4,
            IpAddr::V6(_) => IpProtocol::V6,
        }
    }
}

/// Result of resolving a browsed instance
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDetails {
    pub fqdn: String,
    pub address: Option<IpAddr>,
    pub port: u16,
    pub protocol: IpProtocol,

    /// TXT records in announcement order; later duplicates win
    pub txt: Vec<(String, String)>,
}

/// Service type record. Kept for the lifetime of the process once seen.
#[derive(Debug, Clone)]
pub struct ServiceType {
    scope: Scope,
    name: String,
    items: BTreeSet<String>,
    /// Whether instances of this type are being browsed
    subscribed: bool,
}

impl ServiceType {
    pub(super) fn new(scope: Scope, name: String) -> Self {
        Self {
            scope,
            name,
            items: BTreeSet::new(),
            subscribed: false,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub(super) fn mark_subscribed(&mut self) {
        self.subscribed = true;
    }

    /// Names of the instances currently known for this type
    pub fn items(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub(super) fn attach(&mut self, name: &str) {
        self.items.insert(name.to_string());
    }

    pub(super) fn detach(&mut self, name: &str) {
        self.items.remove(name);
    }
}

/// A host owns every service instance resolved to its FQDN.
#[derive(Debug, Clone)]
pub struct Host {
    scope: Scope,
    fqdn: String,
    pub(super) services: HashMap<ServiceId, ServiceInstance>,
}

impl Host {
    pub(super) fn new(scope: Scope, fqdn: String) -> Self {
        Self {
            scope,
            fqdn,
            services: HashMap::new(),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn domain(&self) -> &str {
        &self.scope.domain
    }

    pub fn fqdn(&self) -> &str {
        &self.fqdn
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceInstance> {
        self.services.values()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }
}

#[derive(Debug, Clone)]
pub struct ServiceInstance {
    scope: Scope,
    id: ServiceId,
    /// FQDN of the owning host
    host: String,
    address: Option<IpAddr>,
    port: u16,
    protocol: IpProtocol,
    txt: BTreeMap<String, String>,
    discovered_at: DateTime<Utc>,
    refreshed_at: DateTime<Utc>,
}

impl ServiceInstance {
    pub(super) fn new(scope: Scope, id: ServiceId, details: ServiceDetails) -> Self {
        let now = Utc::now();
        Self {
            scope,
            id,
            host: details.fqdn,
            address: details.address,
            port: details.port,
            protocol: details.protocol,
            txt: details.txt.into_iter().collect(),
            discovered_at: now,
            refreshed_at: now,
        }
    }

    /// Overwrite the attributes that may legitimately change on re-announcement
    pub(super) fn refresh(&mut self, details: ServiceDetails) {
        self.address = details.address;
        self.port = details.port;
        self.protocol = details.protocol;
        self.txt = details.txt.into_iter().collect();
        self.refreshed_at = Utc::now();
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn id(&self) -> &ServiceId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn service_type(&self) -> &str {
        &self.id.service_type
    }

    pub fn domain(&self) -> &str {
        &self.scope.domain
    }

    pub fn host_fqdn(&self) -> &str {
        &self.host
    }

    pub fn address(&self) -> Option<IpAddr> {
        self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn protocol(&self) -> IpProtocol {
        self.protocol
    }

    pub fn txt(&self) -> &BTreeMap<String, String> {
        &self.txt
    }

    /// TXT records as `key=value` words (bare `key` when the value is empty)
    pub fn txt_records(&self) -> Vec<String> {
        self.txt
            .iter()
            .map(|(key, value)| {
                if value.is_empty() {
                    key.clone()
                } else {
                    format!("{}={}", key, value)
                }
            })
            .collect()
    }

    pub fn discovered_at(&self) -> DateTime<Utc> {
        self.discovered_at
    }

    pub fn refreshed_at(&self) -> DateTime<Utc> {
        self.refreshed_at
    }
}
