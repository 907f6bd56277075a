use serde::{Deserialize, Serialize};

/// A browsing context: discovery results are partitioned per interface and domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    /// Interface the results were seen on, or `"*"` when not bound
    pub interface: String,

    /// Browse domain, e.g. "local"
    pub domain: String,
}

impl Scope {
    pub fn new(interface: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            domain: domain.into(),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.interface, self.domain)
    }
}

/// Identifies one service instance for a click action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceRef {
    pub interface: String,
    pub domain: String,

    /// Instance name, e.g. "printer"
    pub name: String,

    /// Service type, e.g. "_http._tcp"
    pub service_type: String,
}

impl ServiceRef {
    pub fn scope(&self) -> Scope {
        Scope::new(self.interface.clone(), self.domain.clone())
    }
}

/// One clickable entry in a submenu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub title: String,
    pub target: ServiceRef,
}

/// Submenu listing the services of one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostMenu {
    pub interface: String,
    pub domain: String,
    pub fqdn: String,
    pub entries: Vec<MenuEntry>,
}

/// Submenu listing the instances of one service type, across all scopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTypeMenu {
    pub service_type: String,
    pub title: String,
    pub entries: Vec<MenuEntry>,
}

/// The rendered menu: the by-host and by-type views.
/// This is what the daemon publishes and what clients display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuSnapshot {
    pub hosts: Vec<HostMenu>,
    pub service_types: Vec<ServiceTypeMenu>,
}
