use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::Future;
use anyhow::Result;
use shared::protocol::{instance_name, normalize_host, split_service_type, DEFAULT_DOMAIN, META_QUERY_TYPE};
use shared::types::Scope;
use crate::index::{DiscoveryEvent, IpProtocol, ResolveError, ServiceDetails, Transport};

/// Requests from the index to the browser task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseCommand {
    ServiceTypes(Scope),
    Services { scope: Scope, service_type: String },
    Resolve { scope: Scope, name: String, service_type: String },
}

/// [`Transport`] handed to the index; forwards requests to [`run_browser`].
#[derive(Debug, Clone)]
pub struct MdnsTransport {
    tx: mpsc::UnboundedSender<BrowseCommand>,
}

impl MdnsTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BrowseCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, command: BrowseCommand) {
        if let Err(e) = self.tx.send(command) {
            tracing::debug!("Browser is gone, dropping {:?}", e.0);
        }
    }
}

impl Transport for MdnsTransport {
    fn subscribe_service_types(&self, scope: &Scope) {
        self.send(BrowseCommand::ServiceTypes(scope.clone()));
    }

    fn subscribe_services(&self, scope: &Scope, service_type: &str) {
        self.send(BrowseCommand::Services {
            scope: scope.clone(),
            service_type: service_type.to_string(),
        });
    }

    fn resolve(&self, scope: &Scope, name: &str, service_type: &str) {
        self.send(BrowseCommand::Resolve {
            scope: scope.clone(),
            name: name.to_string(),
            service_type: service_type.to_string(),
        });
    }
}

/// What a browse receiver was opened for
#[derive(Debug, Clone, PartialEq, Eq)]
enum Subscription {
    Types(Scope),
    Services { scope: Scope, service_type: String },
}

type InstanceKey = (Scope, String, String);

/// Browser bookkeeping, kept apart from the daemon so it can be driven directly.
struct BrowserState {
    interface: String,
    resolve_timeout: Duration,
    next_idx: usize,
    subscriptions: HashMap<usize, Subscription>,
    /// Resolutions requested but not yet seen, with their deadline
    pending: HashMap<InstanceKey, Instant>,
    /// Instances resolved and not removed since
    resolved: HashSet<InstanceKey>,
}

impl BrowserState {
    fn new(interface: String, resolve_timeout: Duration) -> Self {
        Self {
            interface,
            resolve_timeout,
            next_idx: 0,
            subscriptions: HashMap::new(),
            pending: HashMap::new(),
            resolved: HashSet::new(),
        }
    }

    fn domain_events(&self, domains: &[String]) -> Vec<DiscoveryEvent> {
        domains
            .iter()
            .map(|domain| DiscoveryEvent::DomainDiscovered(Scope::new(self.interface.clone(), domain.clone())))
            .collect()
    }

    /// Register a subscription; returns its id and the mDNS type to browse,
    /// or None when the domain cannot be browsed.
    fn subscribe(&mut self, subscription: Subscription) -> Option<(usize, String)> {
        let browse_type = match &subscription {
            Subscription::Types(scope) => {
                if scope.domain != DEFAULT_DOMAIN {
                    tracing::warn!("Cannot browse service types of domain {}: only {} is supported", scope.domain, DEFAULT_DOMAIN);
                    return None;
                }
                META_QUERY_TYPE.to_string()
            }
            Subscription::Services { scope, service_type } => {
                if scope.domain != DEFAULT_DOMAIN {
                    tracing::warn!("Cannot browse {} in domain {}", service_type, scope.domain);
                    return None;
                }
                format!("{}.{}.", service_type, scope.domain)
            }
        };

        let idx = self.next_idx;
        self.next_idx += 1;
        self.subscriptions.insert(idx, subscription);
        Some((idx, browse_type))
    }

    /// Drop a subscription; resolutions still waiting on it fail.
    fn forget(&mut self, idx: usize, reason: &str) -> Vec<DiscoveryEvent> {
        let Some(Subscription::Services { scope, service_type }) = self.subscriptions.remove(&idx) else {
            return Vec::new();
        };

        self.resolved.retain(|(s, _, t)| *s != scope || *t != service_type);

        let orphaned: Vec<InstanceKey> = self
            .pending
            .keys()
            .filter(|(s, _, t)| *s == scope && *t == service_type)
            .cloned()
            .collect();

        orphaned
            .into_iter()
            .map(|key| {
                self.pending.remove(&key);
                let (scope, name, service_type) = key;
                DiscoveryEvent::ResolveFailed {
                    scope,
                    name,
                    service_type,
                    error: ResolveError::Transport(reason.to_string()),
                }
            })
            .collect()
    }

    fn request_resolve(&mut self, scope: Scope, name: String, service_type: String, now: Instant) {
        let key = (scope, name, service_type);
        if self.resolved.contains(&key) {
            return;
        }
        self.pending.entry(key).or_insert(now + self.resolve_timeout);
    }

    /// Translate one mdns-sd event from subscription `idx`
    fn handle_event(&mut self, idx: usize, event: ServiceEvent) -> Option<DiscoveryEvent> {
        let subscription = self.subscriptions.get(&idx)?.clone();

        match (subscription, event) {
            (Subscription::Types(scope), ServiceEvent::ServiceFound(_, fullname)) => {
                let (service_type, _) = split_service_type(&fullname);
                Some(DiscoveryEvent::ServiceTypeDiscovered { scope, service_type })
            }
            (Subscription::Services { scope, service_type }, ServiceEvent::ServiceFound(ty, fullname)) => {
                let name = instance_name(&fullname, &ty);
                Some(DiscoveryEvent::ServiceFound { scope, name, service_type })
            }
            (Subscription::Services { scope, service_type }, ServiceEvent::ServiceResolved(info)) => {
                let name = instance_name(info.get_fullname(), info.get_type());
                let key = (scope, name, service_type);
                self.pending.remove(&key);
                self.resolved.insert(key.clone());
                let (scope, name, service_type) = key;
                Some(DiscoveryEvent::ServiceResolved {
                    scope,
                    name,
                    service_type,
                    details: convert_service_info(&info),
                })
            }
            (Subscription::Services { scope, service_type }, ServiceEvent::ServiceRemoved(ty, fullname)) => {
                let name = instance_name(&fullname, &ty);
                let key = (scope, name, service_type);
                self.pending.remove(&key);
                self.resolved.remove(&key);
                let (scope, name, service_type) = key;
                Some(DiscoveryEvent::ServiceRemoved { scope, name, service_type })
            }
            _ => None,
        }
    }

    /// Report resolutions whose deadline has passed
    fn expire(&mut self, now: Instant) -> Vec<DiscoveryEvent> {
        let expired: Vec<InstanceKey> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();

        expired
            .into_iter()
            .map(|key| {
                self.pending.remove(&key);
                let (scope, name, service_type) = key;
                DiscoveryEvent::ResolveFailed {
                    scope,
                    name,
                    service_type,
                    error: ResolveError::Timeout(self.resolve_timeout),
                }
            })
            .collect()
    }
}

type RecvResult = (usize, flume::Receiver<ServiceEvent>, std::result::Result<ServiceEvent, flume::RecvError>);
type RecvFuture = Pin<Box<dyn Future<Output = RecvResult> + Send>>;

/// Each future owns a clone of the receiver, avoiding borrow issues with the
/// receivers vec. flume::Receiver is Clone (multi-consumer).
fn make_recv_future(idx: usize, rx: flume::Receiver<ServiceEvent>) -> RecvFuture {
    Box::pin(async move {
        let result = rx.recv_async().await;
        (idx, rx, result)
    })
}

pub struct BrowserSettings {
    /// Interface id stamped on every scope
    pub interface: String,
    pub domains: Vec<String>,
    pub resolve_timeout: Duration,
}

pub async fn run_browser(
    daemon: ServiceDaemon,
    settings: BrowserSettings,
    mut commands: mpsc::UnboundedReceiver<BrowseCommand>,
    tx: mpsc::Sender<DiscoveryEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    tracing::info!("Starting mDNS browser");

    let mut state = BrowserState::new(settings.interface, settings.resolve_timeout);
    let mut receivers: FuturesUnordered<RecvFuture> = FuturesUnordered::new();
    let mut expiry = tokio::time::interval(Duration::from_secs(1));

    for event in state.domain_events(&settings.domains) {
        if let Err(e) = tx.send(event).await {
            tracing::error!("Failed to send domain event: {}", e);
        }
    }

    loop {
        tokio::select! {
            Some(command) = commands.recv() => {
                let subscription = match command {
                    BrowseCommand::ServiceTypes(scope) => Subscription::Types(scope),
                    BrowseCommand::Services { scope, service_type } => {
                        Subscription::Services { scope, service_type }
                    }
                    BrowseCommand::Resolve { scope, name, service_type } => {
                        state.request_resolve(scope, name, service_type, Instant::now());
                        continue;
                    }
                };

                if let Some((idx, browse_type)) = state.subscribe(subscription) {
                    match daemon.browse(&browse_type) {
                        Ok(receiver) => {
                            tracing::debug!("Browsing {}", browse_type);
                            receivers.push(make_recv_future(idx, receiver));
                        }
                        Err(e) => {
                            tracing::error!("Failed to browse {}: {}", browse_type, e);
                            for event in state.forget(idx, "browse failed") {
                                if let Err(e) = tx.send(event).await {
                                    tracing::error!("Failed to send resolve failure: {}", e);
                                }
                            }
                        }
                    }
                }
            }

            Some((idx, rx, result)) = receivers.next() => {
                match result {
                    Ok(event) => {
                        if let Some(event) = state.handle_event(idx, event) {
                            if let Err(e) = tx.send(event).await {
                                tracing::error!("Failed to send discovery event: {}", e);
                            }
                        }
                        receivers.push(make_recv_future(idx, rx));
                    }
                    Err(e) => {
                        tracing::warn!("Receiver {} disconnected: {}", idx, e);
                        for event in state.forget(idx, "browse receiver disconnected") {
                            if let Err(e) = tx.send(event).await {
                                tracing::error!("Failed to send resolve failure: {}", e);
                            }
                        }
                    }
                }
            }

            _ = expiry.tick() => {
                for event in state.expire(Instant::now()) {
                    if let Err(e) = tx.send(event).await {
                        tracing::error!("Failed to send resolve failure: {}", e);
                    }
                }
            }

            _ = cancel.cancelled() => {
                tracing::info!("mDNS browser shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Convert an mdns-sd ServiceInfo to resolved service details
fn convert_service_info(info: &ServiceInfo) -> ServiceDetails {
    // Prefer IPv4, then the lowest address for a stable choice
    let mut addresses: Vec<IpAddr> = info.get_addresses().iter().copied().collect();
    addresses.sort_by_key(|addr| (addr.is_ipv6(), *addr));
    let address = addresses.first().copied();

    let txt: Vec<(String, String)> = info
        .get_properties()
        .iter()
        .map(|prop| (prop.key().to_string(), prop.val_str().to_string()))
        .collect();

    ServiceDetails {
        fqdn: normalize_host(info.get_hostname()),
        address,
        port: info.get_port(),
        protocol: address.as_ref().map(IpProtocol::of).unwrap_or_default(),
        txt,
    }
}
