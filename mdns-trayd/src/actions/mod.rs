pub mod exec;
pub mod template;

use std::collections::HashMap;
use shared::types::ServiceRef;
use thiserror::Error;
use crate::config::Config;
use crate::index::{Host, ServiceInstance};
use self::exec::{CommandLine, Executor};

/// What happened to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Removed,
    /// The user clicked the entity's menu entry
    Activated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Host,
    Service,
}

#[derive(Debug, Clone, Copy)]
pub enum Entity<'a> {
    Host(&'a Host),
    Service(&'a ServiceInstance),
}

impl Entity<'_> {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Host(_) => EntityKind::Host,
            Entity::Service(_) => EntityKind::Service,
        }
    }
}

/// `[event_actions]` key configured for an event on an entity kind
pub fn event_action_key(event: EventKind, entity: EntityKind) -> Option<&'static str> {
    match (event, entity) {
        (EventKind::Created, EntityKind::Service) => Some("on_new_service"),
        (EventKind::Removed, EntityKind::Service) => Some("on_removed_service"),
        (EventKind::Created, EntityKind::Host) => Some("on_new_host"),
        (EventKind::Removed, EntityKind::Host) => Some("on_removed_host"),
        (EventKind::Activated, _) => None,
    }
}

/// Runs the configured action for an event, if any.
pub trait ActionRunner: Send {
    /// Returns whether an action was dispatched
    fn run_action(&mut self, event: EventKind, entity: Entity<'_>) -> bool;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActivationError {
    #[error("unknown service {} ({}) in {}/{}", .0.name, .0.service_type, .0.interface, .0.domain)]
    NotFound(ServiceRef),

    #[error("no action configured for service type {0}")]
    NoAction(String),

    #[error("event loop is not running")]
    Unavailable,
}

/// Action runner driven by the `[service_actions]` and `[event_actions]` tables.
pub struct ConfiguredActions {
    service_actions: HashMap<String, String>,
    event_actions: HashMap<String, String>,
    executor: Box<dyn Executor>,
}

impl ConfiguredActions {
    pub fn new(
        service_actions: HashMap<String, String>,
        event_actions: HashMap<String, String>,
        executor: Box<dyn Executor>,
    ) -> Self {
        Self {
            service_actions,
            event_actions,
            executor,
        }
    }

    pub fn from_config(config: &Config, executor: Box<dyn Executor>) -> Self {
        Self::new(
            config.service_actions.clone(),
            config.event_actions.clone(),
            executor,
        )
    }

    fn template_for(&self, event: EventKind, entity: &Entity<'_>) -> Option<&str> {
        match (event, entity) {
            (EventKind::Activated, Entity::Service(service)) => self
                .service_actions
                .get(service.service_type())
                .map(String::as_str),
            _ => event_action_key(event, entity.kind())
                .and_then(|key| self.event_actions.get(key))
                .map(String::as_str),
        }
    }
}

impl ActionRunner for ConfiguredActions {
    fn run_action(&mut self, event: EventKind, entity: Entity<'_>) -> bool {
        let Some(template) = self.template_for(event, &entity) else {
            tracing::debug!("No action for {:?} on {:?}", event, entity.kind());
            return false;
        };

        let command = match entity {
            Entity::Host(host) => template::expand_host(template, host),
            Entity::Service(service) => template::expand_service(template, service),
        };
        self.executor.spawn(CommandLine::Shell(command));
        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::actions::exec::tests::RecordingExecutor;
    use crate::index::tests::{details, local, RecordingTransport, Recorder};
    use crate::index::DiscoveryIndex;

    /// Action runner that records every call, configured or not
    #[derive(Clone, Default)]
    pub(crate) struct RecordingActions {
        pub calls: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl ActionRunner for RecordingActions {
        fn run_action(&mut self, event: EventKind, entity: Entity<'_>) -> bool {
            let what = match entity {
                Entity::Host(host) => host.fqdn().to_string(),
                Entity::Service(service) => format!("{}@{}", service.name(), service.host_fqdn()),
            };
            self.calls.lock().unwrap().push(format!("{:?} {}", event, what));
            true
        }
    }

    fn actions(executor: &RecordingExecutor) -> ConfiguredActions {
        ConfiguredActions::new(
            HashMap::from([("_http._tcp".to_string(), "xdg-open http://$h:$p/".to_string())]),
            HashMap::from([
                ("on_new_host".to_string(), "echo host $h".to_string()),
                ("on_removed_service".to_string(), "echo gone $n".to_string()),
            ]),
            Box::new(executor.clone()),
        )
    }

    fn index() -> DiscoveryIndex {
        let mut index = DiscoveryIndex::new(Box::new(RecordingTransport::default()));
        let mut rec = Recorder::default();
        index.on_service_added(
            local(),
            "printer".to_string(),
            "_http._tcp".to_string(),
            details("printer.local", 80),
            &mut rec,
        );
        index
    }

    #[test]
    fn test_event_action_table() {
        assert_eq!(event_action_key(EventKind::Created, EntityKind::Host), Some("on_new_host"));
        assert_eq!(event_action_key(EventKind::Removed, EntityKind::Host), Some("on_removed_host"));
        assert_eq!(event_action_key(EventKind::Created, EntityKind::Service), Some("on_new_service"));
        assert_eq!(
            event_action_key(EventKind::Removed, EntityKind::Service),
            Some("on_removed_service")
        );
        assert_eq!(event_action_key(EventKind::Activated, EntityKind::Service), None);
    }

    #[test]
    fn test_configured_actions_dispatch() {
        let executor = RecordingExecutor::default();
        let mut actions = actions(&executor);
        let index = index();
        let service = index.service(&local(), "printer", "_http._tcp").unwrap();
        let host = index.host(&local(), "printer.local").unwrap();

        assert!(actions.run_action(EventKind::Activated, Entity::Service(service)));
        assert!(actions.run_action(EventKind::Created, Entity::Host(host)));
        assert!(actions.run_action(EventKind::Removed, Entity::Service(service)));
        assert!(!actions.run_action(EventKind::Created, Entity::Service(service)));
        assert!(!actions.run_action(EventKind::Activated, Entity::Host(host)));

        assert_eq!(
            executor.take(),
            vec![
                CommandLine::Shell("xdg-open http://printer.local:80/".to_string()),
                CommandLine::Shell("echo host printer.local".to_string()),
                CommandLine::Shell("echo gone printer".to_string()),
            ]
        );
    }
}
