use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use crate::actions::exec::{CommandLine, Executor};
use crate::config::NotificationConfig;

/// Shows short user-facing messages about discovery changes.
pub trait Notifier: Send {
    fn notify(&mut self, text: &str);
}

/// Shared on/off switch, flipped at runtime through the API
#[derive(Debug, Clone, Default)]
pub struct NotificationToggle(Arc<AtomicBool>);

impl NotificationToggle {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
        tracing::info!("Notifications {}", if enabled { "enabled" } else { "disabled" });
    }
}

/// Sends notifications through a desktop command such as `notify-send`,
/// or only logs them when no command is configured.
pub struct DesktopNotifier {
    toggle: NotificationToggle,
    command: Option<String>,
    executor: Box<dyn Executor>,
}

impl DesktopNotifier {
    pub fn new(toggle: NotificationToggle, command: Option<String>, executor: Box<dyn Executor>) -> Self {
        Self {
            toggle,
            command,
            executor,
        }
    }

    pub fn from_config(config: &NotificationConfig, toggle: NotificationToggle, executor: Box<dyn Executor>) -> Self {
        Self::new(toggle, config.command.clone(), executor)
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&mut self, text: &str) {
        if !self.toggle.is_enabled() {
            return;
        }

        tracing::info!(notification = text);
        if let Some(program) = &self.command {
            // The text goes in as a literal argument, never through a shell
            self.executor.spawn(CommandLine::Program {
                program: program.clone(),
                args: vec!["mdns-tray".to_string(), text.to_string()],
            });
        }
    }
}
