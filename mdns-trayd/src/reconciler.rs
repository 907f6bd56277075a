use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use anyhow::Result;
use shared::types::ServiceRef;
use crate::actions::ActivationError;
use crate::index::{DiscoveryEvent, DiscoveryIndex};
use crate::presentation::debounce::Debouncer;
use crate::presentation::render::Renderer;
use crate::presentation::PresentationSync;

/// Commands sent to the event loop by the user-facing side
pub enum UiCommand {
    Activate(ServiceRef, oneshot::Sender<Result<(), ActivationError>>),
}

/// Handle to interact with the running event loop
#[derive(Clone)]
pub struct ReconcilerHandle {
    tx: mpsc::Sender<UiCommand>,
}

impl ReconcilerHandle {
    pub fn new() -> (Self, mpsc::Receiver<UiCommand>) {
        let (tx, rx) = mpsc::channel(64);
        (Self { tx }, rx)
    }

    /// Run the click action of a service
    pub async fn activate(&self, target: ServiceRef) -> Result<(), ActivationError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(UiCommand::Activate(target, reply))
            .await
            .map_err(|_| ActivationError::Unavailable)?;
        rx.await.map_err(|_| ActivationError::Unavailable)?
    }
}

/// Owns the index and the view-model; every event is applied to completion
/// before the next one is looked at.
pub struct Reconciler {
    index: DiscoveryIndex,
    sync: PresentationSync,
    renderer: Box<dyn Renderer>,
    debounce: Debouncer,
}

impl Reconciler {
    pub fn new(index: DiscoveryIndex, sync: PresentationSync, renderer: Box<dyn Renderer>, debounce: Debouncer) -> Self {
        Self {
            index,
            sync,
            renderer,
            debounce,
        }
    }

    pub fn handle_event(&mut self, event: DiscoveryEvent) {
        self.index.apply(event, &mut self.sync);
        if self.sync.take_changed() {
            self.debounce.restart();
        }
    }

    pub fn handle_command(&mut self, command: UiCommand) {
        match command {
            UiCommand::Activate(target, reply) => {
                let result = self.sync.activate(&self.index, &target);
                if let Err(e) = &result {
                    tracing::info!("Activation failed: {}", e);
                }
                let _ = reply.send(result);
            }
        }
    }

    fn render(&mut self) {
        tracing::debug!(
            hosts = self.index.hosts().count(),
            services = self.index.services().count(),
            "Rendering menu"
        );
        let menu = self.sync.snapshot();
        self.renderer.render(&menu);
    }

    /// Event loop - bridges discovery events and user commands to the index
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<DiscoveryEvent>,
        mut commands: mpsc::Receiver<UiCommand>,
        cancel: CancellationToken,
    ) -> Result<()> {
        loop {
            tokio::select! {
                Some(event) = events.recv() => {
                    self.handle_event(event);
                }
                Some(command) = commands.recv() => {
                    self.handle_command(command);
                }
                _ = self.debounce.fired() => {
                    self.render();
                }
                _ = cancel.cancelled() => {
                    if self.debounce.is_pending() {
                        tracing::debug!("Dropping pending render");
                    }
                    self.debounce.cancel();
                    tracing::info!("Reconciler shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use shared::types::MenuSnapshot;
    use crate::actions::tests::RecordingActions;
    use crate::index::tests::{details, local, RecordingTransport};
    use crate::index::ResolveError;
    use crate::notify::tests::RecordingNotifier;

    #[derive(Clone, Default)]
    struct RecordingRenderer {
        menus: Arc<Mutex<Vec<MenuSnapshot>>>,
    }

    impl Renderer for RecordingRenderer {
        fn render(&mut self, menu: &MenuSnapshot) {
            self.menus.lock().unwrap().push(menu.clone());
        }
    }

    struct Harness {
        events: mpsc::Sender<DiscoveryEvent>,
        handle: ReconcilerHandle,
        renders: Arc<Mutex<Vec<MenuSnapshot>>>,
        actions: RecordingActions,
        notes: RecordingNotifier,
        cancel: CancellationToken,
        task: tokio::task::JoinHandle<Result<()>>,
    }

    fn start() -> Harness {
        let actions = RecordingActions::default();
        let notes = RecordingNotifier::default();
        let renderer = RecordingRenderer::default();
        let renders = renderer.menus.clone();

        let index = DiscoveryIndex::new(Box::new(RecordingTransport::default()));
        let sync = PresentationSync::new(HashMap::new(), Box::new(actions.clone()), Box::new(notes.clone()));
        let reconciler = Reconciler::new(index, sync, Box::new(renderer), Debouncer::new(Duration::from_secs(1)));

        let (events, events_rx) = mpsc::channel(16);
        let (handle, commands_rx) = ReconcilerHandle::new();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(reconciler.run(events_rx, commands_rx, cancel.clone()));

        Harness {
            events,
            handle,
            renders,
            actions,
            notes,
            cancel,
            task,
        }
    }

    fn resolved(name: &str, ty: &str, fqdn: &str) -> DiscoveryEvent {
        DiscoveryEvent::ServiceResolved {
            scope: local(),
            name: name.to_string(),
            service_type: ty.to_string(),
            details: details(fqdn, 80),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_renders_once_but_acts_per_service() {
        let h = start();

        h.events.send(resolved("web", "_http._tcp", "nas.local")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        h.events.send(resolved("files", "_smb._tcp", "nas.local")).await.unwrap();

        // Side effects are immediate, before any render
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.actions.calls.lock().unwrap().len(), 3);
        assert_eq!(h.notes.texts.lock().unwrap().len(), 3);
        assert!(h.renders.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(3)).await;
        {
            let renders = h.renders.lock().unwrap();
            assert_eq!(renders.len(), 1);
            assert_eq!(renders[0].hosts.len(), 1);
            assert_eq!(renders[0].hosts[0].entries.len(), 2);
        }

        h.events
            .send(DiscoveryEvent::ServiceRemoved {
                scope: local(),
                name: "web".to_string(),
                service_type: "_http._tcp".to_string(),
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(h.renders.lock().unwrap().len(), 2);

        h.cancel.cancel();
        h.task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_without_changes_do_not_render() {
        let h = start();

        h.events
            .send(DiscoveryEvent::ServiceRemoved {
                scope: local(),
                name: "ghost".to_string(),
                service_type: "_http._tcp".to_string(),
            })
            .await
            .unwrap();
        h.events
            .send(DiscoveryEvent::ResolveFailed {
                scope: local(),
                name: "ghost".to_string(),
                service_type: "_http._tcp".to_string(),
                error: ResolveError::Transport("daemon gone".to_string()),
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(h.renders.lock().unwrap().is_empty());
        assert!(h.actions.calls.lock().unwrap().is_empty());

        h.cancel.cancel();
        h.task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_through_handle() {
        let h = start();
        h.events.send(resolved("web", "_http._tcp", "nas.local")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let target = ServiceRef {
            interface: "*".to_string(),
            domain: "local".to_string(),
            name: "web".to_string(),
            service_type: "_http._tcp".to_string(),
        };
        h.handle.activate(target.clone()).await.unwrap();
        assert_eq!(
            h.actions.calls.lock().unwrap().last().map(String::as_str),
            Some("Activated web@nas.local")
        );

        h.cancel.cancel();
        h.task.await.unwrap().unwrap();

        assert_eq!(h.handle.activate(target).await, Err(ActivationError::Unavailable));
    }
}
