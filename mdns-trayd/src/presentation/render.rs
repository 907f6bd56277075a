use serde::Serialize;
use shared::types::MenuSnapshot;
use tokio::sync::watch;
use super::hash::compute_hash;

/// Draws the menu. Called once per quiet period, with the full snapshot.
pub trait Renderer: Send {
    fn render(&mut self, menu: &MenuSnapshot);
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishedMenu {
    pub hash: String,
    pub menu: MenuSnapshot,
}

/// Publishes snapshots to watchers (the API), skipping unchanged menus.
pub struct SnapshotPublisher {
    tx: watch::Sender<PublishedMenu>,
}

impl SnapshotPublisher {
    pub fn new() -> (Self, watch::Receiver<PublishedMenu>) {
        let empty = MenuSnapshot::default();
        let initial = PublishedMenu {
            hash: compute_hash(&empty),
            menu: empty,
        };
        let (tx, rx) = watch::channel(initial);
        (Self { tx }, rx)
    }
}

impl Renderer for SnapshotPublisher {
    fn render(&mut self, menu: &MenuSnapshot) {
        let hash = compute_hash(menu);
        let changed = self.tx.send_if_modified(|current| {
            if current.hash == hash {
                return false;
            }
            *current = PublishedMenu {
                hash: hash.clone(),
                menu: menu.clone(),
            };
            true
        });

        if changed {
            tracing::debug!(
                hosts = menu.hosts.len(),
                service_types = menu.service_types.len(),
                "Menu updated ({})",
                hash
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::types::ServiceTypeMenu;

    #[test]
    fn test_publisher_skips_unchanged_menus() {
        let (mut publisher, mut rx) = SnapshotPublisher::new();

        publisher.render(&MenuSnapshot::default());
        assert!(!rx.has_changed().unwrap());

        let menu = MenuSnapshot {
            hosts: Vec::new(),
            service_types: vec![ServiceTypeMenu {
                service_type: "_ssh._tcp".to_string(),
                title: "ssh (tcp)".to_string(),
                entries: Vec::new(),
            }],
        };
        publisher.render(&menu);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().menu, menu);

        publisher.render(&menu);
        assert!(!rx.has_changed().unwrap());
    }
}
