use sha2::{Digest, Sha256};
use shared::types::MenuSnapshot;

/// SHA-256 over the snapshot's JSON form. Snapshots are built from ordered
/// maps, so equal menus always hash equally.
pub fn compute_hash(menu: &MenuSnapshot) -> String {
    let json = match serde_json::to_vec(menu) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to serialize menu for hashing: {}", e);
            Vec::new()
        }
    };

    let hash = Sha256::digest(&json);
    hex::encode(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::types::{HostMenu, MenuEntry, ServiceRef};

    fn menu(port_title: &str) -> MenuSnapshot {
        MenuSnapshot {
            hosts: vec![HostMenu {
                interface: "*".to_string(),
                domain: "local".to_string(),
                fqdn: "nas.local".to_string(),
                entries: vec![MenuEntry {
                    title: port_title.to_string(),
                    target: ServiceRef {
                        interface: "*".to_string(),
                        domain: "local".to_string(),
                        name: "nas".to_string(),
                        service_type: "_smb._tcp".to_string(),
                    },
                }],
            }],
            service_types: Vec::new(),
        }
    }

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(compute_hash(&menu("nas (smb,tcp)")), compute_hash(&menu("nas (smb,tcp)")));
    }

    #[test]
    fn test_hash_changes_on_modification() {
        assert_ne!(compute_hash(&menu("nas (smb,tcp)")), compute_hash(&menu("nas (Files)")));
        assert_ne!(compute_hash(&menu("nas (smb,tcp)")), compute_hash(&MenuSnapshot::default()));
    }
}
