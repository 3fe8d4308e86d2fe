//! Workspace configuration.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Settings the host hands to [`crate::Workspace::connect`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Account whose rows this mirror holds. Stamped onto every
    /// optimistically created row; the remote scopes everything else.
    pub owner: Uuid,

    /// Whether `connect` performs the initial full load. Disabled by
    /// hosts that want to come up instantly and call `resync` themselves.
    #[serde(default = "default_load_on_connect")]
    pub load_on_connect: bool,
}

fn default_load_on_connect() -> bool {
    true
}

impl WorkspaceConfig {
    pub fn new(owner: Uuid) -> Self {
        Self {
            owner,
            load_on_connect: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_on_connect_defaults_to_true_in_json() {
        let config: WorkspaceConfig =
            serde_json::from_str(&format!("{{\"owner\":\"{}\"}}", Uuid::nil())).unwrap();
        assert!(config.load_on_connect);
    }
}
