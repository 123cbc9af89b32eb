// context.rs — The session state the engine evaluates against.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::path;

/// Session-scoped inputs to every policy evaluation.
///
/// The engine only borrows this. The workflow owns the live instance and is
/// the only component allowed to flip `network_enabled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// The only directory tree write-class tools may touch.
    pub workspace_root: PathBuf,
    /// Runtime network toggle. Off unless the operator turns it on.
    pub network_enabled: bool,
}

impl SessionContext {
    /// Create a context with networking disabled.
    ///
    /// The root is expanded (`~`) and lexically normalized so later prefix
    /// checks compare like with like.
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        let expanded = path::expand_home(&workspace_root.as_ref().to_string_lossy());
        Self {
            workspace_root: path::normalize(&expanded),
            network_enabled: false,
        }
    }

    /// Set the network flag and return self.
    pub fn with_network(mut self, enabled: bool) -> Self {
        self.network_enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_is_off_by_default() {
        let ctx = SessionContext::new("/srv/lndis-workspace");
        assert!(!ctx.network_enabled);
        assert!(ctx.with_network(true).network_enabled);
    }

    #[cfg(unix)]
    #[test]
    fn workspace_root_is_normalized() {
        let ctx = SessionContext::new("/srv/./lndis-workspace/");
        assert_eq!(ctx.workspace_root, PathBuf::from("/srv/lndis-workspace"));
    }
}
