//! Connectivity flag shared by the sync controller and the mutation gateway

use std::sync::Arc;

use tokio::sync::watch;

/// Observable online/offline state.
///
/// Cloning yields another handle onto the same flag.
#[derive(Debug, Clone)]
pub struct Connectivity {
    state: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (state, _) = watch::channel(online);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn online() -> Self {
        Self::new(true)
    }

    pub fn offline() -> Self {
        Self::new(false)
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Update the flag. Returns true when the value actually changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!(online, "Connectivity changed");
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::online()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let connectivity = Connectivity::online();
        let other = connectivity.clone();

        assert!(other.set_online(false));
        assert!(!connectivity.is_online());
        assert!(!other.set_online(false));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn subscribers_see_changes() {
        let connectivity = Connectivity::offline();
        let mut receiver = connectivity.subscribe();

        connectivity.set_online(true);

        receiver.changed().await.unwrap();
        assert!(*receiver.borrow());
    }
}
