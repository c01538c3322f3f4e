use std::fmt;

/// Lifecycle of the sync controller for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    /// No user; the view is empty.
    #[default]
    Idle,
    /// Signed in and online; establishing the remote subscription.
    Attaching,
    /// Remote subscription active.
    Live,
    /// Showing the cached snapshot until connectivity returns.
    CacheFallback,
    /// Signed out or torn down; no subscription.
    Terminated,
}

impl SyncPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Attaching => "attaching",
            Self::Live => "live",
            Self::CacheFallback => "cache-fallback",
            Self::Terminated => "terminated",
        }
    }

    /// Whether remote deliveries are expected in this phase.
    pub const fn is_remote(self) -> bool {
        matches!(self, Self::Attaching | Self::Live)
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
