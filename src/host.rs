//! Host environment signals: foreground activity, queue settings, identity.

use std::sync::atomic::{AtomicBool, Ordering};

/// Whether the hosting client is in the foreground.
pub trait ActivityOracle: Send + Sync {
    fn is_foreground(&self) -> bool;
}

/// User-controlled and storage-driven admission switches.
pub trait QueueSettings: Send + Sync {
    fn is_queue_paused(&self) -> bool;
    fn storage_quota_exceeded(&self) -> bool;
}

/// Caller identity. Selects the concurrency budget tier.
pub trait Identity: Send + Sync {
    fn is_authenticated(&self) -> bool;
}

/// Mutable host signals shared between the host and the controller.
///
/// Starts foreground, unpaused, under quota and anonymous.
#[derive(Debug)]
pub struct HostState {
    foreground: AtomicBool,
    paused: AtomicBool,
    quota_exceeded: AtomicBool,
    authenticated: AtomicBool,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            foreground: AtomicBool::new(true),
            paused: AtomicBool::new(false),
            quota_exceeded: AtomicBool::new(false),
            authenticated: AtomicBool::new(false),
        }
    }
}

impl HostState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_foreground(&self, foreground: bool) {
        self.foreground.store(foreground, Ordering::SeqCst);
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub fn set_quota_exceeded(&self, exceeded: bool) {
        self.quota_exceeded.store(exceeded, Ordering::SeqCst);
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.store(authenticated, Ordering::SeqCst);
    }
}

impl ActivityOracle for HostState {
    fn is_foreground(&self) -> bool {
        self.foreground.load(Ordering::SeqCst)
    }
}

impl QueueSettings for HostState {
    fn is_queue_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn storage_quota_exceeded(&self) -> bool {
        self.quota_exceeded.load(Ordering::SeqCst)
    }
}

impl Identity for HostState {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }
}
