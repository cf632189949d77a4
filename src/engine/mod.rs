//! Controller engine: mirror refresh, admission, status polling, and the
//! loops that drive them.

/// Log a diagnostic at `info` when verbose logging is on, else at `debug`.
macro_rules! diag {
    ($verbosity:expr, $($arg:tt)+) => {
        if $verbosity.is_enabled() {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

pub mod admission;
pub mod budget;
pub mod mirror;
pub mod poller;
pub mod scheduler;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub use admission::{AdmissionController, DispatchOutcome, SkipReason};
pub use budget::{ActiveSet, BudgetPolicy, select_active};
pub use mirror::LocalJobMirror;
pub use poller::{PollReport, StatusPoller};
pub use scheduler::{Collaborators, Controller, ControllerConfig, ControllerHandle};

/// Shared verbose-diagnostics switch.
///
/// Cloned into every component so one toggle flips all of them.
#[derive(Debug, Clone, Default)]
pub struct Verbosity(Arc<AtomicBool>);

impl Verbosity {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
    }

    /// Flip the switch, returning the new value.
    pub fn toggle(&self) -> bool {
        !self.0.fetch_xor(true, Ordering::Relaxed)
    }
}
