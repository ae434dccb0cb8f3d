use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;

/// Exit status used when the user interrupts a run.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Shared flag checked at every collaborator call boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Install the Ctrl+C / SIGTERM handler.
///
/// The first signal cancels `token` so the run can stop at the next call
/// boundary and clean its scratch directory. A second signal exits at once.
pub fn install_signal_handler(token: &CancelToken) -> Result<()> {
    let token = token.clone();
    let signals = AtomicUsize::new(0);
    ctrlc::set_handler(move || {
        if signals.fetch_add(1, Ordering::SeqCst) == 0 {
            tracing::warn!("Interrupt received, stopping after cleanup (press again to force)");
            token.cancel();
        } else {
            eprintln!("Forced exit");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    })?;
    Ok(())
}
