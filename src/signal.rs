//! SIGINT handling for the sampling loop.
//!
//! The loop must notice Ctrl+C between ticks without blocking, so the
//! handler only flips an atomic flag. Cleanup of child processes happens
//! in the loop itself once the flag is observed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{BenchtraceError, Result};

/// Non-blocking view of whether SIGINT has been received.
///
/// Cloning is cheap; all clones observe the same flag.
#[derive(Clone)]
pub struct Interrupt {
    raised: Arc<AtomicBool>,
}

impl Interrupt {
    /// Registers the process-wide SIGINT handler and returns a handle.
    ///
    /// `ctrlc` only allows one handler per process, so this should be
    /// called once, early in `run`.
    pub fn install() -> Result<Self> {
        let raised = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&raised);

        ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        })
        .map_err(|e| BenchtraceError::SignalHandler(e.to_string()))?;

        Ok(Self { raised })
    }

    /// True once SIGINT has been received.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn stub() -> (Self, Arc<AtomicBool>) {
        let raised = Arc::new(AtomicBool::new(false));
        (
            Self {
                raised: Arc::clone(&raised),
            },
            raised,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_lowered() {
        let (interrupt, _flag) = Interrupt::stub();
        assert!(!interrupt.is_raised());
    }

    #[test]
    fn observes_flag_across_clones() {
        let (interrupt, flag) = Interrupt::stub();
        let clone = interrupt.clone();

        flag.store(true, Ordering::SeqCst);

        assert!(interrupt.is_raised());
        assert!(clone.is_raised());
    }
}
