//! Explicit environment lifecycle
//!
//! The substrate is initialized once and finalized once. [`Lifecycle`] holds
//! that state; [`Environment`] is the owning handle whose drop finalizes it.
//! A finalized lifecycle never returns to the initialized phase.

use crate::{Result, TransportError};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Initialized,
    Finalized,
}

#[derive(Debug)]
pub struct Lifecycle {
    phase: Mutex<Phase>,
}

impl Lifecycle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            phase: Mutex::new(Phase::Uninitialized),
        })
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    /// True once initialization happened, including after finalization
    pub fn is_initialized(&self) -> bool {
        self.phase() != Phase::Uninitialized
    }

    pub fn is_finalized(&self) -> bool {
        self.phase() == Phase::Finalized
    }

    /// Initialized and not yet finalized
    pub fn is_active(&self) -> bool {
        self.phase() == Phase::Initialized
    }

    fn transition(&self, to: Phase) -> Result<()> {
        let mut phase = self.phase.lock();
        match (*phase, to) {
            (Phase::Uninitialized, Phase::Initialized) | (Phase::Initialized, Phase::Finalized) => {
                *phase = to;
                Ok(())
            }
            (Phase::Finalized, _) => Err(TransportError::AlreadyFinalized),
            (Phase::Initialized, Phase::Initialized) => Err(TransportError::AlreadyInitialized),
            (Phase::Uninitialized, _) => Err(TransportError::substrate(
                "finalize",
                crate::ErrorCode::NOT_INITIALIZED,
            )),
            (Phase::Initialized, Phase::Uninitialized) => Err(TransportError::AlreadyInitialized),
        }
    }
}

/// Owning handle of an initialized lifecycle
#[derive(Debug)]
pub struct Environment {
    lifecycle: Arc<Lifecycle>,
}

impl Environment {
    /// Initialize `lifecycle`
    ///
    /// # Errors
    ///
    /// Fails if the lifecycle was initialized or finalized before.
    pub fn initialize(lifecycle: Arc<Lifecycle>) -> Result<Self> {
        lifecycle.transition(Phase::Initialized)?;
        debug!("transport environment initialized");
        Ok(Self { lifecycle })
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Finalize now instead of on drop
    pub fn finalize(self) -> Result<()> {
        let result = self.lifecycle.transition(Phase::Finalized);
        debug!("transport environment finalized");
        result
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        if self.lifecycle.is_active() {
            let _ = self.lifecycle.transition(Phase::Finalized);
        }
    }
}
