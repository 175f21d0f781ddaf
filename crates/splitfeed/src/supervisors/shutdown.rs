// human
//! 🛑 The one-way stop switch.
//!
//! A `CancellationToken` is the broadcast: the lister and every worker hold a clone and
//! each one sees it fire on its own. The atomic state is the guard: only the first
//! `stop()` performs the `Running → Stopping` transition. Every later call logs and
//! returns `false`. There is no way back to `Running`. A new run needs a new controller.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 🚦 Where a run is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Running,
    /// stop requested; the lister has been told, workers are draining
    Stopping,
    /// the lister and every worker have exited
    Stopped,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Stopping,
            _ => Self::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::Stopping => 1,
            Self::Stopped => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShutdownController {
    token: CancellationToken,
    state: Arc<AtomicU8>,
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownController {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            state: Arc::new(AtomicU8::new(PipelineState::Running.as_u8())),
        }
    }

    /// 📡 A clone of the broadcast signal, for whoever needs to watch it.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[cfg(test)]
    pub(crate) fn is_stop_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// 🛑 Request a stop. `true` if this call did it, `false` if someone already had
    /// (or the run already finished on its own).
    pub fn stop(&self) -> bool {
        match self.state.compare_exchange(
            PipelineState::Running.as_u8(),
            PipelineState::Stopping.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                info!("🛑 stop requested. The lister stops listing, the workers start draining.");
                self.token.cancel();
                true
            }
            Err(current) => {
                warn!(
                    "⚠️ stop called on a pipeline that is already {:?}. Ignoring it. Politely.",
                    PipelineState::from_u8(current)
                );
                false
            }
        }
    }

    /// 🏁 Everyone has gone home.
    pub(crate) fn mark_stopped(&self) {
        self.state
            .store(PipelineState::Stopped.as_u8(), Ordering::Release);
    }
}
