//! One-shot readiness of the embedded editing surface.
//!
//! The surface bootstraps asynchronously. Until it reports in, nothing may
//! touch it or the store. The gate flips exactly once; late subscribers see
//! the flipped state immediately.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    NotReady,
    Ready,
}

/// Tracks whether the editing surface finished initializing.
///
/// Cheap to clone; clones share the same state.
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// A gate that starts out ready. Used by hosts without async bootstrap.
    pub fn ready() -> Self {
        let gate = Self::new();
        gate.mark_ready();
        gate
    }

    /// Handle for the bootstrap code to fire once the surface is up.
    pub fn signal(&self) -> ReadySignal {
        ReadySignal {
            tx: self.tx.clone(),
        }
    }

    /// Transition to ready. Returns `true` only for the call that flipped it.
    pub fn mark_ready(&self) -> bool {
        mark(&self.tx)
    }

    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn state(&self) -> ReadinessState {
        if self.is_ready() {
            ReadinessState::Ready
        } else {
            ReadinessState::NotReady
        }
    }

    /// Resolves once the gate is ready, immediately if it already is.
    pub async fn wait_ready(&self) {
        let mut rx = self.tx.subscribe();
        if rx.wait_for(|ready| *ready).await.is_err() {
            // Unreachable while `self` holds the sender.
            tracing::debug!("readiness sender dropped before ready");
        }
    }
}

/// Bootstrap-side handle of a [`ReadinessGate`].
#[derive(Debug, Clone)]
pub struct ReadySignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ReadySignal {
    /// Report the surface as ready. Idempotent.
    pub fn fire(&self) -> bool {
        mark(&self.tx)
    }
}

fn mark(tx: &watch::Sender<bool>) -> bool {
    let flipped = tx.send_if_modified(|ready| {
        if *ready {
            false
        } else {
            *ready = true;
            true
        }
    });
    if flipped {
        tracing::debug!("editing surface ready");
    }
    flipped
}
