//! Server lifecycle: `Starting -> Serving -> Draining -> Stopped`.
//!
//! Transitions only move forward. The drain token fires once, on the first
//! transition into `Draining`, and every component that must stop taking new
//! work watches it. Responses are only written while the state is not
//! `Stopped` and the peer is still reachable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::types::{McpError, McpResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Starting,
    Serving,
    Draining,
    Stopped,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Serving => "serving",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// What started the drain. Decides the grace period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainReason {
    /// The client closed the input stream. No grace period.
    StreamClosed,
    /// SIGINT or SIGTERM.
    Signal,
    /// The client sent `shutdown`.
    ShutdownRequest,
    /// Reading or writing the transport failed. No grace period.
    TransportFailed,
}

impl DrainReason {
    pub fn is_graceful(self) -> bool {
        matches!(self, DrainReason::Signal | DrainReason::ShutdownRequest)
    }
}

/// Shared lifecycle controller.
#[derive(Debug)]
pub struct Lifecycle {
    state: watch::Sender<LifecycleState>,
    drain: CancellationToken,
    stopped: CancellationToken,
    reason: OnceLock<DrainReason>,
    peer_open: AtomicBool,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Starting);
        Self {
            state,
            drain: CancellationToken::new(),
            stopped: CancellationToken::new(),
            reason: OnceLock::new(),
            peer_open: AtomicBool::new(true),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// `Starting -> Serving`.
    pub fn begin_serving(&self) -> McpResult<()> {
        let mut from = LifecycleState::Starting;
        let moved = self.state.send_if_modified(|state| {
            from = *state;
            if *state == LifecycleState::Starting {
                *state = LifecycleState::Serving;
                true
            } else {
                false
            }
        });
        if !moved {
            return Err(McpError::InternalError(format!(
                "Cannot start serving from state {from}"
            )));
        }
        tracing::info!("Lifecycle: serving");
        Ok(())
    }

    /// `Serving -> Draining`. Returns `false` when a drain was already under
    /// way, in which case the first reason stands.
    pub fn begin_drain(&self, reason: DrainReason) -> bool {
        let moved = self.state.send_if_modified(|state| {
            if *state == LifecycleState::Serving {
                *state = LifecycleState::Draining;
                true
            } else {
                false
            }
        });
        if moved {
            let _ = self.reason.set(reason);
            tracing::info!(?reason, "Lifecycle: draining");
            self.drain.cancel();
        }
        moved
    }

    /// Move to `Stopped` from any state.
    pub fn stop(&self) {
        let changed = self.state.send_if_modified(|state| {
            if *state == LifecycleState::Stopped {
                false
            } else {
                *state = LifecycleState::Stopped;
                true
            }
        });
        if changed {
            tracing::info!("Lifecycle: stopped");
        }
        self.drain.cancel();
        self.stopped.cancel();
    }

    pub fn drain_reason(&self) -> Option<DrainReason> {
        self.reason.get().copied()
    }

    /// New requests are only dispatched while serving.
    pub fn is_accepting(&self) -> bool {
        self.state() == LifecycleState::Serving
    }

    /// Whether a response produced now may still be written.
    pub fn can_emit(&self) -> bool {
        self.state() != LifecycleState::Stopped && self.peer_open.load(Ordering::Acquire)
    }

    /// Mark the output side unreachable. Responses are discarded from now on.
    pub fn close_peer(&self) {
        self.peer_open.store(false, Ordering::Release);
    }

    /// Fires once draining (or stopping) begins.
    pub fn drain_token(&self) -> CancellationToken {
        self.drain.clone()
    }

    /// Fires once stopped.
    pub fn stopped_token(&self) -> CancellationToken {
        self.stopped.clone()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
