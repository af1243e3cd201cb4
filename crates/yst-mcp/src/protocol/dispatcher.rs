//! Tool call dispatch with a concurrency bound.
//!
//! Each accepted call becomes a tracked task. The task waits (FIFO) for one of
//! `max_concurrency` permits, then runs the handler in its own spawned task so
//! that a panic is caught at the join and turned into an `InternalError` for
//! that request alone. The permit moves into the handler task and is released
//! only when the handler finishes or is aborted.
//!
//! A request still waiting for a permit when the drain starts is answered with
//! `ServerShuttingDown` and never reaches its handler.
//!
//! At most `max_concurrency + max_queued` calls are accepted at once. Past
//! that, [`Dispatcher::dispatch`] waits for a slot, which holds up the reader
//! and pushes back on the client instead of growing the queue.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::DEFAULT_MAX_QUEUED;
use crate::session::{Lifecycle, ToolContext};
use crate::tools::CapabilityRegistry;
use crate::transport::OutboundSink;
use crate::types::{McpError, RequestId, ToolCallParams};

use super::validator::validate_arguments;

type InFlight = HashMap<u64, (RequestId, CancellationToken)>;

/// Routes `tools/call` requests to registered handlers.
pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
    context: ToolContext,
    permits: Arc<Semaphore>,
    max_concurrency: usize,
    /// Accepted calls, running or queued.
    slots: Arc<Semaphore>,
    max_queued: usize,
    tracker: TaskTracker,
    lifecycle: Arc<Lifecycle>,
    sink: OutboundSink,
    in_flight: Arc<Mutex<InFlight>>,
    next_seq: AtomicU64,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        context: ToolContext,
        max_concurrency: usize,
        lifecycle: Arc<Lifecycle>,
        sink: OutboundSink,
    ) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            registry,
            context,
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            slots: Arc::new(Semaphore::new(max_concurrency + DEFAULT_MAX_QUEUED)),
            max_queued: DEFAULT_MAX_QUEUED,
            tracker: TaskTracker::new(),
            lifecycle,
            sink,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Set how many accepted calls may wait for a permit.
    pub fn with_max_queued(mut self, max_queued: usize) -> Self {
        self.slots = Arc::new(Semaphore::new(self.max_concurrency + max_queued));
        self.max_queued = max_queued;
        self
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn max_queued(&self) -> usize {
        self.max_queued
    }

    /// Requests accepted and not yet finished, queued ones included.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Accept a tool call. Rejections that need no handler (draining, unknown
    /// tool, bad arguments) are answered right away; everything else is
    /// answered by the spawned task.
    ///
    /// Waits while every slot is taken. A drain that starts during the wait
    /// answers the call with `ServerShuttingDown`.
    pub async fn dispatch(&self, id: RequestId, params: ToolCallParams) {
        if !self.lifecycle.is_accepting() {
            self.sink
                .respond_error(id, &McpError::ServerShuttingDown)
                .await;
            return;
        }

        let Some(descriptor) = self.registry.lookup(&params.name) else {
            tracing::warn!(%id, tool = %params.name, "Unknown tool");
            self.sink
                .respond_error(id, &McpError::ToolNotFound(params.name))
                .await;
            return;
        };

        let args = match validate_arguments(&descriptor.definition().input_schema, params.arguments)
        {
            Ok(args) => args,
            Err(e) => {
                tracing::debug!(%id, tool = %params.name, "Rejected arguments: {e}");
                self.sink.respond_error(id, &e).await;
                return;
            }
        };

        if self.slots.available_permits() == 0 {
            tracing::debug!(%id, tool = %params.name, "Dispatch queue full, waiting for a slot");
        }
        let drain = self.lifecycle.drain_token();
        let slot = tokio::select! {
            biased;
            () = drain.cancelled() => None,
            slot = Arc::clone(&self.slots).acquire_owned() => slot.ok(),
        };
        let Some(slot) = slot else {
            self.sink
                .respond_error(id, &McpError::ServerShuttingDown)
                .await;
            return;
        };

        let cancel = CancellationToken::new();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut in_flight) = self.in_flight.lock() {
            if in_flight.values().any(|(other, _)| *other == id) {
                tracing::warn!(%id, "Request id reused while still in flight");
            }
            in_flight.insert(seq, (id.clone(), cancel.clone()));
        }

        let handler = descriptor.handler();
        let tool = params.name;
        let ctx = Arc::clone(&self.context);
        let permits = Arc::clone(&self.permits);
        let sink = self.sink.clone();
        let in_flight = Arc::clone(&self.in_flight);

        self.tracker.spawn(async move {
            let _slot = slot;
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!(%id, %tool, "Cancelled while queued");
                    forget(&in_flight, seq);
                    return;
                }
                () = drain.cancelled() => {
                    tracing::debug!(%id, %tool, "Draining, queued request not started");
                    forget(&in_flight, seq);
                    sink.respond_error(id, &McpError::ServerShuttingDown).await;
                    return;
                }
                permit = permits.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        forget(&in_flight, seq);
                        sink.respond_error(id, &McpError::ServerShuttingDown).await;
                        return;
                    }
                },
            };

            tracing::debug!(%id, %tool, "Running tool");
            let mut task = tokio::spawn(async move {
                let _permit = permit;
                handler.call(args, ctx).await
            });

            let joined = tokio::select! {
                joined = &mut task => joined,
                () = cancel.cancelled() => {
                    task.abort();
                    tracing::info!(%id, %tool, "Tool call cancelled");
                    forget(&in_flight, seq);
                    return;
                }
            };
            forget(&in_flight, seq);

            match joined {
                Ok(Ok(result)) => {
                    if result.is_error() {
                        tracing::info!(%id, %tool, "Tool reported an error result");
                    }
                    sink.respond(id, &result).await;
                }
                Ok(Err(e)) => {
                    tracing::warn!(%id, %tool, "Tool failed: {e}");
                    sink.respond_error(id, &e).await;
                }
                Err(e) if e.is_panic() => {
                    let message = panic_message(e.into_panic());
                    tracing::error!(%id, %tool, "Tool panicked: {message}");
                    let err = McpError::InternalError(format!("Tool '{tool}' panicked: {message}"));
                    sink.respond_error(id, &err).await;
                }
                Err(_) => {
                    tracing::debug!(%id, %tool, "Tool task aborted");
                }
            }
        });
    }

    /// Cancel the request with this id. Returns whether it was still in
    /// flight.
    pub fn cancel(&self, id: &RequestId) -> bool {
        let Ok(in_flight) = self.in_flight.lock() else {
            return false;
        };
        let mut found = false;
        for (_, token) in in_flight.values().filter(|(other, _)| other == id) {
            token.cancel();
            found = true;
        }
        found
    }

    /// Abandon every request still in flight. No responses are sent for them.
    pub fn abort_all(&self) -> usize {
        let tokens: Vec<CancellationToken> = match self.in_flight.lock() {
            Ok(mut in_flight) => in_flight.drain().map(|(_, (_, token))| token).collect(),
            Err(_) => Vec::new(),
        };
        for token in &tokens {
            token.cancel();
        }
        tokens.len()
    }
}

fn forget(in_flight: &Mutex<InFlight>, seq: u64) {
    if let Ok(mut in_flight) = in_flight.lock() {
        in_flight.remove(&seq);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
