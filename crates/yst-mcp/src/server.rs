//! Server assembly and the connection loop.
//!
//! [`McpServer::new`] performs startup: it validates the configuration and
//! freezes the tool registry. Any problem there is a
//! `StartupConfiguration` error and the server never serves.
//!
//! [`McpServer::serve`] then runs one connection over any byte stream pair:
//! a reader loop decoding frames, one writer task, and the drain sequence.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::FramedRead;

use crate::config::ServerConfig;
use crate::protocol::{Dispatcher, ProtocolHandler};
use crate::session::{DrainReason, Lifecycle, ToolContext};
use crate::tools::{CapabilityRegistry, RegistryBuilder};
use crate::transport::{run_writer, FrameCodec, OutboundSink};
use crate::types::{McpError, McpResult};

/// How long abandoned handlers get to unwind after being aborted.
const ABORT_SETTLE: Duration = Duration::from_secs(1);

/// How long the writer gets to flush queued responses at the end.
const WRITER_FLUSH: Duration = Duration::from_secs(5);

/// A configured server that has passed startup checks.
pub struct McpServer {
    config: ServerConfig,
    registry: Arc<CapabilityRegistry>,
    context: ToolContext,
    lifecycle: Arc<Lifecycle>,
}

impl McpServer {
    pub fn new(config: ServerConfig, tools: RegistryBuilder, context: ToolContext) -> McpResult<Self> {
        config.validate()?;
        let registry = tools.build(&config.required_tools)?;
        tracing::info!(
            tools = registry.len(),
            max_concurrency = config.max_concurrency,
            max_queued = config.max_queued,
            grace_secs = config.grace_period.as_secs(),
            "Server configured"
        );

        Ok(Self {
            config,
            registry: Arc::new(registry),
            context,
            lifecycle: Arc::new(Lifecycle::new()),
        })
    }

    pub fn lifecycle(&self) -> Arc<Lifecycle> {
        Arc::clone(&self.lifecycle)
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Serve one connection until the input closes, `shutdown` is requested,
    /// or `shutdown_signal` resolves.
    ///
    /// Returns an error only when the transport itself failed.
    pub async fn serve<R, W, S>(self, reader: R, writer: W, shutdown_signal: S) -> McpResult<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
        S: Future<Output = ()>,
    {
        let Self {
            config,
            registry,
            context,
            lifecycle,
        } = self;

        let (sink, rx) = OutboundSink::channel(Arc::clone(&lifecycle));
        let mut writer_task = tokio::spawn(run_writer(
            writer,
            config.max_frame_bytes,
            rx,
            Arc::clone(&lifecycle),
        ));

        let dispatcher = Dispatcher::new(
            registry,
            context,
            config.max_concurrency,
            Arc::clone(&lifecycle),
            sink.clone(),
        )
        .with_max_queued(config.max_queued);
        let handler = ProtocolHandler::new(dispatcher, Arc::clone(&lifecycle), sink);
        let mut frames = FramedRead::new(reader, FrameCodec::new(config.max_frame_bytes));

        lifecycle.begin_serving()?;

        let drain_requested = lifecycle.drain_token();
        let mut shutdown_signal = std::pin::pin!(shutdown_signal);
        let mut signal_seen = false;
        let mut input_open = true;

        // Serving.
        while !drain_requested.is_cancelled() {
            tokio::select! {
                biased;

                () = &mut shutdown_signal, if !signal_seen => {
                    signal_seen = true;
                    lifecycle.begin_drain(DrainReason::Signal);
                }

                () = drain_requested.cancelled() => {}

                frame = frames.next() => match frame {
                    Some(Ok(frame)) => {
                        // A full dispatch queue parks this frame; keep
                        // watching for the signal while it waits.
                        let handled = handler.handle_frame(frame);
                        tokio::pin!(handled);
                        tokio::select! {
                            biased;
                            () = &mut handled => {}
                            () = &mut shutdown_signal, if !signal_seen => {
                                signal_seen = true;
                                lifecycle.begin_drain(DrainReason::Signal);
                                handled.await;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!("Input failed: {e}");
                        input_open = false;
                        lifecycle.close_peer();
                        lifecycle.begin_drain(DrainReason::TransportFailed);
                    }
                    None => {
                        tracing::info!("EOF on input, shutting down");
                        input_open = false;
                        lifecycle.begin_drain(DrainReason::StreamClosed);
                    }
                },
            }
        }

        // Draining.
        let reason = lifecycle.drain_reason().unwrap_or(DrainReason::StreamClosed);
        let grace = if reason.is_graceful() {
            config.grace_period
        } else {
            Duration::ZERO
        };
        let tracker = handler.dispatcher().tracker().clone();
        tracker.close();
        tracing::info!(
            ?reason,
            in_flight = tracker.len(),
            grace_secs = grace.as_secs(),
            "Draining"
        );

        let deadline = tokio::time::sleep(grace);
        tokio::pin!(deadline);
        let drained = loop {
            tokio::select! {
                biased;

                () = tracker.wait() => break true,

                () = &mut deadline => break false,

                frame = frames.next(), if input_open => match frame {
                    // Still reading so late requests get a ShuttingDown answer.
                    Some(Ok(frame)) => handler.handle_frame(frame).await,
                    Some(Err(e)) => {
                        tracing::warn!("Input failed while draining: {e}");
                        input_open = false;
                    }
                    None => {
                        tracing::debug!("EOF on input while draining");
                        input_open = false;
                    }
                },
            }
        };

        if !drained {
            // Cancelled calls never answer; responses already queued still go out.
            let abandoned = handler.dispatcher().abort_all();
            tracing::warn!(abandoned, "Grace period over, abandoning in-flight requests");
            if tokio::time::timeout(ABORT_SETTLE, tracker.wait()).await.is_err() {
                tracing::warn!("Abandoned handlers did not unwind in time");
            }
        }

        drop(handler);
        drop(frames);

        let writer_result = match tokio::time::timeout(WRITER_FLUSH, &mut writer_task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(McpError::Transport(format!("Writer task failed: {e}"))),
            Err(_) => {
                tracing::warn!("Writer did not finish flushing, stopping it");
                lifecycle.stop();
                writer_task.abort();
                Ok(())
            }
        };

        lifecycle.stop();

        match (reason, writer_result) {
            (_, Err(e)) => Err(e),
            (DrainReason::TransportFailed, Ok(())) => {
                Err(McpError::Transport("Transport failed".to_string()))
            }
            _ => Ok(()),
        }
    }
}
