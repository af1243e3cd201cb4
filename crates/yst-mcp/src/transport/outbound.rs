//! Outbound path: every response goes through one [`OutboundSink`] channel to a
//! single writer task, so frames never interleave on the output stream.

use std::sync::Arc;

use futures::SinkExt;
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;

use crate::session::Lifecycle;
use crate::types::{JsonRpcResponse, McpError, McpResult, RequestId};

use super::framing::FrameCodec;

/// Capacity of the outbound queue. Senders wait when the writer falls behind.
pub const OUTBOUND_QUEUE: usize = 256;

/// Cloneable handle for queueing outbound messages.
#[derive(Debug, Clone)]
pub struct OutboundSink {
    tx: mpsc::Sender<Value>,
    lifecycle: Arc<Lifecycle>,
}

impl OutboundSink {
    pub fn new(tx: mpsc::Sender<Value>, lifecycle: Arc<Lifecycle>) -> Self {
        Self { tx, lifecycle }
    }

    /// A sink with its receiving end, for driving the handler without a
    /// transport.
    pub fn channel(lifecycle: Arc<Lifecycle>) -> (Self, mpsc::Receiver<Value>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
        (Self::new(tx, lifecycle), rx)
    }

    /// Queue a message. Dropped when the server has stopped or the peer is gone.
    pub async fn send(&self, message: Value) {
        if !self.lifecycle.can_emit() {
            tracing::debug!("Discarding outbound message, output is closed");
            return;
        }
        if self.tx.send(message).await.is_err() {
            tracing::debug!("Discarding outbound message, writer has exited");
        }
    }

    pub async fn respond(&self, id: RequestId, result: &impl Serialize) {
        match serde_json::to_value(result) {
            Ok(value) => self.send_serialized(&JsonRpcResponse::new(id, value)).await,
            Err(e) => {
                tracing::error!(%id, "Failed to serialize result: {e}");
                let err = McpError::InternalError(format!("Failed to serialize result: {e}"));
                self.respond_error(id, &err).await;
            }
        }
    }

    pub async fn respond_error(&self, id: RequestId, error: &McpError) {
        self.send_serialized(&error.to_json_rpc_error(id)).await;
    }

    async fn send_serialized(&self, message: &impl Serialize) {
        match serde_json::to_value(message) {
            Ok(value) => self.send(value).await,
            Err(e) => tracing::error!("Failed to serialize outbound message: {e}"),
        }
    }
}

/// Writer task: drains the queue into `writer`, one frame per message, flushing
/// after each.
///
/// Exits when every sender is dropped or the lifecycle stops. A write failure
/// closes the peer, starts a transport-failure drain, and is returned.
pub async fn run_writer<W>(
    writer: W,
    max_frame_bytes: usize,
    mut rx: mpsc::Receiver<Value>,
    lifecycle: Arc<Lifecycle>,
) -> McpResult<()>
where
    W: AsyncWrite + Unpin,
{
    let mut framed = FramedWrite::new(writer, FrameCodec::new(max_frame_bytes));
    let stopped = lifecycle.stopped_token();

    loop {
        tokio::select! {
            biased;

            msg = rx.recv() => {
                let Some(value) = msg else {
                    tracing::debug!("Writer: queue closed");
                    break;
                };
                if !lifecycle.can_emit() {
                    tracing::debug!("Writer: dropping message after stop");
                    continue;
                }
                if let Err(e) = framed.send(value).await {
                    tracing::error!("Writer: output failed: {e}");
                    lifecycle.close_peer();
                    lifecycle.begin_drain(crate::session::DrainReason::TransportFailed);
                    return Err(McpError::Transport(format!("Write failed: {e}")));
                }
            }

            () = stopped.cancelled() => {
                tracing::debug!("Writer: lifecycle stopped");
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::AsyncReadExt;

    fn serving() -> Arc<Lifecycle> {
        let lifecycle = Arc::new(Lifecycle::new());
        lifecycle.begin_serving().unwrap();
        lifecycle
    }

    #[tokio::test]
    async fn test_writer_emits_one_line_per_message() {
        let lifecycle = serving();
        let (sink, rx) = OutboundSink::channel(lifecycle.clone());
        let (mut client, server) = tokio::io::duplex(4096);

        let writer = tokio::spawn(run_writer(server, 1024, rx, lifecycle));
        sink.respond(RequestId::Number(1), &json!({ "ok": true })).await;
        sink.respond_error(RequestId::Number(2), &McpError::ServerShuttingDown)
            .await;
        drop(sink);
        writer.await.unwrap().unwrap();

        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        let lines: Vec<Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["result"]["ok"], true);
        assert_eq!(lines[1]["error"]["code"], -32000);
        assert_eq!(lines[1]["error"]["data"]["kind"], "ServerShuttingDown");
    }

    #[tokio::test]
    async fn test_sink_discards_after_stop() {
        let lifecycle = serving();
        let (sink, mut rx) = OutboundSink::channel(lifecycle.clone());
        lifecycle.stop();
        sink.send(json!({ "late": true })).await;
        drop(sink);
        assert!(rx.recv().await.is_none());
    }
}
