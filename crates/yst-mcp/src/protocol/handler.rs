//! Main request router: receives decoded frames and answers them through the
//! outbound sink.
//!
//! Protocol methods (`initialize`, `ping`, `tools/list`, `shutdown`) are
//! answered inline. `tools/call` goes to the [`Dispatcher`] and is answered
//! whenever its handler finishes, so responses may arrive out of order.

use std::sync::Arc;
use tokio::sync::Mutex;

use serde_json::Value;

use crate::session::{DrainReason, Lifecycle};
use crate::transport::{Frame, OutboundSink};
use crate::types::*;

use super::dispatcher::Dispatcher;
use super::negotiation::NegotiatedCapabilities;
use super::validator::validate_request;

/// The main protocol handler that dispatches incoming JSON-RPC messages.
pub struct ProtocolHandler {
    dispatcher: Dispatcher,
    lifecycle: Arc<Lifecycle>,
    sink: OutboundSink,
    capabilities: Arc<Mutex<NegotiatedCapabilities>>,
}

impl ProtocolHandler {
    pub fn new(dispatcher: Dispatcher, lifecycle: Arc<Lifecycle>, sink: OutboundSink) -> Self {
        Self {
            dispatcher,
            lifecycle,
            sink,
            capabilities: Arc::new(Mutex::new(NegotiatedCapabilities::default())),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub async fn handle_frame(&self, frame: Frame) {
        match frame {
            Frame::Message(msg) => self.handle_message(msg).await,
            Frame::Malformed { id, error } => {
                tracing::warn!(%id, "Malformed frame: {error}");
                self.sink.respond_error(id, &error).await;
            }
        }
    }

    pub async fn handle_message(&self, msg: JsonRpcMessage) {
        match msg {
            JsonRpcMessage::Request(req) => self.handle_request(req).await,
            JsonRpcMessage::Notification(notif) => self.handle_notification(notif).await,
            _ => {
                tracing::warn!("Received unexpected message type from client");
            }
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) {
        if let Err(e) = validate_request(&request) {
            self.sink.respond_error(request.id, &e).await;
            return;
        }

        if !self.lifecycle.is_accepting() {
            tracing::debug!(id = %request.id, method = %request.method, "Rejecting request while draining");
            self.sink
                .respond_error(request.id, &McpError::ServerShuttingDown)
                .await;
            return;
        }

        let JsonRpcRequest {
            id, method, params, ..
        } = request;

        match method.as_str() {
            "tools/call" => match parse_params::<ToolCallParams>(params, "Tool call") {
                Ok(call) => self.dispatcher.dispatch(id, call).await,
                Err(e) => self.sink.respond_error(id, &e).await,
            },
            "shutdown" => {
                tracing::info!("Shutdown requested");
                self.sink
                    .respond(id, &Value::Object(serde_json::Map::new()))
                    .await;
                self.lifecycle.begin_drain(DrainReason::ShutdownRequest);
            }
            _ => match self.dispatch_request(&method, params).await {
                Ok(value) => self.sink.respond(id, &value).await,
                Err(e) => self.sink.respond_error(id, &e).await,
            },
        }
    }

    async fn dispatch_request(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        match method {
            "initialize" => self.handle_initialize(params).await,
            "tools/list" => self.handle_tools_list().await,
            "ping" => Ok(Value::Object(serde_json::Map::new())),
            _ => Err(McpError::MethodNotFound(method.to_string())),
        }
    }

    async fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "initialized" | "notifications/initialized" => {
                let mut caps = self.capabilities.lock().await;
                caps.mark_initialized();
            }
            "notifications/cancelled" | "$/cancelRequest" => {
                match parse_params::<CancelRequestParams>(notification.params, "Cancel") {
                    Ok(cancel) => {
                        let found = self.dispatcher.cancel(&cancel.request_id);
                        tracing::info!(
                            request_id = %cancel.request_id,
                            reason = cancel.reason.as_deref().unwrap_or(""),
                            found,
                            "Cancellation requested"
                        );
                    }
                    Err(e) => tracing::warn!("Ignoring cancellation: {e}"),
                }
            }
            _ => {
                tracing::debug!("Unknown notification: {}", notification.method);
            }
        }
    }

    async fn handle_initialize(&self, params: Option<Value>) -> McpResult<Value> {
        let init_params: InitializeParams = parse_params(params, "Initialize")?;

        let mut caps = self.capabilities.lock().await;
        let result = caps.negotiate(init_params)?;

        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    async fn handle_tools_list(&self) -> McpResult<Value> {
        let result = ToolListResult {
            tools: self.dispatcher.registry().list_tools(),
            next_cursor: None,
        };
        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>, what: &str) -> McpResult<T> {
    params
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| McpError::InvalidParams(e.to_string()))?
        .ok_or_else(|| McpError::InvalidParams(format!("{what} params required")))
}
