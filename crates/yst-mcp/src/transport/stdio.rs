//! Stdio transport - reads JSON-RPC from stdin, writes to stdout.

use crate::server::McpServer;
use crate::types::McpResult;

/// Stdio transport for desktop MCP clients.
pub struct StdioTransport {
    server: McpServer,
}

impl StdioTransport {
    pub fn new(server: McpServer) -> Self {
        Self { server }
    }

    /// Serve stdin/stdout until EOF, `shutdown`, or SIGINT/SIGTERM.
    pub async fn run(self) -> McpResult<()> {
        tracing::info!("Stdio transport started");
        self.server
            .serve(tokio::io::stdin(), tokio::io::stdout(), shutdown_signal())
            .await
    }
}

/// Resolves on SIGINT or SIGTERM (Ctrl-C only off unix).
pub async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("Received SIGINT"),
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
                }
            }
            Err(err) => {
                tracing::warn!(%err, "Failed to register SIGTERM handler, using Ctrl-C only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "Ctrl-C handler failed");
            std::future::pending::<()>().await;
        }
    }
}
