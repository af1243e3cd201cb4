//! YST MCP Server - entry point.

use std::sync::Arc;
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use yst_mcp::config::{
    resolve_report_config, ServerConfig, DEFAULT_GRACE_PERIOD_SECS, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_MAX_QUEUED,
};
use yst_mcp::server::McpServer;
use yst_mcp::session::ReportSessionManager;
use yst_mcp::tools::default_registry;
use yst_mcp::transport::{StdioTransport, DEFAULT_MAX_FRAME_BYTES};
use yst_mcp::types::InitializeResult;

#[derive(Parser)]
#[command(
    name = "yst-mcp",
    about = "MCP server for YST daily reports — browser login, monthly collection, CSV summaries",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, default_value = "info", env = "YST_MCP_LOG_LEVEL", global = true)]
    log_level: String,

    #[command(flatten)]
    server: ServerArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct ServerArgs {
    /// Maximum tool calls running at once.
    #[arg(long, env = "YST_MCP_MAX_CONCURRENCY", default_value_t = DEFAULT_MAX_CONCURRENCY, global = true)]
    max_concurrency: usize,

    /// Tool calls allowed to wait for a free slot before input is paused.
    #[arg(long, env = "YST_MCP_MAX_QUEUED", default_value_t = DEFAULT_MAX_QUEUED, global = true)]
    max_queued: usize,

    /// Seconds to wait for in-flight calls after SIGINT/SIGTERM or `shutdown`.
    #[arg(long, env = "YST_MCP_GRACE_PERIOD_SECS", default_value_t = DEFAULT_GRACE_PERIOD_SECS, global = true)]
    grace_period_secs: u64,

    /// Maximum size of one inbound JSON-RPC line, in bytes.
    #[arg(long, env = "YST_MCP_MAX_FRAME_BYTES", default_value_t = DEFAULT_MAX_FRAME_BYTES, global = true)]
    max_frame_bytes: usize,

    /// Directory for cookies and the browser profile (default ~/.yst_mcp/data).
    /// Also reads YST_MCP_DATA_DIR.
    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// Directory collected Markdown is written to.
    #[arg(long, env = "YST_MCP_OUTPUT_DIR", global = true)]
    output_dir: Option<String>,

    /// Base URL of the KPI site.
    #[arg(long, env = "YST_MCP_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Chrome/Chromium binary used for login. Also reads YST_MCP_CHROME_PATH.
    #[arg(long, global = true)]
    chrome_path: Option<String>,

    /// Refuse to start unless this tool is registered (repeatable).
    #[arg(long = "require", value_name = "TOOL", global = true)]
    require: Vec<String>,
}

impl ServerArgs {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            max_concurrency: self.max_concurrency,
            max_queued: self.max_queued,
            grace_period: Duration::from_secs(self.grace_period_secs),
            max_frame_bytes: self.max_frame_bytes,
            required_tools: self.require.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server over stdio (default).
    Serve,

    /// Print server capabilities and tools as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   yst-mcp completions bash > ~/.local/share/bash-completion/completions/yst-mcp
    ///   yst-mcp completions zsh > ~/.zfunc/_yst-mcp
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

/// Time given to runtime tasks once serving has ended. The stdin reader
/// parks a blocking thread that only returns on input, so it is left behind.
const RUNTIME_SHUTDOWN: Duration = Duration::from_millis(500);

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build tokio runtime: {e}"))?;

    let result = runtime.block_on(run(cli));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN);
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let args = &cli.server;
            let report_config = resolve_report_config(
                args.data_dir.as_deref(),
                args.output_dir.as_deref(),
                args.base_url.as_deref(),
                args.chrome_path.as_deref(),
            );
            let context = Arc::new(ReportSessionManager::new(report_config));

            tracing::info!("YST MCP server v{}", env!("CARGO_PKG_VERSION"));
            let server = McpServer::new(args.server_config(), default_registry()?, context)?;
            StdioTransport::new(server).run().await?;
            tracing::info!("Server stopped");
        }

        Commands::Info => {
            let capabilities = InitializeResult::default_result();
            let registry = default_registry()?.build(&cli.server.require)?;
            let tools = registry.list_tools();
            let info = serde_json::json!({
                "server": capabilities.server_info,
                "protocol_version": capabilities.protocol_version,
                "capabilities": capabilities.capabilities,
                "tools": tools.iter().map(|t| &t.name).collect::<Vec<_>>(),
                "tool_count": tools.len(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "yst-mcp", &mut std::io::stdout());
        }
    }

    Ok(())
}
