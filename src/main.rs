/// MCP Tool Server Entry Point
///
/// Discovers a directory of independent tool executables, builds a registry
/// from their `list`/`instructions` output, and serves MCP over
/// newline-delimited JSON-RPC 2.0 on stdin/stdout until stdin closes.
///
/// Environment Variables:
/// - SERVER_NAME: Name reported in `initialize` (default: "mcp-tool-server")
/// - SERVER_VERSION: Version reported in `initialize` (default: crate version)
/// - MCP_TOOLS_DIR: Directory scanned for tool executables (default: "tools"
///   next to the server executable)
/// - MCP_LOG_PATH: Append-mode log file path (default: "/tmp/mcp_server.log")
/// - MCP_DRAIN_MS: Descendant-drain window in milliseconds (default: 50)
mod core;

use crate::core::config::ServerConfig;
use crate::core::logger::Logger;
use crate::core::{registry, server};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let cfg = ServerConfig::from_env();
    let logger = Logger::new(&cfg.log_path);

    logger.info(format!(
        "starting {} v{} (tools_dir={})",
        cfg.server_name,
        cfg.server_version,
        cfg.tools_dir.display()
    ));

    let registry = registry::build_registry(&cfg, &logger).await;
    logger.info(format!(
        "registry built: {} tools, {} listing errors, {} duplicate names",
        registry.definitions().len(),
        registry.listing_errors.len(),
        registry.duplicates().len()
    ));

    server::run_stdio(registry, cfg, logger).await
}
