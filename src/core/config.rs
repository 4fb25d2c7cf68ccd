/// Startup Configuration
///
/// Resolves the handful of environment-driven knobs the server needs before
/// the registry is built, following the same "read once with a default
/// fallback" shape as the original template's `core::utils::get_env_var`.
use std::path::PathBuf;
use std::time::Duration;

/// Resolved, immutable configuration for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Reported in the `initialize` response's `serverInfo.name`.
    pub server_name: String,
    /// Reported in the `initialize` response's `serverInfo.version`.
    pub server_version: String,
    /// Directory scanned non-recursively for tool provider executables.
    /// Defaults to a `tools` directory next to the server executable, not
    /// the process's current working directory.
    pub tools_dir: PathBuf,
    /// Fixed append-mode log file path.
    pub log_path: PathBuf,
    /// Grace window granted to output readers after the direct child exits
    /// before their buffers are treated as final (see `core::runner`).
    pub drain_window: Duration,
}

impl ServerConfig {
    /// Build configuration from environment variables, falling back to the
    /// documented defaults when a variable is unset or fails to parse.
    pub fn from_env() -> Self {
        let server_name =
            get_env_var("SERVER_NAME", "mcp-tool-server");
        let server_version =
            get_env_var("SERVER_VERSION", env!("CARGO_PKG_VERSION"));
        let tools_dir = match std::env::var("MCP_TOOLS_DIR") {
            Ok(v) => PathBuf::from(v),
            Err(_) => default_tools_dir(),
        };
        let log_path = PathBuf::from(get_env_var("MCP_LOG_PATH", "/tmp/mcp_server.log"));
        let drain_window_ms = std::env::var("MCP_DRAIN_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(50);

        Self {
            server_name,
            server_version,
            tools_dir,
            log_path,
            drain_window: Duration::from_millis(drain_window_ms),
        }
    }
}

/// Get environment variable value with a default fallback.
///
/// Mirrors the template's `get_env_var` helper: useful for configuration
/// values that may be provided via environment variables.
fn get_env_var(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// `./tools` resolved relative to the server executable's own directory,
/// not the process's current working directory, so the server finds its
/// tools regardless of where it was launched from. Falls back to the
/// literal relative path `./tools` if the executable's location can't be
/// determined.
fn default_tools_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("tools")))
        .unwrap_or_else(|| PathBuf::from("./tools"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_env_var_returns_default_when_unset() {
        std::env::remove_var("MCP_TEST_NONEXISTENT_VAR");
        assert_eq!(get_env_var("MCP_TEST_NONEXISTENT_VAR", "fallback"), "fallback");
    }

    #[test]
    fn config_defaults_match_spec() {
        // Run in isolation of any ambient MCP_* env vars the test harness
        // might already have set.
        for key in ["SERVER_NAME", "SERVER_VERSION", "MCP_TOOLS_DIR", "MCP_LOG_PATH", "MCP_DRAIN_MS"] {
            std::env::remove_var(key);
        }
        let cfg = ServerConfig::from_env();
        assert_eq!(cfg.server_name, "mcp-tool-server");
        assert_eq!(cfg.tools_dir, default_tools_dir());
        assert_eq!(cfg.log_path, PathBuf::from("/tmp/mcp_server.log"));
        assert_eq!(cfg.drain_window, Duration::from_millis(50));
    }

    #[test]
    fn default_tools_dir_is_resolved_next_to_the_executable() {
        let expected = std::env::current_exe().unwrap().parent().unwrap().join("tools");
        assert_eq!(default_tools_dir(), expected);
    }

    #[test]
    fn explicit_mcp_tools_dir_overrides_the_executable_relative_default() {
        std::env::set_var("MCP_TOOLS_DIR", "/explicit/tools/path");
        let cfg = ServerConfig::from_env();
        std::env::remove_var("MCP_TOOLS_DIR");
        assert_eq!(cfg.tools_dir, PathBuf::from("/explicit/tools/path"));
    }
}
