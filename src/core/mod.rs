/// Core Server Framework Module
///
/// This module contains the core server implementation including:
/// - config.rs: environment-driven startup configuration
/// - error.rs: the internal error taxonomy shared by every fallible operation
/// - logger.rs: append-only timestamped file logging
/// - runner.rs: child process spawning and output capture
/// - capture.rs: typed decoding of a runner capture into MCP-relevant fields
/// - registry.rs: tools-directory enumeration and the immutable tool registry
/// - server.rs: JSON-RPC 2.0 dispatcher and method handlers

pub mod capture;
pub mod config;
pub mod error;
pub mod logger;
pub mod registry;
pub mod runner;
pub mod server;
