/// JSON-RPC Dispatcher and Server Descriptor
///
/// Reads newline-delimited JSON-RPC 2.0 requests from standard input,
/// validates the envelope, routes recognized methods to handlers backed by
/// the [`Registry`], and writes one response per request to standard
/// output. `tools/call` is the only method that invokes the child process
/// runner again at request time; every other method only reads the
/// registry built at startup.
use std::path::Path;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

use crate::core::capture::ParsedCapture;
use crate::core::config::ServerConfig;
use crate::core::logger::Logger;
use crate::core::registry::{Registry, Resolution};
use crate::core::runner;

const PROTOCOL_VERSION: &str = "2025-06-18";
const BASE_INSTRUCTIONS: &str =
    "This server exposes a dynamically discovered toolbox of independent tool executables over MCP.";

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcErrorObj>,
}

#[derive(Debug, Serialize)]
struct JsonRpcErrorObj {
    code: i32,
    message: String,
}

fn success_response(id: Value, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: Some(result),
        error: None,
    }
}

fn error_response(id: Value, code: i32, message: String) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: None,
        error: Some(JsonRpcErrorObj { code, message }),
    }
}

/// Run the stdio JSON-RPC loop until stdin EOF.
///
/// One request per line, one response per request, in order. Blank lines
/// are skipped. Notifications (including `notifications/initialized`)
/// produce no response line at all.
pub async fn run_stdio(registry: Registry, cfg: ServerConfig, logger: Logger) -> std::io::Result<()> {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::with_capacity(8192, stdin).lines();
    let stdout = tokio::io::stdout();
    let mut out = BufWriter::with_capacity(8192, stdout);

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let Some(response) = handle_line(&line, &registry, &cfg, &logger).await else {
            continue;
        };

        let json_line = match serde_json::to_string(&response) {
            Ok(s) => s,
            Err(e) => {
                logger.error(format!("failed to serialize response: {e}"));
                continue;
            }
        };

        out.write_all(json_line.as_bytes()).await?;
        out.write_all(b"\n").await?;
        out.flush().await?;
    }

    Ok(())
}

/// Parse, validate, and route a single stdin line. Returns `None` for
/// notifications, which produce no response.
async fn handle_line(
    line: &str,
    registry: &Registry,
    cfg: &ServerConfig,
    logger: &Logger,
) -> Option<JsonRpcResponse> {
    let raw: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            logger.error(format!("parse error: {e}"));
            return Some(error_response(Value::Null, -32700, "Parse error".to_string()));
        }
    };

    let Some(obj) = raw.as_object() else {
        return Some(error_response(Value::Null, -32600, "Invalid Request".to_string()));
    };

    let id_value = obj.get("id").cloned();
    let method = obj.get("method").and_then(Value::as_str).map(str::to_string);
    let jsonrpc_ok = obj.get("jsonrpc").and_then(Value::as_str) == Some("2.0");
    let params = obj.get("params").cloned();

    let is_numeric_id = id_value.as_ref().is_some_and(Value::is_number);
    let is_notification = method.as_deref() == Some("notifications/initialized");

    let method_ok = method.as_deref().is_some_and(|m| !m.is_empty());
    let params_ok = params.as_ref().is_none_or(Value::is_object);

    if !jsonrpc_ok || !method_ok || (!is_numeric_id && !is_notification) || !params_ok {
        let echo_id = id_value.unwrap_or(Value::Null);
        return Some(error_response(echo_id, -32600, "Invalid Request".to_string()));
    }

    let method = method.unwrap();
    let id = id_value.unwrap_or(Value::Null);

    if is_notification {
        logger.info(format!("received notification: {method}"));
        return None;
    }

    let outcome = dispatch_method(&method, params, registry, cfg, logger).await;
    Some(match outcome {
        Ok(result) => success_response(id, result),
        Err((code, message)) => error_response(id, code, message),
    })
}

async fn dispatch_method(
    method: &str,
    params: Option<Value>,
    registry: &Registry,
    cfg: &ServerConfig,
    logger: &Logger,
) -> Result<Value, (i32, String)> {
    match method {
        "initialize" => Ok(server_descriptor(cfg, registry)),
        "tools/list" => handle_tools_list(registry),
        "tools/call" => handle_tools_call(params, registry, cfg, logger).await,
        "resources/list" => Ok(json!({ "resources": [] })),
        "resources/templates/list" => Ok(json!({ "resourceTemplates": [] })),
        "prompts/list" => Ok(json!({ "prompts": [] })),
        _ => Err((-32601, "Method not found".to_string())),
    }
}

fn server_descriptor(cfg: &ServerConfig, registry: &Registry) -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": { "listChanged": true } },
        "serverInfo": { "name": cfg.server_name, "version": cfg.server_version },
        "instructions": build_instructions(&registry.instructions),
    })
}

fn build_instructions(blurbs: &[String]) -> String {
    let mut text = BASE_INSTRUCTIONS.to_string();
    for blurb in blurbs {
        text.push_str("\n\n");
        text.push_str(blurb);
    }
    text
}

fn handle_tools_list(registry: &Registry) -> Result<Value, (i32, String)> {
    if registry.has_listing_errors() {
        let message = registry
            .listing_errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        return Err((-32603, message));
    }

    if registry.has_duplicates() {
        let message = registry
            .duplicates()
            .into_iter()
            .map(|(name, entry)| format!("`{name}` claimed by: {}", entry.providers.join(", ")))
            .collect::<Vec<_>>()
            .join("; ");
        return Err((-32603, message));
    }

    Ok(json!({ "tools": registry.definitions() }))
}

async fn handle_tools_call(
    params: Option<Value>,
    registry: &Registry,
    cfg: &ServerConfig,
    logger: &Logger,
) -> Result<Value, (i32, String)> {
    let params = params.ok_or((-32602, "Invalid params".to_string()))?;
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or((-32602, "Invalid params".to_string()))?;
    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

    match registry.resolve(name) {
        None => Err((-32601, "Tool not found".to_string())),
        Some(Resolution::Duplicate(entry)) => Err((
            -32603,
            format!("`{name}` is claimed by multiple providers: {}", entry.providers.join(", ")),
        )),
        Some(Resolution::Provider(provider_path)) => {
            call_provider(provider_path, name, &arguments, cfg, logger).await
        }
    }
}

async fn call_provider(
    provider_path: &str,
    name: &str,
    arguments: &Value,
    cfg: &ServerConfig,
    logger: &Logger,
) -> Result<Value, (i32, String)> {
    let arg_json = serde_json::to_string(arguments)
        .map_err(|e| (-32603, format!("failed to serialize arguments: {e}")))?;

    let capture = runner::run(Path::new(provider_path), name, Some(&arg_json), cfg.drain_window)
        .await
        .map_err(|_| (-32603, "output parse error".to_string()))?;

    let parsed = ParsedCapture::from_capture(capture);

    if !parsed.stderr.is_empty() {
        logger.info(format!("{name} ({provider_path}) stderr: {}", parsed.stderr));
    }

    if parsed.exit_code != 0 {
        return Err((
            -32603,
            format!("Tool `{name}` failed (exit {}): {}", parsed.exit_code, parsed.combined),
        ));
    }

    match parsed.stdout_json {
        Some(value) => Ok(value),
        None => Err((
            -32603,
            format!("Tool `{name}` returned invalid JSON: {}", parsed.stdout),
        )),
    }
}
