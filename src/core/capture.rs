/// Capture Parser
///
/// Decodes a raw [`CaptureResult`] into typed fields the rest of the server
/// can reason about, including the "MCP-shaped" predicate that decides
/// whether a tool call's stdout is an acceptable MCP tool result.
use serde_json::Value;

use crate::core::runner::CaptureResult;

/// A [`CaptureResult`] plus derived, ready-to-use fields.
#[derive(Debug, Clone)]
pub struct ParsedCapture {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub combined: String,
    /// The parsed stdout JSON object, when stdout is MCP-shaped.
    pub stdout_json: Option<Value>,
}

impl ParsedCapture {
    pub fn from_capture(capture: CaptureResult) -> Self {
        let stdout = String::from_utf8_lossy(&capture.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&capture.stderr).into_owned();
        let combined = String::from_utf8_lossy(&capture.combined).into_owned();

        let stdout_json = serde_json::from_str::<Value>(stdout.trim())
            .ok()
            .filter(is_mcp_shaped);

        Self {
            exit_code: capture.exit_code,
            stdout,
            stderr,
            combined,
            stdout_json,
        }
    }

    /// True iff stdout parsed as a single JSON object containing `content`.
    pub fn is_mcp_shaped(&self) -> bool {
        self.stdout_json.is_some()
    }
}

/// stdout is MCP-shaped iff it is a JSON object with a `content` field.
fn is_mcp_shaped(value: &Value) -> bool {
    value.as_object().is_some_and(|obj| obj.contains_key("content"))
}
