//! End-to-end integration tests for the MCP tool server.
//!
//! Each test spawns the real compiled binary over an OS pipe, pointed at a
//! temporary tools directory populated with small shell-script fixtures,
//! and drives it with raw JSON-RPC lines — mirroring how a real MCP host
//! talks to the server over stdio.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::fs::PermissionsExt;
use std::process::{Command, Stdio};

use serde_json::{json, Value};

fn write_tool(dir: &std::path::Path, name: &str, body: &str) {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "#!/bin/sh\n{body}").unwrap();
    let mut perms = f.metadata().unwrap().permissions();
    perms.set_mode(0o755);
    f.set_permissions(perms).unwrap();
}

/// Spawn the server against `tools_dir`, send each of `requests` as a line,
/// and return the parsed JSON response for every line the server wrote
/// back (notifications produce none).
fn run_requests(tools_dir: &std::path::Path, requests: &[Value]) -> Vec<Value> {
    let log_path = tools_dir.join("server.log");
    let mut child = Command::new(env!("CARGO_BIN_EXE_mcp-tool-server"))
        .env("MCP_TOOLS_DIR", tools_dir)
        .env("MCP_LOG_PATH", &log_path)
        .env("SERVER_NAME", "test-server")
        .env("SERVER_VERSION", "1.2.3")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn server binary");

    {
        let stdin = child.stdin.as_mut().unwrap();
        for req in requests {
            writeln!(stdin, "{}", serde_json::to_string(req).unwrap()).unwrap();
        }
    }
    // Dropping stdin (closing it) signals EOF so the server exits.
    drop(child.stdin.take());

    let stdout = child.stdout.take().unwrap();
    let reader = BufReader::new(stdout);
    let responses: Vec<Value> = reader
        .lines()
        .map_while(Result::ok)
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(&l).expect("response line should be valid JSON"))
        .collect();

    child.wait().expect("server should exit cleanly on stdin EOF");
    responses
}

#[test]
fn s1_initialize_reports_protocol_version_and_capabilities() {
    let dir = tempfile::tempdir().unwrap();
    let responses = run_requests(
        dir.path(),
        &[json!({"jsonrpc":"2.0","id":1,"method":"initialize"})],
    );
    assert_eq!(responses.len(), 1);
    let result = &responses[0]["result"];
    assert_eq!(result["protocolVersion"], "2025-06-18");
    assert_eq!(result["capabilities"]["tools"]["listChanged"], true);
    assert!(result["instructions"]
        .as_str()
        .unwrap()
        .contains("tool executables"));
}

#[test]
fn s2_tool_call_echoes_text_in_mcp_shape() {
    let dir = tempfile::tempdir().unwrap();
    write_tool(
        dir.path(),
        "t",
        r#"case "$1" in
  list) echo '{"name":"test_echo","description":"echoes text"}' ;;
  test_echo)
    text=$(echo "$2" | sed -n 's/.*"text":"\([^"]*\)".*/\1/p')
    printf '{"content":[{"type":"text","text":"%s"}],"isError":false}' "$text"
    ;;
esac"#,
    );
    let responses = run_requests(
        dir.path(),
        &[json!({
            "jsonrpc":"2.0","id":2,"method":"tools/call",
            "params":{"name":"test_echo","arguments":{"text":"hi"}}
        })],
    );
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["result"]["content"][0]["text"], "hi");
    assert_eq!(responses[0]["result"]["isError"], false);
    assert_eq!(responses[0]["id"], 2);
}

#[test]
fn s3_tool_call_add_computes_sum() {
    let dir = tempfile::tempdir().unwrap();
    write_tool(
        dir.path(),
        "t",
        r#"case "$1" in
  list) echo '{"name":"test_add","description":"adds two numbers"}' ;;
  test_add)
    a=$(echo "$2" | sed -n 's/.*"a":\([0-9]*\).*/\1/p')
    b=$(echo "$2" | sed -n 's/.*"b":\([0-9]*\).*/\1/p')
    sum=$((a + b))
    printf '{"content":[{"type":"text","text":"%s"}],"isError":false}' "$sum"
    ;;
esac"#,
    );
    let responses = run_requests(
        dir.path(),
        &[json!({
            "jsonrpc":"2.0","id":3,"method":"tools/call",
            "params":{"name":"test_add","arguments":{"a":1,"b":2}}
        })],
    );
    assert_eq!(responses[0]["result"]["content"][0]["text"], "3");
}

#[test]
fn s4_duplicate_tool_name_poisons_list_and_call() {
    let dir = tempfile::tempdir().unwrap();
    write_tool(dir.path(), "provider_a", r#"case "$1" in list) echo '{"name":"x"}' ;; esac"#);
    write_tool(dir.path(), "provider_b", r#"case "$1" in list) echo '{"name":"x"}' ;; esac"#);

    let responses = run_requests(
        dir.path(),
        &[
            json!({"jsonrpc":"2.0","id":4,"method":"tools/list"}),
            json!({"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"x"}}),
        ],
    );
    assert_eq!(responses[0]["error"]["code"], -32603);
    assert!(responses[0]["error"]["message"]
        .as_str()
        .unwrap()
        .contains("provider_a"));
    assert!(responses[0]["error"]["message"]
        .as_str()
        .unwrap()
        .contains("provider_b"));
    assert_eq!(responses[1]["error"]["code"], -32603);
}

#[test]
fn s5_tool_call_nonzero_exit_surfaces_combined_output() {
    let dir = tempfile::tempdir().unwrap();
    write_tool(
        dir.path(),
        "t",
        r#"case "$1" in
  list) echo '{"name":"test_add"}' ;;
  test_add) echo "Missing 'a' and/or 'b' parameters" >&2; exit 1 ;;
esac"#,
    );
    let responses = run_requests(
        dir.path(),
        &[json!({
            "jsonrpc":"2.0","id":3,"method":"tools/call",
            "params":{"name":"test_add","arguments":{"a":1}}
        })],
    );
    let message = responses[0]["error"]["message"].as_str().unwrap();
    assert_eq!(responses[0]["error"]["code"], -32603);
    assert!(message.contains("exit 1"));
    assert!(message.contains("Missing 'a' and/or 'b' parameters"));
}

#[test]
fn s6_unknown_method_is_method_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let responses = run_requests(
        dir.path(),
        &[json!({"jsonrpc":"2.0","id":7,"method":"foo/bar"})],
    );
    assert_eq!(responses[0]["error"]["code"], -32601);
    assert_eq!(responses[0]["error"]["message"], "Method not found");
}

#[test]
fn empty_tools_directory_yields_empty_tools_list() {
    let dir = tempfile::tempdir().unwrap();
    let responses = run_requests(dir.path(), &[json!({"jsonrpc":"2.0","id":1,"method":"tools/list"})]);
    assert_eq!(responses[0]["result"]["tools"], json!([]));
}

#[test]
fn notification_produces_no_response_line() {
    let dir = tempfile::tempdir().unwrap();
    let responses = run_requests(
        dir.path(),
        &[
            json!({"jsonrpc":"2.0","method":"notifications/initialized","params":{}}),
            json!({"jsonrpc":"2.0","id":1,"method":"initialize"}),
        ],
    );
    // Only the `initialize` request gets a response line.
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["id"], 1);
}

#[test]
fn resources_and_prompts_stubs_return_empty_arrays() {
    let dir = tempfile::tempdir().unwrap();
    let responses = run_requests(
        dir.path(),
        &[
            json!({"jsonrpc":"2.0","id":1,"method":"resources/list"}),
            json!({"jsonrpc":"2.0","id":2,"method":"resources/templates/list"}),
            json!({"jsonrpc":"2.0","id":3,"method":"prompts/list"}),
        ],
    );
    assert_eq!(responses[0]["result"]["resources"], json!([]));
    assert_eq!(responses[1]["result"]["resourceTemplates"], json!([]));
    assert_eq!(responses[2]["result"]["prompts"], json!([]));
}
