//! MCP test server binary for integration tests
//!
//! A minimal MCP server speaking newline-delimited JSON over stdin/stdout.
//! Integration tests spawn it to exercise the stdio transport, the
//! handshake, and cursor aggregation without a real external server.
//!
//! # Handled Methods
//!
//! - `initialize` -- protocol version `2025-11-25` (override with
//!   `MCP_TEST_SERVER_PROTOCOL_VERSION`), capabilities for tools, resources,
//!   and prompts.
//! - `notifications/initialized` -- swallowed.
//! - `ping` -- empty result.
//! - `tools/list` -- two pages: `[echo, add]` then `[null, exit]`.
//! - `tools/call` -- `echo` returns its `message`, `add` returns `a + b`,
//!   `exit` terminates the process without answering.
//! - `resources/list` -- two pages of one resource each.
//! - `resources/read` -- text contents naming the URI.
//! - `prompts/list` -- one page with `greet`.
//! - `prompts/get` -- `greet` renders a user message using `name`.
//! - Anything else -- `-32601 Method not found`.
//!
//! Every line received on stdin is also written to stderr so tests can see
//! it in debug logs.

use std::io::{self, BufRead, Write};

use serde_json::{json, Value};

fn main() {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let protocol_version = std::env::var("MCP_TEST_SERVER_PROTOCOL_VERSION")
        .unwrap_or_else(|_| "2025-11-25".to_string());

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        eprintln!("mcp_test_server <- {}", trimmed);

        let request: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(_) => {
                let response = make_error(&Value::Null, -32700, "Parse error");
                if write_line(&mut out, &response).is_err() {
                    break;
                }
                continue;
            }
        };

        let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let params = request.get("params").cloned().unwrap_or(Value::Null);

        if method.starts_with("notifications/") {
            continue;
        }

        let result = match method {
            "initialize" => Ok(handle_initialize(&protocol_version)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(handle_tools_list(&params)),
            "tools/call" => handle_tools_call(&params),
            "resources/list" => Ok(handle_resources_list(&params)),
            "resources/read" => handle_resources_read(&params),
            "prompts/list" => Ok(json!({ "prompts": [greet_prompt()] })),
            "prompts/get" => handle_prompts_get(&params),
            _ => Err((-32601, format!("Method not found: {}", method))),
        };

        let response = match result {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Err((code, message)) => make_error(&id, code, &message),
        };

        if write_line(&mut out, &response).is_err() {
            break;
        }
    }
}

fn write_line(out: &mut impl Write, message: &Value) -> io::Result<()> {
    writeln!(out, "{}", message)?;
    out.flush()
}

fn handle_initialize(protocol_version: &str) -> Value {
    json!({
        "protocolVersion": protocol_version,
        "capabilities": {
            "tools": { "listChanged": false },
            "resources": {},
            "prompts": {}
        },
        "serverInfo": {
            "name": "mcp-test-server",
            "version": "0.1.0"
        },
        "instructions": "Test server for mcpbench integration tests"
    })
}

fn tool(name: &str, description: &str, properties: Value) -> Value {
    json!({
        "name": name,
        "description": description,
        "inputSchema": { "type": "object", "properties": properties }
    })
}

fn handle_tools_list(params: &Value) -> Value {
    match params.get("cursor").and_then(|c| c.as_str()) {
        None => json!({
            "tools": [
                tool("echo", "Echoes input", json!({ "message": { "type": "string" } })),
                tool(
                    "add",
                    "Adds two numbers",
                    json!({ "a": { "type": "number" }, "b": { "type": "number" } })
                )
            ],
            "nextCursor": "tools-2"
        }),
        Some(_) => json!({
            "tools": [null, tool("exit", "Terminates the server", json!({}))]
        }),
    }
}

fn handle_tools_call(params: &Value) -> Result<Value, (i64, String)> {
    let name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

    match name {
        "echo" => {
            let message = arguments
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("");
            Ok(json!({
                "content": [{ "type": "text", "text": message }],
                "isError": false
            }))
        }
        "add" => {
            let a = arguments.get("a").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let b = arguments.get("b").and_then(|v| v.as_f64()).unwrap_or(0.0);
            Ok(json!({
                "content": [{ "type": "text", "text": format!("{}", a + b) }],
                "structuredContent": { "sum": a + b }
            }))
        }
        "exit" => std::process::exit(0),
        other => Err((-32602, format!("Unknown tool: {}", other))),
    }
}

fn handle_resources_list(params: &Value) -> Value {
    let (index, next) = match params.get("cursor").and_then(|c| c.as_str()) {
        None => (1, Some("resources-2")),
        Some(_) => (2, None),
    };
    let mut page = json!({
        "resources": [{
            "uri": format!("test://static/{}", index),
            "name": format!("static-{}", index),
            "mimeType": "text/plain"
        }]
    });
    if let Some(next) = next {
        page["nextCursor"] = json!(next);
    }
    page
}

fn handle_resources_read(params: &Value) -> Result<Value, (i64, String)> {
    let uri = params
        .get("uri")
        .and_then(|u| u.as_str())
        .ok_or((-32602, "uri is required".to_string()))?;
    if !uri.starts_with("test://static/") {
        return Err((-32002, format!("Resource not found: {}", uri)));
    }
    Ok(json!({
        "contents": [{
            "uri": uri,
            "mimeType": "text/plain",
            "text": format!("contents of {}", uri)
        }]
    }))
}

fn greet_prompt() -> Value {
    json!({
        "name": "greet",
        "description": "Greets someone",
        "arguments": [{ "name": "name", "required": true }]
    })
}

fn handle_prompts_get(params: &Value) -> Result<Value, (i64, String)> {
    let name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");
    if name != "greet" {
        return Err((-32602, format!("Unknown prompt: {}", name)));
    }
    let who = params
        .get("arguments")
        .and_then(|a| a.get("name"))
        .and_then(|n| n.as_str())
        .unwrap_or("world");
    Ok(json!({
        "description": "Greets someone",
        "messages": [{
            "role": "user",
            "content": { "type": "text", "text": format!("Hello, {}!", who) }
        }]
    }))
}

fn make_error(id: &Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message
        }
    })
}
