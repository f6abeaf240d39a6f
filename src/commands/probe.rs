//! `mcpbench probe` handler
//!
//! Connects one client, pings, lists every tool, resource, and prompt the
//! server advertises, optionally calls one tool, and disconnects.

use colored::Colorize;
use prettytable::{row, Table};

use crate::commands::http_client_for;
use crate::config::Config;
use crate::error::{McpBenchError, Result};
use crate::mcp::types::{
    CallToolParams, CallToolResult, ListAllParams, McpTool, Prompt, Resource, ToolResponseContent,
};
use crate::mcp::Client;

/// Run the probe command
///
/// # Arguments
///
/// * `config` - Validated configuration
/// * `call_tool` - Optional tool to call after listing
/// * `tool_args` - JSON object of arguments for `call_tool`
///
/// # Errors
///
/// Returns an error if the connection or any listing fails, or if
/// `tool_args` is not a JSON object.
pub async fn run_probe(
    config: Config,
    call_tool: Option<String>,
    tool_args: Option<String>,
) -> Result<()> {
    let arguments = tool_args.as_deref().map(parse_tool_args).transpose()?;

    let http = http_client_for(&config)?;
    let client = Client::connect(&config.client, config.transport, http).await?;

    let outcome = probe(&client, call_tool, arguments).await;
    client.close().await?;
    outcome
}

async fn probe(
    client: &Client,
    call_tool: Option<String>,
    arguments: Option<serde_json::Value>,
) -> Result<()> {
    let capabilities = match client.server_info() {
        Some(info) => {
            println!(
                "{} {} {} (protocol {})",
                "Connected to".green(),
                info.server_info.name.bold(),
                info.server_info.version,
                info.protocol_version
            );
            if let Some(ref instructions) = info.instructions {
                println!("{}", instructions.dimmed());
            }
            info.capabilities.clone()
        }
        None => Default::default(),
    };

    if client.ping().await {
        println!("{}", "ping ok".green());
    } else {
        println!("{}", "ping failed".yellow());
    }

    if capabilities.tools.is_some() {
        let tools = client.list_all_tools(ListAllParams::default()).await?;
        print_tools(&tools.tools);
    }
    if capabilities.resources.is_some() {
        let resources = client
            .list_all_resources(ListAllParams::default())
            .await?;
        print_resources(&resources.resources);
    }
    if capabilities.prompts.is_some() {
        let prompts = client.list_all_prompts(ListAllParams::default()).await?;
        print_prompts(&prompts.prompts);
    }

    if let Some(name) = call_tool {
        let mut params = CallToolParams::new(&name);
        params.arguments = arguments;
        let result = client.call_tool(params).await?;
        print_call_result(&name, &result);
    }

    Ok(())
}

fn parse_tool_args(raw: &str) -> Result<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| McpBenchError::Config(format!("Invalid --tool-args JSON: {}", e)))?;
    if !value.is_object() {
        return Err(
            McpBenchError::Config("--tool-args must be a JSON object".to_string()).into(),
        );
    }
    Ok(value)
}

fn print_tools(tools: &[McpTool]) {
    let mut table = Table::new();
    table.add_row(row!["Tool", "Description"]);
    for tool in tools {
        table.add_row(row![tool.name, tool.description.as_deref().unwrap_or("")]);
    }
    println!("\n{} tools:\n", tools.len());
    table.printstd();
}

fn print_resources(resources: &[Resource]) {
    let mut table = Table::new();
    table.add_row(row!["URI", "Name", "MIME Type"]);
    for resource in resources {
        table.add_row(row![
            resource.uri,
            resource.name,
            resource.mime_type.as_deref().unwrap_or("-")
        ]);
    }
    println!("\n{} resources:\n", resources.len());
    table.printstd();
}

fn print_prompts(prompts: &[Prompt]) {
    let mut table = Table::new();
    table.add_row(row!["Prompt", "Arguments"]);
    for prompt in prompts {
        let arguments = prompt
            .arguments
            .as_ref()
            .map(|args| {
                args.iter()
                    .map(|a| a.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        table.add_row(row![prompt.name, arguments]);
    }
    println!("\n{} prompts:\n", prompts.len());
    table.printstd();
}

fn print_call_result(name: &str, result: &CallToolResult) {
    let status = if result.is_error == Some(true) {
        "reported an error".red()
    } else {
        "succeeded".green()
    };
    println!("\n{} {}", format!("tools/call {}", name).bold(), status);
    for line in summarize_content(&result.content) {
        println!("  {}", line);
    }
    if let Some(ref structured) = result.structured_content {
        println!("  structured: {}", structured);
    }
}

fn summarize_content(content: &[ToolResponseContent]) -> Vec<String> {
    content
        .iter()
        .map(|item| match item {
            ToolResponseContent::Text { text } => text.clone(),
            ToolResponseContent::Image { mime_type, data } => {
                format!("[image {} ({} bytes base64)]", mime_type, data.len())
            }
            ToolResponseContent::Audio { mime_type, data } => {
                format!("[audio {} ({} bytes base64)]", mime_type, data.len())
            }
            ToolResponseContent::Resource { .. } => "[embedded resource]".to_string(),
            ToolResponseContent::ResourceLink { uri, .. } => format!("[link {}]", uri),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::transport::fake::FakeTransport;
    use crate::mcp::ConnectOptions;
    use crate::test_utils::{initialize_result, spawn_fake_server, Reply};
    use std::sync::Arc;

    #[test]
    fn test_parse_tool_args() {
        assert_eq!(parse_tool_args(r#"{"a":1}"#).unwrap()["a"], 1);
        assert!(parse_tool_args("[1,2]").is_err());
        assert!(parse_tool_args("not json").is_err());
    }

    #[test]
    fn test_summarize_content() {
        let lines = summarize_content(&[
            ToolResponseContent::Text {
                text: "hello".into(),
            },
            ToolResponseContent::ResourceLink {
                uri: "file:///a".into(),
                name: "a".into(),
                mime_type: None,
            },
        ]);
        assert_eq!(lines, vec!["hello".to_string(), "[link file:///a]".to_string()]);
    }

    #[tokio::test]
    async fn test_probe_lists_advertised_capabilities_only() {
        let (transport, handle) = FakeTransport::new();
        let server = spawn_fake_server(handle, |method, _| match method {
            "initialize" => {
                let mut result = initialize_result("2025-11-25");
                result["capabilities"] = serde_json::json!({ "tools": {} });
                Reply::Result(result)
            }
            "tools/list" => Reply::Result(serde_json::json!({
                "tools": [{ "name": "echo", "inputSchema": {} }]
            })),
            "tools/call" => Reply::Result(serde_json::json!({
                "content": [{ "type": "text", "text": "hi" }]
            })),
            _ => Reply::Result(serde_json::json!({})),
        });
        let client = Client::connect_with_transport(
            Arc::new(transport),
            ConnectOptions::from_config(&Default::default(), None),
        )
        .await
        .unwrap();

        probe(
            &client,
            Some("echo".into()),
            Some(serde_json::json!({ "message": "hi" })),
        )
        .await
        .unwrap();

        let methods: Vec<_> = server
            .requests()
            .await
            .into_iter()
            .map(|r| r.method)
            .collect();
        assert!(methods.contains(&"tools/list".to_string()));
        assert!(methods.contains(&"tools/call".to_string()));
        assert!(!methods.contains(&"resources/list".to_string()));
        assert!(!methods.contains(&"prompts/list".to_string()));
    }
}
