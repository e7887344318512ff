//! MCP protocol tests
//!
//! Drive the server with JSON-RPC lines. No tool here reaches Gmail.

mod common;

use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;

use common::*;
use google_mcp_server_rust::gmail::cleaner::RawBodyCleaner;
use google_mcp_server_rust::google::auth::TokenManager;
use google_mcp_server_rust::mcp::server::McpServer;
use google_mcp_server_rust::mcp::tools::{ToolHandler, Toolset};

/// Helper to create a JSON-RPC request
fn make_request(id: i64, method: &str, params: Option<Value>) -> String {
    let mut request = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
    });
    if let Some(p) = params {
        request["params"] = p;
    }
    request.to_string()
}

fn server(dir: &TempDir, toolset: Toolset) -> McpServer {
    let config = config(dir, "http://127.0.0.1:9");
    write_token(&config.token_path, &credential(3600, Some("refresh")));
    let manager = Arc::new(TokenManager::with_flow(config, counting_flow()));
    McpServer::new(ToolHandler::new(manager, Arc::new(RawBodyCleaner), toolset))
}

async fn call(server: &mut McpServer, message: &str) -> Value {
    let response = server.handle_message(message).await.unwrap().unwrap();
    serde_json::to_value(response).unwrap()
}

fn tool_names(response: &Value) -> Vec<String> {
    response["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect()
}

mod mcp_protocol_tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_reports_toolset_name() {
        let dir = TempDir::new().unwrap();

        for (toolset, name) in [
            (Toolset::Google, "google"),
            (Toolset::Email, "email"),
            (Toolset::All, "google-workspace"),
        ] {
            let mut server = server(&dir, toolset);
            let response = call(
                &mut server,
                &make_request(1, "initialize", Some(json!({
                    "protocolVersion": "2024-11-05",
                    "clientInfo": {"name": "test-client", "version": "1.0.0"},
                    "capabilities": {}
                }))),
            )
            .await;

            assert_eq!(response["id"], 1);
            assert_eq!(response["result"]["serverInfo"]["name"], name);
            assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
            assert!(response["result"]["capabilities"]["tools"].is_object());
        }
    }

    #[tokio::test]
    async fn test_initialized_notification_has_no_response() {
        let dir = TempDir::new().unwrap();
        let mut server = server(&dir, Toolset::All);

        let notification = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        assert!(server.handle_message(notification).await.unwrap().is_none());
        assert!(server.is_initialized());
    }

    #[tokio::test]
    async fn test_list_tools_per_toolset() {
        let dir = TempDir::new().unwrap();

        let mut google = server(&dir, Toolset::Google);
        let response = call(&mut google, &make_request(2, "tools/list", None)).await;
        assert_eq!(tool_names(&response), vec!["login", "logout"]);

        let mut email = server(&dir, Toolset::Email);
        let response = call(&mut email, &make_request(2, "tools/list", None)).await;
        assert_eq!(
            tool_names(&response),
            vec!["search_messages", "send_message", "reply_message"]
        );

        let mut all = server(&dir, Toolset::All);
        let response = call(&mut all, &make_request(2, "tools/list", None)).await;
        assert_eq!(tool_names(&response).len(), 5);
    }

    #[tokio::test]
    async fn test_tool_schemas_are_objects() {
        let dir = TempDir::new().unwrap();
        let mut server = server(&dir, Toolset::All);

        let response = call(&mut server, &make_request(3, "tools/list", None)).await;
        for tool in response["result"]["tools"].as_array().unwrap() {
            assert_eq!(tool["inputSchema"]["type"], "object", "{}", tool["name"]);
            assert!(tool["description"].is_string());
        }

        let send = response["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .find(|t| t["name"] == "send_message")
            .unwrap();
        let required = send["inputSchema"]["required"].as_array().unwrap();
        assert!(required.contains(&json!("to")));
        assert!(required.contains(&json!("message")));
        assert!(!required.contains(&json!("html_message")));
    }

    #[tokio::test]
    async fn test_ping() {
        let dir = TempDir::new().unwrap();
        let mut server = server(&dir, Toolset::All);

        let response = call(&mut server, &make_request(4, "ping", None)).await;
        assert_eq!(response["result"], json!({}));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let dir = TempDir::new().unwrap();
        let mut server = server(&dir, Toolset::All);

        let response = call(&mut server, &make_request(5, "resources/list", None)).await;
        assert_eq!(response["id"], 5);
        assert_eq!(response["error"]["code"], -32601);
        assert!(response.get("result").is_none());
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let dir = TempDir::new().unwrap();
        let mut server = server(&dir, Toolset::All);

        let response = call(&mut server, "{not json").await;
        assert_eq!(response["error"]["code"], -32700);
        assert!(response["id"].is_null());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_result() {
        let dir = TempDir::new().unwrap();
        let mut server = server(&dir, Toolset::All);

        let response = call(
            &mut server,
            &make_request(6, "tools/call", Some(json!({"name": "delete_everything", "arguments": {}}))),
        )
        .await;
        assert_eq!(response["result"]["isError"], true);
        assert!(response["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_call_without_params_is_invalid() {
        let dir = TempDir::new().unwrap();
        let mut server = server(&dir, Toolset::All);

        let response = call(&mut server, &make_request(7, "tools/call", None)).await;
        assert_eq!(response["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_logout_over_protocol() {
        let dir = TempDir::new().unwrap();
        let mut server = server(&dir, Toolset::Google);

        let response = call(
            &mut server,
            &make_request(8, "tools/call", Some(json!({"name": "logout"}))),
        )
        .await;
        assert!(response["result"].get("isError").is_none());
        assert_eq!(response["result"]["content"][0]["type"], "text");
    }

    #[tokio::test]
    async fn test_run_processes_lines_in_order() {
        let dir = TempDir::new().unwrap();
        let mut server = server(&dir, Toolset::All);

        let input = format!(
            "{}\n\n{}\n{}\n",
            make_request(1, "ping", None),
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            make_request(2, "tools/list", None),
        );
        let mut output = Vec::new();
        server.run(input.as_bytes(), &mut output).await.unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[1]["id"], 2);
        assert!(server.is_initialized());
    }

    #[tokio::test]
    async fn test_run_survives_invalid_utf8_line() {
        let dir = TempDir::new().unwrap();
        let mut server = server(&dir, Toolset::All);

        let mut input = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"\xff\xfe\"}\n".to_vec();
        input.extend_from_slice(make_request(2, "ping", None).as_bytes());
        input.push(b'\n');

        let mut output = Vec::new();
        server.run(input.as_slice(), &mut output).await.unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["error"]["code"], -32700);
        assert!(lines[0]["id"].is_null());
        assert_eq!(lines[1]["id"], 2);
        assert_eq!(lines[1]["result"], json!({}));
    }
}
