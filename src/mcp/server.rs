//! MCP Server implementation
//!
//! Implements the Model Context Protocol server for stdio transport.
//! Messages are newline-delimited JSON-RPC and handled one at a time.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::mcp::tools::ToolHandler;
use crate::mcp::types::*;

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// MCP Server for the Google tools
pub struct McpServer {
    /// Tool handler
    tool_handler: ToolHandler,

    /// Whether the client sent `notifications/initialized`
    initialized: bool,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(tool_handler: ToolHandler) -> Self {
        Self {
            tool_handler,
            initialized: false,
        }
    }

    /// Whether the handshake completed
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Run the server on stdio
    pub async fn run_stdio(&mut self) -> Result<()> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.run(stdin, stdout).await
    }

    /// Serve requests read from `reader` until it reaches end of input
    pub async fn run<R, W>(&mut self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim(),
                Err(e) => {
                    tracing::warn!("Skipping line that is not UTF-8: {}", e);
                    let response = JsonRpcResponse::error(
                        None,
                        JsonRpcError::parse_error(format!("Parse error: {}", e)),
                    );
                    write_response(&mut writer, &response).await?;
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }

            match self.handle_message(line).await {
                Ok(Some(response)) => write_response(&mut writer, &response).await?,
                Ok(None) => {
                    // Notification, no response needed
                }
                Err(e) => {
                    tracing::error!("Error handling message: {}", e);
                }
            }
        }

        tracing::info!("Input closed, shutting down");
        Ok(())
    }

    /// Handle an incoming JSON-RPC message
    pub async fn handle_message(&mut self, message: &str) -> Result<Option<JsonRpcResponse>> {
        let request: JsonRpcRequest = match serde_json::from_str(message) {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!("Unparseable message: {}", e);
                return Ok(Some(JsonRpcResponse::error(
                    None,
                    JsonRpcError::parse_error(format!("Parse error: {}", e)),
                )));
            }
        };

        tracing::debug!("Received {}", request.method);

        if request.id.is_none() {
            if request.method == methods::INITIALIZED {
                self.initialized = true;
            }
            return Ok(None);
        }

        match request.method.as_str() {
            methods::INITIALIZE => {
                let result = self.handle_initialize()?;
                Ok(Some(JsonRpcResponse::success(request.id, result)))
            }
            methods::INITIALIZED => {
                self.initialized = true;
                Ok(Some(JsonRpcResponse::success(request.id, serde_json::json!({}))))
            }
            methods::PING => Ok(Some(JsonRpcResponse::success(
                request.id,
                serde_json::json!({}),
            ))),
            methods::LIST_TOOLS => {
                let result = self.handle_list_tools()?;
                Ok(Some(JsonRpcResponse::success(request.id, result)))
            }
            methods::CALL_TOOL => {
                let params: CallToolParams = match request
                    .params
                    .clone()
                    .map(serde_json::from_value)
                    .transpose()
                {
                    Ok(Some(params)) => params,
                    Ok(None) => {
                        return Ok(Some(JsonRpcResponse::error(
                            request.id,
                            JsonRpcError::invalid_params("Missing tool parameters"),
                        )))
                    }
                    Err(e) => {
                        return Ok(Some(JsonRpcResponse::error(
                            request.id,
                            JsonRpcError::invalid_params(format!("Invalid tool parameters: {}", e)),
                        )))
                    }
                };

                let result = self.handle_call_tool(params).await?;
                Ok(Some(JsonRpcResponse::success(request.id, result)))
            }
            _ => Ok(Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::method_not_found(&request.method),
            ))),
        }
    }

    /// Handle initialize request
    fn handle_initialize(&self) -> Result<Value> {
        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            server_info: ServerInfo {
                name: self.tool_handler.toolset().server_name().to_string(),
                version: SERVER_VERSION.to_string(),
            },
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
            },
        };

        Ok(serde_json::to_value(result)?)
    }

    /// Handle list tools request
    fn handle_list_tools(&self) -> Result<Value> {
        let result = ListToolsResult {
            tools: self.tool_handler.list_tools(),
        };

        Ok(serde_json::to_value(result)?)
    }

    /// Handle call tool request
    async fn handle_call_tool(&self, params: CallToolParams) -> Result<Value> {
        tracing::info!("Calling tool {}", params.name);
        let result = self.tool_handler.call_tool(&params.name, params.arguments).await;
        if result.is_error {
            tracing::warn!("Tool {} failed: {}", params.name, result.first_text().unwrap_or(""));
        }
        Ok(serde_json::to_value(result)?)
    }
}

/// Write one response as a single line
async fn write_response<W: AsyncWrite + Unpin>(writer: &mut W, response: &JsonRpcResponse) -> Result<()> {
    let mut response_str = serde_json::to_string(response)?;
    response_str.push('\n');
    writer.write_all(response_str.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
