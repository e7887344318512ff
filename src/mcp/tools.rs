//! MCP Tool definitions and handlers
//!
//! Every call is stateless: acquire a credential, build a service handle,
//! run one Gmail operation and map the result to JSON.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::gmail::{SERVICE_NAME, SERVICE_VERSION};
use crate::error::{McpError, Result, ValidationError};
use crate::gmail::cleaner::BodyCleaner;
use crate::gmail::client::GmailService;
use crate::gmail::types::SentMessage;
use crate::gmail::utils::{reply_subject, EmailParams};
use crate::google::auth::TokenManager;
use crate::google::scope::Scope;
use crate::mcp::types::{CallToolResult, Tool};

/// Scopes every email tool runs under
const EMAIL_SCOPES: &[Scope] = &[Scope::Gmail];

const GOOGLE_TOOLS: &[&str] = &["login", "logout"];
const EMAIL_TOOLS: &[&str] = &["search_messages", "send_message", "reply_message"];

/// Which group of tools the server exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Toolset {
    /// Account tools (login, logout)
    Google,
    /// Gmail tools
    Email,
    /// Both
    #[default]
    All,
}

impl Toolset {
    /// Server name reported on `initialize`
    pub fn server_name(&self) -> &'static str {
        match self {
            Toolset::Google => "google",
            Toolset::Email => "email",
            Toolset::All => "google-workspace",
        }
    }

    /// Whether `tool` belongs to this toolset
    pub fn includes(&self, tool: &str) -> bool {
        let google = GOOGLE_TOOLS.contains(&tool);
        let email = EMAIL_TOOLS.contains(&tool);
        match self {
            Toolset::Google => google,
            Toolset::Email => email,
            Toolset::All => google || email,
        }
    }
}

// ==================== Tool Arguments ====================

/// A single value or a list of values
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

/// What `search_messages` returns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchResource {
    #[default]
    Messages,
    Threads,
}

fn default_max_results() -> u32 {
    10
}

/// Arguments of `search_messages`
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchMessagesArgs {
    /// Gmail search query, e.g. `from:alice is:unread`
    pub query: String,
    /// Return messages or the threads they belong to
    #[serde(default)]
    pub resource: SearchResource,
    /// Maximum number of messages to list
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

/// Arguments of `send_message`
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SendMessageArgs {
    /// Plain text body
    pub message: String,
    /// Recipient address or list of addresses
    pub to: OneOrMany,
    pub subject: String,
    pub cc: Option<OneOrMany>,
    pub bcc: Option<OneOrMany>,
    /// HTML alternative of the body
    pub html_message: Option<String>,
}

/// Arguments of `reply_message`
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReplyMessageArgs {
    /// Thread the reply belongs to
    pub thread_id: String,
    /// `Message-ID` header of the message being answered
    pub in_reply_to: String,
    pub to: OneOrMany,
    pub subject: String,
    /// Plain text body
    pub message: String,
    pub cc: Option<OneOrMany>,
    pub bcc: Option<OneOrMany>,
}

/// A scope given as `{"scope": ...}` or as a bare value
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ScopeArg {
    Object { scope: String },
    Bare(String),
}

impl ScopeArg {
    fn as_str(&self) -> &str {
        match self {
            ScopeArg::Object { scope } => scope,
            ScopeArg::Bare(scope) => scope,
        }
    }
}

/// Arguments of `login`
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct LoginArgs {
    /// Scope URIs or names (GMAIL, CALENDAR, CALENDAR_EVENTS). Defaults apply when empty.
    #[serde(default)]
    pub scopes: Option<Vec<ScopeArg>>,
}

/// Arguments of `logout`
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct LogoutArgs {}

/// Tool handler
pub struct ToolHandler {
    auth: Arc<TokenManager>,
    cleaner: Arc<dyn BodyCleaner>,
    toolset: Toolset,
}

impl ToolHandler {
    /// Create a new tool handler
    pub fn new(auth: Arc<TokenManager>, cleaner: Arc<dyn BodyCleaner>, toolset: Toolset) -> Self {
        Self {
            auth,
            cleaner,
            toolset,
        }
    }

    /// Toolset this handler serves
    pub fn toolset(&self) -> Toolset {
        self.toolset
    }

    /// List the tools of the configured toolset
    pub fn list_tools(&self) -> Vec<Tool> {
        let all = vec![
            tool_def(
                "login",
                "Log in to the Google account with the given scopes, running the browser consent flow when needed",
                schema::<LoginArgs>(),
            ),
            tool_def(
                "logout",
                "Log out of the Google account (currently performs no action)",
                schema::<LogoutArgs>(),
            ),
            tool_def(
                "search_messages",
                "Searches Gmail using Gmail search syntax and returns messages or threads",
                schema::<SearchMessagesArgs>(),
            ),
            tool_def("send_message", "Sends a new email", schema::<SendMessageArgs>()),
            tool_def(
                "reply_message",
                "Replies to an email inside an existing thread",
                schema::<ReplyMessageArgs>(),
            ),
        ];

        all.into_iter()
            .filter(|tool| self.toolset.includes(&tool.name))
            .collect()
    }

    /// Call a tool by name
    pub async fn call_tool(&self, name: &str, args: Value) -> CallToolResult {
        if !self.toolset.includes(name) {
            return unknown_tool(name);
        }

        let args = if args.is_null() { json!({}) } else { args };

        match name {
            "login" => self.handle_login(args).await,
            "logout" => self.handle_logout().await,
            "search_messages" => self.handle_search_messages(args).await,
            "send_message" => self.handle_send_message(args).await,
            "reply_message" => self.handle_reply_message(args).await,
            _ => unknown_tool(name),
        }
    }

    /// Acquire a credential for `scopes` and build a Gmail service handle
    async fn service(&self, scopes: &[Scope]) -> Result<GmailService> {
        let credential = self.auth.acquire(scopes).await?;
        GmailService::build_at(
            &self.auth.config().api_root,
            &credential,
            SERVICE_NAME,
            SERVICE_VERSION,
        )
    }

    // ==================== Tool Handlers ====================

    async fn handle_login(&self, args: Value) -> CallToolResult {
        let args: LoginArgs = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(e) => return invalid_arguments(e),
        };

        let mut scopes = Vec::new();
        for arg in args.scopes.unwrap_or_default() {
            match Scope::parse(arg.as_str()) {
                Some(scope) => scopes.push(scope),
                None => {
                    let e = ValidationError::InvalidParameter {
                        name: "scopes".to_string(),
                        message: format!("unknown scope '{}'", arg.as_str()),
                    };
                    return CallToolResult::error(e.to_string());
                }
            }
        }

        if let Err(e) = self.service(&scopes).await {
            return CallToolResult::error(e.to_string());
        }

        let granted = self.auth.resolve(&scopes);
        tracing::info!("Logged in with scopes {:?}", granted);
        CallToolResult::json(&json!({
            "status": format!("OK, logged in successfully with the given scopes {:?}", granted)
        }))
    }

    async fn handle_logout(&self) -> CallToolResult {
        tracing::warn!(
            "logout performs no action; delete {} to forget the stored credential",
            self.auth.store().path().display()
        );
        CallToolResult::json(&json!({
            "status": "Logout is not implemented: the stored credential was neither revoked nor deleted"
        }))
    }

    async fn handle_search_messages(&self, args: Value) -> CallToolResult {
        let args: SearchMessagesArgs = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(e) => return invalid_arguments(e),
        };

        let service = match self.service(EMAIL_SCOPES).await {
            Ok(s) => s,
            Err(e) => return CallToolResult::error(e.to_string()),
        };

        match args.resource {
            SearchResource::Messages => {
                match service
                    .search_messages(&args.query, args.max_results, self.cleaner.as_ref())
                    .await
                {
                    Ok(messages) => CallToolResult::json(&messages),
                    Err(e) => CallToolResult::error(e.to_string()),
                }
            }
            SearchResource::Threads => {
                match service.search_threads(&args.query, args.max_results).await {
                    Ok(threads) => CallToolResult::json(&threads),
                    Err(e) => CallToolResult::error(e.to_string()),
                }
            }
        }
    }

    async fn handle_send_message(&self, args: Value) -> CallToolResult {
        let args: SendMessageArgs = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(e) => return invalid_arguments(e),
        };

        let params = EmailParams {
            to: args.to.into_vec(),
            subject: args.subject,
            body: args.message,
            html_body: args.html_message,
            cc: args.cc.map(OneOrMany::into_vec),
            bcc: args.bcc.map(OneOrMany::into_vec),
            in_reply_to: None,
        };

        self.send(params, None).await
    }

    async fn handle_reply_message(&self, args: Value) -> CallToolResult {
        let args: ReplyMessageArgs = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(e) => return invalid_arguments(e),
        };

        let params = EmailParams {
            to: args.to.into_vec(),
            subject: reply_subject(&args.subject),
            body: args.message,
            html_body: None,
            cc: args.cc.map(OneOrMany::into_vec),
            bcc: args.bcc.map(OneOrMany::into_vec),
            in_reply_to: Some(args.in_reply_to),
        };

        self.send(params, Some(args.thread_id)).await
    }

    async fn send(&self, params: EmailParams, thread_id: Option<String>) -> CallToolResult {
        // Reject bad recipients before any credential work
        if let Err(e) = params.validate() {
            return CallToolResult::error(e.to_string());
        }

        let service = match self.service(EMAIL_SCOPES).await {
            Ok(s) => s,
            Err(e) => return CallToolResult::error(e.to_string()),
        };

        match service.send_email(&params, thread_id).await {
            Ok(message) => {
                tracing::info!("Sent message {}", message.id);
                CallToolResult::json(&SentMessage::from(message))
            }
            Err(e) => CallToolResult::error(e.to_string()),
        }
    }
}

// ==================== Tool Definitions ====================

fn tool_def(name: &str, description: &str, input_schema: Value) -> Tool {
    Tool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema,
    }
}

fn unknown_tool(name: &str) -> CallToolResult {
    CallToolResult::error(
        McpError::UnknownTool {
            name: name.to_string(),
        }
        .to_string(),
    )
}

fn invalid_arguments(e: serde_json::Error) -> CallToolResult {
    CallToolResult::error(
        McpError::InvalidArguments {
            message: e.to_string(),
        }
        .to_string(),
    )
}

fn schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| json!({"type": "object"}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toolset_membership() {
        assert!(Toolset::Google.includes("login"));
        assert!(!Toolset::Google.includes("send_message"));
        assert!(Toolset::Email.includes("reply_message"));
        assert!(!Toolset::Email.includes("logout"));
        assert!(Toolset::All.includes("search_messages"));
        assert!(!Toolset::All.includes("delete_everything"));
    }

    #[test]
    fn test_server_names() {
        assert_eq!(Toolset::Google.server_name(), "google");
        assert_eq!(Toolset::Email.server_name(), "email");
        assert_eq!(Toolset::All.server_name(), "google-workspace");
    }

    #[test]
    fn test_recipients_accept_string_or_list() {
        let args: SendMessageArgs = serde_json::from_value(json!({
            "message": "hi",
            "to": "a@example.com",
            "subject": "s",
            "cc": ["b@example.com", "c@example.com"]
        }))
        .unwrap();
        assert_eq!(args.to.into_vec(), vec!["a@example.com"]);
        assert_eq!(args.cc.unwrap().into_vec().len(), 2);
    }

    #[test]
    fn test_search_defaults() {
        let args: SearchMessagesArgs = serde_json::from_value(json!({"query": "is:unread"})).unwrap();
        assert_eq!(args.resource, SearchResource::Messages);
        assert_eq!(args.max_results, 10);
    }

    #[test]
    fn test_scope_args_both_shapes() {
        let args: LoginArgs = serde_json::from_value(json!({
            "scopes": [{"scope": "GMAIL"}, "https://www.googleapis.com/auth/calendar"]
        }))
        .unwrap();
        let parsed: Vec<_> = args
            .scopes
            .unwrap()
            .iter()
            .filter_map(|s| Scope::parse(s.as_str()))
            .collect();
        assert_eq!(parsed, vec![Scope::Gmail, Scope::Calendar]);
    }

    #[test]
    fn test_schema_lists_required_fields() {
        let schema = schema::<ReplyMessageArgs>();
        let required = schema["required"].as_array().unwrap();
        assert!(required.contains(&json!("thread_id")));
        assert!(required.contains(&json!("in_reply_to")));
        assert!(!required.contains(&json!("cc")));
    }
}
