//! Gmail API client
//!
//! `GmailService` is a handle bound to one credential and one API
//! version. It is cheap to build and never cached.

use reqwest::{header::RETRY_AFTER, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::gmail::USER_ID;
use crate::error::{ApiError, AuthError, Result};
use crate::gmail::cleaner::BodyCleaner;
use crate::gmail::types::*;
use crate::gmail::utils::{create_email_message, encode_raw_message, extract_email_content, find_header, EmailParams};
use crate::google::credentials::Credential;

/// Root URL of the Google APIs
pub const DEFAULT_API_ROOT: &str = "https://gmail.googleapis.com";

/// Gmail API client
pub struct GmailService {
    /// HTTP client
    http_client: reqwest::Client,

    /// Bearer token
    access_token: String,

    /// `{root}/{service}/{version}`
    base_url: String,
}

impl GmailService {
    /// Build a service handle against the public Google API root
    pub fn build(credential: &Credential, service_name: &str, service_version: &str) -> Result<Self> {
        Self::build_at(DEFAULT_API_ROOT, credential, service_name, service_version)
    }

    /// Build a service handle against `api_root`
    pub fn build_at(
        api_root: &str,
        credential: &Credential,
        service_name: &str,
        service_version: &str,
    ) -> Result<Self> {
        if credential.access_token.is_empty() || credential.is_expired() {
            return Err(AuthError::InvalidCredential.into());
        }

        Ok(Self {
            http_client: reqwest::Client::new(),
            access_token: credential.access_token.clone(),
            base_url: format!(
                "{}/{}/{}",
                api_root.trim_end_matches('/'),
                service_name,
                service_version
            ),
        })
    }

    /// Base URL requests are issued against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn messages_url(&self) -> String {
        format!("{}/users/{}/messages", self.base_url, USER_ID)
    }

    fn threads_url(&self) -> String {
        format!("{}/users/{}/threads", self.base_url, USER_ID)
    }

    // ==================== Raw API Operations ====================

    /// List message references matching a Gmail query
    pub async fn list_messages(&self, query: &str, max_results: u32) -> Result<MessageList> {
        let url = format!(
            "{}?q={}&maxResults={}",
            self.messages_url(),
            urlencoding::encode(query),
            max_results
        );

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        parse_response(response, "search messages", None).await
    }

    /// Get a message by ID with its full MIME structure
    pub async fn get_message(&self, message_id: &str) -> Result<Message> {
        let url = format!("{}/{}?format=full", self.messages_url(), message_id);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        parse_response(response, "get message", Some(("Message", message_id))).await
    }

    /// Get a thread by ID (ids and snippets only)
    pub async fn get_thread(&self, thread_id: &str) -> Result<Thread> {
        let url = format!("{}/{}?format=minimal", self.threads_url(), thread_id);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        parse_response(response, "get thread", Some(("Thread", thread_id))).await
    }

    /// Send an already-encoded RFC 822 message
    pub async fn send_message(&self, raw: String, thread_id: Option<String>) -> Result<Message> {
        let request = SendMessageRequest { raw, thread_id };
        let url = format!("{}/send", self.messages_url());

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await?;

        parse_response(response, "send email", None).await
    }

    // ==================== Tool Operations ====================

    /// Search messages and return them with cleaned bodies
    pub async fn search_messages(
        &self,
        query: &str,
        max_results: u32,
        cleaner: &dyn BodyCleaner,
    ) -> Result<Vec<MessageSummary>> {
        let message_list = self.list_messages(query, max_results).await?;

        let mut results = Vec::with_capacity(message_list.messages.len());
        for msg_ref in message_list.messages {
            match self.get_message(&msg_ref.id).await {
                Ok(message) => results.push(summarize_message(message, cleaner)),
                Err(crate::error::GoogleMcpError::Api(ApiError::NotFound { .. })) => {
                    tracing::debug!("Message {} disappeared during search", msg_ref.id);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(results)
    }

    /// Search messages and return the threads they belong to
    pub async fn search_threads(&self, query: &str, max_results: u32) -> Result<Vec<ThreadSummary>> {
        let message_list = self.list_messages(query, max_results).await?;

        let mut thread_ids: Vec<String> = Vec::new();
        for msg_ref in message_list.messages {
            if !thread_ids.contains(&msg_ref.thread_id) {
                thread_ids.push(msg_ref.thread_id);
            }
        }

        let mut results = Vec::with_capacity(thread_ids.len());
        for thread_id in thread_ids {
            let thread = self.get_thread(&thread_id).await?;
            results.push(ThreadSummary {
                id: thread.id,
                messages: thread
                    .messages
                    .into_iter()
                    .map(|m| ThreadMessage {
                        id: m.id,
                        snippet: m.snippet.unwrap_or_default(),
                    })
                    .collect(),
            });
        }

        Ok(results)
    }

    /// Build and send an email, optionally inside an existing thread
    pub async fn send_email(&self, params: &EmailParams, thread_id: Option<String>) -> Result<Message> {
        let raw_message = create_email_message(params)?;
        self.send_message(encode_raw_message(&raw_message), thread_id).await
    }
}

/// Map a full Gmail message into what the agent sees
pub fn summarize_message(message: Message, cleaner: &dyn BodyCleaner) -> MessageSummary {
    let payload = message.payload.as_ref();
    let header = |name: &str| {
        payload
            .and_then(|p| find_header(p, name))
            .unwrap_or("")
            .to_string()
    };

    let content = payload.map(extract_email_content).unwrap_or_default();
    let snippet = message.snippet.clone().unwrap_or_default();

    let raw_body = if !content.text.is_empty() {
        content.text
    } else if !content.html.is_empty() {
        content.html
    } else {
        tracing::debug!(
            "Email {} body extraction returned empty, using snippet fallback",
            message.id
        );
        snippet.clone()
    };

    MessageSummary {
        thread_id: message.thread_id.clone().unwrap_or_default(),
        message_id: header("message-id"),
        subject: header("subject"),
        from: header("from"),
        to: header("to"),
        cc: header("cc"),
        date: header("date"),
        body: cleaner.clean(&raw_body),
        snippet,
        id: message.id,
    }
}

/// Decode a successful response or turn the failure into an `ApiError`
async fn parse_response<T: DeserializeOwned>(
    response: reqwest::Response,
    action: &str,
    target: Option<(&'static str, &str)>,
) -> Result<T> {
    let status = response.status();

    if status.is_success() {
        return Ok(response.json().await?);
    }

    if status == StatusCode::NOT_FOUND {
        if let Some((kind, id)) = target {
            return Err(ApiError::NotFound {
                kind,
                id: id.to_string(),
            }
            .into());
        }
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        return Err(ApiError::RateLimited { retry_after_secs }.into());
    }

    let text = response.text().await.unwrap_or_default();
    Err(ApiError::RequestFailed {
        status: status.as_u16(),
        message: format!("Failed to {}: {}", action, text),
    }
    .into())
}
