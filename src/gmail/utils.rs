//! Gmail utility functions
//!
//! Email creation, validation, and content extraction utilities.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{distributions::Alphanumeric, Rng};

use crate::error::{GoogleMcpError, Result, ValidationError};
use crate::gmail::types::{EmailContent, MessagePart};

/// Validate an email address, accepting the `Name <addr>` form
pub fn validate_email(email: &str) -> bool {
    let address = match (email.rfind('<'), email.rfind('>')) {
        (Some(start), Some(end)) if start < end => &email[start + 1..end],
        _ => email.trim(),
    };

    let parts: Vec<&str> = address.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    let (local, domain) = (parts[0], parts[1]);

    !local.is_empty()
        && !domain.is_empty()
        && !local.contains(' ')
        && !domain.contains(' ')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Encode text for MIME header (RFC 2047)
pub fn encode_mime_header(text: &str) -> String {
    if text.chars().all(|c| c.is_ascii() && c != '\r' && c != '\n') {
        return text.to_string();
    }

    format!(
        "=?UTF-8?B?{}?=",
        base64::engine::general_purpose::STANDARD.encode(text.as_bytes())
    )
}

/// Encode a raw email message for Gmail API (base64url, no padding)
pub fn encode_raw_message(message: &str) -> String {
    URL_SAFE_NO_PAD.encode(message.as_bytes())
}

/// Decode base64url data from Gmail API.
/// Accepts padded and unpadded input.
pub fn decode_base64url(data: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(data)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE.decode(data))
        .or_else(|_| base64::engine::general_purpose::STANDARD.decode(data))
        .map_err(|e| {
            GoogleMcpError::Validation(ValidationError::InvalidParameter {
                name: "base64 data".to_string(),
                message: e.to_string(),
            })
        })
}

/// Decode base64url data to string
pub fn decode_base64url_string(data: &str) -> Result<String> {
    let bytes = decode_base64url(data)?;
    String::from_utf8(bytes).map_err(|e| {
        GoogleMcpError::Validation(ValidationError::InvalidParameter {
            name: "UTF-8 content".to_string(),
            message: e.to_string(),
        })
    })
}

/// Recursively extract email body content from MIME message parts
pub fn extract_email_content(message_part: &MessagePart) -> EmailContent {
    let mut content = EmailContent::default();

    let mime_type = message_part.mime_type.as_deref().unwrap_or("");

    if let Some(data) = message_part.body.as_ref().and_then(|b| b.data.as_ref()) {
        // Attachments carry non-text data; skip them
        if mime_type.starts_with("text/") {
            match decode_base64url_string(data) {
                Ok(decoded) => {
                    if mime_type == "text/plain" {
                        content.text = decoded;
                    } else if mime_type == "text/html" {
                        content.html = decoded;
                    }
                }
                Err(e) => {
                    tracing::debug!("Failed to decode {} part: {}", mime_type, e);
                }
            }
        }
    }

    // multipart/alternative, multipart/mixed, multipart/related, ...
    for part in &message_part.parts {
        let nested = extract_email_content(part);
        content.text.push_str(&nested.text);
        content.html.push_str(&nested.html);
    }

    content
}

/// Find header value by name (case-insensitive)
pub fn find_header<'a>(part: &'a MessagePart, name: &str) -> Option<&'a str> {
    part.headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// CR or LF would end the header line and start a new one
fn has_line_break(value: &str) -> bool {
    value.contains(&['\r', '\n'][..])
}

/// Prefix `Re: ` unless the subject already carries it
pub fn reply_subject(subject: &str) -> String {
    let prefix = subject.trim_start().get(..3);
    if prefix.is_some_and(|p| p.eq_ignore_ascii_case("re:")) {
        subject.to_string()
    } else {
        format!("Re: {}", subject)
    }
}

/// Parameters for creating an email message
#[derive(Debug, Clone, Default)]
pub struct EmailParams {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub html_body: Option<String>,
    pub cc: Option<Vec<String>>,
    pub bcc: Option<Vec<String>>,
    pub in_reply_to: Option<String>,
}

impl EmailParams {
    /// Check every recipient address and every value written into a header
    pub fn validate(&self) -> Result<()> {
        if self.to.is_empty() {
            return Err(ValidationError::MissingField {
                field: "to".to_string(),
            }
            .into());
        }

        if let Some(ref in_reply_to) = self.in_reply_to {
            if has_line_break(in_reply_to) {
                return Err(ValidationError::InvalidParameter {
                    name: "in_reply_to".to_string(),
                    message: "must not contain line breaks".to_string(),
                }
                .into());
            }
        }

        let cc = self.cc.iter().flatten();
        let bcc = self.bcc.iter().flatten();
        for email in self.to.iter().chain(cc).chain(bcc) {
            if has_line_break(email) || !validate_email(email) {
                return Err(ValidationError::InvalidEmail {
                    email: email.clone(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Create an RFC 822 message: plain text, or multipart/alternative when an
/// HTML body is given
pub fn create_email_message(params: &EmailParams) -> Result<String> {
    params.validate()?;

    let mut lines = Vec::new();

    lines.push(format!("To: {}", params.to.join(", ")));

    if let Some(cc) = params.cc.as_ref().filter(|cc| !cc.is_empty()) {
        lines.push(format!("Cc: {}", cc.join(", ")));
    }

    if let Some(bcc) = params.bcc.as_ref().filter(|bcc| !bcc.is_empty()) {
        lines.push(format!("Bcc: {}", bcc.join(", ")));
    }

    lines.push(format!("Subject: {}", encode_mime_header(&params.subject)));

    if let Some(ref in_reply_to) = params.in_reply_to {
        lines.push(format!("In-Reply-To: {}", in_reply_to));
        lines.push(format!("References: {}", in_reply_to));
    }

    lines.push("MIME-Version: 1.0".to_string());

    if let Some(ref html_body) = params.html_body {
        let boundary = format!("----=_NextPart_{}", generate_boundary());
        lines.push(format!(
            "Content-Type: multipart/alternative; boundary=\"{}\"",
            boundary
        ));
        lines.push(String::new());

        lines.push(format!("--{}", boundary));
        lines.push("Content-Type: text/plain; charset=UTF-8".to_string());
        lines.push("Content-Transfer-Encoding: 8bit".to_string());
        lines.push(String::new());
        lines.push(params.body.clone());
        lines.push(String::new());

        lines.push(format!("--{}", boundary));
        lines.push("Content-Type: text/html; charset=UTF-8".to_string());
        lines.push("Content-Transfer-Encoding: 8bit".to_string());
        lines.push(String::new());
        lines.push(html_body.clone());
        lines.push(String::new());

        lines.push(format!("--{}--", boundary));
    } else {
        lines.push("Content-Type: text/plain; charset=UTF-8".to_string());
        lines.push("Content-Transfer-Encoding: 8bit".to_string());
        lines.push(String::new());
        lines.push(params.body.clone());
    }

    Ok(lines.join("\r\n"))
}

/// Boundary string for multipart messages
fn generate_boundary() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect()
}
