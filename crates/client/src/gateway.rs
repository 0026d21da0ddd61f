//! Command gateway: one mutating request per confirmed command.
//!
//! The executor acknowledges a command by creating a job and answering 2xx,
//! optionally with `{ "jobUuid": ... }`. The gateway never retries and never
//! waits for the job; convergence is observed through the status poller.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A mutating request against the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub method: Method,
    /// Path relative to the executor base URL, starting with `/`.
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl Command {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Successful acknowledgement of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandAck {
    pub status: u16,
    /// Job created for this command, when the executor reported one.
    pub job_uuid: Option<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Shown when the request may have reached the executor but no answer came
/// back.
pub const TRANSPORT_CAUSE: &str = "Could not confirm the request with the executor. \
     The command may or may not have been applied; check the current status before retrying.";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    /// The executor answered with a non-2xx status.
    #[error("Command rejected ({status}): {message}")]
    Application {
        status: u16,
        code: Option<String>,
        /// `message` from the failure body, or a generic cause.
        message: String,
        name: Option<String>,
    },

    /// No response was received (connect, DNS, timeout, broken body).
    #[error("Command request failed: {0}")]
    Transport(String),

    #[error("Invalid command path: {0}")]
    InvalidPath(String),
}

impl CommandError {
    /// Human-readable cause for the operator.
    pub fn cause(&self) -> String {
        match self {
            Self::Application { message, .. } => message.clone(),
            Self::Transport(_) => TRANSPORT_CAUSE.to_string(),
            Self::InvalidPath(path) => format!("Invalid command path {path:?}"),
        }
    }
}

impl From<reqwest::Error> for CommandError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Failure body convention of the executor.
#[derive(Debug, Default, Deserialize)]
struct FailureBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AckBody {
    #[serde(default, rename = "jobUuid")]
    job_uuid: Option<String>,
}

// ---------------------------------------------------------------------------
// Dispatcher seam
// ---------------------------------------------------------------------------

/// Sends a command to the executor.
#[async_trait]
pub trait CommandDispatcher: Send + Sync + 'static {
    async fn dispatch(&self, command: &Command) -> Result<CommandAck, CommandError>;
}

/// HTTP implementation of [`CommandDispatcher`].
#[derive(Debug, Clone)]
pub struct CommandGateway {
    client: reqwest::Client,
    api_url: String,
}

impl CommandGateway {
    /// * `api_url` - Executor base URL, e.g. `http://striker/api`.
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    /// Issue exactly one request for `command`.
    pub async fn send(&self, command: &Command) -> Result<CommandAck, CommandError> {
        let dot_segment = command
            .path
            .split('/')
            .any(|seg| !seg.is_empty() && seg.chars().all(|c| c == '.'));
        if !command.path.starts_with('/') || dot_segment {
            return Err(CommandError::InvalidPath(command.path.clone()));
        }

        let url = format!("{}{}", self.api_url, command.path);
        tracing::info!(method = %command.method, path = %command.path, "Dispatching command");

        let mut request = self.client.request(command.method.clone(), &url);
        if let Some(body) = &command.body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(method = %command.method, path = %command.path, error = %e, "Command request failed");
                return Err(e.into());
            }
        };

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let err = Self::application_error(status, &text);
            tracing::warn!(
                method = %command.method,
                path = %command.path,
                status = status.as_u16(),
                error = %err,
                "Command rejected"
            );
            return Err(err);
        }

        let ack = CommandAck {
            status: status.as_u16(),
            job_uuid: Self::job_uuid(&text),
        };
        tracing::info!(
            path = %command.path,
            status = ack.status,
            job_uuid = ack.job_uuid.as_deref().unwrap_or("-"),
            "Command accepted"
        );
        Ok(ack)
    }

    // ---- private helpers ----

    fn application_error(status: reqwest::StatusCode, text: &str) -> CommandError {
        let body: FailureBody = serde_json::from_str(text).unwrap_or_default();
        let message = body
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| match status.canonical_reason() {
                Some(reason) => format!("The request failed with {} {reason}.", status.as_u16()),
                None => format!("The request failed with status {}.", status.as_u16()),
            });
        let code = body.code.map(|code| match code {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });
        CommandError::Application {
            status: status.as_u16(),
            code,
            message,
            name: body.name,
        }
    }

    /// A 2xx body is free-form; anything that is not `{ jobUuid }` means no job.
    fn job_uuid(text: &str) -> Option<String> {
        if text.trim().is_empty() {
            return None;
        }
        serde_json::from_str::<AckBody>(text)
            .ok()
            .and_then(|ack| ack.job_uuid)
            .filter(|uuid| !uuid.is_empty())
    }
}

#[async_trait]
impl CommandDispatcher for CommandGateway {
    async fn dispatch(&self, command: &Command) -> Result<CommandAck, CommandError> {
        self.send(command).await
    }
}
