//! Assistants API client implementation
//!
//! Implements OracleClient over an OpenAI-style assistants API: a task is a
//! thread, a turn is a message, and a run asks the assistant to reply.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, RequestBuilder};
use serde_json::{Value, json};
use tokio::sync::OnceCell;

use crate::domain::{Role, RunHandle, RunId, RunStatus, TaskId, Turn};
use crate::error::{ActloopError, Result};
use crate::oracle::client::OracleClient;

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model to use
pub const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";

/// Beta header required by the assistants endpoints
const ASSISTANTS_BETA: &str = "assistants=v2";

/// Configuration for the assistants client
#[derive(Debug, Clone)]
pub struct AssistantsConfig {
    pub base_url: String,
    pub model: String,
    pub assistant_name: String,
    pub instructions: String,
    pub timeout: Duration,
}

impl Default for AssistantsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            assistant_name: "actloop".to_string(),
            instructions: String::new(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Assistants API client
pub struct AssistantsClient {
    client: Client,
    api_key: String,
    config: AssistantsConfig,
    assistant_id: OnceCell<String>,
}

impl AssistantsClient {
    /// Create a client reading the API key from `api_key_env`
    pub fn from_env(api_key_env: &str, config: AssistantsConfig) -> Result<Self> {
        let api_key = std::env::var(api_key_env)
            .map_err(|_| ActloopError::Config(format!("{} is not set in the environment", api_key_env)))?;

        Self::with_api_key(api_key, config)
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: String, config: AssistantsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ActloopError::Oracle(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            config,
            assistant_id: OnceCell::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", ASSISTANTS_BETA)
            .header("content-type", "application/json")
    }

    /// Body for creating the assistant
    fn assistant_body(&self) -> Value {
        json!({
            "name": self.config.assistant_name,
            "instructions": self.config.instructions,
            "model": self.config.model,
        })
    }

    /// Body for appending a user message to a thread
    fn message_body(content: &str) -> Value {
        json!({
            "role": "user",
            "content": content,
        })
    }

    /// Body for starting a run
    fn run_body(assistant_id: &str) -> Value {
        json!({ "assistant_id": assistant_id })
    }

    /// Send a request and decode the JSON response
    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ActloopError::Oracle(format!("Request failed: {}", e)))?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ActloopError::Oracle(format!(
                "Rate limited, retry after {} seconds",
                retry_after
            )));
        }

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ActloopError::Oracle(format!(
                "API error {}: {}",
                status,
                error_body.replace('\n', " ")
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ActloopError::Oracle(format!("Failed to read response: {}", e)))?;
        parse_body(&text)
    }

    async fn ensure_assistant(&self) -> Result<&str> {
        let id = self
            .assistant_id
            .get_or_try_init(|| async {
                let body = self.assistant_body();
                let response = self.send(self.client.post(self.url("assistants")).json(&body)).await?;
                let id = parse_id(&response, "assistant")?;
                info!("Created assistant {} ({})", id, self.config.model);
                Ok::<_, ActloopError>(id)
            })
            .await?;
        Ok(id.as_str())
    }
}

/// Extract the `id` field of a created object
/// Successful responses must be JSON
fn parse_body(text: &str) -> Result<Value> {
    Ok(serde_json::from_str(text)?)
}

fn parse_id(body: &Value, what: &str) -> Result<String> {
    body["id"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ActloopError::Oracle(format!("Invalid response: {} has no id", what)))
}

/// Map a run object onto RunStatus
fn parse_run_status(body: &Value) -> Result<RunStatus> {
    let status = body["status"]
        .as_str()
        .ok_or_else(|| ActloopError::Oracle("Invalid response: run has no status".to_string()))?;

    let failed = |status: &str| {
        let reason = body["last_error"]["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string());
        RunStatus::Failed { reason }
    };

    Ok(match status {
        "queued" | "in_progress" | "cancelling" => RunStatus::Pending,
        "completed" => RunStatus::Completed,
        "requires_action" => RunStatus::Failed {
            reason: "run requires tool output, which is not supported".to_string(),
        },
        "failed" | "cancelled" | "expired" | "incomplete" => failed(status),
        other => {
            return Err(ActloopError::Oracle(format!("Invalid response: unknown run status {}", other)));
        }
    })
}

/// Map a message list onto turns written by `author`, keeping the service's order
fn parse_turns(body: &Value, author: Role) -> Vec<Turn> {
    let Some(messages) = body["data"].as_array() else {
        return Vec::new();
    };

    messages
        .iter()
        .filter_map(|message| {
            let role = match message["role"].as_str() {
                Some("assistant") => Role::Oracle,
                _ => Role::Requester,
            };
            if role != author {
                return None;
            }

            let content = message["content"]
                .as_array()?
                .iter()
                .find(|block| block["type"] == "text")?["text"]["value"]
                .as_str()?
                .to_string();
            let run_id = message["run_id"].as_str().map(RunId::new);

            Some(Turn { role, content, run_id })
        })
        .collect()
}

#[async_trait]
impl OracleClient for AssistantsClient {
    async fn create_task(&self) -> Result<TaskId> {
        self.ensure_assistant().await?;
        let response = self.send(self.client.post(self.url("threads")).json(&json!({}))).await?;
        let id = TaskId::new(parse_id(&response, "thread")?);
        debug!("Created thread {}", id);
        Ok(id)
    }

    async fn submit_turn(&self, task: &TaskId, role: Role, content: &str) -> Result<()> {
        if role != Role::Requester {
            return Err(ActloopError::Oracle("only requester turns can be submitted".to_string()));
        }
        let url = self.url(&format!("threads/{}/messages", task));
        self.send(self.client.post(url).json(&Self::message_body(content)))
            .await?;
        Ok(())
    }

    async fn start_run(&self, task: &TaskId) -> Result<RunHandle> {
        let assistant_id = self.ensure_assistant().await?;
        let url = self.url(&format!("threads/{}/runs", task));
        let response = self
            .send(self.client.post(url).json(&Self::run_body(assistant_id)))
            .await?;
        let run_id = RunId::new(parse_id(&response, "run")?);
        debug!("Started run {} on thread {}", run_id, task);
        Ok(RunHandle::new(task.clone(), run_id))
    }

    async fn poll_run(&self, run: &RunHandle) -> Result<RunStatus> {
        let url = self.url(&format!("threads/{}/runs/{}", run.task_id, run.run_id));
        let response = self.send(self.client.get(url)).await?;
        parse_run_status(&response)
    }

    async fn read_turns(&self, task: &TaskId, author: Role) -> Result<Vec<Turn>> {
        let url = self.url(&format!("threads/{}/messages", task));
        let response = self
            .send(self.client.get(url).query(&[("order", "desc")]))
            .await?;
        Ok(parse_turns(&response, author))
    }
}

impl std::fmt::Debug for AssistantsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantsClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AssistantsClient {
        AssistantsClient::with_api_key("test-key".to_string(), AssistantsConfig::default()).unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = AssistantsConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_client_without_api_key() {
        let result = AssistantsClient::from_env("ACTLOOP_TEST_KEY_THAT_IS_NEVER_SET", AssistantsConfig::default());
        let err = result.unwrap_err();
        assert!(matches!(err, ActloopError::Config(_)));
        assert!(err.to_string().contains("ACTLOOP_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn test_url_joins_base() {
        let config = AssistantsConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..Default::default()
        };
        let client = AssistantsClient::with_api_key("k".to_string(), config).unwrap();
        assert_eq!(client.url("threads"), "http://localhost:8080/v1/threads");
    }

    #[test]
    fn test_assistant_body() {
        let config = AssistantsConfig {
            instructions: "One command at a time.".to_string(),
            ..Default::default()
        };
        let client = AssistantsClient::with_api_key("k".to_string(), config).unwrap();
        let body = client.assistant_body();
        assert_eq!(body["name"], "actloop");
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["instructions"], "One command at a time.");
    }

    #[test]
    fn test_message_and_run_bodies() {
        let message = AssistantsClient::message_body("nmap output");
        assert_eq!(message["role"], "user");
        assert_eq!(message["content"], "nmap output");

        let run = AssistantsClient::run_body("asst_1");
        assert_eq!(run["assistant_id"], "asst_1");
    }

    #[test]
    fn test_parse_run_status() {
        let cases = vec![
            ("queued", RunStatus::Pending),
            ("in_progress", RunStatus::Pending),
            ("cancelling", RunStatus::Pending),
            ("completed", RunStatus::Completed),
            (
                "expired",
                RunStatus::Failed {
                    reason: "expired".into(),
                },
            ),
        ];
        for (status, expected) in cases {
            assert_eq!(parse_run_status(&json!({ "status": status })).unwrap(), expected);
        }
    }

    #[test]
    fn test_parse_run_status_uses_last_error() {
        let body = json!({
            "status": "failed",
            "last_error": { "code": "rate_limit_exceeded", "message": "Rate limit reached" }
        });
        assert_eq!(
            parse_run_status(&body).unwrap(),
            RunStatus::Failed {
                reason: "Rate limit reached".into()
            }
        );
    }

    #[test]
    fn test_parse_run_status_requires_action_fails() {
        let status = parse_run_status(&json!({ "status": "requires_action" })).unwrap();
        assert!(matches!(status, RunStatus::Failed { .. }));
    }

    #[test]
    fn test_parse_run_status_unknown() {
        assert!(parse_run_status(&json!({ "status": "sleeping" })).is_err());
        assert!(parse_run_status(&json!({})).is_err());
    }

    #[test]
    fn test_parse_turns_filters_by_author() {
        let body = json!({
            "data": [
                {
                    "role": "assistant",
                    "run_id": "run_2",
                    "content": [{ "type": "text", "text": { "value": "nikto -h 10.0.0.5", "annotations": [] } }]
                },
                {
                    "role": "user",
                    "run_id": null,
                    "content": [{ "type": "text", "text": { "value": "PORT STATE SERVICE", "annotations": [] } }]
                },
                {
                    "role": "assistant",
                    "run_id": "run_1",
                    "content": [{ "type": "text", "text": { "value": "nmap 10.0.0.5", "annotations": [] } }]
                }
            ]
        });

        let oracle = parse_turns(&body, Role::Oracle);
        assert_eq!(oracle.len(), 2);
        assert_eq!(oracle[0].content, "nikto -h 10.0.0.5");
        assert_eq!(oracle[0].run_id, Some(RunId::new("run_2")));
        assert_eq!(oracle[1].content, "nmap 10.0.0.5");

        let requester = parse_turns(&body, Role::Requester);
        assert_eq!(requester.len(), 1);
        assert_eq!(requester[0].run_id, None);
    }

    #[test]
    fn test_parse_turns_skips_non_text_blocks() {
        let body = json!({
            "data": [
                {
                    "role": "assistant",
                    "content": [
                        { "type": "image_file", "image_file": { "file_id": "f1" } },
                        { "type": "text", "text": { "value": "whoami" } }
                    ]
                },
                { "role": "assistant", "content": [] }
            ]
        });
        let turns = parse_turns(&body, Role::Oracle);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "whoami");
    }

    #[test]
    fn test_parse_body() {
        let body = parse_body(r#"{"id": "thread_1"}"#).unwrap();
        assert_eq!(parse_id(&body, "thread").unwrap(), "thread_1");

        let err = parse_body("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, ActloopError::Json(_)));
    }

    #[test]
    fn test_parse_turns_empty() {
        assert!(parse_turns(&json!({ "data": [] }), Role::Oracle).is_empty());
        assert!(parse_turns(&json!({}), Role::Oracle).is_empty());
    }

    #[tokio::test]
    async fn test_submit_oracle_turn_rejected() {
        let err = client()
            .submit_turn(&TaskId::new("thread_1"), Role::Oracle, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, ActloopError::Oracle(_)));
    }

    #[test]
    fn test_debug_impl() {
        let debug_str = format!("{:?}", client());
        assert!(debug_str.contains("AssistantsClient"));
        assert!(debug_str.contains(DEFAULT_MODEL));
        assert!(!debug_str.contains("test-key"));
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AssistantsClient>();
    }
}
