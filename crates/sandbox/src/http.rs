//! HTTP adapter to the containerized executor sidecar.
//!
//! The sidecar owns the actual restricted interpreter; this adapter only
//! speaks its wire protocol and normalizes the response into the closed
//! [`ExecutionOutcome`] contract. Each adapter instance carries a fresh
//! execution-context id, so the sidecar gives it an empty namespace —
//! cross-turn definitions come back through rehydration, never through a
//! reused context.

use async_trait::async_trait;
use sandloop_core::sandbox::{ExecutionOutcome, Sandbox, SandboxFactory};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

/// A sandbox backed by the executor sidecar's HTTP API.
pub struct HttpSandbox {
    base_url: String,
    context_id: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    code: &'a str,
}

/// The sidecar's response shape. `is_final_answer` is a distinguished
/// control path — the sidecar implements "done" as a special escape from
/// the interpreter, and we must not mistake it for an error.
#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    #[serde(default)]
    result: Option<String>,

    #[serde(default)]
    error: Option<String>,

    #[serde(default)]
    is_final_answer: bool,

    #[serde(default)]
    final_answer: Option<String>,
}

impl HttpSandbox {
    /// Create a sandbox adapter with a fresh execution context.
    pub fn new(base_url: impl Into<String>, timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            context_id: Uuid::new_v4().to_string(),
            client,
        }
    }

    /// The execution-context id this instance binds to on the sidecar.
    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    fn normalize(response: ExecuteResponse) -> ExecutionOutcome {
        if response.is_final_answer {
            return ExecutionOutcome::Completed(response.final_answer.unwrap_or_default());
        }
        if let Some(error) = response.error {
            return ExecutionOutcome::Failure(error);
        }
        match response.result {
            Some(result) if !result.is_empty() => ExecutionOutcome::Output(result),
            _ => ExecutionOutcome::Output("Execution successful (no output).".into()),
        }
    }
}

#[async_trait]
impl Sandbox for HttpSandbox {
    fn name(&self) -> &str {
        "http"
    }

    async fn execute(&self, source: &str) -> ExecutionOutcome {
        let url = format!("{}/contexts/{}/execute", self.base_url, self.context_id);
        debug!(context = %self.context_id, bytes = source.len(), "Submitting code to sandbox");

        let response = match self
            .client
            .post(&url)
            .json(&ExecuteRequest { code: source })
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Sandbox request failed");
                return ExecutionOutcome::Failure(format!("sandbox unreachable: {e}"));
            }
        };

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            warn!(status, "Sandbox returned error status");
            return ExecutionOutcome::Failure(format!(
                "sandbox returned status {status}: {body}"
            ));
        }

        match response.json::<ExecuteResponse>().await {
            Ok(parsed) => Self::normalize(parsed),
            Err(e) => ExecutionOutcome::Failure(format!("sandbox protocol violation: {e}")),
        }
    }
}

/// Factory producing one fresh [`HttpSandbox`] per run.
pub struct HttpSandboxFactory {
    base_url: String,
    timeout: std::time::Duration,
}

impl HttpSandboxFactory {
    pub fn new(base_url: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl SandboxFactory for HttpSandboxFactory {
    async fn create(&self) -> Box<dyn Sandbox> {
        Box::new(HttpSandbox::new(self.base_url.clone(), self.timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> ExecuteResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn completion_signal_wins_over_output() {
        let outcome = HttpSandbox::normalize(response(
            r#"{"result":"ignored","is_final_answer":true,"final_answer":"25"}"#,
        ));
        assert_eq!(outcome, ExecutionOutcome::Completed("25".into()));
    }

    #[test]
    fn error_maps_to_failure() {
        let outcome = HttpSandbox::normalize(response(
            r#"{"error":"ZeroDivisionError: division by zero"}"#,
        ));
        assert_eq!(
            outcome,
            ExecutionOutcome::Failure("ZeroDivisionError: division by zero".into())
        );
    }

    #[test]
    fn plain_result_maps_to_output() {
        let outcome = HttpSandbox::normalize(response(r#"{"result":"25\n"}"#));
        assert_eq!(outcome, ExecutionOutcome::Output("25\n".into()));
    }

    #[test]
    fn silent_success_gets_placeholder_output() {
        let outcome = HttpSandbox::normalize(response(r#"{}"#));
        assert_eq!(
            outcome,
            ExecutionOutcome::Output("Execution successful (no output).".into())
        );
    }

    #[tokio::test]
    async fn fresh_context_per_instance() {
        let factory =
            HttpSandboxFactory::new("http://localhost:8001", std::time::Duration::from_secs(5));
        let a = factory.create().await;
        let b = factory.create().await;
        // Two instances must never share a namespace; the context id is the
        // only handle the sidecar keys on.
        assert_eq!(a.name(), "http");
        assert_eq!(b.name(), "http");
    }

    #[tokio::test]
    async fn unreachable_sidecar_is_a_failure_not_a_panic() {
        let sandbox = HttpSandbox::new(
            "http://127.0.0.1:1",
            std::time::Duration::from_millis(200),
        );
        match sandbox.execute("print(1)").await {
            ExecutionOutcome::Failure(detail) => {
                assert!(detail.contains("sandbox unreachable"))
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
