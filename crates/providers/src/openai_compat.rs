//! OpenAI-compatible generator implementation.
//!
//! Works with: OpenAI, OpenRouter, Gemini (via the compatibility endpoint),
//! Ollama, vLLM, and any other endpoint exposing `/v1/chat/completions`.
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE)
//! - Multi-part user content (text + inline image data URIs)
//! - JSON-schema constrained output via `response_format`

use async_trait::async_trait;
use futures::StreamExt;
use sandloop_core::error::GenerationError;
use sandloop_core::generate::{GenerateRequest, GenerateResponse, Generator, TokenChunk, Usage};
use sandloop_core::message::{Message, Role};
use serde::Deserialize;
use tracing::{debug, trace, warn};

/// An OpenAI-compatible text-generation backend.
pub struct OpenAiCompatGenerator {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatGenerator {
    /// Create a new OpenAI-compatible generator.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Convert our messages to the chat-completions wire format. `Content`
    /// already serializes as string-or-parts, so this is just role mapping.
    fn to_api_messages(messages: &[Message]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                serde_json::json!({ "role": role, "content": m.content })
            })
            .collect()
    }

    fn build_body(request: &GenerateRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if let Some(schema) = &request.response_schema {
            body["response_format"] = serde_json::json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "agent_step",
                    "schema": schema,
                },
            });
        }

        if !request.stop.is_empty() {
            body["stop"] = serde_json::json!(request.stop);
        }

        body
    }

    /// Map non-200 statuses to the error taxonomy.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GenerationError> {
        let status = response.status().as_u16();

        if status == 429 {
            return Err(GenerationError::RateLimited {
                retry_after_secs: 5,
            });
        }
        if status == 401 || status == 403 {
            return Err(GenerationError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }
        if status == 404 {
            return Err(GenerationError::ModelNotFound(
                response.text().await.unwrap_or_default(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Generator returned error");
            return Err(GenerationError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Generator for OpenAiCompatGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: GenerateRequest,
    ) -> std::result::Result<GenerateResponse, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::build_body(&request, false);

        debug!(generator = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(e.to_string())
                } else {
                    GenerationError::Network(e.to_string())
                }
            })?;

        let response = Self::check_status(response).await?;

        let api_response: ApiResponse =
            response.json().await.map_err(|e| GenerationError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(GenerateResponse {
            content: choice.message.content.unwrap_or_default(),
            model: api_response.model,
            usage,
        })
    }

    async fn stream(
        &self,
        request: GenerateRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<TokenChunk, GenerationError>>,
        GenerationError,
    > {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::build_body(&request, true);

        debug!(generator = %self.name, model = %request.model, "Sending streaming request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let response = Self::check_status(response).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let generator_name = self.name.clone();

        // Read the SSE byte stream and parse "data: ..." lines into chunks
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(GenerationError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let data = data.trim();

                    if data == "[DONE]" {
                        let _ = tx
                            .send(Ok(TokenChunk {
                                content: None,
                                done: true,
                                usage: None,
                            }))
                            .await;
                        return;
                    }

                    match serde_json::from_str::<StreamResponse>(data) {
                        Ok(stream_resp) => {
                            if let Some(choice) = stream_resp.choices.first()
                                && let Some(content) = &choice.delta.content
                                && !content.is_empty()
                            {
                                let chunk = TokenChunk {
                                    content: Some(content.clone()),
                                    done: false,
                                    usage: None,
                                };
                                if tx.send(Ok(chunk)).await.is_err() {
                                    return; // receiver dropped
                                }
                            }

                            // Usage arrives in the final chunk (stream_options)
                            if let Some(usage) = stream_resp.usage {
                                let _ = tx
                                    .send(Ok(TokenChunk {
                                        content: None,
                                        done: true,
                                        usage: Some(Usage {
                                            prompt_tokens: usage.prompt_tokens,
                                            completion_tokens: usage.completion_tokens,
                                            total_tokens: usage.total_tokens,
                                        }),
                                    }))
                                    .await;
                                return;
                            }
                        }
                        Err(e) => {
                            trace!(
                                generator = %generator_name,
                                data = %data,
                                error = %e,
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                    }
                }
            }
        });

        Ok(rx)
    }
}

// ── Wire types ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    model: String,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandloop_core::message::{Content, ContentPart, ImageSource};

    fn request(messages: Vec<Message>, schema: Option<serde_json::Value>) -> GenerateRequest {
        GenerateRequest {
            model: "test-model".into(),
            messages,
            temperature: 0.0,
            max_tokens: Some(512),
            response_schema: schema,
            stream: false,
            stop: vec![],
        }
    }

    #[test]
    fn api_messages_keep_multipart_content() {
        let msg = Message::user(Content::Parts(vec![
            ContentPart::Text {
                text: "what is in this image?".into(),
            },
            ContentPart::ImageUrl {
                image_url: ImageSource {
                    url: "data:image/jpeg;base64,AAAA".into(),
                },
            },
        ]));

        let api = OpenAiCompatGenerator::to_api_messages(&[msg]);
        assert_eq!(api[0]["role"], "user");
        assert_eq!(api[0]["content"][1]["type"], "image_url");
    }

    #[test]
    fn body_includes_response_format_when_schema_set() {
        let body = OpenAiCompatGenerator::build_body(
            &request(vec![Message::user("hi")], Some(serde_json::json!({"type": "object"}))),
            false,
        );
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(
            body["response_format"]["json_schema"]["name"],
            "agent_step"
        );
    }

    #[test]
    fn body_omits_response_format_without_schema() {
        let body =
            OpenAiCompatGenerator::build_body(&request(vec![Message::user("hi")], None), false);
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn streaming_body_requests_usage() {
        let body =
            OpenAiCompatGenerator::build_body(&request(vec![Message::user("hi")], None), true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
    }

    #[test]
    fn stream_chunk_parses() {
        let data = r#"{"choices":[{"delta":{"content":"Tho"}}]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert_eq!(
            parsed.choices[0].delta.content.as_deref(),
            Some("Tho")
        );
    }
}
