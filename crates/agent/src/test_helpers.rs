//! Shared test helpers for loop tests.

use async_trait::async_trait;
use sandloop_core::error::GenerationError;
use sandloop_core::generate::{GenerateRequest, GenerateResponse, Generator, Usage};
use std::sync::Mutex;

/// A generator that returns a sequence of scripted results.
///
/// Each call to `complete` pops the next result in the queue. Panics if
/// more calls are made than results provided.
pub struct ScriptedGenerator {
    results: Mutex<Vec<Result<GenerateResponse, GenerationError>>>,
    call_count: Mutex<usize>,
}

impl ScriptedGenerator {
    pub fn new(results: Vec<Result<GenerateResponse, GenerationError>>) -> Self {
        Self {
            results: Mutex::new(results),
            call_count: Mutex::new(0),
        }
    }

    /// Script a sequence of successful raw-text responses.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(text_response(t))).collect())
    }

    #[allow(dead_code)]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        _request: GenerateRequest,
    ) -> Result<GenerateResponse, GenerationError> {
        let mut count = self.call_count.lock().unwrap();
        let results = self.results.lock().unwrap();

        if *count >= results.len() {
            panic!(
                "ScriptedGenerator: no more results (call #{}, have {})",
                *count,
                results.len()
            );
        }

        let result = results[*count].clone();
        *count += 1;
        result
    }
}

/// A successful raw-text response.
pub fn text_response(text: &str) -> GenerateResponse {
    GenerateResponse {
        content: text.to_string(),
        model: "scripted-model".into(),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
    }
}

/// A free-text response carrying a thought and a fenced code block.
pub fn code_response(thought: &str, code: &str) -> GenerateResponse {
    text_response(&format!("{thought}\n```python\n{code}\n```"))
}

/// A structured-mode response: the JSON envelope for one step.
pub fn step_response(step: &sandloop_core::step::AgentStep) -> GenerateResponse {
    let envelope = sandloop_core::step::StepEnvelope { step: step.clone() };
    text_response(&serde_json::to_string(&envelope).unwrap())
}
