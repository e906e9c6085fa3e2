//! The agent control loop — generate → parse → act → observe, bounded by a
//! step budget.
//!
//! One `run` is strictly sequential; only the generation call and the
//! sandbox execution suspend. Every in-loop failure (generation, parse,
//! execution) is recoverable: it becomes a corrective turn and consumes a
//! step. The loop terminates exactly once — either a completion
//! (`final_answer` step or the sandbox's completion signal) or step-budget
//! exhaustion, which is a defined outcome, not an error.
//!
//! The transcript returned is only this invocation's generated messages,
//! so the caller can persist exactly the delta.

use sandloop_config::RehydrationPolicy;
use sandloop_core::capability::{Capability, final_answer_capability};
use sandloop_core::definitions::DefinitionSet;
use sandloop_core::generate::{GenerateRequest, Generator};
use sandloop_core::message::{Message, Role};
use sandloop_core::sandbox::{ExecutionOutcome, Sandbox};
use sandloop_core::step::AgentStep;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::prompt::render_system_prompt;
use crate::rehydrate::SessionRehydrator;
use crate::step_parser::{parse_free_text, parse_structured};
use crate::stream_event::AgentStreamEvent;
use crate::tracker;

/// The sentinel answer returned when the step budget runs out.
pub const EXHAUSTED_ANSWER: &str = "Agent reached maximum steps without a final answer.";

const NO_CODE_FREE_TEXT: &str = "Your last response contained no executable code. \
     You must emit a ```python code block (or call final_answer) to make progress; \
     reasoning alone does not advance the task.";

const NO_CODE_STRUCTURED: &str = "Your last step was reasoning only. \
     You must emit a 'code' or 'final_answer' step to make progress; \
     thought and plan steps alone do not advance the task.";

/// The result of one loop invocation.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The final answer text (or the exhaustion sentinel).
    pub answer: String,
    /// Messages generated during this invocation only — excludes the
    /// seeded history.
    pub transcript: Vec<Message>,
    /// Steps consumed.
    pub steps: usize,
    /// True when the step budget ran out before a completion.
    pub exhausted: bool,
}

/// The agent control loop.
pub struct AgentLoop {
    generator: Arc<dyn Generator>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    capabilities: Vec<Capability>,
    authorized_imports: Vec<String>,
    max_steps: usize,
    structured_steps: bool,
    rehydration: RehydrationPolicy,
}

impl AgentLoop {
    /// Create a loop with defaults: 15 steps, free-text parsing, proceed on
    /// rehydration failure, only the built-in `final_answer` capability.
    pub fn new(generator: Arc<dyn Generator>, model: impl Into<String>) -> Self {
        Self {
            generator,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            capabilities: vec![final_answer_capability()],
            authorized_imports: Vec::new(),
            max_steps: 15,
            structured_steps: false,
            rehydration: RehydrationPolicy::Proceed,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max;
        self
    }

    /// Declare additional sandbox capabilities for prompt construction.
    pub fn with_capabilities(mut self, capabilities: Vec<Capability>) -> Self {
        self.capabilities = capabilities;
        if !self.capabilities.iter().any(|c| c.name == "final_answer") {
            self.capabilities.push(final_answer_capability());
        }
        self
    }

    pub fn with_authorized_imports(mut self, imports: Vec<String>) -> Self {
        self.authorized_imports = imports;
        self
    }

    /// Enforce the step schema on generation calls instead of parsing
    /// free-form text.
    pub fn with_structured_steps(mut self, enabled: bool) -> Self {
        self.structured_steps = enabled;
        self
    }

    pub fn with_rehydration(mut self, policy: RehydrationPolicy) -> Self {
        self.rehydration = policy;
        self
    }

    fn build_request(&self, buffer: &[Message]) -> GenerateRequest {
        GenerateRequest {
            model: self.model.clone(),
            messages: buffer.to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_schema: self
                .structured_steps
                .then(AgentStep::response_schema),
            stream: false,
            stop: vec![],
        }
    }

    fn seed_buffer(&self, history: &[Message]) -> Vec<Message> {
        let prompt = render_system_prompt(
            &self.capabilities,
            &self.authorized_imports,
            self.structured_steps,
        );
        let mut buffer = Vec::with_capacity(history.len() + 1);
        buffer.push(Message::system(prompt));
        buffer.extend_from_slice(history);
        buffer
    }

    /// Parse one raw response into a step, or a corrective message.
    fn parse_response(&self, raw: &str) -> Result<AgentStep, String> {
        if self.structured_steps {
            parse_structured(raw).map_err(|e| {
                format!("Error parsing your previous response: {e}. Please ensure valid JSON.")
            })
        } else {
            Ok(parse_free_text(raw).into_step())
        }
    }

    fn no_code_corrective(&self) -> &'static str {
        if self.structured_steps {
            NO_CODE_STRUCTURED
        } else {
            NO_CODE_FREE_TEXT
        }
    }

    /// Run the loop to completion.
    ///
    /// `history` is the windowed session log with the new user turn as its
    /// last message. `definitions` is the session's definition set: it is
    /// rehydrated into `sandbox` before any new code runs, and grows as the
    /// model defines new functions and imports.
    pub async fn run(
        &self,
        sandbox: &dyn Sandbox,
        definitions: &mut DefinitionSet,
        history: &[Message],
    ) -> sandloop_core::Result<RunOutcome> {
        SessionRehydrator::new(self.rehydration)
            .rehydrate(sandbox, definitions)
            .await?;

        let mut buffer = self.seed_buffer(history);
        let mut transcript: Vec<Message> = Vec::new();
        let mut steps = 0;

        info!(model = %self.model, max_steps = self.max_steps, "Agent loop starting");

        while steps < self.max_steps {
            debug!(step = steps, "Agent loop step");

            // ── GENERATE ──
            let raw = match self.generator.complete(self.build_request(&buffer)).await {
                Ok(response) => response.content,
                Err(e) => {
                    warn!(step = steps, error = %e, "Generation failed; continuing");
                    let corrective = Message::reasoning(
                        Role::User,
                        format!("Generation failed: {e}. Continue from the previous state."),
                    );
                    transcript.push(corrective.clone());
                    buffer.push(corrective);
                    steps += 1;
                    continue;
                }
            };

            let assistant = Message::reasoning(Role::Assistant, raw.clone());
            transcript.push(assistant.clone());
            buffer.push(assistant);

            // ── PARSE ──
            let step = match self.parse_response(&raw) {
                Ok(step) => step,
                Err(corrective_text) => {
                    warn!(step = steps, "Response did not parse into a step");
                    let corrective = Message::reasoning(Role::User, corrective_text);
                    transcript.push(corrective.clone());
                    buffer.push(corrective);
                    steps += 1;
                    continue;
                }
            };

            debug!(step = steps, kind = step.kind(), "Parsed step");

            // ── ACT ──
            match step {
                AgentStep::FinalAnswer { answer } => {
                    info!(steps = steps + 1, "Run completed with final answer step");
                    return Ok(RunOutcome {
                        answer,
                        transcript,
                        steps: steps + 1,
                        exhausted: false,
                    });
                }

                AgentStep::Code { code, .. } => {
                    definitions.merge(tracker::extract(&code));

                    match sandbox.execute(&code).await {
                        ExecutionOutcome::Completed(value) => {
                            info!(steps = steps + 1, "Run completed via completion signal");
                            return Ok(RunOutcome {
                                answer: value,
                                transcript,
                                steps: steps + 1,
                                exhausted: false,
                            });
                        }
                        ExecutionOutcome::Output(text) => {
                            let observation =
                                Message::reasoning(Role::User, format!("Observation: {text}"));
                            transcript.push(observation.clone());
                            buffer.push(observation);
                        }
                        ExecutionOutcome::Failure(detail) => {
                            // Verbatim, diagnostic detail included, so the
                            // model can self-correct.
                            let observation = Message::reasoning(Role::User, detail);
                            transcript.push(observation.clone());
                            buffer.push(observation);
                        }
                    }
                }

                AgentStep::Thought { .. } | AgentStep::Plan { .. } => {
                    let corrective = Message::reasoning(Role::User, self.no_code_corrective());
                    transcript.push(corrective.clone());
                    buffer.push(corrective);
                }
            }

            steps += 1;
        }

        warn!(max_steps = self.max_steps, "Step budget exhausted");
        Ok(RunOutcome {
            answer: EXHAUSTED_ANSWER.into(),
            transcript,
            steps: self.max_steps,
            exhausted: true,
        })
    }

    /// Streaming variant of [`run`].
    ///
    /// Returns an `mpsc::Receiver` yielding [`AgentStreamEvent`]s as the
    /// loop progresses. The receiver is populated by a background task —
    /// the caller reads events and buffers tokens between boundaries to
    /// reconstruct messages for persistence.
    pub async fn run_stream(
        &self,
        sandbox: Box<dyn Sandbox>,
        definitions: Arc<tokio::sync::Mutex<DefinitionSet>>,
        history: Vec<Message>,
    ) -> mpsc::Receiver<AgentStreamEvent> {
        let (tx, rx) = mpsc::channel::<AgentStreamEvent>(128);

        let generator = self.generator.clone();
        let model = self.model.clone();
        let temperature = self.temperature;
        let max_tokens = self.max_tokens;
        let max_steps = self.max_steps;
        let structured_steps = self.structured_steps;
        let rehydration = self.rehydration;
        let mut buffer = self.seed_buffer(&history);

        tokio::spawn(async move {
            {
                let defs = definitions.lock().await;
                if let Err(e) = SessionRehydrator::new(rehydration)
                    .rehydrate(sandbox.as_ref(), &defs)
                    .await
                {
                    let _ = tx
                        .send(AgentStreamEvent::Error {
                            message: e.to_string(),
                        })
                        .await;
                    return;
                }
            }

            let mut steps = 0;

            while steps < max_steps {
                let request = GenerateRequest {
                    model: model.clone(),
                    messages: buffer.clone(),
                    temperature,
                    max_tokens,
                    response_schema: structured_steps.then(AgentStep::response_schema),
                    stream: true,
                    stop: vec![],
                };

                // ── Stream tokens from the generator ──
                let mut chunk_rx = match generator.stream(request).await {
                    Ok(rx) => rx,
                    Err(e) => {
                        let corrective = Message::reasoning(
                            Role::User,
                            format!("Generation failed: {e}. Continue from the previous state."),
                        );
                        buffer.push(corrective);
                        steps += 1;
                        continue;
                    }
                };

                let mut raw = String::new();
                let mut interrupted = false;
                while let Some(chunk_result) = chunk_rx.recv().await {
                    match chunk_result {
                        Ok(chunk) => {
                            if let Some(content) = chunk.content
                                && !content.is_empty()
                            {
                                raw.push_str(&content);
                                if tx
                                    .send(AgentStreamEvent::Token { content })
                                    .await
                                    .is_err()
                                {
                                    return; // receiver dropped
                                }
                            }
                        }
                        Err(e) => {
                            let _ = tx
                                .send(AgentStreamEvent::Error {
                                    message: format!("Stream error: {e}"),
                                })
                                .await;
                            interrupted = true;
                            break;
                        }
                    }
                }
                if interrupted {
                    return;
                }

                let assistant = Message::reasoning(Role::Assistant, raw.clone());
                buffer.push(assistant);

                // ── PARSE ──
                let parsed = if structured_steps {
                    parse_structured(&raw).map_err(|e| {
                        format!(
                            "Error parsing your previous response: {e}. Please ensure valid JSON."
                        )
                    })
                } else {
                    Ok(parse_free_text(&raw).into_step())
                };

                let step = match parsed {
                    Ok(step) => step,
                    Err(corrective_text) => {
                        buffer.push(Message::reasoning(Role::User, corrective_text));
                        steps += 1;
                        continue;
                    }
                };

                let _ = tx
                    .send(AgentStreamEvent::StepBoundary {
                        step: steps,
                        kind: step.kind().to_string(),
                    })
                    .await;

                // ── ACT ──
                match step {
                    AgentStep::FinalAnswer { answer } => {
                        let _ = tx
                            .send(AgentStreamEvent::Final {
                                answer,
                                steps: steps + 1,
                                exhausted: false,
                            })
                            .await;
                        return;
                    }

                    AgentStep::Code { code, .. } => {
                        definitions.lock().await.merge(tracker::extract(&code));

                        match sandbox.execute(&code).await {
                            ExecutionOutcome::Completed(value) => {
                                let _ = tx
                                    .send(AgentStreamEvent::Final {
                                        answer: value,
                                        steps: steps + 1,
                                        exhausted: false,
                                    })
                                    .await;
                                return;
                            }
                            ExecutionOutcome::Output(text) => {
                                let _ = tx
                                    .send(AgentStreamEvent::Observation {
                                        content: text.clone(),
                                        success: true,
                                    })
                                    .await;
                                buffer.push(Message::reasoning(
                                    Role::User,
                                    format!("Observation: {text}"),
                                ));
                            }
                            ExecutionOutcome::Failure(detail) => {
                                let _ = tx
                                    .send(AgentStreamEvent::Observation {
                                        content: detail.clone(),
                                        success: false,
                                    })
                                    .await;
                                buffer.push(Message::reasoning(Role::User, detail));
                            }
                        }
                    }

                    AgentStep::Thought { .. } | AgentStep::Plan { .. } => {
                        let corrective = if structured_steps {
                            NO_CODE_STRUCTURED
                        } else {
                            NO_CODE_FREE_TEXT
                        };
                        buffer.push(Message::reasoning(Role::User, corrective));
                    }
                }

                steps += 1;
            }

            let _ = tx
                .send(AgentStreamEvent::Final {
                    answer: EXHAUSTED_ANSWER.into(),
                    steps: max_steps,
                    exhausted: true,
                })
                .await;
        });

        rx
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
