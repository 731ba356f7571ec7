//! The bounded tool-calling conversation loop.
//!
//! ```text
//! Thinking → (ToolCall → ToolResult → Thinking)* → Finalizing → Stopped
//! ```
//!
//! Each Thinking step is one model call with the active tool definitions
//! attached. A reply with tool calls moves to ToolCall; a reply with text
//! moves to Finalizing. Unusable replies (unknown tool, malformed arguments,
//! empty turn) are answered with a corrective message and cost one
//! iteration. When the iteration bound is reached the configured
//! [`EarlyStopping`] policy produces the answer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use docmind_config::{AgentConfig, EarlyStopping};
use docmind_core::error::{ProviderError, ToolError};
use docmind_core::message::{ConversationTurn, Message, MessageToolCall};
use docmind_core::provider::{Provider, ProviderRequest, ProviderResponse};
use docmind_core::tool::{ToolCall, ToolRegistry};
use docmind_tools::TOOL_FAILURE_PREFIX;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::prompt::{EMPTY_TURN_CORRECTION, GENERATE_STOP_INSTRUCTION, tool_call_correction};

/// Answer returned by `force` stopping when no tool produced output.
pub const FORCE_STOP_MESSAGE: &str = "Agent stopped due to iteration limit.";

/// One tool invocation recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScratchpadEntry {
    pub tool_name: String,
    pub tool_input: String,
    pub tool_output: String,
}

/// How the loop reached its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model answered directly.
    Answered,
    /// Iteration bound hit; the last tool output (or the apology) was returned.
    ForcedStop,
    /// Iteration bound hit; one final tool-less call produced the answer.
    GeneratedStop,
}

/// Result of one run.
#[derive(Debug, Clone, Serialize)]
pub struct LoopOutcome {
    pub answer: String,
    pub scratchpad: Vec<ScratchpadEntry>,
    /// Model round-trips spent in the Thinking state.
    pub iterations: u32,
    pub stop: StopReason,
}

/// Failures that end a run without an answer.
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("request cancelled")]
    Cancelled,
}

/// Loop tuning fixed at process start.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub model: String,
    pub temperature: f32,
    pub max_iterations: u32,
    pub early_stopping: EarlyStopping,
    pub model_timeout: Duration,
    pub tool_timeout: Duration,
}

impl LoopSettings {
    pub fn from_config(
        agent: &AgentConfig,
        model: impl Into<String>,
        temperature: f32,
        model_timeout: Duration,
    ) -> Self {
        Self {
            model: model.into(),
            temperature,
            max_iterations: agent.max_iterations,
            early_stopping: agent.early_stopping,
            model_timeout,
            tool_timeout: Duration::from_secs(agent.tool_timeout_secs),
        }
    }
}

enum LoopState {
    Thinking,
    ToolCall(Vec<MessageToolCall>),
    ToolResult,
    Finalizing { answer: String, stop: StopReason },
    Stopped(LoopOutcome),
}

/// A tool call the loop could not act on.
enum ParseFailure {
    UnknownTool(String),
    BadArguments(String),
}

impl ParseFailure {
    fn reason(&self) -> String {
        match self {
            ParseFailure::UnknownTool(name) => format!("unknown tool '{name}'"),
            ParseFailure::BadArguments(detail) => format!("malformed arguments ({detail})"),
        }
    }
}

/// Drives one request's conversation against a provider and tool registry.
pub struct ConversationLoop<'a> {
    provider: Arc<dyn Provider>,
    tools: &'a ToolRegistry,
    settings: LoopSettings,
}

impl<'a> ConversationLoop<'a> {
    pub fn new(provider: Arc<dyn Provider>, tools: &'a ToolRegistry, settings: LoopSettings) -> Self {
        Self {
            provider,
            tools,
            settings,
        }
    }

    /// Run to completion. Provider failures and cancellation are the only
    /// errors; everything else is recovered inside the loop.
    pub async fn run(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<LoopOutcome, LoopError> {
        let mut transcript = Vec::with_capacity(history.len() + 2);
        transcript.push(Message::system(system_prompt));
        transcript.extend(history.iter().map(ConversationTurn::to_message));
        transcript.push(Message::user(query));

        let mut scratchpad: Vec<ScratchpadEntry> = Vec::new();
        let mut iterations: u32 = 0;
        let mut state = LoopState::Thinking;

        loop {
            state = match state {
                LoopState::Thinking => {
                    if iterations >= self.settings.max_iterations {
                        warn!(
                            iterations,
                            policy = ?self.settings.early_stopping,
                            "Iteration bound reached"
                        );
                        let (answer, stop) = self
                            .early_stop(&mut transcript, &scratchpad, cancel)
                            .await?;
                        LoopState::Finalizing { answer, stop }
                    } else {
                        iterations += 1;
                        debug!(iteration = iterations, "Thinking");
                        let response = self
                            .call_model(transcript.clone(), true, cancel)
                            .await?;
                        self.interpret(response.message, &mut transcript)
                    }
                }

                LoopState::ToolCall(calls) => {
                    for call in calls {
                        match self.invoke(&call, cancel).await? {
                            Ok(entry) => {
                                transcript.push(Message::tool_result(&call.id, &entry.tool_output));
                                scratchpad.push(entry);
                            }
                            Err(failure) => {
                                warn!(tool = %call.name, reason = %failure.reason(), "Rejected tool call");
                                let correction =
                                    tool_call_correction(&failure.reason(), &self.tools.names());
                                transcript.push(Message::tool_result(&call.id, correction));
                            }
                        }
                    }
                    LoopState::ToolResult
                }

                LoopState::ToolResult => {
                    debug!(scratchpad = scratchpad.len(), "Tool results appended");
                    LoopState::Thinking
                }

                LoopState::Finalizing { answer, stop } => {
                    info!(iterations, stop = ?stop, tools_used = scratchpad.len(), "Conversation finished");
                    LoopState::Stopped(LoopOutcome {
                        answer,
                        scratchpad: std::mem::take(&mut scratchpad),
                        iterations,
                        stop,
                    })
                }

                LoopState::Stopped(outcome) => return Ok(outcome),
            };
        }
    }

    /// Classify one model reply and record it in the transcript.
    fn interpret(&self, message: Message, transcript: &mut Vec<Message>) -> LoopState {
        if !message.tool_calls.is_empty() {
            let calls = message.tool_calls.clone();
            transcript.push(message);
            return LoopState::ToolCall(calls);
        }

        let answer = message.content.trim();
        if answer.is_empty() {
            warn!("Model produced neither an answer nor a tool call");
            transcript.push(Message::user(EMPTY_TURN_CORRECTION));
            return LoopState::Thinking;
        }

        LoopState::Finalizing {
            answer: answer.to_string(),
            stop: StopReason::Answered,
        }
    }

    /// Execute one tool call. The outer `Result` is cancellation; the inner
    /// one separates usable calls from parse failures.
    async fn invoke(
        &self,
        call: &MessageToolCall,
        cancel: &CancellationToken,
    ) -> Result<Result<ScratchpadEntry, ParseFailure>, LoopError> {
        if !self.tools.contains(&call.name) {
            return Ok(Err(ParseFailure::UnknownTool(call.name.clone())));
        }

        let arguments: serde_json::Value = match serde_json::from_str(&call.arguments) {
            Ok(value @ serde_json::Value::Object(_)) => value,
            Ok(_) => return Ok(Err(ParseFailure::BadArguments("expected a JSON object".into()))),
            Err(e) => return Ok(Err(ParseFailure::BadArguments(e.to_string()))),
        };
        let tool_input = arguments["query"].as_str().unwrap_or_default().to_string();

        info!(tool = %call.name, input = %tool_input, "Invoking tool");
        let request = ToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
        };
        let timeout = self.settings.tool_timeout;
        let result = race(cancel, tokio::time::timeout(timeout, self.tools.execute(&request))).await?;

        let tool_output = match result {
            Ok(Ok(result)) => result.output,
            Ok(Err(ToolError::InvalidArguments(detail))) => {
                return Ok(Err(ParseFailure::BadArguments(detail)));
            }
            Ok(Err(e)) => {
                warn!(tool = %call.name, error = %e, "Tool failed");
                format!("{TOOL_FAILURE_PREFIX}{e}")
            }
            Err(_) => {
                warn!(tool = %call.name, timeout_secs = timeout.as_secs(), "Tool timed out");
                format!(
                    "{TOOL_FAILURE_PREFIX}{} timed out after {}s",
                    call.name,
                    timeout.as_secs()
                )
            }
        };

        Ok(Ok(ScratchpadEntry {
            tool_name: call.name.clone(),
            tool_input,
            tool_output,
        }))
    }

    async fn call_model(
        &self,
        messages: Vec<Message>,
        with_tools: bool,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse, LoopError> {
        let request = ProviderRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: self.settings.temperature,
            max_tokens: None,
            tools: if with_tools {
                self.tools.definitions()
            } else {
                Vec::new()
            },
        };
        let timeout = self.settings.model_timeout;
        match race(cancel, tokio::time::timeout(timeout, self.provider.complete(request))).await? {
            Ok(result) => Ok(result?),
            Err(_) => Err(ProviderError::Timeout(format!(
                "model call exceeded {}s",
                timeout.as_secs()
            ))
            .into()),
        }
    }

    async fn early_stop(
        &self,
        transcript: &mut Vec<Message>,
        scratchpad: &[ScratchpadEntry],
        cancel: &CancellationToken,
    ) -> Result<(String, StopReason), LoopError> {
        if self.settings.early_stopping == EarlyStopping::Generate {
            transcript.push(Message::user(GENERATE_STOP_INSTRUCTION));
            match self.call_model(transcript.clone(), false, cancel).await {
                Ok(response) if !response.message.content.trim().is_empty() => {
                    return Ok((
                        response.message.content.trim().to_string(),
                        StopReason::GeneratedStop,
                    ));
                }
                Ok(_) => warn!("Final synthesis call returned nothing, forcing stop"),
                Err(LoopError::Cancelled) => return Err(LoopError::Cancelled),
                Err(e) => warn!(error = %e, "Final synthesis call failed, forcing stop"),
            }
        }

        let answer = scratchpad
            .last()
            .map(|entry| entry.tool_output.clone())
            .unwrap_or_else(|| FORCE_STOP_MESSAGE.to_string());
        Ok((answer, StopReason::ForcedStop))
    }
}

/// Resolve `fut` unless `cancel` fires first.
async fn race<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output, LoopError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LoopError::Cancelled),
        out = fut => Ok(out),
    }
}
