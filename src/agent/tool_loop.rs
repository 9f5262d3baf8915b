//! Cached agentic tool-calling loop.
//!
//! Resolves one free-form instruction by letting the chat collaborator call
//! tools until it produces a final `ActionOutcome` JSON. Successful runs that
//! return no data are recorded as an ordered list of tool calls keyed by the
//! prompt; later runs replay that list through the caller and skip the
//! collaborator entirely. A replay failure falls back to the live loop.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use super::chat::{ChatClient, ChatMessage, ToolCall, ToolSpec};
use crate::runtime::error::{LlmError, Result};
use crate::runtime::outcome::ActionOutcome;
use crate::runtime::storage::CacheStorage;
use crate::util::json::parse_json;

/// Default cache namespace when a caller does not supply one.
pub const DEFAULT_CACHE_KEY: &str = "llm";

/// Performs the tool invocations the collaborator asks for.
#[async_trait]
pub trait ToolCaller: Send + Sync {
    /// Execute `call` and describe its result for the collaborator.
    async fn call_tool(&self, call: &ToolCall) -> anyhow::Result<String>;
}

/// Per-instruction options.
#[derive(Debug, Clone, Copy)]
pub struct ToolRequest<'a> {
    /// Instructions for the collaborator.
    pub system_prompt: &'a str,
    /// Tools the collaborator may call.
    pub tools: &'a [ToolSpec],
    /// Try replaying a cached tool-call sequence first.
    pub use_cache: bool,
    /// Cache namespace for recorded sequences.
    pub cache_key: &'a str,
}

impl<'a> ToolRequest<'a> {
    /// Request with the default cache namespace and caching disabled.
    pub fn new(system_prompt: &'a str, tools: &'a [ToolSpec]) -> Self {
        Self {
            system_prompt,
            tools,
            use_cache: false,
            cache_key: DEFAULT_CACHE_KEY,
        }
    }

    /// Enable or disable cache replay.
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Set the cache namespace.
    pub fn cache_key(mut self, cache_key: &'a str) -> Self {
        self.cache_key = cache_key;
        self
    }
}

/// Drives the request/response cycle with the collaborator.
pub struct ToolExecutor {
    client: Arc<dyn ChatClient>,
    cache: CacheStorage,
    max_rounds: Option<usize>,
}

impl ToolExecutor {
    /// Create an executor. `max_rounds` caps how many tool-requesting replies
    /// are honoured; `None` leaves the loop unbounded.
    pub fn new(client: Arc<dyn ChatClient>, cache: CacheStorage, max_rounds: Option<usize>) -> Self {
        Self {
            client,
            cache,
            max_rounds,
        }
    }

    /// Cache backing recorded tool-call sequences.
    pub fn cache(&self) -> &CacheStorage {
        &self.cache
    }

    /// Resolve `prompt`, calling tools through `caller`.
    pub async fn execute(
        &self,
        prompt: &str,
        request: ToolRequest<'_>,
        caller: &dyn ToolCaller,
    ) -> Result<ActionOutcome> {
        let started = Instant::now();
        let outcome = self.run(prompt, request, caller).await;
        tracing::info!(
            cache_key = request.cache_key,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "agent task finished"
        );
        outcome
    }

    async fn run(
        &self,
        prompt: &str,
        request: ToolRequest<'_>,
        caller: &dyn ToolCaller,
    ) -> Result<ActionOutcome> {
        if request.use_cache && self.replay_cached(prompt, request.cache_key, caller).await {
            return Ok(ActionOutcome::ok());
        }

        let mut messages = vec![
            ChatMessage::system(request.system_prompt),
            ChatMessage::user(prompt),
        ];
        let mut recorded: Vec<ToolCall> = Vec::new();
        let mut rounds = 0usize;

        let mut reply = self.ask(&messages, request.tools).await?;
        messages.push(reply.clone());

        while reply.requests_tools() {
            rounds += 1;
            if let Some(limit) = self.max_rounds {
                if rounds > limit {
                    return Err(LlmError::RoundLimitExceeded { rounds: limit }.into());
                }
            }

            for call in &reply.tool_calls {
                recorded.push(call.clone());
                let content = match caller.call_tool(call).await {
                    Ok(content) => content,
                    Err(err) => {
                        tracing::warn!(tool = call.name(), error = %err, "tool call failed");
                        format!("Error executing tool \"{}\": {:#}", call.name(), err)
                    }
                };
                messages.push(ChatMessage::tool_result(call.id.clone(), content));
            }

            reply = self.ask(&messages, request.tools).await?;
            messages.push(reply.clone());
        }

        let outcome: ActionOutcome = parse_json(reply.content.as_deref().unwrap_or_default())?;
        if !outcome.success {
            return Err(LlmError::ActionFailed {
                prompt: prompt.to_string(),
                reason: outcome.error,
            }
            .into());
        }

        if outcome.result.is_none() && !recorded.is_empty() {
            if let Err(err) = self.cache.write_cache(request.cache_key, prompt, &recorded) {
                tracing::warn!(prompt, error = %err, "failed to record tool calls");
            }
        }

        Ok(outcome)
    }

    async fn ask(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ChatMessage> {
        let started = Instant::now();
        let reply = self.client.ask(messages, tools).await?;
        tracing::debug!(
            messages = messages.len(),
            tool_calls = reply.tool_calls.len(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "collaborator replied"
        );
        Ok(reply)
    }

    /// Replay the recorded sequence for `prompt`. Returns true only when a
    /// non-empty sequence replayed without error.
    async fn replay_cached(&self, prompt: &str, cache_key: &str, caller: &dyn ToolCaller) -> bool {
        let cached: Vec<ToolCall> = match self.cache.read_cache(cache_key, prompt) {
            Ok(Some(calls)) => calls,
            Ok(None) => return false,
            Err(err) => {
                tracing::warn!(prompt, error = %err, "ignoring unreadable tool-call cache entry");
                return false;
            }
        };
        if cached.is_empty() {
            return false;
        }

        for call in &cached {
            if let Err(err) = caller.call_tool(call).await {
                tracing::warn!(
                    tool = call.name(),
                    error = %err,
                    "cached tool call failed, falling back to live execution"
                );
                return false;
            }
        }

        tracing::info!(prompt, calls = cached.len(), "replayed cached tool calls");
        true
    }
}
