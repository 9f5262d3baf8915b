//! Runtime orchestrator and public API
//!
//! This module provides the main `Runtime` struct that wires definitions, the
//! action registry, the text matcher, and the action providers together, and
//! exposes the step/behavior/action entry points to the host runner.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

// Submodules
pub mod context;
pub mod engine;
pub mod error;
pub mod outcome;
pub mod registry;
pub mod storage;

use crate::agent::chat::ChatClient;
use crate::agent::tool_loop::ToolExecutor;
use crate::definition::{Action, DefinitionSet, DefinitionSources, HookKind};
use crate::matcher::{CachingMatcher, LlmTextMatcher, TextMatcher};
use context::{ActionContext, Args};
use engine::ActionEngine;
use error::{Result, RuntimeError};
use registry::{ActionProvider, ActionRegistry};
use storage::CacheStorage;

/// Configuration for a runtime instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directory holding `steps/`, `concepts/`, and `hooks/` (default: features)
    pub definitions_root: PathBuf,

    /// Explicit step file or directory, overriding `definitions_root/steps`
    pub steps_path: Option<PathBuf>,

    /// Explicit concept file or directory, overriding `definitions_root/concepts`
    pub concepts_path: Option<PathBuf>,

    /// Explicit hook file or directory, overriding `definitions_root/hooks`
    pub hooks_path: Option<PathBuf>,

    /// Root directory of the flat-file cache (default: cache)
    pub cache_root: PathBuf,

    /// Replay cached matches and tool calls
    pub use_cache: bool,

    /// Budget handed to waiting UI primitives, in milliseconds
    pub wait_budget_ms: u64,

    /// Cap on tool-requesting replies per instruction; `None` is unbounded
    pub max_tool_rounds: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            definitions_root: PathBuf::from("features"),
            steps_path: None,
            concepts_path: None,
            hooks_path: None,
            cache_root: PathBuf::from("cache"),
            use_cache: true,
            wait_budget_ms: 30_000,
            max_tool_rounds: Some(32),
        }
    }
}

impl RuntimeConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| RuntimeError::Config(format!("failed to read {}: {}", path.display(), err)))?;
        serde_json::from_str(&raw)
            .map_err(|err| RuntimeError::Config(format!("failed to parse {}: {}", path.display(), err)))
    }

    /// Apply `STEPWEAVER_DISABLE_CACHE`, `STEPWEAVER_CACHE_ROOT`, and
    /// `STEPWEAVER_DEFINITIONS` when set to a non-empty value.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(value) = env_value("STEPWEAVER_DISABLE_CACHE") {
            self.use_cache = !matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(value) = env_value("STEPWEAVER_CACHE_ROOT") {
            self.cache_root = PathBuf::from(value);
        }
        if let Some(value) = env_value("STEPWEAVER_DEFINITIONS") {
            self.definitions_root = PathBuf::from(value);
        }
        self
    }

    /// Wait budget as a duration.
    pub fn wait_budget(&self) -> Duration {
        Duration::from_millis(self.wait_budget_ms)
    }

    /// Definition sources after applying the explicit path overrides.
    pub fn definition_sources(&self) -> DefinitionSources {
        let mut sources = DefinitionSources::under(&self.definitions_root);
        if let Some(path) = &self.steps_path {
            sources.steps = Some(path.clone());
        }
        if let Some(path) = &self.concepts_path {
            sources.concepts = Some(path.clone());
        }
        if let Some(path) = &self.hooks_path {
            sources.hooks = Some(path.clone());
        }
        sources
    }

    /// Cache store rooted at `cache_root`.
    pub fn cache(&self) -> CacheStorage {
        CacheStorage::new(self.cache_root.clone())
    }

    /// Tool-calling loop over `client` using this configuration's cache and
    /// round cap.
    pub fn tool_executor(&self, client: Arc<dyn ChatClient>) -> ToolExecutor {
        ToolExecutor::new(client, self.cache(), self.max_tool_rounds)
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// The main runtime orchestrator
///
/// One instance serves one scenario at a time. Concurrent scenarios use
/// separate instances sharing the same `Arc<DefinitionSet>` and cache root.
pub struct Runtime {
    config: RuntimeConfig,
    engine: ActionEngine,
    providers: Vec<Arc<dyn ActionProvider>>,
    started: bool,
}

impl Runtime {
    /// Create a runtime over already-loaded definitions with its own registry.
    pub fn new(config: RuntimeConfig, definitions: Arc<DefinitionSet>, matcher: Arc<dyn TextMatcher>) -> Self {
        let registry = Arc::new(ActionRegistry::new());
        Self {
            config,
            engine: ActionEngine::new(definitions, registry, matcher),
            providers: Vec::new(),
            started: false,
        }
    }

    /// Load definitions from `config` and match through `client`, caching
    /// matches when `use_cache` is set.
    pub fn from_config(config: RuntimeConfig, client: Arc<dyn ChatClient>) -> Result<Self> {
        let definitions = Arc::new(config.definition_sources().load()?);
        let matcher: Arc<dyn TextMatcher> = if config.use_cache {
            Arc::new(CachingMatcher::new(LlmTextMatcher::new(client), config.cache()))
        } else {
            Arc::new(LlmTextMatcher::new(client))
        };
        Ok(Self::new(config, definitions, matcher))
    }

    /// Get the current configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Get the loaded definitions
    pub fn definitions(&self) -> &Arc<DefinitionSet> {
        self.engine.definitions()
    }

    /// Get the action registry
    pub fn registry(&self) -> &Arc<ActionRegistry> {
        self.engine.registry()
    }

    /// Get the run's accumulated context
    pub fn context(&self) -> &ActionContext {
        self.engine.context()
    }

    /// Add a provider. Its actions are registered on [`Runtime::start`], or
    /// immediately when the runtime is already started.
    pub async fn add_provider(&mut self, provider: Arc<dyn ActionProvider>) -> Result<()> {
        if self.started {
            start_provider(&provider, self.engine.registry()).await?;
        }
        self.providers.push(provider);
        Ok(())
    }

    /// Start every provider in order and register its actions.
    ///
    /// If a provider fails to start, the providers started before it are
    /// unregistered and stopped in reverse order and the error is returned.
    pub async fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        for (index, provider) in self.providers.iter().enumerate() {
            if let Err(err) = start_provider(provider, self.engine.registry()).await {
                tracing::warn!(error = %err, "provider failed to start, unwinding");
                for started in self.providers[..index].iter().rev() {
                    started.unregister_actions(self.engine.registry());
                    started.stop().await;
                }
                return Err(err);
            }
        }
        self.started = true;
        tracing::info!(actions = ?self.registry().names(), "runtime started");
        Ok(())
    }

    /// Unregister and stop every provider in reverse order, then clear the
    /// context.
    pub async fn stop(&mut self) {
        if self.started {
            for provider in self.providers.iter().rev() {
                provider.unregister_actions(self.engine.registry());
                provider.stop().await;
            }
            self.started = false;
        }
        self.engine.context_mut().reset();
        tracing::info!("runtime stopped");
    }

    /// Match `text` against the step patterns and run the matched step.
    pub async fn execute_step(&mut self, text: &str) -> Result<()> {
        self.engine.execute_step(text).await
    }

    /// Run `actions` with `args` as the call-scoped arguments.
    pub async fn execute_actions(&mut self, actions: &[Action], args: &Args) -> Result<()> {
        self.engine.execute_actions(actions, args).await
    }

    /// Resolve `text` against the behaviors of `concept` and run the match.
    pub async fn execute_behavior(&mut self, concept: &str, text: &str, arg: Option<&str>) -> Result<()> {
        self.engine.execute_behavior(concept, text, arg).await
    }

    /// Run every hook of `kind` whose tag selector accepts `scenario_tags`,
    /// in definition order.
    pub async fn run_hooks<S: AsRef<str> + Sync>(&mut self, kind: HookKind, scenario_tags: &[S]) -> Result<()> {
        let definitions = Arc::clone(self.engine.definitions());
        let args = Args::new();
        for hook in definitions.hooks_for(kind, scenario_tags) {
            tracing::debug!(kind = ?kind, tags = %hook.tags, "running hook");
            self.engine.execute_actions(&hook.actions, &args).await?;
        }
        Ok(())
    }
}

async fn start_provider(provider: &Arc<dyn ActionProvider>, registry: &ActionRegistry) -> Result<()> {
    provider
        .start()
        .await
        .map_err(|err| RuntimeError::Provider(format!("{:#}", err)))?;
    Arc::clone(provider).register_actions(registry);
    Ok(())
}

// Re-export commonly used types
pub use outcome::{ActionOutcome, ResultMap};
