//! `data` action: queries against external tool providers.
//!
//! Tools are collected from every [`ToolProvider`] when the agent starts. Each
//! tool call the collaborator makes is routed back to the provider that
//! advertised it.

use anyhow::{Context as _, anyhow};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::chat::{ToolCall, ToolSpec};
use super::tool_loop::{ToolCaller, ToolExecutor, ToolRequest};
use crate::runtime::error::Result;
use crate::runtime::outcome::ActionOutcome;
use crate::runtime::registry::{ActionProvider, ActionRegistry};

/// Cache namespace for recorded data tool calls.
pub const DATA_CACHE_NAMESPACE: &str = "data-agent";

/// Action name served by [`DataAgent`].
pub const DATA_ACTION: &str = "data";

/// Default instructions for the data collaborator.
pub const DATA_SYSTEM_PROMPT: &str = r#"You answer questions about, and make changes to, backend data using the provided tools.

Call the tools you need to carry out the user's instruction. When you are
done, reply with JSON only. For a change with nothing to report:
{"success": true}
For a query, return every requested value as a string:
{"success": true, "result": {"<name>": "<value>"}}
If the instruction cannot be carried out, reply:
{"success": false, "error": "<what went wrong>"}"#;

/// Source of named tools with JSON-schema parameters.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Provider name, for logs.
    fn name(&self) -> &str;

    /// Tools currently offered.
    async fn list_tools(&self) -> anyhow::Result<Vec<ToolSpec>>;

    /// Invoke tool `name` and return its textual content.
    async fn call_tool(&self, name: &str, arguments: Value) -> anyhow::Result<String>;
}

#[derive(Default)]
struct ToolTable {
    specs: Vec<ToolSpec>,
    routes: HashMap<String, usize>,
}

/// Resolves `data` instructions against the collected provider tools.
pub struct DataAgent {
    providers: Vec<Arc<dyn ToolProvider>>,
    executor: Arc<ToolExecutor>,
    table: RwLock<ToolTable>,
    system_prompt: String,
    use_cache: bool,
}

impl DataAgent {
    /// Create an agent over `providers` with caching enabled.
    pub fn new(providers: Vec<Arc<dyn ToolProvider>>, executor: Arc<ToolExecutor>) -> Self {
        Self {
            providers,
            executor,
            table: RwLock::new(ToolTable::default()),
            system_prompt: DATA_SYSTEM_PROMPT.to_string(),
            use_cache: true,
        }
    }

    /// Enable or disable cache replay.
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Replace the default instructions.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Rebuild the routing table from the providers.
    ///
    /// When two providers offer the same tool name the later one wins.
    pub async fn collect_tools(&self) -> anyhow::Result<()> {
        let mut table = ToolTable::default();
        for (index, provider) in self.providers.iter().enumerate() {
            let tools = provider
                .list_tools()
                .await
                .with_context(|| format!("listing tools of provider {}", provider.name()))?;
            for tool in tools {
                let name = tool.name().to_string();
                match table.routes.insert(name.clone(), index) {
                    Some(_) => {
                        tracing::warn!(tool = %name, provider = provider.name(), "tool name shadows an earlier provider");
                        if let Some(slot) = table.specs.iter_mut().find(|spec| spec.name() == name) {
                            *slot = tool;
                        }
                    }
                    None => table.specs.push(tool),
                }
            }
        }
        tracing::info!(tools = table.specs.len(), providers = self.providers.len(), "data tools collected");
        *self.table.write() = table;
        Ok(())
    }

    /// Tools currently advertised to the collaborator.
    pub fn tools(&self) -> Vec<ToolSpec> {
        self.table.read().specs.clone()
    }

    /// Carry out one instruction.
    pub async fn ask(&self, prompt: &str) -> Result<ActionOutcome> {
        let tools = self.tools();
        let request = ToolRequest::new(&self.system_prompt, &tools)
            .use_cache(self.use_cache)
            .cache_key(DATA_CACHE_NAMESPACE);
        self.executor.execute(prompt, request, self).await
    }
}

#[async_trait]
impl ToolCaller for DataAgent {
    async fn call_tool(&self, call: &ToolCall) -> anyhow::Result<String> {
        let route = self.table.read().routes.get(call.name()).copied();
        let provider = route
            .and_then(|index| self.providers.get(index))
            .ok_or_else(|| anyhow!("Unknown tool: {}", call.name()))?;
        let arguments = call
            .function
            .parse_arguments()
            .with_context(|| format!("invalid arguments for {}", call.name()))?;
        provider.call_tool(call.name(), arguments).await
    }
}

#[async_trait]
impl ActionProvider for DataAgent {
    fn action_names(&self) -> Vec<String> {
        vec![DATA_ACTION.to_string()]
    }

    async fn start(&self) -> anyhow::Result<()> {
        self.collect_tools().await
    }

    fn register_actions(self: Arc<Self>, registry: &ActionRegistry) {
        registry.register(DATA_ACTION, move |text, _arg| {
            let agent = Arc::clone(&self);
            async move { agent.ask(&text).await.map_err(anyhow::Error::from) }
        });
    }

    async fn stop(&self) {
        *self.table.write() = ToolTable::default();
    }
}
