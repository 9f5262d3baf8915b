//! `browser` action: browser control through the cached tool loop.

use anyhow::{Context as _, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use super::chat::{ToolCall, ToolSpec};
use super::tool_loop::{ToolCaller, ToolExecutor, ToolRequest};
use crate::runtime::error::Result;
use crate::runtime::outcome::ActionOutcome;
use crate::runtime::registry::{ActionProvider, ActionRegistry};

/// Cache namespace for recorded browser tool calls.
pub const BROWSER_CACHE_NAMESPACE: &str = "browser-agent";

/// Action name served by [`BrowserAgent`].
pub const BROWSER_ACTION: &str = "browser";

/// Default instructions for the browser collaborator.
pub const BROWSER_SYSTEM_PROMPT: &str = r#"You control a web browser through the provided tools.

Carry out the user's instruction by calling tools. Call only the tools you
need, in the order the instruction implies. When you are done, reply with JSON
only:
{"success": true}
If the instruction asks for information, include it as string values:
{"success": true, "result": {"<name>": "<value>"}}
If the instruction cannot be carried out, reply:
{"success": false, "error": "<what went wrong>"}"#;

/// Primitive browser operations.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Navigate to `url`.
    async fn open(&self, url: &str) -> anyhow::Result<()>;
    /// Save a screenshot named `name`.
    async fn save_screenshot(&self, name: &str) -> anyhow::Result<()>;
    /// Save the recorded video as `name`.
    async fn save_video(&self, name: &str) -> anyhow::Result<()>;
    /// Discard the recorded video.
    async fn delete_video(&self) -> anyhow::Result<()>;
    /// Write `key = value` into local storage.
    async fn add_item_in_local_storage(&self, key: &str, value: &str) -> anyhow::Result<()>;
    /// Close the browser.
    async fn quit(&self) -> anyhow::Result<()>;
}

/// Resolves `browser` instructions by letting the collaborator call driver
/// tools.
pub struct BrowserAgent {
    driver: Arc<dyn Driver>,
    executor: Arc<ToolExecutor>,
    tools: Vec<ToolSpec>,
    system_prompt: String,
    use_cache: bool,
}

impl BrowserAgent {
    /// Create an agent with caching enabled.
    pub fn new(driver: Arc<dyn Driver>, executor: Arc<ToolExecutor>) -> Self {
        Self {
            driver,
            executor,
            tools: browser_tools(),
            system_prompt: BROWSER_SYSTEM_PROMPT.to_string(),
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

    /// Tools advertised to the collaborator.
    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    /// Carry out one instruction.
    pub async fn ask(&self, prompt: &str) -> Result<ActionOutcome> {
        let request = ToolRequest::new(&self.system_prompt, &self.tools)
            .use_cache(self.use_cache)
            .cache_key(BROWSER_CACHE_NAMESPACE);
        self.executor.execute(prompt, request, self).await
    }
}

#[async_trait]
impl ToolCaller for BrowserAgent {
    async fn call_tool(&self, call: &ToolCall) -> anyhow::Result<String> {
        let args = call
            .function
            .parse_arguments()
            .with_context(|| format!("invalid arguments for {}", call.name()))?;

        let details = match call.name() {
            "open" => {
                let url = string_arg(&args, "url")?;
                self.driver.open(url).await?;
                format!("Successfully opened URL: {url}")
            }
            "saveScreenshot" => {
                let name = string_arg(&args, "name")?;
                self.driver.save_screenshot(name).await?;
                format!("Screenshot saved as: {name}.png")
            }
            "saveVideo" => {
                let name = string_arg(&args, "name")?;
                self.driver.save_video(name).await?;
                format!("Video saved as: {name}.webm")
            }
            "deleteVideo" => {
                self.driver.delete_video().await?;
                "Video deleted".to_string()
            }
            "addItemInLocalStorage" => {
                let key = string_arg(&args, "key")?;
                let value = string_arg(&args, "value")?;
                self.driver.add_item_in_local_storage(key, value).await?;
                format!("Added local storage item: {key} = {value}")
            }
            "quit" => {
                self.driver.quit().await?;
                "Browser closed".to_string()
            }
            other => return Err(anyhow!("Unknown tool: {other}")),
        };

        Ok(json!({ "action": call.name(), "details": details }).to_string())
    }
}

#[async_trait]
impl ActionProvider for BrowserAgent {
    fn action_names(&self) -> Vec<String> {
        vec![BROWSER_ACTION.to_string()]
    }

    fn register_actions(self: Arc<Self>, registry: &ActionRegistry) {
        registry.register(BROWSER_ACTION, move |text, _arg| {
            let agent = Arc::clone(&self);
            async move { agent.ask(&text).await.map_err(anyhow::Error::from) }
        });
    }

    async fn stop(&self) {
        if let Err(err) = self.driver.quit().await {
            tracing::warn!(error = %err, "error closing browser");
        }
    }
}

fn string_arg<'a>(args: &'a Value, key: &str) -> anyhow::Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("missing string argument '{key}'"))
}

fn browser_tools() -> Vec<ToolSpec> {
    let no_params = json!({ "type": "object", "properties": {} });
    vec![
        ToolSpec::function(
            "open",
            "Open the specified URL",
            json!({
                "type": "object",
                "properties": { "url": { "type": "string", "description": "URL to open" } },
                "required": ["url"]
            }),
        ),
        ToolSpec::function(
            "saveScreenshot",
            "Save a screenshot of the current page",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Screenshot filename (without extension)" }
                },
                "required": ["name"]
            }),
        ),
        ToolSpec::function(
            "saveVideo",
            "Save the recorded video",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Video filename (without extension)" }
                },
                "required": ["name"]
            }),
        ),
        ToolSpec::function("deleteVideo", "Delete the recorded video", no_params.clone()),
        ToolSpec::function(
            "addItemInLocalStorage",
            "Add an item to local storage",
            json!({
                "type": "object",
                "properties": {
                    "key": { "type": "string", "description": "Storage key" },
                    "value": { "type": "string", "description": "Storage value" }
                },
                "required": ["key", "value"]
            }),
        ),
        ToolSpec::function("quit", "Close the browser", no_params),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertises_every_driver_tool() {
        let names: Vec<String> = browser_tools().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(
            names,
            ["open", "saveScreenshot", "saveVideo", "deleteVideo", "addItemInLocalStorage", "quit"]
        );
    }

    #[test]
    fn string_arg_requires_strings() {
        let args = json!({ "url": "http://x", "n": 1 });
        assert_eq!(string_arg(&args, "url").unwrap(), "http://x");
        assert!(string_arg(&args, "n").is_err());
        assert!(string_arg(&args, "missing").is_err());
    }
}
