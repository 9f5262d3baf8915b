//! Collaborator-backed agents.
//!
//! `chat` and `harness` talk to the LLM; `tool_loop` runs the cached
//! tool-calling loop on top of them. `browser`, `data`, and `ui` turn external
//! drivers into registered primitive actions.

pub mod browser;
pub mod chat;
pub mod data;
pub mod harness;
pub mod tool_loop;
pub mod ui;

pub use browser::{BrowserAgent, Driver};
pub use chat::{ChatClient, ChatMessage, Role, ToolCall, ToolSpec};
pub use data::{DataAgent, ToolProvider};
pub use harness::{ChatSettings, OpenAiChatClient};
pub use tool_loop::{ToolCaller, ToolExecutor, ToolRequest};
pub use ui::{UiAction, UiAgent, UiLocator};
