//! `ai*` actions: UI interaction through an element-locating agent.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::runtime::outcome::ActionOutcome;
use crate::runtime::registry::{ActionProvider, ActionRegistry};

/// Agent that finds UI elements from natural-language descriptions.
#[async_trait]
pub trait UiLocator: Send + Sync {
    /// Perform a free-form interaction.
    async fn ai(&self, prompt: &str) -> anyhow::Result<()>;
    /// Tap the described element.
    async fn ai_tap(&self, locate: &str) -> anyhow::Result<()>;
    /// Type `value` into the described element.
    async fn ai_input(&self, value: &str, locate: &str) -> anyhow::Result<()>;
    /// Hover over the described element.
    async fn ai_hover(&self, locate: &str) -> anyhow::Result<()>;
    /// Wait until `assertion` holds, failing once `timeout` has elapsed.
    async fn ai_wait_for(&self, assertion: &str, timeout: Duration) -> anyhow::Result<()>;
    /// Press `key`.
    async fn ai_keyboard_press(&self, key: &str) -> anyhow::Result<()>;
    /// Fail unless `assertion` holds.
    async fn ai_assert(&self, assertion: &str) -> anyhow::Result<()>;
}

/// One of the UI actions served by [`UiAgent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    /// `ai`
    Ai,
    /// `aiTap`
    Tap,
    /// `aiInput`; the arg is the value, the text locates the element
    Input,
    /// `aiHover`
    Hover,
    /// `aiWaitFor`
    WaitFor,
    /// `aiKeyboardPress`
    KeyboardPress,
    /// `aiAssert`
    Assert,
}

impl UiAction {
    /// Every UI action.
    pub const ALL: [UiAction; 7] = [
        UiAction::Ai,
        UiAction::Tap,
        UiAction::Input,
        UiAction::Hover,
        UiAction::WaitFor,
        UiAction::KeyboardPress,
        UiAction::Assert,
    ];

    /// Registered action name.
    pub fn name(self) -> &'static str {
        match self {
            UiAction::Ai => "ai",
            UiAction::Tap => "aiTap",
            UiAction::Input => "aiInput",
            UiAction::Hover => "aiHover",
            UiAction::WaitFor => "aiWaitFor",
            UiAction::KeyboardPress => "aiKeyboardPress",
            UiAction::Assert => "aiAssert",
        }
    }
}

/// Registers the `ai*` actions over a [`UiLocator`].
pub struct UiAgent {
    locator: Arc<dyn UiLocator>,
    wait_budget: Duration,
}

impl UiAgent {
    /// `wait_budget` bounds every `aiWaitFor`.
    pub fn new(locator: Arc<dyn UiLocator>, wait_budget: Duration) -> Self {
        Self { locator, wait_budget }
    }

    /// Wait budget handed to `aiWaitFor`.
    pub fn wait_budget(&self) -> Duration {
        self.wait_budget
    }

    /// Perform `action` with the substituted action text and arg.
    pub async fn perform(&self, action: UiAction, text: &str, arg: Option<&str>) -> anyhow::Result<()> {
        tracing::debug!(action = action.name(), text, "ui action");
        match action {
            UiAction::Ai => self.locator.ai(text).await,
            UiAction::Tap => self.locator.ai_tap(text).await,
            UiAction::Input => self.locator.ai_input(arg.unwrap_or_default(), text).await,
            UiAction::Hover => self.locator.ai_hover(text).await,
            UiAction::WaitFor => {
                match tokio::time::timeout(self.wait_budget, self.locator.ai_wait_for(text, self.wait_budget))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => anyhow::bail!(
                        "Timed out after {}ms waiting for: {}",
                        self.wait_budget.as_millis(),
                        text
                    ),
                }
            }
            UiAction::KeyboardPress => self.locator.ai_keyboard_press(text).await,
            UiAction::Assert => self.locator.ai_assert(text).await,
        }
    }
}

#[async_trait]
impl ActionProvider for UiAgent {
    fn action_names(&self) -> Vec<String> {
        UiAction::ALL.iter().map(|action| action.name().to_string()).collect()
    }

    fn register_actions(self: Arc<Self>, registry: &ActionRegistry) {
        for action in UiAction::ALL {
            let agent = Arc::clone(&self);
            registry.register(action.name(), move |text, arg| {
                let agent = Arc::clone(&agent);
                async move {
                    agent.perform(action, &text, arg.as_deref()).await?;
                    Ok::<_, anyhow::Error>(ActionOutcome::ok())
                }
            });
        }
    }
}
