//! Action handler registry
//!
//! Maps action names to asynchronous handlers. Collaborating agents register
//! their primitives when they start and remove them when they stop, so the
//! table is guarded by a lock and every method takes `&self`. Execution never
//! fails at this boundary: unknown names, handler errors, and handler panics
//! all come back as a failed [`ActionOutcome`].

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::outcome::ActionOutcome;

/// Future returned by a handler invocation.
pub type HandlerFuture = BoxFuture<'static, anyhow::Result<ActionOutcome>>;

/// Handler invoked with the substituted `(text, arg)` of an action.
pub type ActionHandler = Arc<dyn Fn(String, Option<String>) -> HandlerFuture + Send + Sync>;

/// Per-run table of action handlers.
#[derive(Default)]
pub struct ActionRegistry {
    handlers: RwLock<HashMap<String, ActionHandler>>,
}

impl ActionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any existing handler for `name`.
    pub fn register<F, Fut>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(String, Option<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ActionOutcome>> + Send + 'static,
    {
        let handler: ActionHandler = Arc::new(move |text, arg| handler(text, arg).boxed());
        self.handlers.write().insert(name.into(), handler);
    }

    /// Remove the handler for `name`. Returns whether one was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.handlers.write().remove(name).is_some()
    }

    /// Check whether `name` has a handler.
    pub fn has(&self, name: &str) -> bool {
        self.handlers.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Run the handler for `name`.
    pub async fn execute(&self, name: &str, text: String, arg: Option<String>) -> ActionOutcome {
        let handler = self.handlers.read().get(name).cloned();
        let Some(handler) = handler else {
            return ActionOutcome::failure(format!("Unknown action: {}", name));
        };

        let invocation = AssertUnwindSafe(async move { handler(text, arg).await });
        match invocation.catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => ActionOutcome::failure(format!("{:#}", err)),
            Err(panic) => ActionOutcome::failure(panic_message(panic.as_ref())),
        }
    }
}

/// Implemented by agents that contribute primitive actions.
///
/// The runtime calls `start`, then `register_actions`; on teardown it calls
/// `unregister_actions`, then `stop`.
#[async_trait]
pub trait ActionProvider: Send + Sync {
    /// Names this provider registers.
    fn action_names(&self) -> Vec<String>;

    /// Acquire whatever the handlers need before they are registered.
    async fn start(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Release resources after the handlers are removed.
    async fn stop(&self) {}

    /// Install handlers into `registry`.
    fn register_actions(self: Arc<Self>, registry: &ActionRegistry);

    /// Remove this provider's handlers from `registry`.
    fn unregister_actions(&self, registry: &ActionRegistry) {
        for name in self.action_names() {
            registry.unregister(&name);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("handler panicked: {}", message)
    } else {
        "handler panicked".to_string()
    }
}
