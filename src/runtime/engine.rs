//! Action resolution engine
//!
//! Executes action lists in order. A name with a registered handler is a
//! primitive and dispatches directly; any other name is looked up as a
//! concept, its behavior patterns are matched against the action text, and
//! the matched behavior's actions run recursively with the extracted
//! captures as their arguments. Expansion is depth-first and fully
//! sequential.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;

use super::context::{ActionContext, Args};
use super::error::{ActionError, Result};
use super::registry::ActionRegistry;
use crate::definition::{Action, Behavior, Concept, DefinitionSet};
use crate::matcher::{MatchedText, TextMatcher};

/// Per-run resolver. Owns the run's [`ActionContext`].
pub struct ActionEngine {
    definitions: Arc<DefinitionSet>,
    registry: Arc<ActionRegistry>,
    matcher: Arc<dyn TextMatcher>,
    context: ActionContext,
}

impl ActionEngine {
    /// Create an engine with an empty context.
    pub fn new(
        definitions: Arc<DefinitionSet>,
        registry: Arc<ActionRegistry>,
        matcher: Arc<dyn TextMatcher>,
    ) -> Self {
        Self {
            definitions,
            registry,
            matcher,
            context: ActionContext::new(),
        }
    }

    /// Loaded definitions.
    pub fn definitions(&self) -> &Arc<DefinitionSet> {
        &self.definitions
    }

    /// Handler registry consulted for primitive actions.
    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    /// Current run state.
    pub fn context(&self) -> &ActionContext {
        &self.context
    }

    /// Mutable run state.
    pub fn context_mut(&mut self) -> &mut ActionContext {
        &mut self.context
    }

    /// Match `text` against every step pattern and run the matched step.
    pub async fn execute_step(&mut self, text: &str) -> Result<()> {
        let definitions = Arc::clone(&self.definitions);
        let patterns = definitions.step_patterns();

        let matched = self.find_candidate(&patterns, text).await?;
        let Some((pattern, args)) = matched else {
            return Err(ActionError::StepNotFound(text.to_string()).into());
        };
        let Some(step) = definitions.step(&pattern) else {
            return Err(ActionError::StepNotFound(text.to_string()).into());
        };

        tracing::info!(step = %text, pattern = %step.text, "executing step");
        self.execute_actions(&step.actions, &args).await
    }

    /// Resolve `text` against the behaviors of `concept` and run the match.
    pub async fn execute_behavior(&mut self, concept: &str, text: &str, arg: Option<&str>) -> Result<()> {
        let definitions = Arc::clone(&self.definitions);
        let Some(found) = definitions.concept(concept) else {
            return Err(ActionError::UnknownConcept(concept.to_string()).into());
        };

        tracing::debug!(concept, text, arg, "executing behavior");
        let Some((behavior, args)) = self.match_behavior(found, text).await? else {
            return Err(ActionError::NoMatchingBehavior {
                concept: concept.to_string(),
                text: text.to_string(),
            }
            .into());
        };
        self.execute_actions(&behavior.actions, &args).await
    }

    /// Run `actions` in order with `args` as the call-scoped arguments.
    ///
    /// The first failure aborts the remaining actions. Context merges already
    /// applied are kept.
    pub fn execute_actions<'a>(&'a mut self, actions: &'a [Action], args: &'a Args) -> BoxFuture<'a, Result<()>> {
        async move {
            for action in actions {
                self.execute_action(action, args).await?;
            }
            Ok(())
        }
        .boxed()
    }

    async fn execute_action(&mut self, action: &Action, args: &Args) -> Result<()> {
        let text = self.context.substitute(&action.text, args);
        let arg = action.arg.as_deref().map(|arg| self.context.substitute(arg, args));

        tracing::info!(
            action = %action.name,
            text = %text,
            arg = ?arg,
            context_keys = self.context.len(),
            "executing action"
        );

        if self.registry.has(&action.name) {
            let outcome = self.registry.execute(&action.name, text, arg).await;
            if !outcome.success {
                return Err(ActionError::Failed {
                    name: action.name.clone(),
                    message: outcome.error_message().to_string(),
                }
                .into());
            }
            if let Some(result) = outcome.result {
                if !result.is_empty() {
                    tracing::info!(action = %action.name, keys = result.len(), "updating context");
                    self.context.merge(result);
                }
            }
            return Ok(());
        }

        let definitions = Arc::clone(&self.definitions);
        let matched = match definitions.concept(&action.name) {
            Some(concept) => self.match_behavior(concept, &text).await?,
            None => None,
        };
        let Some((behavior, captures)) = matched else {
            return Err(ActionError::Unknown {
                name: action.name.clone(),
                text,
            }
            .into());
        };

        tracing::debug!(concept = %action.name, behavior = %behavior.text, "expanding concept");
        self.execute_actions(&behavior.actions, &captures).await
    }

    async fn match_behavior<'c>(&self, concept: &'c Concept, text: &str) -> Result<Option<(&'c Behavior, Args)>> {
        let patterns = concept.patterns();
        let matched = self.find_candidate(&patterns, text).await?;
        Ok(matched.and_then(|(pattern, args)| concept.behavior(&pattern).map(|behavior| (behavior, args))))
    }

    /// Ask the matcher, discarding answers that are not one of `candidates`.
    async fn find_candidate(&self, candidates: &[String], text: &str) -> Result<Option<(String, Args)>> {
        if candidates.is_empty() {
            return Ok(None);
        }
        let matched = self.matcher.find(candidates, text).await?;
        Ok(matched.and_then(|MatchedText { text: pattern, args }| {
            if candidates.contains(&pattern) {
                Some((pattern, args))
            } else {
                tracing::warn!(text, pattern = %pattern, "matcher returned an unknown pattern");
                None
            }
        }))
    }
}
