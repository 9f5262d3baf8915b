use serde::{Deserialize, Serialize};

use super::tags::TagExpression;

/// One primitive or concept-reference instruction.
///
/// `text` and `arg` may carry `[[key]]` placeholders that are resolved at
/// execution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Registered action name or concept name.
    pub name: String,
    /// Text template handed to the handler.
    pub text: String,
    /// Optional parenthesised argument template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg: Option<String>,
}

impl Action {
    /// Build an action without an argument template.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            arg: None,
        }
    }

    /// Attach an argument template.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.arg = Some(arg.into());
        self
    }
}

/// A pattern with `{{name}}` captures plus the actions it expands to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Behavior {
    /// Pattern matched against an action's text.
    pub text: String,
    /// Actions executed when the pattern matches.
    pub actions: Vec<Action>,
}

/// Named, reusable group of behaviors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    /// Concept name, referenced as an action name.
    pub name: String,
    /// Behaviors in definition order.
    pub behaviors: Vec<Behavior>,
}

impl Concept {
    /// Behavior patterns in definition order, as fed to the matcher.
    pub fn patterns(&self) -> Vec<String> {
        self.behaviors.iter().map(|b| b.text.clone()).collect()
    }

    /// Find the behavior whose pattern is exactly `text`.
    pub fn behavior(&self, text: &str) -> Option<&Behavior> {
        self.behaviors.iter().find(|b| b.text == text)
    }
}

/// Top-level entry point matched against free-form step text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Step pattern.
    pub text: String,
    /// Actions executed when the step matches.
    pub actions: Vec<Action>,
}

/// Lifecycle event a hook is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookKind {
    /// Runs before a scenario.
    Before,
    /// Runs after a scenario.
    After,
}

/// Actions bound to a lifecycle event, filtered by a tag expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hook {
    /// Which lifecycle event the hook runs on.
    pub kind: HookKind,
    /// Raw tag selector as written in the source.
    pub tags: String,
    /// Parsed form of `tags`.
    pub selector: TagExpression,
    /// Actions to run.
    pub actions: Vec<Action>,
}

impl Hook {
    /// Whether this hook applies to a scenario carrying `scenario_tags`.
    pub fn applies_to<S: AsRef<str>>(&self, scenario_tags: &[S]) -> bool {
        self.selector.matches(scenario_tags)
    }
}

/// Everything loaded from the definition sources, read-only for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionSet {
    /// Step definitions.
    pub steps: Vec<Step>,
    /// Concept definitions, unique by name.
    pub concepts: Vec<Concept>,
    /// Hook definitions.
    pub hooks: Vec<Hook>,
}

impl DefinitionSet {
    /// Look up a concept by name.
    pub fn concept(&self, name: &str) -> Option<&Concept> {
        self.concepts.iter().find(|c| c.name == name)
    }

    /// Step patterns in definition order.
    pub fn step_patterns(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.text.clone()).collect()
    }

    /// Find the step whose pattern is exactly `text`.
    pub fn step(&self, text: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.text == text)
    }

    /// Hooks of the given kind that apply to the scenario tags, in order.
    pub fn hooks_for<'a, S: AsRef<str>>(
        &'a self,
        kind: HookKind,
        scenario_tags: &'a [S],
    ) -> impl Iterator<Item = &'a Hook> + 'a {
        self.hooks
            .iter()
            .filter(move |hook| hook.kind == kind && hook.applies_to(scenario_tags))
    }
}
