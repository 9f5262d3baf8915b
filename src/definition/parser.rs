use super::ast::{Action, Behavior, Concept, Hook, HookKind, Step};
use super::tags::TagExpression;
use super::{DefinitionError, Result};

const STEP_MARKER: &str = "Step:";
const CONCEPT_MARKER: &str = "Concept:";
const BEHAVIOR_MARKER: &str = "Behavior:";
const BEFORE_MARKER: &str = "Before:";
const AFTER_MARKER: &str = "After:";

/// Parse a single `name[(arg)]:text` action line.
pub fn parse_action(line: &str) -> Result<Action> {
    let trimmed = line.trim();
    let Some(delimiter) = trimmed.find(':') else {
        return Err(format_error(trimmed, "missing ':' delimiter"));
    };

    let mut name = trimmed[..delimiter].trim();
    if name.is_empty() {
        return Err(format_error(trimmed, "action name is empty"));
    }

    let mut arg = None;
    if name.ends_with(')') {
        if let Some(open) = name.rfind('(').filter(|&index| index > 0) {
            arg = Some(name[open + 1..name.len() - 1].trim().to_string());
            name = name[..open].trim();
        }
    }

    let text = trimmed[delimiter + 1..].trim();
    if text.is_empty() {
        return Err(format_error(trimmed, "action text is empty"));
    }

    Ok(Action {
        name: name.to_string(),
        text: text.to_string(),
        arg,
    })
}

/// Parse a block of step definitions.
pub fn parse_steps(source: &str) -> Result<Vec<Step>> {
    let mut steps: Vec<Step> = Vec::new();

    for line in significant_lines(source) {
        if let Some(rest) = line.strip_prefix(STEP_MARKER) {
            let text = rest.trim();
            if text.is_empty() {
                return Err(format_error(line, "step text is empty"));
            }
            steps.push(Step {
                text: text.to_string(),
                actions: Vec::new(),
            });
        } else if let Some(step) = steps.last_mut() {
            step.actions.push(parse_action(line)?);
        } else {
            return Err(format_error(line, "action appears before any Step: marker"));
        }
    }

    Ok(steps)
}

/// Parse one concept unit. Exactly one `Concept:` header is allowed.
pub fn parse_concept(source: &str) -> Result<Concept> {
    let mut name: Option<String> = None;
    let mut behaviors: Vec<Behavior> = Vec::new();

    for line in significant_lines(source) {
        if let Some(rest) = line.strip_prefix(CONCEPT_MARKER) {
            let candidate = rest.trim();
            if candidate.is_empty() {
                return Err(format_error(line, "concept name is empty"));
            }
            if candidate.contains(':') {
                return Err(format_error(line, "concept name must not contain ':'"));
            }
            if name.is_some() {
                return Err(format_error(line, "only one concept may be defined per unit"));
            }
            name = Some(candidate.to_string());
        } else if let Some(rest) = line.strip_prefix(BEHAVIOR_MARKER) {
            let text = rest.trim();
            if text.is_empty() {
                return Err(format_error(line, "behavior text is empty"));
            }
            behaviors.push(Behavior {
                text: text.to_string(),
                actions: Vec::new(),
            });
        } else if let Some(behavior) = behaviors.last_mut() {
            behavior.actions.push(parse_action(line)?);
        } else {
            return Err(format_error(line, "action appears before any Behavior: marker"));
        }
    }

    let name = name.ok_or_else(|| DefinitionError::Format {
        line: String::new(),
        message: "missing Concept: header".to_string(),
    })?;

    Ok(Concept { name, behaviors })
}

/// Parse a block of `Before:` / `After:` hook definitions.
pub fn parse_hooks(source: &str) -> Result<Vec<Hook>> {
    let mut hooks: Vec<Hook> = Vec::new();

    for line in significant_lines(source) {
        let marker = line
            .strip_prefix(BEFORE_MARKER)
            .map(|rest| (HookKind::Before, rest))
            .or_else(|| {
                line.strip_prefix(AFTER_MARKER)
                    .map(|rest| (HookKind::After, rest))
            });

        if let Some((kind, rest)) = marker {
            let tags = rest.trim();
            hooks.push(Hook {
                kind,
                tags: tags.to_string(),
                selector: TagExpression::parse(tags)?,
                actions: Vec::new(),
            });
        } else if let Some(hook) = hooks.last_mut() {
            hook.actions.push(parse_action(line)?);
        } else {
            return Err(format_error(line, "action appears before any hook marker"));
        }
    }

    Ok(hooks)
}

fn significant_lines(source: &str) -> impl Iterator<Item = &str> {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

fn format_error(line: &str, message: &str) -> DefinitionError {
    DefinitionError::Format {
        line: line.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_action_with_argument() {
        let action = parse_action("aiInput(value):the name field").unwrap();
        assert_eq!(action.name, "aiInput");
        assert_eq!(action.arg.as_deref(), Some("value"));
        assert_eq!(action.text, "the name field");
    }

    #[test]
    fn trims_around_delimiters() {
        let action = parse_action("  aiTap ( x ) :  the button  ").unwrap();
        assert_eq!(action.name, "aiTap");
        assert_eq!(action.arg.as_deref(), Some("x"));
        assert_eq!(action.text, "the button");
    }

    #[test]
    fn keeps_colons_inside_text() {
        let action = parse_action("browser:open http://localhost:8080").unwrap();
        assert_eq!(action.name, "browser");
        assert_eq!(action.text, "open http://localhost:8080");
        assert_eq!(action.arg, None);
    }

    #[test]
    fn rejects_malformed_actions() {
        assert!(parse_action("ai:").is_err());
        assert!(parse_action(":text").is_err());
        assert!(parse_action("no delimiter here").is_err());
    }

    #[test]
    fn parses_multiple_steps() {
        let steps = parse_steps(
            "Step: I open the page\nbrowser: open http://example.com\n\nStep: I click '{{label}}'\naiTap: [[label]] button\n",
        )
        .unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].text, "I click '{{label}}'");
        assert_eq!(steps[1].actions[0].text, "[[label]] button");
    }

    #[test]
    fn step_errors() {
        assert!(parse_steps("browser: open").is_err());
        assert!(parse_steps("Step:   \nai: x").is_err());
    }

    #[test]
    fn concept_errors() {
        assert!(parse_concept("Concept: A\nConcept: B").is_err());
        assert!(parse_concept("Concept: A:B").is_err());
        assert!(parse_concept("Concept:").is_err());
        assert!(parse_concept("Concept: A\nai: x").is_err());
        assert!(parse_concept("Behavior: do it\nai: x").is_err());
    }

    #[test]
    fn hooks_accept_empty_tags() {
        let hooks = parse_hooks("Before:\nbrowser: open home\nAfter: @cleanup\ndata: drop rows").unwrap();
        assert_eq!(hooks.len(), 2);
        assert_eq!(hooks[0].kind, HookKind::Before);
        assert_eq!(hooks[0].selector, TagExpression::Any);
        assert_eq!(hooks[1].kind, HookKind::After);
        assert_eq!(hooks[1].tags, "@cleanup");
    }
}
