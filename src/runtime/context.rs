//! Per-run key/value state and `[[key]]` placeholder substitution.

use std::collections::HashMap;

use super::outcome::ResultMap;

/// Call-scoped arguments, e.g. captures extracted by the matcher.
pub type Args = HashMap<String, String>;

const OPEN: &str = "[[";
const CLOSE: &str = "]]";

/// Accumulated state for one execution run.
///
/// Only grows by merging handler results; [`ActionContext::reset`] clears it
/// at run teardown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionContext {
    values: HashMap<String, String>,
}

impl ActionContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a handler result; later keys overwrite earlier ones.
    pub fn merge(&mut self, result: ResultMap) {
        self.values.extend(result);
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Number of keys held.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when nothing has been merged yet.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drop all state.
    pub fn reset(&mut self) {
        self.values.clear();
    }

    /// Snapshot of the held values.
    pub fn values(&self) -> &HashMap<String, String> {
        &self.values
    }

    /// Replace every `[[key]]` in `template`.
    ///
    /// A key resolves against `args`, then this context, then the empty
    /// string. Empty values fall through to the next source. Keys are trimmed.
    pub fn substitute(&self, template: &str, args: &Args) -> String {
        let mut output = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find(OPEN) {
            let after_open = &rest[start + OPEN.len()..];
            let Some(end) = after_open.find(CLOSE) else {
                break;
            };
            let raw_key = &after_open[..end];
            if raw_key.contains('\n') {
                output.push_str(&rest[..start + 1]);
                rest = &rest[start + 1..];
                continue;
            }

            output.push_str(&rest[..start]);
            output.push_str(self.resolve(raw_key.trim(), args));
            rest = &after_open[end + CLOSE.len()..];
        }

        output.push_str(rest);
        output
    }

    fn resolve<'a>(&'a self, key: &str, args: &'a Args) -> &'a str {
        args.get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
            .or_else(|| self.get(key).filter(|value| !value.is_empty()))
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn args(pairs: &[(&str, &str)]) -> Args {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn args_take_precedence_over_context() {
        let mut context = ActionContext::new();
        context.merge(args(&[("value", "from-context"), ("other", "ctx")]));
        let text = context.substitute("type '[[value]]' and [[ other ]]", &args(&[("value", "Ann")]));
        assert_eq!(text, "type 'Ann' and ctx");
    }

    #[test]
    fn missing_keys_become_empty() {
        let context = ActionContext::new();
        assert_eq!(context.substitute("a[[missing]]b", &Args::new()), "ab");
    }

    #[test]
    fn unterminated_placeholder_is_left_alone() {
        let context = ActionContext::new();
        assert_eq!(context.substitute("keep [[open", &Args::new()), "keep [[open");
    }

    #[test]
    fn merge_overwrites_and_reset_clears() {
        let mut context = ActionContext::new();
        context.merge(args(&[("k", "1")]));
        context.merge(args(&[("k", "2")]));
        assert_eq!(context.get("k"), Some("2"));
        context.reset();
        assert!(context.is_empty());
    }

    proptest! {
        #[test]
        fn substitution_prefers_args_then_context(
            key in "[a-z]{1,8}",
            arg_value in proptest::option::of("[A-Za-z0-9 ]{1,12}"),
            ctx_value in proptest::option::of("[A-Za-z0-9 ]{1,12}"),
        ) {
            let mut context = ActionContext::new();
            if let Some(v) = &ctx_value {
                context.merge(args(&[(key.as_str(), v.as_str())]));
            }
            let mut call_args = Args::new();
            if let Some(v) = &arg_value {
                call_args.insert(key.clone(), v.clone());
            }

            let expected = arg_value.clone().or(ctx_value.clone()).unwrap_or_default();
            let rendered = context.substitute(&format!("<[[{}]]>", key), &call_args);
            prop_assert_eq!(rendered, format!("<{}>", expected));
        }
    }
}
