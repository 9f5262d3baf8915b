//! Semantic matching of free-form text against DSL patterns.
//!
//! Matching itself is delegated to a chat collaborator: [`LlmTextMatcher`]
//! sends one deterministic prompt containing the JSON-encoded candidate list
//! and the input text, and expects `{"text": ..., "args": {...}}` back (or `{}`
//! for no match). [`CachingMatcher`] wraps any matcher with the flat-file
//! cache so repeated lookups skip the collaborator entirely.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::agent::chat::{ChatClient, ChatMessage};
use crate::runtime::error::{LlmError, Result};
use crate::runtime::storage::CacheStorage;
use crate::util::json::parse_json_object;

/// Cache namespace used for match results.
pub const MATCH_CACHE_NAMESPACE: &str = "step-agent";

/// Default instructions for the matching collaborator.
pub const MATCHER_SYSTEM_PROMPT: &str = r#"You match a sentence against a list of predefined texts.

Predefined texts may contain placeholders written as {{name}}. A predefined text
matches when it means the same thing as the sentence once its placeholders are
filled in; wording, word order and phrasing may differ. Pick the single best
match. Never invent a predefined text that is not in the list.

Respond with JSON only:
{"text": "<the matching predefined text, copied exactly>", "args": {"<placeholder name>": "<value taken from the sentence>"}}

If nothing in the list matches, respond with {}."#;

/// Best candidate pattern plus extracted captures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedText {
    /// The candidate pattern, exactly as supplied.
    pub text: String,
    /// Capture name → extracted substring.
    #[serde(default)]
    pub args: HashMap<String, String>,
}

/// Finds the candidate pattern that means the same as a piece of text.
#[async_trait]
pub trait TextMatcher: Send + Sync {
    /// Return the best match, or `None` when nothing matches confidently.
    async fn find(&self, candidates: &[String], text: &str) -> Result<Option<MatchedText>>;
}

/// Matcher backed by a chat collaborator.
pub struct LlmTextMatcher {
    client: Arc<dyn ChatClient>,
    system_prompt: String,
}

impl LlmTextMatcher {
    /// Use the default matching instructions.
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self::with_system_prompt(client, MATCHER_SYSTEM_PROMPT)
    }

    /// Use custom matching instructions.
    pub fn with_system_prompt(client: Arc<dyn ChatClient>, system_prompt: impl Into<String>) -> Self {
        Self {
            client,
            system_prompt: system_prompt.into(),
        }
    }

    /// User prompt sent for one lookup.
    pub fn request_prompt(candidates: &[String], text: &str) -> String {
        let encoded = serde_json::to_string(candidates).unwrap_or_else(|_| "[]".to_string());
        format!(
            "Here is a list of defined text:\n{}\n\nFind the predefined text that matches the following text: {}",
            encoded, text
        )
    }
}

#[async_trait]
impl TextMatcher for LlmTextMatcher {
    async fn find(&self, candidates: &[String], text: &str) -> Result<Option<MatchedText>> {
        let messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(Self::request_prompt(candidates, text)),
        ];
        let reply = self.client.ask(&messages, &[]).await?;
        let content = reply.content.unwrap_or_default();
        Ok(decode_match(&content)?)
    }
}

/// Decode a matcher reply. `{}` means no match.
pub fn decode_match(content: &str) -> std::result::Result<Option<MatchedText>, LlmError> {
    let value = parse_json_object(content)?;
    if value.as_object().is_some_and(|object| object.is_empty()) {
        return Ok(None);
    }
    let matched: MatchedText = serde_json::from_value(value)
        .map_err(|err| LlmError::ResponseParse(format!("{} in: {}", err, content)))?;
    Ok(Some(matched))
}

/// Read-before-compute cache around another matcher.
///
/// Only genuine matches are written; a miss is always recomputed.
pub struct CachingMatcher<M> {
    inner: M,
    cache: CacheStorage,
    namespace: String,
}

impl<M: TextMatcher> CachingMatcher<M> {
    /// Wrap `inner`, storing entries under [`MATCH_CACHE_NAMESPACE`].
    pub fn new(inner: M, cache: CacheStorage) -> Self {
        Self {
            inner,
            cache,
            namespace: MATCH_CACHE_NAMESPACE.to_string(),
        }
    }

    /// Store entries under a different namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Cache key for one lookup.
    pub fn cache_key(candidates: &[String], text: &str) -> String {
        format!("{}\n{}", candidates.join("\n"), text)
    }
}

#[async_trait]
impl<M: TextMatcher> TextMatcher for CachingMatcher<M> {
    async fn find(&self, candidates: &[String], text: &str) -> Result<Option<MatchedText>> {
        let key = Self::cache_key(candidates, text);

        match self.cache.read_cache::<MatchedText>(&self.namespace, &key) {
            Ok(Some(cached)) => {
                tracing::debug!(text, matched = %cached.text, "match cache hit");
                return Ok(Some(cached));
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(text, error = %err, "ignoring unreadable match cache entry"),
        }

        let matched = self.inner.find(candidates, text).await?;
        if let Some(found) = &matched {
            if let Err(err) = self.cache.write_cache(&self.namespace, &key, found) {
                tracing::warn!(text, error = %err, "failed to write match cache entry");
            }
        }
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::chat::ToolSpec;
    use crate::runtime::error::LlmResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FixedReply {
        reply: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatClient for FixedReply {
        async fn ask(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> LlmResult<ChatMessage> {
            assert!(tools.is_empty());
            assert_eq!(messages.len(), 2);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ChatMessage::assistant(self.reply.clone()))
        }
    }

    fn client(reply: &str) -> Arc<FixedReply> {
        Arc::new(FixedReply {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    fn candidates() -> Vec<String> {
        vec![
            "Check it shows '{{value}}' in the input field".to_string(),
            "Open the main page".to_string(),
        ]
    }

    #[test]
    fn request_prompt_embeds_json_candidates() {
        let prompt = LlmTextMatcher::request_prompt(&candidates(), "open main page");
        assert!(prompt.contains(r#"["Check it shows '{{value}}' in the input field","Open the main page"]"#));
        assert!(prompt.ends_with("following text: open main page"));
    }

    #[tokio::test]
    async fn decodes_match_and_no_match() {
        let reply = r#"{"text": "Check it shows '{{value}}' in the input field", "args": {"value": "name"}}"#;
        let matcher = LlmTextMatcher::new(client(reply));
        let matched = matcher
            .find(&candidates(), "Check it shows 'name' in the input field")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(matched.args["value"], "name");

        let matcher = LlmTextMatcher::new(client("{}"));
        assert!(matcher.find(&candidates(), "unrelated").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unparseable_reply_is_fatal() {
        let matcher = LlmTextMatcher::new(client("I could not decide"));
        let err = matcher.find(&candidates(), "x").await.unwrap_err();
        assert!(err.to_string().contains("LLMResponseParseError"));
    }

    #[tokio::test]
    async fn cache_hit_skips_collaborator() {
        let temp = TempDir::new().unwrap();
        let reply = r#"{"text": "Open the main page", "args": {}}"#;
        let chat = client(reply);
        let matcher = CachingMatcher::new(
            LlmTextMatcher::new(chat.clone()),
            CacheStorage::new(temp.path()),
        );

        let first = matcher.find(&candidates(), "go to main page").await.unwrap();
        let second = matcher.find(&candidates(), "go to main page").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(chat.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn misses_are_not_cached() {
        let temp = TempDir::new().unwrap();
        let chat = client("{}");
        let matcher = CachingMatcher::new(
            LlmTextMatcher::new(chat.clone()),
            CacheStorage::new(temp.path()),
        );

        assert!(matcher.find(&candidates(), "nothing").await.unwrap().is_none());
        assert!(matcher.find(&candidates(), "nothing").await.unwrap().is_none());
        assert_eq!(chat.calls.load(Ordering::SeqCst), 2);
    }
}
