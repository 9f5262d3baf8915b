use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use stepweaver::definition::{DefinitionSources, HookKind};
use stepweaver::matcher::{MatchedText, TextMatcher};
use stepweaver::runtime::error::Result;
use stepweaver::runtime::outcome::ActionOutcome;
use stepweaver::runtime::registry::{ActionProvider, ActionRegistry};
use stepweaver::{Runtime, RuntimeConfig, RuntimeError};
use tempfile::TempDir;

/// Matches when the input text equals a candidate after lowercasing.
struct CaseInsensitiveMatcher;

#[async_trait]
impl TextMatcher for CaseInsensitiveMatcher {
    async fn find(&self, candidates: &[String], text: &str) -> Result<Option<MatchedText>> {
        Ok(candidates
            .iter()
            .find(|candidate| candidate.to_lowercase() == text.to_lowercase())
            .map(|candidate| MatchedText {
                text: candidate.clone(),
                args: HashMap::new(),
            }))
    }
}

/// Provides `note` (records its text) and `remember` (returns a result).
#[derive(Default)]
struct NotebookProvider {
    notes: Arc<Mutex<Vec<String>>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

#[async_trait]
impl ActionProvider for NotebookProvider {
    fn action_names(&self) -> Vec<String> {
        vec!["note".to_string(), "remember".to_string()]
    }

    async fn start(&self) -> anyhow::Result<()> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn register_actions(self: Arc<Self>, registry: &ActionRegistry) {
        let notes = Arc::clone(&self.notes);
        registry.register("note", move |text, _| {
            let notes = Arc::clone(&notes);
            async move {
                notes.lock().push(text);
                Ok(ActionOutcome::ok())
            }
        });
        registry.register("remember", |text, _| async move {
            let (key, value) = text.split_once('=').unwrap_or((text.as_str(), ""));
            let mut result = HashMap::new();
            result.insert(key.trim().to_string(), value.trim().to_string());
            Ok(ActionOutcome::with_result(result))
        });
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

fn features(temp: &TempDir) -> RuntimeConfig {
    let root = temp.path().join("features");
    fs::create_dir_all(root.join("steps")).expect("steps dir");
    fs::create_dir_all(root.join("concepts")).expect("concepts dir");
    fs::create_dir_all(root.join("hooks")).expect("hooks dir");
    fs::write(
        root.join("steps/notes.steps"),
        "Step: I start a session\n\
         remember: session = s-1\n\
         Notes: write the greeting\n",
    )
    .expect("steps");
    fs::write(
        root.join("concepts/notes.concept"),
        "Concept: Notes\n\
         Behavior: write the greeting\n\
         note: hello from [[session]]\n",
    )
    .expect("concept");
    fs::write(
        root.join("hooks/lifecycle.hooks"),
        "Before: @notes\n\
         note: before @notes\n\
         Before: not @notes\n\
         note: before others\n\
         After:\n\
         note: after [[session]]\n",
    )
    .expect("hooks");

    RuntimeConfig {
        definitions_root: root,
        cache_root: temp.path().join("cache"),
        ..RuntimeConfig::default()
    }
}

fn runtime(config: RuntimeConfig) -> Runtime {
    let definitions = config.definition_sources().load().expect("definitions");
    Runtime::new(config, Arc::new(definitions), Arc::new(CaseInsensitiveMatcher))
}

#[tokio::test]
async fn scenario_runs_hooks_steps_and_teardown() {
    let temp = TempDir::new().expect("tempdir");
    let mut runtime = runtime(features(&temp));
    let provider = Arc::new(NotebookProvider::default());
    runtime.add_provider(provider.clone()).await.expect("add provider");
    runtime.start().await.expect("start");
    assert!(provider.started.load(Ordering::SeqCst));
    assert_eq!(runtime.registry().names(), vec!["note", "remember"]);

    let tags = ["@notes"];
    runtime.run_hooks(HookKind::Before, &tags).await.expect("before hooks");
    runtime.execute_step("i START a session").await.expect("step");
    runtime.run_hooks(HookKind::After, &tags).await.expect("after hooks");

    assert_eq!(runtime.context().get("session"), Some("s-1"));
    assert_eq!(
        *provider.notes.lock(),
        vec!["before @notes", "hello from s-1", "after s-1"]
    );

    runtime.stop().await;
    assert!(provider.stopped.load(Ordering::SeqCst));
    assert!(runtime.registry().names().is_empty());
    assert!(runtime.context().is_empty());
}

#[tokio::test]
async fn behaviors_run_directly_by_concept_name() {
    let temp = TempDir::new().expect("tempdir");
    let mut runtime = runtime(features(&temp));
    let provider = Arc::new(NotebookProvider::default());
    runtime.add_provider(provider.clone()).await.expect("add provider");
    runtime.start().await.expect("start");

    runtime
        .execute_behavior("Notes", "Write The Greeting", None)
        .await
        .expect("behavior");
    assert_eq!(*provider.notes.lock(), vec!["hello from "]);
}

#[tokio::test]
async fn step_fails_when_its_primitives_are_not_registered() {
    let temp = TempDir::new().expect("tempdir");
    let mut runtime = runtime(features(&temp));

    let err = runtime.execute_step("I start a session").await.unwrap_err();
    assert_eq!(err.to_string(), "Action error: Unknown action: remember: session = s-1");
}

#[tokio::test]
async fn provider_added_after_start_is_registered_immediately() {
    let temp = TempDir::new().expect("tempdir");
    let mut runtime = runtime(features(&temp));
    runtime.start().await.expect("start");
    runtime
        .add_provider(Arc::new(NotebookProvider::default()))
        .await
        .expect("add provider");
    assert!(runtime.registry().has("note"));
}

#[test]
fn broken_concept_is_a_definition_error() {
    let temp = TempDir::new().expect("tempdir");
    let config = features(&temp);
    fs::write(
        config.definitions_root.join("concepts/broken.concept"),
        "Behavior: no header\nnote: x\n",
    )
    .expect("broken concept");

    let err = DefinitionSources::under(&config.definitions_root)
        .load()
        .map_err(RuntimeError::from)
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Definition(_)));
}

/// Fails to start, so it never registers anything.
struct UnreachableBackend;

#[async_trait]
impl ActionProvider for UnreachableBackend {
    fn action_names(&self) -> Vec<String> {
        vec!["query".to_string()]
    }

    async fn start(&self) -> anyhow::Result<()> {
        anyhow::bail!("no backend")
    }

    fn register_actions(self: Arc<Self>, registry: &ActionRegistry) {
        registry.register("query", |_, _| async move { Ok(ActionOutcome::ok()) });
    }
}

#[tokio::test]
async fn failed_start_unwinds_providers_already_started() {
    let temp = TempDir::new().expect("tempdir");
    let mut runtime = runtime(features(&temp));
    let notebook = Arc::new(NotebookProvider::default());
    runtime.add_provider(notebook.clone()).await.expect("add notebook");
    runtime
        .add_provider(Arc::new(UnreachableBackend))
        .await
        .expect("add backend");

    let err = runtime.start().await.unwrap_err();
    assert_eq!(err.to_string(), "Provider error: no backend");
    assert!(notebook.started.load(Ordering::SeqCst));
    assert!(notebook.stopped.load(Ordering::SeqCst));
    assert!(runtime.registry().names().is_empty());
}
