//! Error types for action resolution and execution
//!
//! Domain errors use thiserror and convert into [`RuntimeError`] at the
//! public API boundary. Routine failures inside the registry and the cached
//! tool loop are carried as [`ActionOutcome`](super::outcome::ActionOutcome)
//! values instead and never reach these types unless they abort a run.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::definition::DefinitionError;

/// Top-level runtime error
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Definition loading errors
    #[error("Definition error: {0}")]
    Definition(#[from] DefinitionError),

    /// Action resolution/execution errors
    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    /// LLM collaborator errors
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Cache storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// An action provider failed to start
    #[error("Provider error: {0}")]
    Provider(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors raised while resolving or executing actions
#[derive(Debug, Error)]
pub enum ActionError {
    /// Name is neither registered nor a concept whose behaviors match
    #[error("Unknown action: {name}: {text}")]
    Unknown {
        /// Action name
        name: String,
        /// Substituted action text
        text: String,
    },

    /// `execute_behavior` named a concept that is not loaded
    #[error("Unknown concept: {0}")]
    UnknownConcept(String),

    /// No behavior of the concept matched the text
    #[error("No matching behavior found for concept {concept} with text: {text}")]
    NoMatchingBehavior {
        /// Concept name
        concept: String,
        /// Text that failed to match
        text: String,
    },

    /// No step pattern matched the step text
    #[error("Step not found: {0}")]
    StepNotFound(String),

    /// A registered handler reported failure
    #[error("Action '{name}' failed: {message}")]
    Failed {
        /// Action name
        name: String,
        /// Handler error message
        message: String,
    },
}

/// Convenience result alias for action execution
pub type ActionResult<T> = std::result::Result<T, ActionError>;

/// Errors from the LLM collaborator and the tool-calling loop
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport or HTTP failure talking to the collaborator
    #[error("LLM request failed: {0}")]
    Request(String),

    /// Response contained no parseable JSON object
    #[error("LLMResponseParseError: {0}")]
    ResponseParse(String),

    /// The collaborator reported `success: false` for the instruction
    #[error("Action failed: {prompt}")]
    ActionFailed {
        /// Original instruction
        prompt: String,
        /// Error text reported by the collaborator, if any
        reason: Option<String>,
    },

    /// The collaborator kept requesting tools past the configured cap
    #[error("Tool-calling loop exceeded {rounds} rounds")]
    RoundLimitExceeded {
        /// Configured round cap
        rounds: usize,
    },
}

/// Convenience result alias for LLM operations
pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Cache storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Atomic write failed
    #[error("Atomic write failed for {path}: {detail}")]
    AtomicWriteFailed {
        /// Path where write failed
        path: PathBuf,
        /// Error details
        detail: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type using RuntimeError
pub type Result<T> = std::result::Result<T, RuntimeError>;
