//! Definition model for the step DSL.
//!
//! Test authors describe behaviour in line-oriented text: `Step:` units map
//! free-form instructions to actions, `Concept:` units group reusable
//! `Behavior:` patterns, and `Before:`/`After:` hooks bind actions to the host
//! runner's lifecycle. Every other non-empty line is an action of the form
//! `name[(arg)]:text`.

/// Record types produced by the parser.
pub mod ast;
/// Filesystem loading of definition files and directories.
pub mod loader;
/// Line-oriented parser for steps, concepts, hooks, and actions.
pub mod parser;
/// Tag selector expressions for hooks.
pub mod tags;

pub use ast::{Action, Behavior, Concept, DefinitionSet, Hook, HookKind, Step};
pub use loader::{DefinitionSources, load_concepts, load_hooks, load_steps};
pub use parser::{parse_action, parse_concept, parse_hooks, parse_steps};
pub use tags::TagExpression;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience result alias for definition loading.
pub type Result<T> = std::result::Result<T, DefinitionError>;

/// Malformed or unreadable definition sources. Always fatal at load time.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// A line did not follow the DSL grammar.
    #[error("invalid definition format in line \"{line}\": {message}")]
    Format {
        /// Offending source line (trimmed).
        line: String,
        /// What was wrong with it.
        message: String,
    },

    /// The configured file or directory does not exist.
    #[error("definition file or directory does not exist: {0}")]
    MissingSource(PathBuf),

    /// Two concept units declared the same name.
    #[error("concept '{0}' is defined more than once")]
    DuplicateConcept(String),

    /// IO error while reading definitions.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
