//! Stepweaver – natural-language test steps resolved into executable actions
//!
//! This crate implements the action resolution layer of a behaviour-driven
//! test runner:
//! - A line-oriented DSL of steps, concepts with behaviors, and tagged hooks
//! - Semantic matching of free-form text against DSL patterns, with captures
//! - A registry of primitive action handlers contributed by agents
//! - Recursive expansion of concept references with `[[key]]` substitution
//! - A cached tool-calling loop for instructions that need external tools

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Collaborator-backed agents and the tool-calling loop
pub mod agent;
/// DSL records, parser, and loaders
pub mod definition;
/// Text matching contract and caching decorator
pub mod matcher;
/// Registry, engine, context, cache, and the runtime orchestrator
pub mod runtime;
/// Small shared helpers
pub mod util;

// Re-export key types for convenience
pub use definition::{Action, DefinitionSet};
pub use runtime::error::{Result, RuntimeError};
pub use runtime::{Runtime, RuntimeConfig};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
