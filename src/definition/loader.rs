//! Filesystem loading for step, concept, and hook definitions.
//!
//! Each definition kind is read from either a single file or a directory that
//! is walked recursively for files with the kind's extension. Entries are
//! visited by file name within each directory so definition order is stable.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::ast::{Concept, DefinitionSet, Hook, Step};
use super::parser::{parse_concept, parse_hooks, parse_steps};
use super::{DefinitionError, Result};

/// File extension for step definitions.
pub const STEPS_EXTENSION: &str = "steps";
/// File extension for concept definitions (one concept per file).
pub const CONCEPT_EXTENSION: &str = "concept";
/// File extension for hook definitions.
pub const HOOKS_EXTENSION: &str = "hooks";

/// Where each definition kind is read from. `None` skips that kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionSources {
    /// Step definition file or directory.
    pub steps: Option<PathBuf>,
    /// Concept definition file or directory.
    pub concepts: Option<PathBuf>,
    /// Hook definition file or directory.
    pub hooks: Option<PathBuf>,
}

impl DefinitionSources {
    /// Conventional layout: `<root>/steps`, `<root>/concepts`, `<root>/hooks`.
    ///
    /// Subdirectories that do not exist are skipped.
    pub fn under(root: &Path) -> Self {
        let existing = |name: &str| {
            let path = root.join(name);
            path.exists().then_some(path)
        };
        Self {
            steps: existing("steps"),
            concepts: existing("concepts"),
            hooks: existing("hooks"),
        }
    }

    /// Load every configured kind into a [`DefinitionSet`].
    pub fn load(&self) -> Result<DefinitionSet> {
        let steps = match &self.steps {
            Some(path) => load_steps(path)?,
            None => Vec::new(),
        };
        let concepts = match &self.concepts {
            Some(path) => load_concepts(path)?,
            None => Vec::new(),
        };
        let hooks = match &self.hooks {
            Some(path) => load_hooks(path)?,
            None => Vec::new(),
        };

        tracing::info!(
            steps = steps.len(),
            concepts = concepts.len(),
            hooks = hooks.len(),
            "loaded definitions"
        );

        Ok(DefinitionSet {
            steps,
            concepts,
            hooks,
        })
    }
}

/// Load step definitions from a `.steps` file or directory.
pub fn load_steps(path: &Path) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    for file in definition_files(path, STEPS_EXTENSION)? {
        steps.extend(parse_steps(&read_source(&file)?)?);
    }
    Ok(steps)
}

/// Load concepts from a `.concept` file or directory. Names must be unique.
pub fn load_concepts(path: &Path) -> Result<Vec<Concept>> {
    let mut concepts = Vec::new();
    let mut seen = HashSet::new();
    for file in definition_files(path, CONCEPT_EXTENSION)? {
        let concept = parse_concept(&read_source(&file)?)?;
        if !seen.insert(concept.name.clone()) {
            return Err(DefinitionError::DuplicateConcept(concept.name));
        }
        concepts.push(concept);
    }
    Ok(concepts)
}

/// Load hooks from a `.hooks` file or directory.
pub fn load_hooks(path: &Path) -> Result<Vec<Hook>> {
    let mut hooks = Vec::new();
    for file in definition_files(path, HOOKS_EXTENSION)? {
        hooks.extend(parse_hooks(&read_source(&file)?)?);
    }
    Ok(hooks)
}

fn read_source(path: &Path) -> Result<String> {
    tracing::debug!(path = %path.display(), "reading definition file");
    Ok(fs::read_to_string(path)?)
}

/// Resolve `path` to the list of files to parse.
///
/// Symlinked directories are not descended into.
fn definition_files(path: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        return Err(DefinitionError::MissingSource(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() && entry.path().extension().and_then(|ext| ext.to_str()) == Some(extension) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
