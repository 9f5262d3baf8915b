//! Stepweaver CLI - Command-line interface for definitions and the cache
//!
//! Provides subcommands for validating definition files, trying the step
//! matcher, and inspecting the flat-file cache.

use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use stepweaver::agent::OpenAiChatClient;
use stepweaver::matcher::{CachingMatcher, LlmTextMatcher, TextMatcher};
use stepweaver::{Result, RuntimeConfig};

#[derive(Parser)]
#[command(name = "stepweaver")]
#[command(about = "Resolve natural-language test steps into executable actions", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Definitions root, overriding the configuration
    #[arg(short, long)]
    definitions: Option<PathBuf>,

    /// Cache root, overriding the configuration
    #[arg(long)]
    cache_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse every definition file and report what was loaded
    Check,

    /// Match text against the loaded step patterns
    Match {
        /// Step text to match
        text: String,

        /// Skip the match cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Inspect or clear the cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// List cache entries
    List {
        /// Restrict to one namespace
        namespace: Option<String>,
    },

    /// Delete cache entries
    Clear {
        /// Restrict to one namespace
        namespace: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    }
    .with_env_overrides();
    if let Some(root) = cli.definitions {
        config.definitions_root = root;
    }
    if let Some(root) = cli.cache_root {
        config.cache_root = root;
    }

    match cli.command {
        Commands::Check => {
            let definitions = config.definition_sources().load()?;
            println!("Steps:    {}", definitions.steps.len());
            println!("Concepts: {}", definitions.concepts.len());
            for concept in &definitions.concepts {
                println!("  {} ({} behaviors)", concept.name, concept.behaviors.len());
            }
            println!("Hooks:    {}", definitions.hooks.len());
        }

        Commands::Match { text, no_cache } => {
            let definitions = config.definition_sources().load()?;
            let client = Arc::new(OpenAiChatClient::from_env()?);
            let matcher: Box<dyn TextMatcher> = if config.use_cache && !no_cache {
                Box::new(CachingMatcher::new(LlmTextMatcher::new(client), config.cache()))
            } else {
                Box::new(LlmTextMatcher::new(client))
            };

            match matcher.find(&definitions.step_patterns(), &text).await? {
                Some(matched) => {
                    println!("Matched: {}", matched.text);
                    let mut args: Vec<_> = matched.args.into_iter().collect();
                    args.sort();
                    for (name, value) in args {
                        println!("  {} = {}", name, value);
                    }
                }
                None => println!("No matching step"),
            }
        }

        Commands::Cache { command } => {
            let cache = config.cache();
            match command {
                CacheCommands::List { namespace } => {
                    let entries = cache.list_entries(namespace.as_deref())?;
                    for entry in &entries {
                        let modified = entry
                            .modified
                            .map(|time| DateTime::<Local>::from(time).format("%Y-%m-%d %H:%M:%S").to_string())
                            .unwrap_or_else(|| "-".to_string());
                        println!(
                            "{:<16} {:>8}  {}  {}",
                            entry.namespace,
                            entry.size,
                            modified,
                            entry.path.display()
                        );
                    }
                    println!("{} entries under {:?}", entries.len(), cache.root());
                }
                CacheCommands::Clear { namespace } => {
                    let removed = cache.clear(namespace.as_deref())?;
                    println!("Removed {} entries", removed);
                }
            }
        }
    }

    Ok(())
}
