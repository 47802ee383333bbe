//! CLI Tooling
//!
//! Command-line surface over one [`WorkspaceEngine`]. Each invocation builds
//! the engine from configuration, loads the tree, and runs one command (or a
//! script of commands against the same engine).

use crate::backend::build_backend;
use crate::config::{BackendMode, CanopyConfig, ConfigLoader};
use crate::error::ApiError;
use crate::types::NodeKind;
use crate::workspace::{format_git_status_text, format_tree_text, WorkspaceEngine};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Canopy CLI - browse and edit a workspace tree
#[derive(Parser, Debug)]
#[command(name = "canopy")]
#[command(about = "Workspace tree engine over a remote or in-memory backend")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory searched for canopy.toml
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Workspace root path on the backend
    #[arg(long)]
    pub root: Option<String>,

    /// Backend to use (default: remote when a base URL is configured)
    #[arg(long, value_enum)]
    pub backend: Option<BackendArg>,

    /// Remote backend base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Fixture file or directory for the virtual backend
    #[arg(long)]
    pub fixture: Option<PathBuf>,

    /// Enable verbose logging to stderr (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendArg {
    Virtual,
    Remote,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    File,
    Folder,
}

impl From<KindArg> for NodeKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::File => NodeKind::File,
            KindArg::Folder => NodeKind::Directory,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show the workspace tree
    Tree {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print a file's content
    Cat { path: String },
    /// Create a file or folder under a directory
    Create {
        #[arg(value_enum)]
        kind: KindArg,
        /// Parent directory ("/" for the root)
        base: String,
        name: String,
    },
    /// Rename a file or folder within its directory
    Rename { path: String, new_name: String },
    /// Delete a file or folder and everything below it
    Delete { path: String },
    /// Write content to a file, creating it if needed
    Write { path: String, content: String },
    /// Show git status and the staged set
    Status {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Stage a path for the next commit
    Stage { path: String },
    /// Remove a path from the staged set
    Unstage { path: String },
    /// Commit the staged set
    Commit {
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Discard uncommitted changes
    Reset,
    /// Run one command per line against a single engine
    Script { file: PathBuf },
}

/// One script line: a subcommand without the binary name or global options.
#[derive(Parser, Debug)]
#[command(no_binary_name = true)]
struct ScriptLine {
    #[command(subcommand)]
    command: Commands,
}

/// Resolve configuration for a CLI invocation: files and environment first,
/// then command-line overrides.
pub fn load_config(cli: &Cli) -> Result<CanopyConfig, ApiError> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load(&cli.workspace)?,
    };

    if let Some(root) = &cli.root {
        config.workspace.root = root.clone();
    }
    if let Some(backend) = cli.backend {
        config.backend.mode = match backend {
            BackendArg::Virtual => BackendMode::Virtual,
            BackendArg::Remote => BackendMode::Remote,
        };
    }
    if let Some(url) = &cli.base_url {
        config.backend.remote.base_url = Some(url.clone());
    }
    if let Some(fixture) = &cli.fixture {
        if fixture.is_dir() {
            config.fixture.directory = Some(fixture.clone());
        } else {
            config.fixture.path = Some(fixture.clone());
        }
    }

    let logging = &mut config.logging;
    if cli.verbose {
        logging.level = "debug".to_string();
        logging.output = "stderr".to_string();
    }
    if let Some(level) = &cli.log_level {
        logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        logging.format = format.clone();
    }
    if let Some(output) = &cli.log_output {
        logging.output = output.clone();
    }
    if let Some(file) = &cli.log_file {
        logging.file = Some(file.clone());
    }

    config.validate()?;
    Ok(config)
}

/// CLI context: one engine plus the runtime that drives it.
pub struct CliContext {
    runtime: tokio::runtime::Runtime,
    engine: Arc<WorkspaceEngine>,
}

impl CliContext {
    /// Build the backend and engine, then load the tree.
    pub fn new(config: &CanopyConfig) -> Result<Self, ApiError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to start runtime: {}", e)))?;

        let backend = build_backend(config)?;
        let engine = Arc::new(
            WorkspaceEngine::new(backend, &config.workspace.root)?
                .with_reconcile(config.backend.reconcile),
        );
        runtime.block_on(engine.refresh())?;
        info!(
            root = %engine.root(),
            backend = ?engine.backend_kind(),
            nodes = engine.snapshot().len(),
            "Workspace loaded"
        );
        Ok(Self { runtime, engine })
    }

    pub fn engine(&self) -> &Arc<WorkspaceEngine> {
        &self.engine
    }

    /// Execute a command and return its printable output.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Script { file } => self.run_script(file),
            other => self.runtime.block_on(self.dispatch(other)),
        }
    }

    fn run_script(&self, file: &Path) -> Result<String, ApiError> {
        let text = std::fs::read_to_string(file).map_err(|e| {
            ApiError::InvalidInput(format!("Failed to read script {}: {}", file.display(), e))
        })?;

        let mut out = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line_no = idx + 1;
            let words = split_words(line).map_err(|e| at_line(line_no, e))?;
            let parsed = ScriptLine::try_parse_from(words)
                .map_err(|e| at_line(line_no, ApiError::InvalidInput(e.to_string())))?;
            if matches!(parsed.command, Commands::Script { .. }) {
                return Err(at_line(
                    line_no,
                    ApiError::InvalidInput("scripts cannot be nested".to_string()),
                ));
            }
            let output = self
                .runtime
                .block_on(self.dispatch(&parsed.command))
                .map_err(|e| at_line(line_no, e))?;
            out.push(format!("$ {}\n{}", line, output));
        }
        Ok(out.join("\n"))
    }

    async fn dispatch(&self, command: &Commands) -> Result<String, ApiError> {
        let engine = &self.engine;
        match command {
            Commands::Tree { format } => {
                let tree = engine.snapshot();
                if format == "json" {
                    to_json(&tree)
                } else {
                    Ok(format_tree_text(&tree, Some(&engine.tracker())))
                }
            }
            Commands::Cat { path } => Ok(engine.open_file(path).await?.content),
            Commands::Create { kind, base, name } => {
                let path = engine.create((*kind).into(), base, name).await?;
                Ok(format!("Created {}", path))
            }
            Commands::Rename { path, new_name } => {
                let new_path = engine.rename(path, new_name).await?;
                Ok(format!("Renamed {} -> {}", path, new_path))
            }
            Commands::Delete { path } => {
                engine.remove(path).await?;
                Ok(format!("Deleted {}", path))
            }
            Commands::Write { path, content } => {
                engine.save_file(path, content).await?;
                Ok(format!("Saved {}", path))
            }
            Commands::Status { format } => {
                let status = engine.git_status().await?;
                let staged = engine.staged();
                if format == "json" {
                    to_json(&json!({ "status": status, "staged": staged }))
                } else {
                    Ok(format_git_status_text(&status, &staged))
                }
            }
            Commands::Stage { path } => {
                engine.stage(path).await?;
                Ok(format!("Staged {}", path))
            }
            Commands::Unstage { path } => {
                engine.unstage(path).await?;
                Ok(format!("Unstaged {}", path))
            }
            Commands::Commit { message } => {
                let paths = engine.commit(&message.join(" ")).await?;
                Ok(format!("Committed {} file(s)", paths.len()))
            }
            Commands::Reset => {
                engine.reset().await?;
                Ok("Reset workspace to last commit".to_string())
            }
            Commands::Script { .. } => Err(ApiError::InvalidInput(
                "scripts cannot be nested".to_string(),
            )),
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::InvalidInput(format!("Failed to serialize output: {}", e)))
}

fn at_line(line: usize, err: ApiError) -> ApiError {
    let prefix = |msg: String| format!("line {}: {}", line, msg);
    match err {
        ApiError::NotFound(msg) => ApiError::NotFound(prefix(msg)),
        ApiError::AlreadyExists(msg) => ApiError::AlreadyExists(prefix(msg)),
        ApiError::InvalidInput(msg) => ApiError::InvalidInput(prefix(msg)),
        ApiError::BackendUnavailable(msg) => ApiError::BackendUnavailable(prefix(msg)),
        ApiError::Conflict(msg) => ApiError::Conflict(prefix(msg)),
        ApiError::ConfigError(msg) => ApiError::ConfigError(prefix(msg)),
        ApiError::FixtureError(msg) => ApiError::FixtureError(prefix(msg)),
    }
}

/// Split a script line into words. Single and double quotes group words;
/// backslash escapes the next character outside single quotes.
fn split_words(line: &str) -> Result<Vec<String>, ApiError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('\''), c) => current.push(c),
            (_, '\\') => match chars.next() {
                Some(escaped) => {
                    current.push(escaped);
                    in_word = true;
                }
                None => {
                    return Err(ApiError::InvalidInput(
                        "trailing backslash".to_string(),
                    ))
                }
            },
            (Some(_), c) => current.push(c),
            (None, '"') | (None, '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if quote.is_some() {
        return Err(ApiError::InvalidInput("unterminated quote".to_string()));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}
