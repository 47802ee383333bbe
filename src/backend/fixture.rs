//! Fixture data for the virtual backend.
//!
//! A fixture is a tree document plus a path -> content map. [`FixtureCache`]
//! parses it once and keeps it until [`FixtureCache::invalidate`] is called.

use crate::config::FixtureConfig;
use crate::error::ApiError;
use crate::tree::path::{canonicalize_path, is_descendant_or_self, parent_of, ROOT};
use crate::tree::{Node, Tree};
use crate::types::GitStatusSnapshot;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

const EMBEDDED_FIXTURE: &str = include_str!("demo_fixture.json");

/// Files larger than this are seeded with empty content when walking a directory.
const MAX_SEED_FILE_BYTES: u64 = 1024 * 1024;

fn default_root() -> String {
    ROOT.to_string()
}

/// On-disk fixture document (JSON or YAML).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureDocument {
    #[serde(default = "default_root")]
    pub root: String,
    #[serde(default)]
    pub tree: Vec<Node>,
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    #[serde(default)]
    pub git: GitStatusSnapshot,
}

/// Parsed, validated fixture.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub tree: Tree,
    pub files: BTreeMap<String, String>,
    pub git: GitStatusSnapshot,
}

impl Fixture {
    pub fn from_document(doc: FixtureDocument) -> Result<Self, ApiError> {
        let root = canonicalize_path(&doc.root)
            .map_err(|e| ApiError::FixtureError(format!("Invalid fixture root: {}", e)))?;
        let tree = Tree::from_nodes(root, doc.tree);
        tree.validate()
            .map_err(|e| ApiError::FixtureError(format!("Invalid fixture tree: {}", e)))?;

        let mut files = BTreeMap::new();
        for (path, content) in doc.files {
            match tree.find(&path) {
                Some(node) if node.is_file() => {
                    files.insert(path, content);
                }
                _ => warn!(path = %path, "Fixture content has no matching file node, skipping"),
            }
        }

        Ok(Self {
            tree,
            files,
            git: doc.git,
        })
    }
}

/// Where fixture data comes from.
#[derive(Debug, Clone)]
pub enum FixtureSource {
    /// The demo workspace compiled into the binary.
    Embedded,
    /// A `.json`, `.yaml`, or `.yml` fixture document.
    File(PathBuf),
    /// A local directory, walked recursively.
    Directory(PathBuf),
    /// An already-built document.
    Inline(Box<FixtureDocument>),
}

impl FixtureSource {
    /// Directory wins over file; neither means the embedded demo workspace.
    pub fn from_config(config: &FixtureConfig) -> Self {
        if let Some(dir) = &config.directory {
            FixtureSource::Directory(dir.clone())
        } else if let Some(path) = &config.path {
            FixtureSource::File(path.clone())
        } else {
            FixtureSource::Embedded
        }
    }

    fn load(&self) -> Result<Fixture, ApiError> {
        match self {
            FixtureSource::Embedded => Fixture::from_document(parse_json(EMBEDDED_FIXTURE)?),
            FixtureSource::File(path) => load_file(path),
            FixtureSource::Directory(dir) => load_directory(dir),
            FixtureSource::Inline(doc) => Fixture::from_document((**doc).clone()),
        }
    }
}

/// Process-lifetime fixture cache with an explicit invalidate.
pub struct FixtureCache {
    source: FixtureSource,
    cached: RwLock<Option<Arc<Fixture>>>,
    loads: AtomicUsize,
}

impl FixtureCache {
    pub fn new(source: FixtureSource) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn source(&self) -> &FixtureSource {
        &self.source
    }

    /// Return the cached fixture, parsing the source on first use.
    pub fn load(&self) -> Result<Arc<Fixture>, ApiError> {
        if let Some(fixture) = self.cached.read().as_ref() {
            return Ok(Arc::clone(fixture));
        }

        let mut cached = self.cached.write();
        if let Some(fixture) = cached.as_ref() {
            return Ok(Arc::clone(fixture));
        }
        let fixture = Arc::new(self.source.load()?);
        self.loads.fetch_add(1, Ordering::SeqCst);
        debug!(
            nodes = fixture.tree.len(),
            files = fixture.files.len(),
            "Loaded fixture"
        );
        *cached = Some(Arc::clone(&fixture));
        Ok(fixture)
    }

    /// Forget the cached fixture; the next `load` re-reads the source.
    pub fn invalidate(&self) {
        *self.cached.write() = None;
    }

    /// Number of times the source has been parsed.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

fn parse_json(raw: &str) -> Result<FixtureDocument, ApiError> {
    serde_json::from_str(raw)
        .map_err(|e| ApiError::FixtureError(format!("Failed to parse fixture JSON: {}", e)))
}

fn load_file(path: &Path) -> Result<Fixture, ApiError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ApiError::FixtureError(format!("Failed to read fixture {}: {}", path.display(), e))
    })?;
    let doc = match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&raw).map_err(|e| {
            ApiError::FixtureError(format!("Failed to parse fixture YAML: {}", e))
        })?,
        _ => parse_json(&raw)?,
    };
    Fixture::from_document(doc)
}

fn load_directory(dir: &Path) -> Result<Fixture, ApiError> {
    let base = dunce::canonicalize(dir).map_err(|e| {
        ApiError::FixtureError(format!(
            "Failed to resolve fixture directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let mut tree = Tree::new(ROOT);
    let mut files = BTreeMap::new();
    let walker = WalkDir::new(&base)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable fixture entry: {}", e);
                continue;
            }
        };
        let relative = match entry.path().strip_prefix(&base) {
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };
        let path = canonicalize_path(&relative)
            .map_err(|e| ApiError::FixtureError(e.to_string()))?;
        let parent = parent_of(&path);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            tree = tree
                .insert(&parent, Node::directory(path, Vec::new()))
                .map_err(|e| ApiError::FixtureError(e.to_string()))?;
        } else if file_type.is_file() {
            tree = tree
                .insert(&parent, Node::file(path.clone()))
                .map_err(|e| ApiError::FixtureError(e.to_string()))?;
            files.insert(path, read_seed_content(entry.path()));
        }
    }

    Ok(Fixture {
        tree,
        files,
        git: GitStatusSnapshot::default(),
    })
}

fn read_seed_content(path: &Path) -> String {
    let too_large = std::fs::metadata(path)
        .map(|m| m.len() > MAX_SEED_FILE_BYTES)
        .unwrap_or(true);
    if too_large {
        return String::new();
    }
    std::fs::read(path)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_default()
}

/// Content entries at or below `base`, in key order.
pub(crate) fn entries_under<'a>(
    files: &'a BTreeMap<String, String>,
    base: &'a str,
) -> impl Iterator<Item = &'a String> + 'a {
    files.keys().filter(move |k| is_descendant_or_self(k, base))
}
