//! Content-addressed cache for parsed ontologies and their ancestor closure.
//!
//! Entries are keyed by the SHA-256 of the ontology source bytes. A hit
//! returns the stored namespace, direct-parent and ancestor maps verbatim,
//! skipping both parsing and closure computation. A miss runs the injected
//! parser, computes the closure, and writes the entry before returning it.
//!
//! Storage sits behind [`CacheStore`], so tests and embedders can inject
//! their own backend. [`DirCacheStore`] keeps one JSON file per key.
//!
//! No store is locked. Two processes building the same key at once both
//! compute and both write; the last write wins. The content for a given key
//! is deterministic, so either write leaves a correct entry.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use ontora_core::hash::{sha256, sha256_file};
use ontora_core::{ContentAddressable, OntoraError, Result, TermMap, TermSet};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::closure::AncestorClosure;
use crate::graph::{OntologyGraph, OntologyMeta};

/// Current layout of a cache entry. Entries with another version are misses.
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the default cache directory.
pub const CACHE_DIR_ENV: &str = "ONTORA_CACHE_DIR";

// ── Stores ──────────────────────────────────────────────────────────────────

/// Byte-level key/value store backing the closure cache.
pub trait CacheStore {
    /// Stored bytes for `key`, or `None` on a miss.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Human-readable location of `key`, for logs.
    fn describe(&self, key: &str) -> String {
        key.to_string()
    }
}

/// One JSON file per key under `<root>/obo/`.
#[derive(Debug, Clone)]
pub struct DirCacheStore {
    root: PathBuf,
}

impl DirCacheStore {
    /// Store rooted at an explicit directory. The directory is created on
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store at the configured default location.
    ///
    /// Uses `$ONTORA_CACHE_DIR` if set and non-empty, otherwise the platform
    /// cache directory (`~/.cache/ontora` on Linux), otherwise
    /// `.ontora-cache` in the working directory.
    pub fn from_env() -> Self {
        Self::new(default_cache_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry file for `key`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join("obo").join(format!("{}.json", key))
    }
}

impl CacheStore for DirCacheStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.entry_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.entry_path(key);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        // Write-then-rename so readers never see a partial file.
        let tmp = path.with_extension(format!("json.{}.tmp", std::process::id()));
        let written = std::fs::write(&tmp, value).and_then(|()| std::fs::rename(&tmp, &path));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn describe(&self, key: &str) -> String {
        self.entry_path(key).display().to_string()
    }
}

/// In-process store; entries live as long as the store.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| OntoraError::Other("memory cache lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| OntoraError::Other("memory cache lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// Resolve the default cache directory from the process environment.
pub fn default_cache_dir() -> PathBuf {
    resolve_cache_dir(std::env::var_os(CACHE_DIR_ENV), dirs::cache_dir())
}

/// Pick the cache directory: a non-empty override, then `<platform>/ontora`,
/// then `.ontora-cache`.
fn resolve_cache_dir(override_dir: Option<OsString>, platform_dir: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = override_dir.filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    platform_dir
        .map(|d| d.join("ontora"))
        .unwrap_or_else(|| PathBuf::from(".ontora-cache"))
}

// ── Sources and entries ─────────────────────────────────────────────────────

/// An ontology source identified by the hash of its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OntologySource {
    label: String,
    sha256: String,
}

impl OntologySource {
    /// Hash a file on disk. The label is the path as given.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Ok(Self {
            label: path.display().to_string(),
            sha256: sha256_file(path)?,
        })
    }

    /// Hash in-memory source bytes.
    pub fn from_bytes(label: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            label: label.into(),
            sha256: sha256(bytes),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl ContentAddressable for OntologySource {
    fn content_hash(&self) -> String {
        self.sha256.clone()
    }
}

/// Serialized cache entry. Term-keyed sets are written as sorted lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub schema_version: u32,
    pub source_path: String,
    pub source_sha256: String,
    pub format_version: Option<String>,
    pub data_version: Option<String>,
    pub namespaces: TermMap<String>,
    pub parents: TermMap<TermSet>,
    pub ancestors: TermMap<TermSet>,
}

/// A parsed ontology with its closure, plus how it was obtained.
#[derive(Debug, Clone)]
pub struct CachedOntology {
    pub graph: OntologyGraph,
    pub closure: AncestorClosure,
    /// Whether the entry came from the store.
    pub cache_hit: bool,
    /// Cache key (source content hash).
    pub key: String,
    /// Where the entry lives in the store.
    pub location: String,
}

// ── Cache ───────────────────────────────────────────────────────────────────

/// Ancestor-closure cache over a [`CacheStore`].
#[derive(Debug, Clone)]
pub struct ClosureCache<S: CacheStore> {
    store: S,
}

impl ClosureCache<DirCacheStore> {
    /// Cache in the default directory (see [`DirCacheStore::from_env`]).
    pub fn from_env() -> Self {
        Self::new(DirCacheStore::from_env())
    }
}

impl<S: CacheStore> ClosureCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Return the cached graph and closure for `source`, building and
    /// storing them on a miss.
    ///
    /// `parse` is only called on a miss. Stored entries that fail to decode
    /// or carry another schema version are rebuilt and overwritten.
    ///
    /// # Errors
    ///
    /// Propagates store I/O errors, parser errors, and
    /// [`OntoraError::CyclicOntology`] from closure computation.
    pub fn load_or_build<F>(&self, source: &OntologySource, parse: F) -> Result<CachedOntology>
    where
        F: FnOnce() -> Result<OntologyGraph>,
    {
        let key = source.content_hash();
        let location = self.store.describe(&key);

        if let Some(bytes) = self.store.get(&key)? {
            match decode_entry(&bytes) {
                Ok(entry) if entry.schema_version == SCHEMA_VERSION && entry.source_sha256 == key => {
                    info!(key = %key, location = %location, "Ontology cache hit");
                    let meta = OntologyMeta {
                        format_version: entry.format_version,
                        data_version: entry.data_version,
                    };
                    return Ok(CachedOntology {
                        graph: OntologyGraph::from_parts(entry.namespaces, entry.parents, meta),
                        closure: AncestorClosure::from_map(entry.ancestors),
                        cache_hit: true,
                        key,
                        location,
                    });
                }
                Ok(entry) if entry.schema_version != SCHEMA_VERSION => warn!(
                    key = %key,
                    found = entry.schema_version,
                    expected = SCHEMA_VERSION,
                    "Ontology cache schema mismatch, rebuilding"
                ),
                Ok(entry) => warn!(
                    key = %key,
                    found = %entry.source_sha256,
                    "Ontology cache entry belongs to another source, rebuilding"
                ),
                Err(e) => warn!(key = %key, error = %e, "Unreadable ontology cache entry, rebuilding"),
            }
        }

        info!(key = %key, source = %source.label(), "Ontology cache miss");
        let graph = parse()?;
        let closure = AncestorClosure::compute(graph.parents())?;

        let (namespaces, parents, meta) = graph.into_parts();
        let entry = CacheEntry {
            schema_version: SCHEMA_VERSION,
            source_path: source.label().to_string(),
            source_sha256: key.clone(),
            format_version: meta.format_version.clone(),
            data_version: meta.data_version.clone(),
            namespaces,
            parents,
            ancestors: closure.into_map(),
        };
        self.store.put(&key, &encode_entry(&entry)?)?;

        let closure = AncestorClosure::from_map(entry.ancestors);
        Ok(CachedOntology {
            graph: OntologyGraph::from_parts(entry.namespaces, entry.parents, meta),
            closure,
            cache_hit: false,
            key,
            location,
        })
    }
}

fn encode_entry(entry: &CacheEntry) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(entry)
        .map_err(|e| OntoraError::Serialization(e.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn decode_entry(bytes: &[u8]) -> Result<CacheEntry> {
    serde_json::from_slice(bytes).map_err(|e| OntoraError::Serialization(e.to_string()))
}

// ── Tests ───────────────────────────────────────────────────────────────────
