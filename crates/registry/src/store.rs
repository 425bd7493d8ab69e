use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One canonical supplier: the human-readable name variants a user might
/// type, and the normalized substrings used to match transaction text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierEntry {
    pub aliases: Vec<String>,
    pub patterns: Vec<String>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed registry document: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Duplicate,
    Rejected,
}

impl AddOutcome {
    pub fn is_added(&self) -> bool {
        matches!(self, AddOutcome::Added)
    }
}

impl fmt::Display for AddOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddOutcome::Added => write!(f, "supplier registered"),
            AddOutcome::Duplicate => write!(f, "supplier key already present"),
            AddOutcome::Rejected => write!(f, "name could not be reduced to a usable key"),
        }
    }
}

/// Seed vocabulary used when the on-disk store is missing or unreadable.
const DEFAULT_SUPPLIERS: &[(&str, &[&str], &[&str])] = &[
    (
        "bnp paribas fortis",
        &["BNP Paribas Fortis", "BNP Paribas", "Fortis"],
        &["bnpparibas", "fortis"],
    ),
    (
        "edenred",
        &["Edenred Belgium", "Edenred", "Eden Red"],
        &["edenred"],
    ),
    ("engie", &["Engie Electrabel", "Engie"], &["engie", "electrabel"]),
    ("kbc", &["KBC Bank", "KBC"], &["kbcbank", "kbc"]),
    ("proximus", &["Proximus", "Belgacom"], &["proximus", "belgacom"]),
    ("telenet", &["Telenet", "Telenet Group"], &["telenet"]),
];

/// Durable mapping of canonical key to aliases/patterns. Mutations rewrite
/// the whole document, and the BTreeMap keeps both the persisted document
/// and resolver iteration in sorted key order.
#[derive(Debug)]
pub struct SupplierRegistry {
    path: PathBuf,
    entries: BTreeMap<String, SupplierEntry>,
}

impl SupplierRegistry {
    /// Empty registry bound to `path`, without defaults. `load` is the
    /// normal entry point; this exists for bulk seeding and tests.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SupplierRegistry {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Read the store at `path`. A missing or malformed document is logged
    /// and replaced by the built-in default vocabulary; never an error.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match read_store(&path) {
            Ok(entries) => entries,
            Err(RegistryError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(
                    path = %path.display(),
                    "registry store not found, seeding built-in defaults"
                );
                default_entries()
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "unreadable registry store, falling back to built-in defaults"
                );
                default_entries()
            }
        };
        SupplierRegistry { path, entries }
    }

    /// Insert a new supplier under `key`. The display name becomes the first
    /// alias. Rejects an already-present key; persists on success.
    pub fn add(
        &mut self,
        key: &str,
        display_name: &str,
        aliases: Vec<String>,
        patterns: Vec<String>,
    ) -> AddOutcome {
        if self.entries.contains_key(key) {
            return AddOutcome::Duplicate;
        }

        let mut all_aliases = vec![display_name.to_string()];
        for alias in aliases {
            if !all_aliases.contains(&alias) {
                all_aliases.push(alias);
            }
        }

        self.entries.insert(
            key.to_string(),
            SupplierEntry { aliases: all_aliases, patterns },
        );
        self.persist();
        AddOutcome::Added
    }

    /// Delete the entry for `key`; persists when something was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        let found = self.entries.remove(key).is_some();
        if found {
            self.persist();
        }
        found
    }

    /// Read-only snapshot of the full mapping, in key order.
    pub fn all(&self) -> &BTreeMap<String, SupplierEntry> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Full-replacement upsert used by bulk import. Returns whether an
    /// existing entry was replaced.
    pub(crate) fn insert_entry(&mut self, key: &str, entry: SupplierEntry) -> bool {
        let replaced = self.entries.insert(key.to_string(), entry).is_some();
        self.persist();
        replaced
    }

    /// Rewrite the whole document. A write failure is logged and swallowed:
    /// the in-memory state stays authoritative until the next mutation.
    fn persist(&self) {
        if let Err(e) = self.write_store() {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "failed to persist registry store, in-memory state remains authoritative"
            );
        }
    }

    fn write_store(&self) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let document = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, document)?;
        Ok(())
    }
}

fn read_store(path: &Path) -> Result<BTreeMap<String, SupplierEntry>, RegistryError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn default_entries() -> BTreeMap<String, SupplierEntry> {
    DEFAULT_SUPPLIERS
        .iter()
        .map(|(key, aliases, patterns)| {
            (
                key.to_string(),
                SupplierEntry {
                    aliases: aliases.iter().map(|a| a.to_string()).collect(),
                    patterns: patterns.iter().map(|p| p.to_string()).collect(),
                },
            )
        })
        .collect()
}
