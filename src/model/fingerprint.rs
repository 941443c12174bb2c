//! Content fingerprints for a set of training inputs.
//!
//! A fingerprint is a handful of SHA-256 digests, one per training input.
//! Only file *content* contributes; paths, modification times and discovery
//! order never do.
//!
//! Canonicalization for a path:
//! - a file contributes the digest of its bytes;
//! - a directory is walked recursively, following symlinks and skipping
//!   hidden entries (names starting with `.`), and every file contributes the
//!   digest of its bytes;
//! - the contributed digests are sorted and the final digest is taken over
//!   them joined with `\n`.
//!
//! A single file therefore hashes the same as a directory holding only that
//! file. Absent paths and directories without files yield `None`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::{DirEntry, WalkDir};

use crate::error::{MbError, Result};

/// Name of the serialized fingerprint at the root of an artifact.
pub const FINGERPRINT_FILE_NAME: &str = "fingerprint.json";

/// Identity of one build's inputs.
///
/// Equality only considers the hash fields; `created_at` and `version` are
/// advisory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    pub config_hash: Option<String>,
    pub domain_hash: Option<String>,
    pub nlu_data_hash: Option<String>,
    pub story_data_hash: Option<String>,
    pub nlu_config_hash: Option<String>,
    pub core_config_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Version of the tool that produced the build. Recorded, never compared.
    #[serde(default)]
    pub version: Option<String>,
}

impl Fingerprint {
    fn hash_fields(&self) -> [(&'static str, Option<&str>); 6] {
        [
            ("config_hash", self.config_hash.as_deref()),
            ("domain_hash", self.domain_hash.as_deref()),
            ("nlu_data_hash", self.nlu_data_hash.as_deref()),
            ("story_data_hash", self.story_data_hash.as_deref()),
            ("nlu_config_hash", self.nlu_config_hash.as_deref()),
            ("core_config_hash", self.core_config_hash.as_deref()),
        ]
    }

    /// Names of the hash fields that differ between two fingerprints.
    #[must_use]
    pub fn changed_fields(&self, other: &Self) -> Vec<&'static str> {
        self.hash_fields()
            .into_iter()
            .zip(other.hash_fields())
            .filter(|((_, a), (_, b))| a != b)
            .map(|((name, _), _)| name)
            .collect()
    }

    /// Load a fingerprint from a JSON file.
    pub fn read(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|err| {
            MbError::CorruptArtifact(format!("parse fingerprint {}: {err}", path.display()))
        })
    }

    /// Write the fingerprint as pretty JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.hash_fields() == other.hash_fields()
    }
}

impl Eq for Fingerprint {}

/// Computes fingerprints from training input paths.
#[derive(Debug, Clone)]
pub struct FingerprintEngine {
    nlu_config_keys: Vec<String>,
    core_config_keys: Vec<String>,
}

impl Default for FingerprintEngine {
    fn default() -> Self {
        Self {
            nlu_config_keys: vec!["language".to_string(), "pipeline".to_string()],
            core_config_keys: vec!["policies".to_string()],
        }
    }
}

impl FingerprintEngine {
    /// Engine slicing the shared config by the given top-level keys.
    #[must_use]
    pub const fn new(nlu_config_keys: Vec<String>, core_config_keys: Vec<String>) -> Self {
        Self {
            nlu_config_keys,
            core_config_keys,
        }
    }

    /// Fingerprint the given inputs. Missing inputs hash to `None`.
    pub fn compute(
        &self,
        config: Option<&Path>,
        domain: Option<&Path>,
        nlu_data: Option<&Path>,
        stories: Option<&Path>,
    ) -> Result<Fingerprint> {
        let config_hash = hash_optional(config)?;
        let (nlu_config_hash, core_config_hash) = match config {
            Some(path) if config_hash.is_some() => {
                self.config_slices(path, config_hash.as_deref())?
            }
            _ => (None, None),
        };

        Ok(Fingerprint {
            config_hash,
            domain_hash: hash_optional(domain)?,
            nlu_data_hash: hash_optional(nlu_data)?,
            story_data_hash: hash_optional(stories)?,
            nlu_config_hash,
            core_config_hash,
            created_at: Utc::now(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        })
    }

    /// Digest the NLU and core slices of a YAML config.
    ///
    /// Configs that are not a YAML mapping cannot be sliced; both slices then
    /// fall back to the digest of the whole file.
    fn config_slices(
        &self,
        path: &Path,
        whole: Option<&str>,
    ) -> Result<(Option<String>, Option<String>)> {
        let fallback = || (whole.map(str::to_string), whole.map(str::to_string));
        if !path.is_file() {
            return Ok(fallback());
        }

        let raw = read_input(path)?;
        let parsed = serde_yaml::from_slice::<serde_yaml::Value>(&raw);
        let Ok(serde_yaml::Value::Mapping(mapping)) = parsed else {
            tracing::debug!(path = %path.display(), "config is not a mapping; slices use whole-file hash");
            return Ok(fallback());
        };

        match (
            slice_hash(&mapping, &self.nlu_config_keys),
            slice_hash(&mapping, &self.core_config_keys),
        ) {
            (Ok(nlu), Ok(core)) => Ok((Some(nlu), Some(core))),
            (Err(err), _) | (_, Err(err)) => {
                tracing::debug!(path = %path.display(), error = %err, "config slice not representable as JSON");
                Ok(fallback())
            }
        }
    }
}

fn slice_hash(mapping: &serde_yaml::Mapping, keys: &[String]) -> Result<String> {
    let mut slice = BTreeMap::new();
    for key in keys {
        if let Some(value) = mapping.get(key.as_str()) {
            slice.insert(key.as_str(), serde_json::to_value(value)?);
        }
    }
    Ok(hash_bytes(&serde_json::to_vec(&slice)?))
}

fn hash_optional(path: Option<&Path>) -> Result<Option<String>> {
    path.map_or(Ok(None), hash_path)
}

/// Digest a file or directory per the module-level canonicalization.
pub fn hash_path(path: &Path) -> Result<Option<String>> {
    let mut digests = Vec::new();
    if path.is_file() {
        digests.push(hash_bytes(&read_input(path)?));
    } else if path.is_dir() {
        let walker = WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));
        for entry in walker {
            let entry = entry.map_err(|err| {
                MbError::InvalidInputs(format!("walk {}: {err}", path.display()))
            })?;
            if entry.file_type().is_file() {
                digests.push(hash_bytes(&read_input(entry.path())?));
            }
        }
    }

    if digests.is_empty() {
        return Ok(None);
    }
    digests.sort();
    Ok(Some(hash_bytes(digests.join("\n").as_bytes())))
}

pub(crate) fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    fs::read(path)
        .map_err(|err| MbError::InvalidInputs(format!("read {}: {err}", path.display())))
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    format!("sha256:{}", hex::encode(digest))
}
