//! Resolving user-supplied paths into training inputs.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{MbError, Result};
use crate::model::fingerprint::is_hidden;
use crate::store;

const NLU_MARKDOWN_HEADERS: [&str; 4] = ["## intent:", "## synonym:", "## regex:", "## lookup:"];

/// Kind of training data held by a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Stories,
    Nlu,
}

/// Classify a training file by extension and content.
///
/// `.json` files are NLU data. Markdown files are NLU data when they declare
/// an intent, synonym, regex or lookup section, and stories when they have any
/// other `## ` section. Everything else is ignored.
pub fn classify(path: &Path) -> Result<Option<DataKind>> {
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase());
    match ext.as_deref() {
        Some("json") => Ok(Some(DataKind::Nlu)),
        Some("md" | "markdown") => {
            let content = fs::read_to_string(path).map_err(|err| {
                MbError::InvalidInputs(format!("read {}: {err}", path.display()))
            })?;
            let headers = content.lines().map(str::trim_start);
            let mut has_section = false;
            for line in headers {
                if NLU_MARKDOWN_HEADERS.iter().any(|h| line.starts_with(h)) {
                    return Ok(Some(DataKind::Nlu));
                }
                has_section |= line.starts_with("## ");
            }
            Ok(has_section.then_some(DataKind::Stories))
        }
        _ => Ok(None),
    }
}

/// Training data split into a story directory and an NLU directory.
///
/// Classified files are copied into private staging directories that live as
/// long as this value. Either side may be empty.
#[derive(Debug)]
pub struct TrainingData {
    stories: Option<TempDir>,
    nlu: Option<TempDir>,
}

impl TrainingData {
    /// Split the given files and directories by data kind.
    ///
    /// Fails with `InvalidInputs` if a path is missing or if no file of
    /// either kind is found.
    pub fn resolve(paths: &[PathBuf]) -> Result<Self> {
        let mut stories = Vec::new();
        let mut nlu = Vec::new();

        for path in paths {
            if !path.exists() {
                return Err(MbError::InvalidInputs(format!(
                    "training data path does not exist: {}",
                    path.display()
                )));
            }
            for file in collect_files(path)? {
                match classify(&file)? {
                    Some(DataKind::Stories) => stories.push(file),
                    Some(DataKind::Nlu) => nlu.push(file),
                    None => debug!(file = %file.display(), "ignoring unrecognised training file"),
                }
            }
        }

        if stories.is_empty() && nlu.is_empty() {
            return Err(MbError::InvalidInputs(
                "no story or NLU training data found".to_string(),
            ));
        }

        debug!(stories = stories.len(), nlu = nlu.len(), "resolved training data");
        Ok(Self {
            stories: stage("mbuild-stories-", &stories)?,
            nlu: stage("mbuild-nlu-", &nlu)?,
        })
    }

    /// Directory of story files, if any were found.
    #[must_use]
    pub fn stories(&self) -> Option<&Path> {
        self.stories.as_ref().map(TempDir::path)
    }

    /// Directory of NLU files, if any were found.
    #[must_use]
    pub fn nlu(&self) -> Option<&Path> {
        self.nlu.as_ref().map(TempDir::path)
    }

    /// Forget the story side, e.g. for an NLU-only build.
    pub fn drop_stories(&mut self) {
        self.stories = None;
    }

    /// Forget the NLU side, e.g. for a core-only build.
    pub fn drop_nlu(&mut self) {
        self.nlu = None;
    }
}

fn collect_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    let walker = WalkDir::new(path)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));
    for entry in walker {
        let entry = entry
            .map_err(|err| MbError::InvalidInputs(format!("walk {}: {err}", path.display())))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Copy files into a fresh directory; index prefixes keep same-named files
/// from different folders apart.
fn stage(prefix: &str, files: &[PathBuf]) -> Result<Option<TempDir>> {
    if files.is_empty() {
        return Ok(None);
    }
    let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
    for (index, file) in files.iter().enumerate() {
        let name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        fs::copy(file, dir.path().join(format!("{index:04}_{name}")))?;
    }
    Ok(Some(dir))
}

/// A model argument resolved once at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// One packaged artifact.
    SingleModel(PathBuf),
    /// Every artifact in a directory, oldest first.
    ComparisonSet(Vec<PathBuf>),
}

impl InputSource {
    pub fn resolve(path: &Path) -> Result<Self> {
        if path.is_file() {
            return Ok(Self::SingleModel(path.to_path_buf()));
        }
        if path.is_dir() {
            let artifacts = store::ArtifactStore::new(path).list()?;
            if artifacts.is_empty() {
                return Err(MbError::NotFound(format!(
                    "no artifacts in {}",
                    path.display()
                )));
            }
            return Ok(Self::ComparisonSet(
                artifacts.into_iter().map(|artifact| artifact.path).collect(),
            ));
        }
        Err(MbError::NotFound(path.display().to_string()))
    }

    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        match self {
            Self::SingleModel(path) => std::slice::from_ref(path),
            Self::ComparisonSet(paths) => paths,
        }
    }
}
