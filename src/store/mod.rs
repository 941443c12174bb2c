//! Storage of previously built artifacts.
//!
//! An artifact is a zip archive holding `core/` and/or `nlu/` plus a
//! `fingerprint.json`. Archives live flat in one models directory and are
//! named `<prefix><YYYYmmdd-HHMMSS-mmm>.zip`, so name order follows build
//! order.

pub mod lock;

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tempfile::TempDir;
use tracing::debug;
use zip::ZipArchive;

use crate::error::{MbError, Result};
use crate::model::{FINGERPRINT_FILE_NAME, Fingerprint, SubModel};
use crate::utils::copy_dir_all;

pub use lock::BuildLock;

/// File extension of packaged artifacts.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// A packaged artifact on durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub path: PathBuf,
    pub name: String,
    pub modified: SystemTime,
}

impl ArtifactRef {
    /// Describe an archive file; `None` if it is not an artifact.
    pub fn from_path(path: &Path) -> Result<Option<Self>> {
        if !is_archive(path) {
            return Ok(None);
        }
        let modified = fs::metadata(path)?.modified()?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Some(Self {
            path: path.to_path_buf(),
            name,
            modified,
        }))
    }
}

/// An artifact extracted into a private temporary directory.
///
/// The directory is removed when this value is dropped.
#[derive(Debug)]
pub struct UnpackedArtifact {
    dir: TempDir,
    source: PathBuf,
}

impl UnpackedArtifact {
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Archive this directory was extracted from.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    #[must_use]
    pub fn sub_model_dir(&self, model: SubModel) -> PathBuf {
        self.path().join(model.dir_name())
    }

    pub fn fingerprint(&self) -> Result<Option<Fingerprint>> {
        read_fingerprint(self.path())
    }
}

/// The models directory holding historical artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory searched for artifacts; the parent of an explicit `.zip` root.
    #[must_use]
    pub fn search_dir(&self) -> &Path {
        if is_archive(&self.root) {
            return match self.root.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
        }
        &self.root
    }

    /// All artifacts, oldest first.
    ///
    /// Ordered by modification time, then by name so that archives written
    /// within the same filesystem tick still sort deterministically.
    pub fn list(&self) -> Result<Vec<ArtifactRef>> {
        let dir = self.search_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut artifacts = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if let Some(artifact) = ArtifactRef::from_path(&path)? {
                artifacts.push(artifact);
            }
        }
        artifacts.sort_by(|a, b| {
            a.modified
                .cmp(&b.modified)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(artifacts)
    }

    /// Most recently built artifact, if any.
    pub fn latest(&self) -> Result<Option<ArtifactRef>> {
        Ok(self.list()?.pop())
    }

    /// Path for a new artifact built at `now`.
    ///
    /// An explicit `.zip` root is used as-is.
    #[must_use]
    pub fn output_path(&self, prefix: &str, now: DateTime<Local>) -> PathBuf {
        if is_archive(&self.root) {
            return self.root.clone();
        }
        let stamp = now.format("%Y%m%d-%H%M%S-%3f");
        self.root.join(format!("{prefix}{stamp}.{ARCHIVE_EXTENSION}"))
    }

    /// Extract an artifact into a fresh temporary directory.
    pub fn unpack(&self, artifact: &ArtifactRef) -> Result<UnpackedArtifact> {
        unpack(&artifact.path)
    }
}

/// Extract the archive at `path` into a fresh temporary directory.
pub fn unpack(path: &Path) -> Result<UnpackedArtifact> {
    let corrupt = |err: &dyn std::fmt::Display| {
        MbError::CorruptArtifact(format!("{}: {err}", path.display()))
    };

    let file = File::open(path).map_err(|err| corrupt(&err))?;
    let mut archive = ZipArchive::new(file).map_err(|err| corrupt(&err))?;
    let dir = tempfile::Builder::new().prefix("mbuild-unpack-").tempdir()?;
    archive.extract(dir.path()).map_err(|err| corrupt(&err))?;

    let unpacked = UnpackedArtifact {
        dir,
        source: path.to_path_buf(),
    };
    if !SubModel::ALL
        .iter()
        .any(|model| unpacked.sub_model_dir(*model).is_dir())
    {
        return Err(corrupt(&"archive has neither core/ nor nlu/"));
    }

    debug!(artifact = %path.display(), dir = %unpacked.path().display(), "unpacked artifact");
    Ok(unpacked)
}

/// Read the fingerprint stored in an unpacked artifact.
///
/// `Ok(None)` when the artifact carries no fingerprint, which callers treat
/// as "everything is stale".
pub fn read_fingerprint(dir: &Path) -> Result<Option<Fingerprint>> {
    let path = dir.join(FINGERPRINT_FILE_NAME);
    if !path.is_file() {
        return Ok(None);
    }
    Fingerprint::read(&path).map(Some)
}

/// Copy a cached sub-model directory into a build directory.
///
/// Returns `Ok(false)` when `source` does not exist. The copy is staged next
/// to `target` and renamed into place, so `target` is either complete or
/// absent.
pub fn merge(source: &Path, target: &Path) -> Result<bool> {
    if !source.is_dir() {
        debug!(source = %source.display(), "no cached sub-model to merge");
        return Ok(false);
    }
    if target.exists() {
        return Err(MbError::ValidationFailed(format!(
            "merge target already exists: {}",
            target.display()
        )));
    }

    let parent = target.parent().ok_or_else(|| {
        MbError::ValidationFailed(format!("merge target has no parent: {}", target.display()))
    })?;
    fs::create_dir_all(parent)?;

    let staging = tempfile::Builder::new()
        .prefix(".merge-")
        .tempdir_in(parent)?;
    let staged = staging.path().join("model");
    copy_dir_all(source, &staged)?;
    fs::rename(&staged, target)?;

    debug!(source = %source.display(), target = %target.display(), "merged cached sub-model");
    Ok(true)
}

pub(crate) fn is_archive(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
        && !path.is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    fn write_archive(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, content) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                zip.start_file(*name, SimpleFileOptions::default()).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
        }
        zip.finish().unwrap();
    }

    #[test]
    fn latest_on_missing_root_is_none() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("models"));
        assert!(store.latest().unwrap().is_none());
    }

    #[test]
    fn latest_ignores_non_archives_and_breaks_ties_by_name() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("20240101-000000-000.zip");
        let b = dir.path().join("20240101-000000-001.zip");
        write_archive(&a, &[("core/", "")]);
        write_archive(&b, &[("core/", "")]);
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let same = SystemTime::now();
        let touch = |path: &Path| {
            File::options()
                .write(true)
                .open(path)
                .unwrap()
                .set_modified(same)
                .unwrap();
        };
        touch(&a);
        touch(&b);

        let store = ArtifactStore::new(dir.path());
        assert_eq!(store.list().unwrap().len(), 2);
        assert_eq!(store.latest().unwrap().unwrap().path, b);
    }

    #[test]
    fn output_path_is_sortable_and_prefixed() {
        let store = ArtifactStore::new("models");
        let early = Local.with_ymd_and_hms(2024, 5, 1, 9, 5, 3).unwrap();
        let late = Local.with_ymd_and_hms(2024, 11, 1, 10, 0, 0).unwrap();
        let a = store.output_path("nlu-", early);
        let b = store.output_path("nlu-", late);
        assert_eq!(a, PathBuf::from("models/nlu-20240501-090503-000.zip"));
        assert!(a < b);

        let explicit = ArtifactStore::new("out/model.zip");
        assert_eq!(
            explicit.output_path("", late),
            PathBuf::from("out/model.zip")
        );
    }

    #[test]
    fn unpack_reads_layout_and_fingerprint() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("m.zip");
        write_archive(
            &archive,
            &[("core/", ""), ("core/policy.json", "{}"), ("nlu/", "")],
        );
        let unpacked = unpack(&archive).unwrap();
        assert!(unpacked.sub_model_dir(SubModel::Core).join("policy.json").is_file());
        assert!(unpacked.fingerprint().unwrap().is_none());
    }

    #[test]
    fn unpack_rejects_garbage_and_wrong_layout() {
        let dir = tempdir().unwrap();
        let garbage = dir.path().join("garbage.zip");
        fs::write(&garbage, "definitely not a zip").unwrap();
        assert!(matches!(unpack(&garbage), Err(MbError::CorruptArtifact(_))));

        let wrong = dir.path().join("wrong.zip");
        write_archive(&wrong, &[("other/file.txt", "x")]);
        assert!(matches!(unpack(&wrong), Err(MbError::CorruptArtifact(_))));
    }

    #[test]
    fn merge_missing_source_returns_false() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("build/core");
        assert!(!merge(&dir.path().join("nope"), &target).unwrap());
        assert!(!target.exists());
    }

    #[test]
    fn merge_copies_and_leaves_no_staging() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("old/nlu");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("model.bin"), [1u8, 2, 3]).unwrap();
        let build = dir.path().join("build");
        let target = build.join("nlu");

        assert!(merge(&source, &target).unwrap());
        assert_eq!(fs::read(target.join("model.bin")).unwrap(), vec![1u8, 2, 3]);
        let leftovers: Vec<_> = fs::read_dir(&build).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn merge_refuses_to_clobber_target() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("old/core");
        fs::create_dir_all(&source).unwrap();
        let target = dir.path().join("build/core");
        fs::create_dir_all(&target).unwrap();
        assert!(merge(&source, &target).is_err());
    }
}
