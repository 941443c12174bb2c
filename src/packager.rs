//! Packaging a build directory into a versioned artifact archive.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::{MbError, Result};
use crate::model::{FINGERPRINT_FILE_NAME, Fingerprint, SubModel};
use crate::utils::ensure_dir;

/// Serializes a build directory plus its fingerprint into one archive.
pub trait Packager: Send + Sync {
    /// Write the archive to `output_path`, replacing any existing file.
    fn package(&self, build_dir: &Path, fingerprint: &Fingerprint, output_path: &Path)
    -> Result<PathBuf>;
}

/// Zip-based packager.
///
/// The archive is written to a temporary file next to `output_path` and
/// renamed over it, so readers never observe a half-written artifact.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipPackager;

impl Packager for ZipPackager {
    fn package(
        &self,
        build_dir: &Path,
        fingerprint: &Fingerprint,
        output_path: &Path,
    ) -> Result<PathBuf> {
        let present: Vec<SubModel> = SubModel::ALL
            .into_iter()
            .filter(|model| build_dir.join(model.dir_name()).is_dir())
            .collect();
        if present.is_empty() {
            return Err(MbError::IncompleteBuild(format!(
                "{} contains neither core/ nor nlu/",
                build_dir.display()
            )));
        }

        let parent = match output_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        ensure_dir(&parent)?;

        let staged = tempfile::Builder::new()
            .prefix(".package-")
            .suffix(".partial")
            .tempfile_in(&parent)?;
        write_archive(staged.as_file(), build_dir, &present, fingerprint)?;
        staged.as_file().sync_all()?;
        staged
            .persist(output_path)
            .map_err(|err| MbError::Io(err.error))?;

        info!(artifact = %output_path.display(), sub_models = ?present, "packaged artifact");
        Ok(output_path.to_path_buf())
    }
}

fn write_archive(
    file: &File,
    build_dir: &Path,
    present: &[SubModel],
    fingerprint: &Fingerprint,
) -> Result<()> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(file);

    for model in present {
        let root = build_dir.join(model.dir_name());
        let walker = WalkDir::new(&root).sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            let rel = entry
                .path()
                .strip_prefix(build_dir)
                .unwrap_or(entry.path());
            let name = archive_name(rel);
            if entry.file_type().is_dir() {
                zip.add_directory(format!("{name}/"), options)
                    .map_err(zip_error)?;
            } else if entry.file_type().is_file() {
                zip.start_file(name, options).map_err(zip_error)?;
                let mut source = File::open(entry.path())?;
                io::copy(&mut source, &mut zip)?;
            }
        }
    }

    zip.start_file(FINGERPRINT_FILE_NAME, options)
        .map_err(zip_error)?;
    serde_json::to_writer_pretty(&mut zip, fingerprint)?;
    zip.finish().map_err(zip_error)?;
    Ok(())
}

/// Archive entry names always use `/` separators.
fn archive_name(rel: &Path) -> String {
    rel.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn zip_error(err: zip::result::ZipError) -> MbError {
    MbError::Io(io::Error::other(err))
}
