//! In-process stand-ins for trainers.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{MbError, Result};
use crate::model::SubModel;
use crate::trainer::{CoreJob, NluJob, Trainer};

/// Trainer that writes a small model file and counts its calls.
///
/// Every call writes `model.txt` containing the call number and the
/// concatenated training files, so a retrained model never equals a reused one
/// byte for byte.
#[derive(Debug, Default)]
pub struct RecordingTrainer {
    core_calls: AtomicUsize,
    nlu_calls: AtomicUsize,
    fail: Option<SubModel>,
}

impl RecordingTrainer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every job for `model` after writing part of its output.
    #[must_use]
    pub fn failing(model: SubModel) -> Self {
        Self {
            fail: Some(model),
            ..Self::default()
        }
    }

    pub fn calls(&self, model: SubModel) -> usize {
        match model {
            SubModel::Core => self.core_calls.load(Ordering::SeqCst),
            SubModel::Nlu => self.nlu_calls.load(Ordering::SeqCst),
        }
    }

    pub fn total_calls(&self) -> usize {
        self.calls(SubModel::Core) + self.calls(SubModel::Nlu)
    }

    fn record(&self, model: SubModel, data: &Path, destination: &Path) -> Result<()> {
        let counter = match model {
            SubModel::Core => &self.core_calls,
            SubModel::Nlu => &self.nlu_calls,
        };
        let call = counter.fetch_add(1, Ordering::SeqCst) + 1;

        fs::create_dir_all(destination)?;
        let mut content = format!("{model} model, training run {call}\n");
        for file in sorted_files(data)? {
            content.push_str(&fs::read_to_string(file)?);
        }
        fs::write(destination.join("model.txt"), content)?;

        if self.fail == Some(model) {
            return Err(MbError::TrainingFailed {
                model,
                reason: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

impl Trainer for RecordingTrainer {
    fn train_core(&self, job: &CoreJob<'_>) -> Result<()> {
        self.record(SubModel::Core, job.stories, job.destination)
    }

    fn train_nlu(&self, job: &NluJob<'_>) -> Result<()> {
        self.record(SubModel::Nlu, job.nlu_data, job.destination)
    }
}

fn sorted_files(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    if dir.is_file() {
        return Ok(vec![dir.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
