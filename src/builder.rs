//! Incremental build orchestration.
//!
//! A build fingerprints the current inputs, compares them with the newest
//! artifact in the output directory and retrains only the sub-models whose
//! inputs changed. Fresh sub-models are copied out of the previous artifact.
//! If nothing changed the previous artifact is returned as-is and nothing is
//! written.

use std::path::{Path, PathBuf};

use chrono::Local;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::data::TrainingData;
use crate::error::{MbError, Result};
use crate::model::{Fingerprint, FingerprintEngine, StalenessDecision, SubModel};
use crate::packager::Packager;
use crate::store::{self, ArtifactRef, ArtifactStore, UnpackedArtifact};
use crate::trainer::{CoreJob, NluJob, Trainer};

/// Inputs of one build.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    pub domain: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub training_files: Vec<PathBuf>,
    /// Models directory, or an explicit `.zip` output path.
    pub output: PathBuf,
    pub force: bool,
    /// Restrict the build to one sub-model.
    pub only: Option<SubModel>,
    /// File name prefix for the new artifact; defaults to `core-`/`nlu-` for
    /// single sub-model builds and empty otherwise.
    pub prefix: Option<String>,
}

impl BuildRequest {
    fn prefix(&self) -> String {
        self.prefix.clone().unwrap_or_else(|| {
            self.only
                .map(|model| format!("{model}-"))
                .unwrap_or_default()
        })
    }
}

/// Result of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Nothing changed; the previous artifact is still current.
    Reused { path: PathBuf },
    /// A new artifact was packaged.
    Built {
        path: PathBuf,
        trained: Vec<SubModel>,
        reused: Vec<SubModel>,
    },
}

impl BuildOutcome {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Reused { path } | Self::Built { path, .. } => path,
        }
    }

    #[must_use]
    pub fn trained(&self) -> &[SubModel] {
        match self {
            Self::Reused { .. } => &[],
            Self::Built { trained, .. } => trained,
        }
    }
}

/// The newest artifact, unpacked for reuse.
struct Previous {
    artifact: ArtifactRef,
    unpacked: UnpackedArtifact,
    fingerprint: Option<Fingerprint>,
}

/// Coordinates fingerprinting, cache reuse, training and packaging.
pub struct BuildOrchestrator<'a> {
    trainer: &'a dyn Trainer,
    packager: &'a dyn Packager,
    engine: FingerprintEngine,
    parallel: bool,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(trainer: &'a dyn Trainer, packager: &'a dyn Packager) -> Self {
        Self {
            trainer,
            packager,
            engine: FingerprintEngine::default(),
            parallel: false,
        }
    }

    #[must_use]
    pub fn with_engine(mut self, engine: FingerprintEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Train stale core and NLU models concurrently.
    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn build(&self, request: &BuildRequest) -> Result<BuildOutcome> {
        let mut data = TrainingData::resolve(&request.training_files)?;
        match request.only {
            Some(SubModel::Core) => data.drop_nlu(),
            Some(SubModel::Nlu) => data.drop_stories(),
            None => {}
        }
        if data.stories().is_none() && data.nlu().is_none() {
            let kind = request.only.map_or("story or NLU", |model| match model {
                SubModel::Core => "story",
                SubModel::Nlu => "NLU",
            });
            return Err(MbError::InvalidInputs(format!("no {kind} training data found")));
        }

        let domain = existing(request.domain.as_deref());
        let config = existing(request.config.as_deref());
        if data.stories().is_some() && domain.is_none() {
            return Err(MbError::InvalidInputs(
                "a domain file is required to train the dialogue model".to_string(),
            ));
        }

        let fingerprint = self
            .engine
            .compute(config, domain, data.nlu(), data.stories())?;

        let store = ArtifactStore::new(&request.output);
        let previous = if request.force {
            None
        } else {
            load_previous(&store)
        };
        let old = previous.as_ref().and_then(|prev| prev.fingerprint.as_ref());
        if let Some(old) = old {
            debug!(changed = ?old.changed_fields(&fingerprint), "compared with previous fingerprint");
        }

        let mut decision = StalenessDecision::evaluate(old, &fingerprint, request.force);
        debug!(
            core_stale = decision.core_stale,
            nlu_stale = decision.nlu_stale,
            "staleness decision"
        );
        let build_dir = tempfile::Builder::new().prefix("mbuild-build-").tempdir()?;

        // Sub-models without data are omitted; a stale omission still
        // yields a new artifact.
        let mut reused = Vec::new();
        for model in SubModel::ALL {
            if source(&data, model).is_none() || decision.is_stale(model) {
                continue;
            }
            if reuse(previous.as_ref(), model, &build_dir) {
                info!(%model, "{model} inputs did not change; reusing cached model");
                reused.push(model);
            } else {
                decision.mark_stale(model);
            }
        }

        let trained: Vec<SubModel> = SubModel::ALL
            .into_iter()
            .filter(|model| source(&data, *model).is_some() && decision.is_stale(*model))
            .collect();

        if !decision.any() {
            if let Some(prev) = previous {
                info!(artifact = %prev.artifact.path.display(), "nothing changed; previous model is current");
                return Ok(BuildOutcome::Reused {
                    path: prev.artifact.path,
                });
            }
        }

        let jobs = Jobs {
            domain,
            config,
            data: &data,
            build_dir: build_dir.path(),
        };
        self.train(&jobs, &trained)?;

        let output = store.output_path(&request.prefix(), Local::now());
        let path = self
            .packager
            .package(build_dir.path(), &fingerprint, &output)?;
        info!(artifact = %path.display(), trained = ?trained, reused = ?reused, "build finished");

        Ok(BuildOutcome::Built {
            path,
            trained,
            reused,
        })
    }

    fn train(&self, jobs: &Jobs<'_>, models: &[SubModel]) -> Result<()> {
        if self.parallel && models.len() == 2 {
            let (core, nlu) = rayon::join(
                || self.train_one(jobs, SubModel::Core),
                || self.train_one(jobs, SubModel::Nlu),
            );
            return core.and(nlu);
        }
        for model in models {
            self.train_one(jobs, *model)?;
        }
        Ok(())
    }

    fn train_one(&self, jobs: &Jobs<'_>, model: SubModel) -> Result<()> {
        let destination = jobs.build_dir.join(model.dir_name());
        let result = match model {
            SubModel::Core => match (jobs.domain, jobs.data.stories()) {
                (Some(domain), Some(stories)) => self.trainer.train_core(&CoreJob {
                    domain,
                    config: jobs.config,
                    stories,
                    destination: &destination,
                }),
                _ => Err(MbError::InvalidInputs(
                    "dialogue model needs a domain and stories".to_string(),
                )),
            },
            SubModel::Nlu => match jobs.data.nlu() {
                Some(nlu_data) => self.trainer.train_nlu(&NluJob {
                    config: jobs.config,
                    nlu_data,
                    destination: &destination,
                }),
                None => Err(MbError::InvalidInputs("no NLU training data".to_string())),
            },
        };

        match result {
            Ok(()) if has_entries(&destination) => {
                info!(%model, "trained {model} model");
                Ok(())
            }
            Ok(()) => Err(MbError::TrainingFailed {
                model,
                reason: format!("trainer wrote nothing to {}", destination.display()),
            }),
            Err(err @ MbError::TrainingFailed { .. }) => Err(err),
            Err(err) => Err(MbError::TrainingFailed {
                model,
                reason: err.to_string(),
            }),
        }
    }
}

struct Jobs<'a> {
    domain: Option<&'a Path>,
    config: Option<&'a Path>,
    data: &'a TrainingData,
    build_dir: &'a Path,
}

fn has_entries(dir: &Path) -> bool {
    std::fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_some())
}

fn existing(path: Option<&Path>) -> Option<&Path> {
    path.filter(|path| path.exists())
}

fn source(data: &TrainingData, model: SubModel) -> Option<&Path> {
    match model {
        SubModel::Core => data.stories(),
        SubModel::Nlu => data.nlu(),
    }
}

/// Copy a fresh sub-model out of the previous artifact.
///
/// A missing or uncopyable cached model means it has to be retrained.
fn reuse(previous: Option<&Previous>, model: SubModel, build_dir: &TempDir) -> bool {
    let Some(prev) = previous else {
        return false;
    };
    let target = build_dir.path().join(model.dir_name());
    match store::merge(&prev.unpacked.sub_model_dir(model), &target) {
        Ok(true) => true,
        Ok(false) => {
            info!(%model, artifact = %prev.artifact.path.display(), "cached {model} model missing; retraining");
            false
        }
        Err(err) => {
            warn!(%model, error = %err, "could not reuse cached {model} model; retraining");
            false
        }
    }
}

/// Locate and unpack the newest artifact.
///
/// An unreadable artifact is a cache miss, not an error.
fn load_previous(store: &ArtifactStore) -> Option<Previous> {
    let artifact = match store.latest() {
        Ok(Some(artifact)) => artifact,
        Ok(None) => {
            debug!(dir = %store.search_dir().display(), "no previous artifact");
            return None;
        }
        Err(err) => {
            warn!(dir = %store.search_dir().display(), error = %err, "could not list previous artifacts");
            return None;
        }
    };

    let unpacked = match store.unpack(&artifact) {
        Ok(unpacked) => unpacked,
        Err(err) => {
            warn!(artifact = %artifact.path.display(), error = %err, "previous artifact is unreadable; rebuilding everything");
            return None;
        }
    };

    let fingerprint = match unpacked.fingerprint() {
        Ok(fingerprint) => fingerprint,
        Err(err) => {
            warn!(artifact = %artifact.path.display(), error = %err, "previous fingerprint is unreadable; rebuilding everything");
            None
        }
    };

    Some(Previous {
        artifact,
        unpacked,
        fingerprint,
    })
}
