use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MbError, Result};

/// Name of the project-level config file looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = "mbuild.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub trainer: TrainerConfig,
    #[serde(default)]
    pub fingerprint: FingerprintConfig,
}

impl Config {
    pub fn load(explicit_path: Option<&Path>, project_root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("MBUILD_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            match Self::load_patch(&path)? {
                Some(patch) => config.merge_patch(patch),
                None => {
                    return Err(MbError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_patch(&project_root.join(PROJECT_CONFIG_FILE))? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Parse a config from TOML text on top of the defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let patch: ConfigPatch =
            toml::from_str(raw).map_err(|err| MbError::Config(format!("parse config: {err}")))?;
        let mut config = Self::default();
        config.merge_patch(patch);
        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("mbuild/config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| MbError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| MbError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.paths {
            self.paths.merge(patch);
        }
        if let Some(patch) = patch.build {
            self.build.merge(patch);
        }
        if let Some(patch) = patch.trainer {
            self.trainer.merge(patch);
        }
        if let Some(patch) = patch.fingerprint {
            self.fingerprint.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_string("MBUILD_DOMAIN") {
            self.paths.domain = PathBuf::from(value);
        }
        if let Some(value) = env_string("MBUILD_TRAINING_CONFIG") {
            self.paths.config = PathBuf::from(value);
        }
        if let Some(values) = env_list("MBUILD_DATA") {
            self.paths.data = values.into_iter().map(PathBuf::from).collect();
        }
        if let Some(value) = env_string("MBUILD_MODELS") {
            self.paths.models = PathBuf::from(value);
        }

        if let Some(value) = env_bool("MBUILD_FORCE") {
            self.build.force = value;
        }
        if let Some(value) = env_bool("MBUILD_PARALLEL") {
            self.build.parallel = value;
        }
        if let Some(value) = env_string("MBUILD_PREFIX") {
            self.build.prefix = value;
        }
        if let Some(value) = env_u64("MBUILD_LOCK_TIMEOUT_SECONDS")? {
            self.build.lock_timeout_seconds = value;
        }

        if let Some(values) = env_list("MBUILD_CORE_COMMAND") {
            self.trainer.core_command = values;
        }
        if let Some(values) = env_list("MBUILD_NLU_COMMAND") {
            self.trainer.nlu_command = values;
        }
        if let Some(value) = env_u64("MBUILD_TRAINER_TIMEOUT_SECONDS")? {
            self.trainer.timeout_seconds = value;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub domain: PathBuf,
    pub config: PathBuf,
    pub data: Vec<PathBuf>,
    pub models: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            domain: PathBuf::from("domain.yml"),
            config: PathBuf::from("config.yml"),
            data: vec![PathBuf::from("data")],
            models: PathBuf::from("models"),
        }
    }
}

impl PathsConfig {
    fn merge(&mut self, patch: PathsPatch) {
        if let Some(value) = patch.domain {
            self.domain = value;
        }
        if let Some(value) = patch.config {
            self.config = value;
        }
        if let Some(values) = patch.data {
            self.data = values;
        }
        if let Some(value) = patch.models {
            self.models = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub lock_timeout_seconds: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            force: false,
            parallel: false,
            prefix: String::new(),
            lock_timeout_seconds: 30,
        }
    }
}

impl BuildConfig {
    fn merge(&mut self, patch: BuildPatch) {
        if let Some(value) = patch.force {
            self.force = value;
        }
        if let Some(value) = patch.parallel {
            self.parallel = value;
        }
        if let Some(value) = patch.prefix {
            self.prefix = value;
        }
        if let Some(value) = patch.lock_timeout_seconds {
            self.lock_timeout_seconds = value;
        }
    }
}

/// External trainer commands.
///
/// Argv templates; see [`crate::trainer::CommandTrainer`] for placeholders.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainerConfig {
    #[serde(default)]
    pub core_command: Vec<String>,
    #[serde(default)]
    pub nlu_command: Vec<String>,
    /// Zero disables the timeout.
    #[serde(default)]
    pub timeout_seconds: u64,
}

impl TrainerConfig {
    fn merge(&mut self, patch: TrainerPatch) {
        if let Some(values) = patch.core_command {
            self.core_command = values;
        }
        if let Some(values) = patch.nlu_command {
            self.nlu_command = values;
        }
        if let Some(value) = patch.timeout_seconds {
            self.timeout_seconds = value;
        }
    }
}

/// Top-level keys of the training config that belong to each sub-model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintConfig {
    pub nlu_config_keys: Vec<String>,
    pub core_config_keys: Vec<String>,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            nlu_config_keys: vec!["language".to_string(), "pipeline".to_string()],
            core_config_keys: vec!["policies".to_string()],
        }
    }
}

impl FingerprintConfig {
    fn merge(&mut self, patch: FingerprintPatch) {
        if let Some(values) = patch.nlu_config_keys {
            self.nlu_config_keys = values;
        }
        if let Some(values) = patch.core_config_keys {
            self.core_config_keys = values;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub paths: Option<PathsPatch>,
    pub build: Option<BuildPatch>,
    pub trainer: Option<TrainerPatch>,
    pub fingerprint: Option<FingerprintPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PathsPatch {
    pub domain: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub data: Option<Vec<PathBuf>>,
    pub models: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct BuildPatch {
    pub force: Option<bool>,
    pub parallel: Option<bool>,
    pub prefix: Option<String>,
    pub lock_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TrainerPatch {
    pub core_command: Option<Vec<String>>,
    pub nlu_command: Option<Vec<String>>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FingerprintPatch {
    pub nlu_config_keys: Option<Vec<String>>,
    pub core_config_keys: Option<Vec<String>>,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|value| {
        matches!(
            value.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value.parse::<u64>().map(Some).map_err(|err| {
            MbError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

/// Whitespace-separated list; commands are argv templates.
fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|value| {
        value
            .split_whitespace()
            .map(str::to_string)
            .collect()
    })
}
