//! Trainer capabilities invoked for stale sub-models.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::TrainerConfig;
use crate::error::{MbError, Result};
use crate::model::SubModel;
use crate::utils::ensure_dir;

/// Inputs for training the dialogue model.
#[derive(Debug, Clone, Copy)]
pub struct CoreJob<'a> {
    pub domain: &'a Path,
    pub config: Option<&'a Path>,
    pub stories: &'a Path,
    pub destination: &'a Path,
}

/// Inputs for training the language-understanding model.
#[derive(Debug, Clone, Copy)]
pub struct NluJob<'a> {
    pub config: Option<&'a Path>,
    pub nlu_data: &'a Path,
    pub destination: &'a Path,
}

/// Produces a trained sub-model directory at the job's destination.
///
/// Implementations must only write below `destination`; core and NLU jobs
/// may run at the same time.
pub trait Trainer: Send + Sync {
    fn train_core(&self, job: &CoreJob<'_>) -> Result<()>;
    fn train_nlu(&self, job: &NluJob<'_>) -> Result<()>;
}

/// Runs external training commands.
///
/// Each command is an argv template; `{domain}`, `{config}`, `{stories}`,
/// `{nlu}` and `{out}` are substituted per job. Child stdout is redirected
/// to stderr so machine-readable output stays clean.
#[derive(Debug, Clone, Default)]
pub struct CommandTrainer {
    core_command: Vec<String>,
    nlu_command: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandTrainer {
    #[must_use]
    pub fn new(core_command: Vec<String>, nlu_command: Vec<String>) -> Self {
        Self {
            core_command,
            nlu_command,
            timeout: None,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn from_config(config: &TrainerConfig) -> Self {
        let timeout =
            (config.timeout_seconds > 0).then(|| Duration::from_secs(config.timeout_seconds));
        Self::new(config.core_command.clone(), config.nlu_command.clone()).with_timeout(timeout)
    }

    fn run(
        &self,
        model: SubModel,
        template: &[String],
        vars: &[(&str, &Path)],
        destination: &Path,
    ) -> Result<()> {
        let failed = |reason: String| MbError::TrainingFailed { model, reason };

        let argv = render(template, vars);
        let Some((program, args)) = argv.split_first() else {
            return Err(MbError::Config(format!(
                "no {model} training command configured (trainer.{model}_command)"
            )));
        };

        ensure_dir(destination)?;
        info!(%model, command = ?argv, "starting trainer");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(std::io::stderr())
            .spawn()
            .map_err(|err| failed(format!("could not start {program}: {err}")))?;

        let start = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if let Some(timeout) = self.timeout {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(failed(format!("timed out after {}s", timeout.as_secs_f32())));
                }
            }
            std::thread::sleep(Duration::from_millis(100));
        };

        if !status.success() {
            return Err(failed(format!("{program} exited with {status}")));
        }
        debug!(%model, elapsed = ?start.elapsed(), "trainer finished");
        Ok(())
    }
}

impl Trainer for CommandTrainer {
    fn train_core(&self, job: &CoreJob<'_>) -> Result<()> {
        let config = job.config.unwrap_or_else(|| Path::new(""));
        let vars = [
            ("domain", job.domain),
            ("config", config),
            ("stories", job.stories),
            ("out", job.destination),
        ];
        self.run(SubModel::Core, &self.core_command, &vars, job.destination)
    }

    fn train_nlu(&self, job: &NluJob<'_>) -> Result<()> {
        let config = job.config.unwrap_or_else(|| Path::new(""));
        let vars = [
            ("config", config),
            ("nlu", job.nlu_data),
            ("out", job.destination),
        ];
        self.run(SubModel::Nlu, &self.nlu_command, &vars, job.destination)
    }
}

fn render(template: &[String], vars: &[(&str, &Path)]) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            vars.iter().fold(arg.clone(), |acc, (key, value)| {
                acc.replace(&format!("{{{key}}}"), &value.to_string_lossy())
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn render_substitutes_known_placeholders() {
        let argv = render(
            &[
                "train".to_string(),
                "--out={out}".to_string(),
                "{unknown}".to_string(),
            ],
            &[("out", Path::new("/tmp/x"))],
        );
        assert_eq!(argv, vec!["train", "--out=/tmp/x", "{unknown}"]);
    }

    #[test]
    fn missing_command_is_config_error() {
        let dir = tempdir().unwrap();
        let trainer = CommandTrainer::default();
        let err = trainer
            .train_nlu(&NluJob {
                config: None,
                nlu_data: dir.path(),
                destination: &dir.path().join("nlu"),
            })
            .unwrap_err();
        assert!(matches!(err, MbError::Config(_)));
    }

    #[cfg(unix)]
    #[test]
    fn command_writes_into_destination() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("nlu");
        let trainer = CommandTrainer::new(
            Vec::new(),
            vec![
                "sh".to_string(),
                "-c".to_string(),
                "cp \"$0\" \"$1/trained.md\"".to_string(),
                "{nlu}".to_string(),
                "{out}".to_string(),
            ],
        );
        let data = dir.path().join("nlu.md");
        fs::write(&data, "## intent:greet\n- hi").unwrap();

        trainer
            .train_nlu(&NluJob {
                config: None,
                nlu_data: &data,
                destination: &out,
            })
            .unwrap();
        assert!(out.join("trained.md").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_is_training_failed() {
        let dir = tempdir().unwrap();
        let trainer = CommandTrainer::new(vec!["false".to_string()], Vec::new());
        let err = trainer
            .train_core(&CoreJob {
                domain: dir.path(),
                config: None,
                stories: dir.path(),
                destination: &dir.path().join("core"),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            MbError::TrainingFailed {
                model: SubModel::Core,
                ..
            }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn slow_command_times_out() {
        let dir = tempdir().unwrap();
        let trainer = CommandTrainer::new(vec!["sleep".to_string(), "5".to_string()], Vec::new())
            .with_timeout(Some(Duration::from_millis(200)));
        let start = Instant::now();
        let err = trainer
            .train_core(&CoreJob {
                domain: dir.path(),
                config: None,
                stories: dir.path(),
                destination: &dir.path().join("core"),
            })
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(4));
    }
}
