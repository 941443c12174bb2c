//! mbuild train - Incrementally build a model artifact
//!
//! Fingerprints the domain, config and training data, compares them with the
//! newest artifact in the models directory and retrains only what changed.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::app::AppContext;
use crate::builder::{BuildOrchestrator, BuildOutcome, BuildRequest};
use crate::cli::output::{emit_robot, robot_ok};
use crate::error::Result;
use crate::model::{FingerprintEngine, SubModel};
use crate::packager::ZipPackager;
use crate::store::BuildLock;
use crate::trainer::CommandTrainer;

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Domain specification
    #[arg(long, short)]
    pub domain: Option<PathBuf>,

    /// Policy and NLU pipeline configuration
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Files or folders with stories and NLU data
    #[arg(long = "data", num_args = 1..)]
    pub data: Vec<PathBuf>,

    /// Models directory or explicit .zip output path
    #[arg(long, short)]
    pub out: Option<PathBuf>,

    /// Retrain everything even if nothing changed
    #[arg(long)]
    pub force: bool,

    /// Prefix for the artifact file name
    #[arg(long)]
    pub prefix: Option<String>,

    /// Only build one sub-model
    #[arg(long, value_enum)]
    pub only: Option<SubModel>,

    /// Train core and NLU concurrently
    #[arg(long)]
    pub parallel: bool,
}

pub fn run(ctx: &AppContext, args: &TrainArgs) -> Result<()> {
    let paths = &ctx.config.paths;
    let request = BuildRequest {
        domain: Some(ctx.resolve(args.domain.as_ref().unwrap_or(&paths.domain))),
        config: Some(ctx.resolve(args.config.as_ref().unwrap_or(&paths.config))),
        training_files: if args.data.is_empty() {
            paths.data.iter().map(|path| ctx.resolve(path)).collect()
        } else {
            args.data.iter().map(|path| ctx.resolve(path)).collect()
        },
        output: ctx.resolve(args.out.as_ref().unwrap_or(&paths.models)),
        force: args.force || ctx.config.build.force,
        only: args.only,
        prefix: args
            .prefix
            .clone()
            .or_else(|| Some(ctx.config.build.prefix.clone()).filter(|p| !p.is_empty())),
    };

    let lock_dir = crate::store::ArtifactStore::new(&request.output)
        .search_dir()
        .to_path_buf();
    let _lock = BuildLock::acquire(
        &lock_dir,
        Duration::from_secs(ctx.config.build.lock_timeout_seconds),
    )?;

    let trainer = CommandTrainer::from_config(&ctx.config.trainer);
    let packager = ZipPackager;
    let fingerprint = &ctx.config.fingerprint;
    let orchestrator = BuildOrchestrator::new(&trainer, &packager)
        .with_engine(FingerprintEngine::new(
            fingerprint.nlu_config_keys.clone(),
            fingerprint.core_config_keys.clone(),
        ))
        .with_parallel(args.parallel || ctx.config.build.parallel);

    let outcome = orchestrator.build(&request)?;

    if ctx.robot_mode {
        return emit_robot(&robot_ok(outcome_json(&outcome)));
    }

    match &outcome {
        BuildOutcome::Reused { path } => {
            println!(
                "{} Nothing changed. You can use the old model: {}",
                "✓".green(),
                path.display()
            );
        }
        BuildOutcome::Built {
            path,
            trained,
            reused,
        } => {
            for model in reused {
                println!("  {} {model} model unchanged, reused", "=".dimmed());
            }
            for model in trained {
                println!("  {} {model} model trained", "+".green());
            }
            println!("{} Model saved to {}", "✓".green().bold(), path.display());
        }
    }
    Ok(())
}

fn outcome_json(outcome: &BuildOutcome) -> serde_json::Value {
    match outcome {
        BuildOutcome::Reused { path } => json!({
            "path": path,
            "changed": false,
            "trained": [],
            "reused": [],
        }),
        BuildOutcome::Built {
            path,
            trained,
            reused,
        } => json!({
            "path": path,
            "changed": true,
            "trained": trained,
            "reused": reused,
        }),
    }
}
