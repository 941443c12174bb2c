//! mbuild inspect - Show artifact fingerprints

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::output::{emit_robot, robot_ok};
use crate::data::InputSource;
use crate::error::Result;
use crate::model::{Fingerprint, SubModel};
use crate::store;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Artifact file, or a directory to inspect every artifact in it
    pub model: Option<PathBuf>,
}

pub fn run(ctx: &AppContext, args: &InspectArgs) -> Result<()> {
    let target = ctx.resolve(args.model.as_ref().unwrap_or(&ctx.config.paths.models));
    let source = InputSource::resolve(&target)?;

    let mut reports = Vec::new();
    for path in source.paths() {
        let unpacked = store::unpack(path)?;
        let sub_models: Vec<SubModel> = SubModel::ALL
            .into_iter()
            .filter(|model| unpacked.sub_model_dir(*model).is_dir())
            .collect();
        reports.push((unpacked.source().to_path_buf(), sub_models, unpacked.fingerprint()?));
    }

    if ctx.robot_mode {
        let data: Vec<_> = reports
            .iter()
            .map(|(path, sub_models, fingerprint)| {
                json!({
                    "path": path,
                    "sub_models": sub_models,
                    "fingerprint": fingerprint,
                })
            })
            .collect();
        return emit_robot(&robot_ok(data));
    }

    for (path, sub_models, fingerprint) in &reports {
        println!("{}", path.display().to_string().bold());
        let names: Vec<String> = sub_models.iter().map(ToString::to_string).collect();
        println!("  sub-models:       {}", names.join(", "));
        match fingerprint {
            Some(fingerprint) => print_fingerprint(fingerprint),
            None => println!("  {}", "no fingerprint (always rebuilt)".yellow()),
        }
    }
    Ok(())
}

fn print_fingerprint(fingerprint: &Fingerprint) {
    let show = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    println!("  created:          {}", fingerprint.created_at.to_rfc3339());
    println!("  config:           {}", show(&fingerprint.config_hash));
    println!("  core config:      {}", show(&fingerprint.core_config_hash));
    println!("  nlu config:       {}", show(&fingerprint.nlu_config_hash));
    println!("  domain:           {}", show(&fingerprint.domain_hash));
    println!("  stories:          {}", show(&fingerprint.story_data_hash));
    println!("  nlu data:         {}", show(&fingerprint.nlu_data_hash));
}
