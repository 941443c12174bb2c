//! mbuild latest - Print the newest artifact

use std::path::PathBuf;

use clap::Args;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::output::{emit_robot, robot_ok};
use crate::error::{MbError, Result};
use crate::store::ArtifactStore;

#[derive(Args, Debug)]
pub struct LatestArgs {
    /// Models directory
    pub dir: Option<PathBuf>,
}

pub fn run(ctx: &AppContext, args: &LatestArgs) -> Result<()> {
    let dir = ctx.resolve(args.dir.as_ref().unwrap_or(&ctx.config.paths.models));
    let latest = ArtifactStore::new(&dir)
        .latest()?
        .ok_or_else(|| MbError::NotFound(format!("no artifacts in {}", dir.display())))?;

    if ctx.robot_mode {
        return emit_robot(&robot_ok(json!({ "path": latest.path, "name": latest.name })));
    }
    println!("{}", latest.path.display());
    Ok(())
}
