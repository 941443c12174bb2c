use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::Result;

pub struct AppContext {
    pub project_root: PathBuf,
    pub config: Config,
    pub robot_mode: bool,
}

impl AppContext {
    pub fn from_cli(cli: &crate::cli::Cli) -> Result<Self> {
        let project_root = std::env::current_dir()?;
        let config = Config::load(cli.config_file.as_deref(), &project_root)?;

        Ok(Self {
            project_root,
            config,
            robot_mode: cli.robot,
        })
    }

    /// Resolve a path relative to the project root.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}
