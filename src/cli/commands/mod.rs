//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - run() function to execute the command

use clap::Subcommand;

pub mod inspect;
pub mod latest;
pub mod train;

use crate::app::AppContext;
use crate::error::Result;

pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Train(args) => train::run(ctx, args),
        Commands::Inspect(args) => inspect::run(ctx, args),
        Commands::Latest(args) => latest::run(ctx, args),
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a model, reusing unchanged parts of the latest build
    Train(train::TrainArgs),

    /// Show the fingerprint of one artifact or of every artifact in a directory
    Inspect(inspect::InspectArgs),

    /// Print the path of the latest artifact
    Latest(latest::LatestArgs),
}
