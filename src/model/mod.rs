//! Build fingerprints and cache staleness decisions.

pub mod compare;
pub mod fingerprint;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use compare::{StalenessDecision, core_changed, nlu_changed};
pub use fingerprint::{FINGERPRINT_FILE_NAME, Fingerprint, FingerprintEngine};

/// One of the two independently versioned halves of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SubModel {
    /// Dialogue model trained from stories and the domain.
    Core,
    /// Language-understanding model trained from NLU examples.
    Nlu,
}

impl SubModel {
    pub const ALL: [Self; 2] = [Self::Core, Self::Nlu];

    /// Directory name of this sub-model inside an artifact.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Nlu => "nlu",
        }
    }
}

impl fmt::Display for SubModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}
