//! Incremental build cache for dialogue models.
//!
//! A model artifact bundles a dialogue ("core") model and a language
//! understanding ("NLU") model with a fingerprint of the inputs they were
//! trained from. [`builder::BuildOrchestrator`] compares fresh fingerprints
//! with the newest artifact and retrains only the stale sub-models.

pub mod app;
pub mod builder;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod packager;
pub mod store;
pub mod test_utils;
pub mod trainer;
pub mod utils;

pub use error::{MbError, Result};
