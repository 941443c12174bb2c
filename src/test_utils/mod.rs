//! Shared test utilities for mbuild.

pub mod fakes;
pub mod fixtures;

pub use fakes::RecordingTrainer;
pub use fixtures::ProjectFixture;
