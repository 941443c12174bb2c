//! Helpers shared by the integration tests.

use std::fs;
use std::path::Path;

use mbuild::model::SubModel;
use mbuild::store;

/// Read one file of a sub-model out of a packaged artifact.
pub fn read_model_file(artifact: &Path, model: SubModel, name: &str) -> Vec<u8> {
    let unpacked = store::unpack(artifact).unwrap();
    fs::read(unpacked.sub_model_dir(model).join(name)).unwrap()
}

/// Whether an artifact contains the given sub-model.
pub fn has_sub_model(artifact: &Path, model: SubModel) -> bool {
    store::unpack(artifact).unwrap().sub_model_dir(model).is_dir()
}
