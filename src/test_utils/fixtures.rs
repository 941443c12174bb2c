use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::builder::BuildRequest;

pub const DOMAIN_YML: &str = "intents:\n  - greet\n  - goodbye\nactions:\n  - utter_greet\n  - utter_goodbye\n";

pub const CONFIG_YML: &str = "language: en\npipeline: supervised_embeddings\npolicies:\n  - name: MemoizationPolicy\n  - name: KerasPolicy\n";

pub const STORIES_MD: &str = "## happy path\n* greet\n  - utter_greet\n* goodbye\n  - utter_goodbye\n";

pub const NLU_MD: &str = "## intent:greet\n- hello\n- hi\n\n## intent:goodbye\n- bye\n";

/// A throwaway bot project: domain, training config, one story file and one
/// NLU file, plus an empty `models/` target.
pub struct ProjectFixture {
    pub temp_dir: TempDir,
    pub root: PathBuf,
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectFixture {
    #[must_use]
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        let fixture = Self { temp_dir, root };

        fixture.write("domain.yml", DOMAIN_YML);
        fixture.write("config.yml", CONFIG_YML);
        fixture.write("data/stories.md", STORIES_MD);
        fixture.write("data/nlu.md", NLU_MD);
        std::fs::create_dir_all(fixture.models()).expect("Failed to create models dir");
        fixture
    }

    /// Write (or overwrite) a file below the project root.
    pub fn write(&self, relative_path: &str, content: &str) -> PathBuf {
        let full_path = self.root.join(relative_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&full_path, content).expect("Failed to write file");
        full_path
    }

    pub fn remove(&self, relative_path: &str) {
        std::fs::remove_file(self.root.join(relative_path)).expect("Failed to remove file");
    }

    #[must_use]
    pub fn path(&self, relative_path: &str) -> PathBuf {
        self.root.join(relative_path)
    }

    #[must_use]
    pub fn models(&self) -> PathBuf {
        self.root.join("models")
    }

    /// Archives currently in `models/`, sorted by name.
    #[must_use]
    pub fn artifacts(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(self.models())
            .expect("Failed to read models dir")
            .map(|entry| entry.expect("Failed to read entry").path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "zip"))
            .collect();
        paths.sort();
        paths
    }

    /// Build request over the whole project with default options.
    #[must_use]
    pub fn request(&self) -> BuildRequest {
        BuildRequest {
            domain: Some(self.path("domain.yml")),
            config: Some(self.path("config.yml")),
            training_files: vec![self.path("data")],
            output: self.models(),
            ..BuildRequest::default()
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}
