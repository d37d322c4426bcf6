// Scratch directories for tests

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Temporary directory removed when dropped
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn new(tag: &str) -> Self {
        let dir = tempfile::Builder::new()
            .prefix(&format!("gcp_workbench_{}_", tag))
            .tempdir()
            .expect("create scratch dir");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_dirs_are_distinct_and_removed() {
        let first = ScratchDir::new("same_tag");
        let second = ScratchDir::new("same_tag");
        assert_ne!(first.path(), second.path());
        assert!(first.path().is_dir());

        let nested = first.join("uploads/b.png");
        std::fs::create_dir_all(&nested).unwrap();
        let root = first.path().to_path_buf();
        drop(first);
        assert!(!root.exists());
        assert!(second.path().is_dir());
    }
}
