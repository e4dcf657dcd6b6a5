//! Ground-truth snapshots stored as files

use crate::error::{AppError, AppResult};
use std::path::PathBuf;

/// Loads fixture text by file name
pub trait FixtureLoader: Send + Sync {
    fn load(&self, name: &str) -> AppResult<String>;
}

/// Loads fixtures from a single directory
#[derive(Debug, Clone)]
pub struct DirFixtureLoader {
    root: PathBuf,
}

impl DirFixtureLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// A fixture name must be one plain path component
pub fn validate_fixture_name(name: &str) -> AppResult<()> {
    let is_plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\');

    if is_plain {
        Ok(())
    } else {
        Err(AppError::InvalidFixtureName(name.to_string()))
    }
}

impl FixtureLoader for DirFixtureLoader {
    fn load(&self, name: &str) -> AppResult<String> {
        validate_fixture_name(name)?;

        let path = self.root.join(name);
        let content = std::fs::read_to_string(&path).map_err(|source| AppError::FixtureRead {
            path: path.display().to_string(),
            source,
        })?;

        tracing::debug!(
            fixture = %path.display(),
            bytes = content.len(),
            "Loaded fixture"
        );
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_loads_fixture_from_directory() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::write(dir.path().join("metrics_values.txt"), "mongo_a 1 100\n").unwrap();

        let loader = DirFixtureLoader::new(dir.path());
        let content = loader.load("metrics_values.txt").expect("should load");
        assert_eq!(content, "mongo_a 1 100\n");
    }

    #[test]
    fn test_missing_fixture_reports_path() {
        let dir = TempDir::new().expect("temp dir");
        let loader = DirFixtureLoader::new(dir.path());

        let err = loader.load("absent.txt").unwrap_err();
        match err {
            AppError::FixtureRead { path, .. } => assert!(path.ends_with("absent.txt")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_names_escaping_the_directory() {
        let loader = DirFixtureLoader::new("/tmp");
        for name in ["", ".", "..", "../etc/passwd", "a/b.txt", "a\\b.txt"] {
            assert!(
                matches!(loader.load(name), Err(AppError::InvalidFixtureName(_))),
                "name {name:?} should be rejected"
            );
        }
    }
}
