use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::MatchbookError;

/// Directory the service lives in when the process is started from a
/// checkout root instead of the service directory itself.
const SERVICE_DIR: &str = "server";

/// Resolves migration and seed files across an ordered list of candidate
/// root directories. The first successful read wins; a miss in every root
/// is fatal and carries the last underlying I/O error.
pub struct MigrationSource {
    roots: Vec<PathBuf>,
}

impl MigrationSource {
    /// Candidate roots for the two supported working directories:
    /// running from the service directory, or from the checkout root.
    pub fn from_working_dir() -> Self {
        Self {
            roots: vec![PathBuf::from("."), PathBuf::from(SERVICE_DIR)],
        }
    }

    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn read_migration(&self, filename: &str) -> Result<String, MatchbookError> {
        self.resolve(&Path::new("migrations").join(filename))
    }

    pub fn read_seed(&self) -> Result<String, MatchbookError> {
        self.resolve(Path::new("seed.sql"))
    }

    fn resolve(&self, rel: &Path) -> Result<String, MatchbookError> {
        let mut last_err: Option<io::Error> = None;
        for root in &self.roots {
            match fs::read_to_string(root.join(rel)) {
                Ok(text) => return Ok(text),
                Err(err) => last_err = Some(err),
            }
        }
        let last = last_err
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no candidate roots"));
        Err(MatchbookError::Error(format!(
            "read {}: {}",
            rel.display(),
            last
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn root_with_migration(name: &str, contents: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("migrations")).unwrap();
        fs::write(dir.path().join("migrations").join(name), contents).unwrap();
        dir
    }

    #[test]
    fn test_first_candidate_root_wins() {
        let first = root_with_migration("001_test.sql", "CREATE TABLE a (x);");
        let second = root_with_migration("001_test.sql", "CREATE TABLE b (y);");

        let source = MigrationSource::with_roots(vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);

        let text = source.read_migration("001_test.sql").unwrap();
        assert_eq!(text, "CREATE TABLE a (x);");
    }

    #[test]
    fn test_falls_back_to_later_roots() {
        let empty = TempDir::new().unwrap();
        let populated = root_with_migration("001_test.sql", "SELECT 1;");

        let source = MigrationSource::with_roots(vec![
            empty.path().to_path_buf(),
            populated.path().to_path_buf(),
        ]);

        assert_eq!(source.read_migration("001_test.sql").unwrap(), "SELECT 1;");
    }

    #[test]
    fn test_miss_in_every_root_is_an_error() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();

        let source =
            MigrationSource::with_roots(vec![a.path().to_path_buf(), b.path().to_path_buf()]);

        let err = source.read_migration("999_missing.sql").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("999_missing.sql"), "unexpected error: {msg}");
    }

    #[test]
    fn test_seed_resolves_from_root_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("seed.sql"), "INSERT INTO t VALUES (1);").unwrap();

        let source = MigrationSource::with_roots(vec![dir.path().to_path_buf()]);
        assert_eq!(
            source.read_seed().unwrap(),
            "INSERT INTO t VALUES (1);"
        );
    }
}
