//! Loading SQL text from files
//!
//! Relative paths are resolved against a base directory and normalized
//! lexically (the file does not need to exist). A path without an extension
//! gets `.sql` appended.

use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::CoreError;

/// Prefix marking a statement as a reference to a SQL file instead of SQL text
pub const FILE_REFERENCE_PREFIX: &str = "file://";

/// Loads SQL text for the engine's `from_file`
pub trait SqlFileLoader: Send + Sync {
    /// Absolute path the given (possibly relative) path refers to
    fn resolve_path(&self, path: &str) -> PathBuf;

    /// Load the SQL text of the given file
    fn from_file(&self, path: &str) -> Result<String, CoreError>;
}

/// Loader reading SQL files from disk relative to a base directory
#[derive(Debug, Clone)]
pub struct FsSqlFileLoader {
    base_dir: PathBuf,
}

impl FsSqlFileLoader {
    /// Create a loader resolving relative paths against `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Base directory for relative paths
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl Default for FsSqlFileLoader {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}

impl SqlFileLoader for FsSqlFileLoader {
    fn resolve_path(&self, path: &str) -> PathBuf {
        resolve_sql_path(&self.base_dir, path)
    }

    fn from_file(&self, path: &str) -> Result<String, CoreError> {
        let resolved = self.resolve_path(path);
        debug!("Loading SQL from {}", resolved.display());
        std::fs::read_to_string(&resolved)
            .map_err(|e| CoreError::FileLoad(format!("{}: {}", resolved.display(), e)))
    }
}

/// Resolve `path` against `base` to an absolute, normalized SQL file path
pub fn resolve_sql_path(base: &Path, path: &str) -> PathBuf {
    let mut joined = if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        let base = if base.is_absolute() {
            base.to_path_buf()
        } else {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("/"))
                .join(base)
        };
        base.join(path)
    };

    if joined.extension().is_none() {
        joined.set_extension("sql");
    }

    normalize_path(&joined)
}

/// Remove `.` and `..` components without touching the filesystem
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    normalized
}

/// Sentinel statement text referring to the given SQL file
pub fn file_reference(path: &Path) -> String {
    format!("{}{}", FILE_REFERENCE_PREFIX, path.display())
}

/// Path carried by a file reference, if `statement` is one
pub fn strip_file_reference(statement: &str) -> Option<&str> {
    statement.strip_prefix(FILE_REFERENCE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_resolve_sql_path_appends_extension_and_normalizes() {
        let base = Path::new("/srv/app/spec/../");
        assert_eq!(
            resolve_sql_path(base, "./spec/userById"),
            PathBuf::from("/srv/app/spec/userById.sql")
        );
        assert_eq!(
            resolve_sql_path(Path::new("/srv/app"), "queries/books.sql"),
            PathBuf::from("/srv/app/queries/books.sql")
        );
        assert_eq!(
            resolve_sql_path(Path::new("/srv/app"), "/etc/sql/report"),
            PathBuf::from("/etc/sql/report.sql")
        );
    }

    #[test]
    fn test_normalize_path_stops_at_root() {
        assert_eq!(normalize_path(Path::new("/a/../../b")), PathBuf::from("/b"));
        assert_eq!(normalize_path(Path::new("/a/./b/./c")), PathBuf::from("/a/b/c"));
    }

    #[test]
    fn test_file_reference_round_trip() {
        let reference = file_reference(Path::new("/srv/app/userById.sql"));
        assert_eq!(reference, "file:///srv/app/userById.sql");
        assert_eq!(
            strip_file_reference(&reference),
            Some("/srv/app/userById.sql")
        );
        assert_eq!(strip_file_reference("SELECT 1"), None);
    }

    #[test]
    fn test_fs_loader_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("userById.sql")).unwrap();
        writeln!(file, "SELECT * FROM users WHERE id = @id").unwrap();

        let loader = FsSqlFileLoader::new(dir.path());
        let sql = loader.from_file("./userById").unwrap();
        assert_eq!(sql.trim(), "SELECT * FROM users WHERE id = @id");

        assert!(matches!(
            loader.from_file("missing"),
            Err(CoreError::FileLoad(_))
        ));
    }
}
