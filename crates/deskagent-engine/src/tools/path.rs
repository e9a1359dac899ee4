//! Path security policy for filesystem tools.
//!
//! Every path a tool touches is resolved (relative paths land under the
//! user's home), canonicalized, and checked: it must not start with a
//! blocked system prefix and must fall inside one of the allowed roots
//! (home directory and process working directory by default). Write paths
//! additionally reject file names containing traversal or separator
//! characters, since the target may not exist yet for canonicalization.

use crate::error::{EngineError, Result};
use std::path::{Path, PathBuf};

/// System prefixes that are never accessible, regardless of allowed roots.
const BLOCKED_PREFIXES: [&str; 10] = [
    "C:\\Windows",
    "C:\\Program Files",
    "C:\\Program Files (x86)",
    "C:\\ProgramData",
    "/etc",
    "/usr/bin",
    "/usr/sbin",
    "/bin",
    "/sbin",
    "/system",
];

/// Characters a new file name may not contain.
const INVALID_NAME_PARTS: [&str; 6] = ["..", "/", "\\", "\0", "\n", "\r"];

/// Allowed-roots policy shared by all filesystem tools.
#[derive(Debug, Clone)]
pub struct PathPolicy {
    allowed_roots: Vec<PathBuf>,
    blocked_prefixes: Vec<String>,
    home: PathBuf,
}

impl PathPolicy {
    /// Policy allowing the user home and the process working directory.
    pub fn standard() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));
        let mut allowed_roots = vec![home.clone()];
        if let Ok(cwd) = std::env::current_dir() {
            allowed_roots.push(cwd);
        }
        Self {
            allowed_roots,
            blocked_prefixes: BLOCKED_PREFIXES.iter().map(|s| s.to_string()).collect(),
            home,
        }
    }

    /// Policy with explicit roots, used by tests.
    pub fn with_roots(allowed_roots: Vec<PathBuf>) -> Self {
        let home = allowed_roots
            .first()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("/"));
        Self {
            allowed_roots,
            blocked_prefixes: BLOCKED_PREFIXES.iter().map(|s| s.to_string()).collect(),
            home,
        }
    }

    /// The directory relative paths resolve under.
    pub fn home(&self) -> &Path {
        &self.home
    }

    fn resolve(&self, requested: &str) -> PathBuf {
        let path = PathBuf::from(requested);
        if path.is_absolute() {
            path
        } else {
            self.home.join(path)
        }
    }

    fn check_blocked(&self, path: &Path) -> Result<()> {
        let lowered = path.to_string_lossy().to_lowercase();
        for prefix in &self.blocked_prefixes {
            if lowered.starts_with(&prefix.to_lowercase()) {
                return Err(EngineError::Security(format!(
                    "access to system directory '{}' is prohibited",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    fn check_allowed(&self, path: &Path) -> Result<()> {
        let allowed = self.allowed_roots.iter().any(|root| {
            root.canonicalize()
                .map(|root| path.starts_with(&root))
                .unwrap_or(false)
        });
        if !allowed {
            return Err(EngineError::Security(format!(
                "access to '{}' is denied; operations are restricted to the allowed directories",
                path.display()
            )));
        }
        Ok(())
    }

    /// Validate an existing path for access.
    pub fn validate_path(&self, requested: &str) -> Result<PathBuf> {
        if requested.is_empty() {
            return Err(EngineError::Validation("path cannot be empty".to_string()));
        }

        let path = self.resolve(requested);
        let path = path.canonicalize().map_err(|_| {
            EngineError::NotFound(format!("the path '{}' does not exist", path.display()))
        })?;

        self.check_blocked(&path)?;
        self.check_allowed(&path)?;
        Ok(path)
    }

    /// Validate a path for reading a file.
    pub fn validate_read_path(&self, requested: &str) -> Result<PathBuf> {
        let path = self.validate_path(requested)?;
        if path.is_dir() {
            return Err(EngineError::Validation(format!(
                "the path '{}' is a directory, not a file",
                path.display()
            )));
        }
        Ok(path)
    }

    /// Validate a path for listing a directory.
    pub fn validate_directory_path(&self, requested: &str) -> Result<PathBuf> {
        let path = self.validate_path(requested)?;
        if !path.is_dir() {
            return Err(EngineError::Validation(format!(
                "the path '{}' is not a directory",
                path.display()
            )));
        }
        Ok(path)
    }

    /// Validate a path for writing; the target itself may not exist yet,
    /// but its parent directory must, and the new file name must be clean.
    pub fn validate_write_path(&self, requested: &str) -> Result<PathBuf> {
        if requested.is_empty() {
            return Err(EngineError::Validation("path cannot be empty".to_string()));
        }

        let path = self.resolve(requested);
        if path.exists() {
            return self.validate_path(requested);
        }

        let parent = path.parent().ok_or_else(|| {
            EngineError::Validation(format!("the path '{}' has no parent", path.display()))
        })?;
        let parent = self
            .validate_directory_path(&parent.to_string_lossy())
            .map_err(|_| {
                EngineError::Validation(format!(
                    "the parent directory '{}' does not exist or is not accessible",
                    parent.display()
                ))
            })?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        if file_name.is_empty()
            || INVALID_NAME_PARTS
                .iter()
                .any(|part| file_name.contains(part))
        {
            return Err(EngineError::Validation(
                "the file name contains invalid characters".to_string(),
            ));
        }

        let target = parent.join(&file_name);
        self.check_blocked(&target)?;
        Ok(target)
    }
}
