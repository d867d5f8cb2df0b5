use crate::error::{AutonomyError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const AUTONOMY_DIR: &str = ".autonomy";

pub const CONFIG_FILE: &str = ".autonomy/config.yaml";
pub const AUDIT_LOG_FILE: &str = ".autonomy/audit.log";
pub const PINNED_FILE: &str = ".autonomy/pinned.json";
pub const FIELD_CACHE_FILE: &str = ".autonomy/field_cache.json";
pub const OVERRIDES_FILE: &str = ".autonomy/overrides.log";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn autonomy_dir(root: &Path) -> PathBuf {
    root.join(AUTONOMY_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn audit_log_path(root: &Path) -> PathBuf {
    root.join(AUDIT_LOG_FILE)
}

pub fn pinned_path(root: &Path) -> PathBuf {
    root.join(PINNED_FILE)
}

pub fn field_cache_path(root: &Path) -> PathBuf {
    root.join(FIELD_CACHE_FILE)
}

pub fn overrides_path(root: &Path) -> PathBuf {
    root.join(OVERRIDES_FILE)
}

/// Error unless `root/.autonomy/` exists.
pub fn require_initialized(root: &Path) -> Result<()> {
    if !autonomy_dir(root).is_dir() {
        return Err(AutonomyError::NotInitialized);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Project key validation
// ---------------------------------------------------------------------------

static PROJECT_KEY_RE: OnceLock<Regex> = OnceLock::new();

fn project_key_re() -> &'static Regex {
    PROJECT_KEY_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*/[A-Za-z0-9][A-Za-z0-9_.\-]*$").unwrap()
    })
}

/// Validate an `owner/repo` key used to partition local state.
pub fn validate_project_key(key: &str) -> Result<()> {
    if !project_key_re().is_match(key) {
        return Err(AutonomyError::InvalidProjectKey(key.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_project_keys() {
        for key in ["octocat/hello-world", "a/b", "my-org/repo.name", "o_1/r_2"] {
            validate_project_key(key).unwrap_or_else(|_| panic!("expected valid: {key}"));
        }
    }

    #[test]
    fn invalid_project_keys() {
        for key in ["", "norepo", "owner/", "/repo", "o/r/extra", "-dash/repo"] {
            assert!(validate_project_key(key).is_err(), "expected invalid: {key}");
        }
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/.autonomy/config.yaml")
        );
        assert_eq!(
            audit_log_path(root),
            PathBuf::from("/tmp/proj/.autonomy/audit.log")
        );
        assert_eq!(
            pinned_path(root),
            PathBuf::from("/tmp/proj/.autonomy/pinned.json")
        );
    }

    #[test]
    fn require_initialized_missing_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            require_initialized(dir.path()),
            Err(AutonomyError::NotInitialized)
        ));
        std::fs::create_dir_all(autonomy_dir(dir.path())).unwrap();
        require_initialized(dir.path()).unwrap();
    }
}
