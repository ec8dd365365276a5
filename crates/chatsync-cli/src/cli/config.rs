use std::path::{Path, PathBuf};

use anyhow::Result;
use chatsync_core::SyncConfig;
use tracing::debug;

/// `~/.config/chatsync/config.json` (or the platform equivalent)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chatsync").join("config.json"))
}

/// Priority: `--config` (must exist) > default location (if present) > defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<SyncConfig> {
    resolve_config_from(explicit, default_config_path().as_deref())
}

fn resolve_config_from(explicit: Option<&Path>, fallback: Option<&Path>) -> Result<SyncConfig> {
    if let Some(path) = explicit {
        return SyncConfig::load(path);
    }

    match fallback {
        Some(path) if path.exists() => {
            debug!(path = %path.display(), "loading default config");
            SyncConfig::load(path)
        }
        _ => Ok(SyncConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("explicit.json");
        let fallback = dir.path().join("fallback.json");
        fs::write(&explicit, r#"{"debounceMs": 50}"#).unwrap();
        fs::write(&fallback, r#"{"debounceMs": 900}"#).unwrap();

        let config = resolve_config_from(Some(&explicit), Some(&fallback)).unwrap();
        assert_eq!(config.debounce_ms, 50);
    }

    #[test]
    fn test_missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let err = resolve_config_from(Some(&missing), None).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_falls_back_to_default_location_then_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("config.json");

        let config = resolve_config_from(None, Some(&fallback)).unwrap();
        assert_eq!(config.debounce_ms, 500);

        fs::write(&fallback, r#"{"fetchTimeoutMs": 2000}"#).unwrap();
        let config = resolve_config_from(None, Some(&fallback)).unwrap();
        assert_eq!(config.fetch_timeout_ms, 2000);
        assert_eq!(config.debounce_ms, 500);
    }
}
