//! Application path management for development, portable and installed modes.
//!
//! - **Dev mode** (debug builds): `config.yaml` in the current working
//!   directory means everything lives next to it.
//! - **Portable mode**: a `.portable` marker next to the executable keeps
//!   config, settings and logs beside the binary.
//! - **Installed mode** (default): data lives under `dirs::data_dir()`,
//!   e.g. `~/.local/share/speaker-core` for the service user.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name used under the platform data directory
const APP_NAME: &str = "speaker-core";

/// File name of the persisted settings document
const SETTINGS_FILE: &str = "settings.json";

/// Application paths for config, persisted settings and logs.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Path to the YAML configuration file
    pub config: PathBuf,
    /// Path to the persisted settings document
    pub settings: PathBuf,
    /// Path to the logs directory
    pub logs_dir: PathBuf,
    /// Whether everything lives next to the executable (or cwd in dev)
    pub is_portable: bool,
}

impl AppPaths {
    /// Detect the appropriate paths based on environment.
    ///
    /// Called before logging is initialized, so diagnostics go to stderr.
    pub fn detect() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));

        #[cfg(debug_assertions)]
        {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            if cwd.join("config.yaml").exists() {
                eprintln!("[paths] Running in DEV mode (config.yaml found in {})", cwd.display());
                return Self::rooted_at(&cwd, true);
            }
        }

        if exe_dir.join(".portable").exists() {
            #[cfg(debug_assertions)]
            eprintln!("[paths] Running in PORTABLE mode (.portable marker found)");
            return Self::rooted_at(&exe_dir, true);
        }

        let app_data = dirs::data_dir()
            .unwrap_or_else(|| {
                eprintln!("[paths] WARNING: no data directory, falling back to exe dir");
                exe_dir.clone()
            })
            .join(APP_NAME);

        #[cfg(debug_assertions)]
        eprintln!("[paths] Running in INSTALLED mode (data dir: {})", app_data.display());

        Self::rooted_at(&app_data, false)
    }

    /// Lay out every path under one base directory
    pub fn rooted_at(base: &Path, is_portable: bool) -> Self {
        Self {
            config: base.join("config.yaml"),
            settings: base.join(SETTINGS_FILE),
            logs_dir: base.join("logs"),
            is_portable,
        }
    }

    /// Base directory (for displaying in logs)
    pub fn base_dir(&self) -> PathBuf {
        self.config
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Ensure every directory the process writes into exists.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        for dir in [Some(self.logs_dir.as_path()), self.settings.parent()]
            .into_iter()
            .flatten()
        {
            if !dir.exists() {
                debug!("Creating directory: {}", dir.display());
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create directory {}", dir.display()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rooted_layout() {
        let paths = AppPaths::rooted_at(Path::new("/tmp/speaker"), true);
        assert!(paths.is_portable);
        assert_eq!(paths.config, PathBuf::from("/tmp/speaker/config.yaml"));
        assert_eq!(paths.settings, PathBuf::from("/tmp/speaker/settings.json"));
        assert_eq!(paths.base_dir(), PathBuf::from("/tmp/speaker"));
    }

    #[test]
    fn test_ensure_directories_creates_logs() {
        let temp = tempfile::tempdir().unwrap();
        let paths = AppPaths::rooted_at(&temp.path().join("nested"), false);
        paths.ensure_directories().unwrap();
        assert!(paths.logs_dir.is_dir());
        assert!(paths.settings.parent().unwrap().is_dir());
    }
}
