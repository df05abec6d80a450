// src/core/settings.rs

//! # Settings
//!
//! Options consulted by reconciliation, resolution and storage. Read from TOML, first from
//! `<solution>.ArgsCfg.toml`, then from `~/.config/argtree/settings.toml`, else defaults.

use crate::constants::{DEFAULT_DEBOUNCE_MS, DEFAULT_HISTORY_LIMIT};
use crate::core::paths;
use crate::core::resolver::ManageFlags;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Failures while loading or saving settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Could not read settings file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed settings file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Which projects get real active-item computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InactiveDisableMode {
    /// Every parameter is reported active.
    Disabled,
    /// Only startup projects are resolved; others report everything active.
    #[default]
    InStartupProject,
    /// Every project is resolved.
    InAllProjects,
}

/// Which C++ projects may have their build configuration scanned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CppScanHandling {
    /// Scan every C++ project.
    #[default]
    All,
    /// Scan only C++ projects that are startup projects.
    OnlyStartup,
    /// Never scan C++ projects.
    None,
}

/// User and per-solution settings. Unset keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Read and write JSON files. Off means only the legacy store is used.
    pub vcs_support_enabled: bool,
    /// One `<Solution>.args.json` instead of a file per project.
    pub use_solution_dir: bool,
    /// Write project files below `json_root_path` instead of next to the projects.
    pub use_custom_json_root: bool,
    /// May contain `~` and environment variables; relative paths start at the solution.
    pub json_root_path: Option<String>,
    /// Compose command-line arguments.
    pub manage_command_line_args: bool,
    /// Compose environment variables.
    pub manage_environment_vars: bool,
    /// Compose the working directory.
    pub manage_working_directories: bool,
    /// Compose the launch application.
    pub manage_launch_application: bool,
    /// Which projects get real active-item computation.
    pub disable_inactive_items: InactiveDisableMode,
    /// Delete a file once its project has no items left.
    pub delete_empty_files_automatically: bool,
    /// Delete the files of the storage mode that is not in use.
    pub delete_unnecessary_files_automatically: bool,
    /// Which C++ projects may be scanned for default items.
    pub cpp_project_scan_handling: CppScanHandling,
    /// Delay before a refresh runs after the last change.
    pub debounce_ms: u64,
    /// Undo states kept per workspace.
    pub history_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vcs_support_enabled: true,
            use_solution_dir: false,
            use_custom_json_root: false,
            json_root_path: None,
            manage_command_line_args: true,
            manage_environment_vars: true,
            manage_working_directories: true,
            manage_launch_application: true,
            disable_inactive_items: InactiveDisableMode::default(),
            delete_empty_files_automatically: true,
            delete_unnecessary_files_automatically: true,
            cpp_project_scan_handling: CppScanHandling::default(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl Settings {
    /// The per-type management switches.
    pub fn manage_flags(&self) -> ManageFlags {
        ManageFlags {
            command_line_args: self.manage_command_line_args,
            environment_vars: self.manage_environment_vars,
            working_directories: self.manage_working_directories,
            launch_application: self.manage_launch_application,
        }
    }

    /// `debounce_ms` as a duration.
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// The directory custom JSON files go to, when enabled and set.
    pub fn json_root(&self, solution_dir: &Path) -> Option<PathBuf> {
        if !self.use_custom_json_root {
            return None;
        }
        let template = self.json_root_path.as_deref().filter(|s| !s.trim().is_empty())?;
        match paths::expand_path(template, solution_dir) {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("{}. Falling back to the project directory.", e);
                None
            }
        }
    }

    /// Reads one settings file. A missing file is `Ok(None)`.
    pub fn load_file(path: &Path) -> Result<Option<Self>, SettingsError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        toml::from_str(&content)
            .map(Some)
            .map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Layered lookup: solution file, then user file, then defaults. Failures are warnings.
    pub fn load(solution: Option<&Path>) -> Self {
        let mut candidates = Vec::new();
        if let Some(solution) = solution {
            candidates.push(paths::solution_settings_path(solution));
        }
        match paths::user_settings_path() {
            Ok(path) => candidates.push(path),
            Err(e) => log::debug!("No user settings location: {}", e),
        }

        for path in candidates {
            match Self::load_file(&path) {
                Ok(Some(settings)) => {
                    log::debug!("Settings loaded from '{}'.", path.display());
                    return settings;
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!("{}. Using default settings.", e);
                    return Self::default();
                }
            }
        }
        Self::default()
    }

    /// Writes the settings as TOML, creating the directory if needed.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            use_solution_dir = true
            disable_inactive_items = "InAllProjects"
            "#,
        )
        .unwrap();
        assert!(settings.use_solution_dir);
        assert_eq!(settings.disable_inactive_items, InactiveDisableMode::InAllProjects);
        assert!(settings.vcs_support_enabled);
        assert_eq!(settings.debounce_ms, 250);
    }

    #[test]
    fn test_solution_file_wins_and_malformed_falls_back() {
        let dir = tempdir().unwrap();
        let solution = dir.path().join("App.sln");

        fs::write(paths::solution_settings_path(&solution), "history_limit = 7\n").unwrap();
        assert_eq!(Settings::load(Some(&solution)).history_limit, 7);

        fs::write(paths::solution_settings_path(&solution), "history_limit = [").unwrap();
        assert_eq!(Settings::load(Some(&solution)), Settings::default());
    }

    #[test]
    fn test_json_root_only_when_enabled() {
        let mut settings = Settings {
            json_root_path: Some("args".to_string()),
            ..Default::default()
        };
        assert_eq!(settings.json_root(Path::new("/sln")), None);
        settings.use_custom_json_root = true;
        assert_eq!(
            settings.json_root(Path::new("/sln")),
            Some(PathBuf::from("/sln/args"))
        );
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let settings = Settings {
            cpp_project_scan_handling: CppScanHandling::OnlyStartup,
            ..Default::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load_file(&path).unwrap(), Some(settings));
    }
}
