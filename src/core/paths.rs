// src/core/paths.rs

use crate::constants::{
    CONFIG_DIR_NAME, LEGACY_STORE_EXTENSION, PROJECT_FILE_SUFFIX, SOLUTION_FILE_EXTENSION,
    SOLUTION_SETTINGS_EXTENSION, USER_SETTINGS_FILENAME,
};
use lazy_static::lazy_static;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

lazy_static! {
    static ref ARGTREE_CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

/// Failures while locating or expanding paths.
#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    /// A `~` or variable in a path template could not be expanded.
    #[error("Failed to expand path template '{template}': {message}")]
    Expansion {
        /// The template as configured.
        template: String,
        /// Why expansion failed.
        message: String,
    },
}

/// Returns the user-wide configuration directory (`~/.config/argtree`).
///
/// Memoized: the first call asks the OS, later calls return the cached value. The directory
/// is not created; readers treat a missing directory as "no settings".
pub fn get_config_dir() -> Result<PathBuf, PathError> {
    let mut cached = ARGTREE_CONFIG_DIR
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(path) = &*cached {
        return Ok(path.clone());
    }
    let config_path = dirs::config_dir()
        .ok_or(PathError::ConfigDirNotFound)?
        .join(CONFIG_DIR_NAME);
    *cached = Some(config_path.clone());
    Ok(config_path)
}

/// `~/.config/argtree/settings.toml`.
pub fn user_settings_path() -> Result<PathBuf, PathError> {
    get_config_dir().map(|dir| dir.join(USER_SETTINGS_FILENAME))
}

/// `<solution>.ArgsCfg.toml`, next to the solution file.
pub fn solution_settings_path(solution: &Path) -> PathBuf {
    solution.with_extension(SOLUTION_SETTINGS_EXTENSION)
}

/// `<solution>.args.json`, the solution-wide parameter file.
pub fn solution_args_path(solution: &Path) -> PathBuf {
    solution.with_extension(SOLUTION_FILE_EXTENSION)
}

/// `<solution>.argtree.bin`, the private legacy state blob.
pub fn legacy_store_path(solution: &Path) -> PathBuf {
    solution.with_extension(LEGACY_STORE_EXTENSION)
}

/// `<dir>/<name>.args.json`.
pub fn project_file_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, PROJECT_FILE_SUFFIX))
}

/// Expands `~` and environment variables in `template`. Relative results are resolved
/// against `base`.
pub fn expand_path(template: &str, base: &Path) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full(template).map_err(|e| PathError::Expansion {
        template: template.to_string(),
        message: e.to_string(),
    })?;
    let path = PathBuf::from(expanded.into_owned());
    let absolute = if path.is_absolute() {
        path
    } else {
        base.join(path)
    };
    Ok(dunce::simplified(&absolute).to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solution_paths_swap_extension() {
        let solution = Path::new("/work/App.sln");
        assert_eq!(solution_args_path(solution), PathBuf::from("/work/App.args.json"));
        assert_eq!(
            solution_settings_path(solution),
            PathBuf::from("/work/App.ArgsCfg.toml")
        );
        assert_eq!(legacy_store_path(solution), PathBuf::from("/work/App.argtree.bin"));
    }

    #[test]
    fn test_project_file_path() {
        assert_eq!(
            project_file_path(Path::new("/work/core"), "Core"),
            PathBuf::from("/work/core/Core.args.json")
        );
    }

    #[test]
    fn test_expand_relative_against_base() {
        let expanded = expand_path("args", Path::new("/work")).unwrap();
        assert_eq!(expanded, PathBuf::from("/work/args"));
        let absolute = expand_path("/elsewhere", Path::new("/work")).unwrap();
        assert_eq!(absolute, PathBuf::from("/elsewhere"));
    }
}
