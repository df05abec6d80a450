// src/system/file_store.rs

//! # File Store
//!
//! Reads and writes the version-controlled parameter files: one `<Project>.args.json` per
//! project, or a single `<Solution>.args.json` when solution mode is on.
//!
//! The store remembers a content hash for every file it read or wrote, so a change
//! notification caused by its own write can be told apart from an external edit.

use crate::core::item::Project;
use crate::core::paths;
use crate::core::schema::{self, StorageError};
use crate::core::settings::Settings;
use crate::models::{ProjectData, ProjectInfo, SolutionData};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

const HASH_TRUNCATE_LENGTH: usize = 16; // 16 bytes = 32 hex characters

/// Hash recorded for a file the store knows to be absent.
const ABSENT: &str = "";

/// Truncated blake3 digest of some content, hex encoded.
pub fn content_hash(bytes: &[u8]) -> String {
    let hash = blake3::hash(bytes);
    hex::encode(hash.as_bytes().get(..HASH_TRUNCATE_LENGTH).unwrap_or_default())
}

/// What a save did on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// New content was written.
    Written(PathBuf),
    /// The project became empty and its file was removed.
    Deleted(PathBuf),
    /// The file already held this content.
    Unchanged,
}

/// What a rename did on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The file now lives under the new name.
    Moved {
        /// The old location.
        from: PathBuf,
        /// The new location.
        to: PathBuf,
    },
    /// A file already existed under the new name; the old one was deleted and the project
    /// should be reloaded from the existing file.
    TargetExisted {
        /// The deleted file under the old name.
        removed: PathBuf,
    },
    /// There was no file to move, or the solution-wide file is in use.
    NothingToMove,
}

/// Reads and writes the JSON parameter files of one solution.
#[derive(Debug)]
pub struct FileStore {
    solution: PathBuf,
    known_hashes: Mutex<HashMap<PathBuf, String>>,
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl FileStore {
    /// A store for the solution file at `solution` (e.g. `/work/App.sln`).
    pub fn new(solution: impl Into<PathBuf>) -> Self {
        Self {
            solution: solution.into(),
            known_hashes: Mutex::new(HashMap::new()),
        }
    }

    /// The solution file this store belongs to.
    pub fn solution_path(&self) -> &Path {
        &self.solution
    }

    /// Directory of the solution file.
    pub fn solution_dir(&self) -> PathBuf {
        self.solution
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// `<Solution>.args.json`.
    pub fn solution_file(&self) -> PathBuf {
        paths::solution_args_path(&self.solution)
    }

    /// Where the per-project file of `info` lives under the current settings.
    pub fn project_file(&self, info: &ProjectInfo, settings: &Settings) -> PathBuf {
        self.project_file_named(info, &info.name, settings)
    }

    fn project_file_named(&self, info: &ProjectInfo, name: &str, settings: &Settings) -> PathBuf {
        let solution_dir = self.solution_dir();
        let dir = match settings.json_root(&solution_dir) {
            Some(root) => match info.dir.strip_prefix(&solution_dir) {
                Ok(relative) => root.join(relative),
                Err(_) => root,
            },
            None => info.dir.clone(),
        };
        paths::project_file_path(&dir, name)
    }

    fn remember(&self, path: &Path, hash: String) {
        let mut hashes = self
            .known_hashes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        hashes.insert(path.to_path_buf(), hash);
    }

    /// Whether the file at `path` still holds exactly what the store last read or wrote.
    pub fn is_own_write(&self, path: &Path) -> bool {
        let current = match fs::read(path) {
            Ok(bytes) => content_hash(&bytes),
            Err(_) => ABSENT.to_string(),
        };
        let hashes = self
            .known_hashes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        hashes.get(path).is_some_and(|known| *known == current)
    }

    fn read_text(&self, path: &Path) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(path) {
            Ok(content) => {
                self.remember(path, content_hash(content.as_bytes()));
                Ok(Some(content))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.remember(path, ABSENT.to_string());
                Ok(None)
            }
            Err(source) => Err(io_error(path, source)),
        }
    }

    /// Writes through a temporary file in the target directory and renames it into place.
    fn write_text(&self, path: &Path, content: &str) -> Result<(), StorageError> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        let mut temp = NamedTempFile::new_in(parent).map_err(|e| io_error(parent, e))?;
        temp.write_all(content.as_bytes())
            .map_err(|e| io_error(temp.path(), e))?;
        temp.persist(path).map_err(|e| io_error(path, e.error))?;
        self.remember(path, content_hash(content.as_bytes()));
        log::debug!("Wrote '{}'.", path.display());
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<bool, StorageError> {
        match fs::remove_file(path) {
            Ok(()) => {
                self.remember(path, ABSENT.to_string());
                log::info!("Deleted '{}'.", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(io_error(path, source)),
        }
    }

    /// Reads the persisted snapshot of one project. `Ok(None)` when there is none.
    pub fn read_project(
        &self,
        info: &ProjectInfo,
        settings: &Settings,
    ) -> Result<Option<ProjectData>, StorageError> {
        if settings.use_solution_dir {
            let Some(content) = self.read_text(&self.solution_file())? else {
                return Ok(None);
            };
            let solution = schema::decode_solution(&content)?;
            return Ok(schema::find_in_solution(&solution, info.id, &info.unique_name).cloned());
        }
        match self.read_text(&self.project_file(info, settings))? {
            Some(content) => schema::decode_project(&content),
            None => Ok(None),
        }
    }

    /// Like `read_project`, but a malformed file is logged and treated as absent.
    pub fn read_project_or_warn(&self, info: &ProjectInfo, settings: &Settings) -> Option<ProjectData> {
        match self.read_project(info, settings) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Ignoring parameter file of '{}': {}", info.name, e);
                None
            }
        }
    }

    /// Persists one project to its own file. A project with nothing worth saving has its
    /// file deleted instead, when the settings allow it.
    pub fn save_project(
        &self,
        project: &Project,
        info: &ProjectInfo,
        settings: &Settings,
    ) -> Result<SaveOutcome, StorageError> {
        let path = self.project_file(info, settings);
        if !project.needs_saving() && settings.delete_empty_files_automatically {
            return Ok(if self.delete(&path)? {
                SaveOutcome::Deleted(path)
            } else {
                SaveOutcome::Unchanged
            });
        }
        let content = schema::encode_project(&schema::project_to_data(project))?;
        if fs::read_to_string(&path).is_ok_and(|existing| existing == content) {
            return Ok(SaveOutcome::Unchanged);
        }
        self.write_text(&path, &content)?;
        Ok(SaveOutcome::Written(path))
    }

    /// Persists every project into the solution file at once.
    pub fn save_solution(
        &self,
        projects: &[(&Project, &ProjectInfo)],
        settings: &Settings,
    ) -> Result<SaveOutcome, StorageError> {
        let path = self.solution_file();
        let mut solution = SolutionData::default();
        for (project, info) in projects {
            if !project.needs_saving() {
                continue;
            }
            let mut data = schema::project_to_data(project);
            data.command = Some(info.unique_name.clone()).filter(|n| !n.is_empty());
            solution.project_arguments.push(data);
        }

        if solution.project_arguments.is_empty() && settings.delete_empty_files_automatically {
            return Ok(if self.delete(&path)? {
                SaveOutcome::Deleted(path)
            } else {
                SaveOutcome::Unchanged
            });
        }
        let content = schema::encode_solution(&solution)?;
        if fs::read_to_string(&path).is_ok_and(|existing| existing == content) {
            return Ok(SaveOutcome::Unchanged);
        }
        self.write_text(&path, &content)?;
        Ok(SaveOutcome::Written(path))
    }

    /// Moves a project's file after the project was renamed from `old_name`.
    pub fn rename_project(
        &self,
        info: &ProjectInfo,
        old_name: &str,
        settings: &Settings,
    ) -> Result<RenameOutcome, StorageError> {
        if settings.use_solution_dir {
            return Ok(RenameOutcome::NothingToMove);
        }
        let from = self.project_file_named(info, old_name, settings);
        let to = self.project_file(info, settings);
        if from == to || !from.exists() {
            return Ok(RenameOutcome::NothingToMove);
        }
        if to.exists() {
            log::warn!(
                "'{}' already exists; discarding '{}'.",
                to.display(),
                from.display()
            );
            self.delete(&from)?;
            return Ok(RenameOutcome::TargetExisted { removed: from });
        }
        fs::rename(&from, &to).map_err(|e| io_error(&to, e))?;
        self.remember(&from, ABSENT.to_string());
        if let Ok(bytes) = fs::read(&to) {
            self.remember(&to, content_hash(&bytes));
        }
        log::info!("Moved '{}' to '{}'.", from.display(), to.display());
        Ok(RenameOutcome::Moved { from, to })
    }

    /// Deletes the files of the storage mode that is not in use.
    pub fn delete_unused_files(
        &self,
        projects: &[ProjectInfo],
        settings: &Settings,
    ) -> Result<Vec<PathBuf>, StorageError> {
        let mut deleted = Vec::new();
        if settings.use_solution_dir {
            for info in projects {
                let path = self.project_file(info, settings);
                if self.delete(&path)? {
                    deleted.push(path);
                }
            }
        } else {
            let path = self.solution_file();
            if self.delete(&path)? {
                deleted.push(path);
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::Parameter;
    use crate::models::ParamType;
    use tempfile::{TempDir, tempdir};
    use uuid::Uuid;

    fn setup() -> (TempDir, FileStore, ProjectInfo) {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("App.sln"));
        let info = ProjectInfo {
            id: Uuid::from_u128(1),
            name: "Core".to_string(),
            kind: Uuid::nil(),
            dir: dir.path().join("core"),
            unique_name: "core/Core.proj".to_string(),
            is_startup: true,
        };
        (dir, store, info)
    }

    fn project_with_arg(info: &ProjectInfo) -> Project {
        let mut project = Project::new(info.id, info.kind, &info.name);
        project
            .container
            .push(Parameter::new(ParamType::CmdArg, "--verbose", true));
        project
    }

    #[test]
    fn test_content_hash_is_truncated_blake3() {
        let hash = content_hash(b"hello world");
        assert_eq!(hash.len(), HASH_TRUNCATE_LENGTH * 2);
        assert_eq!(hash, "d74981efa70a0c880b8d8c1985d075db");
    }

    #[test]
    fn test_save_read_and_own_write_detection() {
        let (_dir, store, info) = setup();
        let settings = Settings::default();
        let project = project_with_arg(&info);

        let outcome = store.save_project(&project, &info, &settings).unwrap();
        let path = store.project_file(&info, &settings);
        assert_eq!(outcome, SaveOutcome::Written(path.clone()));
        assert!(store.is_own_write(&path));

        let data = store.read_project(&info, &settings).unwrap().unwrap();
        assert_eq!(data.items.len(), 1);

        fs::write(&path, "{ \"Id\": \"00000000-0000-0000-0000-000000000001\" }").unwrap();
        assert!(!store.is_own_write(&path));
        assert_eq!(
            store.save_project(&project, &info, &settings).unwrap(),
            SaveOutcome::Written(path)
        );
    }

    #[test]
    fn test_overwrite_leaves_only_the_target_file() {
        let (_dir, store, info) = setup();
        let settings = Settings::default();
        let mut project = project_with_arg(&info);
        store.save_project(&project, &info, &settings).unwrap();
        project
            .container
            .push(Parameter::new(ParamType::CmdArg, "--second", true));
        store.save_project(&project, &info, &settings).unwrap();

        let path = store.project_file(&info, &settings);
        assert!(fs::read_to_string(&path).unwrap().contains("--second"));
        let entries: Vec<PathBuf> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(entries, vec![path]);
    }

    #[test]
    fn test_empty_project_deletes_its_file() {
        let (_dir, store, info) = setup();
        let settings = Settings::default();
        store
            .save_project(&project_with_arg(&info), &info, &settings)
            .unwrap();

        let empty = Project::new(info.id, info.kind, &info.name);
        let outcome = store.save_project(&empty, &info, &settings).unwrap();

        let path = store.project_file(&info, &settings);
        assert_eq!(outcome, SaveOutcome::Deleted(path.clone()));
        assert!(!path.exists());
    }

    #[test]
    fn test_malformed_file_is_treated_as_absent() {
        let (_dir, store, info) = setup();
        let settings = Settings::default();
        let path = store.project_file(&info, &settings);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ broken").unwrap();

        assert!(store.read_project(&info, &settings).is_err());
        assert!(store.read_project_or_warn(&info, &settings).is_none());
    }

    #[test]
    fn test_solution_mode_round_trip_and_cleanup() {
        let (_dir, store, info) = setup();
        let settings = Settings {
            use_solution_dir: true,
            ..Default::default()
        };
        let project = project_with_arg(&info);
        store
            .save_project(&project, &info, &Settings::default())
            .unwrap();

        store.save_solution(&[(&project, &info)], &settings).unwrap();
        let data = store.read_project(&info, &settings).unwrap().unwrap();
        assert_eq!(data.command.as_deref(), Some("core/Core.proj"));

        let deleted = store.delete_unused_files(&[info.clone()], &settings).unwrap();
        assert_eq!(deleted, vec![store.project_file(&info, &settings)]);
        assert!(store.solution_file().exists());
    }

    #[test]
    fn test_rename_moves_file() {
        let (_dir, store, mut info) = setup();
        let settings = Settings::default();
        store
            .save_project(&project_with_arg(&info), &info, &settings)
            .unwrap();
        let old_path = store.project_file(&info, &settings);

        info.name = "Engine".to_string();
        let outcome = store.rename_project(&info, "Core", &settings).unwrap();

        let new_path = store.project_file(&info, &settings);
        assert_eq!(
            outcome,
            RenameOutcome::Moved {
                from: old_path.clone(),
                to: new_path.clone()
            }
        );
        assert!(!old_path.exists());
        assert!(new_path.exists());
        assert!(store.is_own_write(&new_path));
    }
}
