// src/cli/manifest.rs

//! The `argtree.toml` manifest: which solution to open and which projects it contains.
//!
//! ```toml
//! solution = "App.sln"
//!
//! [[projects]]
//! id = "6f9619ff-8b86-d011-b42d-00c04fc964ff"
//! name = "App"
//! dir = "src/app"
//! startup = true
//! scan = [{ value = "--verbose" }, { value = "RUST_LOG=debug", type = "EnvVar" }]
//! ```
//!
//! Paths are expanded (`~`, `$VAR`) and resolved against the manifest's directory. The
//! `scan` lists are what a build-configuration scan of the project would find.

use crate::constants::{MANIFEST_ENV_VAR, MANIFEST_FILENAME};
use crate::core::paths;
use crate::core::reconcile::BuildConfigScanner;
use crate::models::{ItemData, ParamType, ProjectInfo};
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    solution: String,
    #[serde(default)]
    projects: Vec<ManifestProject>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct ManifestProject {
    id: Uuid,
    name: String,
    #[serde(default)]
    kind: Uuid,
    /// Defaults to a directory named after the project next to the solution.
    #[serde(default)]
    dir: Option<String>,
    #[serde(default)]
    unique_name: Option<String>,
    #[serde(default)]
    startup: bool,
    #[serde(default)]
    scan: Vec<ScanEntry>,
}

fn default_true() -> bool {
    true
}

/// One item a build-configuration scan would report.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScanEntry {
    /// Parameter value as the scan reports it.
    pub value: String,
    /// Defaults to a command-line argument.
    #[serde(default, rename = "type")]
    pub param_type: ParamType,
    /// Whether the scan reports the item as checked by default.
    #[serde(default = "default_true")]
    pub checked: bool,
}

/// Serves the manifest's `scan` lists as build-configuration scan results.
#[derive(Debug, Default, Clone)]
pub struct ManifestScanner {
    entries: HashMap<Uuid, Vec<ScanEntry>>,
}

impl BuildConfigScanner for ManifestScanner {
    fn scan(&self, project: &ProjectInfo) -> Result<Vec<ItemData>> {
        let entries = self.entries.get(&project.id).map(Vec::as_slice).unwrap_or_default();
        Ok(entries
            .iter()
            .enumerate()
            .map(|(index, entry)| ItemData {
                // Stable across runs so repeated scans merge by identity.
                id: Uuid::new_v5(&project.id, format!("{}:{}", index, entry.value).as_bytes()),
                param_type: entry.param_type,
                command: entry.value.clone(),
                default_checked: entry.checked,
                ..Default::default()
            })
            .collect())
    }
}

/// A parsed manifest with every path made absolute.
#[derive(Debug)]
pub struct Manifest {
    /// The manifest file itself.
    pub path: PathBuf,
    /// The solution the projects belong to.
    pub solution: PathBuf,
    /// Every project, with `dir` absolute.
    pub projects: Vec<ProjectInfo>,
    /// Scan results for the projects.
    pub scanner: ManifestScanner,
}

impl Manifest {
    /// Parses manifest text. `base` is the directory relative paths are resolved against.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let file: ManifestFile = toml::from_str(content)
            .with_context(|| format!("Failed to parse manifest '{}'", path.display()))?;

        let solution = paths::expand_path(&file.solution, base)?;
        let solution_dir = solution
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| base.to_path_buf());

        let mut projects = Vec::with_capacity(file.projects.len());
        let mut scanner = ManifestScanner::default();
        for project in file.projects {
            if projects.iter().any(|p: &ProjectInfo| p.id == project.id) {
                return Err(anyhow!(
                    t!("manifest.error.duplicate_id"),
                    id = project.id,
                    path = path.display()
                ));
            }
            let dir = match &project.dir {
                Some(dir) => paths::expand_path(dir, base)?,
                None => solution_dir.join(&project.name),
            };
            let unique_name = project
                .unique_name
                .unwrap_or_else(|| format!("{}/{}", project.name, project.name));
            if !project.scan.is_empty() {
                scanner.entries.insert(project.id, project.scan);
            }
            projects.push(ProjectInfo {
                id: project.id,
                name: project.name,
                kind: project.kind,
                dir,
                unique_name,
                is_startup: project.startup,
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            solution,
            projects,
            scanner,
        })
    }

    /// Reads the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest '{}'", path.display()))?;
        Self::parse(&content, path)
    }

    /// Locates the manifest: `$ARGTREE_MANIFEST`, else the nearest `argtree.toml` at or
    /// above the current directory.
    pub fn discover() -> Result<Self> {
        if let Ok(path) = env::var(MANIFEST_ENV_VAR) {
            log::debug!("Using manifest from ${}: {}", MANIFEST_ENV_VAR, path);
            let cwd = env::current_dir()?;
            return Self::load(&paths::expand_path(&path, &cwd)?);
        }
        let cwd = env::current_dir()?;
        let found = cwd
            .ancestors()
            .map(|dir| dir.join(MANIFEST_FILENAME))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| {
                anyhow!(
                    t!("manifest.error.not_found"),
                    file = MANIFEST_FILENAME,
                    var = MANIFEST_ENV_VAR
                )
            })?;
        log::debug!("Found manifest at '{}'.", found.display());
        Self::load(&found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MANIFEST: &str = r#"
        solution = "App.sln"

        [[projects]]
        id = "00000000-0000-0000-0000-000000000001"
        name = "App"
        startup = true
        scan = [{ value = "--verbose" }, { value = "MODE=dev", type = "EnvVar", checked = false }]

        [[projects]]
        id = "00000000-0000-0000-0000-000000000002"
        name = "Lib"
        dir = "libs/lib"
        unique_name = "libs/Lib.proj"
    "#;

    #[test]
    fn test_parse_resolves_paths_and_defaults() {
        let manifest = Manifest::parse(MANIFEST, Path::new("/work/argtree.toml")).unwrap();

        assert_eq!(manifest.solution, PathBuf::from("/work/App.sln"));
        let app = &manifest.projects[0];
        assert_eq!(app.dir, PathBuf::from("/work/App"));
        assert_eq!(app.unique_name, "App/App");
        assert!(app.is_startup);
        let lib = &manifest.projects[1];
        assert_eq!(lib.dir, PathBuf::from("/work/libs/lib"));
        assert!(!lib.is_startup);
    }

    #[test]
    fn test_scanner_yields_stable_items() {
        let manifest = Manifest::parse(MANIFEST, Path::new("/work/argtree.toml")).unwrap();
        let app = &manifest.projects[0];

        let first = manifest.scanner.scan(app).unwrap();
        let second = manifest.scanner.scan(app).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].param_type, ParamType::EnvVar);
        assert!(!first[1].default_checked);
        assert!(manifest.scanner.scan(&manifest.projects[1]).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let content = r#"
            solution = "App.sln"
            [[projects]]
            id = "00000000-0000-0000-0000-000000000001"
            name = "A"
            [[projects]]
            id = "00000000-0000-0000-0000-000000000001"
            name = "B"
        "#;
        assert!(Manifest::parse(content, Path::new("/work/argtree.toml")).is_err());
    }
}
