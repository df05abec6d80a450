// src/cli/handlers/commons.rs

// Shared helpers used by several handlers.

use anyhow::{Result, anyhow};
use colored::Colorize;
use std::path::PathBuf;
use uuid::Uuid;

use crate::{
    cli::manifest::Manifest,
    core::{settings::Settings, workspace::Workspace},
};

/// An opened workspace plus where it came from.
#[derive(Debug)]
pub struct Session {
    /// The manifest the workspace was opened from.
    pub manifest_path: PathBuf,
    /// The opened workspace.
    pub workspace: Workspace,
}

/// Finds the manifest and opens its solution. With `reconcile`, every project is loaded
/// and merged with its files; otherwise projects are only registered.
pub fn open_session(reconcile: bool) -> Result<Session> {
    let manifest = Manifest::discover()?;
    let settings = Settings::load(Some(&manifest.solution));
    let mut workspace =
        Workspace::with_settings(&manifest.solution, settings, Box::new(manifest.scanner));
    if reconcile {
        workspace.load_projects(manifest.projects);
    } else {
        workspace.register_projects(manifest.projects);
    }
    Ok(Session {
        manifest_path: manifest.path,
        workspace,
    })
}

/// Resolves a project by id, name or unique name. Without a query, the first startup
/// project (or the first project) is used.
pub fn resolve_project(workspace: &Workspace, query: Option<&str>) -> Result<Uuid> {
    let Some(query) = query else {
        return workspace
            .project_infos()
            .find(|info| info.is_startup)
            .or_else(|| workspace.project_infos().next())
            .map(|info| info.id)
            .ok_or_else(|| anyhow!(t!("error.no_projects")));
    };
    if let Ok(id) = Uuid::parse_str(query)
        && workspace.project_info(id).is_some()
    {
        return Ok(id);
    }
    workspace
        .project_infos()
        .find(|info| info.name.eq_ignore_ascii_case(query) || info.unique_name == query)
        .map(|info| info.id)
        .ok_or_else(|| anyhow!(t!("error.project_not_found"), name = query))
}

/// Resolves an item id, or a project query when the text is not a known item id.
pub fn resolve_target(workspace: &Workspace, target: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(target)
        && workspace.tree().locate(id).is_some()
    {
        return Ok(id);
    }
    resolve_project(workspace, Some(target))
}

/// Prints and clears the warnings the workspace collected.
pub fn print_warnings(workspace: &mut Workspace) {
    for warning in workspace.take_warnings() {
        eprintln!("{} {}", t!("common.warning").yellow().bold(), warning);
    }
}
