// src/core/workspace.rs

//! # Workspace
//!
//! The top-level composition point: one live `ArgTree` plus everything around it (settings,
//! persistence, history, selection, change notifications and the debounced active-item
//! refresh). Every edit command goes through here so that it is recorded in the history,
//! persisted and followed by a refresh.
//!
//! Persistence is fire-and-forget. A failed write is logged and queued as a warning for the
//! caller; the in-memory tree stays authoritative.

use crate::constants::CPP_PROJECT_KIND;
use crate::core::composer::{self, EnvShell, LaunchCommand};
use crate::core::history::History;
use crate::core::item::{
    Container, Filter, Group, Item, ItemError, ItemResult, NodeRef, Parameter, Project, TreeEvent,
};
use crate::core::paths;
use crate::core::reconcile::{self, BuildConfigScanner, Outcome, ReconcileInput, StructureSource};
use crate::core::resolver::{self, Debouncer, LaunchContext};
use crate::core::schema;
use crate::core::selection::{InsertionPoint, SelectionTracker};
use crate::core::settings::{CppScanHandling, Settings};
use crate::core::tree::ArgTree;
use crate::dev_utils::BlockTimer;
use crate::models::{LegacySnapshot, ParamType, ProjectData, ProjectInfo};
use crate::system::file_store::{FileStore, RenameOutcome};
use crate::system::legacy_store;
use crate::system::notifications::{ChangeQueue, ChangeSender, SourceChange};
use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use uuid::Uuid;

/// A loaded solution and its parameter tree.
pub struct Workspace {
    tree: ArgTree,
    selection: SelectionTracker,
    history: History,
    settings: Settings,
    store: FileStore,
    legacy_path: PathBuf,
    legacy: Option<LegacySnapshot>,
    infos: IndexMap<Uuid, ProjectInfo>,
    scanner: Box<dyn BuildConfigScanner>,
    debouncer: Debouncer,
    context: LaunchContext,
    changes: ChangeQueue,
    clipboard: Vec<Item>,
    clipboard_from_cut: bool,
    warnings: Vec<String>,
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("solution", &self.store.solution_path())
            .field("projects", &self.infos.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Workspace {
    /// Opens the solution at `solution`, loading its settings and legacy store.
    pub fn open(solution: impl Into<PathBuf>, scanner: Box<dyn BuildConfigScanner>) -> Self {
        let solution = solution.into();
        let settings = Settings::load(Some(&solution));
        Self::with_settings(solution, settings, scanner)
    }

    /// Like `open`, with explicit settings.
    pub fn with_settings(
        solution: impl Into<PathBuf>,
        settings: Settings,
        scanner: Box<dyn BuildConfigScanner>,
    ) -> Self {
        let solution = solution.into();
        let legacy_path = paths::legacy_store_path(&solution);
        let legacy = legacy_store::load_or_warn(&legacy_path);
        log::debug!(
            "Opened '{}' (legacy store {}).",
            solution.display(),
            if legacy.is_some() { "found" } else { "absent" }
        );
        Self {
            tree: ArgTree::new(),
            selection: SelectionTracker::new(),
            history: History::new(settings.history_limit),
            debouncer: Debouncer::new(settings.debounce_window()),
            settings,
            store: FileStore::new(solution),
            legacy_path,
            legacy,
            infos: IndexMap::new(),
            scanner,
            context: LaunchContext::default(),
            changes: ChangeQueue::new(),
            clipboard: Vec::new(),
            clipboard_from_cut: false,
            warnings: Vec::new(),
        }
    }

    // --- ACCESSORS ---

    /// The live tree.
    pub fn tree(&self) -> &ArgTree {
        &self.tree
    }

    /// The settings in effect.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The JSON file store, with its record of own writes.
    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// What the host reported about a project.
    pub fn project_info(&self, id: Uuid) -> Option<&ProjectInfo> {
        self.infos.get(&id)
    }

    /// Every registered project, in registration order.
    pub fn project_infos(&self) -> impl Iterator<Item = &ProjectInfo> {
        self.infos.values()
    }

    /// A handle watchers on other threads use to report changes.
    pub fn change_sender(&self) -> ChangeSender {
        self.changes.sender()
    }

    /// Recoverable problems since the last call (failed writes, rejected reloads).
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Whether `undo` has something to restore.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether `redo` has something to re-apply.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn warn(&mut self, message: String) {
        log::warn!("{}", message);
        self.warnings.push(message);
    }

    fn project_or_err(&self, id: Uuid) -> Result<&Project> {
        self.tree
            .project(id)
            .ok_or_else(|| ItemError::MissingProject { id }.into())
    }

    fn locate(&self, id: Uuid) -> ItemResult<Uuid> {
        self.tree
            .locate(id)
            .ok_or(ItemError::StaleReference { id })
    }

    // --- LOADING & RECONCILIATION ---

    /// Registers projects and reconciles all of them. Files are read in parallel.
    pub fn load_projects(&mut self, infos: Vec<ProjectInfo>) {
        self.register_projects(infos);
        self.reload_all();
    }

    /// Makes projects known without reconciling them yet.
    pub fn register_projects(&mut self, infos: Vec<ProjectInfo>) {
        for info in infos {
            self.infos.insert(info.id, info);
        }
    }

    /// Registers one project and reconciles it.
    pub fn add_project(&mut self, info: ProjectInfo) -> Result<Option<StructureSource>> {
        let id = info.id;
        self.infos.insert(id, info);
        self.update_project(id, false)
    }

    /// Unloads a project and forgets everything about it.
    pub fn remove_project(&mut self, id: Uuid) {
        self.infos.shift_remove(&id);
        if self.tree.remove_project(id).is_some() {
            log::info!("Unloaded project '{}'.", id);
        }
        self.history.forget(id);
        self.selection.prune(&self.tree);
        self.debouncer.trigger(Instant::now());
    }

    /// Re-reads the persisted file of one project and merges it. Returns where the
    /// structure came from, or `None` when the live tree was kept.
    pub fn update_project(
        &mut self,
        id: Uuid,
        gather_for_empty: bool,
    ) -> Result<Option<StructureSource>> {
        let info = self
            .infos
            .get(&id)
            .cloned()
            .ok_or(ItemError::MissingProject { id })?;
        let file = if self.settings.vcs_support_enabled {
            self.store.read_project_or_warn(&info, &self.settings)
        } else {
            None
        };
        Ok(self.apply_reconcile(&info, file.as_ref(), gather_for_empty))
    }

    /// Re-reconciles every registered project.
    pub fn reload_all(&mut self) {
        let _timer = BlockTimer::new("reload all projects");
        let infos: Vec<ProjectInfo> = self.infos.values().cloned().collect();
        let files: Vec<Option<ProjectData>> = if self.settings.vcs_support_enabled {
            let store = &self.store;
            let settings = &self.settings;
            infos
                .par_iter()
                .map(|info| store.read_project_or_warn(info, settings))
                .collect()
        } else {
            vec![None; infos.len()]
        };
        for (info, file) in infos.iter().zip(files) {
            self.apply_reconcile(info, file.as_ref(), false);
        }
        self.refresh_active();
    }

    fn gather_allowed(&self, info: &ProjectInfo) -> bool {
        if info.kind != CPP_PROJECT_KIND {
            return true;
        }
        match self.settings.cpp_project_scan_handling {
            CppScanHandling::All => true,
            CppScanHandling::OnlyStartup => info.is_startup,
            CppScanHandling::None => false,
        }
    }

    fn apply_reconcile(
        &mut self,
        info: &ProjectInfo,
        file: Option<&ProjectData>,
        gather_for_empty: bool,
    ) -> Option<StructureSource> {
        let foreign: HashSet<Uuid> = self
            .tree
            .projects()
            .filter(|p| p.id != info.id)
            .flat_map(Project::ids)
            .collect();
        let live = self.tree.project(info.id);
        let filter = live.and_then(|p| p.filter().cloned());
        let input = ReconcileInput {
            info,
            live,
            file,
            legacy: self.legacy.as_ref(),
            foreign_ids: &foreign,
            vcs_support_enabled: self.settings.vcs_support_enabled,
            gather_when_not_found: self.gather_allowed(info),
            gather_for_empty,
        };
        let outcome = reconcile::reconcile(&input, self.scanner.as_ref());
        match outcome {
            Outcome::Kept => None,
            Outcome::Replaced {
                mut project,
                source,
                needs_save,
            } => {
                project.set_filter(filter);
                self.tree.replace_project(project);
                self.selection.prune(&self.tree);
                self.debouncer.trigger(Instant::now());
                if needs_save {
                    self.persist(info.id);
                }
                Some(source)
            }
        }
    }

    // --- EXTERNAL CHANGES ---

    /// Applies every queued change notification. Returns how many were processed.
    pub fn process_changes(&mut self) -> usize {
        let changes = self.changes.drain();
        for change in &changes {
            self.apply_change(change);
        }
        changes.len()
    }

    fn apply_change(&mut self, change: &SourceChange) {
        log::debug!("Processing change: {:?}", change);
        match change {
            SourceChange::ProjectFile { project, path } => {
                if self.store.is_own_write(path) {
                    log::debug!("Ignoring own write to '{}'.", path.display());
                    return;
                }
                if let Err(e) = self.update_project(*project, false) {
                    self.warn(format!("Reload of '{}' failed: {}", path.display(), e));
                }
            }
            SourceChange::SolutionFile { path } => {
                if self.store.is_own_write(path) {
                    log::debug!("Ignoring own write to '{}'.", path.display());
                    return;
                }
                if self.settings.use_solution_dir {
                    self.reload_all();
                }
            }
            SourceChange::Settings => {
                let settings = Settings::load(Some(self.store.solution_path()));
                self.apply_settings(settings);
            }
            SourceChange::ProjectAdded { project } => {
                if let Err(e) = self.update_project(*project, false) {
                    self.warn(format!("Cannot load project '{}': {}", project, e));
                }
            }
            SourceChange::ProjectRemoved { project } => self.remove_project(*project),
            SourceChange::ProjectRenamed { project, new_name } => {
                if let Err(e) = self.rename_project(*project, new_name) {
                    self.warn(format!("Rename of project '{}' failed: {:#}", project, e));
                }
            }
            SourceChange::StartupProjectsChanged { projects } => {
                self.set_startup_projects(projects);
            }
        }
    }

    /// Switches to new settings. A storage-mode switch rewrites every project in the new
    /// mode before unused files are cleaned up.
    pub fn apply_settings(&mut self, settings: Settings) {
        let store_moved = settings.use_solution_dir != self.settings.use_solution_dir
            || settings.json_root(&self.store.solution_dir())
                != self.settings.json_root(&self.store.solution_dir());
        self.history.set_limit(settings.history_limit);
        self.debouncer = Debouncer::new(settings.debounce_window());
        self.settings = settings;
        if store_moved {
            log::info!("Storage location changed; rewriting all parameter files.");
            self.save_all();
        }
        if self.settings.delete_unnecessary_files_automatically {
            self.cleanup_unused_files();
        }
        self.reload_all();
    }

    /// The project was renamed by its owner. Moves its file, then updates the name. If the
    /// file cannot be moved nothing changes.
    pub fn rename_project(&mut self, id: Uuid, new_name: &str) -> Result<()> {
        let current = self
            .infos
            .get(&id)
            .ok_or(ItemError::MissingProject { id })?;
        let old_name = current.name.clone();
        let renamed = ProjectInfo {
            name: new_name.to_string(),
            ..current.clone()
        };
        let outcome = self
            .store
            .rename_project(&renamed, &old_name, &self.settings)
            .with_context(|| format!("Failed to move the parameter file of '{}'", old_name))?;

        log::info!("Project '{}' renamed to '{}'.", old_name, new_name);
        self.infos.insert(id, renamed);
        if let Ok(project) = self.tree.project_mut(id) {
            project.container.display_name = new_name.to_string();
        }
        if let RenameOutcome::TargetExisted { .. } = outcome {
            self.update_project(id, false)?;
        }
        Ok(())
    }

    /// Replaces the set of startup projects. Under `CppScanHandling::OnlyStartup`, a C++
    /// project that just became a startup project is reconciled again with scanning allowed.
    pub fn set_startup_projects(&mut self, startup: &[Uuid]) {
        let mut promoted = Vec::new();
        for info in self.infos.values_mut() {
            let is_startup = startup.contains(&info.id);
            if is_startup && !info.is_startup && info.kind == CPP_PROJECT_KIND {
                promoted.push(info.id);
            }
            info.is_startup = is_startup;
        }
        for project in self.tree.projects_mut() {
            project.is_startup_project = startup.contains(&project.id);
        }
        if self.settings.cpp_project_scan_handling == CppScanHandling::OnlyStartup {
            for id in promoted {
                if let Err(e) = self.update_project(id, true) {
                    self.warn(format!("Cannot rescan startup project '{}': {}", id, e));
                }
            }
        }
        self.debouncer.trigger(Instant::now());
    }

    /// Sets the configuration, platform and launch profile used for resolution.
    pub fn set_launch_context(&mut self, context: LaunchContext) {
        self.context = context;
        self.debouncer.trigger(Instant::now());
    }

    // --- PERSISTENCE ---

    fn project_pairs(&self) -> Vec<(&Project, &ProjectInfo)> {
        self.infos
            .values()
            .filter_map(|info| self.tree.project(info.id).map(|p| (p, info)))
            .collect()
    }

    /// Writes one project to wherever the settings say it belongs, then the legacy store.
    fn persist(&mut self, id: Uuid) {
        if self.settings.vcs_support_enabled {
            let result = if self.settings.use_solution_dir {
                self.store
                    .save_solution(&self.project_pairs(), &self.settings)
            } else {
                match (self.tree.project(id), self.infos.get(&id)) {
                    (Some(project), Some(info)) => {
                        self.store.save_project(project, info, &self.settings)
                    }
                    _ => return,
                }
            };
            match result {
                Ok(outcome) => log::debug!("Saved project '{}': {:?}", id, outcome),
                Err(e) => self.warn(format!("Failed to save project '{}': {}", id, e)),
            }
        }
        self.save_legacy(&[id]);
    }

    fn save_legacy(&mut self, ids: &[Uuid]) {
        let mut snapshot = self.legacy.take().unwrap_or_default();
        for id in ids {
            if let Some(project) = self.tree.project(*id) {
                schema::record_legacy_state(&mut snapshot, project);
            }
        }
        if let Err(e) = legacy_store::save(&self.legacy_path, &snapshot) {
            self.warn(format!("Failed to write the legacy store: {}", e));
        }
        self.legacy = Some(snapshot);
    }

    /// Writes every project.
    pub fn save_all(&mut self) {
        let _timer = BlockTimer::new("save all projects");
        if self.settings.vcs_support_enabled {
            let mut failures = Vec::new();
            if self.settings.use_solution_dir {
                if let Err(e) = self
                    .store
                    .save_solution(&self.project_pairs(), &self.settings)
                {
                    failures.push(format!("Failed to save the solution file: {}", e));
                }
            } else {
                for (project, info) in self.project_pairs() {
                    if let Err(e) = self.store.save_project(project, info, &self.settings) {
                        failures.push(format!("Failed to save '{}': {}", info.name, e));
                    }
                }
            }
            for failure in failures {
                self.warn(failure);
            }
        }
        let ids = self.tree.project_ids();
        self.save_legacy(&ids);
    }

    /// Deletes the files of the storage mode that is not in use.
    pub fn cleanup_unused_files(&mut self) -> Vec<PathBuf> {
        let infos: Vec<ProjectInfo> = self.infos.values().cloned().collect();
        match self.store.delete_unused_files(&infos, &self.settings) {
            Ok(deleted) => deleted,
            Err(e) => {
                self.warn(format!("Failed to clean up unused files: {}", e));
                Vec::new()
            }
        }
    }

    /// Where the per-project file of `id` lives under the current settings.
    pub fn project_file(&self, id: Uuid) -> Option<PathBuf> {
        let info = self.infos.get(&id)?;
        Some(if self.settings.use_solution_dir {
            self.store.solution_file()
        } else {
            self.store.project_file(info, &self.settings)
        })
    }

    /// The solution file the workspace was opened for.
    pub fn solution_path(&self) -> &Path {
        self.store.solution_path()
    }

    // --- ACTIVE ITEMS ---

    /// Recomputes active items now, cancelling any pending debounced run.
    pub fn refresh_active(&mut self) {
        self.debouncer.cancel();
        resolver::resolve_tree(
            &mut self.tree,
            &self.settings.manage_flags(),
            &self.context,
            self.settings.disable_inactive_items,
        );
    }

    /// Runs the debounced refresh if its window has passed. Returns whether it ran.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.debouncer.poll(now) {
            return false;
        }
        resolver::resolve_tree(
            &mut self.tree,
            &self.settings.manage_flags(),
            &self.context,
            self.settings.disable_inactive_items,
        );
        true
    }

    /// Whether a debounced refresh is waiting to run.
    pub fn refresh_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// The composed command line of a project's active arguments.
    pub fn command_line(&self, project: Uuid) -> Result<String> {
        let project = self.project_or_err(project)?;
        Ok(composer::compose_command_line(
            project,
            &self.settings.manage_flags(),
            &self.context,
        ))
    }

    /// The composed environment of a project.
    pub fn environment(&self, project: Uuid) -> Result<IndexMap<String, String>> {
        let project = self.project_or_err(project)?;
        Ok(composer::compose_env(
            project,
            &self.settings.manage_flags(),
            &self.context,
        ))
    }

    /// Everything needed to start a project.
    pub fn launch(&self, project: Uuid) -> Result<LaunchCommand> {
        let project = self.project_or_err(project)?;
        Ok(composer::compose_launch(
            project,
            &self.settings.manage_flags(),
            &self.context,
        ))
    }

    /// The environment as a script for `shell`.
    pub fn export_env(&self, project: Uuid, shell: EnvShell) -> Result<String> {
        Ok(composer::export_env(&self.environment(project)?, shell))
    }

    // --- SELECTION ---

    /// Selects a node; without `additive` the previous selection is cleared.
    pub fn select(&mut self, id: Uuid, additive: bool) -> Result<()> {
        Ok(self.selection.select(&mut self.tree, id, additive)?)
    }

    /// Flips the selection of one node. Returns whether it is now selected.
    pub fn toggle_selection(&mut self, id: Uuid) -> Result<bool> {
        Ok(self.selection.toggle(&mut self.tree, id)?)
    }

    /// Deselects everything.
    pub fn clear_selection(&mut self) {
        self.selection.clear(&mut self.tree);
    }

    /// The node edit commands act relative to.
    pub fn focused(&self) -> Option<Uuid> {
        self.selection.focused()
    }

    /// Selected nodes, excluding project nodes and nodes whose ancestor is also selected.
    fn top_level_selection(&self) -> Vec<(Uuid, Uuid)> {
        let selected = self.selection.selected(&self.tree);
        let ids: HashSet<Uuid> = selected.iter().map(|(_, id)| *id).collect();
        selected
            .into_iter()
            .filter(|(project, id)| {
                let Some(p) = self.tree.project(*project) else {
                    return false;
                };
                if *id == p.id {
                    return false;
                }
                let mut parent = p.parent_of(*id);
                while let Some(ancestor) = parent {
                    if ancestor == p.id {
                        break;
                    }
                    if ids.contains(&ancestor) {
                        return false;
                    }
                    parent = p.parent_of(ancestor);
                }
                true
            })
            .collect()
    }

    fn selection_by_project(selection: Vec<(Uuid, Uuid)>) -> IndexMap<Uuid, Vec<Uuid>> {
        let mut grouped: IndexMap<Uuid, Vec<Uuid>> = IndexMap::new();
        for (project, id) in selection {
            grouped.entry(project).or_default().push(id);
        }
        grouped
    }

    fn insertion_point(&self) -> Result<InsertionPoint> {
        if let Some(point) = self.selection.insertion_point(&self.tree) {
            return Ok(point);
        }
        let project = self
            .tree
            .projects()
            .find(|p| p.is_startup_project)
            .or_else(|| self.tree.projects().next())
            .ok_or_else(|| anyhow!("No project is loaded"))?;
        Ok(InsertionPoint {
            project: project.id,
            parent: project.id,
            index: project.container.len(),
        })
    }

    // --- EDIT COMMANDS ---

    /// Runs one undoable change against a project. On failure the project is restored
    /// exactly as it was and no history entry is kept.
    fn edit<T>(
        &mut self,
        project: Uuid,
        change: impl FnOnce(&mut ArgTree) -> ItemResult<T>,
    ) -> Result<T> {
        let before = self.project_or_err(project)?.snapshot();
        self.history.save_state(&self.tree, project);
        match change(&mut self.tree) {
            Ok(value) => {
                self.after_change(project);
                Ok(value)
            }
            Err(e) => {
                self.history.discard_last();
                self.tree.replace_project(before);
                log::warn!("Edit of project '{}' rejected: {}", project, e);
                Err(e.into())
            }
        }
    }

    fn after_change(&mut self, project: Uuid) {
        self.selection.prune(&self.tree);
        self.debouncer.trigger(Instant::now());
        self.persist(project);
    }

    /// Adds a parameter at the focused position (or the end of the startup project).
    pub fn add_parameter(&mut self, param_type: ParamType, value: &str) -> Result<Uuid> {
        let point = self.insertion_point()?;
        let item = Parameter::new(param_type, value, true).into();
        let id = self.edit(point.project, |tree| {
            let id = tree.insert(point.project, point.parent, point.index, item)?;
            tree.project_mut(point.project)?
                .container_mut(point.parent)?
                .normalize_exclusivity();
            Ok(id)
        })?;
        self.selection.select(&mut self.tree, id, false)?;
        Ok(id)
    }

    /// Adds an empty group at the focused position.
    pub fn add_group(&mut self, name: &str) -> Result<Uuid> {
        let point = self.insertion_point()?;
        let item = Group::new(name).into();
        let id = self.edit(point.project, |tree| {
            tree.insert(point.project, point.parent, point.index, item)
        })?;
        self.selection.select(&mut self.tree, id, false)?;
        Ok(id)
    }

    /// Inserts an item at an explicit position.
    pub fn insert_item(&mut self, parent: Uuid, index: usize, item: Item) -> Result<Uuid> {
        let project = self.locate(parent)?;
        self.edit(project, |tree| tree.insert(project, parent, index, item))
    }

    /// Deletes every selected item (project nodes are skipped). Returns how many went.
    pub fn remove_selected(&mut self) -> Result<usize> {
        let grouped = Self::selection_by_project(self.top_level_selection());
        let mut removed = 0;
        for (project, ids) in grouped {
            removed += self.edit(project, |tree| {
                let p = tree.project_mut(project)?;
                for id in &ids {
                    p.remove(*id)?;
                }
                Ok(ids.len())
            })?;
        }
        Ok(removed)
    }

    /// Moves a node into `parent` at `index`.
    pub fn move_item(&mut self, id: Uuid, parent: Uuid, index: usize) -> Result<()> {
        let project = self.locate(id)?;
        if self.locate(parent)? != project {
            return Err(anyhow!("Items can only be moved within their project"));
        }
        self.edit(project, |tree| {
            let p = tree.project_mut(project)?;
            p.move_item(id, parent, index)?;
            p.container_mut(parent)?.normalize_exclusivity();
            Ok(())
        })
    }

    /// Moves the selected items one step up (`-1`) or down (`1`).
    pub fn move_selected(&mut self, direction: isize) -> Result<usize> {
        let grouped = Self::selection_by_project(self.top_level_selection());
        let mut moved = 0;
        for (project, ids) in grouped {
            let ids: HashSet<Uuid> = ids.into_iter().collect();
            moved += self.edit(project, |tree| {
                Ok(tree.project_mut(project)?.shift_items(&ids, direction))
            })?;
        }
        Ok(moved)
    }

    /// Checks every selected item, or unchecks them all if they already are.
    pub fn toggle_selected(&mut self) -> Result<bool> {
        let selected = self.selection.selected(&self.tree);
        let all_checked = selected.iter().all(|(project, id)| {
            match self.tree.project(*project).and_then(|p| p.node(*id)) {
                Some(NodeRef::Project(p)) => p.container.any_enabled(),
                Some(NodeRef::Group(g)) => g.container.any_enabled(),
                Some(NodeRef::Parameter(param)) => param.enabled,
                None => true,
            }
        });
        let enabled = !all_checked;
        for (project, ids) in Self::selection_by_project(selected) {
            self.edit(project, |tree| {
                let p = tree.project_mut(project)?;
                for id in &ids {
                    p.set_enabled(*id, enabled)?;
                }
                Ok(())
            })?;
        }
        Ok(enabled)
    }

    /// Checks or unchecks one item (a group or project applies to all its parameters).
    pub fn set_enabled(&mut self, id: Uuid, enabled: bool) -> Result<bool> {
        let project = self.locate(id)?;
        self.edit(project, |tree| tree.project_mut(project)?.set_enabled(id, enabled))
    }

    /// Copies the selected items to the clipboard.
    pub fn copy_selected(&mut self) -> usize {
        self.clipboard = self
            .top_level_selection()
            .into_iter()
            .filter_map(|(project, id)| {
                self.tree
                    .project(project)
                    .and_then(|p| p.container.find(id))
                    .map(|item| item.copy(true))
            })
            .collect();
        self.clipboard_from_cut = false;
        self.clipboard.len()
    }

    /// Copies the selected items to the clipboard and removes them.
    pub fn cut_selected(&mut self) -> Result<usize> {
        let copied = self.copy_selected();
        self.remove_selected()?;
        self.clipboard_from_cut = true;
        Ok(copied)
    }

    /// Inserts the clipboard at the focused position. Copies get fresh ids; the first paste
    /// after a cut keeps the original ones.
    pub fn paste(&mut self) -> Result<Vec<Uuid>> {
        if self.clipboard.is_empty() {
            return Ok(Vec::new());
        }
        let point = self.insertion_point()?;
        let preserve = std::mem::take(&mut self.clipboard_from_cut);
        let items: Vec<Item> = self
            .clipboard
            .iter()
            .map(|item| item.copy(preserve))
            .collect();
        self.edit(point.project, |tree| {
            let mut ids = Vec::with_capacity(items.len());
            for (offset, item) in items.into_iter().enumerate() {
                ids.push(tree.insert(point.project, point.parent, point.index + offset, item)?);
            }
            tree.project_mut(point.project)?
                .container_mut(point.parent)?
                .normalize_exclusivity();
            Ok(ids)
        })
    }

    /// Splits a command-line parameter into one sibling per shell word. The first word
    /// keeps the original id.
    pub fn split_argument(&mut self, id: Uuid) -> Result<Vec<Uuid>> {
        let project = self.locate(id)?;
        let p = self.project_or_err(project)?;
        let Some(NodeRef::Parameter(param)) = p.node(id) else {
            return Err(anyhow::Error::from(ItemError::NotAContainer { id })
                .context("Only parameters can be split"));
        };
        let param = param.clone();
        let parent = p.parent_of(id).ok_or(ItemError::StaleReference { id })?;
        let index = p
            .container(parent)?
            .position(id)
            .ok_or(ItemError::StaleReference { id })?;
        let words = shlex::split(&param.value)
            .ok_or_else(|| anyhow!("Unbalanced quotes in '{}'", param.value))?;
        if words.len() < 2 {
            return Ok(vec![id]);
        }
        self.edit(project, |tree| {
            tree.project_mut(project)?.remove(id)?;
            let mut ids = Vec::with_capacity(words.len());
            for (offset, word) in words.iter().enumerate() {
                let new_id = if offset == 0 { id } else { Uuid::new_v4() };
                let item = Parameter::with_id(
                    new_id,
                    param.param_type,
                    word.as_str(),
                    param.enabled,
                    param.default_checked,
                );
                ids.push(tree.insert(project, parent, index + offset, item.into())?);
            }
            tree.project_mut(project)?
                .container_mut(parent)?
                .normalize_exclusivity();
            Ok(ids)
        })
    }

    /// Moves the selected siblings of the first selected item into a new group placed
    /// where that item was.
    pub fn new_group_from_selection(&mut self, name: &str) -> Result<Uuid> {
        let selection = self.top_level_selection();
        let (project, first) = *selection
            .first()
            .ok_or_else(|| anyhow!("Nothing is selected"))?;
        let p = self.project_or_err(project)?;
        let parent = p
            .parent_of(first)
            .ok_or(ItemError::StaleReference { id: first })?;
        let container = p.container(parent)?;
        let index = container
            .position(first)
            .ok_or(ItemError::StaleReference { id: first })?;
        let mut members: Vec<(usize, Uuid)> = selection
            .iter()
            .filter(|(proj, _)| *proj == project)
            .filter_map(|(_, id)| container.position(*id).map(|pos| (pos, *id)))
            .collect();
        members.sort_unstable();

        let group = self.edit(project, |tree| {
            let group = tree.insert(project, parent, index, Group::new(name).into())?;
            let p = tree.project_mut(project)?;
            for (offset, (_, id)) in members.iter().enumerate() {
                p.move_item(*id, group, offset)?;
            }
            p.container_mut(group)?.expanded = true;
            Ok(group)
        })?;
        self.selection.select(&mut self.tree, group, false)?;
        Ok(group)
    }

    fn update_parameter(&mut self, id: Uuid, update: impl FnOnce(&mut Parameter)) -> Result<()> {
        let project = self.locate(id)?;
        self.edit(project, |tree| {
            let p = tree.project_mut(project)?;
            update(p.parameter_mut(id)?);
            p.push_event(TreeEvent::ItemChanged { item: id });
            Ok(())
        })
    }

    fn update_container(&mut self, id: Uuid, update: impl FnOnce(&mut Container)) -> Result<()> {
        let project = self.locate(id)?;
        self.edit(project, |tree| {
            let p = tree.project_mut(project)?;
            let container = p.container_mut(id)?;
            update(container);
            container.normalize_exclusivity();
            p.push_event(TreeEvent::ItemChanged { item: id });
            Ok(())
        })
    }

    /// Changes a parameter's value.
    pub fn set_value(&mut self, id: Uuid, value: &str) -> Result<()> {
        self.update_parameter(id, |p| p.value = value.to_string())
    }

    /// Changes what a parameter's value means.
    pub fn set_param_type(&mut self, id: Uuid, param_type: ParamType) -> Result<()> {
        self.update_parameter(id, |p| p.param_type = param_type)
    }

    /// Flips the default-checked flag of a parameter.
    pub fn toggle_default_checked(&mut self, id: Uuid) -> Result<()> {
        self.update_parameter(id, |p| p.default_checked = !p.default_checked)
    }

    /// Restores the default check state of every parameter in a project.
    pub fn reset_to_default_checked(&mut self, project: Uuid) -> Result<()> {
        self.edit(project, |tree| {
            tree.project_mut(project)?.reset_to_default_checked();
            Ok(())
        })
    }

    /// Turns exclusive mode on or off; the first enabled child stays enabled.
    pub fn set_exclusive_mode(&mut self, id: Uuid, exclusive: bool) -> Result<()> {
        self.update_container(id, |c| c.exclusive_mode = exclusive)
    }

    /// Sets the separator between a container's arguments.
    pub fn set_delimiter(&mut self, id: Uuid, delimiter: Option<String>) -> Result<()> {
        self.update_container(id, |c| c.delimiter = delimiter)
    }

    /// Sets the text put before a container's arguments.
    pub fn set_prefix(&mut self, id: Uuid, prefix: Option<String>) -> Result<()> {
        self.update_container(id, |c| c.prefix = prefix)
    }

    /// Sets the text put after a container's arguments.
    pub fn set_postfix(&mut self, id: Uuid, postfix: Option<String>) -> Result<()> {
        self.update_container(id, |c| c.postfix = postfix)
    }

    /// Restricts a container to one configuration (`None` lifts it).
    pub fn set_project_config(&mut self, id: Uuid, config: Option<String>) -> Result<()> {
        self.update_container(id, |c| c.project_config = config)
    }

    /// Restricts a container to one platform.
    pub fn set_project_platform(&mut self, id: Uuid, platform: Option<String>) -> Result<()> {
        self.update_container(id, |c| c.project_platform = platform)
    }

    /// Restricts a container to one launch profile.
    pub fn set_launch_profile(&mut self, id: Uuid, profile: Option<String>) -> Result<()> {
        self.update_container(id, |c| c.launch_profile = profile)
    }

    /// Renames a group, or the display name of a project.
    pub fn set_display_name(&mut self, id: Uuid, name: &str) -> Result<()> {
        self.update_container(id, |c| c.display_name = name.to_string())
    }

    /// Hides a project from the list without unloading it.
    pub fn set_hidden(&mut self, project: Uuid, hidden: bool) -> Result<()> {
        self.edit(project, |tree| {
            tree.project_mut(project)?.set_hidden(hidden);
            Ok(())
        })
    }

    /// Installs a runtime visibility filter on every project. Never persisted.
    pub fn set_filter(&mut self, filter: Option<Filter>) {
        for project in self.tree.projects_mut() {
            project.set_filter(filter.clone());
        }
    }

    // --- HISTORY ---

    /// Restores the previous state of the most recently changed project.
    pub fn undo(&mut self) -> Option<Uuid> {
        let project = self.history.undo(&mut self.tree)?;
        self.after_change(project);
        Some(project)
    }

    /// Re-applies the most recently undone state.
    pub fn redo(&mut self) -> Option<Uuid> {
        let project = self.history.redo(&mut self.tree)?;
        self.after_change(project);
        Some(project)
    }

    /// Starts an inline edit: one history entry covers every change until `end_edit`.
    pub fn begin_edit(&mut self, project: Uuid) -> Result<()> {
        self.project_or_err(project)?;
        self.history.save_state_and_pause(&self.tree, project);
        self.tree.set_edit_mode(true);
        Ok(())
    }

    /// Ends an inline edit started by `begin_edit`.
    pub fn end_edit(&mut self) {
        self.tree.set_edit_mode(false);
        self.history.resume();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reconcile::NoScan;
    use crate::models::ItemData;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    struct FixedScan(Vec<ItemData>);

    impl BuildConfigScanner for FixedScan {
        fn scan(&self, _project: &ProjectInfo) -> Result<Vec<ItemData>> {
            Ok(self.0.clone())
        }
    }

    fn info(dir: &Path, id: u128, name: &str) -> ProjectInfo {
        ProjectInfo {
            id: Uuid::from_u128(id),
            name: name.to_string(),
            kind: Uuid::nil(),
            dir: dir.join(name),
            unique_name: format!("{name}/{name}.proj"),
            is_startup: id == 1,
        }
    }

    fn setup(scanner: Box<dyn BuildConfigScanner>) -> (TempDir, Workspace, Uuid) {
        let dir = tempdir().unwrap();
        let mut ws = Workspace::with_settings(dir.path().join("App.sln"), Settings::default(), scanner);
        let app = info(dir.path(), 1, "App");
        let id = app.id;
        ws.load_projects(vec![app]);
        (dir, ws, id)
    }

    fn values(ws: &Workspace, project: Uuid) -> Vec<String> {
        ws.tree()
            .project(project)
            .unwrap()
            .all_parameters()
            .iter()
            .map(|p| p.value.clone())
            .collect()
    }

    #[test]
    fn test_scanned_project_is_saved_once() {
        let scan = FixedScan(vec![ItemData {
            id: Uuid::from_u128(50),
            command: "--from-build".to_string(),
            default_checked: true,
            ..Default::default()
        }]);
        let (_dir, ws, id) = setup(Box::new(scan));

        assert_eq!(values(&ws, id), vec!["--from-build"]);
        let path = ws.project_file(id).unwrap();
        assert!(path.exists());
        assert!(ws.store().is_own_write(&path));
    }

    #[test]
    fn test_edit_commands_persist_and_undo() {
        let (_dir, mut ws, id) = setup(Box::new(NoScan));
        ws.add_parameter(ParamType::CmdArg, "-a").unwrap();
        ws.add_parameter(ParamType::CmdArg, "-b").unwrap();
        assert_eq!(values(&ws, id), vec!["-a", "-b"]);
        assert_eq!(ws.command_line(id).unwrap(), "-a -b");

        let content = fs::read_to_string(ws.project_file(id).unwrap()).unwrap();
        assert!(content.contains("\"-b\""));

        assert_eq!(ws.undo(), Some(id));
        assert_eq!(values(&ws, id), vec!["-a"]);
        let content = fs::read_to_string(ws.project_file(id).unwrap()).unwrap();
        assert!(!content.contains("\"-b\""));

        assert_eq!(ws.redo(), Some(id));
        assert_eq!(values(&ws, id), vec!["-a", "-b"]);
    }

    #[test]
    fn test_rejected_edit_leaves_no_trace() {
        let (_dir, mut ws, id) = setup(Box::new(NoScan));
        let param = ws.add_parameter(ParamType::CmdArg, "-a").unwrap();
        let undo_available = ws.can_undo();

        let err = ws
            .insert_item(param, 0, Parameter::new(ParamType::CmdArg, "x", true).into())
            .unwrap_err();
        assert!(err.to_string().contains("not a container"));
        assert_eq!(values(&ws, id), vec!["-a"]);
        assert_eq!(ws.can_undo(), undo_available);
        ws.undo();
        assert!(values(&ws, id).is_empty());
    }

    #[test]
    fn test_split_and_group_from_selection() {
        let (_dir, mut ws, id) = setup(Box::new(NoScan));
        let param = ws.add_parameter(ParamType::CmdArg, "--name \"two words\" -v").unwrap();

        let ids = ws.split_argument(param).unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids.first(), Some(&param));
        assert_eq!(values(&ws, id), vec!["--name", "two words", "-v"]);

        ws.select(ids[0], false).unwrap();
        ws.select(ids[1], true).unwrap();
        let group = ws.new_group_from_selection("name").unwrap();

        let project = ws.tree().project(id).unwrap();
        assert_eq!(project.container.items().len(), 2);
        assert_eq!(project.container(group).unwrap().len(), 2);
        assert_eq!(project.container.position(group), Some(0));
    }

    #[test]
    fn test_copy_paste_freshens_and_cut_paste_keeps_ids() {
        let (_dir, mut ws, id) = setup(Box::new(NoScan));
        let a = ws.add_parameter(ParamType::CmdArg, "-a").unwrap();

        ws.select(a, false).unwrap();
        assert_eq!(ws.copy_selected(), 1);
        let pasted = ws.paste().unwrap();
        assert_eq!(pasted.len(), 1);
        assert_ne!(pasted[0], a);
        assert_eq!(values(&ws, id), vec!["-a", "-a"]);

        ws.select(a, false).unwrap();
        ws.cut_selected().unwrap();
        ws.select(id, false).unwrap();
        let pasted = ws.paste().unwrap();
        assert_eq!(pasted, vec![a]);
    }

    #[test]
    fn test_own_write_is_ignored_but_external_edit_reloads() {
        let (_dir, mut ws, id) = setup(Box::new(NoScan));
        ws.add_parameter(ParamType::CmdArg, "-a").unwrap();
        let path = ws.project_file(id).unwrap();
        let sender = ws.change_sender();

        sender.notify(SourceChange::ProjectFile {
            project: id,
            path: path.clone(),
        });
        assert_eq!(ws.process_changes(), 1);
        assert_eq!(values(&ws, id), vec!["-a"]);

        let content = fs::read_to_string(&path).unwrap().replace("\"-a\"", "\"-z\"");
        fs::write(&path, content).unwrap();
        sender.notify(SourceChange::ProjectFile { project: id, path });
        ws.process_changes();
        assert_eq!(values(&ws, id), vec!["-z"]);
    }

    #[test]
    fn test_startup_change_schedules_refresh() {
        let (dir, mut ws, app) = setup(Box::new(NoScan));
        let lib = info(dir.path(), 2, "Lib");
        ws.add_project(lib.clone()).unwrap();
        ws.refresh_active();
        assert!(!ws.refresh_pending());

        ws.set_startup_projects(&[lib.id]);
        assert!(ws.refresh_pending());
        assert!(!ws.tree().project(app).unwrap().is_startup_project);
        assert!(ws.tick(Instant::now() + ws.settings().debounce_window()));
        assert!(!ws.refresh_pending());
    }

    fn build_scan() -> Box<dyn BuildConfigScanner> {
        Box::new(FixedScan(vec![ItemData {
            id: Uuid::from_u128(50),
            command: "--from-build".to_string(),
            default_checked: true,
            ..Default::default()
        }]))
    }

    fn cpp(dir: &Path, id: u128, name: &str) -> ProjectInfo {
        ProjectInfo {
            kind: CPP_PROJECT_KIND,
            ..info(dir, id, name)
        }
    }

    fn open_with_scan_policy(dir: &Path, handling: CppScanHandling) -> Workspace {
        let settings = Settings {
            cpp_project_scan_handling: handling,
            ..Settings::default()
        };
        Workspace::with_settings(dir.join("App.sln"), settings, build_scan())
    }

    #[test]
    fn test_cpp_project_is_scanned_once_it_becomes_startup() {
        let dir = tempdir().unwrap();
        let mut ws = open_with_scan_policy(dir.path(), CppScanHandling::OnlyStartup);
        let app = cpp(dir.path(), 1, "App");
        let lib = cpp(dir.path(), 2, "Lib");
        let (app_id, lib_id) = (app.id, lib.id);
        ws.load_projects(vec![app, lib]);

        assert_eq!(values(&ws, app_id), vec!["--from-build"]);
        assert!(values(&ws, lib_id).is_empty());
        assert!(!ws.project_file(lib_id).unwrap().exists());

        ws.set_startup_projects(&[lib_id]);

        assert_eq!(values(&ws, lib_id), vec!["--from-build"]);
        assert!(ws.project_file(lib_id).unwrap().exists());
        assert_eq!(values(&ws, app_id), vec!["--from-build"]);
    }

    #[test]
    fn test_disabled_cpp_scan_still_scans_other_kinds() {
        let dir = tempdir().unwrap();
        let mut ws = open_with_scan_policy(dir.path(), CppScanHandling::None);
        let app = cpp(dir.path(), 1, "App");
        let lib = info(dir.path(), 2, "Lib");
        let (app_id, lib_id) = (app.id, lib.id);
        ws.load_projects(vec![app, lib]);

        assert!(values(&ws, app_id).is_empty());
        assert_eq!(values(&ws, lib_id), vec!["--from-build"]);

        ws.set_startup_projects(&[app_id, lib_id]);
        assert!(values(&ws, app_id).is_empty());
    }

    #[test]
    fn test_rename_moves_the_file_and_updates_the_name() {
        let (_dir, mut ws, id) = setup(Box::new(NoScan));
        ws.add_parameter(ParamType::CmdArg, "-a").unwrap();
        let old_path = ws.project_file(id).unwrap();

        ws.rename_project(id, "Engine").unwrap();

        let new_path = ws.project_file(id).unwrap();
        assert!(new_path.ends_with("Engine.args.json"));
        assert!(!old_path.exists());
        assert!(new_path.exists());
        assert_eq!(ws.project_info(id).unwrap().name, "Engine");
        assert_eq!(ws.tree().project(id).unwrap().display_name(), "Engine");
        assert_eq!(values(&ws, id), vec!["-a"]);
    }

    #[test]
    fn test_rename_onto_existing_file_reloads_it() {
        let (_dir, mut ws, id) = setup(Box::new(NoScan));
        ws.add_parameter(ParamType::CmdArg, "-a").unwrap();
        let old_path = ws.project_file(id).unwrap();
        let existing = old_path.with_file_name("Engine.args.json");
        fs::write(
            &existing,
            r#"{
                "FileVersion": 2,
                "Id": "00000000-0000-0000-0000-000000000001",
                "Items": [ { "Id": "00000000-0000-0000-0000-0000000000aa", "Command": "-b" } ]
            }"#,
        )
        .unwrap();

        ws.rename_project(id, "Engine").unwrap();

        assert!(!old_path.exists());
        assert_eq!(ws.project_file(id).unwrap(), existing);
        assert_eq!(values(&ws, id), vec!["-b"]);
    }

    #[test]
    fn test_failed_rename_changes_nothing() {
        let (_dir, mut ws, id) = setup(Box::new(NoScan));
        ws.add_parameter(ParamType::CmdArg, "-a").unwrap();
        let old_path = ws.project_file(id).unwrap();

        assert!(ws.rename_project(id, "missing/Engine").is_err());

        assert_eq!(ws.project_info(id).unwrap().name, "App");
        assert_eq!(ws.tree().project(id).unwrap().display_name(), "App");
        assert!(old_path.exists());
        assert_eq!(ws.project_file(id).unwrap(), old_path);
    }

    #[test]
    fn test_move_and_toggle_selected() {
        let (_dir, mut ws, id) = setup(Box::new(NoScan));
        let a = ws.add_parameter(ParamType::CmdArg, "-a").unwrap();
        let b = ws.add_parameter(ParamType::CmdArg, "-b").unwrap();
        let c = ws.add_parameter(ParamType::CmdArg, "-c").unwrap();

        ws.select(c, false).unwrap();
        assert_eq!(ws.move_selected(-1).unwrap(), 1);
        assert_eq!(values(&ws, id), vec!["-a", "-c", "-b"]);

        ws.select(a, false).unwrap();
        ws.select(b, true).unwrap();
        assert!(!ws.toggle_selected().unwrap());
        assert_eq!(ws.command_line(id).unwrap(), "-c");
        assert!(ws.toggle_selected().unwrap());
        assert_eq!(ws.command_line(id).unwrap(), "-a -c -b");
    }

    #[test]
    fn test_inline_edit_is_one_undo_step() {
        let (_dir, mut ws, id) = setup(Box::new(NoScan));
        let a = ws.add_parameter(ParamType::CmdArg, "-a").unwrap();

        ws.begin_edit(id).unwrap();
        ws.set_value(a, "-b").unwrap();
        ws.set_value(a, "-c").unwrap();
        assert_eq!(ws.undo(), None);
        assert_eq!(values(&ws, id), vec!["-c"]);

        ws.end_edit();
        assert_eq!(ws.undo(), Some(id));
        assert_eq!(values(&ws, id), vec!["-a"]);
    }

    #[test]
    fn test_storage_switch_round_trip() {
        let (_dir, mut ws, id) = setup(Box::new(NoScan));
        ws.add_parameter(ParamType::CmdArg, "-a").unwrap();
        let project_path = ws.project_file(id).unwrap();
        let solution_path = ws.store().solution_file();

        ws.apply_settings(Settings {
            use_solution_dir: true,
            ..Settings::default()
        });
        assert!(solution_path.exists());
        assert!(!project_path.exists());
        assert_eq!(values(&ws, id), vec!["-a"]);

        ws.apply_settings(Settings::default());
        assert!(project_path.exists());
        assert!(!solution_path.exists());
        assert_eq!(values(&ws, id), vec!["-a"]);
    }
}
