// src/core/tree.rs

//! The live parameter tree shared by every engine operation.
//!
//! Projects are swapped in and out whole; change events raised inside a project are
//! collected here so observers can drain them after each command.

use crate::core::item::{Item, ItemError, ItemResult, Project, ProjectEvent, TreeEvent};
use indexmap::IndexMap;
use std::collections::HashSet;
use uuid::Uuid;

/// The live tree: every loaded project, keyed by id, in load order.
///
/// This is the explicit session handle passed to every engine operation. It is owned by the
/// single logical thread that mutates it; nothing in here locks.
#[derive(Debug, Default)]
pub struct ArgTree {
    projects: IndexMap<Uuid, Project>,
    edit_mode: bool,
    detached_events: Vec<ProjectEvent>,
}

impl ArgTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// The project with this id, if loaded.
    pub fn project(&self, id: Uuid) -> Option<&Project> {
        self.projects.get(&id)
    }

    /// Like `project`, but a missing project is an error.
    pub fn project_mut(&mut self, id: Uuid) -> ItemResult<&mut Project> {
        self.projects
            .get_mut(&id)
            .ok_or(ItemError::MissingProject { id })
    }

    /// Every project in load order.
    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    /// Every project in load order, mutably.
    pub fn projects_mut(&mut self) -> impl Iterator<Item = &mut Project> {
        self.projects.values_mut()
    }

    /// Ids of every loaded project.
    pub fn project_ids(&self) -> Vec<Uuid> {
        self.projects.keys().copied().collect()
    }

    /// Whether no project is loaded.
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Swaps in a whole project subtree at once. Observers see either the previous tree or
    /// this one; pending events of the previous tree are carried over before the swap.
    pub fn replace_project(&mut self, mut project: Project) -> Option<Project> {
        let id = project.id;
        project.push_event(TreeEvent::ProjectReplaced);
        let mut previous = self.projects.insert(id, project);
        if let Some(old) = previous.as_mut() {
            self.detached_events.extend(
                old.drain_events()
                    .into_iter()
                    .map(|event| ProjectEvent { project: id, event }),
            );
        }
        previous
    }

    /// Unloads a project and discards its subtree.
    pub fn remove_project(&mut self, id: Uuid) -> Option<Project> {
        let removed = self.projects.shift_remove(&id);
        if removed.is_none() {
            log::warn!("Ignoring removal of unknown project '{}'.", id);
        }
        removed
    }

    /// The project owning `id` (a project id resolves to itself).
    pub fn locate(&self, id: Uuid) -> Option<Uuid> {
        self.projects
            .values()
            .find(|p| p.node(id).is_some())
            .map(|p| p.id)
    }

    fn ids_outside(&self, project: Uuid) -> HashSet<Uuid> {
        self.projects
            .values()
            .filter(|p| p.id != project)
            .flat_map(Project::ids)
            .collect()
    }

    /// Inserts an item, keeping ids unique across the whole tree.
    pub fn insert(
        &mut self,
        project: Uuid,
        parent: Uuid,
        index: usize,
        item: Item,
    ) -> ItemResult<Uuid> {
        let taken = self.ids_outside(project);
        self.project_mut(project)?.insert(parent, index, item, &taken)
    }

    /// Removes an item wherever it lives.
    pub fn remove(&mut self, id: Uuid) -> ItemResult<Item> {
        let project = self.locate(id).ok_or(ItemError::StaleReference { id })?;
        self.project_mut(project)?.remove(id)
    }

    /// Whether an inline edit is in progress. Undo and redo wait for it to end.
    pub fn is_edit_mode(&self) -> bool {
        self.edit_mode
    }

    /// Enters or leaves the transient edit mode (inline rename in progress).
    pub fn set_edit_mode(&mut self, edit_mode: bool) {
        self.edit_mode = edit_mode;
    }

    /// Collects every event raised since the last call, per project in load order.
    pub fn drain_events(&mut self) -> Vec<ProjectEvent> {
        let mut events = std::mem::take(&mut self.detached_events);
        for project in self.projects.values_mut() {
            let id = project.id;
            events.extend(
                project
                    .drain_events()
                    .into_iter()
                    .map(|event| ProjectEvent { project: id, event }),
            );
        }
        events
    }
}
