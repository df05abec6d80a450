// src/core/history.rs

//! Undo/redo over project subtrees.
//!
//! Each entry is an immutable `Arc<Project>` tagged with a monotonically increasing version.
//! Restoring an entry swaps it into the tree and pushes the replaced subtree onto the
//! opposite stack, so the live tree and the history never alias each other.

use crate::constants::DEFAULT_HISTORY_LIMIT;
use crate::core::item::Project;
use crate::core::tree::ArgTree;
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Snapshot {
    version: u64,
    project: Arc<Project>,
}

/// Undo and redo stacks of project snapshots.
#[derive(Debug)]
pub struct History {
    undo: VecDeque<Snapshot>,
    redo: Vec<Snapshot>,
    next_version: u64,
    limit: usize,
    paused: bool,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl History {
    /// Keeps at most `limit` undo states (at least one).
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            next_version: 0,
            limit: limit.max(1),
            paused: false,
        }
    }

    fn capture(&mut self, project: &Project) -> Snapshot {
        self.next_version += 1;
        Snapshot {
            version: self.next_version,
            project: Arc::new(project.snapshot()),
        }
    }

    /// Records the current state of `project` before a mutation. Ignored while paused.
    pub fn save_state(&mut self, tree: &ArgTree, project: Uuid) {
        if self.paused {
            return;
        }
        let Some(current) = tree.project(project) else {
            log::warn!("Not saving history for unknown project '{}'.", project);
            return;
        };
        let snapshot = self.capture(current);
        log::debug!(
            "History: saved v{} of project '{}'.",
            snapshot.version,
            project
        );
        self.undo.push_back(snapshot);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
        self.redo.clear();
    }

    /// Records one state, then suppresses further saves until `resume`, so a batch of
    /// changes is undone as a unit.
    pub fn save_state_and_pause(&mut self, tree: &ArgTree, project: Uuid) {
        self.save_state(tree, project);
        self.paused = true;
    }

    /// Changes how many undo states are kept, dropping the oldest if needed.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
    }

    /// Drops the most recent undo entry (its mutation was rejected).
    pub fn discard_last(&mut self) {
        if !self.paused {
            self.undo.pop_back();
        }
    }

    /// Ends a batch started by `save_state_and_pause`.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Whether there is a state to go back to.
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Whether an undone state can be re-applied.
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Drops every entry for a project (unloaded or replaced by an external source).
    pub fn forget(&mut self, project: Uuid) {
        self.undo.retain(|s| s.project.id != project);
        self.redo.retain(|s| s.project.id != project);
    }

    /// Restores the most recent saved state. Returns the affected project id, or `None`
    /// when there is nothing to undo or the tree is in edit mode.
    pub fn undo(&mut self, tree: &mut ArgTree) -> Option<Uuid> {
        if tree.is_edit_mode() {
            log::debug!("Undo ignored while an edit is in progress.");
            return None;
        }
        let snapshot = self.undo.pop_back()?;
        let current = self.restore(tree, &snapshot)?;
        self.redo.push(current);
        Some(snapshot.project.id)
    }

    /// Re-applies the most recently undone state.
    pub fn redo(&mut self, tree: &mut ArgTree) -> Option<Uuid> {
        if tree.is_edit_mode() {
            log::debug!("Redo ignored while an edit is in progress.");
            return None;
        }
        let snapshot = self.redo.pop()?;
        let current = self.restore(tree, &snapshot)?;
        self.undo.push_back(current);
        Some(snapshot.project.id)
    }

    /// Swaps `snapshot` into the tree and returns a snapshot of what it replaced.
    fn restore(&mut self, tree: &mut ArgTree, snapshot: &Snapshot) -> Option<Snapshot> {
        let id = snapshot.project.id;
        let Some(current) = tree.project(id) else {
            log::warn!("Cannot restore history of unloaded project '{}'.", id);
            return None;
        };
        let replaced = self.capture(current);
        let mut restored = (*snapshot.project).clone();
        // Load-time facts are not part of the edit history.
        restored.is_startup_project = current.is_startup_project;
        restored.kind = current.kind;
        log::debug!(
            "History: restoring v{} of project '{}'.",
            snapshot.version,
            id
        );
        tree.replace_project(restored);
        Some(replaced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::{Parameter, TreeEvent};
    use crate::models::ParamType;

    fn setup() -> (ArgTree, Uuid) {
        let mut tree = ArgTree::new();
        let project = Project::new(Uuid::new_v4(), Uuid::nil(), "App");
        let id = project.id;
        tree.replace_project(project);
        tree.drain_events();
        (tree, id)
    }

    fn add(tree: &mut ArgTree, project: Uuid, value: &str) {
        tree.insert(project, project, usize::MAX, Parameter::new(ParamType::CmdArg, value, true).into())
            .unwrap();
    }

    fn values(tree: &ArgTree, project: Uuid) -> Vec<String> {
        tree.project(project)
            .unwrap()
            .all_parameters()
            .iter()
            .map(|p| p.value.clone())
            .collect()
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let (mut tree, id) = setup();
        let mut history = History::default();

        history.save_state(&tree, id);
        add(&mut tree, id, "a");
        history.save_state(&tree, id);
        add(&mut tree, id, "b");

        assert_eq!(history.undo(&mut tree), Some(id));
        assert_eq!(values(&tree, id), vec!["a"]);
        assert_eq!(history.undo(&mut tree), Some(id));
        assert!(values(&tree, id).is_empty());
        assert_eq!(history.undo(&mut tree), None);

        assert_eq!(history.redo(&mut tree), Some(id));
        assert_eq!(values(&tree, id), vec!["a"]);
        assert!(
            tree.drain_events()
                .iter()
                .any(|e| e.event == TreeEvent::ProjectReplaced)
        );
    }

    #[test]
    fn test_paused_batch_is_one_step() {
        let (mut tree, id) = setup();
        let mut history = History::default();

        history.save_state_and_pause(&tree, id);
        add(&mut tree, id, "a");
        history.save_state(&tree, id);
        add(&mut tree, id, "b");
        history.resume();

        history.undo(&mut tree);
        assert!(values(&tree, id).is_empty());
        assert!(!history.can_undo());
    }

    #[test]
    fn test_edit_mode_blocks_undo() {
        let (mut tree, id) = setup();
        let mut history = History::default();
        history.save_state(&tree, id);
        add(&mut tree, id, "a");

        tree.set_edit_mode(true);
        assert_eq!(history.undo(&mut tree), None);
        assert_eq!(values(&tree, id), vec!["a"]);
        assert!(history.can_undo());
    }

    #[test]
    fn test_new_save_clears_redo_and_limit_applies() {
        let (mut tree, id) = setup();
        let mut history = History::new(2);
        for value in ["a", "b", "c"] {
            history.save_state(&tree, id);
            add(&mut tree, id, value);
        }
        assert_eq!(history.undo.len(), 2);

        history.undo(&mut tree);
        assert!(history.can_redo());
        history.save_state(&tree, id);
        assert!(!history.can_redo());
    }
}
