// src/core/selection.rs

//! Focus tracking and where edit commands insert new items.

use crate::core::item::{ItemError, ItemResult, NodeRef};
use crate::core::tree::ArgTree;
use uuid::Uuid;

/// Where a newly created item goes: container id plus index inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertionPoint {
    /// Project that will own the item.
    pub project: Uuid,
    /// Container the item goes into.
    pub parent: Uuid,
    /// Position among the container's children.
    pub index: usize,
}

/// Tracks the focused node. Selection flags themselves live on the nodes, so removing a
/// node can never leave a dangling entry in the selected set.
#[derive(Debug, Default, Clone)]
pub struct SelectionTracker {
    focused: Option<Uuid>,
}

impl SelectionTracker {
    /// A tracker with no focus.
    pub fn new() -> Self {
        Self::default()
    }

    /// The node edit commands act relative to.
    pub fn focused(&self) -> Option<Uuid> {
        self.focused
    }

    /// Selects a node and focuses it. Without `additive` every other selection is cleared.
    pub fn select(&mut self, tree: &mut ArgTree, id: Uuid, additive: bool) -> ItemResult<()> {
        let project = tree.locate(id).ok_or(ItemError::StaleReference { id })?;
        if !additive {
            for p in tree.projects_mut() {
                p.clear_selection();
            }
        }
        tree.project_mut(project)?.set_selected(id, true)?;
        self.focused = Some(id);
        Ok(())
    }

    /// Flips the selection flag of a node, focusing it when it becomes selected.
    pub fn toggle(&mut self, tree: &mut ArgTree, id: Uuid) -> ItemResult<bool> {
        let project = tree.locate(id).ok_or(ItemError::StaleReference { id })?;
        let p = tree.project_mut(project)?;
        let selected = match p.node(id) {
            Some(NodeRef::Project(p)) => p.selected,
            Some(NodeRef::Group(g)) => g.selected,
            Some(NodeRef::Parameter(param)) => param.selected,
            None => return Err(ItemError::StaleReference { id }),
        };
        p.set_selected(id, !selected)?;
        if !selected {
            self.focused = Some(id);
        }
        Ok(!selected)
    }

    /// Clears every selection flag and the focus.
    pub fn clear(&mut self, tree: &mut ArgTree) {
        for project in tree.projects_mut() {
            project.clear_selection();
        }
        self.focused = None;
    }

    /// Every selected node as `(project, node)`, in project order then pre-order.
    pub fn selected(&self, tree: &ArgTree) -> Vec<(Uuid, Uuid)> {
        tree.projects()
            .flat_map(|p| p.selected_ids().into_iter().map(move |id| (p.id, id)))
            .collect()
    }

    /// Drops the focus if its node has disappeared.
    pub fn prune(&mut self, tree: &ArgTree) {
        if let Some(id) = self.focused
            && tree.locate(id).is_none()
        {
            log::debug!("Dropping focus on removed item '{}'.", id);
            self.focused = None;
        }
    }

    /// The anchor for insert-at-position commands: inside a focused container (at its end),
    /// or right after a focused parameter in its parent.
    pub fn insertion_point(&self, tree: &ArgTree) -> Option<InsertionPoint> {
        let id = self.focused?;
        let project_id = tree.locate(id)?;
        let project = tree.project(project_id)?;
        match project.node(id)? {
            NodeRef::Project(p) => Some(InsertionPoint {
                project: project_id,
                parent: p.id,
                index: p.container.len(),
            }),
            NodeRef::Group(g) => Some(InsertionPoint {
                project: project_id,
                parent: g.id,
                index: g.container.len(),
            }),
            NodeRef::Parameter(_) => {
                let parent = project.parent_of(id)?;
                let index = project.container(parent).ok()?.position(id)? + 1;
                Some(InsertionPoint {
                    project: project_id,
                    parent,
                    index,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::{Group, Parameter, Project};
    use crate::models::ParamType;

    fn tree_with_group() -> (ArgTree, Uuid, Uuid, Uuid) {
        let mut project = Project::new(Uuid::new_v4(), Uuid::nil(), "App");
        let param = Parameter::new(ParamType::CmdArg, "-v", true);
        let mut group = Group::new("grp");
        group.container.push(Parameter::new(ParamType::CmdArg, "-x", true));
        let (pid, param_id, group_id) = (project.id, param.id, group.id);
        project.container.push(param);
        project.container.push(group);
        let mut tree = ArgTree::new();
        tree.replace_project(project);
        (tree, pid, param_id, group_id)
    }

    #[test]
    fn test_select_replaces_unless_additive() {
        let (mut tree, pid, param_id, group_id) = tree_with_group();
        let mut tracker = SelectionTracker::new();

        tracker.select(&mut tree, param_id, false).unwrap();
        tracker.select(&mut tree, group_id, true).unwrap();
        assert_eq!(tracker.selected(&tree), vec![(pid, param_id), (pid, group_id)]);

        tracker.select(&mut tree, pid, false).unwrap();
        assert_eq!(tracker.selected(&tree), vec![(pid, pid)]);
        assert_eq!(tracker.focused(), Some(pid));
    }

    #[test]
    fn test_insertion_point_follows_focus() {
        let (mut tree, pid, param_id, group_id) = tree_with_group();
        let mut tracker = SelectionTracker::new();

        tracker.select(&mut tree, param_id, false).unwrap();
        let point = tracker.insertion_point(&tree).unwrap();
        assert_eq!((point.parent, point.index), (pid, 1));

        tracker.select(&mut tree, group_id, false).unwrap();
        let point = tracker.insertion_point(&tree).unwrap();
        assert_eq!((point.parent, point.index), (group_id, 1));
    }

    #[test]
    fn test_prune_drops_removed_focus() {
        let (mut tree, _, param_id, _) = tree_with_group();
        let mut tracker = SelectionTracker::new();
        tracker.select(&mut tree, param_id, false).unwrap();

        tree.remove(param_id).unwrap();
        tracker.prune(&tree);

        assert_eq!(tracker.focused(), None);
        assert!(tracker.selected(&tree).is_empty());
    }
}
