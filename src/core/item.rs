// src/core/item.rs

//! # Item Model
//!
//! The tree of launch parameters. A `Project` is the root of one project's subtree and owns
//! a `Container`; a `Group` owns a `Container` as well; a `Parameter` is a leaf. Children of a
//! container are an ordered `Vec<Item>`, so every node has exactly one owner and the tree can
//! never contain a cycle or a shared node.
//!
//! Nodes never point at their parent. Every mutation goes through the owning `Project`, which
//! records a `TreeEvent` for it; the project is the single place where the rest of the system
//! observes structural changes.

use crate::models::ParamType;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by structural operations on the item tree.
///
/// Every operation that returns one of these has left the tree untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    /// Projects are never duplicated; they are only re-created by reconciliation.
    #[error("Project '{id}' cannot be copied.")]
    ProjectCopy {
        /// The project that was asked to copy itself.
        id: Uuid,
    },
    /// The project node itself cannot be removed or moved inside its own tree.
    #[error("Project '{id}' cannot be removed or moved as an item.")]
    ProjectNotMovable {
        /// The project id.
        id: Uuid,
    },
    /// The operation referenced a project that is not loaded.
    #[error("Project '{id}' is not loaded.")]
    MissingProject {
        /// The unknown project id.
        id: Uuid,
    },
    /// The referenced item is not (or no longer) part of this tree.
    #[error("Item '{id}' is no longer part of the tree.")]
    StaleReference {
        /// The id that could not be found.
        id: Uuid,
    },
    /// An insertion targeted a parameter instead of a container.
    #[error("Item '{id}' is not a container.")]
    NotAContainer {
        /// The id of the parameter used as a target.
        id: Uuid,
    },
    /// A move would place a group inside its own subtree.
    #[error("Moving '{id}' into its own subtree would create a cycle.")]
    CircularMove {
        /// The group being moved.
        id: Uuid,
    },
}

/// Result alias for item-model operations.
pub type ItemResult<T> = Result<T, ItemError>;

/// A runtime visibility predicate attached to a project. Never persisted.
pub type Filter = Arc<dyn Fn(&Item) -> bool + Send + Sync>;

// --- EVENTS ---

/// A structural change observed at a project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    /// `item` was inserted into the container `parent`.
    ItemAdded { item: Uuid, parent: Uuid },
    /// `item` was removed from the container `parent`.
    ItemRemoved { item: Uuid, parent: Uuid },
    /// A value, type or check state of `item` changed.
    ItemChanged { item: Uuid },
    /// The selection flag of `item` changed.
    SelectionChanged { item: Uuid, selected: bool },
    /// The project's hidden flag changed.
    HiddenChanged { old: bool, new: bool },
    /// The whole subtree was swapped (reconciliation, undo, redo).
    ProjectReplaced,
}

/// A `TreeEvent` tagged with the project it bubbled up to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectEvent {
    /// The project the event was raised in.
    pub project: Uuid,
    /// What happened.
    pub event: TreeEvent,
}

// --- NODES ---

/// A leaf node: one argument, environment variable, working directory or launch target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Stable identity; survives saves, moves and cut/paste.
    pub id: Uuid,
    /// What the value means when the launch is composed.
    pub param_type: ParamType,
    /// Argument text, `NAME=VALUE`, a directory or an executable path.
    pub value: String,
    /// The user's checkbox.
    pub enabled: bool,
    /// Checked whenever the item is first created from a scan.
    pub default_checked: bool,
    /// Derived by the resolver; never persisted.
    pub is_active: bool,
    /// Part of the current selection.
    pub selected: bool,
}

impl Parameter {
    /// A new parameter with a freshly generated id.
    pub fn new(param_type: ParamType, value: impl Into<String>, enabled: bool) -> Self {
        Self::with_id(Uuid::new_v4(), param_type, value, enabled, false)
    }

    /// A parameter with an explicit id, as read from a persisted snapshot.
    pub fn with_id(
        id: Uuid,
        param_type: ParamType,
        value: impl Into<String>,
        enabled: bool,
        default_checked: bool,
    ) -> Self {
        Self {
            id,
            param_type,
            value: value.into(),
            enabled,
            default_checked,
            is_active: false,
            selected: false,
        }
    }
}

/// Ordered children plus the attributes shared by groups and projects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    /// Group name, or the project name for a project root.
    pub display_name: String,
    items: Vec<Item>,
    /// Shown expanded in the UI.
    pub expanded: bool,
    /// At most one enabled child at a time.
    pub exclusive_mode: bool,
    /// Joins the children's arguments; a single space when unset.
    pub delimiter: Option<String>,
    /// Text put before the joined children.
    pub prefix: Option<String>,
    /// Text put after the joined children.
    pub postfix: Option<String>,
    /// Only active under this configuration (case-insensitive).
    pub project_config: Option<String>,
    /// Only active under this platform.
    pub project_platform: Option<String>,
    /// Only active under this launch profile.
    pub launch_profile: Option<String>,
}

/// A named, nestable container of items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Stable identity.
    pub id: Uuid,
    /// Part of the current selection.
    pub selected: bool,
    /// Name, children and overrides.
    pub container: Container,
}

impl Group {
    /// A new empty group with a freshly generated id.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), display_name)
    }

    /// An empty group with an explicit id.
    pub fn with_id(id: Uuid, display_name: impl Into<String>) -> Self {
        Self {
            id,
            selected: false,
            container: Container::new(display_name),
        }
    }
}

/// A child of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// A leaf.
    Parameter(Parameter),
    /// A nested container.
    Group(Group),
}

impl From<Parameter> for Item {
    fn from(value: Parameter) -> Self {
        Self::Parameter(value)
    }
}

impl From<Group> for Item {
    fn from(value: Group) -> Self {
        Self::Group(value)
    }
}

impl Item {
    /// The persistent identity of this node.
    pub fn id(&self) -> Uuid {
        match self {
            Self::Parameter(p) => p.id,
            Self::Group(g) => g.id,
        }
    }

    /// Whether the node is currently selected.
    pub fn is_selected(&self) -> bool {
        match self {
            Self::Parameter(p) => p.selected,
            Self::Group(g) => g.selected,
        }
    }

    fn set_selected(&mut self, selected: bool) {
        match self {
            Self::Parameter(p) => p.selected = selected,
            Self::Group(g) => g.selected = selected,
        }
    }

    /// A parameter is checked when enabled; a group when any descendant parameter is.
    pub fn is_checked(&self) -> bool {
        match self {
            Self::Parameter(p) => p.enabled,
            Self::Group(g) => g.container.any_enabled(),
        }
    }

    /// Deep clone. Every node gets a fresh id unless `preserve_ids` is set.
    pub fn copy(&self, preserve_ids: bool) -> Self {
        let mut copy = self.clone();
        if !preserve_ids {
            copy.visit_mut(&mut |item| match item {
                Self::Parameter(p) => p.id = Uuid::new_v4(),
                Self::Group(g) => g.id = Uuid::new_v4(),
            });
        }
        copy
    }

    /// Pre-order visit of this node and all its descendants.
    pub fn visit(&self, visitor: &mut dyn FnMut(&Self)) {
        visitor(self);
        if let Self::Group(g) = self {
            for child in &g.container.items {
                child.visit(visitor);
            }
        }
    }

    /// Pre-order mutable visit of this node and all its descendants.
    pub fn visit_mut(&mut self, visitor: &mut dyn FnMut(&mut Self)) {
        visitor(self);
        if let Self::Group(g) = self {
            for child in &mut g.container.items {
                child.visit_mut(visitor);
            }
        }
    }

    /// Ids of this node and all its descendants.
    pub fn ids(&self) -> Vec<Uuid> {
        let mut ids = Vec::new();
        self.visit(&mut |item| ids.push(item.id()));
        ids
    }

    fn set_all_enabled(&mut self, enabled: bool) {
        match self {
            Self::Parameter(p) => p.enabled = enabled,
            Self::Group(g) => g.container.set_all_enabled(enabled),
        }
    }
}

/// Reassigns a fresh id to every node of `item` whose id is already in `taken`, then records
/// all of the item's ids in `taken`. Returns the number of reassigned nodes.
pub fn freshen_collisions(item: &mut Item, taken: &mut HashSet<Uuid>) -> usize {
    let mut reassigned = 0;
    item.visit_mut(&mut |node| {
        let id = node.id();
        if taken.insert(id) {
            return;
        }
        let mut fresh = Uuid::new_v4();
        while !taken.insert(fresh) {
            fresh = Uuid::new_v4();
        }
        log::warn!("Identity collision on '{}'; reassigned to '{}'.", id, fresh);
        match node {
            Item::Parameter(p) => p.id = fresh,
            Item::Group(g) => g.id = fresh,
        }
        reassigned += 1;
    });
    reassigned
}

/// Options for `Container::flatten`.
#[derive(Clone, Default)]
pub struct FlattenOptions<'a> {
    /// Only direct children, no descent into groups.
    pub direct_only: bool,
    /// Only items accepted by the predicate (a group is kept if it or a descendant matches).
    pub filter: Option<&'a Filter>,
}

impl fmt::Debug for FlattenOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlattenOptions")
            .field("direct_only", &self.direct_only)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

impl Container {
    /// An empty container.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            ..Default::default()
        }
    }

    /// The ordered direct children.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the container has no children.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Appends a child at the end.
    pub fn push(&mut self, item: impl Into<Item>) {
        self.items.push(item.into());
    }

    /// Inserts a direct child; an index past the end appends.
    pub fn insert(&mut self, index: usize, item: impl Into<Item>) {
        let index = index.min(self.items.len());
        self.items.insert(index, item.into());
    }

    /// Replaces all children at once.
    pub fn replace_items(&mut self, items: Vec<Item>) {
        self.items = items;
    }

    /// Position of a direct child.
    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.items.iter().position(|i| i.id() == id)
    }

    /// Finds a descendant by id.
    pub fn find(&self, id: Uuid) -> Option<&Item> {
        for item in &self.items {
            if item.id() == id {
                return Some(item);
            }
            if let Item::Group(g) = item
                && let Some(found) = g.container.find(id)
            {
                return Some(found);
            }
        }
        None
    }

    /// Finds a descendant by id, mutably.
    pub fn find_mut(&mut self, id: Uuid) -> Option<&mut Item> {
        for item in &mut self.items {
            if item.id() == id {
                return Some(item);
            }
            if let Item::Group(g) = item
                && let Some(found) = g.container.find_mut(id)
            {
                return Some(found);
            }
        }
        None
    }

    /// Whether `id` is anywhere below this container.
    pub fn contains(&self, id: Uuid) -> bool {
        self.find(id).is_some()
    }

    /// The id of the group that directly owns `id`, or `None` if this container owns it
    /// directly or does not contain it at all.
    fn owning_group(&self, id: Uuid) -> Option<Option<Uuid>> {
        if self.position(id).is_some() {
            return Some(None);
        }
        self.items.iter().find_map(|item| match item {
            Item::Group(g) => g
                .container
                .owning_group(id)
                .map(|owner| owner.or(Some(g.id))),
            Item::Parameter(_) => None,
        })
    }

    /// Removes a descendant wherever it lives.
    pub fn remove(&mut self, id: Uuid) -> Option<Item> {
        if let Some(index) = self.position(id) {
            return Some(self.items.remove(index));
        }
        self.items.iter_mut().find_map(|item| match item {
            Item::Group(g) => g.container.remove(id),
            Item::Parameter(_) => None,
        })
    }

    /// Pre-order flattening of the subtree.
    pub fn flatten(&self, options: &FlattenOptions<'_>) -> Vec<&Item> {
        let mut out = Vec::new();
        self.flatten_into(options, &mut out);
        out
    }

    fn flatten_into<'a>(&'a self, options: &FlattenOptions<'_>, out: &mut Vec<&'a Item>) {
        for item in &self.items {
            match (item, options.direct_only) {
                (Item::Group(g), false) => {
                    let mut below = Vec::new();
                    g.container.flatten_into(options, &mut below);
                    let keep = options.filter.is_none_or(|f| f(item)) || !below.is_empty();
                    if keep {
                        out.push(item);
                        out.extend(below);
                    }
                }
                _ => {
                    if options.filter.is_none_or(|f| f(item)) {
                        out.push(item);
                    }
                }
            }
        }
    }

    /// Every parameter below this container, in tree order.
    pub fn all_parameters(&self) -> Vec<&Parameter> {
        self.flatten(&FlattenOptions::default())
            .into_iter()
            .filter_map(|item| match item {
                Item::Parameter(p) => Some(p),
                Item::Group(_) => None,
            })
            .collect()
    }

    /// Visits every node below this container mutably, in pre-order.
    pub fn visit_mut(&mut self, visitor: &mut dyn FnMut(&mut Item)) {
        for item in &mut self.items {
            item.visit_mut(visitor);
        }
    }

    /// Ids of every node below this container.
    pub fn ids(&self) -> Vec<Uuid> {
        self.items.iter().flat_map(Item::ids).collect()
    }

    /// Whether any parameter below is enabled.
    pub fn any_enabled(&self) -> bool {
        self.items.iter().any(Item::is_checked)
    }

    /// Checks or unchecks everything below. An exclusive container only checks its first child.
    pub fn set_all_enabled(&mut self, enabled: bool) {
        let exclusive = self.exclusive_mode;
        for (index, item) in self.items.iter_mut().enumerate() {
            item.set_all_enabled(enabled && (!exclusive || index == 0));
        }
    }

    /// Sets the check state of a parameter or group below this container.
    ///
    /// Checking an item inside an exclusive container unchecks all of its siblings; this is
    /// applied at every level on the way up. Returns `None` if `id` is not below.
    pub fn set_enabled(&mut self, id: Uuid, enabled: bool) -> Option<bool> {
        let mut hit = None;
        for (index, item) in self.items.iter_mut().enumerate() {
            if item.id() == id {
                let changed = item.is_checked() != enabled;
                item.set_all_enabled(enabled);
                hit = Some((index, changed));
                break;
            }
            if let Item::Group(g) = item
                && let Some(changed) = g.container.set_enabled(id, enabled)
            {
                hit = Some((index, changed));
                break;
            }
        }
        let (index, changed) = hit?;
        if enabled && self.exclusive_mode {
            self.uncheck_all_except(index);
        }
        Some(changed)
    }

    fn uncheck_all_except(&mut self, keep: usize) {
        for (index, item) in self.items.iter_mut().enumerate() {
            if index != keep {
                item.set_all_enabled(false);
            }
        }
    }

    /// Restores the exclusivity invariant everywhere below: in an exclusive container only the
    /// first checked child stays checked.
    pub fn normalize_exclusivity(&mut self) {
        for item in &mut self.items {
            if let Item::Group(g) = item {
                g.container.normalize_exclusivity();
            }
        }
        if self.exclusive_mode
            && let Some(first) = self.items.iter().position(Item::is_checked)
        {
            self.uncheck_all_except(first);
        }
    }

    /// Moves every item in `ids` one step up (`direction < 0`) or down, within its own
    /// container. An item never jumps over another moved item or past the edges.
    pub fn shift_items(&mut self, ids: &HashSet<Uuid>, direction: isize) -> usize {
        let mut moved = 0;
        let len = self.items.len();
        let is_moving = |items: &[Item], i: usize| items.get(i).is_some_and(|it| ids.contains(&it.id()));
        if direction < 0 {
            for i in 1..len {
                if is_moving(&self.items, i) && !is_moving(&self.items, i - 1) {
                    self.items.swap(i, i - 1);
                    moved += 1;
                }
            }
        } else if direction > 0 {
            for i in (0..len.saturating_sub(1)).rev() {
                if is_moving(&self.items, i) && !is_moving(&self.items, i + 1) {
                    self.items.swap(i, i + 1);
                    moved += 1;
                }
            }
        }
        for item in &mut self.items {
            if let Item::Group(g) = item {
                moved += g.container.shift_items(ids, direction);
            }
        }
        moved
    }

    /// Whether this container carries any non-default attribute.
    fn has_attributes(&self) -> bool {
        self.exclusive_mode
            || [
                &self.delimiter,
                &self.prefix,
                &self.postfix,
                &self.project_config,
                &self.project_platform,
                &self.launch_profile,
            ]
            .iter()
            .any(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
    }
}

// --- PROJECT ---

/// The root of one project's subtree.
#[derive(Clone)]
pub struct Project {
    /// Same id as the host's project.
    pub id: Uuid,
    /// Project-system kind.
    pub kind: Uuid,
    /// Part of the current selection.
    pub selected: bool,
    /// Mirrors the host's startup-project set.
    pub is_startup_project: bool,
    /// Children and the project-level overrides.
    pub container: Container,
    hidden_in_list: bool,
    filter: Option<Filter>,
    events: Vec<TreeEvent>,
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("selected", &self.selected)
            .field("is_startup_project", &self.is_startup_project)
            .field("hidden_in_list", &self.hidden_in_list)
            .field("filtered", &self.filter.is_some())
            .field("container", &self.container)
            .finish()
    }
}

/// A read-only view of any node, including the project root.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    /// A project root.
    Project(&'a Project),
    /// A group.
    Group(&'a Group),
    /// A parameter.
    Parameter(&'a Parameter),
}

impl NodeRef<'_> {
    /// The node's id.
    pub fn id(&self) -> Uuid {
        match self {
            Self::Project(p) => p.id,
            Self::Group(g) => g.id,
            Self::Parameter(p) => p.id,
        }
    }
}

impl Project {
    /// A new, empty project.
    pub fn new(id: Uuid, kind: Uuid, display_name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            selected: false,
            is_startup_project: false,
            container: Container::new(display_name),
            hidden_in_list: false,
            filter: None,
            events: Vec::new(),
        }
    }

    /// The project's display name.
    pub fn display_name(&self) -> &str {
        &self.container.display_name
    }

    /// Whether the project is hidden from the list.
    pub fn hidden_in_list(&self) -> bool {
        self.hidden_in_list
    }

    /// Changes the hidden flag, raising `HiddenChanged` when it actually changes.
    pub fn set_hidden(&mut self, hidden: bool) {
        let old = self.hidden_in_list;
        if old != hidden {
            self.hidden_in_list = hidden;
            self.events.push(TreeEvent::HiddenChanged { old, new: hidden });
        }
    }

    /// The runtime visibility predicate, if any.
    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Installs or clears the runtime visibility predicate.
    pub fn set_filter(&mut self, filter: Option<Filter>) {
        self.filter = filter;
    }

    /// Items visible under the current filter, in pre-order.
    pub fn visible_items(&self) -> Vec<&Item> {
        self.container.flatten(&FlattenOptions {
            direct_only: false,
            filter: self.filter.as_ref(),
        })
    }

    /// Projects are never duplicated.
    pub fn copy(&self) -> ItemResult<Self> {
        Err(ItemError::ProjectCopy { id: self.id })
    }

    /// A copy suitable for history: same ids, no pending events.
    pub fn snapshot(&self) -> Self {
        let mut snapshot = self.clone();
        snapshot.events.clear();
        snapshot
    }

    /// Takes the events recorded since the last call.
    pub fn drain_events(&mut self) -> Vec<TreeEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn push_event(&mut self, event: TreeEvent) {
        self.events.push(event);
    }

    /// Every id in the project, including its own.
    pub fn ids(&self) -> Vec<Uuid> {
        let mut ids = vec![self.id];
        ids.extend(self.container.ids());
        ids
    }

    /// Looks up any node, including the project itself.
    pub fn node(&self, id: Uuid) -> Option<NodeRef<'_>> {
        if id == self.id {
            return Some(NodeRef::Project(self));
        }
        self.container.find(id).map(|item| match item {
            Item::Parameter(p) => NodeRef::Parameter(p),
            Item::Group(g) => NodeRef::Group(g),
        })
    }

    /// The id of the container owning `id` (the project id for top-level items).
    pub fn parent_of(&self, id: Uuid) -> Option<Uuid> {
        self.container
            .owning_group(id)
            .map(|owner| owner.unwrap_or(self.id))
    }

    /// The container identified by `id` (the project's own for `id == self.id`).
    pub fn container_mut(&mut self, id: Uuid) -> ItemResult<&mut Container> {
        if id == self.id {
            return Ok(&mut self.container);
        }
        match self.container.find_mut(id) {
            Some(Item::Group(g)) => Ok(&mut g.container),
            Some(Item::Parameter(_)) => Err(ItemError::NotAContainer { id }),
            None => Err(ItemError::StaleReference { id }),
        }
    }

    /// The container identified by `id`, read-only.
    pub fn container(&self, id: Uuid) -> ItemResult<&Container> {
        if id == self.id {
            return Ok(&self.container);
        }
        match self.container.find(id) {
            Some(Item::Group(g)) => Ok(&g.container),
            Some(Item::Parameter(_)) => Err(ItemError::NotAContainer { id }),
            None => Err(ItemError::StaleReference { id }),
        }
    }

    /// A parameter below the project, mutably.
    pub fn parameter_mut(&mut self, id: Uuid) -> ItemResult<&mut Parameter> {
        match self.container.find_mut(id) {
            Some(Item::Parameter(p)) => Ok(p),
            Some(Item::Group(_)) => Err(ItemError::NotAContainer { id }),
            None => Err(ItemError::StaleReference { id }),
        }
    }

    /// Inserts `item` into the container `parent` at `index`. Ids already used in this
    /// project or listed in `taken` are replaced with fresh ones. Returns the inserted id.
    pub fn insert(
        &mut self,
        parent: Uuid,
        index: usize,
        mut item: Item,
        taken: &HashSet<Uuid>,
    ) -> ItemResult<Uuid> {
        let mut used: HashSet<Uuid> = self.ids().into_iter().collect();
        used.extend(taken);
        // Validate the target before touching the item so a failure is a clean no-op.
        self.container(parent)?;
        freshen_collisions(&mut item, &mut used);
        let id = item.id();
        self.container_mut(parent)?.insert(index, item);
        self.events.push(TreeEvent::ItemAdded { item: id, parent });
        Ok(id)
    }

    /// Removes an item and its subtree.
    pub fn remove(&mut self, id: Uuid) -> ItemResult<Item> {
        if id == self.id {
            return Err(ItemError::ProjectNotMovable { id });
        }
        let parent = self
            .parent_of(id)
            .ok_or(ItemError::StaleReference { id })?;
        let item = self
            .container
            .remove(id)
            .ok_or(ItemError::StaleReference { id })?;
        self.events.push(TreeEvent::ItemRemoved { item: id, parent });
        Ok(item)
    }

    /// Moves an item to `index` inside `new_parent` (drag and drop).
    pub fn move_item(&mut self, id: Uuid, new_parent: Uuid, index: usize) -> ItemResult<()> {
        if id == self.id {
            return Err(ItemError::ProjectNotMovable { id });
        }
        let moving = self
            .container
            .find(id)
            .ok_or(ItemError::StaleReference { id })?;
        if id == new_parent || moving.ids().contains(&new_parent) {
            return Err(ItemError::CircularMove { id });
        }
        self.container(new_parent)?;
        let item = self.remove(id)?;
        self.container_mut(new_parent)?.insert(index, item);
        self.events.push(TreeEvent::ItemAdded {
            item: id,
            parent: new_parent,
        });
        Ok(())
    }

    /// Moves the given items one step up or down within their containers.
    pub fn shift_items(&mut self, ids: &HashSet<Uuid>, direction: isize) -> usize {
        let moved = self.container.shift_items(ids, direction);
        if moved > 0 {
            self.events.push(TreeEvent::ProjectReplaced);
        }
        moved
    }

    /// Checks or unchecks an item, honouring exclusive containers.
    pub fn set_enabled(&mut self, id: Uuid, enabled: bool) -> ItemResult<bool> {
        let changed = if id == self.id {
            let changed = self.container.any_enabled() != enabled;
            self.container.set_all_enabled(enabled);
            changed
        } else {
            self.container
                .set_enabled(id, enabled)
                .ok_or(ItemError::StaleReference { id })?
        };
        if changed {
            self.events.push(TreeEvent::ItemChanged { item: id });
        }
        Ok(changed)
    }

    /// Sets the selection flag of any node.
    pub fn set_selected(&mut self, id: Uuid, selected: bool) -> ItemResult<()> {
        let previous = if id == self.id {
            std::mem::replace(&mut self.selected, selected)
        } else {
            let item = self
                .container
                .find_mut(id)
                .ok_or(ItemError::StaleReference { id })?;
            let previous = item.is_selected();
            item.set_selected(selected);
            previous
        };
        if previous != selected {
            self.events
                .push(TreeEvent::SelectionChanged { item: id, selected });
        }
        Ok(())
    }

    /// Ids of selected nodes in pre-order, the project first.
    pub fn selected_ids(&self) -> Vec<Uuid> {
        let mut ids = Vec::new();
        if self.selected {
            ids.push(self.id);
        }
        ids.extend(
            self.container
                .flatten(&FlattenOptions::default())
                .into_iter()
                .filter(|i| i.is_selected())
                .map(Item::id),
        );
        ids
    }

    /// Clears every selection flag in the project.
    pub fn clear_selection(&mut self) {
        for id in self.selected_ids() {
            // The id was just read from this tree.
            let _ = self.set_selected(id, false);
        }
    }

    /// Every parameter in tree order.
    pub fn all_parameters(&self) -> Vec<&Parameter> {
        self.container.all_parameters()
    }

    /// Visits every parameter mutably, in tree order.
    pub fn for_each_parameter_mut(&mut self, mut visit: impl FnMut(&mut Parameter)) {
        self.container.visit_mut(&mut |item| {
            if let Item::Parameter(p) = item {
                visit(p);
            }
        });
    }

    /// Restores every parameter's check state to its default.
    pub fn reset_to_default_checked(&mut self) {
        let mut changed = Vec::new();
        self.for_each_parameter_mut(|p| {
            if p.enabled != p.default_checked {
                p.enabled = p.default_checked;
                changed.push(p.id);
            }
        });
        self.container.normalize_exclusivity();
        for id in changed {
            self.events.push(TreeEvent::ItemChanged { item: id });
        }
    }

    /// A project needs a persisted file iff it has items or a non-default attribute.
    pub fn needs_saving(&self) -> bool {
        !self.container.is_empty() || self.hidden_in_list || self.container.has_attributes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg(value: &str, enabled: bool) -> Parameter {
        Parameter::new(ParamType::CmdArg, value, enabled)
    }

    fn project_with(items: Vec<Item>) -> Project {
        let mut project = Project::new(Uuid::new_v4(), Uuid::nil(), "App");
        project.container.replace_items(items);
        project
    }

    #[test]
    fn test_insert_assigns_fresh_id_on_collision() {
        let a = arg("a", true);
        let duplicate = Parameter {
            value: "b".to_string(),
            ..a.clone()
        };
        let mut project = project_with(vec![a.clone().into()]);
        let pid = project.id;

        let inserted = project
            .insert(pid, 1, duplicate.into(), &HashSet::new())
            .unwrap();

        assert_ne!(inserted, a.id);
        assert_eq!(project.container.len(), 2);
        let ids: HashSet<Uuid> = project.ids().into_iter().collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_insert_into_parameter_is_rejected_without_change() {
        let a = arg("a", true);
        let mut project = project_with(vec![a.clone().into()]);
        let result = project.insert(a.id, 0, arg("b", true).into(), &HashSet::new());
        assert_eq!(result, Err(ItemError::NotAContainer { id: a.id }));
        assert_eq!(project.container.len(), 1);
        assert!(project.drain_events().is_empty());
    }

    #[test]
    fn test_exclusive_mode_unchecks_siblings() {
        let a = arg("a", true);
        let b = arg("b", false);
        let c = arg("c", false);
        let mut project = project_with(vec![a.clone().into(), b.clone().into(), c.clone().into()]);
        project.container.exclusive_mode = true;

        project.set_enabled(b.id, true).unwrap();

        let enabled: Vec<&str> = project
            .all_parameters()
            .into_iter()
            .filter(|p| p.enabled)
            .map(|p| p.value.as_str())
            .collect();
        assert_eq!(enabled, vec!["b"]);
    }

    #[test]
    fn test_exclusive_mode_applies_to_ancestors() {
        let inner = arg("inner", false);
        let mut group = Group::new("grp");
        group.container.push(inner.clone());
        let outer = arg("outer", true);
        let mut project = project_with(vec![outer.clone().into(), group.into()]);
        project.container.exclusive_mode = true;

        project.set_enabled(inner.id, true).unwrap();

        let params = project.all_parameters();
        assert!(!params[0].enabled);
        assert!(params[1].enabled);
    }

    #[test]
    fn test_normalize_keeps_first_checked() {
        let mut project = project_with(vec![
            arg("a", false).into(),
            arg("b", true).into(),
            arg("c", true).into(),
        ]);
        project.container.exclusive_mode = true;
        project.container.normalize_exclusivity();
        let enabled: Vec<bool> = project.all_parameters().iter().map(|p| p.enabled).collect();
        assert_eq!(enabled, vec![false, true, false]);
    }

    #[test]
    fn test_copy_freshens_every_id() {
        let mut group = Group::new("outer");
        let mut inner = Group::new("inner");
        inner.container.push(arg("x", true));
        group.container.push(inner);
        group.container.push(arg("y", false));
        let original: Item = group.into();
        let original_ids: HashSet<Uuid> = original.ids().into_iter().collect();
        assert_eq!(original_ids.len(), 4);

        let copy = original.copy(false);
        let copy_ids: HashSet<Uuid> = copy.ids().into_iter().collect();

        assert_eq!(copy_ids.len(), 4);
        assert!(copy_ids.is_disjoint(&original_ids));
        assert_eq!(original.copy(true).ids(), original.ids());
    }

    #[test]
    fn test_project_refuses_copy() {
        let project = project_with(Vec::new());
        assert_eq!(
            project.copy().unwrap_err(),
            ItemError::ProjectCopy { id: project.id }
        );
    }

    #[test]
    fn test_flatten_direct_only_and_filtered() {
        let mut group = Group::new("grp");
        group.container.push(arg("needle", true));
        group.container.push(arg("hay", true));
        let mut project = project_with(vec![arg("top", true).into(), group.into()]);

        let direct = project.container.flatten(&FlattenOptions {
            direct_only: true,
            filter: None,
        });
        assert_eq!(direct.len(), 2);

        project.set_filter(Some(Arc::new(|item: &Item| {
            matches!(item, Item::Parameter(p) if p.value.contains("needle"))
        })));
        let visible = project.visible_items();
        assert_eq!(visible.len(), 2);
        assert!(matches!(visible[0], Item::Group(_)));
    }

    #[test]
    fn test_shift_items_respects_edges_and_neighbours() {
        let a = arg("a", true);
        let b = arg("b", true);
        let c = arg("c", true);
        let mut project = project_with(vec![a.clone().into(), b.clone().into(), c.clone().into()]);

        let moving: HashSet<Uuid> = [a.id, c.id].into_iter().collect();
        project.shift_items(&moving, -1);
        let order: Vec<&str> = project.all_parameters().iter().map(|p| p.value.as_str()).collect();
        assert_eq!(order, vec!["a", "c", "b"]);

        project.shift_items(&moving, 1);
        let order: Vec<&str> = project.all_parameters().iter().map(|p| p.value.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_move_into_own_subtree_is_rejected() {
        let mut outer = Group::new("outer");
        let inner = Group::new("inner");
        let inner_id = inner.id;
        outer.container.push(inner);
        let outer_id = outer.id;
        let mut project = project_with(vec![outer.into()]);

        let result = project.move_item(outer_id, inner_id, 0);
        assert_eq!(result, Err(ItemError::CircularMove { id: outer_id }));
        assert_eq!(project.parent_of(inner_id), Some(outer_id));
    }

    #[test]
    fn test_remove_raises_event_and_reports_stale_ids() {
        let a = arg("a", true);
        let mut project = project_with(vec![a.clone().into()]);
        project.remove(a.id).unwrap();
        assert_eq!(
            project.drain_events(),
            vec![TreeEvent::ItemRemoved {
                item: a.id,
                parent: project.id
            }]
        );
        assert_eq!(
            project.remove(a.id).unwrap_err(),
            ItemError::StaleReference { id: a.id }
        );
    }

    #[test]
    fn test_hidden_change_bubbles_once() {
        let mut project = project_with(Vec::new());
        project.set_hidden(true);
        project.set_hidden(true);
        assert_eq!(
            project.drain_events(),
            vec![TreeEvent::HiddenChanged {
                old: false,
                new: true
            }]
        );
        assert!(project.needs_saving());
    }
}
