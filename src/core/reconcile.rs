// src/core/reconcile.rs

//! # Reconciliation Engine
//!
//! Merges, for one project, the live tree, a freshly read file snapshot and the legacy
//! private-store snapshot into one authoritative subtree.
//!
//! Structure comes from exactly one source:
//!
//! 1. **File snapshot** if present. It may have been changed by version control or by hand.
//! 2. Otherwise the **live tree** is kept untouched (unless it is empty and the caller asked
//!    to re-gather empty projects).
//! 3. Otherwise, with version control support disabled, the **legacy snapshot**'s copy.
//! 4. Otherwise a **build-configuration scan**, flagged for write-back.
//!
//! State fields (enabled, expanded, selected) are resolved per node: the live node with the
//! same id wins, then the legacy id sets, then the node's default (`DefaultChecked` for
//! enabled, `false` for the rest). Nodes are matched by id only.
//!
//! Ids that collide within the snapshot, or with another project, are replaced by an id
//! derived from the project id, the original id and the occurrence count, so re-running a
//! merge with the same inputs yields the same ids.

use crate::core::item::{Item, Project};
use crate::core::schema;
use crate::dev_utils::BlockTimer;
use crate::models::{ItemData, LegacySnapshot, ProjectData, ProjectInfo};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Produces items from a project's own build configuration.
pub trait BuildConfigScanner {
    fn scan(&self, project: &ProjectInfo) -> anyhow::Result<Vec<ItemData>>;
}

/// A scanner that never finds anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoScan;

impl BuildConfigScanner for NoScan {
    fn scan(&self, _project: &ProjectInfo) -> anyhow::Result<Vec<ItemData>> {
        Ok(Vec::new())
    }
}

/// Where the structure of a merged project came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureSource {
    /// The project's JSON file.
    File,
    /// The tree copy in the legacy store.
    Legacy,
    /// A build-configuration scan.
    Scan,
    /// Nothing; the project starts empty.
    Empty,
}

/// The result of one reconciliation.
#[derive(Debug)]
pub enum Outcome {
    /// The live tree was kept as is.
    Kept,
    /// A new subtree to swap in atomically.
    Replaced {
        project: Project,
        source: StructureSource,
        /// The subtree was synthesised and should be persisted once.
        needs_save: bool,
    },
}

/// Everything one merge looks at.
#[derive(Debug)]
pub struct ReconcileInput<'a> {
    /// The project being merged.
    pub info: &'a ProjectInfo,
    /// Its current subtree, if loaded.
    pub live: Option<&'a Project>,
    /// Its persisted JSON record, if one was read.
    pub file: Option<&'a ProjectData>,
    /// The legacy store, if one was read.
    pub legacy: Option<&'a LegacySnapshot>,
    /// Ids owned by other projects of the tree.
    pub foreign_ids: &'a HashSet<Uuid>,
    /// JSON files are read and written at all.
    pub vcs_support_enabled: bool,
    /// Scan the build configuration when no structural source exists.
    pub gather_when_not_found: bool,
    /// Treat an empty live project as absent.
    pub gather_for_empty: bool,
}

/// Runs one merge. Never fails: every missing or broken source degrades to the next one.
pub fn reconcile(input: &ReconcileInput<'_>, scanner: &dyn BuildConfigScanner) -> Outcome {
    let _timer = BlockTimer::new(format!("reconcile {}", input.info.name));
    let info = input.info;
    let empty_legacy = LegacySnapshot::default();
    let legacy = input.legacy.unwrap_or(&empty_legacy);

    let file = input.file.filter(|_| input.vcs_support_enabled);
    if let Some(file) = file {
        log::info!(
            "Setting {} items for project '{}' from its parameter file.",
            file.items.len(),
            info.name
        );
        let mut data = file.clone();
        data.id = info.id;
        dedupe_ids(&mut data, input.foreign_ids);
        apply_state(&mut data, input.live, legacy);
        return replaced(info, input.live, &data, StructureSource::File, false);
    }

    if let Some(live) = input.live
        && (!live.container.is_empty() || !input.gather_for_empty)
    {
        log::debug!("Keeping live tree of project '{}'.", info.name);
        return Outcome::Kept;
    }

    if !input.vcs_support_enabled
        && let Some(stored) = legacy.project_arguments.get(&info.id)
    {
        log::info!("Using legacy store data for project '{}'.", info.name);
        let mut data = stored.clone();
        dedupe_ids(&mut data, input.foreign_ids);
        apply_legacy_state(&mut data, legacy);
        return replaced(info, input.live, &data, StructureSource::Legacy, false);
    }

    let mut data = ProjectData::empty(info.id);
    let mut source = StructureSource::Empty;
    let mut needs_save = false;
    if input.gather_when_not_found {
        log::info!("Gathering items from the build configuration of '{}'.", info.name);
        match scanner.scan(info) {
            Ok(items) => {
                data.items = items;
                source = StructureSource::Scan;
                needs_save = true;
            }
            Err(e) => log::error!(
                "Failed to gather items from the build configuration of '{}': {:#}",
                info.name,
                e
            ),
        }
    }
    dedupe_ids(&mut data, input.foreign_ids);
    data.for_each_item_mut(|item| item.enabled |= item.default_checked);
    replaced(info, input.live, &data, source, needs_save)
}

fn replaced(
    info: &ProjectInfo,
    live: Option<&Project>,
    data: &ProjectData,
    source: StructureSource,
    needs_save: bool,
) -> Outcome {
    let mut project = schema::project_from_data(data, info.kind, &info.name);
    project.is_startup_project = live.map_or(info.is_startup, |l| l.is_startup_project);
    Outcome::Replaced {
        project,
        source,
        needs_save,
    }
}

/// Live tree first, then legacy id sets, then defaults.
fn apply_state(data: &mut ProjectData, live: Option<&Project>, legacy: &LegacySnapshot) {
    let known = legacy.known_parameters();
    let live_state: HashMap<Uuid, (bool, bool, bool)> = live
        .map(|project| {
            project
                .container
                .flatten(&Default::default())
                .into_iter()
                .map(|item| {
                    let (enabled, expanded) = match item {
                        Item::Parameter(p) => (p.enabled, false),
                        Item::Group(g) => (false, g.container.expanded),
                    };
                    (item.id(), (enabled, expanded, item.is_selected()))
                })
                .collect()
        })
        .unwrap_or_default();

    data.for_each_item_mut(|item| {
        if let Some(&(enabled, expanded, selected)) = live_state.get(&item.id) {
            item.enabled = enabled;
            item.expanded = expanded;
            item.selected = selected;
            return;
        }
        item.enabled = if known.contains(&item.id) {
            legacy.checked_arguments.contains(&item.id)
        } else {
            item.default_checked
        };
        item.expanded = legacy.expanded_containers.contains(&item.id);
        item.selected = legacy.selected_items.contains(&item.id);
    });

    match live {
        Some(project) => {
            data.expanded = project.container.expanded;
            data.selected = project.selected;
        }
        None => {
            data.expanded = legacy.expanded_containers.contains(&data.id);
            data.selected = legacy.selected_items.contains(&data.id);
        }
    }
}

/// State straight from the legacy id sets.
fn apply_legacy_state(data: &mut ProjectData, legacy: &LegacySnapshot) {
    data.for_each_item_mut(|item| {
        item.enabled = legacy.checked_arguments.contains(&item.id);
        item.expanded = legacy.expanded_containers.contains(&item.id);
        item.selected = legacy.selected_items.contains(&item.id);
    });
    data.expanded = legacy.expanded_containers.contains(&data.id);
    data.selected = legacy.selected_items.contains(&data.id);
}

/// Gives every node a unique id. The first occurrence (pre-order) keeps its id; later ones,
/// and nodes colliding with `foreign_ids`, get a deterministic replacement.
fn dedupe_ids(data: &mut ProjectData, foreign_ids: &HashSet<Uuid>) {
    let mut taken: HashSet<Uuid> = foreign_ids.clone();
    taken.insert(data.id);
    let namespace = data.id;
    let mut occurrences: HashMap<Uuid, u32> = HashMap::new();

    data.for_each_item_mut(|item| {
        if taken.insert(item.id) {
            return;
        }
        let original = item.id;
        let counter = occurrences.entry(original).or_insert(0);
        let fresh = loop {
            *counter += 1;
            let mut name = original.as_bytes().to_vec();
            name.extend_from_slice(&counter.to_le_bytes());
            let candidate = Uuid::new_v5(&namespace, &name);
            if taken.insert(candidate) {
                break candidate;
            }
        };
        log::warn!(
            "Identity collision on '{}'; the later item now uses '{}'.",
            original,
            fresh
        );
        item.id = fresh;
    });
}
