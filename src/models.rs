// src/models.rs

use crate::constants::{FILE_VERSION, LEGACY_STORE_VERSION};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use uuid::Uuid;

// --- PARAMETER KIND ---

/// What a parameter contributes to a launched process.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// A positional command-line argument.
    #[default]
    CmdArg,
    /// An environment variable in `NAME=VALUE` form.
    EnvVar,
    /// The working directory of the process.
    WorkDir,
    /// The program to launch instead of the project's own output.
    LaunchApp,
}

impl ParamType {
    /// The short tag shown next to non-argument parameters.
    pub fn tag(self) -> &'static str {
        match self {
            Self::CmdArg => "arg",
            Self::EnvVar => "env",
            Self::WorkDir => "dir",
            Self::LaunchApp => "app",
        }
    }
}

fn is_cmd_arg(value: &ParamType) -> bool {
    *value == ParamType::CmdArg
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// --- FILE SCHEMA (`*.args.json`) ---
// These are what ends up under version control. State fields (enabled, expanded, selected)
// are per-user and never written to the file; they travel through the legacy store instead.

/// One node of a persisted tree. A node with `items` is a group, otherwise a parameter.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ItemData {
    /// Stable identity of the item.
    pub id: Uuid,
    /// Omitted for plain arguments.
    #[serde(rename = "Type", default, skip_serializing_if = "is_cmd_arg")]
    pub param_type: ParamType,
    /// Parameter value, or the display name of a group.
    #[serde(default)]
    pub command: String,
    /// `Some` marks a group, even when empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ItemData>>,
    /// Only one child may be enabled.
    #[serde(default, skip_serializing_if = "is_false")]
    pub exclusive_mode: bool,
    /// Separator used between the children of a group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    /// Text before the joined children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Text after the joined children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postfix: Option<String>,
    /// Configuration filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_config: Option<String>,
    /// Platform filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_platform: Option<String>,
    /// Launch-profile filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_profile: Option<String>,
    /// Enabled automatically when first loaded.
    #[serde(default, skip_serializing_if = "is_false")]
    pub default_checked: bool,

    /// Checked state; kept in the legacy store, not in JSON.
    #[serde(skip)]
    pub enabled: bool,
    /// UI state, legacy store only.
    #[serde(skip)]
    pub expanded: bool,
    /// UI state, legacy store only.
    #[serde(skip)]
    pub selected: bool,
}

impl ItemData {
    /// Returns `true` if this record describes a group.
    pub fn is_group(&self) -> bool {
        self.items.is_some()
    }

    /// Pre-order walk over this record and all nested records.
    pub fn walk<'a>(&'a self, out: &mut Vec<&'a ItemData>) {
        out.push(self);
        for child in self.items.iter().flatten() {
            child.walk(out);
        }
    }

    fn walk_mut(&mut self, visit: &mut dyn FnMut(&mut ItemData)) {
        visit(self);
        for child in self.items.iter_mut().flatten() {
            child.walk_mut(visit);
        }
    }
}

/// The persisted tree of one project.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectData {
    /// Only present at the top level of a per-project file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_version: Option<u32>,
    /// The owning project's id.
    #[serde(default)]
    pub id: Uuid,
    /// The project's unique name; used as a fallback key inside a solution file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Top-level items in display order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<ItemData>,
    /// Only one child may be enabled.
    #[serde(default, skip_serializing_if = "is_false")]
    pub exclusive_mode: bool,
    /// Separator between top-level arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    /// Text before the project's arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Text after the project's arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postfix: Option<String>,
    /// Configuration filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_config: Option<String>,
    /// Platform filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_platform: Option<String>,
    /// Launch-profile filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_profile: Option<String>,
    /// Hidden from the project list in the UI.
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden_in_list: bool,

    /// UI state, legacy store only.
    #[serde(skip)]
    pub expanded: bool,
    /// UI state, legacy store only.
    #[serde(skip)]
    pub selected: bool,
}

impl ProjectData {
    /// An empty record for the given project.
    pub fn empty(id: Uuid) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// All nested records in pre-order (the project itself excluded).
    pub fn all_items(&self) -> Vec<&ItemData> {
        let mut out = Vec::new();
        for item in &self.items {
            item.walk(&mut out);
        }
        out
    }

    /// All parameter records in tree order.
    pub fn all_parameters(&self) -> Vec<&ItemData> {
        self.all_items().into_iter().filter(|i| !i.is_group()).collect()
    }

    /// Visits every nested record mutably, in pre-order.
    pub fn for_each_item_mut(&mut self, mut visit: impl FnMut(&mut ItemData)) {
        for item in &mut self.items {
            item.walk_mut(&mut visit);
        }
    }
}

/// The content of a solution-wide parameter file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct SolutionData {
    /// Format version of the file.
    #[serde(default)]
    pub file_version: u32,
    /// One record per project, in solution order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub project_arguments: Vec<ProjectData>,
}

impl Default for SolutionData {
    fn default() -> Self {
        Self {
            file_version: FILE_VERSION,
            project_arguments: Vec::new(),
        }
    }
}

// --- PROJECT ENUMERATION ---

/// What the host knows about one loaded project.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    /// The host's project id.
    pub id: Uuid,
    /// Display name; also the stem of the per-project file.
    pub name: String,
    /// Project-system kind.
    #[serde(default)]
    pub kind: Uuid,
    /// Directory holding the project file.
    pub dir: PathBuf,
    /// Solution-relative unique name; fallback key inside a solution file.
    #[serde(default)]
    pub unique_name: String,
    /// Whether the host launches this project.
    #[serde(default)]
    pub is_startup: bool,
}

// --- LEGACY PRIVATE STORE ---

/// State recorded in the IDE-private, per-solution store: which items were checked, expanded
/// and selected, plus a full copy of every project's tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacySnapshot {
    /// Parameters that were checked when the store was written.
    pub checked_arguments: HashSet<Uuid>,
    /// Groups and projects that were expanded.
    pub expanded_containers: HashSet<Uuid>,
    /// Items that were selected.
    pub selected_items: HashSet<Uuid>,
    /// Full tree of every project, used when JSON support is off.
    pub project_arguments: HashMap<Uuid, ProjectData>,
}

impl LegacySnapshot {
    /// Ids of every parameter known to this snapshot. Only these have a recorded checked state.
    pub fn known_parameters(&self) -> HashSet<Uuid> {
        self.project_arguments
            .values()
            .flat_map(|p| p.all_parameters().into_iter().map(|i| i.id))
            .collect()
    }
}

// --- SERIALIZATION SUBSTITUTES MODELS (For the binary legacy store) ---
// `bincode` cannot skip fields conditionally, so the binary layout uses flat, explicit records.

/// Bincode-safe substitute for `ItemData`, carrying the state fields as well.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct SerializableItem {
    pub id: Uuid,
    pub param_type: ParamType,
    pub command: String,
    pub is_group: bool,
    pub items: Vec<SerializableItem>,
    pub exclusive_mode: bool,
    pub delimiter: Option<String>,
    pub prefix: Option<String>,
    pub postfix: Option<String>,
    pub project_config: Option<String>,
    pub project_platform: Option<String>,
    pub launch_profile: Option<String>,
    pub default_checked: bool,
}

/// Bincode-safe substitute for `ProjectData`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct SerializableProject {
    pub id: Uuid,
    pub items: Vec<SerializableItem>,
    pub exclusive_mode: bool,
    pub delimiter: Option<String>,
    pub prefix: Option<String>,
    pub postfix: Option<String>,
    pub project_config: Option<String>,
    pub project_platform: Option<String>,
    pub launch_profile: Option<String>,
    pub hidden_in_list: bool,
}

/// The root record written to the legacy store.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct SerializableLegacySnapshot {
    pub version: u32,
    pub checked_arguments: Vec<Uuid>,
    pub expanded_containers: Vec<Uuid>,
    pub selected_items: Vec<Uuid>,
    pub projects: Vec<SerializableProject>,
}

/// --- Conversions TO Serializable models (for writing the store) ---
impl From<&ItemData> for SerializableItem {
    fn from(value: &ItemData) -> Self {
        Self {
            id: value.id,
            param_type: value.param_type,
            command: value.command.clone(),
            is_group: value.is_group(),
            items: value.items.iter().flatten().map(Into::into).collect(),
            exclusive_mode: value.exclusive_mode,
            delimiter: value.delimiter.clone(),
            prefix: value.prefix.clone(),
            postfix: value.postfix.clone(),
            project_config: value.project_config.clone(),
            project_platform: value.project_platform.clone(),
            launch_profile: value.launch_profile.clone(),
            default_checked: value.default_checked,
        }
    }
}

impl From<&ProjectData> for SerializableProject {
    fn from(value: &ProjectData) -> Self {
        Self {
            id: value.id,
            items: value.items.iter().map(Into::into).collect(),
            exclusive_mode: value.exclusive_mode,
            delimiter: value.delimiter.clone(),
            prefix: value.prefix.clone(),
            postfix: value.postfix.clone(),
            project_config: value.project_config.clone(),
            project_platform: value.project_platform.clone(),
            launch_profile: value.launch_profile.clone(),
            hidden_in_list: value.hidden_in_list,
        }
    }
}

fn sorted(ids: &HashSet<Uuid>) -> Vec<Uuid> {
    let mut list: Vec<Uuid> = ids.iter().copied().collect();
    list.sort();
    list
}

impl From<&LegacySnapshot> for SerializableLegacySnapshot {
    fn from(value: &LegacySnapshot) -> Self {
        let mut projects: Vec<SerializableProject> =
            value.project_arguments.values().map(Into::into).collect();
        projects.sort_by_key(|p| p.id);
        Self {
            version: LEGACY_STORE_VERSION,
            checked_arguments: sorted(&value.checked_arguments),
            expanded_containers: sorted(&value.expanded_containers),
            selected_items: sorted(&value.selected_items),
            projects,
        }
    }
}

// --- Conversions FROM Serializable models (for reading the store) ---

impl From<SerializableItem> for ItemData {
    fn from(value: SerializableItem) -> Self {
        Self {
            id: value.id,
            param_type: value.param_type,
            command: value.command,
            items: value
                .is_group
                .then(|| value.items.into_iter().map(Into::into).collect()),
            exclusive_mode: value.exclusive_mode,
            delimiter: value.delimiter,
            prefix: value.prefix,
            postfix: value.postfix,
            project_config: value.project_config,
            project_platform: value.project_platform,
            launch_profile: value.launch_profile,
            default_checked: value.default_checked,
            enabled: false,
            expanded: false,
            selected: false,
        }
    }
}

impl From<SerializableProject> for ProjectData {
    fn from(value: SerializableProject) -> Self {
        Self {
            file_version: None,
            id: value.id,
            command: None,
            items: value.items.into_iter().map(Into::into).collect(),
            exclusive_mode: value.exclusive_mode,
            delimiter: value.delimiter,
            prefix: value.prefix,
            postfix: value.postfix,
            project_config: value.project_config,
            project_platform: value.project_platform,
            launch_profile: value.launch_profile,
            hidden_in_list: value.hidden_in_list,
            expanded: false,
            selected: false,
        }
    }
}

impl From<SerializableLegacySnapshot> for LegacySnapshot {
    fn from(value: SerializableLegacySnapshot) -> Self {
        Self {
            checked_arguments: value.checked_arguments.into_iter().collect(),
            expanded_containers: value.expanded_containers.into_iter().collect(),
            selected_items: value.selected_items.into_iter().collect(),
            project_arguments: value
                .projects
                .into_iter()
                .map(|p| (p.id, ProjectData::from(p)))
                .collect(),
        }
    }
}
