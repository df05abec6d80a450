// src/core/schema.rs

//! Conversion between the live tree and the persisted records, plus the JSON codec.

use crate::constants::FILE_VERSION;
use crate::core::item::{Container, Group, Item, Parameter, Project};
use crate::models::{ItemData, LegacySnapshot, ProjectData, SolutionData};
use thiserror::Error;
use uuid::Uuid;

/// Failures while reading, writing or decoding persisted state.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Reading, writing, moving or deleting a file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// The file involved.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A parameter file is not valid JSON or does not match the schema.
    #[error("Malformed parameter file: {0}")]
    Json(#[from] serde_json::Error),
    /// The legacy store could not be encoded.
    #[error("Failed to encode the legacy store: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    /// The legacy store is corrupt.
    #[error("Failed to decode the legacy store: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    /// The legacy store could not be decompressed.
    #[error("Failed to decompress the legacy store: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),
    /// The legacy store was written by an incompatible version.
    #[error("Unsupported legacy store version {found} (expected {expected}).")]
    Version {
        /// Version in the file.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },
}

// --- RECORDS -> TREE ---

fn container_from(data: &ItemData) -> Container {
    let mut container = Container::new(data.command.clone());
    container.expanded = data.expanded;
    container.exclusive_mode = data.exclusive_mode;
    container.delimiter = data.delimiter.clone();
    container.prefix = data.prefix.clone();
    container.postfix = data.postfix.clone();
    container.project_config = data.project_config.clone();
    container.project_platform = data.project_platform.clone();
    container.launch_profile = data.launch_profile.clone();
    container.replace_items(data.items.iter().flatten().map(item_from_data).collect());
    container
}

/// Builds a node from a record, carrying the record's state fields over.
pub fn item_from_data(data: &ItemData) -> Item {
    if data.is_group() {
        Item::Group(Group {
            id: data.id,
            selected: data.selected,
            container: container_from(data),
        })
    } else {
        let mut param = Parameter::with_id(
            data.id,
            data.param_type,
            data.command.clone(),
            data.enabled,
            data.default_checked,
        );
        param.selected = data.selected;
        Item::Parameter(param)
    }
}

/// Builds a project subtree from a record.
pub fn project_from_data(data: &ProjectData, kind: Uuid, display_name: &str) -> Project {
    let mut project = Project::new(data.id, kind, display_name);
    project.selected = data.selected;
    project.set_hidden(data.hidden_in_list);
    project.drain_events();
    let container = &mut project.container;
    container.expanded = data.expanded;
    container.exclusive_mode = data.exclusive_mode;
    container.delimiter = data.delimiter.clone();
    container.prefix = data.prefix.clone();
    container.postfix = data.postfix.clone();
    container.project_config = data.project_config.clone();
    container.project_platform = data.project_platform.clone();
    container.launch_profile = data.launch_profile.clone();
    container.replace_items(data.items.iter().map(item_from_data).collect());
    container.normalize_exclusivity();
    project
}

// --- TREE -> RECORDS ---

/// Builds a record from a node, state fields included.
pub fn item_to_data(item: &Item) -> ItemData {
    match item {
        Item::Parameter(p) => ItemData {
            id: p.id,
            param_type: p.param_type,
            command: p.value.clone(),
            default_checked: p.default_checked,
            enabled: p.enabled,
            selected: p.selected,
            ..Default::default()
        },
        Item::Group(g) => {
            let c = &g.container;
            ItemData {
                id: g.id,
                command: c.display_name.clone(),
                items: Some(c.items().iter().map(item_to_data).collect()),
                exclusive_mode: c.exclusive_mode,
                delimiter: c.delimiter.clone(),
                prefix: c.prefix.clone(),
                postfix: c.postfix.clone(),
                project_config: c.project_config.clone(),
                project_platform: c.project_platform.clone(),
                launch_profile: c.launch_profile.clone(),
                expanded: c.expanded,
                selected: g.selected,
                ..Default::default()
            }
        }
    }
}

/// Builds the persisted record of a project.
pub fn project_to_data(project: &Project) -> ProjectData {
    let c = &project.container;
    ProjectData {
        file_version: None,
        id: project.id,
        command: None,
        items: c.items().iter().map(item_to_data).collect(),
        exclusive_mode: c.exclusive_mode,
        delimiter: c.delimiter.clone(),
        prefix: c.prefix.clone(),
        postfix: c.postfix.clone(),
        project_config: c.project_config.clone(),
        project_platform: c.project_platform.clone(),
        launch_profile: c.launch_profile.clone(),
        hidden_in_list: project.hidden_in_list(),
        expanded: c.expanded,
        selected: project.selected,
    }
}

/// Records the state of one project into a legacy snapshot, replacing what it held for it.
pub fn record_legacy_state(snapshot: &mut LegacySnapshot, project: &Project) {
    let previous: Vec<Uuid> = snapshot
        .project_arguments
        .get(&project.id)
        .map(|p| p.all_items().iter().map(|i| i.id).collect())
        .unwrap_or_default();
    for id in previous.iter().chain(std::iter::once(&project.id)) {
        snapshot.checked_arguments.remove(id);
        snapshot.expanded_containers.remove(id);
        snapshot.selected_items.remove(id);
    }

    let data = project_to_data(project);
    if data.expanded {
        snapshot.expanded_containers.insert(data.id);
    }
    if data.selected {
        snapshot.selected_items.insert(data.id);
    }
    for item in data.all_items() {
        if !item.is_group() && item.enabled {
            snapshot.checked_arguments.insert(item.id);
        }
        if item.is_group() && item.expanded {
            snapshot.expanded_containers.insert(item.id);
        }
        if item.selected {
            snapshot.selected_items.insert(item.id);
        }
    }
    snapshot.project_arguments.insert(data.id, data);
}

// --- JSON ---

/// Encodes a per-project file.
pub fn encode_project(data: &ProjectData) -> Result<String, StorageError> {
    let mut data = data.clone();
    data.file_version = Some(FILE_VERSION);
    Ok(serde_json::to_string_pretty(&data)?)
}

/// Decodes a per-project file. Blank content means "no data".
pub fn decode_project(content: &str) -> Result<Option<ProjectData>, StorageError> {
    if content.trim().is_empty() {
        return Ok(None);
    }
    let data: ProjectData = serde_json::from_str(content)?;
    if data.file_version.is_some_and(|v| v > FILE_VERSION) {
        log::warn!(
            "Parameter file has version {:?}, newer than {}; reading what is understood.",
            data.file_version,
            FILE_VERSION
        );
    }
    Ok(Some(data))
}

/// Encodes the solution-wide file.
pub fn encode_solution(data: &SolutionData) -> Result<String, StorageError> {
    let mut data = data.clone();
    data.file_version = FILE_VERSION;
    Ok(serde_json::to_string_pretty(&data)?)
}

/// Decodes the solution-wide file. Blank content means an empty solution.
pub fn decode_solution(content: &str) -> Result<SolutionData, StorageError> {
    if content.trim().is_empty() {
        return Ok(SolutionData::default());
    }
    Ok(serde_json::from_str(content)?)
}

/// Finds a project inside a solution file: by id, then by unique name.
pub fn find_in_solution<'a>(
    solution: &'a SolutionData,
    id: Uuid,
    unique_name: &str,
) -> Option<&'a ProjectData> {
    solution
        .project_arguments
        .iter()
        .find(|p| p.id == id)
        .or_else(|| {
            solution
                .project_arguments
                .iter()
                .find(|p| !unique_name.is_empty() && p.command.as_deref() == Some(unique_name))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParamType;
    use pretty_assertions::assert_eq;

    fn sample_project() -> Project {
        let mut project = Project::new(Uuid::from_u128(1), Uuid::nil(), "App");
        let mut group = Group::with_id(Uuid::from_u128(2), "defines");
        group.container.delimiter = Some(",".to_string());
        group.container.exclusive_mode = true;
        group
            .container
            .push(Parameter::with_id(Uuid::from_u128(3), ParamType::CmdArg, "-DA", true, true));
        group
            .container
            .push(Parameter::with_id(Uuid::from_u128(4), ParamType::CmdArg, "-DB", false, false));
        project.container.push(group);
        project
            .container
            .push(Parameter::with_id(Uuid::from_u128(5), ParamType::EnvVar, "A=1", true, false));
        project
    }

    #[test]
    fn test_json_round_trip_preserves_structure() {
        let project = sample_project();
        let json = encode_project(&project_to_data(&project)).unwrap();
        let decoded = decode_project(&json).unwrap().unwrap();
        let rebuilt = project_from_data(&decoded, Uuid::nil(), "App");

        assert_eq!(project_to_data(&rebuilt).items.len(), 2);
        let ids: Vec<Uuid> = rebuilt.ids();
        assert_eq!(ids, project.ids());
        let values: Vec<(String, ParamType, bool)> = rebuilt
            .all_parameters()
            .iter()
            .map(|p| (p.value.clone(), p.param_type, p.default_checked))
            .collect();
        assert_eq!(
            values,
            vec![
                ("-DA".to_string(), ParamType::CmdArg, true),
                ("-DB".to_string(), ParamType::CmdArg, false),
                ("A=1".to_string(), ParamType::EnvVar, false),
            ]
        );
        assert!(json.contains("\"FileVersion\": 2"));
        assert!(json.contains("\"Delimiter\": \",\""));
    }

    #[test]
    fn test_blank_and_malformed_content() {
        assert!(decode_project("  \n").unwrap().is_none());
        assert!(matches!(decode_project("{ not json"), Err(StorageError::Json(_))));
        assert!(decode_solution("").unwrap().project_arguments.is_empty());
    }

    #[test]
    fn test_solution_lookup_falls_back_to_unique_name() {
        let mut by_name = ProjectData::empty(Uuid::from_u128(9));
        by_name.command = Some("src/App/App.csproj".to_string());
        let solution = SolutionData {
            project_arguments: vec![by_name],
            ..Default::default()
        };
        let found = find_in_solution(&solution, Uuid::from_u128(1), "src/App/App.csproj");
        assert_eq!(found.map(|p| p.id), Some(Uuid::from_u128(9)));
        assert!(find_in_solution(&solution, Uuid::from_u128(1), "").is_none());
    }

    #[test]
    fn test_legacy_state_is_replaced_per_project() {
        let mut snapshot = LegacySnapshot::default();
        let mut project = sample_project();
        project.container.expanded = true;
        record_legacy_state(&mut snapshot, &project);
        assert!(snapshot.checked_arguments.contains(&Uuid::from_u128(3)));
        assert!(snapshot.checked_arguments.contains(&Uuid::from_u128(5)));
        assert!(snapshot.expanded_containers.contains(&Uuid::from_u128(1)));

        project.set_enabled(Uuid::from_u128(5), false).unwrap();
        record_legacy_state(&mut snapshot, &project);
        assert!(!snapshot.checked_arguments.contains(&Uuid::from_u128(5)));
        assert_eq!(snapshot.project_arguments.len(), 1);
    }
}
