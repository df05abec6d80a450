// tests/workspace_flow.rs

use argtree::core::reconcile::NoScan;
use argtree::core::settings::Settings;
use argtree::core::workspace::Workspace;
use argtree::models::{ParamType, ProjectInfo};
use argtree::system::notifications::SourceChange;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use uuid::Uuid;

const APP: Uuid = Uuid::from_u128(1);

fn app_info(root: &Path) -> ProjectInfo {
    ProjectInfo {
        id: APP,
        name: "App".to_string(),
        kind: Uuid::nil(),
        dir: root.join("App"),
        unique_name: "App/App.proj".to_string(),
        is_startup: true,
    }
}

fn open(root: &Path) -> Workspace {
    let mut ws = Workspace::with_settings(root.join("App.sln"), Settings::default(), Box::new(NoScan));
    ws.load_projects(vec![app_info(root)]);
    ws
}

fn write_project_file(root: &Path, items: &str) {
    let dir = root.join("App");
    fs::create_dir_all(&dir).unwrap();
    let content = format!(
        r#"{{ "FileVersion": 2, "Id": "{}", "Items": [{}] }}"#,
        APP, items
    );
    fs::write(dir.join("App.args.json"), content).unwrap();
}

const ITEMS: &str = r#"
    { "Id": "00000000-0000-0000-0000-00000000000a", "Command": "--verbose", "DefaultChecked": true },
    { "Id": "00000000-0000-0000-0000-00000000000b", "Command": "--quiet" },
    { "Id": "00000000-0000-0000-0000-00000000000c", "Type": "EnvVar", "Command": "MODE=dev", "DefaultChecked": true }
"#;

#[test]
fn hand_written_file_drives_the_tree() {
    let dir = tempdir().unwrap();
    write_project_file(dir.path(), ITEMS);

    let mut ws = open(dir.path());

    assert_eq!(ws.command_line(APP).unwrap(), "--verbose");
    let env = ws.environment(APP).unwrap();
    assert_eq!(env.get("MODE").map(String::as_str), Some("dev"));
    assert!(ws.take_warnings().is_empty());
}

#[test]
fn external_edit_keeps_live_check_state() {
    let dir = tempdir().unwrap();
    write_project_file(dir.path(), ITEMS);
    let mut ws = open(dir.path());
    ws.set_enabled(Uuid::from_u128(0xb), true).unwrap();
    assert_eq!(ws.command_line(APP).unwrap(), "--verbose --quiet");

    let extra = r#", { "Id": "00000000-0000-0000-0000-00000000000d", "Command": "--extra" }"#;
    write_project_file(dir.path(), &format!("{ITEMS}{extra}"));
    let path = ws.project_file(APP).unwrap();
    ws.change_sender().notify(SourceChange::ProjectFile { project: APP, path });
    assert_eq!(ws.process_changes(), 1);

    let project = ws.tree().project(APP).unwrap();
    assert_eq!(project.all_parameters().len(), 4);
    assert_eq!(ws.command_line(APP).unwrap(), "--verbose --quiet");
}

#[test]
fn reopening_restores_check_state_from_the_legacy_store() {
    let dir = tempdir().unwrap();
    write_project_file(dir.path(), ITEMS);
    {
        let mut ws = open(dir.path());
        ws.set_enabled(Uuid::from_u128(0xa), false).unwrap();
        ws.set_enabled(Uuid::from_u128(0xb), true).unwrap();
    }

    let ws = open(dir.path());

    assert_eq!(ws.command_line(APP).unwrap(), "--quiet");
}

#[test]
fn switching_to_solution_storage_moves_the_data() {
    let dir = tempdir().unwrap();
    let mut ws = open(dir.path());
    let id = ws.add_parameter(ParamType::CmdArg, "--port 80").unwrap();
    let project_file = ws.project_file(APP).unwrap();
    assert!(project_file.exists());

    let settings = Settings {
        use_solution_dir: true,
        ..Settings::default()
    };
    ws.apply_settings(settings);

    let solution_file = ws.project_file(APP).unwrap();
    assert_ne!(solution_file, project_file);
    assert!(solution_file.exists());
    assert!(!project_file.exists());
    let params = ws.tree().project(APP).unwrap().all_parameters().len();
    assert_eq!(params, 1);
    assert!(ws.tree().project(APP).unwrap().ids().contains(&id));
    assert_eq!(ws.command_line(APP).unwrap(), "--port 80");
}

#[test]
fn ids_stay_unique_across_projects_loaded_from_copied_files() {
    let dir = tempdir().unwrap();
    write_project_file(dir.path(), ITEMS);
    let lib_dir = dir.path().join("Lib");
    fs::create_dir_all(&lib_dir).unwrap();
    fs::copy(dir.path().join("App/App.args.json"), lib_dir.join("Lib.args.json")).unwrap();

    let mut ws = Workspace::with_settings(dir.path().join("App.sln"), Settings::default(), Box::new(NoScan));
    let lib = ProjectInfo {
        id: Uuid::from_u128(2),
        name: "Lib".to_string(),
        kind: Uuid::nil(),
        dir: lib_dir,
        unique_name: "Lib/Lib.proj".to_string(),
        is_startup: false,
    };
    ws.load_projects(vec![app_info(dir.path()), lib]);

    let mut all = Vec::new();
    for project in ws.tree().projects() {
        all.extend(project.ids());
    }
    let unique: std::collections::HashSet<Uuid> = all.iter().copied().collect();
    assert_eq!(all.len(), 8);
    assert_eq!(unique.len(), all.len());
}
