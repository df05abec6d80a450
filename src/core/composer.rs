// src/core/composer.rs

//! Turns a project's active items into what a launch consumes.
//!
//! Arguments are joined per container with its delimiter, prefix and postfix. Environment
//! variables keep first-seen order; a later definition of the same name replaces the value
//! in place. Exported `cmd.exe` scripts escape the shell's metacharacters.

use crate::core::item::{Container, Item, Project};
use crate::core::resolver::{self, LaunchContext, ManageFlags};
use crate::models::ParamType;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use uuid::Uuid;

const DEFAULT_DELIMITER: &str = " ";

lazy_static! {
    static ref CMD_ESCAPE_RE: Regex = Regex::new(r"([&|(=<>^])").unwrap();
}

/// Everything a launch consumer needs from one project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchCommand {
    /// The command line, escaped and joined.
    pub args: String,
    /// Active variables, last definition of a name wins.
    pub env: IndexMap<String, String>,
    /// The last active working directory, expanded.
    pub work_dir: Option<String>,
    /// Executable to start instead of the project output.
    pub launch_app: Option<String>,
}

/// Shell dialect for environment export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvShell {
    /// `$env:NAME = 'VALUE'` statements.
    PowerShell,
    /// `set NAME=VALUE` commands joined with `&&`.
    Cmd,
}

/// Joins the project's active arguments into one command line.
///
/// Each container joins its children's contributions with its own delimiter (inherited from
/// the nearest ancestor that sets one, a space by default), then wraps the result in its
/// prefix and postfix. An exclusive container only contributes its checked child. Blank
/// values and containers that contribute nothing are skipped.
pub fn compose_command_line(project: &Project, flags: &ManageFlags, context: &LaunchContext) -> String {
    let active: HashSet<Uuid> = resolver::active_items(project, flags, context)
        .args
        .into_iter()
        .collect();
    compose_container(&project.container, context, DEFAULT_DELIMITER, &active).unwrap_or_default()
}

fn compose_container(
    container: &Container,
    context: &LaunchContext,
    inherited_delimiter: &str,
    active: &HashSet<Uuid>,
) -> Option<String> {
    if !context.accepts(container) {
        return None;
    }
    let delimiter = container.delimiter.as_deref().unwrap_or(inherited_delimiter);

    let children: Vec<&Item> = if container.exclusive_mode {
        container.items().iter().filter(|i| i.is_checked()).take(1).collect()
    } else {
        container.items().iter().collect()
    };

    let parts: Vec<String> = children
        .into_iter()
        .filter_map(|item| match item {
            Item::Parameter(p)
                if p.param_type == ParamType::CmdArg
                    && active.contains(&p.id)
                    && !p.value.trim().is_empty() =>
            {
                Some(p.value.clone())
            }
            Item::Parameter(_) => None,
            Item::Group(g) => compose_container(&g.container, context, delimiter, active),
        })
        .collect();

    if parts.is_empty() {
        return None;
    }
    Some(format!(
        "{}{}{}",
        container.prefix.as_deref().unwrap_or_default(),
        parts.join(delimiter),
        container.postfix.as_deref().unwrap_or_default()
    ))
}

/// The environment a launch would get: name to value, last occurrence wins.
pub fn compose_env(project: &Project, flags: &ManageFlags, context: &LaunchContext) -> IndexMap<String, String> {
    let winners = resolver::active_items(project, flags, context).env_vars;
    let mut env = IndexMap::with_capacity(winners.len());
    for (name, id) in winners {
        let value = project
            .all_parameters()
            .into_iter()
            .find(|p| p.id == id)
            .and_then(|p| resolver::parse_env_var(&p.value))
            .map(|(_, value)| value.to_string());
        if let Some(value) = value {
            env.insert(name, value);
        }
    }
    env
}

/// Arguments, environment, working directory and launch target for one project.
pub fn compose_launch(project: &Project, flags: &ManageFlags, context: &LaunchContext) -> LaunchCommand {
    let active = resolver::active_items(project, flags, context);
    let value_of = |id: Option<Uuid>| {
        let id = id?;
        project
            .all_parameters()
            .into_iter()
            .find(|p| p.id == id)
            .map(|p| p.value.clone())
    };
    LaunchCommand {
        args: compose_command_line(project, flags, context),
        env: compose_env(project, flags, context),
        work_dir: value_of(active.work_dir),
        launch_app: value_of(active.launch_app),
    }
}

/// Renders an environment mapping as a line that can be pasted into a shell.
pub fn export_env(env: &IndexMap<String, String>, shell: EnvShell) -> String {
    match shell {
        EnvShell::PowerShell => env
            .iter()
            .map(|(k, v)| format!("$env:{} = '{}';", k, v.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(" "),
        EnvShell::Cmd => env
            .iter()
            .map(|(k, v)| format!("set {}={}", k, CMD_ESCAPE_RE.replace_all(v, "^$1")))
            .collect::<Vec<_>>()
            .join(" && "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::{Group, Parameter};

    fn arg(value: &str) -> Item {
        Parameter::new(ParamType::CmdArg, value, true).into()
    }

    fn project(items: Vec<Item>) -> Project {
        let mut project = Project::new(Uuid::new_v4(), Uuid::nil(), "App");
        project.container.replace_items(items);
        project
    }

    fn compose(project: &Project) -> String {
        compose_command_line(project, &ManageFlags::default(), &LaunchContext::default())
    }

    #[test]
    fn test_custom_delimiter_skips_blank_values() {
        let mut p = project(vec![arg("x"), arg("y"), arg("")]);
        p.container.delimiter = Some(",".to_string());
        assert_eq!(compose(&p), "x,y");
    }

    #[test]
    fn test_group_prefix_postfix_and_inherited_delimiter() {
        let mut group = Group::new("defines");
        group.container.prefix = Some("-D\"".to_string());
        group.container.postfix = Some("\"".to_string());
        group.container.push(arg("A"));
        group.container.push(arg("   "));
        group.container.push(arg("B"));
        let mut nested = Group::new("nested");
        nested.container.push(arg("C"));
        group.container.push(nested);
        let mut p = project(vec![arg("run"), group.into()]);
        p.container.delimiter = Some(";".to_string());

        assert_eq!(compose(&p), "run;-D\"A;B;C\"");
    }

    #[test]
    fn test_exclusive_container_contributes_one_child() {
        let mut group = Group::new("mode");
        group.container.exclusive_mode = true;
        group.container.push(Parameter::new(ParamType::CmdArg, "--fast", false));
        group.container.push(arg("--safe"));
        let p = project(vec![group.into(), arg("input.txt")]);
        assert_eq!(compose(&p), "--safe input.txt");
    }

    #[test]
    fn test_env_mapping_is_shadowed_and_exported() {
        let p = project(vec![
            Parameter::new(ParamType::EnvVar, "A=1", true).into(),
            Parameter::new(ParamType::EnvVar, "B=2", true).into(),
            Parameter::new(ParamType::EnvVar, "A=3", true).into(),
        ]);
        let env = compose_env(&p, &ManageFlags::default(), &LaunchContext::default());
        assert_eq!(env.get("A").map(String::as_str), Some("3"));
        assert_eq!(env.get("B").map(String::as_str), Some("2"));
        assert_eq!(env.len(), 2);

        let mut quoted = IndexMap::new();
        quoted.insert("MSG".to_string(), "it's a&b".to_string());
        assert_eq!(export_env(&quoted, EnvShell::PowerShell), "$env:MSG = 'it''s a&b';");
        assert_eq!(export_env(&quoted, EnvShell::Cmd), "set MSG=it's a^&b");
    }

    #[test]
    fn test_launch_picks_last_work_dir() {
        let p = project(vec![
            Parameter::new(ParamType::WorkDir, "/first", true).into(),
            Parameter::new(ParamType::WorkDir, "/second", true).into(),
            Parameter::new(ParamType::LaunchApp, "/bin/app", false).into(),
            arg("-v"),
        ]);
        let launch = compose_launch(&p, &ManageFlags::default(), &LaunchContext::default());
        assert_eq!(launch.work_dir.as_deref(), Some("/second"));
        assert_eq!(launch.launch_app, None);
        assert_eq!(launch.args, "-v");
    }
}
