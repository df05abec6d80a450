// src/core/graph_display.rs

//! Text rendering of the tree for the `tree` command.

use crate::core::item::{Container, Item, Project};
use crate::core::tree::ArgTree;
use crate::models::ParamType;
use colored::Colorize;
use std::fmt::Write;

/// What `render_tree` shows besides names and values.
#[derive(Debug, Clone, Default)]
pub struct DisplayOptions {
    /// Print each node's id after its label.
    pub show_ids: bool,
    /// Include projects hidden from the list.
    pub show_hidden: bool,
    /// Stop descending below this many levels.
    pub max_depth: Option<usize>,
}

/// Renders projects as an ASCII tree. `only` restricts the output to one project.
pub fn render_tree(tree: &ArgTree, only: Option<uuid::Uuid>, options: &DisplayOptions) -> String {
    let mut out = String::new();
    for project in tree.projects() {
        if only.is_some_and(|id| id != project.id) {
            continue;
        }
        if project.hidden_in_list() && !options.show_hidden && only.is_none() {
            continue;
        }
        render_project(&mut out, project, options);
    }
    out
}

fn render_project(out: &mut String, project: &Project, options: &DisplayOptions) {
    let mut header = project.display_name().bold().to_string();
    if project.is_startup_project {
        header.push_str(&format!(" {}", "(startup)".green()));
    }
    if project.hidden_in_list() {
        header.push_str(&format!(" {}", "(hidden)".dimmed()));
    }
    header.push_str(&attributes(&project.container));
    if options.show_ids {
        header.push_str(&format!(" {}", project.id.to_string().dimmed()));
    }
    let _ = writeln!(out, "{}", header);
    render_children(out, &project.container, "", 1, options);
}

fn render_children(
    out: &mut String,
    container: &Container,
    prefix: &str,
    depth: usize,
    options: &DisplayOptions,
) {
    if options.max_depth.is_some_and(|max| depth > max) {
        return;
    }
    let count = container.len();
    for (i, item) in container.items().iter().enumerate() {
        let is_last = i + 1 == count;
        let connector = if is_last { "└─" } else { "├─" };
        let _ = writeln!(out, "{}{} {}", prefix, connector, describe(item, options));
        if let Item::Group(group) = item {
            let child_prefix = format!("{}{}", prefix, if is_last { "   " } else { "│  " });
            render_children(out, &group.container, &child_prefix, depth + 1, options);
        }
    }
}

fn describe(item: &Item, options: &DisplayOptions) -> String {
    let mut line = match item {
        Item::Parameter(p) => {
            let check = if p.enabled { "[x]" } else { "[ ]" };
            let mut value = if p.value.is_empty() {
                "\"\"".to_string()
            } else {
                p.value.clone()
            };
            if p.param_type != ParamType::CmdArg {
                value = format!("{} {}", format!("{}:", p.param_type.tag()).yellow(), value);
            }
            if p.default_checked {
                value.push_str(&format!(" {}", "*".cyan()));
            }
            if p.is_active {
                format!("{} {}", check, value)
            } else {
                format!("{} {}", check, value).dimmed().to_string()
            }
        }
        Item::Group(g) => {
            let check = if g.container.any_enabled() { "[x]" } else { "[ ]" };
            format!(
                "{} {}{}",
                check,
                g.container.display_name.blue().bold(),
                attributes(&g.container)
            )
        }
    };
    if options.show_ids {
        line.push_str(&format!(" {}", item.id().to_string().dimmed()));
    }
    line
}

fn attributes(container: &Container) -> String {
    let mut parts = Vec::new();
    if container.exclusive_mode {
        parts.push("exclusive".to_string());
    }
    for (name, value) in [
        ("delimiter", &container.delimiter),
        ("prefix", &container.prefix),
        ("postfix", &container.postfix),
        ("config", &container.project_config),
        ("platform", &container.project_platform),
        ("profile", &container.launch_profile),
    ] {
        if let Some(value) = value {
            parts.push(format!("{}={:?}", name, value));
        }
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" {}", format!("{{{}}}", parts.join(", ")).magenta())
    }
}
