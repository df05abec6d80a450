use anyhow::{Result, anyhow};
use clap::Parser;
use colored::Colorize;

use crate::{
    cli::{args::ParamKind, handlers::commons},
    core::item::NodeRef,
};

#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    about = "Edits one item of the tree. Ids are shown by `tree --ids`."
)]
struct SetArgs {
    /// The item id, or a project (id, name or unique name).
    target: String,

    /// Check the item (a group or project checks all its parameters).
    #[arg(long, conflicts_with = "off")]
    on: bool,

    /// Uncheck the item.
    #[arg(long)]
    off: bool,

    /// New value of a parameter.
    #[arg(long)]
    value: Option<String>,

    /// New kind of a parameter.
    #[arg(long = "type", value_enum)]
    param_type: Option<ParamKind>,

    /// Flip whether a parameter is checked by default.
    #[arg(long)]
    toggle_default: bool,

    /// Restore the default check state of every parameter in the target's project.
    #[arg(long)]
    reset: bool,

    /// New display name of a group or project.
    #[arg(long)]
    name: Option<String>,

    /// Allow at most one checked child in a group or project.
    #[arg(long)]
    exclusive: Option<bool>,

    /// Separator between children ("" clears it).
    #[arg(long)]
    delimiter: Option<String>,

    /// Text placed before the joined children ("" clears it).
    #[arg(long)]
    prefix: Option<String>,

    /// Text placed after the joined children ("" clears it).
    #[arg(long)]
    postfix: Option<String>,

    /// Only use this container under the given build configuration ("" clears it).
    #[arg(long)]
    config: Option<String>,

    /// Only use this container on the given platform ("" clears it).
    #[arg(long)]
    platform: Option<String>,

    /// Only use this container with the given launch profile ("" clears it).
    #[arg(long)]
    profile: Option<String>,

    /// Hide or show a project in the list.
    #[arg(long)]
    hidden: Option<bool>,

    /// Split a parameter into one parameter per shell word.
    #[arg(long)]
    split: bool,

    /// Move the item one step up.
    #[arg(long, conflicts_with = "down")]
    up: bool,

    /// Move the item one step down.
    #[arg(long)]
    down: bool,

    /// Add a parameter with this value into (or after) the target.
    #[arg(long)]
    add: Option<String>,

    /// Kind of the parameter added with `--add`.
    #[arg(long, value_enum, default_value_t = ParamKind::Arg)]
    add_type: ParamKind,

    /// Add a group with this name into (or after) the target.
    #[arg(long)]
    add_group: Option<String>,

    /// Delete the item and everything below it.
    #[arg(long, conflicts_with_all = ["add", "add_group", "split"])]
    remove: bool,
}

fn optional(value: String) -> Option<String> {
    Some(value).filter(|v| !v.is_empty())
}

/// Entry point of `set`: edits one project and saves it.
pub fn handle(args: Vec<String>) -> Result<()> {
    let set_args = SetArgs::try_parse_from(&args)?;
    let mut session = commons::open_session(true)?;
    let workspace = &mut session.workspace;

    let target = commons::resolve_target(workspace, &set_args.target)?;
    let project = workspace
        .tree()
        .locate(target)
        .ok_or_else(|| anyhow!(t!("error.item_not_found"), id = target))?;
    let is_project = matches!(
        workspace.tree().project(project).and_then(|p| p.node(target)),
        Some(NodeRef::Project(_))
    );
    let mut changes = 0usize;

    if set_args.remove {
        workspace.select(target, false)?;
        changes += workspace.remove_selected()?;
        println!("{} {}", t!("common.success"), format!(t!("set.success"), count = changes));
        commons::print_warnings(workspace);
        return Ok(());
    }

    if set_args.on || set_args.off {
        workspace.set_enabled(target, set_args.on)?;
        changes += 1;
    }
    if let Some(value) = set_args.value {
        workspace.set_value(target, &value)?;
        changes += 1;
    }
    if let Some(kind) = set_args.param_type {
        workspace.set_param_type(target, kind.into())?;
        changes += 1;
    }
    if set_args.toggle_default {
        workspace.toggle_default_checked(target)?;
        changes += 1;
    }
    if set_args.reset {
        workspace.reset_to_default_checked(project)?;
        changes += 1;
    }
    if let Some(name) = set_args.name {
        workspace.set_display_name(target, &name)?;
        changes += 1;
    }
    if let Some(exclusive) = set_args.exclusive {
        workspace.set_exclusive_mode(target, exclusive)?;
        changes += 1;
    }
    if let Some(delimiter) = set_args.delimiter {
        workspace.set_delimiter(target, optional(delimiter))?;
        changes += 1;
    }
    if let Some(prefix) = set_args.prefix {
        workspace.set_prefix(target, optional(prefix))?;
        changes += 1;
    }
    if let Some(postfix) = set_args.postfix {
        workspace.set_postfix(target, optional(postfix))?;
        changes += 1;
    }
    if let Some(config) = set_args.config {
        workspace.set_project_config(target, optional(config))?;
        changes += 1;
    }
    if let Some(platform) = set_args.platform {
        workspace.set_project_platform(target, optional(platform))?;
        changes += 1;
    }
    if let Some(profile) = set_args.profile {
        workspace.set_launch_profile(target, optional(profile))?;
        changes += 1;
    }
    if let Some(hidden) = set_args.hidden {
        if !is_project {
            return Err(anyhow!(t!("set.error.not_a_project")));
        }
        workspace.set_hidden(project, hidden)?;
        changes += 1;
    }
    if set_args.split {
        let ids = workspace.split_argument(target)?;
        changes += ids.len().saturating_sub(1);
    }
    if set_args.up || set_args.down {
        workspace.select(target, false)?;
        changes += workspace.move_selected(if set_args.up { -1 } else { 1 })?;
    }
    if let Some(value) = set_args.add {
        workspace.select(target, false)?;
        let id = workspace.add_parameter(set_args.add_type.into(), &value)?;
        println!("  {} {}", "+".green(), id);
        changes += 1;
    }
    if let Some(name) = set_args.add_group {
        workspace.select(target, false)?;
        let id = workspace.add_group(&name)?;
        println!("  {} {}", "+".green(), id);
        changes += 1;
    }

    if changes == 0 {
        println!("{}", t!("set.nothing").dimmed());
    } else {
        println!("{} {}", t!("common.success"), format!(t!("set.success"), count = changes));
    }
    commons::print_warnings(workspace);
    Ok(())
}
