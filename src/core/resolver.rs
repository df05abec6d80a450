// src/core/resolver.rs

//! # Active-Item Resolver
//!
//! Decides which parameters would actually reach a launched process.
//!
//! Parameters are walked in tree order. Every enabled `CmdArg` is active. For `EnvVar`
//! entries only the last enabled occurrence of a name is active. For `WorkDir` and
//! `LaunchApp` the last enabled entry wins. A type whose management flag is off is never
//! active. Containers bound to another configuration, platform or launch profile than the
//! current launch context are skipped entirely.

use crate::core::item::{Container, Item, Parameter, Project};
use crate::core::settings::InactiveDisableMode;
use crate::core::tree::ArgTree;
use crate::models::ParamType;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use uuid::Uuid;

lazy_static! {
    /// `NAME=VALUE`. The name is everything before the first `=`, without surrounding spaces.
    static ref ENV_VAR_REGEX: Regex = Regex::new(r"^\s*([^=\s]+)\s*=(.*)$").unwrap();
}

/// Splits `NAME=VALUE`. Returns `None` for anything else.
pub fn parse_env_var(value: &str) -> Option<(&str, &str)> {
    let captures = ENV_VAR_REGEX.captures(value)?;
    Some((captures.get(1)?.as_str(), captures.get(2)?.as_str()))
}

/// Per-type management switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManageFlags {
    /// Command-line arguments.
    pub command_line_args: bool,
    /// Environment variables.
    pub environment_vars: bool,
    /// Working directories.
    pub working_directories: bool,
    /// Launch applications.
    pub launch_application: bool,
}

impl Default for ManageFlags {
    fn default() -> Self {
        Self {
            command_line_args: true,
            environment_vars: true,
            working_directories: true,
            launch_application: true,
        }
    }
}

impl ManageFlags {
    /// Whether parameters of `param_type` take part in resolution.
    pub fn manages(&self, param_type: ParamType) -> bool {
        match param_type {
            ParamType::CmdArg => self.command_line_args,
            ParamType::EnvVar => self.environment_vars,
            ParamType::WorkDir => self.working_directories,
            ParamType::LaunchApp => self.launch_application,
        }
    }
}

/// The configuration a launch happens under. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchContext {
    /// Active build configuration, e.g. `Debug`.
    pub config: Option<String>,
    /// Active platform, e.g. `x64`.
    pub platform: Option<String>,
    /// Active launch profile.
    pub launch_profile: Option<String>,
}

impl LaunchContext {
    /// Whether a container's overrides allow it under this context (case-insensitive).
    pub fn accepts(&self, container: &Container) -> bool {
        fn matches(wanted: Option<&String>, current: Option<&String>) -> bool {
            match (wanted.filter(|w| !w.is_empty()), current) {
                (Some(wanted), Some(current)) => wanted.eq_ignore_ascii_case(current),
                _ => true,
            }
        }
        matches(container.project_config.as_ref(), self.config.as_ref())
            && matches(container.project_platform.as_ref(), self.platform.as_ref())
            && matches(container.launch_profile.as_ref(), self.launch_profile.as_ref())
    }
}

/// The resolved active set of one project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveItems {
    /// Active arguments, in tree order.
    pub args: Vec<Uuid>,
    /// Variable name to the parameter that wins it, in first-seen order.
    pub env_vars: IndexMap<String, Uuid>,
    /// The last active working directory.
    pub work_dir: Option<Uuid>,
    /// The last active launch application.
    pub launch_app: Option<Uuid>,
}

impl ActiveItems {
    /// Every active id, regardless of type.
    pub fn ids(&self) -> HashSet<Uuid> {
        self.args
            .iter()
            .chain(self.env_vars.values())
            .chain(self.work_dir.iter())
            .chain(self.launch_app.iter())
            .copied()
            .collect()
    }
}

/// Parameters not excluded by the launch context, in tree order.
pub fn eligible_parameters<'a>(container: &'a Container, context: &LaunchContext) -> Vec<&'a Parameter> {
    let mut out = Vec::new();
    collect_eligible(container, context, &mut out);
    out
}

fn collect_eligible<'a>(container: &'a Container, context: &LaunchContext, out: &mut Vec<&'a Parameter>) {
    if !context.accepts(container) {
        return;
    }
    for item in container.items() {
        match item {
            Item::Parameter(p) => out.push(p),
            Item::Group(g) => collect_eligible(&g.container, context, out),
        }
    }
}

/// Computes the active set of a project.
pub fn active_items(project: &Project, flags: &ManageFlags, context: &LaunchContext) -> ActiveItems {
    let mut active = ActiveItems::default();
    for param in eligible_parameters(&project.container, context) {
        if !param.enabled || !flags.manages(param.param_type) {
            continue;
        }
        match param.param_type {
            ParamType::CmdArg => active.args.push(param.id),
            ParamType::EnvVar => {
                if let Some((name, _)) = parse_env_var(&param.value) {
                    active.env_vars.insert(name.to_string(), param.id);
                } else {
                    log::debug!("Ignoring malformed environment entry '{}'.", param.value);
                }
            }
            ParamType::WorkDir => active.work_dir = Some(param.id),
            ParamType::LaunchApp => active.launch_app = Some(param.id),
        }
    }
    active
}

/// Marks `is_active` on every parameter of a project.
pub fn resolve_project(
    project: &mut Project,
    flags: &ManageFlags,
    context: &LaunchContext,
    mode: InactiveDisableMode,
) {
    let compute = match mode {
        InactiveDisableMode::Disabled => false,
        InactiveDisableMode::InStartupProject => project.is_startup_project,
        InactiveDisableMode::InAllProjects => true,
    };
    if !compute {
        project.for_each_parameter_mut(|p| p.is_active = true);
        return;
    }
    let active = active_items(project, flags, context).ids();
    project.for_each_parameter_mut(|p| p.is_active = active.contains(&p.id));
}

/// Marks `is_active` across the whole tree.
pub fn resolve_tree(
    tree: &mut ArgTree,
    flags: &ManageFlags,
    context: &LaunchContext,
    mode: InactiveDisableMode,
) {
    for project in tree.projects_mut() {
        resolve_project(project, flags, context, mode);
    }
}

/// Coalesces bursts of triggers into one run after a quiet window.
///
/// Time is passed in, so the owner decides where the clock comes from.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    /// A debouncer with nothing pending.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Records a change; pushes the deadline out by one window.
    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    /// Drops a pending run.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Whether a refresh is scheduled.
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns `true` once, when the window has passed since the last trigger.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
