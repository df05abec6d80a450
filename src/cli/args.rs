// src/cli/args.rs

//! Argument groups shared by several handlers.

use crate::core::composer::EnvShell;
use crate::core::resolver::LaunchContext;
use crate::models::ParamType;
use clap::{Args, ValueEnum};

/// The launch context a command resolves parameters under.
#[derive(Args, Debug, Default, Clone)]
pub struct LaunchArgs {
    /// Build configuration (e.g. "Debug"). Groups bound to another configuration are skipped.
    #[arg(long)]
    pub config: Option<String>,

    /// Target platform (e.g. "x64").
    #[arg(long)]
    pub platform: Option<String>,

    /// Launch profile name.
    #[arg(long)]
    pub profile: Option<String>,
}

impl LaunchArgs {
    /// The launch context these flags describe.
    pub fn to_context(&self) -> LaunchContext {
        LaunchContext {
            config: self.config.clone(),
            platform: self.platform.clone(),
            launch_profile: self.profile.clone(),
        }
    }
}

/// Parameter kinds as spelled on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// A command-line argument.
    Arg,
    /// An environment variable, `NAME=VALUE`.
    Env,
    /// The working directory.
    Dir,
    /// The program to launch.
    App,
}

impl From<ParamKind> for ParamType {
    fn from(kind: ParamKind) -> Self {
        match kind {
            ParamKind::Arg => Self::CmdArg,
            ParamKind::Env => Self::EnvVar,
            ParamKind::Dir => Self::WorkDir,
            ParamKind::App => Self::LaunchApp,
        }
    }
}

/// How `env` prints the environment.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnvFormat {
    /// One `NAME=VALUE` per line.
    #[default]
    List,
    /// A PowerShell statement list.
    Powershell,
    /// A `cmd.exe` command chain.
    Cmd,
}

impl EnvFormat {
    /// The shell to format for, or `None` for a plain list.
    pub fn shell(self) -> Option<EnvShell> {
        match self {
            Self::List => None,
            Self::Powershell => Some(EnvShell::PowerShell),
            Self::Cmd => Some(EnvShell::Cmd),
        }
    }
}
