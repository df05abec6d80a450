// src/cli/handlers/mod.rs

pub mod clean;
/// `cmdline`: print a project's command line.
pub mod cmdline;
/// Helpers shared by the handlers.
pub mod commons;
/// `env`: print a project's environment.
pub mod env;
/// `set`: edit items from the command line.
pub mod set;
pub mod sync;
/// `tree`: render the parameter tree.
pub mod tree;
