//! # argtree
//!
//! A persistent, reconciled tree of launch parameters (command-line arguments, environment
//! variables, working directory, launch program) for every project of a solution.
//!
//! - [`core`] holds the item model and the engine around it (resolution, composition,
//!   reconciliation, history and the [`core::workspace::Workspace`] that ties them together).
//! - [`system`] talks to the file system: parameter files, the legacy store and change
//!   notifications.
//! - [`cli`] is the `argtree` command-line front end.

include!(concat!(env!("OUT_DIR"), "/translations.rs"));

/// Command-line front end.
pub mod cli;
/// File names, versions and other fixed values.
pub mod constants;
/// The engine: item model, reconciliation, resolution, history and the workspace.
pub mod core;
/// Profiling helpers.
pub mod dev_utils;
/// Persisted records: JSON files, the legacy store and project enumeration.
pub mod models;
pub mod system;
