// src/core/mod.rs

pub mod composer;
pub mod graph_display;
pub mod history;
pub mod item;
/// Locating and expanding storage paths.
pub mod paths;
pub mod reconcile;
pub mod resolver;
pub mod schema;
pub mod selection;
pub mod settings;
pub mod tree;
pub mod workspace;
