//! # System Interaction Layer
//!
//! Everything that touches the file system or other threads. The engine in `core` never
//! does I/O itself; the workspace calls into these modules.
//!
//! ## Modules
//!
//! - **`file_store`**: the version-controlled `*.args.json` files, one per project or one
//!   per solution. Remembers content hashes so its own writes can be recognised.
//! - **`legacy_store`**: the private binary store (bincode + LZ4) holding per-user state.
//! - **`notifications`**: a channel through which watchers on any thread report changes.

pub mod file_store;
pub mod legacy_store;
pub mod notifications;
