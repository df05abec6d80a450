// src/constants.rs

use uuid::Uuid;

/// Suffix of a per-project parameter file (`<ProjectName>.args.json`).
pub const PROJECT_FILE_SUFFIX: &str = "args.json";

/// Extension swapped onto the solution file name to locate the solution-wide parameter file.
pub const SOLUTION_FILE_EXTENSION: &str = "args.json";

/// Extension swapped onto the solution file name to locate per-solution settings.
pub const SOLUTION_SETTINGS_EXTENSION: &str = "ArgsCfg.toml";

/// Extension swapped onto the solution file name to locate the private legacy state blob.
pub const LEGACY_STORE_EXTENSION: &str = "argtree.bin";

/// The name of the user-wide settings file (in `~/.config/argtree/`).
pub const USER_SETTINGS_FILENAME: &str = "settings.toml";

/// The name of the directory holding user-wide configuration.
pub const CONFIG_DIR_NAME: &str = "argtree";

/// The default name of the CLI workspace manifest.
pub const MANIFEST_FILENAME: &str = "argtree.toml";

/// The environment variable that overrides the manifest location.
pub const MANIFEST_ENV_VAR: &str = "ARGTREE_MANIFEST";

/// The current version written into every parameter file.
pub const FILE_VERSION: u32 = 2;

/// The current version of the legacy binary layout.
pub const LEGACY_STORE_VERSION: u32 = 1;

/// Default quiescence window for active-item recomputation.
pub const DEFAULT_DEBOUNCE_MS: u64 = 250;

/// Default number of undo states kept per workspace.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Project-system kind of native C++ projects.
pub const CPP_PROJECT_KIND: Uuid = Uuid::from_u128(0x8BC9CEB8_8B4A_11D0_8D11_00A0C91BC942);
