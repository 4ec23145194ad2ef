//! Filesystem layout under the harbor home.
//!
//! ```text
//! ~/.harbor/
//!   config.yaml
//!   stores/
//!     vessels/<hex(key)>.json
//!     berths/<hex(key)>.json
//!   run/harbor.sock
//!   run/locks/<hex(vessel id)>.lock
//! ```
//!
//! Every helper takes an explicit `home`; only [`home`] touches the
//! environment. Tests always pass a `TempDir`.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const HARBOR_DIR: &str = ".harbor";
pub const CONFIG_FILE: &str = "config.yaml";
pub const SOCKET_FILE: &str = "harbor.sock";

/// The user's home directory, via `dirs::home_dir()`.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

pub fn harbor_root(home: &Path) -> PathBuf {
    home.join(HARBOR_DIR)
}

pub fn config_path(home: &Path) -> PathBuf {
    harbor_root(home).join(CONFIG_FILE)
}

pub fn stores_root(home: &Path) -> PathBuf {
    harbor_root(home).join("stores")
}

pub fn vessel_store_dir(home: &Path) -> PathBuf {
    stores_root(home).join("vessels")
}

pub fn berth_store_dir(home: &Path) -> PathBuf {
    stores_root(home).join("berths")
}

pub fn run_dir(home: &Path) -> PathBuf {
    harbor_root(home).join("run")
}

pub fn socket_path(home: &Path) -> PathBuf {
    run_dir(home).join(SOCKET_FILE)
}

/// Per-vessel transition lock files, shared by the daemon and the CLI.
pub fn transition_locks_dir(home: &Path) -> PathBuf {
    run_dir(home).join("locks")
}
