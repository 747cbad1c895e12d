//! Locating the sched_config file.
//!
//! Resolution order: explicit path → `SCHED_CONFIG` → `$PBS_HOME/sched_priv/sched_config`
//! → the stock install location.

use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the configuration file directly.
pub const ENV_SCHED_CONFIG: &str = "SCHED_CONFIG";
/// Environment variable naming the batch system home directory.
pub const ENV_PBS_HOME: &str = "PBS_HOME";
/// Home directory used when `PBS_HOME` is unset.
pub const DEFAULT_PBS_HOME: &str = "/var/spool/pbs";

const SCHED_PRIV: &str = "sched_priv";
const CONFIG_FILE_NAME: &str = "sched_config";

/// Where the configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit,
    Environment,
    PbsHome,
    Default,
}

/// The resolved configuration location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub sched_config: PathBuf,
    pub source: ConfigSource,
}

impl ConfigPaths {
    /// Resolve against the process environment.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        Self::resolve_with(explicit, |key| std::env::var(key).ok())
    }

    /// Resolve with an injectable environment lookup.
    pub fn resolve_with<F>(explicit: Option<&Path>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let (sched_config, source) = if let Some(path) = explicit {
            (path.to_path_buf(), ConfigSource::Explicit)
        } else if let Some(path) = non_empty(ENV_SCHED_CONFIG) {
            (PathBuf::from(path), ConfigSource::Environment)
        } else if let Some(home) = non_empty(ENV_PBS_HOME) {
            (sched_config_under(Path::new(&home)), ConfigSource::PbsHome)
        } else {
            (
                sched_config_under(Path::new(DEFAULT_PBS_HOME)),
                ConfigSource::Default,
            )
        };

        debug!(path = %sched_config.display(), ?source, "resolved sched_config");
        Self {
            sched_config,
            source,
        }
    }
}

fn sched_config_under(home: &Path) -> PathBuf {
    home.join(SCHED_PRIV).join(CONFIG_FILE_NAME)
}
