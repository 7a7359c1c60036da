use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};

use derive_getters::Getters;
use log::debug;
use serde::Deserialize;

use crate::config::{ConfigError, default_config_file, default_state_dir};

#[derive(Debug, Deserialize, Getters)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory holding the message store.
    #[serde(default = "default_state_dir")]
    statedir: PathBuf,
    /// Folder whose mailbox accepts drafts.
    #[serde(default = "drafts")]
    drafts: String,
}

fn drafts() -> String {
    "Drafts".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            statedir: default_state_dir(),
            drafts: drafts(),
        }
    }
}

impl Config {
    /// Reads `file`, or the default location if none is given. Only a missing
    /// default file is acceptable and yields the defaults.
    pub fn load(file: Option<PathBuf>) -> Result<Self, ConfigError> {
        if let Some(file) = file {
            return Self::load_from_file(&file);
        }

        let file = default_config_file();
        if file.exists() {
            Self::load_from_file(&file)
        } else {
            debug!("no config at {}, using defaults", file.display());
            Ok(Self::default())
        }
    }

    fn load_from_file(file: &Path) -> Result<Self, ConfigError> {
        debug!("loading config from {}", file.display());
        let contents = read_to_string(file).map_err(|source| ConfigError::Read {
            path: file.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }
}
