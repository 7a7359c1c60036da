mod bmagent;

use std::{env, io, path::PathBuf};

use thiserror::Error;

pub use bmagent::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("config is invalid: {0}")]
    Parse(#[from] toml::de::Error),
}

fn home() -> PathBuf {
    PathBuf::from(env::var_os("HOME").expect("HOME should be set"))
}

/// Resolves an XDG base directory, falling back to `fallback` below `$HOME`,
/// and appends the package name.
fn xdg_dir(variable: &str, fallback: &str) -> PathBuf {
    let mut dir = env::var_os(variable)
        .filter(|dir| !dir.is_empty())
        .map_or_else(|| home().join(fallback), PathBuf::from);
    dir.push(env!("CARGO_PKG_NAME"));
    dir
}

fn default_config_file() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", ".config").join("config.toml")
}

fn default_state_dir() -> PathBuf {
    xdg_dir("XDG_STATE_HOME", ".local/state")
}
