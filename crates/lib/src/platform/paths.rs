use std::path::PathBuf;

use crate::consts::{APP_NAME, CONFIG_ENV, CONFIG_FILENAME};

/// Returns the user's home directory, if `HOME` is set.
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("HOME").filter(|h| !h.is_empty()).map(PathBuf::from)
}

/// Returns the directory for configuration files for the application
pub fn config_dir() -> Option<PathBuf> {
  let config_home = std::env::var_os("XDG_CONFIG_HOME")
    .filter(|p| !p.is_empty())
    .map(PathBuf::from)
    .or_else(|| home_dir().map(|h| h.join(".config")))?;
  Some(config_home.join(APP_NAME))
}

/// Returns the config file to load when none was given explicitly.
///
/// `YADT_CONFIG` wins over the XDG location.
pub fn default_config_file() -> Option<PathBuf> {
  if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
    return Some(PathBuf::from(path));
  }

  config_dir().map(|dir| dir.join(CONFIG_FILENAME))
}
