//! Configuration file handling.
//!
//! The config names the packages to install and how to reach the Nix tools.
//! Every key is optional; anything missing falls back to the defaults below.
//!
//! ```toml
//! registry = "nixpkgs"
//! base_packages = ["bash", "coreutils"]
//! additional_packages = ["ripgrep"]
//!
//! [nix]
//! nix = "nix"
//! nix_store = "nix-store"
//! experimental_features = true
//! ```

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::platform::paths::default_config_file;
use crate::request::{PackageRequest, dedup_requests};

/// Packages every environment gets unless base packages are disabled.
pub const DEFAULT_BASE_PACKAGES: &[&str] = &[
  "bash",
  "bash-completion",
  "bc",
  "curl",
  "diffutils",
  "findutils",
  "glibc",
  "gnupg",
  "iputils",
  "inetutils",
  "keyutils",
  "less",
  "lsof",
  "man",
  "mlocate",
  "mtr",
  "ncurses",
  "nssmdns",
  "openssh",
  "pigz",
  "pinentry-tty",
  "procps",
  "rsync",
  "shadow",
  "sudo",
  "tcpdump",
  "time",
  "traceroute",
  "tree",
  "tzdata",
  "unzip",
  "util-linux",
  "wget",
  "zip",
];

pub const DEFAULT_REGISTRY: &str = "nixpkgs";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Registry used to qualify bare package names.
  pub registry: String,

  /// Packages installed into every environment.
  pub base_packages: Vec<String>,

  /// User packages. These take precedence over base packages on binary name collisions.
  pub additional_packages: Vec<String>,

  pub nix: NixConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      registry: DEFAULT_REGISTRY.to_string(),
      base_packages: DEFAULT_BASE_PACKAGES.iter().map(|s| s.to_string()).collect(),
      additional_packages: Vec::new(),
      nix: NixConfig::default(),
    }
  }
}

/// How to invoke the Nix command line tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NixConfig {
  /// Program used for `build`.
  pub nix: PathBuf,

  /// Program used for closure queries.
  pub nix_store: PathBuf,

  /// Pass `--extra-experimental-features "nix-command flakes"` to `nix`.
  pub experimental_features: bool,
}

impl Default for NixConfig {
  fn default() -> Self {
    Self {
      nix: PathBuf::from("nix"),
      nix_store: PathBuf::from("nix-store"),
      experimental_features: true,
    }
  }
}

impl Config {
  /// Loads the configuration.
  ///
  /// An explicit path must exist. Otherwise `$YADT_CONFIG` or the XDG config
  /// file is used when present, and the built-in defaults when not.
  pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
    if let Some(path) = explicit {
      return Self::from_file(path);
    }

    match default_config_file() {
      Some(path) => match std::fs::read_to_string(&path) {
        Ok(text) => Self::parse(&text, &path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
          debug!(path = %path.display(), "no config file, using defaults");
          Ok(Self::default())
        }
        Err(source) => Err(ConfigError::Read { path, source }),
      },
      None => Ok(Self::default()),
    }
  }

  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::parse(&text, path)
  }

  fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
    debug!(path = %path.display(), "loading config");
    toml::from_str(text).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Builds the ordered request list.
  ///
  /// Order is `additional_packages`, then `extra`, then `base_packages`
  /// (when `include_base` is set). Bare names are qualified with the
  /// registry and repeats keep their first position.
  pub fn requests<S: AsRef<str>>(&self, extra: &[S], include_base: bool) -> Vec<PackageRequest> {
    let base: &[String] = if include_base { &self.base_packages } else { &[] };

    let names = self
      .additional_packages
      .iter()
      .map(String::as_str)
      .chain(extra.iter().map(AsRef::as_ref))
      .chain(base.iter().map(String::as_str));

    dedup_requests(names.map(|name| PackageRequest::qualified(&self.registry, name)))
  }
}
