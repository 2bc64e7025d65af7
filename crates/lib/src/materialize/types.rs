//! Types for profile and closure materialization.
//!
//! This module defines the values flowing through a materialization run
//! and the error types for each of its stages.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::consts::BIN_DIR;
use crate::request::PackageRequest;

/// A store path produced by building a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildOutput {
  /// The request this output was built for.
  pub request: PackageRequest,
  /// Output name as reported by the builder (`out`, `bin`, `man`, ...).
  pub output: String,
  /// Store path of the output.
  pub path: PathBuf,
}

impl BuildOutput {
  pub fn new(request: PackageRequest, output: impl Into<String>, path: impl Into<PathBuf>) -> Self {
    Self {
      request,
      output: output.into(),
      path: path.into(),
    }
  }

  /// Directory whose entries are candidates for the profile.
  pub fn bin_dir(&self) -> PathBuf {
    self.path.join(BIN_DIR)
  }
}

/// Runtime closure of a set of build outputs.
///
/// Kept sorted so listings and exports are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Closure {
  paths: BTreeSet<PathBuf>,
}

impl Closure {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, path: impl Into<PathBuf>) -> bool {
    self.paths.insert(path.into())
  }

  pub fn contains(&self, path: &Path) -> bool {
    self.paths.contains(path)
  }

  pub fn iter(&self) -> impl Iterator<Item = &Path> {
    self.paths.iter().map(PathBuf::as_path)
  }

  pub fn len(&self) -> usize {
    self.paths.len()
  }

  pub fn is_empty(&self) -> bool {
    self.paths.is_empty()
  }
}

impl FromIterator<PathBuf> for Closure {
  fn from_iter<I: IntoIterator<Item = PathBuf>>(iter: I) -> Self {
    Self {
      paths: iter.into_iter().collect(),
    }
  }
}

/// One link in the profile directory: `<profile>/<name> -> <source>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileEntry {
  pub name: String,
  /// The binary the link points at.
  pub source: PathBuf,
  /// The build output that contributed the binary.
  pub output: PathBuf,
}

/// A binary that lost a name collision and was left out of the profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collision {
  pub name: String,
  pub kept: PathBuf,
  pub discarded: PathBuf,
}

/// The flattened set of binaries to expose.
///
/// Names are unique. The first entry registered under a name is kept and
/// every later candidate for that name is recorded as a [`Collision`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Profile {
  entries: BTreeMap<String, ProfileEntry>,
  collisions: Vec<Collision>,
}

impl Profile {
  pub fn new() -> Self {
    Self::default()
  }

  /// Inserts `entry` unless its name is already taken.
  ///
  /// Returns `true` if the entry was added.
  pub fn insert(&mut self, entry: ProfileEntry) -> bool {
    match self.entries.get(&entry.name) {
      Some(existing) => {
        self.collisions.push(Collision {
          name: entry.name,
          kept: existing.source.clone(),
          discarded: entry.source,
        });
        false
      }
      None => {
        self.entries.insert(entry.name.clone(), entry);
        true
      }
    }
  }

  pub fn get(&self, name: &str) -> Option<&ProfileEntry> {
    self.entries.get(name)
  }

  /// Entries in name order.
  pub fn entries(&self) -> impl Iterator<Item = &ProfileEntry> {
    self.entries.values()
  }

  /// Collisions in the order they were encountered.
  pub fn collisions(&self) -> &[Collision] {
    &self.collisions
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

/// Everything a successful run produces. Never constructed partially.
#[derive(Debug, Clone, Serialize)]
pub struct Materialized {
  pub outputs: Vec<BuildOutput>,
  pub closure: Closure,
  pub profile: Profile,
}

/// A request could not be built.
#[derive(Debug, Error)]
pub enum ResolutionError {
  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("package build failed with exit code {code:?}: {stderr}")]
  BuildFailed { code: Option<i32>, stderr: String },

  #[error("unexpected package builder output: {0}")]
  InvalidOutput(String),

  #[error("package builder returned no outputs for {0}")]
  NoOutputs(PackageRequest),
}

/// The closure of the resolved outputs could not be computed.
#[derive(Debug, Error)]
pub enum ClosureError {
  #[error("build output no longer exists: {0}")]
  MissingOutput(PathBuf),

  #[error("failed to inspect build output {path}: {source}")]
  Inspect {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("closure query failed with exit code {code:?}: {stderr}")]
  QueryFailed { code: Option<i32>, stderr: String },
}

/// The profile could not be built or written.
#[derive(Debug, Error)]
pub enum ProfileError {
  #[error("failed to read binary directory {path}: {source}")]
  ReadBinDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("profile directory does not exist: {0}")]
  TargetMissing(PathBuf),

  #[error("profile directory is not empty: {0}")]
  TargetNotEmpty(PathBuf),

  #[error("failed to link {link} -> {target}: {source}")]
  Link {
    link: PathBuf,
    target: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

/// Any fatal error of a materialization run.
#[derive(Debug, Error)]
pub enum MaterializeError {
  #[error("resolution failed: {0}")]
  Resolution(#[from] ResolutionError),

  #[error("closure computation failed: {0}")]
  Closure(#[from] ClosureError),

  #[error("profile construction failed: {0}")]
  Profile(#[from] ProfileError),
}
