//! Test utilities for yadt-lib.
//!
//! `FakeStore` lays out package outputs in a temporary directory, and the
//! fake collaborators stand in for Nix in materialization tests.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::materialize::{
  BuildOutput, Closure, ClosureComputer, ClosureError, PackageBuilder, ResolutionError,
};
use crate::request::PackageRequest;

/// A temporary directory standing in for a store.
pub struct FakeStore {
  temp: TempDir,
}

impl FakeStore {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  /// Creates an output named `name` with an executable per entry of `bins`.
  pub fn package(&self, name: &str, bins: &[&str]) -> BuildOutput {
    let output = self.docs_only(name);
    let bin_dir = output.bin_dir();
    fs::create_dir_all(&bin_dir).unwrap();

    for bin in bins {
      let path = bin_dir.join(bin);
      fs::write(&path, format!("#!/bin/sh\necho {}\n", bin)).unwrap();
      make_executable(&path);
    }

    output
  }

  /// Creates an output with no `bin/` directory.
  pub fn docs_only(&self, name: &str) -> BuildOutput {
    let path = self.temp.path().join(name);
    fs::create_dir_all(path.join("share").join("doc")).unwrap();
    fs::write(path.join("share").join("doc").join("README"), name).unwrap();
    BuildOutput::new(PackageRequest::new(name), "out", path)
  }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
  use std::os::unix::fs::PermissionsExt;
  fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(windows)]
fn make_executable(_path: &Path) {}

/// Resolves requests from a fixed table; unknown requests fail the whole batch.
pub struct FakeBuilder {
  pub outputs: HashMap<String, BuildOutput>,
}

impl FakeBuilder {
  pub fn new<I: IntoIterator<Item = BuildOutput>>(outputs: I) -> Self {
    Self {
      outputs: outputs.into_iter().map(|o| (o.request.0.clone(), o)).collect(),
    }
  }
}

impl PackageBuilder for FakeBuilder {
  async fn build(&self, requests: &[PackageRequest]) -> Result<Vec<BuildOutput>, ResolutionError> {
    requests
      .iter()
      .map(|r| {
        self.outputs.get(r.as_str()).cloned().ok_or_else(|| ResolutionError::BuildFailed {
          code: Some(1),
          stderr: format!("unknown package {}", r),
        })
      })
      .collect()
  }
}

/// Returns each output plus a fixed set of dependencies per output path.
#[derive(Default)]
pub struct FakeClosure {
  pub deps: HashMap<PathBuf, Vec<PathBuf>>,
}

impl ClosureComputer for FakeClosure {
  async fn requisites(&self, outputs: &[BuildOutput]) -> Result<Closure, ClosureError> {
    let mut paths = BTreeSet::new();
    for output in outputs {
      paths.extend(self.deps.get(&output.path).cloned().unwrap_or_default());
    }
    Ok(paths.into_iter().collect())
  }
}
