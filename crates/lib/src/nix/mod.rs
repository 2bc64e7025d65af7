//! Nix-backed collaborators.
//!
//! [`NixBuilder`] builds requests with `nix build --json` and
//! [`NixClosure`] queries runtime closures with `nix-store --query --requisites`.
//! Both run the tools as child processes and treat them as black boxes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::NixConfig;
use crate::materialize::{BuildOutput, Closure, ClosureComputer, ClosureError, PackageBuilder, ResolutionError};
use crate::request::PackageRequest;

const EXPERIMENTAL_FEATURES: &str = "nix-command flakes";

/// One element of the `nix build --json` array.
#[derive(Debug, Deserialize)]
struct BuildResult {
  outputs: BTreeMap<String, PathBuf>,
}

/// Builds packages with `nix build`.
#[derive(Debug, Clone)]
pub struct NixBuilder {
  program: PathBuf,
  experimental_features: bool,
}

impl NixBuilder {
  pub fn new(program: impl Into<PathBuf>, experimental_features: bool) -> Self {
    Self {
      program: program.into(),
      experimental_features,
    }
  }

  pub fn from_config(config: &NixConfig) -> Self {
    Self::new(&config.nix, config.experimental_features)
  }

  fn command(&self, requests: &[PackageRequest]) -> Command {
    let mut cmd = Command::new(&self.program);
    if self.experimental_features {
      cmd.args(["--extra-experimental-features", EXPERIMENTAL_FEATURES]);
    }
    cmd
      .args(["build", "--no-link", "--json"])
      .args(requests.iter().map(PackageRequest::as_str))
      .stdin(Stdio::null());
    cmd
  }
}

impl PackageBuilder for NixBuilder {
  async fn build(&self, requests: &[PackageRequest]) -> Result<Vec<BuildOutput>, ResolutionError> {
    info!(program = %self.program.display(), count = requests.len(), "running nix build");

    let output = self
      .command(requests)
      .output()
      .await
      .map_err(|source| ResolutionError::Spawn {
        program: self.program.display().to_string(),
        source,
      })?;

    if !output.status.success() {
      return Err(ResolutionError::BuildFailed {
        code: output.status.code(),
        stderr: stderr_text(&output),
      });
    }

    parse_build_json(requests, &output.stdout)
  }
}

/// Maps the `nix build --json` output back onto the requests.
///
/// Nix reports one result per installable, in argument order. Within a
/// result the `out` output comes first and the rest follow by name.
fn parse_build_json(requests: &[PackageRequest], stdout: &[u8]) -> Result<Vec<BuildOutput>, ResolutionError> {
  let results: Vec<BuildResult> =
    serde_json::from_slice(stdout).map_err(|e| ResolutionError::InvalidOutput(e.to_string()))?;

  if results.len() != requests.len() {
    return Err(ResolutionError::InvalidOutput(format!(
      "expected {} results, got {}",
      requests.len(),
      results.len()
    )));
  }

  let mut outputs = Vec::new();
  for (request, mut result) in requests.iter().zip(results) {
    if result.outputs.is_empty() {
      return Err(ResolutionError::NoOutputs(request.clone()));
    }

    if let Some(out) = result.outputs.remove("out") {
      outputs.push(BuildOutput::new(request.clone(), "out", out));
    }
    for (name, path) in result.outputs {
      outputs.push(BuildOutput::new(request.clone(), name, path));
    }
  }

  Ok(outputs)
}

/// Computes closures with `nix-store --query --requisites`.
#[derive(Debug, Clone)]
pub struct NixClosure {
  program: PathBuf,
}

impl NixClosure {
  pub fn new(program: impl Into<PathBuf>) -> Self {
    Self { program: program.into() }
  }

  pub fn from_config(config: &NixConfig) -> Self {
    Self::new(&config.nix_store)
  }
}

impl ClosureComputer for NixClosure {
  async fn requisites(&self, outputs: &[BuildOutput]) -> Result<Closure, ClosureError> {
    debug!(program = %self.program.display(), outputs = outputs.len(), "querying closure");

    let output = Command::new(&self.program)
      .args(["--query", "--requisites"])
      .args(outputs.iter().map(|o| o.path.as_os_str()))
      .stdin(Stdio::null())
      .output()
      .await
      .map_err(|source| ClosureError::Spawn {
        program: self.program.display().to_string(),
        source,
      })?;

    if !output.status.success() {
      return Err(ClosureError::QueryFailed {
        code: output.status.code(),
        stderr: stderr_text(&output),
      });
    }

    Ok(parse_requisites(&String::from_utf8_lossy(&output.stdout)))
  }
}

fn parse_requisites(stdout: &str) -> Closure {
  stdout
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .map(PathBuf::from)
    .collect()
}

fn stderr_text(output: &Output) -> String {
  String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Resolves a configured program to the executable that would run, for diagnostics.
pub fn find_program(program: &Path) -> Option<PathBuf> {
  which::which(program).ok()
}
