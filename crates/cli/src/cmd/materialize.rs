//! Implementation of the `yadt materialize` command.
//!
//! Builds the requested packages, then hands their artifacts to the
//! image-layering step:
//! - exports the closure (path list and/or copied tree)
//! - creates the profile directory and fills it with binary symlinks
//!
//! Every artifact is first written to a staging path next to its
//! destination. They are moved into place only once all of them have been
//! written; on any error the staging paths are removed and nothing is left
//! behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, warn};

use yadt_lib::export::{ExportStats, StagedExport, stage_closure, write_closure_list};
use yadt_lib::materialize::{BuildOutput, Closure, Profile, materialize};
use yadt_lib::nix::{NixBuilder, NixClosure};

use crate::output::{OutputFormat, format_bytes, format_duration, print_json, print_stat, print_success};

use super::{PackageArgs, load_config, runtime};

#[derive(Serialize)]
struct MaterializeReport<'a> {
  profile_dir: PathBuf,
  outputs: &'a [BuildOutput],
  closure: &'a Closure,
  profile: &'a Profile,
  export: Option<ExportStats>,
}

pub fn cmd_materialize(
  config: Option<&Path>,
  packages: &PackageArgs,
  profile_dir: &Path,
  closure_list: Option<&Path>,
  closure_root: Option<&Path>,
  output: OutputFormat,
) -> Result<()> {
  let start = Instant::now();

  if profile_dir.symlink_metadata().is_ok() {
    bail!("Profile directory already exists: {}", profile_dir.display());
  }

  let config = load_config(config)?;
  let requests = packages.requests(&config);
  let builder = NixBuilder::from_config(&config.nix);
  let computer = NixClosure::from_config(&config.nix);

  let result = runtime()?
    .block_on(materialize(&builder, &computer, &requests))
    .context("Materialization failed")?;

  for collision in result.profile.collisions() {
    warn!(
      name = %collision.name,
      kept = %collision.kept.display(),
      discarded = %collision.discarded.display(),
      "binary provided by more than one package, keeping the earlier one"
    );
  }

  let (staged_profile, links) = stage_profile(&result.profile, profile_dir)?;
  let staged_list = closure_list
    .map(|list| stage_closure_list(&result.closure, list))
    .transpose()?;
  let staged_export = closure_root
    .map(|root| stage_closure(&result.closure, root))
    .transpose()
    .context("Failed to export closure")?;

  let export = staged_export
    .map(StagedExport::commit)
    .transpose()
    .context("Failed to export closure")?;
  if let (Some(staged), Some(list)) = (staged_list, closure_list) {
    staged
      .persist(list)
      .with_context(|| format!("Failed to write closure list {}", list.display()))?;
  }
  // The staging handle finds nothing left to remove once the rename is done.
  fs::rename(staged_profile.path(), profile_dir)
    .with_context(|| format!("Failed to create profile directory {}", profile_dir.display()))?;
  debug!(dir = %profile_dir.display(), "profile moved into place");

  let profile_dir = dunce::canonicalize(profile_dir).unwrap_or_else(|_| profile_dir.to_path_buf());

  if output.is_json() {
    return print_json(&MaterializeReport {
      profile_dir,
      outputs: &result.outputs,
      closure: &result.closure,
      profile: &result.profile,
      export,
    });
  }

  println!();
  print_success("Materialization complete!");
  print_stat("Packages", &requests.len().to_string());
  print_stat("Outputs", &result.outputs.len().to_string());
  print_stat("Closure paths", &result.closure.len().to_string());
  print_stat("Binaries linked", &links.to_string());
  print_stat("Collisions", &result.profile.collisions().len().to_string());
  print_stat("Profile", &profile_dir.display().to_string());
  if let Some(list) = closure_list {
    print_stat("Closure list", &list.display().to_string());
  }
  if let Some(stats) = &export {
    print_stat("Closure copied", &format!("{} paths, {}", stats.paths_copied, format_bytes(stats.bytes)));
  }
  print_stat("Duration", &format_duration(start.elapsed()));

  Ok(())
}

/// Writes the profile links into a fresh directory beside `profile_dir`.
fn stage_profile(profile: &Profile, profile_dir: &Path) -> Result<(TempDir, usize)> {
  let parent = parent_dir(profile_dir);
  fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;

  let staged = tempfile::Builder::new()
    .prefix(".yadt-profile-")
    .tempdir_in(parent)
    .context("Failed to create profile staging directory")?;
  let links = profile.write_links(staged.path()).context("Failed to write profile")?;
  set_mode(staged.path(), 0o755).context("Failed to set profile permissions")?;

  Ok((staged, links))
}

/// Writes the closure list to a temporary file beside `list`.
fn stage_closure_list(closure: &Closure, list: &Path) -> Result<NamedTempFile> {
  let staged = tempfile::Builder::new()
    .prefix(".yadt-closure-")
    .tempfile_in(parent_dir(list))
    .with_context(|| format!("Failed to write closure list {}", list.display()))?;
  write_closure_list(closure, staged.path()).context("Failed to write closure list")?;
  set_mode(staged.path(), 0o644).context("Failed to set closure list permissions")?;

  Ok(staged)
}

fn parent_dir(path: &Path) -> &Path {
  match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
  use std::os::unix::fs::PermissionsExt;
  fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
  Ok(())
}
