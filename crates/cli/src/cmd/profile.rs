//! Implementation of the `yadt profile` command.
//!
//! Resolves the requested packages and prints the profile they would
//! produce, including binaries dropped by name collisions. Nothing is written.

use std::path::Path;

use anyhow::{Context, Result};

use yadt_lib::materialize::{build_profile, resolve};
use yadt_lib::nix::NixBuilder;

use crate::output::{OutputFormat, print_info, print_json, print_link, print_warning};

use super::{PackageArgs, load_config, runtime};

pub fn cmd_profile(config: Option<&Path>, packages: &PackageArgs, output: OutputFormat) -> Result<()> {
  let config = load_config(config)?;
  let requests = packages.requests(&config);
  let builder = NixBuilder::from_config(&config.nix);

  let outputs = runtime()?
    .block_on(resolve(&builder, &requests))
    .context("Failed to build packages")?;
  let profile = build_profile(&outputs).context("Failed to build profile")?;

  if output.is_json() {
    return print_json(&profile);
  }

  print_info(&format!("{} binaries from {} outputs", profile.len(), outputs.len()));
  for entry in profile.entries() {
    print_link(&entry.name, &entry.source.display().to_string());
  }

  for collision in profile.collisions() {
    print_warning(&format!(
      "{}: keeping {}, ignoring {}",
      collision.name,
      collision.kept.display(),
      collision.discarded.display()
    ));
  }

  Ok(())
}
