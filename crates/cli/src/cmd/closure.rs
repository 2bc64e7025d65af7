use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use yadt_lib::export::write_closure_list;
use yadt_lib::materialize::{BuildOutput, Closure, compute_closure, resolve};
use yadt_lib::nix::{NixBuilder, NixClosure};

use crate::output::{OutputFormat, print_json, print_success};

use super::{PackageArgs, load_config, runtime};

#[derive(Serialize)]
struct ClosureReport<'a> {
  outputs: &'a [BuildOutput],
  closure: &'a Closure,
}

pub fn cmd_closure(
  config: Option<&Path>,
  packages: &PackageArgs,
  list: Option<&Path>,
  output: OutputFormat,
) -> Result<()> {
  let config = load_config(config)?;
  let requests = packages.requests(&config);
  let builder = NixBuilder::from_config(&config.nix);
  let computer = NixClosure::from_config(&config.nix);

  let (outputs, closure) = runtime()?.block_on(async {
    let outputs = resolve(&builder, &requests).await.context("Failed to build packages")?;
    let closure = compute_closure(&computer, &outputs)
      .await
      .context("Failed to compute closure")?;
    anyhow::Ok((outputs, closure))
  })?;

  if let Some(list) = list {
    write_closure_list(&closure, list).context("Failed to write closure list")?;
  }

  if output.is_json() {
    print_json(&ClosureReport {
      outputs: &outputs,
      closure: &closure,
    })?;
  } else if let Some(list) = list {
    print_success(&format!("Wrote {} paths to {}", closure.len(), list.display()));
  } else {
    for path in closure.iter() {
      println!("{}", path.display());
    }
  }

  Ok(())
}
