use std::path::Path;

use anyhow::Result;

use crate::output::{OutputFormat, print_json};

use super::{PackageArgs, load_config};

pub fn cmd_packages(config: Option<&Path>, packages: &PackageArgs, output: OutputFormat) -> Result<()> {
  let config = load_config(config)?;
  let requests = packages.requests(&config);

  if output.is_json() {
    print_json(&requests)?;
  } else {
    for request in &requests {
      println!("{}", request);
    }
  }

  Ok(())
}
