mod closure;
mod info;
mod materialize;
mod packages;
mod profile;

pub use closure::cmd_closure;
pub use info::cmd_info;
pub use materialize::cmd_materialize;
pub use packages::cmd_packages;
pub use profile::cmd_profile;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use tokio::runtime::Runtime;

use yadt_lib::config::Config;
use yadt_lib::request::{PackageRequest, split_packages};

/// Package selection shared by every command that builds something.
#[derive(Debug, Args)]
pub struct PackageArgs {
  /// Extra packages, separated by whitespace or commas (repeatable)
  #[arg(short, long, value_name = "PACKAGES")]
  packages: Vec<String>,

  /// Do not include the configured base packages
  #[arg(long)]
  no_base: bool,
}

impl PackageArgs {
  pub fn requests(&self, config: &Config) -> Vec<PackageRequest> {
    let extra: Vec<&str> = self.packages.iter().flat_map(|p| split_packages(p)).collect();
    config.requests(&extra, !self.no_base)
  }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
  Config::load(path).context("Failed to load configuration")
}

/// Single-threaded runtime; closure and profile still overlap on it.
fn runtime() -> Result<Runtime> {
  tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to create async runtime")
}
