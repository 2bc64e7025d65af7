use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

use yadt_lib::nix::find_program;
use yadt_lib::platform::paths::default_config_file;

use crate::output::{OutputFormat, print_json, print_stat};

use super::load_config;

#[derive(Serialize)]
struct Info {
  version: &'static str,
  config_file: Option<PathBuf>,
  registry: String,
  base_packages: usize,
  additional_packages: usize,
  nix: Option<PathBuf>,
  nix_store: Option<PathBuf>,
}

pub fn cmd_info(config_path: Option<&Path>, output: OutputFormat) -> Result<()> {
  let config = load_config(config_path)?;
  let config_file = config_path
    .map(Path::to_path_buf)
    .or_else(default_config_file)
    .filter(|p| p.is_file());

  let info = Info {
    version: env!("CARGO_PKG_VERSION"),
    config_file,
    registry: config.registry.clone(),
    base_packages: config.base_packages.len(),
    additional_packages: config.additional_packages.len(),
    nix: find_program(&config.nix.nix),
    nix_store: find_program(&config.nix.nix_store),
  };

  if output.is_json() {
    return print_json(&info);
  }

  let show = |path: &Option<PathBuf>| match path {
    Some(p) => p.display().to_string(),
    None => "not found".to_string(),
  };

  println!("yadt v{}", info.version);
  print_stat(
    "Config",
    &info
      .config_file
      .as_ref()
      .map(|p| p.display().to_string())
      .unwrap_or_else(|| "built-in defaults".to_string()),
  );
  print_stat("Registry", &info.registry);
  print_stat("Base packages", &info.base_packages.to_string());
  print_stat("Additional packages", &info.additional_packages.to_string());
  print_stat("nix", &show(&info.nix));
  print_stat("nix-store", &show(&info.nix_store));

  Ok(())
}
