mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use cmd::{PackageArgs, cmd_closure, cmd_info, cmd_materialize, cmd_packages, cmd_profile};
use output::OutputFormat;

/// yadt - Nix package closures and profiles for dev containers
#[derive(Parser)]
#[command(name = "yadt")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Config file (default: $YADT_CONFIG, then ~/.config/yadt/config.toml)
  #[arg(short, long, global = true, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Print the package requests that would be built
  Packages {
    #[command(flatten)]
    packages: PackageArgs,
  },

  /// Build the packages and show the resulting profile without writing it
  Profile {
    #[command(flatten)]
    packages: PackageArgs,
  },

  /// Build the packages and print their runtime closure
  Closure {
    #[command(flatten)]
    packages: PackageArgs,

    /// Write the closure to this file instead of printing it
    #[arg(long, value_name = "FILE")]
    list: Option<PathBuf>,
  },

  /// Build the packages, write the profile, and export the closure
  Materialize {
    #[command(flatten)]
    packages: PackageArgs,

    /// Profile directory to create (must not exist)
    #[arg(long, value_name = "DIR")]
    profile_dir: PathBuf,

    /// Write the closure path list to this file
    #[arg(long, value_name = "FILE")]
    closure_list: Option<PathBuf>,

    /// Copy every closure path under this directory
    #[arg(long, value_name = "DIR")]
    closure_root: Option<PathBuf>,
  },

  /// Show configuration and tool locations
  Info,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let cli = Cli::parse();
  let config = cli.config.as_deref();

  match cli.command {
    Commands::Packages { packages } => cmd_packages(config, &packages, cli.output),
    Commands::Profile { packages } => cmd_profile(config, &packages, cli.output),
    Commands::Closure { packages, list } => cmd_closure(config, &packages, list.as_deref(), cli.output),
    Commands::Materialize {
      packages,
      profile_dir,
      closure_list,
      closure_root,
    } => cmd_materialize(
      config,
      &packages,
      &profile_dir,
      closure_list.as_deref(),
      closure_root.as_deref(),
      cli.output,
    ),
    Commands::Info => cmd_info(config, cli.output),
  }
}
