//! Shared test helpers for CLI integration tests.
//!
//! Every test gets a temporary directory holding a fake store, fake `nix`
//! and `nix-store` scripts, and a config file pointing at them.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Fake `nix build --json`: maps `registry#name` to `<store>/name`, failing
/// the whole batch if any name is missing from the store.
const FAKE_NIX: &str = r#"#!/bin/sh
store="@STORE@"
while [ "$#" -gt 0 ]; do
  case "$1" in
    --json) shift; break ;;
    *) shift ;;
  esac
done
sep=""
out="["
for ref in "$@"; do
  name="${ref#*#}"
  if [ ! -d "$store/$name" ]; then
    echo "error: flake 'nixpkgs' does not provide attribute '$name'" >&2
    exit 1
  fi
  out="$out$sep{\"outputs\":{\"out\":\"$store/$name\"}}"
  sep=","
done
echo "$out]"
"#;

/// Fake `nix-store --query --requisites`: every output plus a shared `glibc`.
const FAKE_NIX_STORE: &str = r#"#!/bin/sh
store="@STORE@"
shift 2
for p in "$@"; do
  if [ ! -e "$p" ]; then
    echo "error: path '$p' is not valid" >&2
    exit 1
  fi
  echo "$p"
done
echo "$store/glibc"
"#;

/// Isolated test environment.
pub struct TestEnv {
  pub temp: TempDir,
  pub config_path: PathBuf,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();

    let store = root.join("store");
    fs::create_dir_all(store.join("glibc").join("lib")).unwrap();
    fs::write(store.join("glibc").join("lib").join("libc.so.6"), "libc").unwrap();

    let store_str = store.to_str().unwrap();
    let nix = write_script(&root.join("nix"), &FAKE_NIX.replace("@STORE@", store_str));
    let nix_store = write_script(&root.join("nix-store"), &FAKE_NIX_STORE.replace("@STORE@", store_str));

    let config_path = root.join("config.toml");
    fs::write(
      &config_path,
      format!(
        "registry = \"nixpkgs\"\nbase_packages = []\n\n[nix]\nnix = '{}'\nnix_store = '{}'\nexperimental_features = false\n",
        nix.display(),
        nix_store.display()
      ),
    )
    .unwrap();

    Self { temp, config_path }
  }

  pub fn root(&self) -> PathBuf {
    dunce::canonicalize(self.temp.path()).unwrap()
  }

  pub fn store_path(&self) -> PathBuf {
    self.root().join("store")
  }

  /// Adds a package output with the given executables.
  pub fn add_package(&self, name: &str, bins: &[&str]) -> PathBuf {
    let out = self.add_docs_package(name);
    let bin_dir = out.join("bin");
    fs::create_dir_all(&bin_dir).unwrap();
    for bin in bins {
      write_script(&bin_dir.join(bin), &format!("#!/bin/sh\necho {}\n", bin));
    }
    out
  }

  /// Adds a package output without a `bin/` directory.
  pub fn add_docs_package(&self, name: &str) -> PathBuf {
    let out = self.store_path().join(name);
    fs::create_dir_all(out.join("share").join("doc")).unwrap();
    fs::write(out.join("share").join("doc").join("README"), name).unwrap();
    out
  }

  /// Path inside the temp directory that does not exist yet.
  pub fn path(&self, relative: &str) -> PathBuf {
    self.root().join(relative)
  }

  /// A `yadt` command using this environment's config.
  pub fn yadt(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("yadt");
    cmd.arg("--config").arg(&self.config_path).env_remove("RUST_LOG");
    cmd
  }
}

fn write_script(path: &Path, content: &str) -> PathBuf {
  fs::write(path, content).unwrap();
  fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
  path.to_path_buf()
}
