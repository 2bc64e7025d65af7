//! Profile construction.
//!
//! Folds the `bin/` directories of a list of build outputs into a single
//! name → binary mapping, then writes that mapping out as symlinks.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::types::{BuildOutput, Profile, ProfileEntry, ProfileError};

/// Builds the profile for `outputs`, in order.
///
/// Outputs without a `bin/` directory contribute nothing. When two outputs
/// provide the same binary name, the one listed first wins.
pub fn build_profile(outputs: &[BuildOutput]) -> Result<Profile, ProfileError> {
  let mut profile = Profile::new();

  for output in outputs {
    let bin_dir = output.bin_dir();

    if !bin_dir.is_dir() {
      debug!(output = %output.path.display(), "no binary directory, skipping");
      continue;
    }

    for source in list_binaries(&bin_dir)? {
      let Some(name) = source.file_name().and_then(|n| n.to_str()) else {
        warn!(path = %source.display(), "skipping binary with non UTF-8 name");
        continue;
      };

      let entry = ProfileEntry {
        name: name.to_string(),
        source: source.clone(),
        output: output.path.clone(),
      };

      if !profile.insert(entry) {
        debug!(name, discarded = %source.display(), "binary name already taken");
      }
    }
  }

  debug!(entries = profile.len(), collisions = profile.collisions().len(), "profile built");
  Ok(profile)
}

/// Direct entries of `bin_dir`, sorted by file name.
fn list_binaries(bin_dir: &Path) -> Result<Vec<PathBuf>, ProfileError> {
  let read_err = |source: io::Error| ProfileError::ReadBinDir {
    path: bin_dir.to_path_buf(),
    source,
  };

  let mut binaries = fs::read_dir(bin_dir)
    .map_err(read_err)?
    .map(|entry| entry.map(|e| e.path()))
    .collect::<Result<Vec<_>, _>>()
    .map_err(read_err)?;

  binaries.sort();
  Ok(binaries)
}

impl Profile {
  /// Writes every entry as `<profile_dir>/<name> -> <source>`.
  ///
  /// `profile_dir` must already exist and be empty. If a link cannot be
  /// created, the links written so far are removed again before the error
  /// is returned.
  pub fn write_links(&self, profile_dir: &Path) -> Result<usize, ProfileError> {
    if !profile_dir.is_dir() {
      return Err(ProfileError::TargetMissing(profile_dir.to_path_buf()));
    }
    if fs::read_dir(profile_dir)?.next().is_some() {
      return Err(ProfileError::TargetNotEmpty(profile_dir.to_path_buf()));
    }

    let mut written: Vec<PathBuf> = Vec::with_capacity(self.len());

    for entry in self.entries() {
      let link = profile_dir.join(&entry.name);

      if let Err(source) = symlink(&entry.source, &link) {
        for path in &written {
          if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to remove partial profile link");
          }
        }
        return Err(ProfileError::Link {
          link,
          target: entry.source.clone(),
          source,
        });
      }

      written.push(link);
    }

    info!(dir = %profile_dir.display(), links = written.len(), "profile written");
    Ok(written.len())
  }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::windows::fs::symlink_file(target, link)
}
