//! Closure export.
//!
//! Hands the closure to the image-layering step, either as a newline
//! separated path list or as a copy of every closure path under an export
//! root (`/nix/store/x` is copied to `<root>/nix/store/x`).
//!
//! Copies are made in a staging directory inside the export root and renamed
//! into place once every path has been copied, so an interrupted export never
//! leaves a half-copied path where a later run would take it as done.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::materialize::Closure;

const STAGING_PREFIX: &str = ".yadt-export-";

#[derive(Debug, Error)]
pub enum ExportError {
  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to copy {from} to {to}: {source}")]
  Copy {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to walk {path}: {source}")]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("closure path is not absolute: {0}")]
  RelativePath(PathBuf),
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ExportStats {
  pub paths_copied: usize,
  pub paths_skipped: usize,
  pub files: usize,
  pub symlinks: usize,
  pub bytes: u64,
}

/// Writes the closure to `file`, one path per line.
pub fn write_closure_list(closure: &Closure, file: &Path) -> Result<(), ExportError> {
  let write_err = |source: io::Error| ExportError::Write {
    path: file.to_path_buf(),
    source,
  };

  let mut writer = io::BufWriter::new(fs::File::create(file).map_err(write_err)?);
  for path in closure.iter() {
    writeln!(writer, "{}", path.display()).map_err(write_err)?;
  }
  writer.flush().map_err(write_err)?;

  debug!(file = %file.display(), paths = closure.len(), "closure list written");
  Ok(())
}

/// Where a closure path lands under `root`.
pub fn export_path(root: &Path, path: &Path) -> Result<PathBuf, ExportError> {
  Ok(root.join(relative_path(path)?))
}

/// Copies every closure path under `root`, keeping absolute layout and symlinks.
///
/// Paths already present under `root` are left alone. Either every missing
/// path is exported or none is.
pub fn copy_closure(closure: &Closure, root: &Path) -> Result<ExportStats, ExportError> {
  stage_closure(closure, root)?.commit()
}

/// Copies the missing closure paths into a staging directory under `root`.
///
/// Nothing becomes visible at its export path until [`StagedExport::commit`].
pub fn stage_closure(closure: &Closure, root: &Path) -> Result<StagedExport, ExportError> {
  let created_root = root.symlink_metadata().is_err();
  let write_err = |source: io::Error| ExportError::Write {
    path: root.to_path_buf(),
    source,
  };

  fs::create_dir_all(root).map_err(write_err)?;
  let staging = match tempfile::Builder::new().prefix(STAGING_PREFIX).tempdir_in(root) {
    Ok(staging) => staging,
    Err(source) => {
      if created_root {
        remove_created_root(root);
      }
      return Err(write_err(source));
    }
  };

  let mut staged = StagedExport {
    root: root.to_path_buf(),
    staging_dir: staging.path().to_path_buf(),
    staging: Some(staging),
    created_root,
    pending: Vec::new(),
    stats: ExportStats::default(),
  };

  for path in closure.iter() {
    let relative = relative_path(path)?;

    if staged.root.join(relative).symlink_metadata().is_ok() {
      debug!(path = %path.display(), "already exported, skipping");
      staged.stats.paths_skipped += 1;
      continue;
    }

    copy_tree(path, &staged.staging_dir.join(relative), &mut staged.stats)?;
    staged.pending.push(relative.to_path_buf());
    staged.stats.paths_copied += 1;
  }

  debug!(root = %root.display(), paths = staged.pending.len(), "closure staged");
  Ok(staged)
}

/// Closure paths copied under `root` but not yet moved to their export paths.
///
/// Dropping it without calling [`StagedExport::commit`] removes the staged
/// copies, and the root too if staging created it.
#[derive(Debug)]
pub struct StagedExport {
  root: PathBuf,
  staging_dir: PathBuf,
  staging: Option<TempDir>,
  created_root: bool,
  /// Export paths relative to `root`, in closure order.
  pending: Vec<PathBuf>,
  stats: ExportStats,
}

impl StagedExport {
  pub fn stats(&self) -> &ExportStats {
    &self.stats
  }

  /// Moves every staged path into place.
  ///
  /// If a move fails, the paths already moved are removed again.
  pub fn commit(mut self) -> Result<ExportStats, ExportError> {
    let mut moved: Vec<PathBuf> = Vec::with_capacity(self.pending.len());

    for relative in &self.pending {
      let from = self.staging_dir.join(relative);
      let to = self.root.join(relative);

      if let Err(source) = move_into_place(&from, &to) {
        for path in &moved {
          if let Err(e) = remove_tree(path) {
            warn!(path = %path.display(), error = %e, "failed to remove partially exported path");
          }
        }
        return Err(ExportError::Copy { from, to, source });
      }

      moved.push(to);
    }

    self.created_root = false;
    let stats = std::mem::take(&mut self.stats);
    info!(
      root = %self.root.display(),
      copied = stats.paths_copied,
      skipped = stats.paths_skipped,
      bytes = stats.bytes,
      "closure exported"
    );
    Ok(stats)
  }
}

impl Drop for StagedExport {
  fn drop(&mut self) {
    if let Some(staging) = self.staging.take()
      && let Err(e) = staging.close()
    {
      warn!(path = %self.staging_dir.display(), error = %e, "failed to remove export staging directory");
    }
    if self.created_root {
      remove_created_root(&self.root);
    }
  }
}

fn relative_path(path: &Path) -> Result<&Path, ExportError> {
  path
    .strip_prefix("/")
    .map_err(|_| ExportError::RelativePath(path.to_path_buf()))
}

fn move_into_place(from: &Path, to: &Path) -> io::Result<()> {
  if let Some(parent) = to.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::rename(from, to)
}

fn remove_tree(path: &Path) -> io::Result<()> {
  if path.symlink_metadata()?.is_dir() {
    fs::remove_dir_all(path)
  } else {
    fs::remove_file(path)
  }
}

fn remove_created_root(root: &Path) {
  if let Err(e) = fs::remove_dir(root) {
    debug!(root = %root.display(), error = %e, "export root left in place");
  }
}

fn copy_tree(src: &Path, dest: &Path, stats: &mut ExportStats) -> Result<(), ExportError> {
  let copy_err = |from: &Path, to: &Path, source: io::Error| ExportError::Copy {
    from: from.to_path_buf(),
    to: to.to_path_buf(),
    source,
  };

  if let Some(parent) = dest.parent() {
    fs::create_dir_all(parent).map_err(|e| copy_err(src, parent, e))?;
  }

  for entry in WalkDir::new(src).follow_links(false).follow_root_links(false) {
    let entry = entry.map_err(|source| ExportError::Walk {
      path: src.to_path_buf(),
      source,
    })?;

    let from = entry.path();
    let relative = from.strip_prefix(src).unwrap_or(Path::new(""));
    let to = if relative.as_os_str().is_empty() {
      dest.to_path_buf()
    } else {
      dest.join(relative)
    };

    let file_type = entry.file_type();
    if file_type.is_dir() {
      // Directory modes are not copied: store directories are read-only.
      fs::create_dir_all(&to).map_err(|e| copy_err(from, &to, e))?;
    } else if file_type.is_symlink() {
      let target = fs::read_link(from).map_err(|e| copy_err(from, &to, e))?;
      symlink(&target, &to).map_err(|e| copy_err(from, &to, e))?;
      stats.symlinks += 1;
    } else {
      stats.bytes += fs::copy(from, &to).map_err(|e| copy_err(from, &to, e))?;
      stats.files += 1;
    }
  }

  Ok(())
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::windows::fs::symlink_file(target, link)
}
