//! Package requests.
//!
//! A request is an opaque reference understood by the package builder
//! (for Nix, an installable such as `nixpkgs#ripgrep`). Nothing in the
//! materializer looks inside it.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single package to build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageRequest(pub String);

impl PackageRequest {
  pub fn new(reference: impl Into<String>) -> Self {
    Self(reference.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Qualifies a bare package name with a registry, e.g. `ripgrep` → `nixpkgs#ripgrep`.
  ///
  /// References that already name a flake (`#`), a URL-like scheme (`:`), or a
  /// filesystem path (`/` or `.` prefix) are kept as they are.
  pub fn qualified(registry: &str, name: &str) -> Self {
    if registry.is_empty() || is_qualified(name) {
      Self::new(name)
    } else {
      Self(format!("{}#{}", registry, name))
    }
  }
}

impl fmt::Display for PackageRequest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for PackageRequest {
  fn from(s: &str) -> Self {
    Self::new(s)
  }
}

fn is_qualified(name: &str) -> bool {
  name.contains('#') || name.contains(':') || name.starts_with('/') || name.starts_with('.')
}

/// Splits a delimited package string into tokens.
///
/// Tokens are separated by whitespace and/or commas; empty tokens are dropped.
pub fn split_packages(input: &str) -> impl Iterator<Item = &str> {
  input
    .split(|c: char| c == ',' || c.is_whitespace())
    .filter(|token| !token.is_empty())
}

/// Parses a delimited package string into an ordered, de-duplicated request list.
pub fn parse_requests(input: &str) -> Vec<PackageRequest> {
  dedup_requests(split_packages(input).map(PackageRequest::new))
}

/// Removes repeated requests, keeping the first occurrence of each.
///
/// Order matters downstream: profile collisions are won by the earlier request.
pub fn dedup_requests<I>(requests: I) -> Vec<PackageRequest>
where
  I: IntoIterator<Item = PackageRequest>,
{
  let mut seen = HashSet::new();
  requests.into_iter().filter(|r| seen.insert(r.clone())).collect()
}
