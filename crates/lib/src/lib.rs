//! yadt-lib: package closure and profile materialization.
//!
//! Given a list of package requests this crate:
//! - resolves each request to built store outputs (`PackageBuilder`)
//! - computes the runtime closure of those outputs (`ClosureComputer`)
//! - folds every output's `bin/` directory into a flat, collision-resolved profile
//!
//! The closure and the profile are the two artifacts handed to an image-layering step.

pub mod config;
pub mod consts;
pub mod export;
pub mod materialize;
pub mod nix;
pub mod platform;
pub mod request;

#[cfg(test)]
pub(crate) mod testutil;
