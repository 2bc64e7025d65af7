//! Package closure and profile materialization.
//!
//! A run goes through three stages:
//! - **resolve**: build every request through a [`PackageBuilder`]
//! - **closure**: ask a [`ClosureComputer`] for the runtime closure of the outputs
//! - **profile**: fold the outputs' `bin/` directories into a [`Profile`]
//!
//! Closure and profile only read the resolved outputs and run concurrently.
//! A run either produces all three results or none of them; nothing touches
//! the filesystem until [`Profile::write_links`] is called on a finished run.

mod profile;
mod types;

use tracing::{debug, info};

use crate::request::PackageRequest;

pub use profile::build_profile;
pub use types::{
  BuildOutput, Closure, ClosureError, Collision, MaterializeError, Materialized, Profile, ProfileEntry, ProfileError,
  ResolutionError,
};

/// Builds package requests into store outputs.
///
/// Implementations must be all-or-nothing: if any request fails, the whole
/// batch fails and no outputs are returned.
pub trait PackageBuilder {
  fn build(&self, requests: &[PackageRequest]) -> impl Future<Output = Result<Vec<BuildOutput>, ResolutionError>>;
}

/// Computes the transitive runtime dependencies of build outputs.
pub trait ClosureComputer {
  fn requisites(&self, outputs: &[BuildOutput]) -> impl Future<Output = Result<Closure, ClosureError>>;
}

/// Resolves `requests` to build outputs, preserving request order.
pub async fn resolve<B: PackageBuilder>(
  builder: &B,
  requests: &[PackageRequest],
) -> Result<Vec<BuildOutput>, ResolutionError> {
  if requests.is_empty() {
    debug!("no packages requested");
    return Ok(Vec::new());
  }

  info!(count = requests.len(), "resolving packages");
  let outputs = builder.build(requests).await?;

  for request in requests {
    if !outputs.iter().any(|o| &o.request == request) {
      return Err(ResolutionError::NoOutputs(request.clone()));
    }
  }

  debug!(outputs = outputs.len(), "packages resolved");
  Ok(outputs)
}

/// Computes the closure of `outputs`.
///
/// Every output must still exist. The result always contains the outputs
/// themselves, whatever the computer reports.
pub async fn compute_closure<C: ClosureComputer>(
  computer: &C,
  outputs: &[BuildOutput],
) -> Result<Closure, ClosureError> {
  for output in outputs {
    match tokio::fs::try_exists(&output.path).await {
      Ok(true) => {}
      Ok(false) => return Err(ClosureError::MissingOutput(output.path.clone())),
      Err(source) => {
        return Err(ClosureError::Inspect {
          path: output.path.clone(),
          source,
        });
      }
    }
  }

  if outputs.is_empty() {
    return Ok(Closure::new());
  }

  let mut closure = computer.requisites(outputs).await?;
  for output in outputs {
    closure.insert(output.path.clone());
  }

  debug!(paths = closure.len(), "closure computed");
  Ok(closure)
}

/// Runs resolve, closure and profile for `requests`.
pub async fn materialize<B, C>(
  builder: &B,
  computer: &C,
  requests: &[PackageRequest],
) -> Result<Materialized, MaterializeError>
where
  B: PackageBuilder,
  C: ClosureComputer,
{
  let outputs = resolve(builder, requests).await?;

  let (closure, profile) = tokio::try_join!(
    async { compute_closure(computer, &outputs).await.map_err(MaterializeError::from) },
    async { build_profile(&outputs).map_err(MaterializeError::from) },
  )?;

  info!(
    outputs = outputs.len(),
    closure = closure.len(),
    binaries = profile.len(),
    collisions = profile.collisions().len(),
    "materialization complete"
  );

  Ok(Materialized {
    outputs,
    closure,
    profile,
  })
}
