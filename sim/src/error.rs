//! Simulation error taxonomy.
//!
//! Two fatal classes and one recoverable class:
//! - `Configuration` — inconsistent dimensions/parameters, surfaced before
//!   any trace work begins.
//! - `Geometry` — malformed scene input. Fatal for the run, but global state
//!   is untouched, so a corrected scene can be retried.
//! - Numerical degeneracies (zero-area triangles, zero-length rays) never
//!   reach this enum: they are skipped locally and logged by `scene_core`.
//!
//! Retries are never automatic: the computation is deterministic given
//! identical input, so a retry would reproduce the same failure.

use radar_models::ConfigurationError;
use scene_core::GeometryError;
use thiserror::Error;

/// Anything that can abort a simulation run. No variant ever carries a
/// partially filled tensor.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("simulation cancelled before completion")]
    Cancelled,
}
