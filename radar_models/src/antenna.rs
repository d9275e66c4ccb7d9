//! Antenna elements and angular gain patterns.
//!
//! Pattern lookups are total functions over the full angular domain
//! [-180°, 180°] × [-90°, 90°]: azimuth wraps, elevation clamps, and the
//! `Omni` fallback answers 0 dB everywhere. Pattern tables are immutable
//! configuration data, loaded once per run and shared by reference — no
//! in-place mutation while a simulation is running.

use crate::error::ConfigurationError;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Angular gain pattern of one antenna element, in dB.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum GainPattern {
    /// Isotropic: 0 dB in every direction. The symmetric fallback used when
    /// no measured pattern is specified.
    Omni,
    /// Measured pattern sampled on an azimuth × elevation grid, bilinearly
    /// interpolated between samples.
    Table {
        /// Sample azimuths in degrees, strictly ascending within [-180, 180]
        az_deg: Vec<f64>,
        /// Sample elevations in degrees, strictly ascending within [-90, 90]
        el_deg: Vec<f64>,
        /// Row-major gains: `gain_db[el_index * az_deg.len() + az_index]`
        gain_db: Vec<f64>,
    },
}

impl GainPattern {
    /// Check table dimensions and ordering. `Omni` always validates.
    pub fn validate(&self, parameter: &str) -> Result<(), ConfigurationError> {
        match self {
            GainPattern::Omni => Ok(()),
            GainPattern::Table {
                az_deg,
                el_deg,
                gain_db,
            } => {
                if az_deg.is_empty() || el_deg.is_empty() {
                    return Err(ConfigurationError::new(
                        parameter,
                        "pattern table needs at least one azimuth and one elevation sample",
                    ));
                }
                if gain_db.len() != az_deg.len() * el_deg.len() {
                    return Err(ConfigurationError::new(
                        parameter,
                        format!(
                            "pattern table has {} gains for a {}×{} grid",
                            gain_db.len(),
                            el_deg.len(),
                            az_deg.len()
                        ),
                    ));
                }
                if !is_strictly_ascending(az_deg) || !is_strictly_ascending(el_deg) {
                    return Err(ConfigurationError::new(
                        parameter,
                        "pattern sample angles must be strictly ascending",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Gain in dB toward (azimuth, elevation), both in radians.
    pub fn gain_db(&self, az_rad: f64, el_rad: f64) -> f64 {
        match self {
            GainPattern::Omni => 0.0,
            GainPattern::Table {
                az_deg,
                el_deg,
                gain_db,
            } => {
                let az = wrap_azimuth_deg(az_rad.to_degrees());
                let el = el_rad.to_degrees().clamp(-90.0, 90.0);
                let (ia, fa) = bracket(az_deg, az);
                let (ie, fe) = bracket(el_deg, el);
                let n_az = az_deg.len();
                let g = |e: usize, a: usize| gain_db[e * n_az + a];
                let g0 = g(ie, ia) * (1.0 - fa) + g(ie, (ia + 1).min(n_az - 1)) * fa;
                let e1 = (ie + 1).min(el_deg.len() - 1);
                let g1 = g(e1, ia) * (1.0 - fa) + g(e1, (ia + 1).min(n_az - 1)) * fa;
                g0 * (1.0 - fe) + g1 * fe
            }
        }
    }

    /// Linear amplitude factor `10^(dB/20)` toward (azimuth, elevation).
    pub fn gain_amplitude(&self, az_rad: f64, el_rad: f64) -> f64 {
        10.0_f64.powf(self.gain_db(az_rad, el_rad) / 20.0)
    }
}

/// One physical antenna element of a transmit or receive array.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Element {
    /// Position offset from the array phase centre (m, array frame)
    pub offset: Vector3<f64>,
    /// Shared angular gain pattern
    pub pattern: Arc<GainPattern>,
}

impl Element {
    /// Element at the phase centre with an isotropic pattern.
    pub fn omni() -> Self {
        Self {
            offset: Vector3::zeros(),
            pattern: Arc::new(GainPattern::Omni),
        }
    }

    pub fn at_offset(offset: Vector3<f64>, pattern: Arc<GainPattern>) -> Self {
        Self { offset, pattern }
    }
}

/// Wrap a degree azimuth into [-180, 180).
fn wrap_azimuth_deg(az: f64) -> f64 {
    (az + 180.0).rem_euclid(360.0) - 180.0
}

fn is_strictly_ascending(v: &[f64]) -> bool {
    v.windows(2).all(|w| w[0] < w[1])
}

/// Index of the sample at or below `x`, plus the interpolation fraction
/// toward the next sample. Clamps outside the sampled span.
fn bracket(samples: &[f64], x: f64) -> (usize, f64) {
    if x <= samples[0] {
        return (0, 0.0);
    }
    if x >= samples[samples.len() - 1] {
        return (samples.len() - 1, 0.0);
    }
    // partition_point: first index with sample > x
    let hi = samples.partition_point(|&s| s <= x);
    let lo = hi - 1;
    let span = samples[hi] - samples[lo];
    let frac = if span > 0.0 { (x - samples[lo]) / span } else { 0.0 };
    (lo, frac)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
