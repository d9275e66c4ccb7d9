//! RCS estimation (shooting-and-bouncing-rays) and scattering-contribution
//! extraction for the baseband synthesizer.
//!
//! # RCS-only mode
//! A dense plane-wave grid illuminates the target; every bounce of every ray
//! tube contributes its tube cross-section, scaled by the squared cumulative
//! reflectivity, the observation-direction projection ratio, and the receive
//! polarization match. In the geometric-optics limit this converges to the
//! projected-area RCS — `π r²` for a conducting sphere — which is the level
//! of fidelity this engine targets (no physical-optics edge terms).
//!
//! Coherent vs. incoherent bounce summation is a configuration choice, not a
//! constant: both remain selectable through [`SummationMode`].

use crate::mesh::TriMesh;
use crate::raygen::plane_wave_rays;
use crate::scene::{Scene, SceneSnapshot, SceneTarget};
use crate::tracer::{trace, BouncePath, TraceConfig};
use crate::types::{TargetId, SPEED_OF_LIGHT};
use crate::motion::MotionSpec;
use nalgebra::{Isometry3, Point3, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// How per-bounce contributions combine into a scalar RCS.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummationMode {
    /// Phase-coherent field sum: `|Σ √aₖ e^{jφₖ}|²`. Sensitive to the exact
    /// path-length distribution (speckle).
    Coherent,
    /// Power sum: `Σ aₖ`. Stable estimate, no interference structure.
    Incoherent,
}

/// Tunables for an RCS sweep.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RcsOptions {
    /// Rays per side of the plane-wave grid (total rays = side²)
    pub rays_per_side: usize,
    pub trace: TraceConfig,
    pub summation: SummationMode,
}

impl Default for RcsOptions {
    fn default() -> Self {
        Self {
            rays_per_side: 128,
            trace: TraceConfig::default(),
            summation: SummationMode::Incoherent,
        }
    }
}

/// Clamp for the projection ratio at grazing incidence.
const MAX_PROJECTION_RATIO: f64 = 4.0;

/// Estimate the RCS of a mesh in dBsm.
///
/// * `incident_dir` — propagation direction of the illuminating plane wave.
/// * `observation_dir` — unit direction from the target toward the observer
///   (`-incident_dir` for the monostatic case).
/// * `polarization` — receive polarization filter; a near-zero vector means
///   unpolarized reception.
pub fn rcs_sbr(
    mesh: &TriMesh,
    incident_dir: Vector3<f64>,
    observation_dir: Vector3<f64>,
    frequency_hz: f64,
    polarization: Vector3<f64>,
    options: &RcsOptions,
) -> f64 {
    let wavelength = SPEED_OF_LIGHT / frequency_hz;
    let scene = Scene::new(vec![SceneTarget {
        id: TargetId(0),
        mesh: mesh.clone(),
        base_pose: Isometry3::identity(),
        motion: MotionSpec::Static,
    }]);
    let snapshot = scene.snapshot(0.0);

    let radius = mesh.bounding_radius();
    let half_extent = radius * 1.05;
    let rays = plane_wave_rays(
        incident_dir,
        Point3::origin(),
        half_extent,
        options.rays_per_side,
    );

    let obs = observation_dir.normalize();
    let k0 = 2.0 * PI / wavelength;
    let rx_pol = perpendicular_filter(&polarization, &obs);

    // Rays are independent: trace them in parallel and collect ordered
    // per-ray partials (power, field_re, field_im), then reduce serially so
    // the estimate stays deterministic regardless of worker scheduling.
    let partials: Vec<(f64, f64, f64)> = rays
        .into_par_iter()
        .map(|ray| {
            let mut partial = (0.0, 0.0, 0.0);
            let path = match trace(&snapshot, ray, &options.trace) {
                Some(p) => p,
                None => return partial,
            };
            for hit in &path.hits {
                // Shadow test toward the observer: blocked facets radiate
                // nothing.
                let probe = hit.point + hit.normal * 1e-6;
                if snapshot.intersect(&probe, &obs).is_some() {
                    continue;
                }

                let cos_in = (-hit.incoming).dot(&hit.normal).abs().max(1e-3);
                let ratio = (hit.normal.dot(&obs).abs() / cos_in).min(MAX_PROJECTION_RATIO);
                let pol_match = match &rx_pol {
                    Some(p) => hit.polarization.dot(p).abs(),
                    None => 1.0,
                };
                let rho = hit.cumulative_reflectivity;
                let area = path.weight * rho * rho * ratio * pol_match * pol_match;
                match options.summation {
                    SummationMode::Incoherent => partial.0 += area,
                    SummationMode::Coherent => {
                        // Far-field phase: outbound path plus the return leg
                        // to a reference plane through the origin.
                        let phase = k0 * (hit.cumulative_len - hit.point.coords.dot(&obs));
                        partial.1 += area.sqrt() * phase.cos();
                        partial.2 += area.sqrt() * phase.sin();
                    }
                }
            }
            partial
        })
        .collect();

    let (power_sum, field_re, field_im) = partials.iter().fold(
        (0.0, 0.0, 0.0),
        |(p, re, im), (dp, dre, dim)| (p + dp, re + dre, im + dim),
    );

    let sigma = match options.summation {
        SummationMode::Incoherent => power_sum,
        SummationMode::Coherent => field_re * field_re + field_im * field_im,
    };
    to_dbsm(sigma)
}

/// Convert RCS in m² to dBsm. Zero maps to a floor instead of −∞.
pub fn to_dbsm(rcs_m2: f64) -> f64 {
    10.0 * rcs_m2.max(1e-30).log10()
}

/// Convert dBsm to RCS in m².
pub fn from_dbsm(dbsm: f64) -> f64 {
    10.0_f64.powf(dbsm / 10.0)
}

// ---------------------------------------------------------------------------
// Scattering contributions (baseband mode)
// ---------------------------------------------------------------------------

/// One terminated ray path reduced to a delay/Doppler/amplitude tuple.
/// Ephemeral: produced per pulse and consumed immediately by the baseband
/// synthesizer, never persisted.
#[derive(Clone, Debug)]
pub struct ScatteringContribution {
    /// First surface interaction (transmit-side anchor)
    pub first_point: Point3<f64>,
    /// Last surface interaction (receive-side anchor)
    pub last_point: Point3<f64>,
    /// Path length between first and last interaction (0 for single bounce)
    pub mid_path_len: f64,
    /// Reflectivity- and polarization-weighted amplitude (excludes the
    /// per-channel spreading loss, which depends on element positions)
    pub amplitude: f64,
    /// Two-way Doppler shift at the carrier (Hz)
    pub doppler_hz: f64,
    /// Unit direction: transmitter phase centre → first interaction
    pub departure: Vector3<f64>,
    /// Unit direction: last interaction → receiver phase centre
    pub arrival: Vector3<f64>,
}

/// Reduce a traced path to a scattering contribution at a receive point.
///
/// Returns `None` when the receive leg is occluded by scene geometry. The
/// amplitude accumulates the cumulative reflectivity and the receive
/// polarization match; free-space loss over the full path is applied by the
/// synthesizer once the per-element legs are known.
pub fn accumulate_contribution(
    snapshot: &SceneSnapshot,
    path: &BouncePath,
    tx_origin: &Point3<f64>,
    rx_origin: &Point3<f64>,
    wavelength: f64,
    rx_polarization: &Vector3<f64>,
) -> Option<ScatteringContribution> {
    let first = path.hits.first()?;
    let last = path.hits.last()?;

    // Receive-path occlusion: the last interaction must see the receiver.
    let probe = last.point + last.normal * 1e-6;
    if snapshot.occluded(&probe, rx_origin) {
        return None;
    }

    let departure_vec = first.point - tx_origin;
    let arrival_vec = rx_origin - last.point;
    let r_first = departure_vec.norm();
    if r_first < 1e-9 || arrival_vec.norm() < 1e-9 {
        // Zero-length leg: degenerate, skip rather than divide by zero.
        tracing::debug!("skipping contribution with zero-length leg");
        return None;
    }
    let departure = departure_vec / r_first;
    let arrival = arrival_vec.normalize();

    let pol_match = match perpendicular_filter(rx_polarization, &arrival) {
        Some(p) => last.polarization.dot(&p).abs(),
        None => 1.0,
    };

    // Equivalent aperture amplitude of this ray tube: √(solid angle) · R maps
    // the angular bin to a captured length scale at the first interaction.
    let amplitude = last.cumulative_reflectivity * pol_match * path.weight.sqrt() * r_first;

    let mid_path_len = last.cumulative_len - first.cumulative_len;

    // Range-rate of both open legs gives the two-way Doppler.
    let closing = first.velocity.dot(&departure) - last.velocity.dot(&arrival);
    let doppler_hz = -closing / wavelength;

    Some(ScatteringContribution {
        first_point: first.point,
        last_point: last.point,
        mid_path_len,
        amplitude,
        doppler_hz,
        departure,
        arrival,
    })
}

/// Project a polarization filter perpendicular to a propagation direction.
/// Near-zero filters mean unpolarized reception (`None`).
fn perpendicular_filter(pol: &Vector3<f64>, dir: &Vector3<f64>) -> Option<Vector3<f64>> {
    if pol.norm_squared() < 1e-12 {
        return None;
    }
    let perp = pol - dir * pol.dot(dir);
    if perp.norm_squared() < 1e-12 {
        None
    } else {
        Some(perp.normalize())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
