//! Raw per-ray hit records: lidar-style scans and direct scene queries.
//!
//! These calls bypass baseband synthesis entirely and expose the ray
//! tracer's output as (angle, range, intensity) records, for consumers that
//! want geometry rather than radar signals.

use crate::raygen::{generate_rays, RaySampling};
use crate::scene::{Scene, SceneSnapshot};
use crate::tracer::{trace, TraceConfig};
use crate::types::TargetId;
use nalgebra::{Isometry3, Point3, Vector3};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// One resolved ray: where it pointed, what it hit, how strongly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SceneHitRecord {
    /// Azimuth of the launched ray in the sensor frame (radians)
    pub azimuth: f64,
    /// Elevation of the launched ray in the sensor frame (radians)
    pub elevation: f64,
    /// Distance to the first surface interaction (m)
    pub range: f64,
    /// First-bounce return strength: reflectivity × incidence cosine,
    /// attenuated by range
    pub intensity: f64,
    pub target: TargetId,
    /// Number of surface interactions along the full traced path
    pub bounces: u32,
}

/// Optional Gaussian range noise for lidar scans, explicitly seeded so scans
/// stay reproducible.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LidarNoise {
    pub range_std: f64,
    pub seed: u64,
}

/// Trace an arbitrary ray set against a frozen scene and return the raw
/// per-ray hit records. Rays that miss produce no record.
pub fn scene_hits(
    snapshot: &SceneSnapshot,
    origin: Point3<f64>,
    boresight: Vector3<f64>,
    sampling: &RaySampling,
    trace_cfg: &TraceConfig,
) -> Vec<SceneHitRecord> {
    let boresight = boresight.normalize();
    let rays = generate_rays(origin, boresight, sampling);
    let mut records = Vec::new();

    for ray in rays {
        let direction = ray.direction;
        let path = match trace(snapshot, ray, trace_cfg) {
            Some(p) => p,
            None => continue,
        };
        let first = &path.hits[0];
        let range = first.cumulative_len;
        let cos_inc = (-first.incoming).dot(&first.normal).abs();
        let reflectivity = first.cumulative_reflectivity;
        let intensity = reflectivity * cos_inc / (1.0 + range * range * 1e-6);

        let (azimuth, elevation) = direction_angles(&direction, &boresight);
        records.push(SceneHitRecord {
            azimuth,
            elevation,
            range,
            intensity,
            target: first.target,
            bounces: path.hits.len() as u32,
        });
    }
    records
}

/// Lidar-style raster scan of the scene at absolute time `t`.
///
/// Returns first-return records for every ray that hits within `max_range`.
/// When `noise` is given, ranges get zero-mean Gaussian perturbation from an
/// explicitly seeded generator.
pub fn lidar_scene(
    scene: &Scene,
    sensor_pose: &Isometry3<f64>,
    raster: &RaySampling,
    t: f64,
    max_range: f64,
    noise: Option<LidarNoise>,
) -> Vec<SceneHitRecord> {
    let snapshot = scene.snapshot(t);
    let origin = Point3::from(sensor_pose.translation.vector);
    let boresight = sensor_pose.rotation * Vector3::x();

    // Lidar is first-return only: one bounce is all we keep.
    let cfg = TraceConfig {
        max_bounces: 1,
        min_energy: 0.0,
    };
    let mut records = scene_hits(&snapshot, origin, boresight, raster, &cfg);
    records.retain(|r| r.range <= max_range);

    if let Some(noise) = noise {
        let mut rng = ChaCha8Rng::seed_from_u64(noise.seed);
        let dist = Normal::new(0.0, noise.range_std).unwrap_or_else(|_| {
            // Zero or negative std: degenerate but harmless, emit exact ranges.
            Normal::new(0.0, f64::MIN_POSITIVE).unwrap()
        });
        for record in &mut records {
            record.range = (record.range + dist.sample(&mut rng)).max(0.0);
        }
    }
    records
}

/// Azimuth/elevation of a direction relative to a boresight, measured in the
/// frame where the boresight is +x and +z is up.
fn direction_angles(direction: &Vector3<f64>, boresight: &Vector3<f64>) -> (f64, f64) {
    let x = *boresight;
    let z = if x.z.abs() > 0.99 {
        Vector3::x()
    } else {
        (Vector3::z() - x * x.z).normalize()
    };
    let y = z.cross(&x);
    let dx = direction.dot(&x);
    let dy = direction.dot(&y);
    let dz = direction.dot(&z).clamp(-1.0, 1.0);
    (dy.atan2(dx), dz.asin())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
