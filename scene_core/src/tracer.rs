//! Multi-bounce shooting-and-bouncing-rays trace loop.
//!
//! The per-ray lifecycle (generate → bounce → terminate → accumulate) is an
//! explicit iterative loop with an accumulator and a termination predicate.
//! A ray terminates when:
//! (a) its bounce count exceeds the configured maximum,
//! (b) its remaining energy drops below the negligibility threshold, or
//! (c) it exits the scene bounding volume (no further intersection).

use crate::scene::SceneSnapshot;
use crate::types::Ray;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Offset applied along the surface normal after a bounce, so the continued
/// ray never re-hits the triangle it just left.
const BOUNCE_OFFSET: f64 = 1e-6;

/// Trace termination parameters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Maximum number of surface interactions per ray
    pub max_bounces: u32,
    /// Rays whose remaining amplitude falls below this are dropped
    pub min_energy: f64,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_bounces: 3,
            min_energy: 1e-6,
        }
    }
}

/// One surface interaction along a traced path.
#[derive(Clone, Debug)]
pub struct BounceHit {
    pub point: Point3<f64>,
    /// Surface normal, oriented against the incoming ray
    pub normal: Vector3<f64>,
    pub target: crate::types::TargetId,
    /// Direction the ray was travelling when it struck this surface
    pub incoming: Vector3<f64>,
    /// Path length from the launch point up to this hit
    pub cumulative_len: f64,
    /// Product of amplitude reflectivities up to and including this bounce
    pub cumulative_reflectivity: f64,
    /// Instantaneous velocity of the struck surface (for Doppler)
    pub velocity: Vector3<f64>,
    /// Polarization state after this bounce
    pub polarization: Vector3<f64>,
}

/// A terminated multi-bounce ray path.
#[derive(Clone, Debug)]
pub struct BouncePath {
    pub hits: Vec<BounceHit>,
    /// Path length from launch through the last hit
    pub total_len: f64,
    /// Direction of travel after the final bounce
    pub exit_direction: Vector3<f64>,
    /// Remaining amplitude after the final bounce
    pub exit_energy: f64,
    /// Sampling weight inherited from the launched ray
    pub weight: f64,
}

/// Trace a single ray through the frozen scene. Returns `None` when the ray
/// never touches geometry — a miss, not an error.
pub fn trace(snapshot: &SceneSnapshot, ray: Ray, cfg: &TraceConfig) -> Option<BouncePath> {
    let mut origin = ray.origin;
    let mut direction = ray.direction;
    let mut polarization = ray.polarization;
    let mut energy = ray.energy;
    let mut cumulative_len = 0.0;
    let mut cumulative_reflectivity = 1.0;
    let mut hits: Vec<BounceHit> = Vec::new();

    while (hits.len() as u32) < cfg.max_bounces {
        let hit = match snapshot.intersect(&origin, &direction) {
            Some(h) => h,
            None => break, // exits the scene bounding volume
        };

        let tri = &snapshot.triangles[hit.triangle];
        let facing = if direction.dot(&hit.normal) > 0.0 {
            -hit.normal
        } else {
            hit.normal
        };

        cumulative_len += hit.t;
        let reflectivity = tri.material.reflectivity();
        cumulative_reflectivity *= reflectivity;
        energy *= reflectivity;

        let outgoing = tri.material.reflect(&direction, &hit.normal);
        // Reflect the polarization vector alongside the direction, then
        // re-project so it stays perpendicular to the new direction.
        let reflected_pol = polarization - facing * (2.0 * polarization.dot(&facing));
        polarization = perpendicular_component(&reflected_pol, &outgoing);

        hits.push(BounceHit {
            point: hit.point,
            normal: facing,
            target: tri.target,
            incoming: direction,
            cumulative_len,
            cumulative_reflectivity,
            velocity: tri.velocity,
            polarization,
        });

        if energy < cfg.min_energy {
            break;
        }

        direction = outgoing;
        origin = hit.point + facing * BOUNCE_OFFSET;
    }

    if hits.is_empty() {
        return None;
    }

    Some(BouncePath {
        total_len: cumulative_len,
        exit_direction: direction,
        exit_energy: energy,
        weight: ray.weight,
        hits,
    })
}

fn perpendicular_component(v: &Vector3<f64>, dir: &Vector3<f64>) -> Vector3<f64> {
    let perp = v - dir * v.dot(dir);
    if perp.norm_squared() < 1e-12 {
        crate::types::vertical_polarization(dir)
    } else {
        perp.normalize()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Material, TriMesh};
    use crate::motion::MotionSpec;
    use crate::scene::{Scene, SceneTarget};
    use crate::types::TargetId;
    use approx::assert_abs_diff_eq;
    use nalgebra::Isometry3;

    fn facing_plate(range: f64, reflectivity: f64) -> Scene {
        let pose = Isometry3::from_parts(
            nalgebra::Translation3::new(range, 0.0, 0.0),
            nalgebra::UnitQuaternion::from_axis_angle(
                &nalgebra::Unit::new_normalize(nalgebra::Vector3::y()),
                -std::f64::consts::FRAC_PI_2,
            ),
        );
        Scene::new(vec![SceneTarget {
            id: TargetId(0),
            mesh: TriMesh::flat_plate(20.0, 20.0, Material::Specular { reflectivity }),
            base_pose: pose,
            motion: MotionSpec::Static,
        }])
    }

    #[test]
    fn single_bounce_off_facing_plate_returns_toward_source() {
        let snap = facing_plate(300.0, 1.0).snapshot(0.0);
        let ray = Ray::new(Point3::origin(), Vector3::x(), 1.0);
        let path = trace(&snap, ray, &TraceConfig::default()).expect("must hit");
        assert_eq!(path.hits.len(), 1);
        assert_abs_diff_eq!(path.total_len, 300.0, epsilon = 1e-6);
        // Normal incidence: specular return retraces the incoming ray
        assert_abs_diff_eq!(path.exit_direction.x, -1.0, epsilon = 1e-9);
    }

    #[test]
    fn energy_threshold_terminates_low_reflectivity_paths() {
        let snap = facing_plate(300.0, 1e-4).snapshot(0.0);
        let ray = Ray::new(Point3::origin(), Vector3::x(), 1.0);
        let cfg = TraceConfig {
            max_bounces: 10,
            min_energy: 1e-3,
        };
        let path = trace(&snap, ray, &cfg).expect("first hit still recorded");
        assert_eq!(path.hits.len(), 1, "ray must stop after dropping below min_energy");
        assert!(path.exit_energy < cfg.min_energy);
    }

    #[test]
    fn bounce_limit_respected_in_corner() {
        // A dihedral corner traps rays for exactly two bounces.
        let corner = Scene::new(vec![SceneTarget {
            id: TargetId(1),
            mesh: TriMesh::corner_reflector(50.0, Material::Specular { reflectivity: 1.0 }),
            base_pose: Isometry3::identity(),
            motion: MotionSpec::Static,
        }]);
        let snap = corner.snapshot(0.0);
        // Aim into the corner from outside along -x-y-z
        let ray = Ray::new(
            Point3::new(30.0, 20.0, 10.0),
            Vector3::new(-1.0, -0.7, -0.3).normalize(),
            1.0,
        );
        let limited = trace(
            &snap,
            ray.clone(),
            &TraceConfig {
                max_bounces: 1,
                min_energy: 0.0,
            },
        )
        .expect("hit");
        assert_eq!(limited.hits.len(), 1);

        let full = trace(
            &snap,
            ray,
            &TraceConfig {
                max_bounces: 5,
                min_energy: 0.0,
            },
        )
        .expect("hit");
        assert!(
            full.hits.len() >= limited.hits.len(),
            "raising the bounce limit can only add interactions"
        );
    }

    #[test]
    fn zero_bounce_budget_yields_no_path() {
        let snap = facing_plate(300.0, 1.0).snapshot(0.0);
        let ray = Ray::new(Point3::origin(), Vector3::x(), 1.0);
        let cfg = TraceConfig {
            max_bounces: 0,
            min_energy: 0.0,
        };
        assert!(trace(&snap, ray, &cfg).is_none());
    }

    #[test]
    fn polarization_stays_perpendicular_after_bounces() {
        let snap = facing_plate(300.0, 1.0).snapshot(0.0);
        let ray = Ray::new(Point3::origin(), Vector3::x(), 1.0);
        let path = trace(&snap, ray, &TraceConfig::default()).unwrap();
        let last = path.hits.last().unwrap();
        assert_abs_diff_eq!(
            last.polarization.dot(&path.exit_direction),
            0.0,
            epsilon = 1e-9
        );
    }
}
