//! Ray set generation.
//!
//! Pure functions: a time-step's ray set depends only on the sampling spec
//! and the launch geometry. Sampling density is always a tunable parameter —
//! denser sampling trades runtime for RCS-estimate variance, and the right
//! trade depends on the scene, so nothing here is hardcoded.
//!
//! A zero field of view or a zero ray count yields an empty set, which the
//! downstream accumulator treats as zero contribution, not as an error.

use crate::types::Ray;
use nalgebra::{Point3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// How to cover the field of view with rays.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum RaySampling {
    /// One ray per angular bin over a rectangular az/el field of view
    /// centred on the boresight.
    AngularGrid {
        /// Full azimuth field of view (radians)
        az_fov: f64,
        /// Full elevation field of view (radians)
        el_fov: f64,
        rays_az: usize,
        rays_el: usize,
    },
    /// Parallel rays on a square grid perpendicular to the propagation
    /// direction. Used for plane-wave illumination in RCS mode.
    PlaneWave {
        /// Half side length of the grid (m)
        half_extent: f64,
        rays_per_side: usize,
    },
    /// Lidar-style raster: full 360° azimuth sweep with a limited elevation
    /// fan.
    LidarRaster {
        rays_azimuth: usize,
        rays_elevation: usize,
        /// Full elevation fan (radians), centred on the horizon
        el_fov: f64,
    },
}

/// Generate the ray set for one time-step from a launch point and boresight.
pub fn generate_rays(origin: Point3<f64>, boresight: Vector3<f64>, sampling: &RaySampling) -> Vec<Ray> {
    match *sampling {
        RaySampling::AngularGrid {
            az_fov,
            el_fov,
            rays_az,
            rays_el,
        } => angular_grid(origin, boresight, az_fov, el_fov, rays_az, rays_el),
        RaySampling::PlaneWave {
            half_extent,
            rays_per_side,
        } => plane_wave_rays(boresight, origin, half_extent, rays_per_side),
        RaySampling::LidarRaster {
            rays_azimuth,
            rays_elevation,
            el_fov,
        } => angular_grid(
            origin,
            boresight,
            2.0 * std::f64::consts::PI,
            el_fov,
            rays_azimuth,
            rays_elevation,
        ),
    }
}

fn angular_grid(
    origin: Point3<f64>,
    boresight: Vector3<f64>,
    az_fov: f64,
    el_fov: f64,
    rays_az: usize,
    rays_el: usize,
) -> Vec<Ray> {
    if rays_az == 0 || rays_el == 0 || az_fov <= 0.0 {
        return Vec::new();
    }
    // Single-row fans (el_fov == 0, rays_el == 1) are legal: d_el then weighs
    // the ray as a one-radian-tall strip.
    if el_fov <= 0.0 && rays_el != 1 {
        return Vec::new();
    }

    let boresight = boresight.normalize();
    let d_az = az_fov / rays_az as f64;
    let d_el = if rays_el == 1 { 1.0 } else { el_fov / rays_el as f64 };

    let mut rays = Vec::with_capacity(rays_az * rays_el);
    for ie in 0..rays_el {
        let el = if rays_el == 1 {
            0.0
        } else {
            -el_fov / 2.0 + (ie as f64 + 0.5) * el_fov / rays_el as f64
        };
        for ia in 0..rays_az {
            let az = -az_fov / 2.0 + (ia as f64 + 0.5) * d_az;
            let dir = rotate_az_el(&boresight, az, el);
            // Solid-angle weight of this bin
            let weight = d_az * d_el * el.cos();
            rays.push(Ray::new(origin, dir, weight));
        }
    }
    rays
}

/// Parallel rays covering a `2h × 2h` square perpendicular to `direction`,
/// centred on `center` and launched from one bounding-radius behind it.
/// Each ray carries its tube cross-section area as weight.
pub fn plane_wave_rays(
    direction: Vector3<f64>,
    center: Point3<f64>,
    half_extent: f64,
    rays_per_side: usize,
) -> Vec<Ray> {
    if rays_per_side == 0 || half_extent <= 0.0 {
        return Vec::new();
    }
    let direction = direction.normalize();
    let (u, v) = orthonormal_basis(&direction);
    let step = 2.0 * half_extent / rays_per_side as f64;
    let tube_area = step * step;
    // Launch plane sits behind the target so every ray enters from outside.
    let standoff = 4.0 * half_extent;
    let plane_origin = center - direction * standoff;

    let mut rays = Vec::with_capacity(rays_per_side * rays_per_side);
    for i in 0..rays_per_side {
        for j in 0..rays_per_side {
            let a = -half_extent + (i as f64 + 0.5) * step;
            let b = -half_extent + (j as f64 + 0.5) * step;
            let origin = plane_origin + u * a + v * b;
            rays.push(Ray::new(origin, direction, tube_area));
        }
    }
    rays
}

/// Rotate a boresight by azimuth (about +z) then elevation (about the local
/// horizontal axis).
fn rotate_az_el(boresight: &Vector3<f64>, az: f64, el: f64) -> Vector3<f64> {
    let az_rot = UnitQuaternion::from_axis_angle(&Unit::new_normalize(Vector3::z()), az);
    let horizontal = az_rot * boresight;
    let el_axis = Vector3::z().cross(&horizontal);
    if el_axis.norm_squared() < 1e-12 {
        return horizontal;
    }
    let el_rot = UnitQuaternion::from_axis_angle(&Unit::new_normalize(el_axis), el);
    (el_rot * horizontal).normalize()
}

fn orthonormal_basis(dir: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let helper = if dir.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let u = dir.cross(&helper).normalize();
    let v = dir.cross(&u);
    (u, v)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn angular_grid_count_and_cone() {
        let rays = generate_rays(
            Point3::origin(),
            Vector3::x(),
            &RaySampling::AngularGrid {
                az_fov: 0.2,
                el_fov: 0.2,
                rays_az: 10,
                rays_el: 8,
            },
        );
        assert_eq!(rays.len(), 80);
        for ray in &rays {
            // All rays within the half-FOV cone (diagonal corner ≈ 0.14 rad)
            let angle = ray.direction.dot(&Vector3::x()).acos();
            assert!(angle < 0.15, "ray leaves the configured cone: {angle}");
            assert_abs_diff_eq!(ray.direction.norm(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn zero_fov_yields_no_rays() {
        let rays = generate_rays(
            Point3::origin(),
            Vector3::x(),
            &RaySampling::AngularGrid {
                az_fov: 0.0,
                el_fov: 0.1,
                rays_az: 10,
                rays_el: 10,
            },
        );
        assert!(rays.is_empty());
    }

    #[test]
    fn plane_wave_tube_areas_tile_the_grid() {
        let rays = plane_wave_rays(Vector3::z(), Point3::origin(), 2.0, 16);
        assert_eq!(rays.len(), 256);
        let total: f64 = rays.iter().map(|r| r.weight).sum();
        assert_abs_diff_eq!(total, 16.0, epsilon = 1e-9); // (2*2)²
        for ray in &rays {
            assert_abs_diff_eq!(ray.direction.z, 1.0, epsilon = 1e-12);
            assert!(ray.origin.z < 0.0, "rays start behind the grid centre");
        }
    }

    #[test]
    fn lidar_raster_covers_full_azimuth() {
        let rays = generate_rays(
            Point3::origin(),
            Vector3::x(),
            &RaySampling::LidarRaster {
                rays_azimuth: 360,
                rays_elevation: 1,
                el_fov: 0.0,
            },
        );
        assert_eq!(rays.len(), 360);
        // Some ray must point roughly backwards
        assert!(rays.iter().any(|r| r.direction.x < -0.99));
    }
}
