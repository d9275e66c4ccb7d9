//! Fundamental types used across the entire workspace.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Speed of light in vacuum (m/s).
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

// ---------------------------------------------------------------------------
// Identifier types — newtype wrappers so IDs are never confused at compile time
// ---------------------------------------------------------------------------

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TargetId(pub u32);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Ray
// ---------------------------------------------------------------------------

/// A single ray in flight. Ephemeral: owned by the tracer for one time-step
/// and destroyed once it exits the scene bounds or exhausts its bounce budget.
#[derive(Clone, Debug)]
pub struct Ray {
    /// Launch point (world frame)
    pub origin: Point3<f64>,
    /// Unit propagation direction
    pub direction: Vector3<f64>,
    /// Remaining amplitude fraction (1.0 at launch, scaled per bounce)
    pub energy: f64,
    /// Unit electric-field orientation, perpendicular to `direction`
    pub polarization: Vector3<f64>,
    /// Number of surface interactions so far
    pub bounces: u32,
    /// Sampling weight: tube cross-section area (m²) for plane-wave sets,
    /// solid angle (sr) for angular grids
    pub weight: f64,
}

impl Ray {
    /// New unit-energy ray with vertical polarization and no bounce history.
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>, weight: f64) -> Self {
        let direction = direction.normalize();
        Self {
            origin,
            polarization: vertical_polarization(&direction),
            direction,
            energy: 1.0,
            bounces: 0,
            weight,
        }
    }

    /// Point along the ray at parameter `t`.
    pub fn at(&self, t: f64) -> Point3<f64> {
        self.origin + self.direction * t
    }
}

/// Vertical polarization reference for a propagation direction: the projection
/// of +z onto the plane perpendicular to `direction`. Falls back to +x when
/// the ray travels straight up or down.
pub fn vertical_polarization(direction: &Vector3<f64>) -> Vector3<f64> {
    let z = Vector3::z();
    let proj = z - direction * z.dot(direction);
    if proj.norm_squared() < 1e-12 {
        Vector3::x()
    } else {
        proj.normalize()
    }
}

/// Horizontal polarization reference: perpendicular to both the direction and
/// its vertical reference.
pub fn horizontal_polarization(direction: &Vector3<f64>) -> Vector3<f64> {
    direction.cross(&vertical_polarization(direction)).normalize()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn polarization_is_perpendicular() {
        let dir = Vector3::new(1.0, 2.0, 0.5).normalize();
        let v = vertical_polarization(&dir);
        let h = horizontal_polarization(&dir);
        assert_abs_diff_eq!(v.dot(&dir), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(h.dot(&dir), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v.dot(&h), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn polarization_vertical_ray_falls_back() {
        let v = vertical_polarization(&Vector3::z());
        assert_abs_diff_eq!(v.dot(&Vector3::x()), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn ray_at_parameter() {
        let ray = Ray::new(Point3::origin(), Vector3::x(), 1.0);
        let p = ray.at(5.0);
        assert_abs_diff_eq!(p.x, 5.0, epsilon = 1e-12);
    }
}
