//! Rigid-body motion specs: absolute simulation time → rigid transform.
//!
//! Each target owns a `MotionSpec` evaluated once per time-step when the
//! scene snapshot is built. Evaluation is pure: two snapshots at the same
//! timestamp see the same pose, which keeps the whole pipeline deterministic.

use nalgebra::{Isometry3, Point3, Translation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Describes how a target moves over simulation time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MotionSpec {
    /// No motion: the base pose holds for all time.
    Static,
    /// Constant linear velocity (m/s, world frame).
    ConstantVelocity { velocity: Vector3<f64> },
    /// Rotation about an axis through the target's own origin. `rate` in rad/s.
    Spin { axis: Vector3<f64>, rate: f64 },
    /// Circular orbit about a world-frame center. `rate` in rad/s.
    Orbit {
        center: Point3<f64>,
        axis: Vector3<f64>,
        rate: f64,
    },
    /// Segmented: switch motion at given absolute times.
    /// `segments` sorted by start time ascending: [(t_start, spec), ...].
    /// Poses accumulate across completed segments so trajectories stay
    /// continuous at switch points.
    Segmented { segments: Vec<(f64, MotionSpec)> },
}

impl MotionSpec {
    /// World pose of the target at absolute time `t`, given its base pose.
    pub fn pose_at(&self, base: &Isometry3<f64>, t: f64) -> Isometry3<f64> {
        match self {
            MotionSpec::Static => *base,
            MotionSpec::ConstantVelocity { velocity } => {
                Translation3::from(velocity * t) * base
            }
            MotionSpec::Spin { axis, rate } => {
                let rot = axis_rotation(axis, rate * t);
                // Rotate in place: about the target origin, not the world origin.
                Isometry3::from_parts(base.translation, rot * base.rotation)
            }
            MotionSpec::Orbit { center, axis, rate } => {
                let rot = axis_rotation(axis, rate * t);
                let offset = base.translation.vector - center.coords;
                let pos = center.coords + rot * offset;
                Isometry3::from_parts(Translation3::from(pos), rot * base.rotation)
            }
            MotionSpec::Segmented { segments } => {
                let mut pose = *base;
                let mut prev_start = 0.0;
                let mut prev_spec: Option<&MotionSpec> = None;
                for (start, spec) in segments {
                    if *start > t {
                        break;
                    }
                    if let Some(p) = prev_spec {
                        pose = p.pose_at(&pose, *start - prev_start);
                    }
                    prev_start = *start;
                    prev_spec = Some(spec);
                }
                match prev_spec {
                    Some(spec) => spec.pose_at(&pose, t - prev_start),
                    None => pose, // before the first segment
                }
            }
        }
    }

    /// Instantaneous velocity of a world-frame point riding on the target.
    pub fn velocity_of(&self, point: &Point3<f64>, pose: &Isometry3<f64>, t: f64) -> Vector3<f64> {
        match self {
            MotionSpec::Static => Vector3::zeros(),
            MotionSpec::ConstantVelocity { velocity } => *velocity,
            MotionSpec::Spin { axis, rate } => {
                let omega = safe_unit(axis) * *rate;
                omega.cross(&(point - Point3::from(pose.translation.vector)))
            }
            MotionSpec::Orbit { center, axis, rate } => {
                let omega = safe_unit(axis) * *rate;
                omega.cross(&(point - *center))
            }
            MotionSpec::Segmented { segments } => {
                let active = segments.iter().filter(|(start, _)| *start <= t).last();
                match active {
                    Some((_, spec)) => spec.velocity_of(point, pose, t),
                    None => Vector3::zeros(),
                }
            }
        }
    }
}

fn axis_rotation(axis: &Vector3<f64>, angle: f64) -> UnitQuaternion<f64> {
    if axis.norm_squared() < 1e-24 {
        UnitQuaternion::identity()
    } else {
        UnitQuaternion::from_axis_angle(&Unit::new_normalize(*axis), angle)
    }
}

fn safe_unit(axis: &Vector3<f64>) -> Vector3<f64> {
    if axis.norm_squared() < 1e-24 {
        Vector3::zeros()
    } else {
        axis.normalize()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn constant_velocity_translates() {
        let base = Isometry3::translation(100.0, 0.0, 0.0);
        let spec = MotionSpec::ConstantVelocity {
            velocity: Vector3::new(-10.0, 0.0, 0.0),
        };
        let pose = spec.pose_at(&base, 5.0);
        assert_abs_diff_eq!(pose.translation.vector.x, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn spin_keeps_position() {
        let base = Isometry3::translation(0.0, 200.0, 0.0);
        let spec = MotionSpec::Spin {
            axis: Vector3::z(),
            rate: 1.0,
        };
        let pose = spec.pose_at(&base, 2.0);
        assert_abs_diff_eq!(pose.translation.vector.y, 200.0, epsilon = 1e-9);
        let angle = pose.rotation.angle();
        assert_abs_diff_eq!(angle, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn orbit_preserves_radius() {
        let base = Isometry3::translation(10.0, 0.0, 0.0);
        let spec = MotionSpec::Orbit {
            center: Point3::origin(),
            axis: Vector3::z(),
            rate: std::f64::consts::FRAC_PI_2,
        };
        let pose = spec.pose_at(&base, 1.0); // quarter turn
        assert_abs_diff_eq!(pose.translation.vector.norm(), 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pose.translation.vector.y, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn segmented_is_continuous_at_switch() {
        let base = Isometry3::identity();
        let spec = MotionSpec::Segmented {
            segments: vec![
                (
                    0.0,
                    MotionSpec::ConstantVelocity {
                        velocity: Vector3::new(10.0, 0.0, 0.0),
                    },
                ),
                (
                    2.0,
                    MotionSpec::ConstantVelocity {
                        velocity: Vector3::new(0.0, 5.0, 0.0),
                    },
                ),
            ],
        };
        let before = spec.pose_at(&base, 2.0 - 1e-9);
        let after = spec.pose_at(&base, 2.0 + 1e-9);
        assert_abs_diff_eq!(
            (before.translation.vector - after.translation.vector).norm(),
            0.0,
            epsilon = 1e-6
        );
        let end = spec.pose_at(&base, 3.0);
        assert_abs_diff_eq!(end.translation.vector.x, 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(end.translation.vector.y, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn spin_point_velocity_is_tangential() {
        let base = Isometry3::identity();
        let spec = MotionSpec::Spin {
            axis: Vector3::z(),
            rate: 2.0,
        };
        let v = spec.velocity_of(&Point3::new(3.0, 0.0, 0.0), &base, 0.0);
        assert_abs_diff_eq!(v.y, 6.0, epsilon = 1e-9); // |v| = ω r
        assert_abs_diff_eq!(v.x, 0.0, epsilon = 1e-9);
    }
}
