//! Scene store and immutable per-time-step snapshots.
//!
//! The `Scene` owns target meshes and their motion specs; it is read-only
//! while a simulation run is in flight. Workers never walk a mutable scene:
//! each time-step gets its own `SceneSnapshot` with world-space triangles
//! and a freshly built BVH, so all rays within one pulse observe the same
//! frozen scene state.

use crate::bvh::{moller_trumbore, Aabb, Bvh, SurfaceHit};
use crate::error::GeometryError;
use crate::mesh::{Material, TriMesh, DEGENERATE_AREA};
use crate::types::TargetId;
use nalgebra::{Isometry3, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::motion::MotionSpec;

/// One simulated target: immutable mesh topology, time-varying pose.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SceneTarget {
    /// Unique target ID (used in hit records and error reports)
    pub id: TargetId,
    pub mesh: TriMesh,
    /// Pose at t = 0, before motion is applied
    pub base_pose: Isometry3<f64>,
    pub motion: MotionSpec,
}

/// The full simulated scene. An empty scene is valid: it traces to zero
/// contributions, never to an error.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Scene {
    pub targets: Vec<SceneTarget>,
}

impl Scene {
    pub fn new(targets: Vec<SceneTarget>) -> Self {
        Self { targets }
    }

    /// Validate every target mesh, attaching the offending target's ID.
    /// Meshes are validated again here (not only at construction) because
    /// scenes may arrive deserialized from configuration.
    pub fn validate(&self) -> Result<(), GeometryError> {
        for target in &self.targets {
            target
                .mesh
                .revalidate()
                .map_err(|e| e.in_target(target.id))?;
        }
        Ok(())
    }

    /// Build the immutable snapshot of this scene at absolute time `t`.
    pub fn snapshot(&self, t: f64) -> SceneSnapshot {
        SceneSnapshot::build(self, t)
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A world-space triangle frozen at one time-step.
#[derive(Clone, Debug)]
pub struct WorldTriangle {
    pub v0: Point3<f64>,
    pub v1: Point3<f64>,
    pub v2: Point3<f64>,
    /// Unit geometric normal
    pub normal: Vector3<f64>,
    pub target: TargetId,
    pub material: Material,
    /// Instantaneous velocity of the triangle centroid (for Doppler)
    pub velocity: Vector3<f64>,
}

/// Immutable scene state at one time-step: world triangles plus a BVH built
/// once for the whole step (never per ray).
#[derive(Clone, Debug)]
pub struct SceneSnapshot {
    pub time: f64,
    pub triangles: Vec<WorldTriangle>,
    bvh: Bvh,
    bounds: Aabb,
}

impl SceneSnapshot {
    pub fn build(scene: &Scene, t: f64) -> Self {
        let mut triangles = Vec::new();
        let mut skipped = 0usize;

        for target in &scene.targets {
            let pose = target.motion.pose_at(&target.base_pose, t);
            for i in 0..target.mesh.triangle_count() {
                let (a, b, c) = target.mesh.triangle_vertices(i);
                let v0 = pose * a;
                let v1 = pose * b;
                let v2 = pose * c;
                let n = (v1 - v0).cross(&(v2 - v0));
                if n.norm() * 0.5 <= DEGENERATE_AREA {
                    skipped += 1;
                    continue;
                }
                let centroid = Point3::from((v0.coords + v1.coords + v2.coords) / 3.0);
                triangles.push(WorldTriangle {
                    v0,
                    v1,
                    v2,
                    normal: n.normalize(),
                    target: target.id,
                    material: target.mesh.material(i),
                    velocity: target.motion.velocity_of(&centroid, &pose, t),
                });
            }
        }

        if skipped > 0 {
            tracing::debug!(time = t, skipped, "skipped degenerate triangles in snapshot");
        }

        let tri_bounds: Vec<Aabb> = triangles
            .iter()
            .map(|tr| Aabb::from_points(&[tr.v0, tr.v1, tr.v2]))
            .collect();
        let bvh = Bvh::build(&tri_bounds);
        let bounds = bvh.root_bounds();

        Self {
            time: t,
            triangles,
            bvh,
            bounds,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Bounding box of all scene geometry at this time-step.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Nearest ray-surface intersection, if any.
    pub fn intersect(&self, origin: &Point3<f64>, dir: &Vector3<f64>) -> Option<SurfaceHit> {
        let hit = self.bvh.nearest(origin, dir, |i| {
            let tr = &self.triangles[i];
            moller_trumbore(origin, dir, &tr.v0, &tr.v1, &tr.v2)
        })?;
        let (index, t) = hit;
        Some(SurfaceHit {
            t,
            point: origin + dir * t,
            normal: self.triangles[index].normal,
            triangle: index,
        })
    }

    /// True when a segment from `from` toward `to` is blocked by geometry.
    /// Used for receive-path occlusion of multi-bounce contributions.
    pub fn occluded(&self, from: &Point3<f64>, to: &Point3<f64>) -> bool {
        let delta = to - from;
        let dist = delta.norm();
        if dist < 1e-9 {
            return false;
        }
        let dir = delta / dist;
        match self.intersect(from, &dir) {
            Some(hit) => hit.t < dist - 1e-6,
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
