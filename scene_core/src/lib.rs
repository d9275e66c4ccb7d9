//! `scene_core` — Ray-traced scene geometry and field accumulation.
//!
//! # Module layout
//! - [`types`]   — Fundamental types (IDs, rays, constants)
//! - [`error`]   — Geometry error taxonomy
//! - [`mesh`]    — Triangulated meshes, materials, shape builders
//! - [`motion`]  — Rigid-body motion specs (time → transform)
//! - [`scene`]   — Scene store and immutable per-time-step snapshots
//! - [`bvh`]     — Axis-aligned BVH and ray-triangle intersection
//! - [`raygen`]  — Ray set generation (angular grid, plane wave, raster)
//! - [`tracer`]  — Multi-bounce shooting-and-bouncing-rays trace loop
//! - [`rcs`]     — RCS estimation and scattering-contribution extraction
//! - [`lidar`]   — Raw per-ray hit records (lidar-style scans)

pub mod bvh;
pub mod error;
pub mod lidar;
pub mod mesh;
pub mod motion;
pub mod raygen;
pub mod rcs;
pub mod scene;
pub mod tracer;
pub mod types;

pub use bvh::{Aabb, Bvh, SurfaceHit};
pub use error::GeometryError;
pub use lidar::{lidar_scene, scene_hits, LidarNoise, SceneHitRecord};
pub use mesh::{Material, TriMesh};
pub use motion::MotionSpec;
pub use raygen::{generate_rays, plane_wave_rays, RaySampling};
pub use rcs::{rcs_sbr, RcsOptions, ScatteringContribution, SummationMode};
pub use scene::{Scene, SceneSnapshot, SceneTarget};
pub use tracer::{trace, BounceHit, BouncePath, TraceConfig};
pub use types::{Ray, TargetId, SPEED_OF_LIGHT};
