//! Geometry error taxonomy.
//!
//! Malformed scene input is fatal for the current run but corrupts no global
//! state: the caller may fix the scene and retry. Numerical degeneracies
//! (zero-area triangles, zero-length rays) are *not* errors — they are
//! skipped locally and logged as diagnostics by the modules that meet them.

use crate::types::TargetId;
use thiserror::Error;

/// A scene or mesh that cannot be traced.
#[derive(Debug, Clone, Error)]
pub enum GeometryError {
    #[error("mesh has no triangles")]
    EmptyMesh,

    #[error("triangle {triangle} references vertex {index}, but the mesh has {len} vertices")]
    IndexOutOfRange {
        triangle: usize,
        index: u32,
        len: usize,
    },

    #[error("vertex {index} has a non-finite coordinate")]
    NonFiniteVertex { index: usize },

    #[error("mesh has {triangles} triangles but {materials} material entries")]
    MaterialCountMismatch { triangles: usize, materials: usize },

    #[error("every triangle in the mesh is degenerate (zero area)")]
    AllDegenerate,

    #[error("target {id}: {source}")]
    InTarget {
        id: TargetId,
        #[source]
        source: Box<GeometryError>,
    },
}

impl GeometryError {
    /// Attach the offending target's identifier to a mesh-level error.
    pub fn in_target(self, id: TargetId) -> Self {
        GeometryError::InTarget {
            id,
            source: Box::new(self),
        }
    }
}
