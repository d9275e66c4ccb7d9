//! Triangulated target meshes, surface materials, and shape builders.
//!
//! Mesh topology is immutable once constructed; only the owning target's
//! rigid transform varies with simulation time. Degenerate (zero-area)
//! triangles are tolerated at construction — the snapshot builder skips
//! them — but a mesh in which *every* triangle is degenerate is rejected.

use crate::error::GeometryError;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Triangles below this area (m²) are treated as degenerate and skipped.
pub const DEGENERATE_AREA: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Material
// ---------------------------------------------------------------------------

/// Surface scattering behaviour. A closed set of variants with a uniform
/// `reflect` rule, resolved once at configuration time.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum Material {
    /// Mirror-like bounce scaled by an amplitude reflectivity in [0, 1].
    Specular { reflectivity: f64 },
    /// Rough surface: deterministic scatter along the facing normal
    /// (the mean of the diffuse lobe), scaled by reflectivity.
    Diffuse { reflectivity: f64 },
}

impl Material {
    /// Amplitude reflectivity coefficient.
    pub fn reflectivity(&self) -> f64 {
        match self {
            Material::Specular { reflectivity } | Material::Diffuse { reflectivity } => {
                *reflectivity
            }
        }
    }

    /// Outgoing direction for an incoming unit direction `incoming` at a
    /// surface with unit normal `normal`. The normal is re-oriented to face
    /// the incoming ray, so winding order never flips the bounce.
    pub fn reflect(&self, incoming: &Vector3<f64>, normal: &Vector3<f64>) -> Vector3<f64> {
        let facing = if incoming.dot(normal) > 0.0 {
            -normal
        } else {
            *normal
        };
        match self {
            Material::Specular { .. } => incoming - facing * (2.0 * incoming.dot(&facing)),
            Material::Diffuse { .. } => facing,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Material::Specular { reflectivity: 1.0 }
    }
}

// ---------------------------------------------------------------------------
// TriMesh
// ---------------------------------------------------------------------------

/// An indexed triangle mesh with one material per triangle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TriMesh {
    vertices: Vec<Point3<f64>>,
    triangles: Vec<[u32; 3]>,
    materials: Vec<Material>,
}

impl TriMesh {
    /// Build a mesh with a single material shared by every triangle.
    pub fn new(
        vertices: Vec<Point3<f64>>,
        triangles: Vec<[u32; 3]>,
        material: Material,
    ) -> Result<Self, GeometryError> {
        let materials = vec![material; triangles.len()];
        Self::with_materials(vertices, triangles, materials)
    }

    /// Build a mesh with per-triangle materials.
    pub fn with_materials(
        vertices: Vec<Point3<f64>>,
        triangles: Vec<[u32; 3]>,
        materials: Vec<Material>,
    ) -> Result<Self, GeometryError> {
        let mesh = Self {
            vertices,
            triangles,
            materials,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Re-run construction-time validation. Scenes arriving deserialized
    /// from configuration call this before any trace work begins.
    pub fn revalidate(&self) -> Result<(), GeometryError> {
        self.validate()
    }

    fn validate(&self) -> Result<(), GeometryError> {
        if self.triangles.is_empty() {
            return Err(GeometryError::EmptyMesh);
        }
        if self.materials.len() != self.triangles.len() {
            return Err(GeometryError::MaterialCountMismatch {
                triangles: self.triangles.len(),
                materials: self.materials.len(),
            });
        }
        for (index, v) in self.vertices.iter().enumerate() {
            if !(v.x.is_finite() && v.y.is_finite() && v.z.is_finite()) {
                return Err(GeometryError::NonFiniteVertex { index });
            }
        }
        let len = self.vertices.len();
        for (triangle, tri) in self.triangles.iter().enumerate() {
            for &index in tri {
                if index as usize >= len {
                    return Err(GeometryError::IndexOutOfRange {
                        triangle,
                        index,
                        len,
                    });
                }
            }
        }
        let any_valid = (0..self.triangles.len()).any(|i| self.triangle_area(i) > DEGENERATE_AREA);
        if !any_valid {
            return Err(GeometryError::AllDegenerate);
        }
        Ok(())
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertex(&self, i: usize) -> Point3<f64> {
        self.vertices[i]
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// The three corner positions of triangle `i` (local frame).
    pub fn triangle_vertices(&self, i: usize) -> (Point3<f64>, Point3<f64>, Point3<f64>) {
        let [a, b, c] = self.triangles[i];
        (
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        )
    }

    pub fn material(&self, i: usize) -> Material {
        self.materials[i]
    }

    /// Geometric (winding-order) normal of triangle `i`; zero for degenerates.
    pub fn triangle_normal(&self, i: usize) -> Vector3<f64> {
        let (a, b, c) = self.triangle_vertices(i);
        let n = (b - a).cross(&(c - a));
        if n.norm_squared() < DEGENERATE_AREA * DEGENERATE_AREA {
            Vector3::zeros()
        } else {
            n.normalize()
        }
    }

    pub fn triangle_area(&self, i: usize) -> f64 {
        let (a, b, c) = self.triangle_vertices(i);
        (b - a).cross(&(c - a)).norm() * 0.5
    }

    /// Radius of the bounding sphere about the local origin. Used to size
    /// plane-wave ray grids so the whole target is illuminated.
    pub fn bounding_radius(&self) -> f64 {
        self.vertices
            .iter()
            .map(|v| v.coords.norm())
            .fold(0.0, f64::max)
    }

    // ----------------------------------------------------------------
    // Shape builders (scenarios and tests)
    // ----------------------------------------------------------------

    /// Rectangular plate in the local XY plane, normal +z, centred on origin.
    pub fn flat_plate(width: f64, height: f64, material: Material) -> Self {
        let hw = width / 2.0;
        let hh = height / 2.0;
        let vertices = vec![
            Point3::new(-hw, -hh, 0.0),
            Point3::new(hw, -hh, 0.0),
            Point3::new(hw, hh, 0.0),
            Point3::new(-hw, hh, 0.0),
        ];
        let triangles = vec![[0, 1, 2], [0, 2, 3]];
        Self::new(vertices, triangles, material).expect("plate mesh is well-formed")
    }

    /// Small square facet standing in for a point scatterer.
    pub fn point_facet(size: f64, material: Material) -> Self {
        Self::flat_plate(size, size, material)
    }

    /// Icosphere: subdivided icosahedron projected onto a sphere of the
    /// given radius. Subdivision `n` yields `20 * 4^n` triangles.
    pub fn icosphere(radius: f64, subdivisions: u32, material: Material) -> Self {
        let t = (1.0 + 5.0_f64.sqrt()) / 2.0;
        let mut vertices: Vec<Point3<f64>> = vec![
            Point3::new(-1.0, t, 0.0),
            Point3::new(1.0, t, 0.0),
            Point3::new(-1.0, -t, 0.0),
            Point3::new(1.0, -t, 0.0),
            Point3::new(0.0, -1.0, t),
            Point3::new(0.0, 1.0, t),
            Point3::new(0.0, -1.0, -t),
            Point3::new(0.0, 1.0, -t),
            Point3::new(t, 0.0, -1.0),
            Point3::new(t, 0.0, 1.0),
            Point3::new(-t, 0.0, -1.0),
            Point3::new(-t, 0.0, 1.0),
        ];
        let mut triangles: Vec<[u32; 3]> = vec![
            [0, 11, 5],
            [0, 5, 1],
            [0, 1, 7],
            [0, 7, 10],
            [0, 10, 11],
            [1, 5, 9],
            [5, 11, 4],
            [11, 10, 2],
            [10, 7, 6],
            [7, 1, 8],
            [3, 9, 4],
            [3, 4, 2],
            [3, 2, 6],
            [3, 6, 8],
            [3, 8, 9],
            [4, 9, 5],
            [2, 4, 11],
            [6, 2, 10],
            [8, 6, 7],
            [9, 8, 1],
        ];

        for _ in 0..subdivisions {
            let mut midpoint: HashMap<(u32, u32), u32> = HashMap::new();
            let mut next = Vec::with_capacity(triangles.len() * 4);
            for [a, b, c] in &triangles {
                let ab = midpoint_index(&mut vertices, &mut midpoint, *a, *b);
                let bc = midpoint_index(&mut vertices, &mut midpoint, *b, *c);
                let ca = midpoint_index(&mut vertices, &mut midpoint, *c, *a);
                next.push([*a, ab, ca]);
                next.push([*b, bc, ab]);
                next.push([*c, ca, bc]);
                next.push([ab, bc, ca]);
            }
            triangles = next;
        }

        for v in &mut vertices {
            let n = v.coords.normalize();
            *v = Point3::from(n * radius);
        }

        Self::new(vertices, triangles, material).expect("icosphere mesh is well-formed")
    }

    /// Trihedral corner reflector: three mutually perpendicular square plates
    /// spanning `[0, size]²` in the XY, YZ and XZ planes, open toward +x+y+z.
    pub fn corner_reflector(size: f64, material: Material) -> Self {
        let s = size;
        let vertices = vec![
            Point3::origin(),
            Point3::new(s, 0.0, 0.0),
            Point3::new(s, s, 0.0),
            Point3::new(0.0, s, 0.0),
            Point3::new(0.0, s, s),
            Point3::new(0.0, 0.0, s),
            Point3::new(s, 0.0, s),
        ];
        let triangles = vec![
            // XY plane
            [0, 1, 2],
            [0, 2, 3],
            // YZ plane
            [0, 3, 4],
            [0, 4, 5],
            // XZ plane
            [0, 5, 6],
            [0, 6, 1],
        ];
        Self::new(vertices, triangles, material).expect("corner mesh is well-formed")
    }
}

fn midpoint_index(
    vertices: &mut Vec<Point3<f64>>,
    cache: &mut HashMap<(u32, u32), u32>,
    a: u32,
    b: u32,
) -> u32 {
    let key = if a < b { (a, b) } else { (b, a) };
    if let Some(&idx) = cache.get(&key) {
        return idx;
    }
    let mid = Point3::from((vertices[a as usize].coords + vertices[b as usize].coords) * 0.5);
    let idx = vertices.len() as u32;
    vertices.push(mid);
    cache.insert(key, idx);
    idx
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
