//! Axis-aligned bounding-volume hierarchy and ray-triangle intersection.
//!
//! # Design
//! - Median-split binary BVH over primitive bounds, rebuilt once per scene
//!   snapshot when targets move rigidly. Rebuilding per ray is disallowed:
//!   it dominates trace cost for any non-trivial mesh.
//! - Traversal prunes nodes whose entry distance exceeds the best hit found
//!   so far, visiting near children first.
//! - Triangle tests use Möller–Trumbore with an epsilon guard; degenerate
//!   triangles never reach the BVH (the snapshot builder drops them).

use nalgebra::{Point3, Vector3};

/// Intersection epsilon: rejects parallel rays and self-hits at bounce points.
pub const INTERSECT_EPS: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Aabb
// ---------------------------------------------------------------------------

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    /// Empty box: grows to fit whatever is added.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn from_points(points: &[Point3<f64>]) -> Self {
        let mut b = Self::empty();
        for p in points {
            b.grow(p);
        }
        b
    }

    pub fn grow(&mut self, p: &Point3<f64>) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    pub fn union(&mut self, other: &Aabb) {
        self.grow(&other.min);
        self.grow(&other.max);
    }

    pub fn centroid(&self) -> Point3<f64> {
        Point3::from((self.min.coords + self.max.coords) * 0.5)
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    /// Slab test: entry distance of the ray into the box, if it intersects
    /// within `[0, t_max]`.
    pub fn entry_distance(
        &self,
        origin: &Point3<f64>,
        inv_dir: &Vector3<f64>,
        t_max: f64,
    ) -> Option<f64> {
        let mut t0 = 0.0_f64;
        let mut t1 = t_max;
        for i in 0..3 {
            if inv_dir[i].is_infinite() {
                // Ray parallel to this slab: inside or out, no distance bound.
                if origin[i] < self.min[i] || origin[i] > self.max[i] {
                    return None;
                }
                continue;
            }
            let near = (self.min[i] - origin[i]) * inv_dir[i];
            let far = (self.max[i] - origin[i]) * inv_dir[i];
            let (near, far) = if near <= far { (near, far) } else { (far, near) };
            t0 = t0.max(near);
            t1 = t1.min(far);
            if t0 > t1 {
                return None;
            }
        }
        Some(t0)
    }
}

// ---------------------------------------------------------------------------
// Möller–Trumbore
// ---------------------------------------------------------------------------

/// Ray-triangle intersection. Returns the hit distance `t > INTERSECT_EPS`,
/// or `None` for misses, parallel rays, and degenerate triangles.
pub fn moller_trumbore(
    origin: &Point3<f64>,
    dir: &Vector3<f64>,
    v0: &Point3<f64>,
    v1: &Point3<f64>,
    v2: &Point3<f64>,
) -> Option<f64> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = dir.cross(&edge2);
    let a = edge1.dot(&h);
    if a.abs() < INTERSECT_EPS {
        return None;
    }
    let f = 1.0 / a;
    let s = origin - v0;
    let u = f * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(&edge1);
    let v = f * dir.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = f * edge2.dot(&q);
    if t > INTERSECT_EPS {
        Some(t)
    } else {
        None
    }
}

/// Nearest surface intersection found by a snapshot query.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceHit {
    /// Distance along the ray
    pub t: f64,
    pub point: Point3<f64>,
    /// Geometric normal of the hit triangle (as stored, not re-oriented)
    pub normal: Vector3<f64>,
    /// Index into the snapshot's world-triangle list
    pub triangle: usize,
}

// ---------------------------------------------------------------------------
// BVH
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct Node {
    bounds: Aabb,
    /// Leaf: range into `indices`. Interior: `left`/`right` child node ids.
    left: u32,
    right: u32,
    start: u32,
    count: u32,
}

/// Median-split BVH over primitive indices.
#[derive(Clone, Debug)]
pub struct Bvh {
    nodes: Vec<Node>,
    indices: Vec<u32>,
}

const LEAF_SIZE: usize = 4;

impl Bvh {
    /// Build over per-primitive bounds. An empty input yields an empty
    /// hierarchy whose queries return no hits.
    pub fn build(bounds: &[Aabb]) -> Self {
        let mut indices: Vec<u32> = (0..bounds.len() as u32).collect();
        let mut nodes = Vec::new();
        if !indices.is_empty() {
            let n = indices.len();
            build_recursive(bounds, &mut indices, 0, n, &mut nodes);
        }
        Self { nodes, indices }
    }

    /// Bounds of the whole hierarchy (empty box when no primitives).
    pub fn root_bounds(&self) -> Aabb {
        self.nodes.first().map(|n| n.bounds).unwrap_or_else(Aabb::empty)
    }

    /// Find the nearest accepted primitive along a ray.
    ///
    /// `hit_test(primitive_index)` runs the exact primitive intersection and
    /// returns the hit distance if any; the traversal keeps the minimum and
    /// prunes boxes farther than the best hit.
    pub fn nearest<F>(&self, origin: &Point3<f64>, dir: &Vector3<f64>, mut hit_test: F) -> Option<(usize, f64)>
    where
        F: FnMut(usize) -> Option<f64>,
    {
        if self.nodes.is_empty() {
            return None;
        }
        let inv_dir = Vector3::new(1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z);
        let mut best: Option<(usize, f64)> = None;
        let mut best_t = f64::INFINITY;
        let mut stack: Vec<u32> = vec![0];

        while let Some(node_id) = stack.pop() {
            let node = &self.nodes[node_id as usize];
            let entry = match node.bounds.entry_distance(origin, &inv_dir, best_t) {
                Some(t) => t,
                None => continue,
            };
            if entry > best_t {
                continue;
            }
            if node.count > 0 {
                for k in node.start..node.start + node.count {
                    let prim = self.indices[k as usize] as usize;
                    if let Some(t) = hit_test(prim) {
                        if t < best_t {
                            best_t = t;
                            best = Some((prim, t));
                        }
                    }
                }
            } else {
                // Push the far child first so the near child is popped first.
                let l = node.left;
                let r = node.right;
                let lt = self.nodes[l as usize]
                    .bounds
                    .entry_distance(origin, &inv_dir, best_t);
                let rt = self.nodes[r as usize]
                    .bounds
                    .entry_distance(origin, &inv_dir, best_t);
                match (lt, rt) {
                    (Some(a), Some(b)) => {
                        if a <= b {
                            stack.push(r);
                            stack.push(l);
                        } else {
                            stack.push(l);
                            stack.push(r);
                        }
                    }
                    (Some(_), None) => stack.push(l),
                    (None, Some(_)) => stack.push(r),
                    (None, None) => {}
                }
            }
        }
        best
    }
}

fn build_recursive(
    bounds: &[Aabb],
    indices: &mut [u32],
    start: usize,
    count: usize,
    nodes: &mut Vec<Node>,
) -> u32 {
    let mut node_bounds = Aabb::empty();
    for &i in &indices[start..start + count] {
        node_bounds.union(&bounds[i as usize]);
    }

    let node_id = nodes.len() as u32;
    nodes.push(Node {
        bounds: node_bounds,
        left: 0,
        right: 0,
        start: start as u32,
        count: count as u32,
    });

    if count <= LEAF_SIZE {
        return node_id;
    }

    // Split at the centroid median along the longest axis.
    let extent = node_bounds.max - node_bounds.min;
    let axis = if extent.x >= extent.y && extent.x >= extent.z {
        0
    } else if extent.y >= extent.z {
        1
    } else {
        2
    };
    let slice = &mut indices[start..start + count];
    let mid = count / 2;
    slice.select_nth_unstable_by(mid, |&a, &b| {
        let ca = bounds[a as usize].centroid()[axis];
        let cb = bounds[b as usize].centroid()[axis];
        ca.partial_cmp(&cb).unwrap_or(std::cmp::Ordering::Equal)
    });

    let left = build_recursive(bounds, indices, start, mid, nodes);
    let right = build_recursive(bounds, indices, start + mid, count - mid, nodes);
    nodes[node_id as usize].left = left;
    nodes[node_id as usize].right = right;
    nodes[node_id as usize].count = 0;
    node_id
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    fn random_triangles(rng: &mut ChaCha8Rng, n: usize) -> Vec<[Point3<f64>; 3]> {
        (0..n)
            .map(|_| {
                let base = Point3::new(
                    (rng.gen::<f64>() - 0.5) * 100.0,
                    (rng.gen::<f64>() - 0.5) * 100.0,
                    (rng.gen::<f64>() - 0.5) * 100.0,
                );
                let e1 = Vector3::new(rng.gen::<f64>(), rng.gen::<f64>(), rng.gen::<f64>()) * 4.0;
                let e2 = Vector3::new(rng.gen::<f64>(), rng.gen::<f64>(), rng.gen::<f64>()) * 4.0;
                [base, base + e1, base + e2]
            })
            .collect()
    }

    #[test]
    fn moller_trumbore_basic_hit() {
        let t = moller_trumbore(
            &Point3::new(0.2, 0.2, -5.0),
            &Vector3::z(),
            &Point3::origin(),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
        );
        assert!(t.is_some(), "ray through the triangle interior must hit");
        assert!((t.unwrap() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn moller_trumbore_degenerate_triangle_misses() {
        let t = moller_trumbore(
            &Point3::new(0.5, 0.0, -5.0),
            &Vector3::z(),
            &Point3::origin(),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(2.0, 0.0, 0.0), // collinear: zero area
        );
        assert!(t.is_none(), "degenerate triangle must never hit");
    }

    #[test]
    fn bvh_matches_brute_force() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let tris = random_triangles(&mut rng, 200);
        let bounds: Vec<Aabb> = tris.iter().map(|t| Aabb::from_points(t)).collect();
        let bvh = Bvh::build(&bounds);

        for _ in 0..200 {
            let origin = Point3::new(
                (rng.gen::<f64>() - 0.5) * 150.0,
                (rng.gen::<f64>() - 0.5) * 150.0,
                (rng.gen::<f64>() - 0.5) * 150.0,
            );
            let dir = Vector3::new(
                rng.gen::<f64>() - 0.5,
                rng.gen::<f64>() - 0.5,
                rng.gen::<f64>() - 0.5,
            )
            .normalize();

            let brute = tris
                .iter()
                .enumerate()
                .filter_map(|(i, t)| {
                    moller_trumbore(&origin, &dir, &t[0], &t[1], &t[2]).map(|d| (i, d))
                })
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

            let fast = bvh.nearest(&origin, &dir, |i| {
                let t = &tris[i];
                moller_trumbore(&origin, &dir, &t[0], &t[1], &t[2])
            });

            match (brute, fast) {
                (None, None) => {}
                (Some((bi, bt)), Some((fi, ft))) => {
                    assert!((bt - ft).abs() < 1e-9, "hit distances diverge");
                    // Identical t with different indices can happen on shared edges
                    if bi != fi {
                        assert!((bt - ft).abs() < 1e-9);
                    }
                }
                (b, f) => panic!("BVH and brute force disagree: {:?} vs {:?}", b, f),
            }
        }
    }

    #[test]
    fn empty_bvh_returns_none() {
        let bvh = Bvh::build(&[]);
        assert!(bvh
            .nearest(&Point3::origin(), &Vector3::x(), |_| Some(1.0))
            .is_none());
    }
}
