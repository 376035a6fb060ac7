//! Per-frame deformation: accumulate bone-weighted omegas, extract the
//! closest rigid transform per vertex, apply it to position and normal.
//!
//! Every vertex is independent: it reads its own omega entries and the
//! shared, read-only bone transform array, so the pass can be partitioned
//! arbitrarily. Numeric degeneracy is never an error: degenerate vertices
//! fall back to an identity rotation with the accumulator's translation,
//! which follows the blended bone motion rather than exploding geometry.

use crate::math::{Mat3, Mat4, Vec3};
use crate::omega::{OmegaEntry, OmegaStore};
use crate::skin::VertexInfluences;

/// Per-frame output buffers, overwritten in place every pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DeformedMesh {
    /// Deformed vertex positions.
    pub positions: Vec<Vec3>,
    /// Deformed vertex normals (rotated, never translated or scaled).
    pub normals: Vec<Vec3>,
}

impl DeformedMesh {
    /// Allocate zeroed buffers for `vertex_count` vertices.
    pub fn new(vertex_count: usize) -> Self {
        Self {
            positions: vec![Vec3::zeros(); vertex_count],
            normals: vec![Vec3::zeros(); vertex_count],
        }
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// Extract the closest rigid transform from an accumulated 4x4 matrix.
///
/// The upper-left 3x3 block `Q`, translation column `q`, and homogeneous
/// row `p` combine into `M = Q - q pᵀ`; the rotation is `U Vᵀ` from the SVD
/// of `M`, reflection-corrected by negating the column of `U` paired with
/// the smallest singular value whenever `det < 0`. The correction is
/// mandatory: near-degenerate accumulators (single dominant bone on
/// near-planar geometry) otherwise yield improper rotations. Translation is
/// `q - R p`.
///
/// A zero or non-converging `M` falls back to the identity rotation with
/// the same `t = q - R p` translation. An unsmoothed rank-1 accumulator
/// lands exactly on the blended bone transform's image of the seed point
/// this way, and a vertex with no influence at all (`q = p = 0`) keeps its
/// bind pose.
pub fn extract_rigid(m4: &Mat4) -> (Mat3, Vec3) {
    let q = Vec3::new(m4[(0, 3)], m4[(1, 3)], m4[(2, 3)]);
    let p = Vec3::new(m4[(3, 0)], m4[(3, 1)], m4[(3, 2)]);
    let m = m4.fixed_view::<3, 3>(0, 0).into_owned() - q * p.transpose();

    if m == Mat3::zeros() {
        return (Mat3::identity(), q - p);
    }
    let Some(svd) = m.try_svd(true, true, 1.0e-7, 200) else {
        return (Mat3::identity(), q - p);
    };
    let (Some(mut u), Some(v_t)) = (svd.u, svd.v_t) else {
        return (Mat3::identity(), q - p);
    };

    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        // Singular values are sorted descending; flip the column paired
        // with the smallest one to land on a proper rotation.
        let flipped = -u.column(2);
        u.set_column(2, &flipped);
        r = u * v_t;
    }
    let t = q - r * p;
    (r, t)
}

/// Deform a single vertex from its omega entries.
///
/// Accumulates `bone_transform * omega` over the entries (identity if there
/// are none), extracts the rigid transform, and applies it.
///
/// Every entry's bone index must be in range for `bone_transforms`; stores
/// from the precompute path satisfy this against their own skin binding,
/// and [`CpuBackend`](crate::backend::CpuBackend) enforces it for stores
/// that arrive through deserialization.
pub fn deform_vertex(
    entries: &[OmegaEntry],
    bone_transforms: &[Mat4],
    bind_position: Vec3,
    bind_normal: Vec3,
) -> (Vec3, Vec3) {
    let m4 = if entries.is_empty() {
        Mat4::identity()
    } else {
        let mut acc = Mat4::zeros();
        for entry in entries {
            debug_assert!((entry.bone as usize) < bone_transforms.len());
            acc += bone_transforms[entry.bone as usize] * entry.matrix();
        }
        acc
    };
    let (r, t) = extract_rigid(&m4);
    (r * bind_position + t, r * bind_normal)
}

/// Deform every vertex into `out`.
///
/// `bone_transforms` must be fully written before the call and is read-only
/// for its duration.
pub fn deform(
    omegas: &OmegaStore,
    bone_transforms: &[Mat4],
    bind_positions: &[Vec3],
    bind_normals: &[Vec3],
    out: &mut DeformedMesh,
) {
    debug_assert_eq!(omegas.vertex_count(), bind_positions.len());
    debug_assert_eq!(bind_positions.len(), bind_normals.len());
    debug_assert_eq!(out.vertex_count(), bind_positions.len());

    for v in 0..bind_positions.len() {
        let (position, normal) = deform_vertex(
            omegas.entries(v),
            bone_transforms,
            bind_positions[v],
            bind_normals[v],
        );
        out.positions[v] = position;
        out.normals[v] = normal;
    }
}

/// Classic linear-blend skinning over the same inputs.
///
/// Reference path for debugging and tests: with zero smoothing iterations
/// the delta-mush output matches this exactly, and diffing the two under a
/// smoothed binding shows what the mush is doing.
pub fn linear_blend(
    influences: &[VertexInfluences],
    bone_transforms: &[Mat4],
    bind_positions: &[Vec3],
    bind_normals: &[Vec3],
    out: &mut DeformedMesh,
) {
    debug_assert_eq!(influences.len(), bind_positions.len());
    debug_assert_eq!(out.vertex_count(), bind_positions.len());

    for v in 0..bind_positions.len() {
        let mut position = Vec3::zeros();
        let mut normal = Vec3::zeros();
        let mut total = 0.0f32;
        for (bone, weight) in influences[v].active() {
            let m = &bone_transforms[bone];
            position += weight * crate::math::transform_point(m, bind_positions[v]);
            normal += weight * crate::math::transform_vector(m, bind_normals[v]);
            total += weight;
        }
        if total == 0.0 {
            out.positions[v] = bind_positions[v];
            out.normals[v] = bind_normals[v];
        } else {
            out.positions[v] = position;
            out.normals[v] = normal.try_normalize(0.0).unwrap_or(bind_normals[v]);
        }
    }
}
