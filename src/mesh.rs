//! Bind-pose mesh topology.
//!
//! A [`DeformMesh`] holds the inputs the precompute stages read: bind-pose
//! positions and normals plus the triangle list. It is immutable once built
//! and carries a process-unique [`MeshId`] used as the adjacency cache key.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::DeformError;
use crate::math::Vec3;

/// Process-unique identity of a bind-pose mesh.
///
/// Two meshes with identical contents still get distinct ids; identity, not
/// equality, is what keys the adjacency cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(u64);

impl MeshId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// An immutable bind-pose triangle mesh.
#[derive(Debug, Clone)]
pub struct DeformMesh {
    id: MeshId,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
}

impl DeformMesh {
    /// Create a mesh from bind-pose positions, normals, and triangles.
    ///
    /// Fails if the normal count differs from the position count or any
    /// triangle index is out of range.
    pub fn new(
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        triangles: Vec<[u32; 3]>,
    ) -> Result<Self, DeformError> {
        if normals.len() != positions.len() {
            return Err(DeformError::VertexCountMismatch {
                expected: positions.len(),
                actual: normals.len(),
            });
        }
        let vertex_count = positions.len() as u32;
        for (ti, tri) in triangles.iter().enumerate() {
            if tri.iter().any(|&i| i >= vertex_count) {
                return Err(DeformError::InvalidParameter(format!(
                    "triangle {ti} references a vertex out of range (vertex count {vertex_count})"
                )));
            }
        }
        Ok(Self {
            id: MeshId::next(),
            positions,
            normals,
            triangles,
        })
    }

    /// The process-unique mesh identity.
    pub fn id(&self) -> MeshId {
        self.id
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Bind-pose vertex positions.
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Bind-pose vertex normals.
    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// Triangle index triples.
    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }
}
