//! In-process deformation backend.

use std::sync::Arc;

use crate::deform::{self, DeformedMesh};
use crate::error::DeformError;
use crate::math::{Mat4, Vec3};
use crate::mesh::DeformMesh;
use crate::omega::OmegaStore;

use super::DeformationBackend;

/// Runs the deformation pass on the CPU.
///
/// Also the fallback every pipeline keeps bound, so a refused device frame
/// still produces output.
#[derive(Debug, Default)]
pub struct CpuBackend {
    bind_positions: Vec<Vec3>,
    bind_normals: Vec<Vec3>,
    omegas: Option<Arc<OmegaStore>>,
    required_bones: usize,
}

impl CpuBackend {
    /// Create an unbound CPU backend.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeformationBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn bind(&mut self, mesh: &DeformMesh, omegas: Arc<OmegaStore>) -> Result<(), DeformError> {
        self.bind_positions = mesh.positions().to_vec();
        self.bind_normals = mesh.normals().to_vec();
        self.required_bones = omegas.max_bone_index().map_or(0, |b| b + 1);
        self.omegas = Some(omegas);
        Ok(())
    }

    fn deform(
        &mut self,
        bone_transforms: &[Mat4],
        output: &mut DeformedMesh,
    ) -> Result<(), DeformError> {
        let Some(omegas) = &self.omegas else {
            return Err(DeformError::BackendUnavailable(
                "cpu backend has no mesh bound".to_string(),
            ));
        };
        // Stores that arrive through deserialization can reference bones
        // the caller never supplied; refuse instead of indexing past the
        // transform array.
        if bone_transforms.len() < self.required_bones {
            return Err(DeformError::BoneCountMismatch {
                expected: self.required_bones,
                actual: bone_transforms.len(),
            });
        }
        deform::deform(
            omegas,
            bone_transforms,
            &self.bind_positions,
            &self.bind_normals,
            output,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjacency::build_adjacency;
    use crate::laplacian::build_laplacian;
    use crate::omega::precompute_omegas;
    use crate::skin::{SkinBinding, VertexInfluences};

    #[test]
    fn unbound_backend_refuses_to_deform() {
        let mut backend = CpuBackend::new();
        let mut output = DeformedMesh::new(0);
        let err = backend.deform(&[], &mut output);
        assert!(matches!(err, Err(DeformError::BackendUnavailable(_))));
    }

    #[test]
    fn deform_refuses_short_bone_transform_array() {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let mesh = DeformMesh::new(
            positions.clone(),
            vec![Vec3::z(); 3],
            vec![[0, 1, 2]],
        )
        .unwrap();
        let skin = SkinBinding::new(
            vec![VertexInfluences::single(1); 3],
            vec![Mat4::identity(); 2],
        )
        .unwrap();
        let laplacian = build_laplacian(&build_adjacency(&positions, mesh.triangles(), 8, 0.0));
        let store = precompute_omegas(&laplacian, &skin, &positions, 0, 0.9, 8);
        // Round-trip through bytes: the binding that proved bone 1 valid is
        // gone, only the blob's own contents remain.
        let restored = OmegaStore::from_bytes(&store.to_bytes()).unwrap();

        let mut backend = CpuBackend::new();
        backend.bind(&mesh, Arc::new(restored)).unwrap();
        let mut output = DeformedMesh::new(3);
        let err = backend.deform(&[Mat4::identity()], &mut output);
        assert!(matches!(
            err,
            Err(DeformError::BoneCountMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }
}
