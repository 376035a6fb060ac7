//! Deformation backend abstraction and device buffer contracts.
//!
//! There is exactly one description of the per-frame math ([`crate::deform`]);
//! backends differ only in where it runs. [`CpuBackend`] executes it in
//! process. A data-parallel device backend must consume the packed records
//! defined here and produce, for identical inputs, the identical algorithm's
//! output within floating-point tolerance.
//!
//! # Buffer contracts
//!
//! Per vertex: bind position (3 floats), bind normal (3 floats), one
//! [`VertexInfluences`](crate::skin::VertexInfluences) record (4 floats +
//! 4 ints), and `max_fan_in` [`OmegaEntry`](crate::omega::OmegaEntry)
//! records (int + 10 floats, sentinel-terminated). Per bone: one 4x4
//! transform (16 floats, column-major). Precompute additionally consumes
//! `max_fan_in` [`LaplacianEntry`](crate::laplacian::LaplacianEntry) records
//! (int + float) per vertex. Output: one [`PackedOutputVertex`] per vertex.

mod cpu;

pub use cpu::CpuBackend;

use std::sync::Arc;

use crate::error::DeformError;
use crate::deform::DeformedMesh;
use crate::math::Mat4;
use crate::mesh::DeformMesh;
use crate::omega::OmegaStore;

/// Deformed position and normal, as a device writes them back.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedOutputVertex {
    /// Deformed position.
    pub position: [f32; 3],
    /// Deformed normal.
    pub normal: [f32; 3],
}

static_assertions::const_assert_eq!(std::mem::size_of::<PackedOutputVertex>(), 24);

/// Where the per-frame deformation pass executes.
///
/// `bind` uploads the per-mesh data once; `deform` runs every frame against
/// a bone transform array that is fully written before the call. A backend
/// that cannot produce the frame returns an error and writes nothing — the
/// caller falls back to the CPU path with no partial results mixed in.
pub trait DeformationBackend: Send {
    /// Short backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// Upload bind-pose data and the omega store for one mesh binding.
    fn bind(&mut self, mesh: &DeformMesh, omegas: Arc<OmegaStore>) -> Result<(), DeformError>;

    /// Run one deformation pass into `output`.
    fn deform(
        &mut self,
        bone_transforms: &[Mat4],
        output: &mut DeformedMesh,
    ) -> Result<(), DeformError>;
}
