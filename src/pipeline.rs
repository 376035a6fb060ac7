//! Binding lifecycle: validate settings, precompute, deform every frame.
//!
//! A [`DeformPipeline`] owns one (mesh, skin, settings) binding. Binding
//! runs the precompute chain — adjacency (through the caller's cache),
//! Laplacian, omegas — and uploads to the chosen backend. `update` combines
//! current bone world matrices and runs one deformation pass; if the
//! backend refuses the frame, the always-bound CPU fallback produces it
//! instead, so callers never see partial results.

use std::sync::Arc;

use crate::adjacency::AdjacencyCache;
use crate::backend::{CpuBackend, DeformationBackend};
use crate::deform::DeformedMesh;
use crate::error::DeformError;
use crate::laplacian::build_laplacian;
use crate::math::Mat4;
use crate::mesh::DeformMesh;
use crate::omega::{precompute_omegas, OmegaStore};
use crate::skin::SkinBinding;

/// Smoothing and capacity parameters for one binding.
///
/// Defaults match the tuning the technique ships with: 30 iterations,
/// lambda 0.9, seam-matching tolerance 1e-4, fan-in 32.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeformSettings {
    /// Number of Laplacian smoothing passes over the omega accumulators.
    pub iterations: u32,
    /// Smoothing blend factor in `[0, 1]`; closer to 1 smooths harder.
    pub lambda: f32,
    /// Vertices closer than this are coalesced as one adjacency node.
    pub adjacency_tolerance: f32,
    /// Bound on distinct neighbor/bone contributions per vertex.
    pub max_fan_in: usize,
}

impl Default for DeformSettings {
    fn default() -> Self {
        Self {
            iterations: 30,
            lambda: 0.9,
            adjacency_tolerance: 1e-4,
            max_fan_in: 32,
        }
    }
}

impl DeformSettings {
    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<(), DeformError> {
        if !(0.0..=1.0).contains(&self.lambda) {
            return Err(DeformError::InvalidParameter(format!(
                "lambda {} outside [0, 1]",
                self.lambda
            )));
        }
        if !self.adjacency_tolerance.is_finite() || self.adjacency_tolerance < 0.0 {
            return Err(DeformError::InvalidParameter(format!(
                "adjacency tolerance {} must be finite and non-negative",
                self.adjacency_tolerance
            )));
        }
        if self.max_fan_in == 0 {
            return Err(DeformError::InvalidParameter(
                "max_fan_in must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Truncation diagnostics from the precompute stages, for tuning fan-in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeformStats {
    /// Neighbors dropped while building the adjacency table.
    pub adjacency_truncated: u32,
    /// Accumulators dropped while compacting the omega store.
    pub omega_truncated: u32,
}

/// One bound deformation pipeline.
pub struct DeformPipeline {
    mesh: DeformMesh,
    skin: SkinBinding,
    settings: DeformSettings,
    omegas: Arc<OmegaStore>,
    backend: Box<dyn DeformationBackend>,
    fallback: CpuBackend,
    output: DeformedMesh,
    bone_transforms: Vec<Mat4>,
    stats: DeformStats,
}

impl DeformPipeline {
    /// Bind a mesh and skin with the CPU backend.
    pub fn bind(
        mesh: DeformMesh,
        skin: SkinBinding,
        settings: DeformSettings,
        cache: &AdjacencyCache,
    ) -> Result<Self, DeformError> {
        Self::bind_with_backend(mesh, skin, settings, cache, Box::new(CpuBackend::new()))
    }

    /// Bind a mesh and skin with an explicit backend.
    ///
    /// Fails on invalid settings, mismatched vertex counts, or a backend
    /// that refuses the upload — all configuration errors, reported here
    /// rather than surfacing at frame time.
    pub fn bind_with_backend(
        mesh: DeformMesh,
        skin: SkinBinding,
        settings: DeformSettings,
        cache: &AdjacencyCache,
        mut backend: Box<dyn DeformationBackend>,
    ) -> Result<Self, DeformError> {
        settings.validate()?;
        if skin.vertex_count() != mesh.vertex_count() {
            return Err(DeformError::VertexCountMismatch {
                expected: mesh.vertex_count(),
                actual: skin.vertex_count(),
            });
        }

        let (omegas, stats) = Self::precompute(&mesh, &skin, &settings, cache);
        backend.bind(&mesh, omegas.clone())?;
        let mut fallback = CpuBackend::new();
        fallback.bind(&mesh, omegas.clone())?;

        let vertex_count = mesh.vertex_count();
        Ok(Self {
            mesh,
            skin,
            settings,
            omegas,
            backend,
            fallback,
            output: DeformedMesh::new(vertex_count),
            bone_transforms: Vec::new(),
            stats,
        })
    }

    fn precompute(
        mesh: &DeformMesh,
        skin: &SkinBinding,
        settings: &DeformSettings,
        cache: &AdjacencyCache,
    ) -> (Arc<OmegaStore>, DeformStats) {
        let adjacency = cache.get_or_build(mesh, settings.max_fan_in, settings.adjacency_tolerance);
        let laplacian = build_laplacian(&adjacency);
        let omegas = Arc::new(precompute_omegas(
            &laplacian,
            skin,
            mesh.positions(),
            settings.iterations,
            settings.lambda,
            settings.max_fan_in,
        ));
        let stats = DeformStats {
            adjacency_truncated: adjacency.truncated_count(),
            omega_truncated: omegas.truncated_count(),
        };
        (omegas, stats)
    }

    /// Run one deformation pass from current bone world matrices.
    ///
    /// The per-bone transforms (`world * inverse_bind`) are fully written
    /// before the pass starts and read-only during it. A backend that
    /// refuses the frame is replaced by the CPU fallback for this frame
    /// only.
    pub fn update(&mut self, bone_world: &[Mat4]) -> Result<&DeformedMesh, DeformError> {
        self.skin
            .bone_transforms_into(bone_world, &mut self.bone_transforms)?;
        if let Err(err) = self.backend.deform(&self.bone_transforms, &mut self.output) {
            log::warn!(
                "{} backend refused frame ({err}), falling back to cpu",
                self.backend.name()
            );
            self.fallback
                .deform(&self.bone_transforms, &mut self.output)?;
        }
        Ok(&self.output)
    }

    /// Re-run precomputation with new settings, keeping mesh and skin.
    pub fn set_settings(
        &mut self,
        settings: DeformSettings,
        cache: &AdjacencyCache,
    ) -> Result<(), DeformError> {
        settings.validate()?;
        let (omegas, stats) = Self::precompute(&self.mesh, &self.skin, &settings, cache);
        self.backend.bind(&self.mesh, omegas.clone())?;
        self.fallback.bind(&self.mesh, omegas.clone())?;
        self.settings = settings;
        self.omegas = omegas;
        self.stats = stats;
        Ok(())
    }

    /// The bound mesh.
    pub fn mesh(&self) -> &DeformMesh {
        &self.mesh
    }

    /// The bound skin.
    pub fn skin(&self) -> &SkinBinding {
        &self.skin
    }

    /// Current settings.
    pub fn settings(&self) -> DeformSettings {
        self.settings
    }

    /// The precomputed omega store.
    pub fn omegas(&self) -> &Arc<OmegaStore> {
        &self.omegas
    }

    /// Most recent deformation output.
    pub fn output(&self) -> &DeformedMesh {
        &self.output
    }

    /// Truncation diagnostics from the last precompute.
    pub fn stats(&self) -> DeformStats {
        self.stats
    }
}
