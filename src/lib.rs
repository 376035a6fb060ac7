//! # Direct Delta Mush
//!
//! Skeletal mesh deformation without the classic linear-blend artifacts
//! (candy-wrapper twisting, joint collapse). Per-bone vertex-transform
//! contributions are smoothed across mesh topology before blending, and the
//! closest rigid transform per vertex is extracted via singular value
//! decomposition.
//!
//! The pipeline runs strictly forward:
//!
//! - [`adjacency`] — bounded-fan-in neighbor tables from triangle topology,
//!   with seam-tolerant vertex coalescing and an explicit cache
//! - [`laplacian`] — uniform degree-normalized smoothing operator
//! - [`omega`] — per-(vertex, bone) symmetric accumulators, iteratively
//!   smoothed once per binding
//! - [`deform`] — per-frame rigid-transform extraction and application
//! - [`backend`] — where the per-frame pass runs (CPU, or a data-parallel
//!   device honoring the same buffer contracts)
//! - [`pipeline`] — binding lifecycle tying the stages together

pub mod adjacency;
pub mod backend;
pub mod deform;
pub mod error;
pub mod laplacian;
pub mod math;
pub mod mesh;
pub mod omega;
pub mod pipeline;
pub mod skin;

pub use adjacency::{AdjacencyCache, AdjacencyTable};
pub use backend::{CpuBackend, DeformationBackend};
pub use deform::DeformedMesh;
pub use error::DeformError;
pub use mesh::{DeformMesh, MeshId};
pub use omega::{OmegaEntry, OmegaStore};
pub use pipeline::{DeformPipeline, DeformSettings, DeformStats};
pub use skin::{SkinBinding, VertexInfluences};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
