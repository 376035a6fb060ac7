//! Uniform graph-Laplacian smoothing operator.
//!
//! Converts an adjacency table into per-vertex (neighbor index, weight)
//! rows with weight `1 / neighbor_count` — a uniform, non-cotangent
//! operator. The vertex's own `(1 - lambda)` share is applied during
//! smoothing, not stored here.

use crate::adjacency::{AdjacencyTable, SENTINEL};

/// One smoothing contribution: neighbor index plus its uniform weight.
///
/// Also the exact record layout a data-parallel device consumes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LaplacianEntry {
    /// Canonical neighbor index, or the adjacency sentinel for padding.
    pub index: i32,
    /// Uniform weight, `1 / neighbor_count` of the owning vertex.
    pub weight: f32,
}

static_assertions::const_assert_eq!(std::mem::size_of::<LaplacianEntry>(), 8);

/// Per-vertex smoothing rows with the same fan-in bound as the adjacency.
#[derive(Debug, Clone, PartialEq)]
pub struct LaplacianTable {
    max_fan_in: usize,
    counts: Vec<u32>,
    entries: Vec<LaplacianEntry>,
}

impl LaplacianTable {
    /// Number of vertices (rows).
    pub fn vertex_count(&self) -> usize {
        self.counts.len()
    }

    /// Row capacity.
    pub fn max_fan_in(&self) -> usize {
        self.max_fan_in
    }

    /// Smoothing contributions for vertex `v` (no padding entries).
    pub fn row(&self, v: usize) -> &[LaplacianEntry] {
        let start = v * self.max_fan_in;
        &self.entries[start..start + self.counts[v] as usize]
    }

    /// Full sentinel-padded row of vertex `v`.
    pub fn padded_row(&self, v: usize) -> &[LaplacianEntry] {
        let start = v * self.max_fan_in;
        &self.entries[start..start + self.max_fan_in]
    }
}

/// Build the uniform Laplacian operator from an adjacency table.
pub fn build_laplacian(adjacency: &AdjacencyTable) -> LaplacianTable {
    let max_fan_in = adjacency.max_fan_in();
    let vertex_count = adjacency.vertex_count();
    let mut entries = vec![
        LaplacianEntry {
            index: SENTINEL,
            weight: 0.0,
        };
        vertex_count * max_fan_in
    ];
    let mut counts = vec![0u32; vertex_count];

    for v in 0..vertex_count {
        let neighbors = adjacency.neighbors(v);
        if neighbors.is_empty() {
            continue;
        }
        let weight = 1.0 / neighbors.len() as f32;
        let row = &mut entries[v * max_fan_in..v * max_fan_in + neighbors.len()];
        for (slot, &index) in row.iter_mut().zip(neighbors.iter()) {
            *slot = LaplacianEntry { index, weight };
        }
        counts[v] = neighbors.len() as u32;
    }

    LaplacianTable {
        max_fan_in,
        counts,
        entries,
    }
}
