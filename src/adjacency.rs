//! Mesh-topology adjacency: bounded-fan-in neighbor tables and their cache.
//!
//! Every triangle edge contributes an undirected adjacency. Vertices whose
//! squared distance is within the tolerance are coalesced into one adjacency
//! node, so duplicated vertices at UV seams still smooth across the seam.
//! Each row holds at most `max_fan_in` neighbors; excess neighbors are
//! silently dropped (counted, not an error) to bound memory and smoothing
//! cost. Dropping follows the stable order of first discovery.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::DeformError;
use crate::math::Vec3;
use crate::mesh::{DeformMesh, MeshId};

/// Sentinel padding a row whose vertex has fewer than `max_fan_in` neighbors.
pub const SENTINEL: i32 = -1;

const ADJACENCY_CACHE_MAGIC: u32 = 0x414d4444; // "DDMA"

/// Per-vertex neighbor table with a fixed row capacity.
///
/// Rows store coalesced (canonical) vertex indices, deduplicated, without
/// self loops, padded with [`SENTINEL`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjacencyTable {
    max_fan_in: usize,
    counts: Vec<u32>,
    rows: Vec<i32>,
    truncated: u32,
}

impl AdjacencyTable {
    /// Number of vertices (rows).
    pub fn vertex_count(&self) -> usize {
        self.counts.len()
    }

    /// Row capacity.
    pub fn max_fan_in(&self) -> usize {
        self.max_fan_in
    }

    /// Neighbors of vertex `v` (canonical indices, no sentinel).
    pub fn neighbors(&self, v: usize) -> &[i32] {
        let start = v * self.max_fan_in;
        &self.rows[start..start + self.counts[v] as usize]
    }

    /// Full sentinel-padded row of vertex `v`.
    pub fn row(&self, v: usize) -> &[i32] {
        let start = v * self.max_fan_in;
        &self.rows[start..start + self.max_fan_in]
    }

    /// Number of neighbors dropped because rows were full.
    pub fn truncated_count(&self) -> u32 {
        self.truncated
    }

    /// Serialize to an exact binary blob.
    ///
    /// The blob round-trips bit-for-bit: same row order, same sentinel
    /// convention as a freshly built table.
    pub fn to_bytes(&self) -> Vec<u8> {
        let header = [
            ADJACENCY_CACHE_MAGIC,
            self.counts.len() as u32,
            self.max_fan_in as u32,
            self.truncated,
        ];
        let mut out = Vec::with_capacity(16 + self.rows.len() * 4);
        out.extend_from_slice(bytemuck::cast_slice(&header));
        out.extend_from_slice(bytemuck::cast_slice(&self.rows));
        out
    }

    /// Deserialize a blob produced by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeformError> {
        if bytes.len() < 16 {
            return Err(DeformError::CorruptCache(
                "adjacency blob shorter than header".to_string(),
            ));
        }
        let mut header = [0u32; 4];
        bytemuck::cast_slice_mut(&mut header).copy_from_slice(&bytes[..16]);
        let [magic, vertex_count, max_fan_in, truncated] = header;
        if magic != ADJACENCY_CACHE_MAGIC {
            return Err(DeformError::CorruptCache(
                "adjacency blob has wrong magic".to_string(),
            ));
        }
        let expected = 16 + vertex_count as usize * max_fan_in as usize * 4;
        if bytes.len() != expected {
            return Err(DeformError::CorruptCache(format!(
                "adjacency blob length {} does not match header (expected {expected})",
                bytes.len()
            )));
        }
        let mut rows = vec![0i32; vertex_count as usize * max_fan_in as usize];
        bytemuck::cast_slice_mut(&mut rows).copy_from_slice(&bytes[16..]);

        let max_fan_in = max_fan_in as usize;
        let counts = (0..vertex_count as usize)
            .map(|v| {
                let row = &rows[v * max_fan_in..(v + 1) * max_fan_in];
                row.iter().take_while(|&&n| n != SENTINEL).count() as u32
            })
            .collect();
        Ok(Self {
            max_fan_in,
            counts,
            rows,
            truncated,
        })
    }
}

/// Map every vertex to its canonical index: the first vertex within
/// `tolerance_squared` of it, in index order.
fn canonical_indices(positions: &[Vec3], tolerance_squared: f32) -> Vec<u32> {
    if tolerance_squared == 0.0 {
        // Exact duplicates only; bit-pattern buckets avoid the quadratic scan.
        let mut first_seen: HashMap<[u32; 3], u32> = HashMap::with_capacity(positions.len());
        return positions
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let key = [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()];
                *first_seen.entry(key).or_insert(i as u32)
            })
            .collect();
    }

    let mut canonical = vec![0u32; positions.len()];
    for i in 0..positions.len() {
        let mut c = i as u32;
        for j in 0..i {
            // Only canonical vertices can absorb later duplicates, keeping
            // the mapping idempotent.
            if canonical[j] == j as u32
                && (positions[i] - positions[j]).norm_squared() <= tolerance_squared
            {
                c = j as u32;
                break;
            }
        }
        canonical[i] = c;
    }
    canonical
}

/// Build the adjacency table for a triangle mesh.
///
/// `tolerance_squared` is the squared coalescing distance; `max_fan_in`
/// bounds the neighbors kept per vertex.
pub fn build_adjacency(
    positions: &[Vec3],
    triangles: &[[u32; 3]],
    max_fan_in: usize,
    tolerance_squared: f32,
) -> AdjacencyTable {
    let vertex_count = positions.len();
    let canonical = canonical_indices(positions, tolerance_squared);

    // Neighbor sets on canonical nodes, in first-discovery order. Dropped
    // neighbors are counted once per distinct edge, not per triangle that
    // repeats it.
    let mut node_neighbors: Vec<Vec<i32>> = vec![Vec::new(); vertex_count];
    let mut dropped: HashSet<(u32, u32)> = HashSet::new();
    let mut push = |node_neighbors: &mut Vec<Vec<i32>>, from: u32, to: u32| {
        if from == to {
            return;
        }
        let row = &mut node_neighbors[from as usize];
        if row.contains(&(to as i32)) {
            return;
        }
        if row.len() == max_fan_in {
            dropped.insert((from, to));
            return;
        }
        row.push(to as i32);
    };
    for tri in triangles {
        for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            let (ca, cb) = (canonical[a as usize], canonical[b as usize]);
            push(&mut node_neighbors, ca, cb);
            push(&mut node_neighbors, cb, ca);
        }
    }

    let mut rows = vec![SENTINEL; vertex_count * max_fan_in];
    let mut counts = vec![0u32; vertex_count];
    for v in 0..vertex_count {
        let neighbors = &node_neighbors[canonical[v] as usize];
        counts[v] = neighbors.len() as u32;
        rows[v * max_fan_in..v * max_fan_in + neighbors.len()].copy_from_slice(neighbors);
    }

    let truncated = dropped.len() as u32;
    if truncated > 0 {
        log::warn!(
            "adjacency build dropped {truncated} neighbors past fan-in {max_fan_in}"
        );
    }

    AdjacencyTable {
        max_fan_in,
        counts,
        rows,
        truncated,
    }
}

/// Explicit cache of adjacency tables.
///
/// Keyed by (mesh identity, tolerance bit pattern, fan-in), so the same mesh
/// bound with different parameters never shares an entry. Owned by whichever
/// component binds meshes; there is no ambient global cache.
#[derive(Debug, Default)]
pub struct AdjacencyCache {
    entries: Mutex<HashMap<(MeshId, u32, usize), Arc<AdjacencyTable>>>,
}

impl AdjacencyCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the table for `mesh`, building and inserting it on a miss.
    pub fn get_or_build(
        &self,
        mesh: &DeformMesh,
        max_fan_in: usize,
        tolerance: f32,
    ) -> Arc<AdjacencyTable> {
        let key = (mesh.id(), tolerance.to_bits(), max_fan_in);
        if let Some(table) = self.entries.lock().get(&key) {
            return table.clone();
        }
        log::debug!(
            "adjacency cache miss for mesh {:?} (tolerance {tolerance}, fan-in {max_fan_in})",
            mesh.id()
        );
        let table = Arc::new(build_adjacency(
            mesh.positions(),
            mesh.triangles(),
            max_fan_in,
            tolerance * tolerance,
        ));
        self.entries.lock().insert(key, table.clone());
        table
    }

    /// Drop all entries for a mesh (any tolerance or fan-in).
    pub fn invalidate(&self, mesh_id: MeshId) {
        self.entries.lock().retain(|(id, _, _), _| *id != mesh_id);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of cached tables.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
