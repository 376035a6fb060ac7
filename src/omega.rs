//! Omega precomputation: Laplacian-smoothed per-(vertex, bone) accumulators.
//!
//! Each accumulator is a symmetric 4x4 matrix seeded as
//! `weight * outer([x, y, z, 1], [x, y, z, 1])` from the vertex's bind-pose
//! position, then smoothed across mesh topology with an explicit
//! Jacobi-style pass: `lambda * (uniform neighbor average) +
//! (1 - lambda) * previous`, double-buffered so one iteration never reads
//! its own writes. A neighbor with no accumulator for a bone contributes
//! zero, which is how influence spreads across the surface.
//!
//! Traversal order is fixed — vertices ascending, per-vertex entries kept
//! sorted ascending by bone index at every step — so identical inputs
//! produce bit-identical stores.

use std::collections::BTreeMap;

use crate::error::DeformError;
use crate::laplacian::LaplacianTable;
use crate::math::{Mat4, Vec3};
use crate::skin::SkinBinding;

/// Bone index marking an unused omega slot.
pub const SENTINEL_BONE: i32 = -1;

/// Accumulators whose homogeneous weight falls below this after smoothing
/// are dropped at compaction.
pub const OMEGA_WEIGHT_EPSILON: f32 = 1e-6;

const OMEGA_CACHE_MAGIC: u32 = 0x4f4d4444; // "DDMO"

/// Ten independent coefficients of a symmetric 4x4 matrix, row-major upper
/// triangle: `m00 m01 m02 m03 m11 m12 m13 m22 m23 m33`.
pub type SymMat4 = [f32; 10];

/// One (bone, symmetric accumulator) pair.
///
/// Also the exact record layout a data-parallel device consumes: a signed
/// bone index followed by the ten symmetric-matrix floats.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct OmegaEntry {
    /// Bone index, or [`SENTINEL_BONE`] for an unused slot.
    pub bone: i32,
    /// Symmetric accumulator coefficients.
    pub sym: SymMat4,
}

static_assertions::const_assert_eq!(std::mem::size_of::<OmegaEntry>(), 44);

impl OmegaEntry {
    /// The sentinel entry padding unused slots.
    pub const SENTINEL: Self = Self {
        bone: SENTINEL_BONE,
        sym: [0.0; 10],
    };

    /// Expand the symmetric coefficients into a full 4x4 matrix.
    pub fn matrix(&self) -> Mat4 {
        let s = &self.sym;
        #[rustfmt::skip]
        let m = Mat4::new(
            s[0], s[1], s[2], s[3],
            s[1], s[4], s[5], s[6],
            s[2], s[5], s[7], s[8],
            s[3], s[6], s[8], s[9],
        );
        m
    }
}

/// Bounded, sorted, per-vertex omega lists.
///
/// Each vertex owns at most `max_fan_in` entries, sorted ascending by bone
/// index, with an explicit valid count; the sentinel convention only
/// appears in the padded storage handed to devices and serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct OmegaStore {
    max_fan_in: usize,
    counts: Vec<u32>,
    entries: Vec<OmegaEntry>,
    truncated: u32,
}

impl OmegaStore {
    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.counts.len()
    }

    /// Per-vertex entry capacity.
    pub fn max_fan_in(&self) -> usize {
        self.max_fan_in
    }

    /// Valid entries for vertex `v`, sorted ascending by bone index.
    pub fn entries(&self, v: usize) -> &[OmegaEntry] {
        let start = v * self.max_fan_in;
        &self.entries[start..start + self.counts[v] as usize]
    }

    /// Full sentinel-padded row of vertex `v`, as a device consumes it.
    pub fn padded_row(&self, v: usize) -> &[OmegaEntry] {
        let start = v * self.max_fan_in;
        &self.entries[start..start + self.max_fan_in]
    }

    /// Number of accumulators dropped because vertices were over capacity.
    pub fn truncated_count(&self) -> u32 {
        self.truncated
    }

    /// Highest bone index referenced by any entry, if there are any.
    ///
    /// Rows are sorted ascending, so only the last valid entry per vertex
    /// is inspected.
    pub fn max_bone_index(&self) -> Option<usize> {
        (0..self.counts.len())
            .filter_map(|v| self.entries(v).last())
            .map(|entry| entry.bone as usize)
            .max()
    }

    /// Serialize to an exact binary blob.
    ///
    /// Round-trips bit-for-bit: same bone ordering, same sentinel
    /// convention as a freshly computed store.
    pub fn to_bytes(&self) -> Vec<u8> {
        let header = [
            OMEGA_CACHE_MAGIC,
            self.counts.len() as u32,
            self.max_fan_in as u32,
            self.truncated,
        ];
        let mut out = Vec::with_capacity(16 + self.entries.len() * std::mem::size_of::<OmegaEntry>());
        out.extend_from_slice(bytemuck::cast_slice(&header));
        out.extend_from_slice(bytemuck::cast_slice(&self.entries));
        out
    }

    /// Deserialize a blob produced by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeformError> {
        if bytes.len() < 16 {
            return Err(DeformError::CorruptCache(
                "omega blob shorter than header".to_string(),
            ));
        }
        let mut header = [0u32; 4];
        bytemuck::cast_slice_mut(&mut header).copy_from_slice(&bytes[..16]);
        let [magic, vertex_count, max_fan_in, truncated] = header;
        if magic != OMEGA_CACHE_MAGIC {
            return Err(DeformError::CorruptCache(
                "omega blob has wrong magic".to_string(),
            ));
        }
        let entry_count = vertex_count as usize * max_fan_in as usize;
        let expected = 16 + entry_count * std::mem::size_of::<OmegaEntry>();
        if bytes.len() != expected {
            return Err(DeformError::CorruptCache(format!(
                "omega blob length {} does not match header (expected {expected})",
                bytes.len()
            )));
        }
        let mut entries = vec![OmegaEntry::SENTINEL; entry_count];
        bytemuck::cast_slice_mut(&mut entries).copy_from_slice(&bytes[16..]);

        let max_fan_in = max_fan_in as usize;
        let mut counts = Vec::with_capacity(vertex_count as usize);
        for v in 0..vertex_count as usize {
            let row = &entries[v * max_fan_in..(v + 1) * max_fan_in];
            let count = row.iter().take_while(|e| e.bone >= 0).count();
            if row[..count].windows(2).any(|w| w[0].bone >= w[1].bone) {
                return Err(DeformError::CorruptCache(format!(
                    "omega blob row {v} is not sorted ascending by bone"
                )));
            }
            counts.push(count as u32);
        }
        Ok(Self {
            max_fan_in,
            counts,
            entries,
            truncated,
        })
    }
}

fn add_scaled(acc: &mut SymMat4, scale: f32, value: &SymMat4) {
    for (a, v) in acc.iter_mut().zip(value.iter()) {
        *a += scale * v;
    }
}

/// `outer([x, y, z, 1], [x, y, z, 1])` in symmetric storage.
fn homogeneous_outer(p: Vec3) -> SymMat4 {
    [
        p.x * p.x,
        p.x * p.y,
        p.x * p.z,
        p.x,
        p.y * p.y,
        p.y * p.z,
        p.y,
        p.z * p.z,
        p.z,
        1.0,
    ]
}

/// Precompute the omega store for one (mesh, skin, parameters) binding.
///
/// `iterations` smoothing passes with blend factor `lambda`; the result is
/// compacted to at most `max_fan_in` entries per vertex. Bones with zero
/// total weight across the mesh simply produce no entries.
pub fn precompute_omegas(
    laplacian: &LaplacianTable,
    skin: &SkinBinding,
    bind_positions: &[Vec3],
    iterations: u32,
    lambda: f32,
    max_fan_in: usize,
) -> OmegaStore {
    debug_assert_eq!(skin.vertex_count(), bind_positions.len());
    debug_assert_eq!(laplacian.vertex_count(), bind_positions.len());
    let vertex_count = bind_positions.len();

    // Seed from direct skin weights, sorted by bone via the map.
    let mut current: Vec<Vec<(i32, SymMat4)>> = Vec::with_capacity(vertex_count);
    for (inf, position) in skin.influences().iter().zip(bind_positions.iter()) {
        let outer = homogeneous_outer(*position);
        let mut accumulators: BTreeMap<i32, SymMat4> = BTreeMap::new();
        for (bone, weight) in inf.active() {
            add_scaled(
                accumulators.entry(bone as i32).or_insert([0.0; 10]),
                weight,
                &outer,
            );
        }
        current.push(accumulators.into_iter().collect());
    }

    // Jacobi smoothing: read `current`, write `next`, swap at the barrier.
    let mut next: Vec<Vec<(i32, SymMat4)>> = vec![Vec::new(); vertex_count];
    for _ in 0..iterations {
        for v in 0..vertex_count {
            let mut accumulators: BTreeMap<i32, SymMat4> = BTreeMap::new();
            for (bone, sym) in &current[v] {
                add_scaled(
                    accumulators.entry(*bone).or_insert([0.0; 10]),
                    1.0 - lambda,
                    sym,
                );
            }
            for entry in laplacian.row(v) {
                for (bone, sym) in &current[entry.index as usize] {
                    add_scaled(
                        accumulators.entry(*bone).or_insert([0.0; 10]),
                        lambda * entry.weight,
                        sym,
                    );
                }
            }
            next[v] = accumulators.into_iter().collect();
        }
        std::mem::swap(&mut current, &mut next);
    }

    // Compaction: threshold, truncate, pad with the sentinel.
    let mut entries = vec![OmegaEntry::SENTINEL; vertex_count * max_fan_in];
    let mut counts = vec![0u32; vertex_count];
    let mut truncated = 0u32;
    for (v, accumulators) in current.iter().enumerate() {
        let mut kept = accumulators
            .iter()
            .filter(|(_, sym)| sym[9] > OMEGA_WEIGHT_EPSILON);
        let row = &mut entries[v * max_fan_in..(v + 1) * max_fan_in];
        let mut count = 0usize;
        for slot in row.iter_mut() {
            let Some((bone, sym)) = kept.next() else {
                break;
            };
            *slot = OmegaEntry {
                bone: *bone,
                sym: *sym,
            };
            count += 1;
        }
        truncated += kept.count() as u32;
        counts[v] = count as u32;
    }

    if truncated > 0 {
        log::warn!("omega compaction dropped {truncated} accumulators past fan-in {max_fan_in}");
    }
    log::debug!(
        "precomputed omegas: {vertex_count} vertices, {iterations} iterations, lambda {lambda}"
    );

    OmegaStore {
        max_fan_in,
        counts,
        entries,
        truncated,
    }
}
