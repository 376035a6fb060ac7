//! Skin binding: per-vertex bone influences and per-bone bind matrices.
//!
//! Influences follow the usual 4-bone convention: each vertex carries up to
//! four (bone index, weight) pairs with weights summing to 1. Weights are
//! assumed normalized by upstream asset data and are not reverified here.
//! Per bone the binding stores the inverse bind matrix; the per-frame bone
//! transform is `world * inverse_bind`.

use crate::error::DeformError;
use crate::math::Mat4;

/// Maximum direct bone influences per vertex.
pub const MAX_INFLUENCES: usize = 4;

/// Per-vertex bone influences, packed in the exact layout a data-parallel
/// device consumes (four weights followed by four signed bone indices).
///
/// Unused slots carry weight `0.0`; the bone index of a zero-weight slot is
/// ignored.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VertexInfluences {
    /// Influence weights, one per slot.
    pub weights: [f32; 4],
    /// Bone indices, one per slot.
    pub bones: [i32; 4],
}

static_assertions::const_assert_eq!(std::mem::size_of::<VertexInfluences>(), 32);

impl VertexInfluences {
    /// Build influences from up to four (bone, weight) pairs.
    pub fn new(pairs: &[(usize, f32)]) -> Self {
        let mut out = Self::default();
        for (slot, &(bone, weight)) in pairs.iter().take(MAX_INFLUENCES).enumerate() {
            out.bones[slot] = bone as i32;
            out.weights[slot] = weight;
        }
        out
    }

    /// Full weight 1 on a single bone.
    pub fn single(bone: usize) -> Self {
        Self::new(&[(bone, 1.0)])
    }

    /// Iterate over slots with nonzero weight.
    pub fn active(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.bones
            .iter()
            .zip(self.weights.iter())
            .filter(|(&bone, &weight)| bone >= 0 && weight != 0.0)
            .map(|(&bone, &weight)| (bone as usize, weight))
    }
}

/// A skin binding: per-vertex influences plus per-bone inverse bind matrices.
#[derive(Debug, Clone)]
pub struct SkinBinding {
    influences: Vec<VertexInfluences>,
    inverse_bind: Vec<Mat4>,
}

impl SkinBinding {
    /// Create a skin binding.
    ///
    /// Fails if any nonzero-weight influence references a bone outside
    /// `inverse_bind`.
    pub fn new(
        influences: Vec<VertexInfluences>,
        inverse_bind: Vec<Mat4>,
    ) -> Result<Self, DeformError> {
        let bone_count = inverse_bind.len();
        for (vi, inf) in influences.iter().enumerate() {
            for (bone, _) in inf.active() {
                if bone >= bone_count {
                    return Err(DeformError::InvalidParameter(format!(
                        "vertex {vi} references bone {bone} (bone count {bone_count})"
                    )));
                }
            }
        }
        Ok(Self {
            influences,
            inverse_bind,
        })
    }

    /// Number of vertices covered by this binding.
    pub fn vertex_count(&self) -> usize {
        self.influences.len()
    }

    /// Number of bones in this binding.
    pub fn bone_count(&self) -> usize {
        self.inverse_bind.len()
    }

    /// Per-vertex influence records.
    pub fn influences(&self) -> &[VertexInfluences] {
        &self.influences
    }

    /// Per-bone inverse bind matrices.
    pub fn inverse_bind_matrices(&self) -> &[Mat4] {
        &self.inverse_bind
    }

    /// Combine current-frame world matrices into per-bone transforms
    /// (`world * inverse_bind`), writing into a reusable buffer.
    ///
    /// The buffer is fully rewritten before returning, so the caller can
    /// hand it to a deformation pass as read-only data.
    pub fn bone_transforms_into(
        &self,
        world: &[Mat4],
        out: &mut Vec<Mat4>,
    ) -> Result<(), DeformError> {
        if world.len() != self.inverse_bind.len() {
            return Err(DeformError::BoneCountMismatch {
                expected: self.inverse_bind.len(),
                actual: world.len(),
            });
        }
        out.clear();
        out.extend(
            world
                .iter()
                .zip(self.inverse_bind.iter())
                .map(|(w, ib)| w * ib),
        );
        Ok(())
    }

    /// Combine current-frame world matrices into per-bone transforms.
    pub fn bone_transforms(&self, world: &[Mat4]) -> Result<Vec<Mat4>, DeformError> {
        let mut out = Vec::with_capacity(world.len());
        self.bone_transforms_into(world, &mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{mat4_from_translation, Vec3};

    #[test]
    fn active_skips_zero_weight_slots() {
        let inf = VertexInfluences::new(&[(3, 0.7), (1, 0.3)]);
        let active: Vec<_> = inf.active().collect();
        assert_eq!(active, vec![(3, 0.7), (1, 0.3)]);
    }

    #[test]
    fn single_influence() {
        let inf = VertexInfluences::single(2);
        assert_eq!(inf.active().collect::<Vec<_>>(), vec![(2, 1.0)]);
    }

    #[test]
    fn rejects_out_of_range_bone() {
        let err = SkinBinding::new(vec![VertexInfluences::single(1)], vec![Mat4::identity()]);
        assert!(matches!(err, Err(DeformError::InvalidParameter(_))));
    }

    #[test]
    fn bone_transforms_combine_world_and_inverse_bind() {
        let bind = mat4_from_translation(Vec3::new(1.0, 0.0, 0.0));
        let inverse_bind = bind.try_inverse().unwrap();
        let skin =
            SkinBinding::new(vec![VertexInfluences::single(0)], vec![inverse_bind]).unwrap();

        let world = vec![mat4_from_translation(Vec3::new(1.0, 2.0, 0.0))];
        let transforms = skin.bone_transforms(&world).unwrap();
        // world * inverse(bind): net translation (0, 2, 0)
        let expected = mat4_from_translation(Vec3::new(0.0, 2.0, 0.0));
        assert!((transforms[0] - expected).norm() < 1e-6);
    }

    #[test]
    fn bone_transforms_reject_wrong_count() {
        let skin = SkinBinding::new(vec![], vec![Mat4::identity()]).unwrap();
        let err = skin.bone_transforms(&[]);
        assert!(matches!(
            err,
            Err(DeformError::BoneCountMismatch {
                expected: 1,
                actual: 0
            })
        ));
    }
}
