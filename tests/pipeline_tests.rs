//! End-to-end pipeline tests: bind a rigged mesh, drive bone poses,
//! check the deformed output.

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use rstest::rstest;

use deltamush::math::{mat4_from_axis_angle, mat4_from_translation, transform_point, Mat4, Vec3};
use deltamush::{
    AdjacencyCache, DeformError, DeformMesh, DeformPipeline, DeformSettings, DeformedMesh,
    DeformationBackend, OmegaStore, SkinBinding, VertexInfluences,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A strip of `columns` vertex pairs along +X, two triangles per segment.
///
/// Column 0 sits at x = 0; columns are 1 apart. Rigged so the left half
/// follows bone 0, the right half bone 1, with a 50/50 blend at the middle
/// column.
fn strip(columns: usize) -> (DeformMesh, SkinBinding) {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut influences = Vec::new();
    let mid = (columns - 1) / 2;
    for c in 0..columns {
        for y in 0..2 {
            positions.push(Vec3::new(c as f32, y as f32, 0.0));
            normals.push(Vec3::z());
            influences.push(if c < mid {
                VertexInfluences::single(0)
            } else if c > mid {
                VertexInfluences::single(1)
            } else {
                VertexInfluences::new(&[(0, 0.5), (1, 0.5)])
            });
        }
    }
    let mut triangles = Vec::new();
    for c in 0..columns as u32 - 1 {
        let base = c * 2;
        triangles.push([base, base + 2, base + 3]);
        triangles.push([base, base + 3, base + 1]);
    }
    let mesh = DeformMesh::new(positions, normals, triangles).unwrap();
    let skin = SkinBinding::new(influences, vec![Mat4::identity(), Mat4::identity()]).unwrap();
    (mesh, skin)
}

fn settings(iterations: u32) -> DeformSettings {
    DeformSettings {
        iterations,
        lambda: 0.9,
        adjacency_tolerance: 1e-4,
        max_fan_in: 16,
    }
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(10)]
fn identity_pose_reproduces_bind_mesh(#[case] iterations: u32) {
    init_logging();
    let (mesh, skin) = strip(5);
    let bind_positions = mesh.positions().to_vec();
    let cache = AdjacencyCache::new();
    let mut pipeline = DeformPipeline::bind(mesh, skin, settings(iterations), &cache).unwrap();

    let out = pipeline.update(&[Mat4::identity(), Mat4::identity()]).unwrap();
    for (v, bind) in bind_positions.iter().enumerate() {
        assert!(
            (out.positions[v] - bind).norm() < 1e-5,
            "vertex {v} moved at iterations={iterations}"
        );
    }
}

#[test]
fn rigid_motion_of_all_bones_is_reproduced() {
    let (mesh, skin) = strip(5);
    let bind_positions = mesh.positions().to_vec();
    let cache = AdjacencyCache::new();
    let mut pipeline = DeformPipeline::bind(mesh, skin, settings(4), &cache).unwrap();

    // Both bones share one rigid motion; the whole mesh must follow it.
    let motion = mat4_from_translation(Vec3::new(0.0, 3.0, -1.0))
        * mat4_from_axis_angle(Vec3::new(0.0, 0.0, 1.0), 0.8);
    let out = pipeline.update(&[motion, motion]).unwrap();
    for (v, bind) in bind_positions.iter().enumerate() {
        let expected = transform_point(&motion, *bind);
        assert!(
            (out.positions[v] - expected).norm() < 1e-4,
            "vertex {v} diverged from the rigid motion"
        );
    }
}

#[rstest]
#[case(1, 0.5)]
#[case(5, 0.9)]
#[case(30, 0.9)]
fn bent_pose_keeps_normals_unit_length(#[case] iterations: u32, #[case] lambda: f32) {
    let (mesh, skin) = strip(7);
    let cache = AdjacencyCache::new();
    let mut pipeline = DeformPipeline::bind(
        mesh,
        skin,
        DeformSettings {
            iterations,
            lambda,
            ..settings(iterations)
        },
        &cache,
    )
    .unwrap();

    // Bend at the middle: bone 1 rotates 90 degrees about Y through x = 3.
    let pivot = Vec3::new(3.0, 0.0, 0.0);
    let bend = mat4_from_translation(pivot)
        * mat4_from_axis_angle(Vec3::new(0.0, 1.0, 0.0), FRAC_PI_2)
        * mat4_from_translation(-pivot);
    let out = pipeline.update(&[Mat4::identity(), bend]).unwrap();

    // Deformed normals are rotated by a proper rotation only, so they keep
    // unit length; positions stay finite.
    for v in 0..out.vertex_count() {
        assert!(out.positions[v].iter().all(|c| c.is_finite()));
        assert!(
            (out.normals[v].norm() - 1.0).abs() < 1e-4,
            "normal {v} scaled: {}",
            out.normals[v].norm()
        );
    }
}

#[test]
fn smoothing_softens_the_fold_at_the_seam() {
    // Same bend, measured: with smoothing, the column next to the seam on
    // the rigid side is pulled toward the fold, unlike the unsmoothed rig
    // where only blended vertices move off the rigid motion.
    let pivot = Vec3::new(3.0, 0.0, 0.0);
    let bend = mat4_from_translation(pivot)
        * mat4_from_axis_angle(Vec3::new(0.0, 1.0, 0.0), FRAC_PI_2)
        * mat4_from_translation(-pivot);

    let cache = AdjacencyCache::new();
    let (mesh, skin) = strip(7);
    let bind = mesh.positions().to_vec();
    let mut smoothed =
        DeformPipeline::bind(mesh, skin, settings(10), &cache).unwrap();
    let out = smoothed.update(&[Mat4::identity(), bend]).unwrap();

    // Vertex at column 2 (x = 2, fully bone 0): rigidly it would stay put.
    let v = 4;
    assert!(
        (out.positions[v] - bind[v]).norm() > 1e-3,
        "smoothing should bend the surface ahead of the seam"
    );
}

#[test]
fn unweighted_vertices_stay_at_bind_pose() {
    // A two-triangle patch where one vertex carries no weights at all.
    let positions = vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
    ];
    let mesh = DeformMesh::new(
        positions.clone(),
        vec![Vec3::z(); 4],
        vec![[0, 1, 2], [0, 2, 3]],
    )
    .unwrap();
    let skin = SkinBinding::new(
        vec![
            VertexInfluences::single(0),
            VertexInfluences::single(0),
            VertexInfluences::single(0),
            VertexInfluences::default(), // no weights
        ],
        vec![Mat4::identity()],
    )
    .unwrap();
    let cache = AdjacencyCache::new();
    let mut pipeline = DeformPipeline::bind(mesh, skin, settings(0), &cache).unwrap();

    let out = pipeline
        .update(&[mat4_from_translation(Vec3::new(7.0, 0.0, 0.0))])
        .unwrap();
    // With zero smoothing iterations the unweighted vertex has no omega
    // entries and falls back to bind pose.
    assert_eq!(out.positions[3], positions[3]);
    assert_eq!(out.normals[3], Vec3::z());
}

#[test]
fn omega_store_roundtrips_through_bytes() {
    let (mesh, skin) = strip(5);
    let cache = AdjacencyCache::new();
    let pipeline = DeformPipeline::bind(mesh, skin, settings(8), &cache).unwrap();

    let bytes = pipeline.omegas().to_bytes();
    let restored = OmegaStore::from_bytes(&bytes).unwrap();
    assert_eq!(&restored, pipeline.omegas().as_ref());
    assert_eq!(restored.to_bytes(), bytes);
}

/// A backend that accepts the upload but refuses every frame.
struct RefusingBackend;

impl DeformationBackend for RefusingBackend {
    fn name(&self) -> &'static str {
        "refusing"
    }

    fn bind(&mut self, _mesh: &DeformMesh, _omegas: Arc<OmegaStore>) -> Result<(), DeformError> {
        Ok(())
    }

    fn deform(
        &mut self,
        _bone_transforms: &[Mat4],
        _output: &mut DeformedMesh,
    ) -> Result<(), DeformError> {
        Err(DeformError::BackendUnavailable("device lost".to_string()))
    }
}

#[test]
fn refused_frame_falls_back_to_cpu_output() {
    init_logging();
    let pivot = Vec3::new(3.0, 0.0, 0.0);
    let bend = mat4_from_translation(pivot)
        * mat4_from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 1.0)
        * mat4_from_translation(-pivot);
    let cache = AdjacencyCache::new();

    let (mesh, skin) = strip(5);
    let mut reference =
        DeformPipeline::bind(mesh.clone(), skin.clone(), settings(4), &cache).unwrap();
    let expected = reference.update(&[Mat4::identity(), bend]).unwrap().clone();

    let mut pipeline = DeformPipeline::bind_with_backend(
        mesh,
        skin,
        settings(4),
        &cache,
        Box::new(RefusingBackend),
    )
    .unwrap();
    let out = pipeline.update(&[Mat4::identity(), bend]).unwrap();
    assert_eq!(out, &expected);
}
