use common::eye_mapper::{
    self, LEFT_EYE_IDX, MAX_RADIUS, MAX_TEXTURE_RADIUS, MIN_RADIUS, RIGHT_EYE_IDX,
};
use common::{EyePair, LandmarkSet, PipelineError};
use glam::{Mat4, Vec2, Vec3};

const MESH_POINTS: usize = 478;

fn face_with(left: &[Vec2], right: &[Vec2]) -> LandmarkSet {
    let mut points = vec![Vec2::new(0.5, 0.5); MESH_POINTS];
    for (&i, &p) in LEFT_EYE_IDX.iter().zip(left.iter().cycle()) {
        points[i] = p;
    }
    for (&i, &p) in RIGHT_EYE_IDX.iter().zip(right.iter().cycle()) {
        points[i] = p;
    }
    LandmarkSet::new(points)
}

fn assert_close(a: Vec2, b: Vec2) {
    assert!((a - b).length() < 1e-5, "{:?} != {:?}", a, b);
}

#[test]
fn empty_set_centers_both_eyes() {
    let eyes = eye_mapper::map(&LandmarkSet::default()).unwrap();
    assert_eq!(eyes.left.center, Vec2::new(0.5, 0.5));
    assert_eq!(eyes.right.center, Vec2::new(0.5, 0.5));
    assert!(eyes.radius() >= MIN_RADIUS && eyes.radius() <= MAX_RADIUS);
}

#[test]
fn coincident_points_give_exact_centers_and_minimum_radius() {
    let face = face_with(&[Vec2::new(0.30, 0.50)], &[Vec2::new(0.70, 0.50)]);
    let eyes = eye_mapper::map(&face).unwrap();
    assert_eq!(eyes.left.center, Vec2::new(0.30, 0.50));
    assert_eq!(eyes.right.center, Vec2::new(0.70, 0.50));
    assert_eq!(eyes.radius(), 0.06);
    assert_eq!(eyes.left.radius, eyes.right.radius);
}

#[test]
fn radius_follows_bounding_box() {
    // Each eye spans 0.06 wide and 0.02 tall: size 0.04, radius 0.04 * 1.5.
    let left = [Vec2::new(0.27, 0.49), Vec2::new(0.33, 0.51)];
    let right = [Vec2::new(0.67, 0.49), Vec2::new(0.73, 0.51)];
    let eyes = eye_mapper::map(&face_with(&left, &right)).unwrap();
    assert!((eyes.radius() - 0.06).abs() < 1e-5);
    assert_close(eyes.left.center, Vec2::new(0.30, 0.50));

    let left = [Vec2::new(0.20, 0.45), Vec2::new(0.30, 0.55)];
    let right = [Vec2::new(0.70, 0.45), Vec2::new(0.80, 0.55)];
    let eyes = eye_mapper::map(&face_with(&left, &right)).unwrap();
    assert!((eyes.radius() - 0.12).abs() < 1e-5);

    let left = [Vec2::new(0.0, 0.0), Vec2::new(0.5, 0.5)];
    let eyes = eye_mapper::map(&face_with(&left, &left)).unwrap();
    assert_eq!(eyes.radius(), MAX_RADIUS);
}

#[test]
fn short_set_skips_missing_indices() {
    // Only indices below 200 exist: the left eye is fully present, the right eye absent.
    let mut points = vec![Vec2::ZERO; 200];
    for &i in &LEFT_EYE_IDX {
        points[i] = Vec2::new(0.25, 0.4);
    }
    let eyes = eye_mapper::map(&LandmarkSet::new(points)).unwrap();
    assert_close(eyes.left.center, Vec2::new(0.25, 0.4));
    assert_eq!(eyes.right.center, Vec2::new(0.5, 0.5));
    assert_eq!(eyes.radius(), MIN_RADIUS);
}

#[test]
fn non_finite_landmark_is_an_anomaly() {
    let face = face_with(&[Vec2::new(f32::NAN, 0.5)], &[Vec2::new(0.7, 0.5)]);
    assert_eq!(
        eye_mapper::map(&face),
        Err(PipelineError::NumericAnomaly("landmark"))
    );
}

#[test]
fn non_finite_landmark_outside_eye_rings_is_ignored() {
    let mut face = face_with(&[Vec2::new(0.3, 0.5)], &[Vec2::new(0.7, 0.5)]);
    let mut points = face.points().to_vec();
    points[0] = Vec2::new(f32::INFINITY, f32::NAN);
    face = LandmarkSet::new(points);
    assert!(eye_mapper::map(&face).is_ok());
}

mod sanitize {
    use super::*;

    #[test]
    fn clamps_into_safe_band() {
        let raw = EyePair::new(Vec2::new(-0.2, 0.5), Vec2::new(1.4, 2.0), 0.5);
        let eyes = eye_mapper::sanitize(raw).unwrap();
        assert_eq!(eyes.left.center, Vec2::new(0.0, 0.5));
        assert_eq!(eyes.right.center, Vec2::new(1.0, 1.0));
        assert_eq!(eyes.radius(), 0.15);

        let tiny = EyePair::new(Vec2::splat(0.5), Vec2::splat(0.5), 0.001);
        assert_eq!(eye_mapper::sanitize(tiny).unwrap().radius(), 0.04);
    }

    #[test]
    fn rejects_non_finite() {
        let raw = EyePair::new(Vec2::new(0.3, 0.5), Vec2::new(0.7, 0.5), f32::NAN);
        assert!(matches!(
            eye_mapper::sanitize(raw),
            Err(PipelineError::NumericAnomaly(_))
        ));
    }
}

mod texture_space {
    use super::*;

    #[test]
    fn identity_only_flips_y() {
        let eyes = EyePair::new(Vec2::new(0.3, 0.2), Vec2::new(0.7, 0.2), 0.08);
        let projected = eye_mapper::to_texture_space(&eyes, &Mat4::IDENTITY).unwrap();
        assert_close(projected.left.center, Vec2::new(0.3, 0.8));
        assert_close(projected.right.center, Vec2::new(0.7, 0.8));
        assert!((projected.radius() - 0.08).abs() < 1e-6);
    }

    #[test]
    fn vertical_flip_matrix_cancels_y_flip() {
        // The usual camera texture transform: t' = 1 - t.
        let flip = Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0))
            * Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0));
        let eyes = EyePair::new(Vec2::new(0.3, 0.2), Vec2::new(0.7, 0.2), 0.08);
        let projected = eye_mapper::to_texture_space(&eyes, &flip).unwrap();
        assert_close(projected.left.center, Vec2::new(0.3, 0.2));
        assert!((projected.radius() - 0.08).abs() < 1e-6);
    }

    #[test]
    fn scale_uses_largest_axis_and_clamps() {
        let crop = Mat4::from_scale(Vec3::new(2.0, 1.5, 1.0));
        let eyes = EyePair::new(Vec2::new(0.1, 0.9), Vec2::new(0.2, 0.9), 0.08);
        let projected = eye_mapper::to_texture_space(&eyes, &crop).unwrap();
        assert!((projected.radius() - 0.16).abs() < 1e-6);

        let zoom = Mat4::from_scale(Vec3::new(4.0, 4.0, 1.0));
        let projected = eye_mapper::to_texture_space(&eyes, &zoom).unwrap();
        assert_eq!(projected.radius(), MAX_TEXTURE_RADIUS);
    }

    #[test]
    fn projected_centers_are_clamped() {
        let shift = Mat4::from_translation(Vec3::new(0.9, 0.0, 0.0));
        let eyes = EyePair::new(Vec2::new(0.3, 0.5), Vec2::new(0.7, 0.5), 0.08);
        let projected = eye_mapper::to_texture_space(&eyes, &shift).unwrap();
        assert_eq!(projected.right.center.x, 1.0);
    }

    #[test]
    fn non_finite_matrix_is_rejected() {
        let mut cols = Mat4::IDENTITY.to_cols_array();
        cols[5] = f32::NAN;
        let bad = Mat4::from_cols_array(&cols);
        assert_eq!(
            eye_mapper::to_texture_space(&EyePair::default(), &bad),
            Err(PipelineError::NumericAnomaly("texture matrix"))
        );
    }
}
