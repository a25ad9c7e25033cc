//! Reduces a face landmark set to two eye anchors and a shared radius.

use api::{EyeAnchor, EyePair, LandmarkSet};
use glam::{Mat4, Vec2, Vec4};

use crate::PipelineError;

/// Landmarks ringing the left eyelid (face mesh topology).
pub const LEFT_EYE_IDX: [usize; 8] = [33, 133, 157, 158, 159, 160, 161, 163];
/// Landmarks ringing the right eyelid.
pub const RIGHT_EYE_IDX: [usize; 8] = [362, 385, 386, 387, 388, 390, 263, 373];

pub const RADIUS_SCALE: f32 = 1.5;
pub const MIN_RADIUS: f32 = 0.06;
pub const MAX_RADIUS: f32 = 0.12;

/// Safe band applied to every published target.
pub const MIN_TARGET_RADIUS: f32 = 0.04;
pub const MAX_TARGET_RADIUS: f32 = 0.15;

/// Radius band after the texture transform has rescaled it.
pub const MIN_TEXTURE_RADIUS: f32 = 0.04;
pub const MAX_TEXTURE_RADIUS: f32 = 0.2;

const FRAME_CENTER: Vec2 = Vec2::new(0.5, 0.5);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct EyeStats {
    center: Vec2,
    size: f32,
}

/// Mean position and bounding box size of the landmarks at `indices`.
/// Indices past the end of the set are skipped.
fn eye_stats(landmarks: &LandmarkSet, indices: &[usize]) -> Result<EyeStats, PipelineError> {
    let mut mean = Vec2::ZERO;
    let mut min = Vec2::splat(f32::INFINITY);
    let mut max = Vec2::splat(f32::NEG_INFINITY);
    let mut count = 0usize;

    for p in indices.iter().filter_map(|&i| landmarks.get(i)) {
        if !p.is_finite() {
            return Err(PipelineError::NumericAnomaly("landmark"));
        }
        count += 1;
        // Running mean keeps coincident points exact.
        mean += (p - mean) / count as f32;
        min = min.min(p);
        max = max.max(p);
    }

    if count == 0 {
        return Ok(EyeStats {
            center: FRAME_CENTER,
            size: 0.0,
        });
    }

    let extent = max - min;
    Ok(EyeStats {
        center: mean,
        size: (extent.x + extent.y) / 2.0,
    })
}

/// Maps landmarks to eye targets in landmark space (origin top-left).
///
/// Never fails on an incomplete set: an eye with no usable points sits at the
/// frame center and contributes zero size.
pub fn map(landmarks: &LandmarkSet) -> Result<EyePair, PipelineError> {
    let left = eye_stats(landmarks, &LEFT_EYE_IDX)?;
    let right = eye_stats(landmarks, &RIGHT_EYE_IDX)?;

    let radius = ((left.size + right.size) / 2.0 * RADIUS_SCALE).clamp(MIN_RADIUS, MAX_RADIUS);

    #[cfg(feature = "xtralog")]
    log::debug!(
        "Mapped eyes: left {:?}, right {:?}, radius {:.4}",
        left.center,
        right.center,
        radius
    );

    Ok(EyePair::new(left.center, right.center, radius))
}

/// Rejects non-finite targets and clamps the rest into the safe band.
pub fn sanitize(targets: EyePair) -> Result<EyePair, PipelineError> {
    if !targets.is_finite() {
        return Err(PipelineError::NumericAnomaly("eye targets"));
    }
    let clamp_center = |c: Vec2| c.clamp(Vec2::ZERO, Vec2::ONE);
    Ok(EyePair::new(
        clamp_center(targets.left.center),
        clamp_center(targets.right.center),
        targets
            .radius()
            .clamp(MIN_TARGET_RADIUS, MAX_TARGET_RADIUS),
    ))
}

/// Projects a landmark-space point (Y down) into texture space (Y up).
pub fn to_texture_point(point: Vec2, tex_matrix: &Mat4) -> Vec2 {
    let projected = *tex_matrix * Vec4::new(point.x, 1.0 - point.y, 0.0, 1.0);
    Vec2::new(projected.x, projected.y)
}

/// Largest axis scale of the matrix's upper-left 2x2 block.
pub fn texture_scale(tex_matrix: &Mat4) -> f32 {
    let scale_x = tex_matrix.x_axis.truncate().truncate().length();
    let scale_y = tex_matrix.y_axis.truncate().truncate().length();
    scale_x.max(scale_y)
}

/// Moves both anchors into the texture space described by this frame's transform.
pub fn to_texture_space(eyes: &EyePair, tex_matrix: &Mat4) -> Result<EyePair, PipelineError> {
    if !tex_matrix.is_finite() {
        return Err(PipelineError::NumericAnomaly("texture matrix"));
    }

    let project = |anchor: &EyeAnchor| {
        to_texture_point(anchor.center, tex_matrix).clamp(Vec2::ZERO, Vec2::ONE)
    };
    let radius = (eyes.radius() * texture_scale(tex_matrix))
        .clamp(MIN_TEXTURE_RADIUS, MAX_TEXTURE_RADIUS);

    let projected = EyePair::new(project(&eyes.left), project(&eyes.right), radius);
    if !projected.is_finite() {
        return Err(PipelineError::NumericAnomaly("projected anchors"));
    }
    Ok(projected)
}
