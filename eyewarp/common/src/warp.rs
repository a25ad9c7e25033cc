//! The per-pixel eye bulge.
//!
//! [`bulge`] and [`warp_uv`] are the displacement evaluated for every output
//! pixel. The same function ships as GLSL in [`FRAGMENT_SHADER`]; the CPU
//! path in [`render`] is the reference used off-GPU.

use api::{EyeAnchor, RgbaImage, WarpParameters};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec4};

/// Below this distance from the center a pixel is left alone.
pub const MIN_DISTANCE: f32 = 0.001;

pub const VERTEX_SHADER: &str = r#"
attribute vec4 aPosition;
attribute vec2 aTexCoord;
varying vec2 vTexCoord;
uniform mat4 uTexMatrix;

void main() {
    gl_Position = aPosition;
    vTexCoord = (uTexMatrix * vec4(aTexCoord, 0.0, 1.0)).xy;
}
"#;

pub const FRAGMENT_SHADER: &str = r#"
#extension GL_OES_EGL_image_external : require
precision mediump float;

varying vec2 vTexCoord;
uniform samplerExternalOES sTexture;
uniform vec2 uLeftEye;
uniform vec2 uRightEye;
uniform float uRadius;
uniform float uStrength;
uniform int uMirror;

vec2 bulge(vec2 uv, vec2 center, float radius, float strength) {
    vec2 d = uv - center;
    float dist = length(d);
    if (dist < radius && dist > 0.001) {
        float f = dist / radius;
        float amount = strength * (1.0 - f * f);
        return center + normalize(d) * (dist * (1.0 - amount));
    }
    return uv;
}

void main() {
    vec2 uv = vTexCoord;
    if (uMirror == 1) {
        uv.x = 1.0 - uv.x;
    }
    uv = bulge(uv, uLeftEye, uRadius, uStrength);
    uv = bulge(uv, uRightEye, uRadius, uStrength);
    uv = clamp(uv, 0.0, 1.0);
    gl_FragColor = texture2D(sTexture, uv);
}
"#;

/// Uniform block for one draw, laid out for a direct buffer upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct WarpUniforms {
    pub tex_matrix: [f32; 16],
    pub left_eye: [f32; 2],
    pub right_eye: [f32; 2],
    pub radius: f32,
    pub strength: f32,
    pub mirror: u32,
    pub _padding: u32,
}

impl WarpUniforms {
    pub fn new(params: &WarpParameters, tex_matrix: &Mat4, mirror: bool) -> Self {
        Self {
            tex_matrix: tex_matrix.to_cols_array(),
            left_eye: params.left_eye.center.to_array(),
            right_eye: params.right_eye.center.to_array(),
            radius: params.left_eye.radius,
            strength: params.strength,
            mirror: u32::from(mirror),
            _padding: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Displaces `uv` radially toward `center` inside `radius`.
///
/// Identity outside the circle, at the center itself and for zero strength.
#[inline]
pub fn bulge(uv: Vec2, center: Vec2, radius: f32, strength: f32) -> Vec2 {
    if strength == 0.0 {
        return uv;
    }
    let d = uv - center;
    let dist = d.length();
    if dist > MIN_DISTANCE && dist < radius {
        let f = dist / radius;
        let amount = strength * (1.0 - f * f);
        let new_dist = dist * (1.0 - amount);
        center + (d / dist) * new_dist
    } else {
        uv
    }
}

#[inline]
fn bulge_anchor(uv: Vec2, anchor: &EyeAnchor, strength: f32) -> Vec2 {
    bulge(uv, anchor.center, anchor.radius, strength)
}

/// Left eye first, then right eye on the already displaced coordinate, then clamp.
#[inline]
pub fn warp_uv(uv: Vec2, params: &WarpParameters) -> Vec2 {
    let uv = bulge_anchor(uv, &params.left_eye, params.strength);
    let uv = bulge_anchor(uv, &params.right_eye, params.strength);
    uv.clamp(Vec2::ZERO, Vec2::ONE)
}

/// Bilinear sample with clamp-to-edge. `uv` has its origin bottom-left.
pub fn sample_bilinear(texture: &RgbaImage, uv: Vec2) -> [u8; 4] {
    if texture.width == 0 || texture.height == 0 {
        return [0, 0, 0, 255];
    }

    let max_x = (texture.width - 1) as f32;
    let max_y = (texture.height - 1) as f32;
    let fx = (uv.x * texture.width as f32 - 0.5).clamp(0.0, max_x);
    let fy = ((1.0 - uv.y) * texture.height as f32 - 0.5).clamp(0.0, max_y);

    let x0 = fx.floor() as usize;
    let y0 = fy.floor() as usize;
    let x1 = (x0 + 1).min(texture.width - 1);
    let y1 = (y0 + 1).min(texture.height - 1);
    let tx = fx - x0 as f32;
    let ty = fy - y0 as f32;

    let p00 = Vec4::from(texture.pixel(x0, y0).map(f32::from));
    let p10 = Vec4::from(texture.pixel(x1, y0).map(f32::from));
    let p01 = Vec4::from(texture.pixel(x0, y1).map(f32::from));
    let p11 = Vec4::from(texture.pixel(x1, y1).map(f32::from));

    let top = p00.lerp(p10, tx);
    let bottom = p01.lerp(p11, tx);
    let c = top.lerp(bottom, ty).round();
    [c.x as u8, c.y as u8, c.z as u8, c.w as u8]
}

/// Runs the full-screen pass on the CPU: one displaced sample per output pixel.
///
/// `params` must already be in texture space. The bulge is evaluated on the
/// sampling coordinate, after mirroring, so anchors are never mirrored
/// themselves. Output rows are top-down.
pub fn render(
    texture: &RgbaImage,
    target: &mut RgbaImage,
    params: &WarpParameters,
    tex_matrix: &Mat4,
    mirror: bool,
) {
    let width = target.width;
    let height = target.height;
    if width == 0 || height == 0 {
        return;
    }

    let inv_w = 1.0 / width as f32;
    let inv_h = 1.0 / height as f32;

    for (row, pixels) in target
        .data
        .chunks_exact_mut(width * RgbaImage::CHANNELS)
        .enumerate()
    {
        let t = 1.0 - (row as f32 + 0.5) * inv_h;
        for (col, out) in pixels.chunks_exact_mut(RgbaImage::CHANNELS).enumerate() {
            let s = (col as f32 + 0.5) * inv_w;
            let tex = *tex_matrix * Vec4::new(s, t, 0.0, 1.0);
            let mut uv = Vec2::new(tex.x, tex.y);
            if mirror {
                uv.x = 1.0 - uv.x;
            }
            let uv = warp_uv(uv, params);
            out.copy_from_slice(&sample_bilinear(texture, uv));
        }
    }
}
