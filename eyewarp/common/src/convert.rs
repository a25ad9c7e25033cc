//! Sensor frame conversion.
//!
//! Three-plane YUV 4:2:0 frames are repacked into a [`PixelBuffer`]: luma
//! rows first, then one V/U pair per 2x2 block. Row and pixel strides are
//! honoured for every plane; a chroma plane that ends early leaves the
//! remaining destination bytes zeroed instead of failing the frame.

use api::{FramePayload, PixelBuffer, Plane, RawFrame, RgbaImage, Rotation};

use crate::PipelineError;

/// Converts a captured frame into the interleaved layout consumed by [`decode_rgba`].
pub fn to_pixel_buffer(frame: &RawFrame) -> Result<PixelBuffer, PipelineError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(PipelineError::MalformedFrame(format!(
            "empty frame {}x{}",
            frame.width, frame.height
        )));
    }

    match &frame.payload {
        FramePayload::RawPlanar { y, u, v } => {
            convert_planar(frame.width, frame.height, y, u, v)
        }
        FramePayload::RawInterleaved(data) => {
            convert_interleaved(frame.width, frame.height, data)
        }
    }
}

fn convert_planar(
    width: usize,
    height: usize,
    y: &Plane,
    u: &Plane,
    v: &Plane,
) -> Result<PixelBuffer, PipelineError> {
    if y.row_stride < width {
        return Err(PipelineError::MalformedFrame(format!(
            "luma row stride {} is narrower than width {}",
            y.row_stride, width
        )));
    }
    if u.pixel_stride == 0 || v.pixel_stride == 0 {
        return Err(PipelineError::MalformedFrame(
            "chroma pixel stride is zero".to_string(),
        ));
    }

    let luma_needed = (height - 1) * y.row_stride + width;
    if y.data.len() < luma_needed {
        return Err(PipelineError::MalformedFrame(format!(
            "luma plane has {} bytes, {} needed",
            y.data.len(),
            luma_needed
        )));
    }

    let mut out = PixelBuffer::zeroed(width, height);
    let dst = out.as_bytes_mut();

    for row in 0..height {
        let src = row * y.row_stride;
        dst[row * width..(row + 1) * width].copy_from_slice(&y.data[src..src + width]);
    }

    let chroma_width = width / 2;
    let mut pos = width * height;
    for row in 0..height / 2 {
        let u_row = row * u.row_stride;
        let v_row = row * v.row_stride;
        for col in 0..chroma_width {
            // V before U.
            if let Some(&sample) = v.data.get(v_row + col * v.pixel_stride) {
                dst[pos] = sample;
            }
            if let Some(&sample) = u.data.get(u_row + col * u.pixel_stride) {
                dst[pos + 1] = sample;
            }
            pos += 2;
        }
    }

    Ok(out)
}

fn convert_interleaved(
    width: usize,
    height: usize,
    data: &[u8],
) -> Result<PixelBuffer, PipelineError> {
    let luma_len = width * height;
    if data.len() < luma_len {
        return Err(PipelineError::MalformedFrame(format!(
            "interleaved frame has {} bytes, luma alone needs {}",
            data.len(),
            luma_len
        )));
    }

    let mut out = PixelBuffer::zeroed(width, height);
    let available = data.len().min(out.len());
    out.as_bytes_mut()[..available].copy_from_slice(&data[..available]);
    Ok(out)
}

/// Full-range BT.601 conversion of one sample.
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = y + 1.402 * v;
    let g = y - 0.344_136 * u - 0.714_136 * v;
    let b = y + 1.772 * u;

    [to_channel(r), to_channel(g), to_channel(b)]
}

fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Decodes a [`PixelBuffer`] into an opaque RGBA image.
pub fn decode_rgba(buffer: &PixelBuffer) -> RgbaImage {
    let width = buffer.width();
    let height = buffer.height();
    let luma = buffer.luma();
    let chroma = buffer.chroma();
    let chroma_width = width / 2;
    let chroma_height = height / 2;
    let chroma_row_bytes = chroma_width * 2;

    let mut image = RgbaImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let (u, v) = if chroma_width == 0 || chroma_height == 0 {
                (128, 128)
            } else {
                let cx = (x / 2).min(chroma_width - 1);
                let cy = (y / 2).min(chroma_height - 1);
                let idx = cy * chroma_row_bytes + cx * 2;
                (chroma[idx + 1], chroma[idx])
            };

            let [r, g, b] = yuv_to_rgb(luma[y * width + x], u, v);
            image.set_pixel(x, y, [r, g, b, 255]);
        }
    }
    image
}

/// Rotates clockwise by `rotation`, then mirrors horizontally if requested.
pub fn orient(image: RgbaImage, rotation: Rotation, mirror: bool) -> RgbaImage {
    if rotation == Rotation::Deg0 && !mirror {
        return image;
    }

    let (src_w, src_h) = (image.width, image.height);
    let (dst_w, dst_h) = if rotation.is_transposed() {
        (src_h, src_w)
    } else {
        (src_w, src_h)
    };

    let mut out = RgbaImage::new(dst_w, dst_h);
    for dy in 0..dst_h {
        for dx in 0..dst_w {
            let rx = if mirror { dst_w - 1 - dx } else { dx };
            let (sx, sy) = match rotation {
                Rotation::Deg0 => (rx, dy),
                Rotation::Deg90 => (dy, src_h - 1 - rx),
                Rotation::Deg180 => (src_w - 1 - rx, src_h - 1 - dy),
                Rotation::Deg270 => (src_w - 1 - dy, rx),
            };
            out.set_pixel(dx, dy, image.pixel(sx, sy));
        }
    }
    out
}
