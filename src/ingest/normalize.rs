use anyhow::{anyhow, Result};

use crate::frame::ColorFrame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Yuyv,
}

impl PixelFormat {
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB3" => Some(Self::Rgb24),
            b"YUYV" => Some(Self::Yuyv),
            _ => None,
        }
    }
}

/// Decode a captured buffer into `frame`, reallocating only when the frame
/// size changed.
pub(crate) fn decode_into(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
    frame: &mut ColorFrame,
) -> Result<()> {
    let pixel_count = width
        .checked_mul(height)
        .ok_or_else(|| anyhow!("frame dimensions overflow"))? as usize;
    let bytes_per_pixel = match format {
        PixelFormat::Rgb24 => 3,
        PixelFormat::Yuyv => 2,
    };
    let expected = pixel_count
        .checked_mul(bytes_per_pixel)
        .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
    // Drivers may pad the buffer past the image.
    if pixels.len() < expected {
        return Err(anyhow!(
            "{:?} frame too short: expected {}, got {}",
            format,
            expected,
            pixels.len()
        ));
    }

    if frame.dimensions() != (width, height) {
        *frame = ColorFrame::new(width, height);
    }
    let out: &mut [u8] = frame;
    match format {
        PixelFormat::Rgb24 => out.copy_from_slice(&pixels[..expected]),
        PixelFormat::Yuyv => yuyv_to_rgb(&pixels[..expected], out),
    }
    Ok(())
}

/// Each 4-byte group (Y0 U Y1 V) carries two pixels sharing one chroma pair.
fn yuyv_to_rgb(src: &[u8], dst: &mut [u8]) {
    for (group, out) in src.chunks_exact(4).zip(dst.chunks_exact_mut(6)) {
        let u = group[1] as f32 - 128.0;
        let v = group[3] as f32 - 128.0;
        write_rgb(group[0] as f32, u, v, &mut out[..3]);
        write_rgb(group[2] as f32, u, v, &mut out[3..]);
    }
}

fn write_rgb(y: f32, u: f32, v: f32, out: &mut [u8]) {
    out[0] = clamp_to_u8(y + 1.402_f32 * v);
    out[1] = clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v);
    out[2] = clamp_to_u8(y + 1.772_f32 * u);
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
