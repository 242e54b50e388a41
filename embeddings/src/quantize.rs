//! Conversion of raw model output into the compact storage formats.

use crate::error::{EmbeddingError, Result};

/// Bytes used by the magnitude prefix of an int8 buffer.
pub const MAGNITUDE_BYTES: usize = std::mem::size_of::<f32>();

/// Largest positive value of the int8 range, used as the scale target.
const I8_SCALE_TARGET: f64 = i8::MAX as f64;

/// Quantize `input` into `out` as `[magnitude: f32 LE][N x i8]`.
///
/// Each component is scaled so the largest absolute component maps to 127,
/// truncated toward zero and saturated to `[-128, 127]`. The stored
/// magnitude is the L2 norm of the resulting integers, not of the floats,
/// so it pairs with integer dot products at comparison time.
///
/// An all-zero input produces all-zero components and a zero magnitude.
pub fn quantize_i8(input: &[f32], out: &mut [u8]) -> Result<()> {
    let expected = input.len() + MAGNITUDE_BYTES;
    if out.len() != expected {
        return Err(EmbeddingError::BufferLength {
            expected,
            actual: out.len(),
        });
    }

    // Scaled in f64: `127 / max` overflows f32 for very small but normal
    // components.
    let max_component = input.iter().fold(0.0f32, |max, v| max.max(v.abs()));
    let scale = if max_component > 0.0 {
        I8_SCALE_TARGET / f64::from(max_component)
    } else {
        0.0
    };

    let (prefix, values) = out.split_at_mut(MAGNITUDE_BYTES);
    let mut magnitude_squared = 0i64;
    for (slot, &component) in values.iter_mut().zip(input) {
        // `as` truncates toward zero and saturates at the i8 bounds.
        let quantized = (f64::from(component) * scale) as i8;
        magnitude_squared += i64::from(quantized) * i64::from(quantized);
        *slot = quantized as u8;
    }

    let magnitude = (magnitude_squared as f64).sqrt() as f32;
    prefix.copy_from_slice(&magnitude.to_le_bytes());
    Ok(())
}

/// Quantize `input` into `out`, one bit per dimension, most significant
/// bit first. A bit is set when its component is non-negative.
pub fn quantize_i1(input: &[f32], out: &mut [u8]) -> Result<()> {
    if input.len() % 8 != 0 {
        return Err(EmbeddingError::BitDimensions(input.len()));
    }
    let expected = input.len() / 8;
    if out.len() != expected {
        return Err(EmbeddingError::BufferLength {
            expected,
            actual: out.len(),
        });
    }

    for (byte, group) in out.iter_mut().zip(input.chunks_exact(8)) {
        *byte = group
            .iter()
            .enumerate()
            .filter(|(_, v)| **v >= 0.0)
            .fold(0u8, |acc, (k, _)| acc | (0x80 >> k));
    }
    Ok(())
}

/// Copy `input` into `out` as little-endian `f32` bytes.
pub fn copy_f32(input: &[f32], out: &mut [u8]) -> Result<()> {
    let expected = input.len() * std::mem::size_of::<f32>();
    if out.len() != expected {
        return Err(EmbeddingError::BufferLength {
            expected,
            actual: out.len(),
        });
    }

    for (slot, value) in out.chunks_exact_mut(4).zip(input) {
        slot.copy_from_slice(&value.to_le_bytes());
    }
    Ok(())
}
