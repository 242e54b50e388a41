//! Similarity kernels shared by the embedding formats.
//!
//! The loops process `LANES` values (or one `u64` word) per step so the
//! compiler can keep independent accumulators in vector registers, then
//! finish the tail with a scalar loop. Nothing here depends on a specific
//! instruction set.

use crate::error::{EmbeddingError, Result};

const LANES: usize = 8;
const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Compute the cosine similarity between two float slices.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors (or a zero vector on either side)
/// - -1.0 means opposite vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    ensure_same_len(a.len(), b.len())?;

    let mut dot = [0.0f32; LANES];
    let mut norm_a = [0.0f32; LANES];
    let mut norm_b = [0.0f32; LANES];

    let a_chunks = a.chunks_exact(LANES);
    let b_chunks = b.chunks_exact(LANES);
    let (a_tail, b_tail) = (a_chunks.remainder(), b_chunks.remainder());
    for (ca, cb) in a_chunks.zip(b_chunks) {
        for lane in 0..LANES {
            dot[lane] += ca[lane] * cb[lane];
            norm_a[lane] += ca[lane] * ca[lane];
            norm_b[lane] += cb[lane] * cb[lane];
        }
    }

    let mut dot: f32 = dot.iter().sum();
    let mut norm_a: f32 = norm_a.iter().sum();
    let mut norm_b: f32 = norm_b.iter().sum();
    for (x, y) in a_tail.iter().zip(b_tail) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    Ok(normalized(dot, norm_a.sqrt() * norm_b.sqrt()))
}

/// Cosine similarity over two little-endian `f32` byte buffers.
///
/// Decodes in place so the buffers never need to be aligned for `f32`.
pub(crate) fn cosine_f32_le(a: &[u8], b: &[u8]) -> Result<f32> {
    ensure_same_len(a.len() / F32_BYTES, b.len() / F32_BYTES)?;

    const BLOCK: usize = LANES * F32_BYTES;
    let mut dot = [0.0f32; LANES];
    let mut norm_a = [0.0f32; LANES];
    let mut norm_b = [0.0f32; LANES];

    let a_blocks = a.chunks_exact(BLOCK);
    let b_blocks = b.chunks_exact(BLOCK);
    let (a_tail, b_tail) = (a_blocks.remainder(), b_blocks.remainder());
    for (ba, bb) in a_blocks.zip(b_blocks) {
        for lane in 0..LANES {
            let x = read_f32(ba, lane);
            let y = read_f32(bb, lane);
            dot[lane] += x * y;
            norm_a[lane] += x * x;
            norm_b[lane] += y * y;
        }
    }

    let mut dot: f32 = dot.iter().sum();
    let mut norm_a: f32 = norm_a.iter().sum();
    let mut norm_b: f32 = norm_b.iter().sum();
    for i in 0..a_tail.len() / F32_BYTES {
        let x = read_f32(a_tail, i);
        let y = read_f32(b_tail, i);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    Ok(normalized(dot, norm_a.sqrt() * norm_b.sqrt()))
}

/// Integer dot product of two signed 8-bit vectors stored as raw bytes.
///
/// Lanes accumulate in `i64`; buffers come from deserialization too, so
/// the dimension count is unbounded.
pub(crate) fn dot_i8(a: &[u8], b: &[u8]) -> Result<i64> {
    ensure_same_len(a.len(), b.len())?;

    let mut sums = [0i64; LANES];
    let a_chunks = a.chunks_exact(LANES);
    let b_chunks = b.chunks_exact(LANES);
    let (a_tail, b_tail) = (a_chunks.remainder(), b_chunks.remainder());
    for (ca, cb) in a_chunks.zip(b_chunks) {
        for lane in 0..LANES {
            sums[lane] += i64::from(ca[lane] as i8) * i64::from(cb[lane] as i8);
        }
    }

    let mut total: i64 = sums.iter().sum();
    for (&x, &y) in a_tail.iter().zip(b_tail) {
        total += i64::from(x as i8) * i64::from(y as i8);
    }
    Ok(total)
}

/// Number of differing bits between two equal-length bit buffers.
///
/// XORs whole `u64` words and counts set bits, then handles the trailing
/// bytes individually. The entire buffer is always scanned.
pub(crate) fn hamming_distance(a: &[u8], b: &[u8]) -> Result<u32> {
    ensure_same_len(a.len(), b.len())?;

    const WORD: usize = std::mem::size_of::<u64>();
    let a_words = a.chunks_exact(WORD);
    let b_words = b.chunks_exact(WORD);
    let (a_tail, b_tail) = (a_words.remainder(), b_words.remainder());

    let mut differences = 0u32;
    for (wa, wb) in a_words.zip(b_words) {
        let x = u64::from_ne_bytes([wa[0], wa[1], wa[2], wa[3], wa[4], wa[5], wa[6], wa[7]]);
        let y = u64::from_ne_bytes([wb[0], wb[1], wb[2], wb[3], wb[4], wb[5], wb[6], wb[7]]);
        differences += (x ^ y).count_ones();
    }
    for (x, y) in a_tail.iter().zip(b_tail) {
        differences += (x ^ y).count_ones();
    }
    Ok(differences)
}

/// Dot product divided by the magnitude product; zero when either side is
/// a zero vector.
pub(crate) fn normalized(dot: f32, magnitude_product: f32) -> f32 {
    if magnitude_product == 0.0 {
        return 0.0;
    }
    dot / magnitude_product
}

fn read_f32(bytes: &[u8], index: usize) -> f32 {
    let at = index * F32_BYTES;
    f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn ensure_same_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(EmbeddingError::DimensionMismatch { expected, actual });
    }
    Ok(())
}
