//! The embedding trait shared by the three storage formats.

use std::fmt;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Storage precision of an embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingFormat {
    /// One little-endian `f32` per dimension.
    Float,
    /// One `i8` per dimension plus an `f32` magnitude prefix.
    Int8,
    /// One bit per dimension.
    Bit,
}

impl fmt::Display for EmbeddingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EmbeddingFormat::Float => "float",
            EmbeddingFormat::Int8 => "int8",
            EmbeddingFormat::Bit => "bit",
        };
        f.write_str(name)
    }
}

/// An immutable embedded value in one storage format.
///
/// Implemented by [`EmbeddingF32`](crate::EmbeddingF32),
/// [`EmbeddingI8`](crate::EmbeddingI8) and
/// [`EmbeddingI1`](crate::EmbeddingI1). The set is closed; generic code
/// such as top-k search is written against this trait.
pub trait Embedding: Clone + Send + Sync + fmt::Debug + 'static {
    /// Format tag for this representation.
    const FORMAT: EmbeddingFormat;

    /// Byte length of the buffer needed for `dimensions` dimensions.
    fn buffer_len(dimensions: usize) -> Result<usize>;

    /// Convert raw model output into this representation, writing into
    /// `buffer`. The buffer must be exactly [`Embedding::buffer_len`] bytes.
    fn from_model_output(input: &[f32], buffer: BytesMut) -> Result<Self>;

    /// Wrap an existing buffer, such as one previously returned by
    /// [`Embedding::buffer`]. No values are recomputed.
    fn from_buffer(buffer: Bytes) -> Result<Self>;

    /// The bytes backing this embedding.
    fn buffer(&self) -> &Bytes;

    /// Number of dimensions represented.
    fn dimensions(&self) -> usize;

    /// Similarity to `other`; higher means more similar.
    fn similarity(&self, other: &Self) -> Result<f32>;

    /// Convert raw model output into a freshly allocated embedding.
    fn quantize(input: &[f32]) -> Result<Self> {
        let len = Self::buffer_len(input.len())?;
        Self::from_model_output(input, BytesMut::zeroed(len))
    }
}

/// Ensure a caller-supplied buffer has the exact length required.
pub(crate) fn check_buffer_len(expected: usize, buffer: &BytesMut) -> Result<()> {
    if buffer.len() != expected {
        return Err(crate::EmbeddingError::BufferLength {
            expected,
            actual: buffer.len(),
        });
    }
    Ok(())
}

/// Standard padded base64 used by every serialized format.
pub(crate) fn encode_base64(bytes: &[u8]) -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub(crate) fn decode_base64(text: &str) -> Result<Vec<u8>> {
    use base64::Engine as _;
    Ok(base64::engine::general_purpose::STANDARD.decode(text)?)
}
