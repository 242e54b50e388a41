//! Scaled 8-bit embeddings.

use std::fmt;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{EmbeddingError, Result};
use crate::format::{Embedding, EmbeddingFormat, check_buffer_len, decode_base64, encode_base64};
use crate::quantize::{MAGNITUDE_BYTES, quantize_i8};
use crate::similarity::{dot_i8, normalized};

/// An embedding holding one signed byte per dimension, plus a 4-byte
/// magnitude prefix.
///
/// For a 384-dimensional model each value takes 388 bytes. Similarity is
/// cosine similarity computed from the integer dot product and the two
/// stored magnitudes, so norms are never recomputed per comparison.
#[derive(Clone, PartialEq)]
pub struct EmbeddingI8 {
    buffer: Bytes,
    magnitude: f32,
}

impl EmbeddingI8 {
    /// L2 norm of the stored integer components.
    pub fn magnitude(&self) -> f32 {
        self.magnitude
    }

    /// The quantized components.
    pub fn values(&self) -> impl ExactSizeIterator<Item = i8> + '_ {
        self.raw_values().iter().map(|&b| b as i8)
    }

    fn raw_values(&self) -> &[u8] {
        &self.buffer[MAGNITUDE_BYTES..]
    }
}

impl Embedding for EmbeddingI8 {
    const FORMAT: EmbeddingFormat = EmbeddingFormat::Int8;

    fn buffer_len(dimensions: usize) -> Result<usize> {
        Ok(MAGNITUDE_BYTES + dimensions)
    }

    fn from_model_output(input: &[f32], mut buffer: BytesMut) -> Result<Self> {
        check_buffer_len(Self::buffer_len(input.len())?, &buffer)?;
        quantize_i8(input, &mut buffer)?;
        Self::from_buffer(buffer.freeze())
    }

    fn from_buffer(buffer: Bytes) -> Result<Self> {
        if buffer.len() < MAGNITUDE_BYTES {
            return Err(EmbeddingError::MalformedBuffer(format!(
                "int8 buffer of {} bytes cannot hold the {MAGNITUDE_BYTES}-byte magnitude prefix",
                buffer.len()
            )));
        }
        let magnitude = f32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]);
        Ok(Self { buffer, magnitude })
    }

    fn buffer(&self) -> &Bytes {
        &self.buffer
    }

    fn dimensions(&self) -> usize {
        self.buffer.len() - MAGNITUDE_BYTES
    }

    fn similarity(&self, other: &Self) -> Result<f32> {
        let dot = dot_i8(self.raw_values(), other.raw_values())?;
        Ok(normalized(dot as f32, self.magnitude * other.magnitude))
    }
}

impl fmt::Debug for EmbeddingI8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingI8")
            .field("dimensions", &self.dimensions())
            .field("magnitude", &self.magnitude)
            .finish()
    }
}

/// Serialized as `[magnitude, base64(values)]`.
impl Serialize for EmbeddingI8 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (self.magnitude, encode_base64(self.raw_values())).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EmbeddingI8 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let (magnitude, encoded) = <(f32, String)>::deserialize(deserializer)?;
        let values = decode_base64(&encoded).map_err(serde::de::Error::custom)?;

        let mut buffer = BytesMut::with_capacity(MAGNITUDE_BYTES + values.len());
        buffer.extend_from_slice(&magnitude.to_le_bytes());
        buffer.extend_from_slice(&values);
        Self::from_buffer(buffer.freeze()).map_err(serde::de::Error::custom)
    }
}
