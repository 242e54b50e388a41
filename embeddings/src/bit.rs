//! Binary (one bit per dimension) embeddings.

use std::fmt;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{EmbeddingError, Result};
use crate::format::{Embedding, EmbeddingFormat, check_buffer_len, decode_base64, encode_base64};
use crate::quantize::quantize_i1;
use crate::similarity::hamming_distance;

/// An embedding holding one bit per dimension, most significant bit first.
///
/// For a 384-dimensional model each value takes 48 bytes. This is a sign
/// threshold of the model output, equivalent to a one-bit locality
/// sensitive hash per dimension. Similarity is `1 - hamming / bits`, which
/// is fast and compact at the cost of some ranking precision.
#[derive(Clone, PartialEq, Eq)]
pub struct EmbeddingI1 {
    buffer: Bytes,
}

impl EmbeddingI1 {
    /// Whether dimension `index` was non-negative in the model output, or
    /// `None` past the last dimension.
    pub fn bit(&self, index: usize) -> Option<bool> {
        self.buffer
            .get(index / 8)
            .map(|byte| byte & (0x80 >> (index % 8)) != 0)
    }
}

impl Embedding for EmbeddingI1 {
    const FORMAT: EmbeddingFormat = EmbeddingFormat::Bit;

    fn buffer_len(dimensions: usize) -> Result<usize> {
        if dimensions % 8 != 0 {
            return Err(EmbeddingError::BitDimensions(dimensions));
        }
        Ok(dimensions / 8)
    }

    fn from_model_output(input: &[f32], mut buffer: BytesMut) -> Result<Self> {
        check_buffer_len(Self::buffer_len(input.len())?, &buffer)?;
        quantize_i1(input, &mut buffer)?;
        Ok(Self {
            buffer: buffer.freeze(),
        })
    }

    fn from_buffer(buffer: Bytes) -> Result<Self> {
        Ok(Self { buffer })
    }

    fn buffer(&self) -> &Bytes {
        &self.buffer
    }

    fn dimensions(&self) -> usize {
        self.buffer.len() * 8
    }

    fn similarity(&self, other: &Self) -> Result<f32> {
        let differences = hamming_distance(&self.buffer, &other.buffer)?;
        let bits = self.dimensions();
        if bits == 0 {
            return Ok(1.0);
        }
        Ok(1.0 - differences as f32 / bits as f32)
    }
}

impl fmt::Debug for EmbeddingI1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingI1")
            .field("dimensions", &self.dimensions())
            .finish()
    }
}

impl Serialize for EmbeddingI1 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_base64(&self.buffer))
    }
}

impl<'de> Deserialize<'de> for EmbeddingI1 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        decode_base64(&encoded)
            .and_then(|bytes| Self::from_buffer(Bytes::from(bytes)))
            .map_err(serde::de::Error::custom)
    }
}
