//! Full-precision embeddings.

use std::fmt;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{EmbeddingError, Result};
use crate::format::{Embedding, EmbeddingFormat, check_buffer_len, decode_base64, encode_base64};
use crate::quantize::copy_f32;
use crate::similarity::cosine_f32_le;

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// An embedding holding one `f32` per dimension.
///
/// This is the unquantized model output. For a 384-dimensional model each
/// value takes 1536 bytes. Similarity is cosine similarity.
#[derive(Clone, PartialEq, Eq)]
pub struct EmbeddingF32 {
    buffer: Bytes,
}

impl EmbeddingF32 {
    /// Decode the stored components.
    pub fn values(&self) -> Vec<f32> {
        self.buffer
            .chunks_exact(F32_BYTES)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

impl Embedding for EmbeddingF32 {
    const FORMAT: EmbeddingFormat = EmbeddingFormat::Float;

    fn buffer_len(dimensions: usize) -> Result<usize> {
        Ok(dimensions * F32_BYTES)
    }

    fn from_model_output(input: &[f32], mut buffer: BytesMut) -> Result<Self> {
        check_buffer_len(Self::buffer_len(input.len())?, &buffer)?;
        copy_f32(input, &mut buffer)?;
        Ok(Self {
            buffer: buffer.freeze(),
        })
    }

    fn from_buffer(buffer: Bytes) -> Result<Self> {
        if buffer.len() % F32_BYTES != 0 {
            return Err(EmbeddingError::MalformedBuffer(format!(
                "float buffer length {} is not a multiple of {F32_BYTES}",
                buffer.len()
            )));
        }
        Ok(Self { buffer })
    }

    fn buffer(&self) -> &Bytes {
        &self.buffer
    }

    fn dimensions(&self) -> usize {
        self.buffer.len() / F32_BYTES
    }

    fn similarity(&self, other: &Self) -> Result<f32> {
        cosine_f32_le(&self.buffer, &other.buffer)
    }
}

impl fmt::Debug for EmbeddingF32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingF32")
            .field("dimensions", &self.dimensions())
            .finish()
    }
}

impl Serialize for EmbeddingF32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_base64(&self.buffer))
    }
}

impl<'de> Deserialize<'de> for EmbeddingF32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        decode_base64(&encoded)
            .and_then(|bytes| Self::from_buffer(Bytes::from(bytes)))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_values_round_trip_model_output() {
        let input = [0.25, -1.5, 3.0, 0.0];
        let embedding = EmbeddingF32::quantize(&input).unwrap();

        assert_eq!(embedding.values(), input.to_vec());
        assert_eq!(embedding.dimensions(), 4);
        assert_eq!(embedding.buffer().len(), 16);
    }

    #[test]
    fn test_self_similarity_is_one() {
        let embedding = EmbeddingF32::quantize(&[0.3, -0.2, 0.9, 0.1, 0.5]).unwrap();
        let sim = embedding.similarity(&embedding).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_from_model_output_rejects_wrong_buffer() {
        let err = EmbeddingF32::from_model_output(&[1.0, 2.0], BytesMut::zeroed(7)).unwrap_err();
        assert_eq!(
            err,
            EmbeddingError::BufferLength {
                expected: 8,
                actual: 7
            }
        );
    }

    #[test]
    fn test_from_buffer_rejects_partial_float() {
        assert!(EmbeddingF32::from_buffer(Bytes::from_static(&[0, 0, 0])).is_err());
    }

    #[test]
    fn test_json_is_base64_of_buffer() {
        let embedding = EmbeddingF32::quantize(&[1.0]).unwrap();
        let json = serde_json::to_string(&embedding).unwrap();
        // 1.0f32 little-endian is 00 00 80 3F.
        assert_eq!(json, "\"AACAPw==\"");

        let back: EmbeddingF32 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, embedding);
    }
}
