//! Properties every embedding format must hold at model dimensions.

use bytes::Bytes;
use pretty_assertions::assert_eq;
use textsim_embeddings::{
    DEFAULT_DIMENSION, Embedding, EmbeddingF32, EmbeddingI1, EmbeddingI8, EmbeddingsCache,
    find_closest,
};

/// Model-like output: small values around zero with both signs.
fn model_output(seed: u64) -> Vec<f32> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..DEFAULT_DIMENSION)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 40) as f32 / (1u64 << 24) as f32 - 0.5) * 0.2
        })
        .collect()
}

fn check_format<E: Embedding + PartialEq>() {
    let a = E::quantize(&model_output(1)).unwrap();
    let b = E::quantize(&model_output(2)).unwrap();

    assert_eq!(a.dimensions(), DEFAULT_DIMENSION);
    assert_eq!(format!("{:.3}", a.similarity(&a).unwrap()), "1.000");
    assert_eq!(a.similarity(&b).unwrap(), b.similarity(&a).unwrap());

    let copy = E::from_buffer(Bytes::copy_from_slice(a.buffer())).unwrap();
    assert!(copy == a);
    assert_eq!(copy.buffer(), a.buffer());
}

#[test]
fn test_float_properties() {
    check_format::<EmbeddingF32>();
}

#[test]
fn test_int8_properties() {
    check_format::<EmbeddingI8>();
}

#[test]
fn test_bit_properties() {
    check_format::<EmbeddingI1>();
}

#[test]
fn test_json_round_trip() {
    let input = model_output(3);

    let float = EmbeddingF32::quantize(&input).unwrap();
    let json = serde_json::to_string(&float).unwrap();
    assert_eq!(serde_json::from_str::<EmbeddingF32>(&json).unwrap(), float);

    let int8 = EmbeddingI8::quantize(&input).unwrap();
    let json = serde_json::to_value(&int8).unwrap();
    assert!(json.as_array().is_some_and(|pair| pair.len() == 2));
    assert!(serde_json::from_value::<EmbeddingI8>(json).unwrap() == int8);

    let bits = EmbeddingI1::quantize(&input).unwrap();
    let json = serde_json::to_string(&bits).unwrap();
    assert_eq!(serde_json::from_str::<EmbeddingI1>(&json).unwrap(), bits);
}

#[test]
fn test_int8_quantization_fidelity() {
    let input = model_output(4);
    let max = input.iter().fold(0.0f32, |m, v| m.max(v.abs()));
    let embedding = EmbeddingI8::quantize(&input).unwrap();

    for (value, quantized) in input.iter().zip(embedding.values()) {
        let expected = (value * 127.0 / max).round().clamp(-128.0, 127.0);
        assert!(
            (f32::from(quantized) - expected).abs() <= 1.0,
            "{value} quantized to {quantized}, expected about {expected}"
        );
    }
}

#[test]
fn test_bit_fidelity() {
    let input = model_output(5);
    let bits = EmbeddingI1::quantize(&input).unwrap();

    for (i, value) in input.iter().enumerate() {
        assert_eq!(bits.bit(i), Some(*value >= 0.0), "dimension {i}");
    }
    assert_eq!(bits.bit(DEFAULT_DIMENSION), None);
}

#[test]
fn test_cache_search_matches_brute_force() {
    let cache = EmbeddingsCache::new();
    let mut expected = Vec::new();
    let query = EmbeddingI8::quantize(&model_output(100)).unwrap();

    for seed in 0..50 {
        let text = format!("text {seed}");
        let embedding = EmbeddingI8::quantize(&model_output(seed)).unwrap();
        expected.push((query.similarity(&embedding).unwrap(), text.clone()));
        assert!(cache.try_add(&text, embedding));
    }
    expected.sort_by(|a, b| b.0.total_cmp(&a.0));

    let matches = cache.get_closest_matches(&query, 5, Some(-1.0)).unwrap();
    let texts: Vec<_> = matches.into_iter().map(|m| m.text).collect();
    let brute: Vec<_> = expected.into_iter().take(5).map(|(_, text)| text).collect();
    assert_eq!(texts, brute);

    let pairs: Vec<_> = (0..50)
        .map(|seed| (seed, EmbeddingI8::quantize(&model_output(seed)).unwrap()))
        .collect();
    let top = find_closest(&query, pairs.iter().map(|(s, e)| (*s, e)), 1, None).unwrap();
    assert_eq!(format!("text {}", top[0]), texts[0]);
}
