//! Canonical serialization for deterministic hashing.
//!
//! Used for the network snapshot fingerprint and the engine config hash.
//!
//! ## Determinism Guarantees
//!
//! - Struct fields serialize in declaration order
//! - Vectors serialize in index order
//! - Maps in hashed data are `BTreeMap`, never `HashMap`
//! - Floats are quantized to integers before hashing

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Quantization factor for float normalization.
pub const FLOAT_QUANTIZATION_FACTOR: f64 = 1_000_000.0;

/// Serialize a value to canonical JSON bytes for hashing.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("Canonical serialization failed")
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    let bytes = to_canonical_bytes(value);
    xxh64(&bytes, 0)
}

/// Compute canonical hash and return as hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

/// Quantize a float to a fixed-point integer.
///
/// Coordinates and lengths hash identically regardless of how the float
/// was formatted upstream. NaN quantizes to `i64::MIN`.
pub fn quantize(value: f64) -> i64 {
    if value.is_nan() {
        return i64::MIN;
    }
    (value * FLOAT_QUANTIZATION_FACTOR).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Segment {
        name: String,
        length: i64,
    }

    #[test]
    fn test_determinism() {
        let s = Segment {
            name: "Bow River".to_string(),
            length: quantize(1250.5),
        };

        assert_eq!(canonical_hash(&s), canonical_hash(&s));
        assert_eq!(canonical_hash_hex(&s).len(), 16);
    }

    #[test]
    fn test_quantize() {
        assert_eq!(quantize(0.1 + 0.2), quantize(0.3));
        assert_eq!(quantize(-2.5), -2_500_000);
        assert_eq!(quantize(f64::NAN), i64::MIN);
    }
}
