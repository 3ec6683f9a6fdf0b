//! Packed `f32` vector blobs.
//!
//! Embeddings and reduced affordance vectors are stored as little-endian
//! `f32` sequences (4 × N bytes). Packing then unpacking is bit-exact,
//! including for NaN payloads and signed zeros.

/// Pack `vector` into a little-endian byte blob.
pub fn pack_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Unpack a blob produced by [`pack_vector`]. Trailing bytes that do not
/// form a whole `f32` are ignored.
pub fn unpack_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
