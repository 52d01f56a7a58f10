//! Embedding BLOB conversion.
//!
//! Vectors are opaque to the store: any length is accepted, the only
//! requirement on a stored BLOB is that it holds whole `f32` values.

use super::Error;

pub type Result<T> = std::result::Result<T, Error>;

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Convert a vector of f32 values to a BLOB (little-endian bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|&x| x.to_le_bytes()).collect()
}

/// Convert a BLOB (little-endian bytes) back to f32 values.
///
/// # Errors
///
/// Returns `Error::InvalidBlobSize` if the length is not a multiple of 4.
pub fn blob_to_vec(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % F32_BYTES != 0 {
        return Err(Error::InvalidBlobSize { actual: blob.len() });
    }
    Ok(blob
        .chunks_exact(F32_BYTES)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_to_blob_length() {
        let blob = vec_to_blob(&[0.1f32; 1536]);
        assert_eq!(blob.len(), 1536 * 4);
    }

    #[test]
    fn test_blob_to_vec_preserves_values() {
        let vec = vec![1.0f32, -0.5, 0.25, f32::MIN_POSITIVE];
        let recovered = blob_to_vec(&vec_to_blob(&vec)).unwrap();
        assert_eq!(recovered, vec);
    }

    #[test]
    fn test_blob_to_vec_empty() {
        assert!(blob_to_vec(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_blob_to_vec_ragged_size() {
        let blob = vec![0u8; 1501];
        assert!(matches!(
            blob_to_vec(&blob),
            Err(Error::InvalidBlobSize { actual: 1501 })
        ));
    }
}
