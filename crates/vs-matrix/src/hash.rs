//! Content-based hashing for matrix IDs.

use crate::types::MatrixData;
use sha2::{Digest, Sha256};

/// SHA-256 over the shape and the canonical bits of every value.
///
/// `-0.0` hashes like `0.0` and every NaN hashes alike, so numerically equal
/// matrices share an id.
pub fn compute_matrix_id(data: &MatrixData) -> String {
    let mut hasher = Sha256::new();

    hasher.update((data.len() as u64).to_le_bytes());
    for row in data {
        hasher.update((row.len() as u64).to_le_bytes());
        for value in row {
            hasher.update(canonical_bits(*value).to_le_bytes());
        }
    }

    let result = hasher.finalize();
    format!("{:x}", result)
}

fn canonical_bits(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else if value == 0.0 {
        0.0_f64.to_bits()
    } else {
        value.to_bits()
    }
}

pub fn is_valid_id(id: &str) -> bool {
    id.len() == 64 && id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_stability() {
        let data = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert_eq!(compute_matrix_id(&data), compute_matrix_id(&data.clone()));
        assert!(is_valid_id(&compute_matrix_id(&data)));
    }

    #[test]
    fn hash_differs_for_different_shapes() {
        let row = vec![vec![1.0, 2.0, 3.0, 4.0]];
        let square = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert_ne!(compute_matrix_id(&row), compute_matrix_id(&square));
    }

    #[test]
    fn signed_zero_hashes_alike() {
        assert_eq!(
            compute_matrix_id(&vec![vec![0.0]]),
            compute_matrix_id(&vec![vec![-0.0]])
        );
    }

    #[test]
    fn empty_matrix_has_an_id() {
        assert!(is_valid_id(&compute_matrix_id(&Vec::new())));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn id_depends_only_on_content(rows in prop::collection::vec(prop::collection::vec(-1e6_f64..1e6_f64, 3), 0..8)) {
            let copy = rows.clone();
            prop_assert_eq!(compute_matrix_id(&rows), compute_matrix_id(&copy));
            prop_assert!(is_valid_id(&compute_matrix_id(&rows)));
        }
    }
}
