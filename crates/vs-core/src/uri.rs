//! Matrix reference helpers.
//!
//! Commands and tree nodes refer to stored matrices as `matrix://<id>`; the DTO
//! wire format and the matrix store use the bare id.

pub const MATRIX_PROTOCOL_PREFIX: &str = "matrix://";

pub fn strip_matrix_protocol(reference: &str) -> &str {
    reference
        .strip_prefix(MATRIX_PROTOCOL_PREFIX)
        .unwrap_or(reference)
}

pub fn to_matrix_uri(id: &str) -> String {
    format!("{}{}", MATRIX_PROTOCOL_PREFIX, strip_matrix_protocol(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_and_attach() {
        assert_eq!(strip_matrix_protocol("matrix://abc"), "abc");
        assert_eq!(strip_matrix_protocol("abc"), "abc");
        assert_eq!(to_matrix_uri("abc"), "matrix://abc");
        assert_eq!(to_matrix_uri("matrix://abc"), "matrix://abc");
    }
}
