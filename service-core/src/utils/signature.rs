use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

/// Hex-encoded SHA-512 over the concatenation of `parts`.
///
/// Used for gateway notification signatures of the form
/// `SHA512(order_id + status_code + gross_amount + server_key)`.
pub fn sha512_hex(parts: &[&str]) -> String {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Compare two signatures in constant time (case-insensitive hex).
pub fn signatures_match(expected: &str, provided: &str) -> bool {
    let expected = expected.to_ascii_lowercase();
    let provided = provided.to_ascii_lowercase();
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}
