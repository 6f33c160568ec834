//! Random secret generation.

use rand::rngs::OsRng;
use rand::{Rng, RngCore};

const DIGITS: &[u8] = b"0123456789";

/// Generate `length` random decimal digits.
pub fn numeric(length: usize) -> String {
    let mut rng = OsRng;
    (0..length)
        .map(|_| DIGITS[rng.gen_range(0..DIGITS.len())] as char)
        .collect()
}

/// Generate `length` random lowercase hex characters.
pub fn hexadecimal(length: usize) -> String {
    let mut bytes = vec![0u8; length.div_ceil(2)];
    OsRng.fill_bytes(&mut bytes);

    let mut encoded = hex::encode(bytes);
    encoded.truncate(length);
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digits() {
        let secret = numeric(8);
        assert_eq!(secret.len(), 8);
        assert!(secret.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_hex_odd_length() {
        let secret = hexadecimal(7);
        assert_eq!(secret.len(), 7);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_empty() {
        assert!(numeric(0).is_empty());
        assert!(hexadecimal(0).is_empty());
    }

    #[test]
    fn test_hex_secrets_differ() {
        assert_ne!(hexadecimal(24), hexadecimal(24));
    }
}
