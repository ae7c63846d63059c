//! Short task identifiers.

use rand::Rng;

/// 32 visually unambiguous symbols: digits 2-9 and uppercase letters
/// excluding I and O.
pub const ALPHABET: &[u8; 32] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

pub const ID_LEN: usize = 4;

/// Generate a 4-character task id. Stateless; the caller is responsible for
/// collision checks against existing tasks and re-invokes on a hit.
pub fn generate() -> String {
    let mut rng = rand::rng();
    (0..ID_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn is_valid(id: &str) -> bool {
    id.len() == ID_LEN && id.bytes().all(|b| ALPHABET.contains(&b))
}
