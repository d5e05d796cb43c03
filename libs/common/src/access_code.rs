//! Circle access codes

use rand::Rng;

/// Characters used in access codes; 0/O and 1/I are left out so codes can be
/// read aloud or copied by hand.
pub const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a generated access code
pub const CODE_LENGTH: usize = 8;

/// Generate a fresh access code
pub fn generate() -> String {
    generate_with(&mut rand::thread_rng())
}

pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Canonical form of a code typed by a user
pub fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
