//! Random code generation for referral, invite and one-time codes.

use rand::Rng;

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const DIGITS: &[u8] = b"0123456789";

/// Draws `len` characters uniformly from `alphabet`.
pub fn random_code<R: Rng + ?Sized>(rng: &mut R, alphabet: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

/// Upper-case letters and digits.
pub fn alphanumeric_code(len: usize) -> String {
    random_code(&mut rand::thread_rng(), ALPHANUMERIC, len)
}

/// Digits only; leading zeros are kept.
pub fn numeric_code(len: usize) -> String {
    random_code(&mut rand::thread_rng(), DIGITS, len)
}

/// Returns true if every character of `code` is in the alphanumeric alphabet.
pub fn is_alphanumeric_code(code: &str) -> bool {
    code.bytes().all(|b| ALPHANUMERIC.contains(&b))
}
