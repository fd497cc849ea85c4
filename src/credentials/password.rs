//! Secret generation for credential grants.

use rand::Rng;

use crate::constants::PASSWORD_CHARSET;

/// Generate a random secret of `length` characters.
///
/// Only ASCII letters and digits are used so the secret can be embedded in a
/// connection URI without escaping.
pub fn generate_password(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..PASSWORD_CHARSET.len());
            PASSWORD_CHARSET[idx] as char
        })
        .collect()
}
