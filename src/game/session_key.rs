use rand::Rng;

use crate::{
    constants::{SESSION_KEY_MAX_LEN, SESSION_KEY_MIN_LEN},
    error::{AppError, Result},
};

/// Derives a session key by sampling characters of `address`.
///
/// The key only has to be distinct from the player's other open sessions;
/// fairness comes from the on-chain randomness object, not from here.
pub fn generate_session_key_with<R: Rng>(address: &str, rng: &mut R) -> Result<String> {
    let chars: Vec<char> = address.trim().chars().collect();
    if chars.is_empty() {
        return Err(AppError::BadRequest(
            "Cannot derive a session key from an empty address".to_string(),
        ));
    }
    let len = rng.random_range(SESSION_KEY_MIN_LEN..SESSION_KEY_MAX_LEN);
    Ok((0..len)
        .map(|_| chars[rng.random_range(0..chars.len())])
        .collect())
}

pub fn generate_session_key(address: &str) -> Result<String> {
    generate_session_key_with(address, &mut rand::rng())
}
