// Utility modules

use crate::error::{AppError, Result};

/// Length in bytes of Sui object ids and addresses.
pub const OBJECT_ID_BYTES: usize = 32;

/// Normalizes an object id or address to a `0x`-prefixed, zero-padded,
/// lowercase 64 hex digit string. Short forms like `0x8` are accepted.
pub fn normalize_object_id(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() || digits.len() > OBJECT_ID_BYTES * 2 {
        return Err(AppError::BadRequest(format!("Invalid object id: {}", raw)));
    }
    let padded = format!("{:0>width$}", digits, width = OBJECT_ID_BYTES * 2);
    let bytes = hex::decode(&padded)
        .map_err(|e| AppError::BadRequest(format!("Invalid object id {}: {}", raw, e)))?;
    Ok(format!("0x{}", hex::encode(bytes)))
}

/// Compares two ids ignoring case and leading-zero differences.
pub fn ids_eq(a: &str, b: &str) -> bool {
    match (normalize_object_id(a), normalize_object_id(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.trim().eq_ignore_ascii_case(b.trim()),
    }
}

pub fn is_env_flag_enabled(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            normalized == "1" || normalized == "true" || normalized == "yes" || normalized == "on"
        })
        .unwrap_or(false)
}
