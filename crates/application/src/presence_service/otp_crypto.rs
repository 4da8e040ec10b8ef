use std::fmt::Write;

use consentry_core::{AppError, AppResult};
use consentry_domain::ConsentId;
use sha2::{Digest, Sha256};

/// Largest multiple of one million below `u32::MAX`. Draws at or above it are rejected.
const UNBIASED_CEILING: u32 = 4_294_000_000;

/// Generates a six-digit code and its storage hash.
///
/// Returns `(raw_code, sha256_hash_hex)`.
pub(super) fn generate_code(consent_id: ConsentId) -> AppResult<(String, String)> {
    loop {
        let mut bytes = [0u8; 4];
        getrandom::fill(&mut bytes).map_err(|error| {
            AppError::Internal(format!("failed to generate presence code: {error}"))
        })?;

        let value = u32::from_le_bytes(bytes);
        if value < UNBIASED_CEILING {
            let code = format!("{:06}", value % 1_000_000);
            let hash = hash_code(consent_id, &code);
            return Ok((code, hash));
        }
    }
}

/// Computes the SHA-256 hash of a code bound to one grant.
pub(super) fn hash_code(consent_id: ConsentId, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(consent_id.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(code.as_bytes());

    hasher
        .finalize()
        .iter()
        .fold(String::with_capacity(64), |mut acc, byte| {
            let _ = write!(acc, "{byte:02x}");
            acc
        })
}
