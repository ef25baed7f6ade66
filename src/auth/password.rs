use crate::error::AppError;

/// Salted bcrypt hash of a plaintext password.
pub fn hash_password(plaintext: &str, cost: u32) -> Result<String, AppError> {
    bcrypt::hash(plaintext, cost)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
}

/// Verify plaintext against a stored hash - constant-time via bcrypt.
/// A malformed stored hash counts as a mismatch.
pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    bcrypt::verify(plaintext, hash).unwrap_or(false)
}
