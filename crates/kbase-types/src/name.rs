//! Knowledge base name validation.
//!
//! Names become directory names under the data root, so anything that could
//! escape the root or collide with temp files is rejected.

use crate::error::KbaseError;

/// Maximum accepted name length.
pub const MAX_KB_NAME_LEN: usize = 128;

/// Validate a knowledge base name.
pub fn validate_kb_name(name: &str) -> Result<(), KbaseError> {
    let reject = |reason: &str| {
        Err(KbaseError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.is_empty() {
        return reject("name is empty");
    }
    if name.len() > MAX_KB_NAME_LEN {
        return reject("name is too long");
    }
    if name == "." || name == ".." || name.starts_with('.') {
        return reject("name must not start with '.'");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return reject("only ASCII letters, digits, '-', '_' and '.' are allowed");
    }
    Ok(())
}
