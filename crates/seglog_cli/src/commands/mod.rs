//! CLI command implementations.

pub mod dump;
pub mod inspect;
pub mod serve;
pub mod token;

use std::path::Path;

/// Fails unless `path` is an existing directory, so read-only commands
/// never create a log.
pub fn require_log_dir(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No log found at {}", path.display()).into());
    }
    Ok(())
}

/// Lowercase hex encoding.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
