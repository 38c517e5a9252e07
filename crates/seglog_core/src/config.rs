//! Log configuration.

use crate::error::{CoreError, CoreResult};
use seglog_storage::ENTRY_WIDTH;

/// Configuration for opening a log.
///
/// One structure covers everything a segment needs: both rotation
/// thresholds, the offset numbering start, and the index entry width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Store size at which the active segment rotates.
    pub max_store_bytes: u64,

    /// Index capacity per segment; a full index also rotates.
    pub max_index_bytes: u64,

    /// Base offset of the first segment of a new log.
    pub initial_offset: u64,

    /// Width of one index entry, at least 12 bytes.
    pub entry_width: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_store_bytes: 1024 * 1024, // 1 MB
            max_index_bytes: 1024 * 1024, // 1 MB
            initial_offset: 0,
            entry_width: ENTRY_WIDTH,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the store rotation threshold.
    #[must_use]
    pub const fn max_store_bytes(mut self, bytes: u64) -> Self {
        self.max_store_bytes = bytes;
        self
    }

    /// Sets the index capacity per segment.
    #[must_use]
    pub const fn max_index_bytes(mut self, bytes: u64) -> Self {
        self.max_index_bytes = bytes;
        self
    }

    /// Sets the first offset of a new log.
    #[must_use]
    pub const fn initial_offset(mut self, offset: u64) -> Self {
        self.initial_offset = offset;
        self
    }

    /// Sets the index entry width.
    #[must_use]
    pub const fn entry_width(mut self, width: u64) -> Self {
        self.entry_width = width;
        self
    }

    /// Checks that a segment built from this configuration can hold a record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the entry width is below 12 bytes, the
    /// index cannot hold one entry, or the store threshold is zero.
    pub fn validate(&self) -> CoreResult<()> {
        if self.entry_width < ENTRY_WIDTH {
            return Err(CoreError::invalid_config(format!(
                "entry_width {} is below the minimum {ENTRY_WIDTH}",
                self.entry_width
            )));
        }
        if self.max_index_bytes < self.entry_width {
            return Err(CoreError::invalid_config(format!(
                "max_index_bytes {} cannot hold one {}-byte entry",
                self.max_index_bytes, self.entry_width
            )));
        }
        if self.max_store_bytes == 0 {
            return Err(CoreError::invalid_config("max_store_bytes must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.initial_offset, 0);
        assert_eq!(config.entry_width, 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .max_store_bytes(32)
            .max_index_bytes(36)
            .initial_offset(16)
            .entry_width(12);

        assert_eq!(config.max_store_bytes, 32);
        assert_eq!(config.max_index_bytes, 36);
        assert_eq!(config.initial_offset, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn narrow_entry_rejected() {
        let config = Config::new().entry_width(8);
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn tiny_index_rejected() {
        let config = Config::new().max_index_bytes(11);
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_store_rejected() {
        let config = Config::new().max_store_bytes(0);
        assert!(config.validate().is_err());
    }
}
