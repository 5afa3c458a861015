//! Cache configuration.
//!
//! Budgets can be set programmatically, via the builder, or overridden from
//! environment variables.

/// Configuration for the bitmap cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of live entries
    pub max_entries: usize,

    /// Maximum bytes held by live bitmaps
    pub max_bytes: usize,
}

/// Default entry ceiling.
pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// Default byte ceiling (200 MiB).
pub const DEFAULT_MAX_BYTES: usize = 200 * 1024 * 1024;

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: DEFAULT_MAX_ENTRIES, max_bytes: DEFAULT_MAX_BYTES }
    }
}

impl CacheConfig {
    /// Create a configuration with the default budgets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry ceiling.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set the byte ceiling in mebibytes.
    pub fn with_max_mb(mut self, mb: usize) -> Self {
        self.max_bytes = mb * 1024 * 1024;
        self
    }

    /// Load configuration with environment overrides.
    ///
    /// Environment variables:
    /// - `PAGEDECK_CACHE_ENTRIES`: entry ceiling (default: 50)
    /// - `PAGEDECK_CACHE_MB`: byte ceiling in MiB (default: 200)
    ///
    /// # Errors
    /// Returns an error if a variable is set but not a positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PAGEDECK_CACHE_ENTRIES") {
            config.max_entries = val
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidValue("PAGEDECK_CACHE_ENTRIES".to_string()))?;
        }

        if let Ok(val) = std::env::var("PAGEDECK_CACHE_MB") {
            config.max_bytes = val
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidValue("PAGEDECK_CACHE_MB".to_string()))?
                * 1024
                * 1024;
        }

        Ok(config)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}")]
    InvalidValue(String),
}
