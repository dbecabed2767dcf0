//! Caller-supplied configuration for package ingestion.
//!
//! Nothing here is read from global state: callers build an [`IngestConfig`]
//! (usually from a TOML document) and pass it into every ingestion call. The
//! struct rejects unknown keys and falls back to defaults for anything
//! omitted, so a partial document such as `lock_timeout_secs = 10` is valid.

use std::time::Duration;

use addon_ingest_common::normalise_locale;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::archive::ArchiveLimits;
use crate::compat::CompatibilityDefaults;

/// Default wait for the extraction lock, in seconds.
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 6;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML document could not be decoded.
    #[error("failed to parse ingestion configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The limits are inconsistent with each other.
    #[error("max_member_size ({member}) must not exceed max_total_size ({total})")]
    InconsistentLimits {
        /// Configured per-member ceiling.
        member: u64,
        /// Configured archive ceiling.
        total: u64,
    },
}

/// Settings shared by every ingestion call.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Per-member and whole-archive uncompressed size ceilings.
    pub limits: ArchiveLimits,
    /// How long a locked extraction waits for its lock.
    pub lock_timeout_secs: u64,
    /// Skip the zip-slip name checks. Only for re-extracting archives that
    /// were already validated once.
    pub relaxed_filenames: bool,
    /// Version floors used by compatibility resolution.
    pub compat: CompatibilityDefaults,
    /// Preferred locale for user-facing messages.
    ///
    /// Whitespace-only values are treated as absent so templated files such
    /// as `locale = ""` fall back to the bundled default.
    pub locale: Option<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            limits: ArchiveLimits::default(),
            lock_timeout_secs: DEFAULT_LOCK_TIMEOUT_SECS,
            relaxed_filenames: false,
            compat: CompatibilityDefaults::default(),
            locale: None,
        }
    }
}

impl IngestConfig {
    /// Parse a TOML document, filling omitted keys with defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// use addon_ingest::IngestConfig;
    ///
    /// let config = IngestConfig::from_toml_str("lock_timeout_secs = 10").unwrap();
    /// assert_eq!(config.lock_timeout_secs, 10);
    /// assert_eq!(config.limits.max_member_size, 104_857_600);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys, and
    /// [`ConfigError::InconsistentLimits`] when the per-member ceiling exceeds
    /// the archive ceiling.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InconsistentLimits`] when
    /// `limits.max_member_size` exceeds `limits.max_total_size`.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_member_size > self.limits.max_total_size {
            return Err(ConfigError::InconsistentLimits {
                member: self.limits.max_member_size,
                total: self.limits.max_total_size,
            });
        }
        Ok(())
    }

    /// Lock wait as a [`Duration`].
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    /// Returns the configured locale override, if present.
    #[must_use]
    pub fn locale(&self) -> Option<&str> {
        normalise_locale(self.locale.as_deref())
    }
}
