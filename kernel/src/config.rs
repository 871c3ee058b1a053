//! Recognized configuration keys (spec §6).

use std::collections::HashMap;

const MAX_RETRIES_KEY: &str = "snapshot.loading.maxRetries";
const STALENESS_LIMIT_KEY: &str = "async.update.stalenessTimeLimit";

const DEFAULT_MAX_RETRIES: u32 = 2;
/// 30 seconds: long enough that a burst of reads within one refresh window shares a snapshot,
/// short enough that a table under active writes doesn't go stale for long. `0` (forcing every
/// `update` onto the synchronous path) is always available as an explicit override.
const DEFAULT_STALENESS_LIMIT_MS: i64 = 30_000;

/// Validated configuration for a [`crate::snapshot::SnapshotFactory`] /
/// [`crate::snapshot::cache::SnapshotCache`] pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotCacheConfig {
    /// Max checkpoint-fallback retries in `SnapshotFactory` (default 2).
    pub max_retries: u32,
    /// Milliseconds (default 30000); `0` forces every `update` onto the synchronous path.
    pub staleness_time_limit_ms: i64,
}

impl Default for SnapshotCacheConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            staleness_time_limit_ms: DEFAULT_STALENESS_LIMIT_MS,
        }
    }
}

impl SnapshotCacheConfig {
    /// Build from loosely-typed raw option strings, falling back to defaults for absent or
    /// unparsable keys (unrecognized keys are ignored, mirroring how storage-backend configs are
    /// typically threaded through `object_store::parse_url_opts`).
    pub fn from_raw(options: &HashMap<String, String>) -> Self {
        let mut config = Self::default();
        if let Some(value) = options.get(MAX_RETRIES_KEY).and_then(|v| v.parse().ok()) {
            config.max_retries = value;
        }
        if let Some(value) = options
            .get(STALENESS_LIMIT_KEY)
            .and_then(|v| v.parse().ok())
        {
            config.staleness_time_limit_ms = value;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_absent() {
        let config = SnapshotCacheConfig::from_raw(&HashMap::new());
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.staleness_time_limit_ms, DEFAULT_STALENESS_LIMIT_MS);
    }

    #[test]
    fn parses_recognized_keys() {
        let options = HashMap::from([
            (MAX_RETRIES_KEY.to_string(), "5".to_string()),
            (STALENESS_LIMIT_KEY.to_string(), "30000".to_string()),
        ]);
        let config = SnapshotCacheConfig::from_raw(&options);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.staleness_time_limit_ms, 30_000);
    }

    #[test]
    fn ignores_unparsable_values() {
        let options = HashMap::from([(MAX_RETRIES_KEY.to_string(), "not-a-number".to_string())]);
        let config = SnapshotCacheConfig::from_raw(&options);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    }
}
