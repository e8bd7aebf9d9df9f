//! Synchronizer configuration.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Delay between stream reconnection attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Configuration for one [`Indexer`](crate::Indexer) run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Stable prefix of reader-facing alias names.
    pub alias_prefix: String,
    /// Rebuild the full history into fresh indices and swap the aliases
    /// over once caught up.
    pub reindex: bool,
    /// Stop after the first catch-up completes. Only meaningful together
    /// with `reindex`.
    pub exit_on_complete: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { alias_prefix: "chain_".to_owned(), reindex: false, exit_on_complete: false }
    }
}

/// Compute a fresh timestamped index prefix under `alias_prefix`.
///
/// Concrete index names are `<aliasPrefix><UTC timestamp>_<family>`; the
/// timestamp makes every reindex generation distinguishable.
pub fn generate_index_prefix(alias_prefix: &str, now: DateTime<Utc>) -> String {
    format!("{alias_prefix}{}_", now.format("%Y-%m-%d_%H-%M-%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn index_prefix_format() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 17, 5, 42).unwrap();
        assert_eq!(generate_index_prefix("chain_", now), "chain_2024-03-09_17-05-42_");
    }
}
