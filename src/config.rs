//! Runtime tuning.

use crate::error::Error;
use serde::Deserialize;
use std::time::Duration;

/// Scene and scheduler parameters.
///
/// Every field has a default, so a TOML document only needs the keys it changes:
///
/// ```
/// let config = tern::Config::from_toml_str("queue_capacity = 64").unwrap();
/// assert_eq!(config.queue_capacity, 64);
/// assert_eq!(config.max_clusters, 16);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Capacity of the event queue. Enqueueing into a full queue fails.
    pub queue_capacity: usize,

    /// Two damage clusters merge when their intersection area divided by the area a merged
    /// rectangle would paint needlessly exceeds this ratio.
    pub cluster_merge_ratio: f64,

    /// Once a window holds this many clusters, they collapse into the bounding box.
    pub max_clusters: usize,

    /// Upper bound on settle iterations per work cycle.
    pub settle_limit: usize,

    /// Maximum number of undo records kept.
    pub undo_limit: usize,

    /// How often the worker wakes while only time-driven work (transitions, animations) is
    /// pending.
    pub frame_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            queue_capacity: 512,
            cluster_merge_ratio: 1.,
            max_clusters: 16,
            settle_limit: 1000,
            undo_limit: 100,
            frame_interval_ms: 16,
        }
    }
}

impl Config {
    /// Loads a configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        let config: Config = toml::from_str(s)?;
        Ok(config.sanitized())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    /// Clamps values that would make the runtime unusable.
    pub(crate) fn sanitized(mut self) -> Self {
        self.queue_capacity = self.queue_capacity.max(1);
        self.max_clusters = self.max_clusters.max(1);
        self.settle_limit = self.settle_limit.max(1);
        if !(self.cluster_merge_ratio >= 0.) {
            self.cluster_merge_ratio = Config::default().cluster_merge_ratio;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn overrides_and_clamps() {
        let config = Config::from_toml_str(
            "queue_capacity = 0\ncluster_merge_ratio = 2.5\nundo_limit = 3",
        )
        .unwrap();
        assert_eq!(config.queue_capacity, 1);
        assert_eq!(config.cluster_merge_ratio, 2.5);
        assert_eq!(config.undo_limit, 3);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            Config::from_toml_str("queue_size = 3"),
            Err(Error::Config(_))
        ));
    }
}
