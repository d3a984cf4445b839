//! Node configuration.
//!
//! Both records are frozen at node construction: there are no process-wide
//! mutable toggles, every node reads its own copy.

use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;

/// Durable-state configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Write state to disk on every promise/commit.
    pub persist: bool,
    /// Read an existing state file on startup.
    pub restore: bool,
    /// Keep the state file across a clean shutdown instead of removing it.
    pub keep_on_shutdown: bool,
    /// Directory holding the per-node state files.
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            persist: true,
            restore: true,
            keep_on_shutdown: false,
            dir: PathBuf::from("nodes"),
        }
    }
}

impl StoreConfig {
    /// A configuration that never touches the disk.
    #[must_use]
    pub fn ephemeral() -> Self {
        StoreConfig {
            persist: false,
            restore: false,
            keep_on_shutdown: false,
            dir: PathBuf::from("nodes"),
        }
    }

    #[must_use]
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    #[must_use]
    pub fn keep_on_shutdown(mut self, keep: bool) -> Self {
        self.keep_on_shutdown = keep;
        self
    }
}

/// Proposal-driver configuration.
#[derive(Clone, Debug)]
pub struct ProposeConfig {
    /// Upper limit on attempts for one submission.
    pub max_tries: u32,
    /// Lower bound of the uniform retry backoff.
    pub backoff_min: Duration,
    /// Upper bound of the uniform retry backoff.
    pub backoff_max: Duration,
}

impl Default for ProposeConfig {
    fn default() -> Self {
        ProposeConfig {
            max_tries: 8,
            backoff_min: Duration::from_millis(200),
            backoff_max: Duration::from_millis(500),
        }
    }
}

impl ProposeConfig {
    /// Draw a backoff delay uniformly from the configured interval.
    pub fn backoff(&self, rng: &mut impl Rng) -> Duration {
        let min = self.backoff_min.as_secs_f64();
        let max = self.backoff_max.as_secs_f64();
        Duration::from_secs_f64(rng.random_range(min..=max))
    }
}

/// Everything a node needs at construction.
#[derive(Clone, Debug, Default)]
pub struct NodeConfig {
    pub store: StoreConfig,
    pub propose: ProposeConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn backoff_stays_in_interval() {
        let config = ProposeConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let delay = config.backoff(&mut rng);
            assert!(delay >= config.backoff_min);
            assert!(delay <= config.backoff_max);
        }
    }
}
