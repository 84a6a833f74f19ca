//! Pool configuration options

use std::time::Duration;

use crate::errors::{PoolError, PoolResult};

/// Shortest accepted idle timeout. The reaper only wakes once per second, so
/// anything below this cannot be honored meaningfully.
pub(crate) const MIN_IDLE_TIMEOUT: Duration = Duration::from_millis(500);

/// Configuration for a striped resource pool
///
/// # Examples
///
/// ```
/// use striped_pool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_num_stripes(4)
///     .with_max_per_stripe(20)
///     .with_idle_timeout(Duration::from_secs(60));
///
/// assert_eq!(config.num_stripes, 4);
/// assert_eq!(config.max_per_stripe, 20);
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfiguration {
    /// Number of independent stripes. Borrowers are pinned to one stripe by
    /// hashing their thread id.
    pub num_stripes: usize,

    /// How long a resource may sit idle before the reaper destroys it.
    pub idle_timeout: Duration,

    /// Maximum number of live resources per stripe, counting both idle and
    /// borrowed ones.
    pub max_per_stripe: usize,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            num_stripes: 1,
            idle_timeout: Duration::from_secs(30),
            max_per_stripe: 10,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of stripes
    ///
    /// # Examples
    ///
    /// ```
    /// use striped_pool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new().with_num_stripes(8);
    /// assert_eq!(config.num_stripes, 8);
    /// ```
    pub fn with_num_stripes(mut self, stripes: usize) -> Self {
        self.num_stripes = stripes;
        self
    }

    /// Set the idle timeout after which unused resources are destroyed
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the per-stripe cap on live resources
    pub fn with_max_per_stripe(mut self, max: usize) -> Self {
        self.max_per_stripe = max;
        self
    }

    /// Check the configuration, naming the offending parameter on failure.
    pub(crate) fn validate(&self) -> PoolResult<()> {
        if self.num_stripes < 1 {
            return Err(PoolError::bad_config("num_stripes", "must be at least 1"));
        }
        if self.idle_timeout < MIN_IDLE_TIMEOUT {
            return Err(PoolError::bad_config(
                "idle_timeout",
                format!("must be at least {MIN_IDLE_TIMEOUT:?}"),
            ));
        }
        if self.max_per_stripe < 1 {
            return Err(PoolError::bad_config(
                "max_per_stripe",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration_is_valid() {
        assert!(PoolConfiguration::default().validate().is_ok());
    }

    #[test]
    fn validation_names_the_offending_parameter() {
        let err = PoolConfiguration::new()
            .with_num_stripes(0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("num_stripes"));

        let err = PoolConfiguration::new()
            .with_idle_timeout(Duration::from_millis(100))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("idle_timeout"));

        let err = PoolConfiguration::new()
            .with_max_per_stripe(0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("max_per_stripe"));
    }
}
