//! Metrics collection and export for resource pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Point-in-time metrics for a pool
///
/// # Examples
///
/// ```
/// use striped_pool::{BoxError, Pool, PoolConfiguration};
///
/// let pool = Pool::new(|| Ok(0u32), |_| Ok(()), PoolConfiguration::default()).unwrap();
///
/// pool.with_resource(|n| {
///     *n += 1;
///     Ok::<_, BoxError>(())
/// })
/// .unwrap();
///
/// let metrics = pool.metrics();
/// assert_eq!(metrics.resources_created, 1);
/// assert_eq!(metrics.total_returned, 1);
/// assert_eq!(metrics.idle_resources, 1);
/// ```
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Resources constructed by the factory
    pub resources_created: usize,

    /// Resources handed to the destructor
    pub resources_destroyed: usize,

    /// Successful acquires (warm and cold)
    pub total_taken: usize,

    /// Resources returned to an idle list
    pub total_returned: usize,

    /// Idle entries retired by the reaper
    pub total_reaped: usize,

    /// Destructor failures that were suppressed
    pub destructor_failures: usize,

    /// Non-blocking acquires that found the stripe saturated
    pub saturation_misses: usize,

    /// Current idle entries across all stripes
    pub idle_resources: usize,

    /// Current live resources across all stripes (idle plus borrowed)
    pub in_use_resources: usize,

    /// Total capacity (stripes times per-stripe cap)
    pub max_capacity: usize,

    /// Pool utilization ratio (0.0 to 1.0)
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert(
            "resources_created".to_string(),
            self.resources_created.to_string(),
        );
        metrics.insert(
            "resources_destroyed".to_string(),
            self.resources_destroyed.to_string(),
        );
        metrics.insert("total_taken".to_string(), self.total_taken.to_string());
        metrics.insert(
            "total_returned".to_string(),
            self.total_returned.to_string(),
        );
        metrics.insert("total_reaped".to_string(), self.total_reaped.to_string());
        metrics.insert(
            "destructor_failures".to_string(),
            self.destructor_failures.to_string(),
        );
        metrics.insert(
            "saturation_misses".to_string(),
            self.saturation_misses.to_string(),
        );
        metrics.insert(
            "idle_resources".to_string(),
            self.idle_resources.to_string(),
        );
        metrics.insert(
            "in_use_resources".to_string(),
            self.in_use_resources.to_string(),
        );
        metrics.insert("max_capacity".to_string(), self.max_capacity.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use striped_pool::{Pool, PoolConfiguration};
    /// use std::collections::HashMap;
    ///
    /// let pool = Pool::new(|| Ok(0u32), |_| Ok(()), PoolConfiguration::default()).unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("my_pool", Some(&tags));
    /// assert!(output.contains("resourcepool_resources_in_use"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let mut output = String::new();
        let labels = Self::format_labels(pool_name, tags);

        // Gauge metrics
        output.push_str("# HELP resourcepool_resources_in_use Live resources (idle plus borrowed)\n");
        output.push_str("# TYPE resourcepool_resources_in_use gauge\n");
        output.push_str(&format!(
            "resourcepool_resources_in_use{{{}}} {}\n",
            labels, metrics.in_use_resources
        ));

        output.push_str("# HELP resourcepool_resources_idle Idle resources awaiting borrowers\n");
        output.push_str("# TYPE resourcepool_resources_idle gauge\n");
        output.push_str(&format!(
            "resourcepool_resources_idle{{{}}} {}\n",
            labels, metrics.idle_resources
        ));

        output.push_str("# HELP resourcepool_utilization Pool utilization ratio\n");
        output.push_str("# TYPE resourcepool_utilization gauge\n");
        output.push_str(&format!(
            "resourcepool_utilization{{{}}} {:.2}\n",
            labels, metrics.utilization
        ));

        // Counter metrics
        output.push_str("# HELP resourcepool_resources_created_total Resources constructed\n");
        output.push_str("# TYPE resourcepool_resources_created_total counter\n");
        output.push_str(&format!(
            "resourcepool_resources_created_total{{{}}} {}\n",
            labels, metrics.resources_created
        ));

        output.push_str("# HELP resourcepool_resources_destroyed_total Resources destroyed\n");
        output.push_str("# TYPE resourcepool_resources_destroyed_total counter\n");
        output.push_str(&format!(
            "resourcepool_resources_destroyed_total{{{}}} {}\n",
            labels, metrics.resources_destroyed
        ));

        output.push_str("# HELP resourcepool_taken_total Successful acquires\n");
        output.push_str("# TYPE resourcepool_taken_total counter\n");
        output.push_str(&format!(
            "resourcepool_taken_total{{{}}} {}\n",
            labels, metrics.total_taken
        ));

        output.push_str("# HELP resourcepool_returned_total Resources returned to the pool\n");
        output.push_str("# TYPE resourcepool_returned_total counter\n");
        output.push_str(&format!(
            "resourcepool_returned_total{{{}}} {}\n",
            labels, metrics.total_returned
        ));

        output.push_str("# HELP resourcepool_reaped_total Idle entries retired by the reaper\n");
        output.push_str("# TYPE resourcepool_reaped_total counter\n");
        output.push_str(&format!(
            "resourcepool_reaped_total{{{}}} {}\n",
            labels, metrics.total_reaped
        ));

        output.push_str("# HELP resourcepool_destructor_failures_total Suppressed destructor failures\n");
        output.push_str("# TYPE resourcepool_destructor_failures_total counter\n");
        output.push_str(&format!(
            "resourcepool_destructor_failures_total{{{}}} {}\n",
            labels, metrics.destructor_failures
        ));

        output.push_str("# HELP resourcepool_saturation_misses_total Non-blocking acquires that found no capacity\n");
        output.push_str("# TYPE resourcepool_saturation_misses_total counter\n");
        output.push_str(&format!(
            "resourcepool_saturation_misses_total{{{}}} {}\n",
            labels, metrics.saturation_misses
        ));

        output
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
pub(crate) struct MetricsTracker {
    pub created: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub taken: AtomicUsize,
    pub returned: AtomicUsize,
    pub reaped: AtomicUsize,
    pub destructor_failures: AtomicUsize,
    pub saturation_misses: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            created: AtomicUsize::new(0),
            destroyed: AtomicUsize::new(0),
            taken: AtomicUsize::new(0),
            returned: AtomicUsize::new(0),
            reaped: AtomicUsize::new(0),
            destructor_failures: AtomicUsize::new(0),
            saturation_misses: AtomicUsize::new(0),
        }
    }

    pub fn snapshot(&self, idle: usize, in_use: usize, capacity: usize) -> PoolMetrics {
        let utilization = if capacity > 0 {
            in_use as f64 / capacity as f64
        } else {
            0.0
        };

        PoolMetrics {
            resources_created: self.created.load(Ordering::Relaxed),
            resources_destroyed: self.destroyed.load(Ordering::Relaxed),
            total_taken: self.taken.load(Ordering::Relaxed),
            total_returned: self.returned.load(Ordering::Relaxed),
            total_reaped: self.reaped.load(Ordering::Relaxed),
            destructor_failures: self.destructor_failures.load(Ordering::Relaxed),
            saturation_misses: self.saturation_misses.load(Ordering::Relaxed),
            idle_resources: idle,
            in_use_resources: in_use,
            max_capacity: capacity,
            utilization,
        }
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reports_utilization() {
        let tracker = MetricsTracker::new();
        tracker.created.fetch_add(3, Ordering::Relaxed);
        tracker.taken.fetch_add(5, Ordering::Relaxed);

        let metrics = tracker.snapshot(1, 3, 10);
        assert_eq!(metrics.resources_created, 3);
        assert_eq!(metrics.total_taken, 5);
        assert_eq!(metrics.idle_resources, 1);
        assert!((metrics.utilization - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn export_includes_every_counter() {
        let tracker = MetricsTracker::new();
        let exported = tracker.snapshot(0, 0, 4).export();
        assert_eq!(exported.get("max_capacity"), Some(&"4".to_string()));
        assert_eq!(exported.get("utilization"), Some(&"0.00".to_string()));
        assert!(exported.contains_key("total_reaped"));
    }
}
