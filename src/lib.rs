//! # striped-pool
//!
//! Striped, thread-safe resource pool for expensive-to-create resources such
//! as database connections.
//!
//! ## Features
//!
//! - Independent stripes; borrowers are pinned to one by their thread id
//! - Per-stripe cap with blocking and non-blocking acquire
//! - Scoped borrow that guarantees release on success, failure, and panic
//! - LIFO idle list, so the warmest resource is handed out first
//! - Background reaper destroying resources idle past a configured timeout
//! - Optional per-resource reuse cap that transparently retires worn resources
//! - Metrics with Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use striped_pool::{BoxError, Pool, PoolConfiguration};
//!
//! let pool = Pool::new(
//!     || Ok(Vec::<u8>::with_capacity(4096)),
//!     |_buffer| Ok(()),
//!     PoolConfiguration::default(),
//! )
//! .unwrap();
//!
//! let length = pool
//!     .with_resource(|buffer| {
//!         buffer.extend_from_slice(b"hello");
//!         Ok::<_, BoxError>(buffer.len())
//!     })
//!     .unwrap();
//! assert_eq!(length, 5);
//! ```

mod config;
mod errors;
mod metrics;
mod pool;
mod reaper;
mod stripe;

pub use config::PoolConfiguration;
pub use errors::{BoxError, PoolError, PoolResult};
pub use metrics::{MetricsExporter, PoolMetrics};
pub use pool::{Counted, Pool};
pub use stripe::Stripe;
