//! Core striped pool implementation

use crate::config::PoolConfiguration;
use crate::errors::{BoxError, PoolError, PoolResult};
use crate::metrics::{MetricsExporter, MetricsTracker, PoolMetrics};
use crate::reaper;
use crate::stripe::{Entry, IncrementFn, ReusableFn, Stripe};

use crossbeam::channel::{self, Sender};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

pub(crate) type FactoryFn<T> = dyn Fn() -> Result<T, BoxError> + Send + Sync;
pub(crate) type DestructorFn<T> = dyn Fn(T) -> Result<(), BoxError> + Send + Sync;

/// Striped, thread-safe pool of reusable resources
///
/// The pool owns a fixed set of stripes, each an independent sub-pool capped
/// at `max_per_stripe` live resources. A borrower is pinned to one stripe by
/// its thread id; when that stripe has no reusable idle entry and is at its
/// cap, a blocking acquire parks until another borrower returns or destroys a
/// resource on the same stripe. A background reaper destroys entries that
/// have sat idle past the configured timeout.
///
/// Handles are cheap to clone and share one underlying pool.
pub struct Pool<T: Send + 'static> {
    inner: Arc<PoolInner<T>>,
}

impl<T: Send + 'static> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool").finish_non_exhaustive()
    }
}

pub(crate) struct PoolInner<T: Send + 'static> {
    stripes: Box<[Stripe<T>]>,
    factory: Box<FactoryFn<T>>,
    destructor: Box<DestructorFn<T>>,
    config: PoolConfiguration,
    metrics: MetricsTracker,
    shutdown: Sender<()>,
}

impl<T: Send + 'static> Pool<T> {
    /// Create a pool whose resources are always eligible for reuse.
    ///
    /// The factory is invoked whenever a borrower finds no reusable idle
    /// entry and the stripe is below its cap; the destructor is invoked when
    /// a resource is retired. Both may be called concurrently from multiple
    /// threads. Fails if the configuration is invalid.
    pub fn new<F, D>(factory: F, destructor: D, config: PoolConfiguration) -> PoolResult<Self>
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
        D: Fn(T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::with_policy(factory, destructor, |resource| resource, |_| true, config)
    }

    /// Create a pool with custom reuse policy callables.
    ///
    /// `increment` advances a resource's reuse metadata once per return to
    /// the pool; `reusable` decides at borrow and reap time whether the
    /// resource may be handed out again. [`Pool::new`] and
    /// [`Pool::bounded_reuse`] are instantiations of this constructor.
    pub fn with_policy<F, D, I, R>(
        factory: F,
        destructor: D,
        increment: I,
        reusable: R,
        config: PoolConfiguration,
    ) -> PoolResult<Self>
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
        D: Fn(T) -> Result<(), BoxError> + Send + Sync + 'static,
        I: Fn(T) -> T + Send + Sync + 'static,
        R: Fn(&T) -> bool + Send + Sync + 'static,
    {
        config.validate()?;

        let increment: Arc<IncrementFn<T>> = Arc::new(increment);
        let reusable: Arc<ReusableFn<T>> = Arc::new(reusable);
        let stripes = (0..config.num_stripes)
            .map(|_| Stripe::new(Arc::clone(&increment), Arc::clone(&reusable)))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let (shutdown, shutdown_rx) = channel::bounded(1);
        let inner = Arc::new(PoolInner {
            stripes,
            factory: Box::new(factory),
            destructor: Box::new(destructor),
            config,
            metrics: MetricsTracker::new(),
            shutdown,
        });
        reaper::spawn(Arc::downgrade(&inner), shutdown_rx);

        debug!(
            num_stripes = inner.config.num_stripes,
            max_per_stripe = inner.config.max_per_stripe,
            "resource pool created"
        );
        Ok(Self { inner })
    }

    /// Borrow a resource, blocking while the caller's stripe is saturated.
    ///
    /// Returns the resource together with the stripe it was accounted
    /// against; [`put_resource`](Self::put_resource) and
    /// [`destroy_resource`](Self::destroy_resource) must go back to that same
    /// stripe. The newest reusable idle entry is preferred; worn entries are
    /// skipped but stay idle (still counted against the cap) until the next
    /// reaper sweep, so a burst of worn returns can hold capacity for up to
    /// one sweep interval.
    pub fn take_resource(&self) -> PoolResult<(T, &Stripe<T>)> {
        let stripe = self.current_stripe();
        let mut state = stripe.state.lock();
        loop {
            if let Some(resource) = state.pop_reusable(&*stripe.reusable) {
                drop(state);
                self.inner.metrics.taken.fetch_add(1, Ordering::Relaxed);
                return Ok((resource, stripe));
            }
            if state.in_use < self.inner.config.max_per_stripe {
                // Reserve capacity before constructing so racing borrowers
                // cannot oversubscribe the stripe.
                state.in_use += 1;
                drop(state);
                return self.construct(stripe).map(|resource| (resource, stripe));
            }
            stripe.available.wait(&mut state);
        }
    }

    /// Borrow a resource without blocking; `None` when the stripe is
    /// saturated.
    pub fn try_take_resource(&self) -> PoolResult<Option<(T, &Stripe<T>)>> {
        let stripe = self.current_stripe();
        let mut state = stripe.state.lock();
        if let Some(resource) = state.pop_reusable(&*stripe.reusable) {
            drop(state);
            self.inner.metrics.taken.fetch_add(1, Ordering::Relaxed);
            return Ok(Some((resource, stripe)));
        }
        if state.in_use >= self.inner.config.max_per_stripe {
            drop(state);
            self.inner
                .metrics
                .saturation_misses
                .fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }
        state.in_use += 1;
        drop(state);
        self.construct(stripe)
            .map(|resource| Some((resource, stripe)))
    }

    /// Return a borrowed resource to the stripe it was taken from.
    ///
    /// Applies the reuse-increment policy once and makes the entry the next
    /// LIFO candidate. The resource stays counted against the stripe's cap.
    pub fn put_resource(&self, stripe: &Stripe<T>, resource: T) {
        let resource = (stripe.increment)(resource);
        let mut state = stripe.state.lock();
        state.idle.push(Entry {
            resource,
            returned_at: Instant::now(),
        });
        drop(state);
        stripe.available.notify_one();
        self.inner.metrics.returned.fetch_add(1, Ordering::Relaxed);
    }

    /// Retire a borrowed resource instead of returning it.
    ///
    /// The destructor runs outside the stripe lock and its failure is
    /// suppressed; the stripe's capacity is then released and waiters are
    /// woken.
    pub fn destroy_resource(&self, stripe: &Stripe<T>, resource: T) {
        self.inner.dispose(resource);
        let mut state = stripe.state.lock();
        state.in_use -= 1;
        drop(state);
        stripe.available.notify_one();
    }

    /// Borrow a resource, run `action` on it, then release it.
    ///
    /// On success the resource returns to the idle list; if the action
    /// returns an error or panics, the resource is destroyed and the failure
    /// propagates unchanged. Every successful acquire is matched by exactly
    /// one release either way. Blocks while the caller's stripe is saturated.
    ///
    /// The action's error type must absorb [`PoolError`] so factory failures
    /// can surface through the same channel; [`BoxError`] qualifies.
    pub fn with_resource<R, E, F>(&self, action: F) -> Result<R, E>
    where
        F: FnOnce(&mut T) -> Result<R, E>,
        E: From<PoolError>,
    {
        let (resource, stripe) = self.take_resource()?;
        self.run_action(stripe, resource, action)
    }

    /// Non-blocking [`with_resource`](Self::with_resource).
    ///
    /// Returns `Ok(None)` without running the action when the caller's
    /// stripe is saturated.
    pub fn try_with_resource<R, E, F>(&self, action: F) -> Result<Option<R>, E>
    where
        F: FnOnce(&mut T) -> Result<R, E>,
        E: From<PoolError>,
    {
        match self.try_take_resource()? {
            Some((resource, stripe)) => self.run_action(stripe, resource, action).map(Some),
            None => Ok(None),
        }
    }

    /// Stop the reaper and destroy every idle resource.
    ///
    /// Resources currently borrowed are unaffected; once returned they are
    /// destroyed when the last pool handle drops. The reaper exits within one
    /// wake interval.
    pub fn close(&self) {
        let _ = self.inner.shutdown.try_send(());
        self.inner.drain_idle();
        debug!("resource pool closed");
    }

    /// Number of stripes.
    pub fn num_stripes(&self) -> usize {
        self.inner.config.num_stripes
    }

    /// Idle timeout after which the reaper destroys unused resources.
    pub fn idle_timeout(&self) -> Duration {
        self.inner.config.idle_timeout
    }

    /// Cap on live resources per stripe.
    pub fn max_per_stripe(&self) -> usize {
        self.inner.config.max_per_stripe
    }

    /// Idle entries across all stripes.
    pub fn idle_count(&self) -> usize {
        self.inner.stripes.iter().map(Stripe::idle_count).sum()
    }

    /// Live resources across all stripes (idle plus borrowed).
    pub fn in_use(&self) -> usize {
        self.inner.stripes.iter().map(Stripe::in_use).sum()
    }

    /// Get pool metrics
    pub fn metrics(&self) -> PoolMetrics {
        let capacity = self.inner.config.num_stripes * self.inner.config.max_per_stripe;
        self.inner
            .metrics
            .snapshot(self.idle_count(), self.in_use(), capacity)
    }

    /// Export metrics as a HashMap
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.metrics().export()
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.metrics(), pool_name, tags)
    }

    /// Pin the calling thread to a stripe. Deterministic per thread, so
    /// repeat borrows land on the same warm stripe.
    fn current_stripe(&self) -> &Stripe<T> {
        let stripes = &self.inner.stripes;
        if stripes.len() == 1 {
            return &stripes[0];
        }
        let mut hasher = DefaultHasher::new();
        std::thread::current().id().hash(&mut hasher);
        let index = (hasher.finish() % stripes.len() as u64) as usize;
        &stripes[index]
    }

    /// Invoke the factory for a reservation already made on `stripe`,
    /// rolling the reservation back if construction fails.
    fn construct(&self, stripe: &Stripe<T>) -> PoolResult<T> {
        match (self.inner.factory)() {
            Ok(resource) => {
                self.inner.metrics.created.fetch_add(1, Ordering::Relaxed);
                self.inner.metrics.taken.fetch_add(1, Ordering::Relaxed);
                trace!("constructed new pooled resource");
                Ok(resource)
            }
            Err(error) => {
                let mut state = stripe.state.lock();
                state.in_use -= 1;
                drop(state);
                stripe.available.notify_one();
                Err(PoolError::Factory(error))
            }
        }
    }

    fn run_action<R, E, F>(&self, stripe: &Stripe<T>, resource: T, action: F) -> Result<R, E>
    where
        F: FnOnce(&mut T) -> Result<R, E>,
    {
        let mut guard = ReleaseGuard {
            pool: self,
            stripe,
            resource: Some(resource),
        };
        let result = action(guard.resource.as_mut().expect("resource already released"));
        match result {
            Ok(value) => {
                let resource = guard.resource.take().expect("resource already released");
                self.put_resource(stripe, resource);
                Ok(value)
            }
            // The guard destroys the resource as it drops.
            Err(error) => Err(error),
        }
    }
}

impl<T: Send + 'static> PoolInner<T> {
    /// Run the user destructor, suppressing its failure. Destruction is
    /// best-effort cleanup and must not corrupt pool accounting.
    pub(crate) fn dispose(&self, resource: T) {
        self.metrics.destroyed.fetch_add(1, Ordering::Relaxed);
        if let Err(error) = (self.destructor)(resource) {
            self.metrics
                .destructor_failures
                .fetch_add(1, Ordering::Relaxed);
            warn!(error = %error, "resource destructor failed; dropping resource");
        }
    }

    /// One reaper sweep: retire idle entries that outlived the idle timeout
    /// or are no longer reusable, then wake waiters on the freed capacity.
    pub(crate) fn reap(&self, now: Instant) {
        let idle_timeout = self.config.idle_timeout;
        for stripe in self.stripes.iter() {
            let stale = {
                let mut state = stripe.state.lock();
                let drained = std::mem::take(&mut state.idle);
                let mut stale = Vec::new();
                for entry in drained {
                    let expired = now.duration_since(entry.returned_at) > idle_timeout;
                    if expired || !(stripe.reusable)(&entry.resource) {
                        stale.push(entry.resource);
                    } else {
                        state.idle.push(entry);
                    }
                }
                state.in_use -= stale.len();
                stale
            };
            if stale.is_empty() {
                continue;
            }
            stripe.available.notify_all();
            trace!(count = stale.len(), "reaped idle resources");
            self.metrics.reaped.fetch_add(stale.len(), Ordering::Relaxed);
            for resource in stale {
                self.dispose(resource);
            }
        }
    }

    /// Destroy every idle entry, releasing its capacity.
    pub(crate) fn drain_idle(&self) {
        for stripe in self.stripes.iter() {
            let drained = {
                let mut state = stripe.state.lock();
                let drained = std::mem::take(&mut state.idle);
                state.in_use -= drained.len();
                drained
            };
            if drained.is_empty() {
                continue;
            }
            stripe.available.notify_all();
            for entry in drained {
                self.dispose(entry.resource);
            }
        }
    }
}

impl<T: Send + 'static> Drop for PoolInner<T> {
    fn drop(&mut self) {
        // The shutdown sender disconnects here, which stops the reaper
        // within one wake interval.
        self.drain_idle();
    }
}

/// Guarantees the release half of the protocol: a resource whose action
/// failed or panicked is destroyed, never returned to the idle list.
struct ReleaseGuard<'a, T: Send + 'static> {
    pool: &'a Pool<T>,
    stripe: &'a Stripe<T>,
    resource: Option<T>,
}

impl<T: Send + 'static> Drop for ReleaseGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            self.pool.destroy_resource(self.stripe, resource);
        }
    }
}

/// A resource paired with its reuse counter, handed out by pools built with
/// [`Pool::bounded_reuse`]. Dereferences to the wrapped resource.
#[derive(Debug)]
pub struct Counted<T> {
    value: T,
    uses: usize,
}

impl<T> Counted<T> {
    /// How many completed borrows this resource has been through.
    pub fn uses(&self) -> usize {
        self.uses
    }

    /// Unwrap the underlying resource.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for Counted<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T> DerefMut for Counted<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.value
    }
}

impl<T: Send + 'static> Pool<Counted<T>> {
    /// Create a pool that retires each resource after `max_uses` completed
    /// borrows.
    ///
    /// The reuse counter advances once per return; a resource whose counter
    /// has reached `max_uses` is skipped by subsequent borrows and destroyed
    /// by the next reaper sweep. Shares all protocol code with [`Pool::new`].
    pub fn bounded_reuse<F, D>(
        factory: F,
        destructor: D,
        max_uses: usize,
        config: PoolConfiguration,
    ) -> PoolResult<Self>
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
        D: Fn(T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        if max_uses < 1 {
            return Err(PoolError::bad_config("max_uses", "must be at least 1"));
        }
        Pool::with_policy(
            move || factory().map(|value| Counted { value, uses: 0 }),
            move |counted: Counted<T>| destructor(counted.value),
            |mut counted| {
                counted.uses += 1;
                counted
            },
            move |counted: &Counted<T>| counted.uses < max_uses,
            config,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Barrier;
    use std::thread;

    fn small_config() -> PoolConfiguration {
        PoolConfiguration::new()
            .with_num_stripes(1)
            .with_max_per_stripe(2)
            .with_idle_timeout(Duration::from_secs(30))
    }

    /// Pool whose factory hands out 1, 2, 3, ... and whose factory/destructor
    /// invocations are counted.
    fn counting_pool(
        config: PoolConfiguration,
    ) -> (Pool<usize>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let destroyed = Arc::new(AtomicUsize::new(0));
        let factory_count = Arc::clone(&created);
        let destructor_count = Arc::clone(&destroyed);
        let pool = Pool::new(
            move || Ok(factory_count.fetch_add(1, Ordering::SeqCst) + 1),
            move |_| {
                destructor_count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            config,
        )
        .unwrap();
        (pool, created, destroyed)
    }

    #[test]
    fn warm_path_reuses_resource() {
        let (pool, created, _) = counting_pool(small_config());

        for _ in 0..2 {
            let value = pool.with_resource(|n| Ok::<_, BoxError>(*n)).unwrap();
            assert_eq!(value, 1);
        }
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.in_use(), 1);
    }

    #[test]
    fn saturation_blocks_until_release() {
        let (pool, created, _) = counting_pool(small_config());
        let both_held = Arc::new(Barrier::new(2));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let pool = pool.clone();
            let both_held = Arc::clone(&both_held);
            handles.push(thread::spawn(move || {
                pool.with_resource(|_| {
                    both_held.wait();
                    thread::sleep(Duration::from_millis(100));
                    Ok::<_, BoxError>(())
                })
                .unwrap();
            }));
        }

        // Give both holders time to saturate the stripe, then block behind
        // them until one returns.
        thread::sleep(Duration::from_millis(30));
        pool.with_resource(|_| Ok::<_, BoxError>(())).unwrap();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_action_destroys_resource() {
        let (pool, _, destroyed) = counting_pool(small_config());

        let result = pool.with_resource(|_| Err::<(), BoxError>("boom".into()));
        assert_eq!(result.unwrap_err().to_string(), "boom");

        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_action_destroys_resource() {
        let (pool, created, destroyed) = counting_pool(small_config());

        let worker = pool.clone();
        let result = thread::spawn(move || {
            worker.with_resource(|_| -> Result<(), BoxError> { panic!("action blew up") })
        })
        .join();
        assert!(result.is_err());

        assert_eq!(pool.in_use(), 0);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);

        // The pool stays usable after the unwind.
        pool.with_resource(|n| Ok::<_, BoxError>(*n)).unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn bounded_reuse_retires_worn_resources() {
        let created = Arc::new(AtomicUsize::new(0));
        let destroyed = Arc::new(AtomicUsize::new(0));
        let factory_count = Arc::clone(&created);
        let destructor_count = Arc::clone(&destroyed);
        let pool = Pool::bounded_reuse(
            move || Ok(factory_count.fetch_add(1, Ordering::SeqCst) + 1),
            move |_| {
                destructor_count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            3,
            small_config(),
        )
        .unwrap();

        let mut seen = Vec::new();
        for _ in 0..6 {
            let value = pool
                .with_resource(|counted| Ok::<_, BoxError>(**counted))
                .unwrap();
            seen.push(value);
        }

        // Three borrows per resource before it is retired.
        assert_eq!(seen, vec![1, 1, 1, 2, 2, 2]);
        assert_eq!(created.load(Ordering::SeqCst), 2);

        pool.close();
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(destroyed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reuse_counter_advances_once_per_return() {
        let pool = Pool::bounded_reuse(|| Ok(0u32), |_| Ok(()), 5, small_config()).unwrap();

        let (counted, stripe) = pool.take_resource().unwrap();
        assert_eq!(counted.uses(), 0);
        pool.put_resource(stripe, counted);

        let (counted, stripe) = pool.take_resource().unwrap();
        assert_eq!(counted.uses(), 1);
        pool.put_resource(stripe, counted);
    }

    #[test]
    fn try_with_resource_when_saturated() {
        let config = small_config().with_max_per_stripe(1);
        let (pool, created, _) = counting_pool(config);

        let (resource, stripe) = pool.take_resource().unwrap();

        let ran = AtomicBool::new(false);
        let result = pool
            .try_with_resource(|_| {
                ran.store(true, Ordering::SeqCst);
                Ok::<_, BoxError>(())
            })
            .unwrap();
        assert!(result.is_none());
        assert!(!ran.load(Ordering::SeqCst));

        pool.put_resource(stripe, resource);
        let result = pool.try_with_resource(|_| Ok::<_, BoxError>(())).unwrap();
        assert!(result.is_some());
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn factory_failure_releases_reservation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let factory_calls = Arc::clone(&calls);
        let pool = Pool::new(
            move || {
                let call = factory_calls.fetch_add(1, Ordering::SeqCst) + 1;
                if call == 2 {
                    Err("factory down".into())
                } else {
                    Ok(call)
                }
            },
            |_| Ok(()),
            small_config().with_max_per_stripe(1),
        )
        .unwrap();

        let (resource, stripe) = pool.take_resource().unwrap();
        pool.destroy_resource(stripe, resource);

        let err = pool.take_resource().unwrap_err();
        assert!(matches!(err, PoolError::Factory(_)));
        assert_eq!(pool.in_use(), 0);

        // The failed reservation was rolled back, so the cap is free again.
        let (resource, stripe) = pool.take_resource().unwrap();
        assert_eq!(resource, 3);
        pool.put_resource(stripe, resource);
    }

    #[test]
    fn lifo_prefers_most_recent_return() {
        let (pool, _, _) = counting_pool(small_config());

        let (first, first_stripe) = pool.take_resource().unwrap();
        let (second, second_stripe) = pool.take_resource().unwrap();
        assert_eq!((first, second), (1, 2));

        pool.put_resource(first_stripe, first);
        pool.put_resource(second_stripe, second);

        let (warmest, stripe) = pool.take_resource().unwrap();
        assert_eq!(warmest, 2);
        pool.put_resource(stripe, warmest);
    }

    #[test]
    fn drop_destroys_idle_resources() {
        let (pool, created, destroyed) = counting_pool(small_config());
        pool.with_resource(|_| Ok::<_, BoxError>(())).unwrap();

        drop(pool);
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn destructor_failure_is_suppressed() {
        let pool = Pool::new(
            || Ok(0u32),
            |_| Err::<(), BoxError>("destructor refused".into()),
            small_config(),
        )
        .unwrap();

        let (resource, stripe) = pool.take_resource().unwrap();
        pool.destroy_resource(stripe, resource);

        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.metrics().destructor_failures, 1);

        // Accounting is intact, so the pool keeps working.
        pool.with_resource(|_| Ok::<_, BoxError>(())).unwrap();
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let result = Pool::new(
            || Ok(0u32),
            |_| Ok(()),
            PoolConfiguration::new().with_num_stripes(0),
        );
        assert!(matches!(
            result.unwrap_err(),
            PoolError::InvalidConfiguration {
                parameter: "num_stripes",
                ..
            }
        ));

        let result = Pool::bounded_reuse(|| Ok(0u32), |_| Ok(()), 0, small_config());
        assert!(matches!(
            result.unwrap_err(),
            PoolError::InvalidConfiguration {
                parameter: "max_uses",
                ..
            }
        ));
    }

    #[test]
    fn metrics_track_the_resource_lifecycle() {
        let (pool, _, _) = counting_pool(small_config().with_max_per_stripe(1));

        pool.with_resource(|_| Ok::<_, BoxError>(())).unwrap();
        let (resource, stripe) = pool.take_resource().unwrap();
        assert!(pool.try_take_resource().unwrap().is_none());
        pool.destroy_resource(stripe, resource);

        let metrics = pool.metrics();
        assert_eq!(metrics.resources_created, 1);
        assert_eq!(metrics.total_taken, 2);
        assert_eq!(metrics.total_returned, 1);
        assert_eq!(metrics.saturation_misses, 1);
        assert_eq!(metrics.resources_destroyed, 1);
        assert_eq!(metrics.in_use_resources, 0);
        assert_eq!(metrics.max_capacity, 1);
    }

    #[test]
    fn accessors_expose_configuration() {
        let (pool, _, _) = counting_pool(
            PoolConfiguration::new()
                .with_num_stripes(3)
                .with_max_per_stripe(5)
                .with_idle_timeout(Duration::from_secs(7)),
        );
        assert_eq!(pool.num_stripes(), 3);
        assert_eq!(pool.max_per_stripe(), 5);
        assert_eq!(pool.idle_timeout(), Duration::from_secs(7));
    }

    #[test]
    fn concurrent_accounting_invariants() {
        let config = PoolConfiguration::new()
            .with_num_stripes(4)
            .with_max_per_stripe(3)
            .with_idle_timeout(Duration::from_millis(500));
        let (pool, created, destroyed) = counting_pool(config);

        let mut handles = Vec::new();
        for worker in 0..8usize {
            let pool = pool.clone();
            handles.push(thread::spawn(move || {
                for iteration in 0..50usize {
                    let should_fail = (worker + iteration) % 7 == 0;
                    let result = pool.with_resource(|_| {
                        if should_fail {
                            Err::<(), BoxError>("simulated action failure".into())
                        } else {
                            Ok(())
                        }
                    });
                    assert_eq!(result.is_err(), should_fail);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Nothing is borrowed any more, so per stripe the live count equals
        // the idle count and never exceeds the cap.
        for stripe in pool.inner.stripes.iter() {
            let state = stripe.state.lock();
            assert!(state.in_use <= 3);
            assert_eq!(state.in_use, state.idle.len());
        }

        pool.close();
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(
            created.load(Ordering::SeqCst),
            destroyed.load(Ordering::SeqCst)
        );
    }
}
