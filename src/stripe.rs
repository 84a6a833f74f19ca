//! Per-stripe state: the independent sub-pools borrowers are pinned to

use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

/// Advances a resource's reuse metadata on each return to the pool.
pub(crate) type IncrementFn<T> = dyn Fn(T) -> T + Send + Sync;

/// Decides whether a resource may be handed out again.
pub(crate) type ReusableFn<T> = dyn Fn(&T) -> bool + Send + Sync;

/// An idle resource together with the moment it was returned.
pub(crate) struct Entry<T> {
    pub(crate) resource: T,
    pub(crate) returned_at: Instant,
}

pub(crate) struct StripeState<T> {
    /// Idle entries, newest at the back. Order must be preserved so the next
    /// borrow prefers the warmest resource.
    pub(crate) idle: Vec<Entry<T>>,

    /// Live resources counted against this stripe's cap, idle and borrowed
    /// alike. Always `>= idle.len()`.
    pub(crate) in_use: usize,
}

impl<T> StripeState<T> {
    /// Take the newest idle entry that is still reusable. Skipped worn
    /// entries stay in place for the reaper to destroy.
    pub(crate) fn pop_reusable(&mut self, reusable: &ReusableFn<T>) -> Option<T> {
        let position = self.idle.iter().rposition(|entry| reusable(&entry.resource))?;
        Some(self.idle.remove(position).resource)
    }
}

/// One independent sub-pool of a [`Pool`](crate::Pool).
///
/// Borrowers are pinned to a stripe by hashing their thread id, so repeat
/// borrows from the same thread tend to hit the same warm stripe. Stripes
/// never share or steal resources from each other. A blocking or non-blocking
/// take hands out a reference to the stripe the resource came from; returns
/// and destroys must go back through it.
pub struct Stripe<T> {
    pub(crate) state: Mutex<StripeState<T>>,
    pub(crate) available: Condvar,
    pub(crate) increment: Arc<IncrementFn<T>>,
    pub(crate) reusable: Arc<ReusableFn<T>>,
}

impl<T> std::fmt::Debug for Stripe<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stripe").finish_non_exhaustive()
    }
}

impl<T> Stripe<T> {
    pub(crate) fn new(increment: Arc<IncrementFn<T>>, reusable: Arc<ReusableFn<T>>) -> Self {
        Self {
            state: Mutex::new(StripeState {
                idle: Vec::new(),
                in_use: 0,
            }),
            available: Condvar::new(),
            increment,
            reusable,
        }
    }

    /// Number of idle entries currently held by this stripe.
    pub fn idle_count(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// Live resources counted against this stripe's cap (idle plus borrowed).
    pub fn in_use(&self) -> usize {
        self.state.lock().in_use
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(resource: u32) -> Entry<u32> {
        Entry {
            resource,
            returned_at: Instant::now(),
        }
    }

    #[test]
    fn pop_reusable_prefers_newest_and_skips_worn_entries() {
        let mut state = StripeState {
            idle: vec![entry(1), entry(2), entry(3)],
            in_use: 3,
        };
        let odd_only: &ReusableFn<u32> = &|resource| resource % 2 == 1;

        // Newest-first: 3 is reusable and popped ahead of 1.
        assert_eq!(state.pop_reusable(odd_only), Some(3));
        assert_eq!(state.pop_reusable(odd_only), Some(1));

        // The worn entry is skipped but kept for the reaper.
        assert_eq!(state.pop_reusable(odd_only), None);
        assert_eq!(state.idle.len(), 1);
        assert_eq!(state.idle[0].resource, 2);
    }
}
