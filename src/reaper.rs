//! Background task that retires expired or worn-out idle resources

use std::sync::Weak;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError};
use tracing::debug;

use crate::pool::PoolInner;

/// Fixed wake interval. A resource may therefore outlive its idle timeout by
/// up to one interval before it is destroyed.
pub(crate) const REAP_INTERVAL: Duration = Duration::from_secs(1);

/// Start the reaper thread for a pool.
///
/// The thread holds only a weak reference, so it never keeps the pool alive;
/// it exits when the shutdown channel is signalled or disconnects (the pool
/// was closed or dropped), or when the weak reference stops upgrading.
pub(crate) fn spawn<T: Send + 'static>(pool: Weak<PoolInner<T>>, shutdown: Receiver<()>) {
    thread::spawn(move || run(pool, shutdown));
}

fn run<T: Send + 'static>(pool: Weak<PoolInner<T>>, shutdown: Receiver<()>) {
    loop {
        match shutdown.recv_timeout(REAP_INTERVAL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        let Some(pool) = pool.upgrade() else { break };
        pool.reap(Instant::now());
    }
    debug!("resource pool reaper stopped");
}
