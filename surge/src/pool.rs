use std::sync::{Arc, Mutex};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// A virtual-user slot lent out for exactly one iteration. The slot returns
/// to the idle set when the lease drops, so a worker is reclaimed even if
/// its iteration panics or is force-cancelled mid-flight.
#[derive(Debug)]
pub(crate) struct WorkerLease {
    id: usize,
    pool: Arc<WorkerPool>,
}

impl WorkerLease {
    pub fn id(&self) -> usize {
        self.id
    }
}

impl Drop for WorkerLease {
    fn drop(&mut self) {
        self.pool.release(self.id);
    }
}

/// Bounded, elastic pool of virtual users.
///
/// `preallocated` workers are created eagerly; beyond that the pool grows
/// lazily, one worker per unsatisfied acquire, up to `max`. At the cap,
/// `try_acquire` returns `None` and the caller drops the tick — the pool
/// must never make the arrival clock wait for a free worker.
#[derive(Debug)]
pub(crate) struct WorkerPool {
    state: Mutex<PoolState>,
    max: usize,
}

#[derive(Debug)]
struct PoolState {
    idle: Vec<usize>,
    live: usize,
}

impl WorkerPool {
    pub fn new(preallocated: usize, max: usize) -> Self {
        debug_assert!(preallocated > 0 && max >= preallocated);
        Self {
            state: Mutex::new(PoolState {
                idle: (0..preallocated).collect(),
                live: preallocated,
            }),
            max,
        }
    }

    /// Non-blocking. `None` means the pool is exhausted and the tick is to
    /// be dropped, not queued.
    pub fn try_acquire(self: &Arc<Self>) -> Option<WorkerLease> {
        let mut state = self.state.lock().unwrap();
        let id = match state.idle.pop() {
            Some(id) => id,
            None if state.live < self.max => {
                let id = state.live;
                state.live += 1;
                trace!(id, live = state.live, "pool grew");
                id
            }
            None => return None,
        };
        drop(state);
        Some(WorkerLease {
            id,
            pool: self.clone(),
        })
    }

    fn release(&self, id: usize) {
        self.state.lock().unwrap().idle.push(id);
    }

    /// Workers ever created. Never exceeds the cap, never shrinks until
    /// shutdown.
    pub fn live(&self) -> usize {
        self.state.lock().unwrap().live
    }

    pub fn idle(&self) -> usize {
        self.state.lock().unwrap().idle.len()
    }

    /// Discards the idle set at run teardown. Only called once every lease
    /// has been returned.
    pub fn drain(&self) {
        let mut state = self.state.lock().unwrap();
        let dropped = state.idle.len();
        state.idle.clear();
        state.live = 0;
        trace!(dropped, "pool drained");
    }
}
