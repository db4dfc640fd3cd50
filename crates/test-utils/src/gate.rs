use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// One-shot latch for holding jobs (and therefore workers) until a test
/// releases them.
///
/// Cloning is cheap; all clones share the same state.
#[derive(Clone, Default)]
pub struct Gate {
    inner: Arc<(Mutex<GateState>, Condvar)>,
}

#[derive(Default)]
struct GateState {
    open: bool,
    waiting: usize,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until [`Gate::open`] is called.
    pub fn wait(&self) {
        let (lock, cvar) = &*self.inner;
        let mut state = lock.lock().unwrap();
        state.waiting += 1;
        cvar.notify_all();
        while !state.open {
            state = cvar.wait(state).unwrap();
        }
        state.waiting -= 1;
    }

    pub fn open(&self) {
        let (lock, cvar) = &*self.inner;
        lock.lock().unwrap().open = true;
        cvar.notify_all();
    }

    /// Block until at least `n` threads are parked in [`Gate::wait`].
    ///
    /// Returns `false` if that does not happen within `timeout`.
    pub fn wait_for_waiters(&self, n: usize, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let state = lock.lock().unwrap();
        let (state, _) = cvar
            .wait_timeout_while(state, timeout, |s| s.waiting < n && !s.open)
            .unwrap();
        state.waiting >= n
    }
}

/// Opens its gate when dropped.
///
/// Captured by a job body, it opens the gate either when the job runs (and
/// the body is consumed) or when the scheduler drops the job unrun.
pub struct OpenOnDrop(Gate);

impl Drop for OpenOnDrop {
    fn drop(&mut self) {
        self.0.open();
    }
}

impl Gate {
    pub fn open_on_drop(&self) -> OpenOnDrop {
        OpenOnDrop(self.clone())
    }
}
