use std::fmt::Debug;
use std::sync::{Arc, Mutex};

/// Thread-safe, append-only log of events recorded from inside jobs.
#[derive(Debug, Clone)]
pub struct ExecutionLog<T> {
    entries: Arc<Mutex<Vec<T>>>,
}

impl<T> Default for ExecutionLog<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone + Debug + PartialEq> ExecutionLog<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: T) {
        self.entries.lock().unwrap().push(entry);
    }

    /// Closure that records `entry` when called; handy as a job body.
    pub fn recorder(&self, entry: T) -> impl FnOnce() + Send + 'static
    where
        T: Send + 'static,
    {
        let log = self.clone();
        move || log.record(entry)
    }

    pub fn entries(&self) -> Vec<T> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of the first occurrence of `entry`.
    pub fn position(&self, entry: &T) -> Option<usize> {
        self.entries.lock().unwrap().iter().position(|e| e == entry)
    }

    /// Panics unless `first` was recorded before `second`.
    pub fn assert_before(&self, first: &T, second: &T) {
        let a = self
            .position(first)
            .unwrap_or_else(|| panic!("{first:?} was never recorded: {:?}", self.entries()));
        let b = self
            .position(second)
            .unwrap_or_else(|| panic!("{second:?} was never recorded: {:?}", self.entries()));
        assert!(
            a < b,
            "expected {first:?} before {second:?}, got {:?}",
            self.entries()
        );
    }
}
