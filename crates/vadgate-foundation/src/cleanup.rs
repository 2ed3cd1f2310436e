use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};

type CleanupFn = Box<dyn FnOnce() + Send>;

/// Ordered registry of idempotent resource release actions.
///
/// Every acquired resource registers exactly one release action. `run_all`
/// drains the registry, so each action runs at most once even if teardown is
/// requested from several places; a panicking action never prevents the rest
/// from running.
#[derive(Default)]
pub struct CleanupRegistry {
    actions: Mutex<Vec<CleanupFn>>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self {
            actions: Mutex::new(Vec::new()),
        }
    }

    pub fn register(&self, action: impl FnOnce() + Send + 'static) {
        self.actions.lock().push(Box::new(action));
    }

    /// Run and drop every registered action, in registration order.
    pub fn run_all(&self) {
        let actions: Vec<CleanupFn> = std::mem::take(&mut *self.actions.lock());
        for action in actions {
            if catch_unwind(AssertUnwindSafe(action)).is_err() {
                tracing::warn!("Cleanup action panicked; continuing with remaining actions");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.actions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.lock().is_empty()
    }
}
