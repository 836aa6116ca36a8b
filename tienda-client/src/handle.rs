//! Cancellation handles for long-lived registrations.

use std::fmt;

/// Cancels a registration (session listener, provider callback, store query).
///
/// Cancellation runs at most once: either through [`cancel`](Self::cancel)
/// or when the handle is dropped. Use [`detach`](Self::detach) to keep the
/// registration alive for the rest of the process.
pub struct CancelHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl CancelHandle {
    /// Wrap the function that undoes a registration.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to cancel.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Cancel the registration now.
    pub fn cancel(mut self) {
        self.run();
    }

    /// Give up the ability to cancel; the registration stays in place.
    pub fn detach(mut self) {
        self.cancel = None;
    }

    /// Whether cancelling would still do something.
    pub fn is_armed(&self) -> bool {
        self.cancel.is_some()
    }

    fn run(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("armed", &self.is_armed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting() -> (CancelHandle, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handle = CancelHandle::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (handle, count)
    }

    #[test]
    fn cancel_runs_once() {
        let (handle, count) = counting();
        handle.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_cancels() {
        let (handle, count) = counting();
        drop(handle);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detach_keeps_registration() {
        let (handle, count) = counting();
        handle.detach();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn noop_is_not_armed() {
        assert!(!CancelHandle::noop().is_armed());
    }
}
