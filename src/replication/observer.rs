//! Change Observers
//!
//! Registration returns an [`ObserverToken`]; the same token unregisters.
//! Observers run synchronously, in registration order, with
//! `(previous, current)`.

/// Callback invoked with `(previous, current)` on every committed change.
pub type Observer<T> = Box<dyn FnMut(&T, &T) + Send>;

/// Cancellation token returned by [`ObserverRegistry::register`].
///
/// Tokens are unique per registry and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverToken(u64);

impl ObserverToken {
    /// Raw token value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Ordered set of observers for one replicated value.
pub struct ObserverRegistry<T> {
    next_token: u64,
    observers: Vec<(ObserverToken, Observer<T>)>,
}

impl<T> ObserverRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            next_token: 0,
            observers: Vec::new(),
        }
    }

    /// Register an observer.
    pub fn register(&mut self, observer: Observer<T>) -> ObserverToken {
        let token = ObserverToken(self.next_token);
        self.next_token += 1;
        self.observers.push((token, observer));
        token
    }

    /// Unregister an observer. Returns false for unknown or already
    /// cancelled tokens.
    pub fn unregister(&mut self, token: ObserverToken) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(t, _)| *t != token);
        self.observers.len() != before
    }

    /// Invoke every observer with `(previous, current)`.
    pub fn notify(&mut self, previous: &T, current: &T) {
        for (_, observer) in self.observers.iter_mut() {
            observer(previous, current);
        }
    }

    /// Number of live observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// True when no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl<T> Default for ObserverRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ObserverRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_notify_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry: ObserverRegistry<i32> = ObserverRegistry::new();

        let s1 = Arc::clone(&seen);
        registry.register(Box::new(move |_, cur| s1.lock().unwrap().push(("a", *cur))));
        let s2 = Arc::clone(&seen);
        registry.register(Box::new(move |_, cur| s2.lock().unwrap().push(("b", *cur))));

        registry.notify(&1, &2);
        assert_eq!(*seen.lock().unwrap(), vec![("a", 2), ("b", 2)]);
    }

    #[test]
    fn test_unregister_is_symmetric() {
        let mut registry: ObserverRegistry<i32> = ObserverRegistry::new();
        let token = registry.register(Box::new(|_, _| {}));
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister(token));
        assert!(registry.is_empty());

        // Second cancel is a no-op
        assert!(!registry.unregister(token));
    }

    #[test]
    fn test_tokens_not_reused() {
        let mut registry: ObserverRegistry<i32> = ObserverRegistry::new();
        let t1 = registry.register(Box::new(|_, _| {}));
        registry.unregister(t1);
        let t2 = registry.register(Box::new(|_, _| {}));
        assert_ne!(t1, t2);
    }
}
