//! Replicated Variable
//!
//! An authoritative value with change notification. The host assigns it;
//! every participant reads it. Each committed change bumps a per-variable
//! sequence number that mirrors use to apply updates in host order.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::game::authority::ProcessRole;
use crate::replication::observer::{Observer, ObserverRegistry, ObserverToken};

/// A committed change, as produced on the host.
#[derive(Clone, Debug, PartialEq)]
pub struct VarChange<T> {
    /// Sequence number of this change (starts at 1)
    pub seq: u64,
    /// Value before the change
    pub previous: T,
    /// Value after the change
    pub current: T,
}

/// A value paired with the sequence number it was committed at.
///
/// Spawn snapshots carry these so mirrors start at the host's sequence.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sequenced<T> {
    pub seq: u64,
    pub value: T,
}

/// Authoritative value container.
///
/// On the host, [`ReplicatedVar::assign`] commits and notifies synchronously.
/// On clients the same type is a read-only mirror fed by
/// [`ReplicatedVar::apply_remote`].
#[derive(Debug)]
pub struct ReplicatedVar<T> {
    value: T,
    seq: u64,
    observers: ObserverRegistry<T>,
}

impl<T: Clone + PartialEq> ReplicatedVar<T> {
    /// Create a variable holding its default value (sequence 0).
    pub fn new(value: T) -> Self {
        Self::mirror(value, 0)
    }

    /// Create a mirror from a host snapshot taken at `seq`.
    pub fn mirror(value: T, seq: u64) -> Self {
        Self {
            value,
            seq,
            observers: ObserverRegistry::new(),
        }
    }

    /// Create a mirror from a sequenced snapshot value.
    pub fn from_sequenced(snapshot: Sequenced<T>) -> Self {
        Self::mirror(snapshot.value, snapshot.seq)
    }

    /// Current value with its sequence number.
    pub fn sequenced(&self) -> Sequenced<T> {
        Sequenced {
            seq: self.seq,
            value: self.value.clone(),
        }
    }

    /// Current value.
    #[inline]
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Sequence number of the last applied change.
    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Assign a new value.
    ///
    /// Only the host process role may assign; anything else is dropped
    /// without surfacing. Assigning the current value is not a change.
    /// Outside this crate, writes go through `Authority::request_mutation`.
    pub(crate) fn assign(&mut self, role: ProcessRole, value: T) -> Option<VarChange<T>> {
        if !role.is_authority() {
            trace!(seq = self.seq, "dropped assignment from non-authoritative process");
            return None;
        }
        if value == self.value {
            return None;
        }

        let previous = std::mem::replace(&mut self.value, value);
        self.seq += 1;
        self.observers.notify(&previous, &self.value);

        Some(VarChange {
            seq: self.seq,
            previous,
            current: self.value.clone(),
        })
    }

    /// Apply an update received from the host.
    ///
    /// Returns false for stale or duplicate sequence numbers, which are
    /// dropped without notifying.
    pub fn apply_remote(&mut self, seq: u64, value: T) -> bool {
        if seq <= self.seq {
            trace!(seq, applied = self.seq, "dropped stale replicated update");
            return false;
        }

        let previous = std::mem::replace(&mut self.value, value);
        self.seq = seq;
        self.observers.notify(&previous, &self.value);
        true
    }

    /// Register a change observer.
    pub fn observe<F>(&mut self, observer: F) -> ObserverToken
    where
        F: FnMut(&T, &T) + Send + 'static,
    {
        let boxed: Observer<T> = Box::new(observer);
        self.observers.register(boxed)
    }

    /// Cancel an observer registration.
    pub fn unobserve(&mut self, token: ObserverToken) -> bool {
        self.observers.unregister(token)
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};

    fn recorder<T: Clone + Send + 'static>(
        var: &mut ReplicatedVar<T>,
    ) -> (ObserverToken, Arc<Mutex<Vec<(T, T)>>>)
    where
        T: PartialEq,
    {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let token = var.observe(move |prev: &T, cur: &T| {
            sink.lock().unwrap().push((prev.clone(), cur.clone()));
        });
        (token, seen)
    }

    #[test]
    fn test_host_assign_notifies_synchronously() {
        let mut score = ReplicatedVar::new(50);
        let (_, seen) = recorder(&mut score);

        let change = score.assign(ProcessRole::Host, 49).unwrap();
        assert_eq!(change, VarChange { seq: 1, previous: 50, current: 49 });
        assert_eq!(*score.get(), 49);
        assert_eq!(*seen.lock().unwrap(), vec![(50, 49)]);
    }

    #[test]
    fn test_client_assign_is_dropped() {
        let mut score = ReplicatedVar::new(50);
        let (_, seen) = recorder(&mut score);

        assert!(score.assign(ProcessRole::Client, 5).is_none());
        assert_eq!(*score.get(), 50);
        assert_eq!(score.seq(), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_equal_value_is_not_a_change() {
        let mut score = ReplicatedVar::new(50);
        let (_, seen) = recorder(&mut score);

        assert!(score.assign(ProcessRole::Host, 50).is_none());
        assert_eq!(score.seq(), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_mirror_drops_stale_updates() {
        let mut mirror = ReplicatedVar::mirror(10, 3);
        let (_, seen) = recorder(&mut mirror);

        assert!(!mirror.apply_remote(3, 11));
        assert!(!mirror.apply_remote(2, 12));
        assert!(mirror.apply_remote(4, 13));
        assert_eq!(*mirror.get(), 13);
        assert_eq!(*seen.lock().unwrap(), vec![(10, 13)]);
    }

    #[test]
    fn test_unobserve_stops_notifications() {
        let mut var = ReplicatedVar::new(0u8);
        let (token, seen) = recorder(&mut var);

        var.assign(ProcessRole::Host, 1);
        assert!(var.unobserve(token));
        var.assign(ProcessRole::Host, 2);

        assert_eq!(*seen.lock().unwrap(), vec![(0, 1)]);
        assert_eq!(var.observer_count(), 0);
    }

    proptest! {
        #[test]
        fn prop_mirror_converges_with_one_notification_per_change(
            values in proptest::collection::vec(-100i32..100, 0..64)
        ) {
            let mut host = ReplicatedVar::new(50);
            let mut mirror = ReplicatedVar::mirror(*host.get(), host.seq());
            let (_, host_seen) = recorder(&mut host);
            let (_, mirror_seen) = recorder(&mut mirror);

            // Host issues, link delivers FIFO
            let mut in_flight = Vec::new();
            for v in &values {
                if let Some(change) = host.assign(ProcessRole::Host, *v) {
                    in_flight.push(change);
                }
            }
            for change in &in_flight {
                prop_assert!(mirror.apply_remote(change.seq, change.current));
            }

            prop_assert_eq!(mirror.get(), host.get());
            prop_assert_eq!(mirror.seq(), host.seq());

            let host_seen = host_seen.lock().unwrap().clone();
            let mirror_seen = mirror_seen.lock().unwrap().clone();
            prop_assert_eq!(host_seen.len(), in_flight.len());
            prop_assert_eq!(&host_seen, &mirror_seen);
        }

        #[test]
        fn prop_duplicate_delivery_is_idempotent(
            values in proptest::collection::vec(0u8..4, 1..32)
        ) {
            let mut host = ReplicatedVar::new(0u8);
            let mut mirror = ReplicatedVar::mirror(0u8, 0);
            let (_, mirror_seen) = recorder(&mut mirror);

            let changes: Vec<_> = values
                .iter()
                .filter_map(|v| host.assign(ProcessRole::Host, *v))
                .collect();

            for change in &changes {
                mirror.apply_remote(change.seq, change.current);
                // Redelivery of the same frame
                prop_assert!(!mirror.apply_remote(change.seq, change.current));
            }

            prop_assert_eq!(mirror.get(), host.get());
            prop_assert_eq!(mirror_seen.lock().unwrap().len(), changes.len());
        }
    }
}
