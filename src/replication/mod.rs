//! Replication Layer
//!
//! Authoritative values with change notification, the building block for
//! every piece of synchronized entity state.
//!
//! - `var`: `ReplicatedVar<T>`, host-only assignment, sequenced mirrors
//! - `observer`: observer registry and cancellation tokens

pub mod observer;
pub mod var;

pub use observer::{Observer, ObserverRegistry, ObserverToken};
pub use var::{ReplicatedVar, Sequenced, VarChange};
