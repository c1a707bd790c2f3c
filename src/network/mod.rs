//! Network Layer
//!
//! Session bootstrap, participant sessions, the wire protocol and the
//! loopback transport. Game rules live in `game/`; this layer moves intent
//! to the host and committed state back out.

pub mod bootstrap;
pub mod protocol;
pub mod session;
pub mod transport;

pub use bootstrap::{Bootstrap, BootstrapError, ConnectionForm, validate_settings};
pub use protocol::{ClientMessage, HostMessage, ProtocolError, PROTOCOL_VERSION};
pub use session::{Participant, SessionContext, SessionError, StepReport};
pub use transport::{link_pair, ClientLink, HostLink, LocalNetwork, TransportError};
