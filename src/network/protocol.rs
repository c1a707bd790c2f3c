//! Wire Protocol
//!
//! Messages exchanged over a participant link. Frames are bincode on the
//! wire; JSON is kept for debug dumps.
//!
//! Enums here stay externally tagged: bincode cannot decode
//! `#[serde(tag = "...")]` representations.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::events::{RemoteCall, Replication};
use crate::game::state::ClientId;

/// Wire protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Codec failure.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("binary codec: {0}")]
    Binary(#[from] bincode::Error),

    #[error("json codec: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// CLIENT -> HOST
// =============================================================================

/// Messages from a client to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// First message on a new link.
    Hello {
        protocol_version: u32,
    },
    /// Remote call for the host to execute.
    Call(RemoteCall),
    /// Orderly disconnect.
    Goodbye,
}

// =============================================================================
// HOST -> CLIENT
// =============================================================================

/// Messages from the host to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostMessage {
    /// Accepts the connection.
    Welcome {
        client_id: ClientId,
        /// Session UUID bytes
        session_id: [u8; 16],
        /// Scene the host is running
        scene: String,
        protocol_version: u32,
    },
    /// Committed change fan-out.
    Replicate(Replication),
    /// Host is going away.
    Shutdown,
}

// =============================================================================
// CODEC
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Serialize to a binary frame.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from a binary frame.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        Ok(bincode::deserialize(data)?)
    }
}

impl HostMessage {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Serialize to a binary frame.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from a binary frame.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        Ok(bincode::deserialize(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::color::Color;
    use crate::core::vec3::Vec3;
    use crate::game::authority::{FieldUpdate, FieldValue};
    use crate::game::state::{EntityId, EntityState};

    #[test]
    fn test_call_binary_frame() {
        let msg = ClientMessage::Call(RemoteCall::RequestMovement {
            entity: EntityId(3),
            move_delta: Vec3::new(0.1, 0.0, 0.5),
            rotate_delta: Vec3::new(0.0, -1.0, 0.0),
        });

        let bytes = msg.to_bytes().unwrap();
        assert_eq!(ClientMessage::from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_spawn_snapshot_binary_frame() {
        let entity = EntityState::new(EntityId(2), 9, Vec3::new(1.0, 0.0, -2.0), Color::BLUE, 50, 1, 30.0);
        let msg = HostMessage::Replicate(Replication::EntitySpawned(entity.snapshot()));

        let bytes = msg.to_bytes().unwrap();
        assert_eq!(HostMessage::from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_field_update_json() {
        let msg = HostMessage::Replicate(Replication::Field(FieldUpdate {
            entity: EntityId(1),
            seq: 4,
            value: FieldValue::Score(49),
        }));

        let json = msg.to_json().unwrap();
        assert!(json.contains("Score"));
        assert_eq!(HostMessage::from_json(&json).unwrap(), msg);
    }

    #[test]
    fn test_garbage_frame_is_error() {
        let result = HostMessage::from_bytes(&[0xff, 0xff, 0xff, 0xff, 0x01]);
        assert!(matches!(result, Err(ProtocolError::Binary(_))));
    }
}
