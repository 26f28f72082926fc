use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Change, EntityId, MessageError};

/// A message exchanged between the Authority and a Dependent
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "camelCase")]
pub enum Message {
    /// One-time handshake carrying the full schema and the full Root subtree
    Init { schema: Vec<Value>, root: Value },
    /// Subscribes the sender to changes of `entity_id` within `depth` levels
    #[serde(rename_all = "camelCase")]
    Register { entity_id: EntityId, depth: i32 },
    /// Announces a class fragment
    AddSchema { fragment: Value },
    /// A single graph mutation
    Change(Change),
    /// Asks for the shallow record of `entity_id`
    #[serde(rename_all = "camelCase")]
    Fetch { entity_id: EntityId },
    /// Shallow record answering a `Fetch`
    Snapshot { record: Value },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Init { .. } => "init",
            Message::Register { .. } => "register",
            Message::AddSchema { .. } => "addSchema",
            Message::Change(_) => "change",
            Message::Fetch { .. } => "fetch",
            Message::Snapshot { .. } => "snapshot",
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, MessageError> {
        serde_json::to_vec(self).map_err(|error| MessageError::Encode {
            kind: self.kind(),
            reason: error.to_string(),
        })
    }

    pub fn from_bytes(payload: &[u8]) -> Result<Self, MessageError> {
        serde_json::from_slice(payload).map_err(|error| MessageError::Decode {
            payload_size: payload.len(),
            reason: error.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn register_uses_wire_names() {
        let message = Message::Register {
            entity_id: EntityId::new("Root"),
            depth: -1,
        };
        let encoded: Value = serde_json::from_slice(&message.to_bytes().unwrap()).unwrap();
        assert_eq!(
            encoded,
            json!({ "kind": "register", "body": { "entityId": "Root", "depth": -1 } })
        );
    }

    #[test]
    fn change_body_is_the_bare_change() {
        let payload = json!({
            "kind": "change",
            "body": { "item": "Browser-1", "name": "x", "type": "update", "newValue": 0.3 }
        });
        let message = Message::from_bytes(payload.to_string().as_bytes()).unwrap();
        let Message::Change(change) = message else {
            panic!("expected a change, got {:?}", message);
        };
        assert_eq!(change.item(), "Browser-1");
        assert_eq!(change.property(), "x");
    }

    #[test]
    fn malformed_payload_reports_its_size() {
        let error = Message::from_bytes(b"{\"kind\":").unwrap_err();
        assert!(matches!(error, MessageError::Decode { payload_size: 8, .. }));
    }
}
