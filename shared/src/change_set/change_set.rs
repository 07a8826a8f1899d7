use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ChangeSetError, ChannelActionKind, ChannelAddress, ChannelChange};

/// Attribute payload of an entity change
pub type EntityData = Map<String, Value>;

/// Identifies a replicated entity by its type & id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey {
    pub entity_type: i32,
    pub id: i32,
}

impl EntityKey {
    pub fn new(entity_type: i32, id: i32) -> Self {
        Self { entity_type, id }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.id)
    }
}

/// A decoded change message.
///
/// Wire form:
/// `{ last_id, request_id?, etag?, schema?, channel_actions?: [...], changes?: [...] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    #[serde(rename = "last_id")]
    pub sequence: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channel_actions: Vec<ChannelAction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<EntityChange>,
}

impl ChangeSet {
    pub fn new(sequence: u64) -> Self {
        Self {
            sequence,
            request_id: None,
            etag: None,
            schema: None,
            channel_actions: Vec::new(),
            changes: Vec::new(),
        }
    }

    /// Decode a raw JSON payload
    pub fn decode(raw: &str) -> Result<Self, ChangeSetError> {
        serde_json::from_str(raw).map_err(|error| ChangeSetError::Malformed {
            reason: error.to_string(),
        })
    }

    /// Decode a raw JSON payload and check any declared schema id against `schema_id`
    pub fn decode_for_schema(raw: &str, schema_id: i32) -> Result<Self, ChangeSetError> {
        let change_set = Self::decode(raw)?;
        if let Some(actual) = change_set.schema {
            if actual != schema_id {
                return Err(ChangeSetError::SchemaMismatch {
                    expected: schema_id,
                    actual,
                });
            }
        }
        Ok(change_set)
    }

    pub fn encode(&self) -> String {
        // a ChangeSet only holds JSON-representable values, so this cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// A change to a channel's subscription, as dictated by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawChannelAction")]
pub struct ChannelAction {
    pub cid: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scid: Option<i32>,
    pub action: ChannelActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
}

impl ChannelAction {
    pub fn new(action: ChannelActionKind, cid: i32, scid: Option<i32>) -> Self {
        Self {
            cid,
            scid,
            action,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn address(&self, system_id: i32) -> ChannelAddress {
        ChannelAddress::new(system_id, self.cid, self.scid)
    }
}

// channel actions may arrive either as objects or in the compact descriptor form
#[derive(Deserialize)]
#[serde(untagged)]
enum RawChannelAction {
    Descriptor(String),
    Full {
        cid: i32,
        #[serde(default)]
        scid: Option<i32>,
        action: ChannelActionKind,
        #[serde(default)]
        filter: Option<Value>,
    },
}

impl TryFrom<RawChannelAction> for ChannelAction {
    type Error = String;

    fn try_from(raw: RawChannelAction) -> Result<Self, Self::Error> {
        match raw {
            RawChannelAction::Descriptor(descriptor) => {
                let change = ChannelChange::parse(&descriptor).map_err(|error| error.to_string())?;
                Ok(ChannelAction::new(
                    change.action,
                    change.channel_id,
                    change.sub_channel_id,
                ))
            }
            RawChannelAction::Full {
                cid,
                scid,
                action,
                filter,
            } => Ok(ChannelAction {
                cid,
                scid,
                action,
                filter,
            }),
        }
    }
}

/// A channel an entity change was routed through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityChannel {
    pub cid: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scid: Option<i32>,
}

impl EntityChannel {
    pub fn new(cid: i32, scid: Option<i32>) -> Self {
        Self { cid, scid }
    }

    pub fn address(&self, system_id: i32) -> ChannelAddress {
        ChannelAddress::new(system_id, self.cid, self.scid)
    }
}

/// A change to a single entity. Absence of `data` marks a removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityChange {
    pub id: i32,
    #[serde(rename = "type")]
    pub entity_type: i32,
    #[serde(default)]
    pub channels: Vec<EntityChannel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EntityData>,
}

impl EntityChange {
    pub fn update(entity_type: i32, id: i32, data: EntityData) -> Self {
        Self {
            id,
            entity_type,
            channels: Vec::new(),
            data: Some(data),
        }
    }

    pub fn removal(entity_type: i32, id: i32) -> Self {
        Self {
            id,
            entity_type,
            channels: Vec::new(),
            data: None,
        }
    }

    pub fn on_channel(mut self, cid: i32, scid: Option<i32>) -> Self {
        self.channels.push(EntityChannel::new(cid, scid));
        self
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.entity_type, self.id)
    }

    pub fn is_removal(&self) -> bool {
        self.data.is_none()
    }
}
