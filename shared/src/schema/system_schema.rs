use std::collections::HashSet;

use crate::{ChannelAddress, SchemaError};

/// How a channel's subscription filter may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterType {
    /// Channel takes no filter
    None,
    /// Filter is fixed when subscribing and cannot be updated
    Static,
    /// Filter can be updated on a live subscription
    Dynamic,
}

/// Metadata describing one channel of a system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSchema {
    pub id: i32,
    pub name: String,
    /// Instance channels are addressed with a sub-channel id, type channels are not
    pub instance_root: bool,
    pub filter_type: FilterType,
    /// Whether subscribe payloads for this channel may be cached by etag
    pub cacheable: bool,
}

impl ChannelSchema {
    pub fn type_channel(id: i32, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            instance_root: false,
            filter_type: FilterType::None,
            cacheable: false,
        }
    }

    pub fn instance_channel(id: i32, name: &str) -> Self {
        Self {
            instance_root: true,
            ..Self::type_channel(id, name)
        }
    }

    pub fn with_filter(mut self, filter_type: FilterType) -> Self {
        self.filter_type = filter_type;
        self
    }

    pub fn cacheable(mut self) -> Self {
        self.cacheable = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTypeSchema {
    pub id: i32,
    pub name: String,
}

impl EntityTypeSchema {
    pub fn new(id: i32, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
        }
    }
}

/// Describes the channels & entity types replicated for one system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemSchema {
    id: i32,
    name: String,
    channels: Vec<ChannelSchema>,
    entity_types: Vec<EntityTypeSchema>,
}

impl SystemSchema {
    pub fn new(
        id: i32,
        name: &str,
        channels: Vec<ChannelSchema>,
        entity_types: Vec<EntityTypeSchema>,
    ) -> Result<Self, SchemaError> {
        let mut channel_ids = HashSet::new();
        for channel in &channels {
            if !channel_ids.insert(channel.id) {
                return Err(SchemaError::DuplicateChannel {
                    schema: name.to_string(),
                    channel_id: channel.id,
                });
            }
        }
        let mut type_ids = HashSet::new();
        for entity_type in &entity_types {
            if !type_ids.insert(entity_type.id) {
                return Err(SchemaError::DuplicateEntityType {
                    schema: name.to_string(),
                    entity_type: entity_type.id,
                });
            }
        }

        Ok(Self {
            id,
            name: name.to_string(),
            channels,
            entity_types,
        })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channels(&self) -> &[ChannelSchema] {
        &self.channels
    }

    pub fn channel(&self, channel_id: i32) -> Option<&ChannelSchema> {
        self.channels.iter().find(|channel| channel.id == channel_id)
    }

    pub fn entity_type(&self, entity_type: i32) -> Option<&EntityTypeSchema> {
        self.entity_types
            .iter()
            .find(|schema| schema.id == entity_type)
    }

    /// Checks that the address targets a declared channel of this system with
    /// the right shape, returning that channel's metadata
    pub fn channel_for(&self, address: &ChannelAddress) -> Result<&ChannelSchema, SchemaError> {
        if address.system_id() != self.id {
            return Err(SchemaError::SystemMismatch {
                schema: self.name.clone(),
                schema_id: self.id,
                address: address.to_string(),
            });
        }
        let Some(channel) = self.channel(address.channel_id()) else {
            return Err(SchemaError::UnknownChannel {
                schema: self.name.clone(),
                channel_id: address.channel_id(),
            });
        };
        match (channel.instance_root, address.is_instance_channel()) {
            (true, false) => Err(SchemaError::MissingSubChannel {
                channel: channel.name.clone(),
                address: address.to_string(),
            }),
            (false, true) => Err(SchemaError::UnexpectedSubChannel {
                channel: channel.name.clone(),
                address: address.to_string(),
            }),
            _ => Ok(channel),
        }
    }
}
