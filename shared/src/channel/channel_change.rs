use serde::{Deserialize, Serialize};

use crate::{ChannelAddress, ChannelDescriptorError};

/// What the server did to a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelActionKind {
    /// Subscription was added
    Add,
    /// Subscription was removed
    Remove,
    /// Subscription filter was updated
    Update,
    /// Instance root was deleted, so the subscription no longer exists
    Delete,
}

impl ChannelActionKind {
    fn from_sign(sign: char) -> Option<Self> {
        match sign {
            '+' => Some(Self::Add),
            '-' => Some(Self::Remove),
            '=' => Some(Self::Update),
            '!' => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn sign(&self) -> char {
        match self {
            Self::Add => '+',
            Self::Remove => '-',
            Self::Update => '=',
            Self::Delete => '!',
        }
    }
}

/// A channel change decoded from the compact textual form
/// `<sign><channelId>[.<subChannelId>]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelChange {
    pub action: ChannelActionKind,
    pub channel_id: i32,
    pub sub_channel_id: Option<i32>,
}

impl ChannelChange {
    pub fn parse(descriptor: &str) -> Result<Self, ChannelDescriptorError> {
        let mut chars = descriptor.chars();
        let Some(sign) = chars.next() else {
            return Err(ChannelDescriptorError::Empty);
        };
        let Some(action) = ChannelActionKind::from_sign(sign) else {
            return Err(ChannelDescriptorError::UnknownAction {
                descriptor: descriptor.to_string(),
                sign,
            });
        };

        let body = chars.as_str();
        let (channel_part, sub_channel_part) = match body.split_once('.') {
            Some((channel, sub_channel)) => (channel, Some(sub_channel)),
            None => (body, None),
        };

        let channel_id =
            parse_id(channel_part).ok_or_else(|| ChannelDescriptorError::InvalidChannelId {
                descriptor: descriptor.to_string(),
            })?;
        let sub_channel_id = match sub_channel_part {
            Some(part) => Some(parse_id(part).ok_or_else(|| {
                ChannelDescriptorError::InvalidSubChannelId {
                    descriptor: descriptor.to_string(),
                }
            })?),
            None => None,
        };

        Ok(Self {
            action,
            channel_id,
            sub_channel_id,
        })
    }

    pub fn address(&self, system_id: i32) -> ChannelAddress {
        ChannelAddress::new(system_id, self.channel_id, self.sub_channel_id)
    }

    pub fn to_descriptor(&self) -> String {
        match self.sub_channel_id {
            Some(sub_channel_id) => {
                format!("{}{}.{}", self.action.sign(), self.channel_id, sub_channel_id)
            }
            None => format!("{}{}", self.action.sign(), self.channel_id),
        }
    }
}

// digits only, so "+-1" or "+ 1" are rejected rather than coerced
fn parse_id(text: &str) -> Option<i32> {
    if text.is_empty() || !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    text.parse::<i32>().ok()
}
