use std::fmt;

/// Identifies a replication channel within a system.
///
/// A type-channel has no sub-channel id, an instance-channel has one.
/// Addresses order by system, then channel, then sub-channel (type-channel first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelAddress {
    system_id: i32,
    channel_id: i32,
    sub_channel_id: Option<i32>,
}

impl ChannelAddress {
    pub fn new(system_id: i32, channel_id: i32, sub_channel_id: Option<i32>) -> Self {
        Self {
            system_id,
            channel_id,
            sub_channel_id,
        }
    }

    /// Address of a type-channel (no sub-channel)
    pub fn type_channel(system_id: i32, channel_id: i32) -> Self {
        Self::new(system_id, channel_id, None)
    }

    /// Address of an instance-channel
    pub fn instance_channel(system_id: i32, channel_id: i32, sub_channel_id: i32) -> Self {
        Self::new(system_id, channel_id, Some(sub_channel_id))
    }

    pub fn system_id(&self) -> i32 {
        self.system_id
    }

    pub fn channel_id(&self) -> i32 {
        self.channel_id
    }

    pub fn sub_channel_id(&self) -> Option<i32> {
        self.sub_channel_id
    }

    pub fn is_instance_channel(&self) -> bool {
        self.sub_channel_id.is_some()
    }

    /// Key used when storing the channel's payload in a cache
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sub_channel_id {
            Some(sub_channel_id) => write!(
                f,
                "{}.{}.{}",
                self.system_id, self.channel_id, sub_channel_id
            ),
            None => write!(f, "{}.{}", self.system_id, self.channel_id),
        }
    }
}
