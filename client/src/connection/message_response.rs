use replicant_shared::{ChangeSet, EntityChange, EntityKey};

use crate::{
    connection::{CompletionAction, RequestId},
    events::MessageStats,
};

/// One inbound change message moving through the processing pipeline.
///
/// Every stage saves its cursor here so processing can stop between any two
/// ticks and resume where it left off.
pub struct MessageResponse {
    raw: String,
    change_set: Option<ChangeSet>,
    // set only for out-of-band messages
    completion_action: Option<CompletionAction>,
    out_of_band: bool,
    channel_actions_processed: bool,
    change_index: usize,
    entities_to_link: Vec<(EntityKey, u64)>,
    link_index: usize,
    world_validated: bool,
    stats: MessageStats,
}

impl MessageResponse {
    pub fn new(raw: String) -> Self {
        Self {
            raw,
            change_set: None,
            completion_action: None,
            out_of_band: false,
            channel_actions_processed: false,
            change_index: 0,
            entities_to_link: Vec::new(),
            link_index: 0,
            world_validated: false,
            stats: MessageStats::default(),
        }
    }

    /// A message delivered outside the sequenced stream, such as a cached
    /// subscribe payload. It never advances the receive sequence.
    pub fn out_of_band(raw: String, completion_action: CompletionAction) -> Self {
        let mut response = Self::new(raw);
        response.out_of_band = true;
        response.completion_action = Some(completion_action);
        response.stats.out_of_band = true;
        response
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_out_of_band(&self) -> bool {
        self.out_of_band
    }

    pub fn change_set(&self) -> Option<&ChangeSet> {
        self.change_set.as_ref()
    }

    pub fn needs_parsing(&self) -> bool {
        self.change_set.is_none()
    }

    pub fn sequence(&self) -> Option<u64> {
        self.change_set.as_ref().map(|change_set| change_set.sequence)
    }

    /// Correlation id of an in-band message. Out-of-band payloads may replay a
    /// stale id, so theirs is never reported.
    pub fn request_id(&self) -> Option<RequestId> {
        if self.out_of_band {
            return None;
        }
        self.change_set
            .as_ref()
            .and_then(|change_set| change_set.request_id.as_deref())
            .map(RequestId::from)
    }

    pub fn stats(&self) -> &MessageStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut MessageStats {
        &mut self.stats
    }

    pub(crate) fn set_change_set(&mut self, change_set: ChangeSet) {
        self.stats.sequence = change_set.sequence;
        self.change_set = Some(change_set);
        self.stats.request_id = self.request_id();
    }

    // Channel actions

    pub fn need_to_process_channel_actions(&self) -> bool {
        !self.channel_actions_processed
    }

    pub(crate) fn mark_channel_actions_processed(&mut self) {
        self.channel_actions_processed = true;
    }

    // Entity changes

    pub fn need_to_process_changes(&self) -> bool {
        self.change_set
            .as_ref()
            .map(|change_set| self.change_index < change_set.changes.len())
            .unwrap_or(false)
    }

    /// The next change to apply, if any
    pub(crate) fn next_change(&self) -> Option<&EntityChange> {
        self.change_set
            .as_ref()
            .and_then(|change_set| change_set.changes.get(self.change_index))
    }

    pub(crate) fn advance_change(&mut self) {
        self.change_index += 1;
    }

    // Linking

    pub(crate) fn add_entity_to_link(&mut self, key: EntityKey, instance_id: u64) {
        self.entities_to_link.push((key, instance_id));
    }

    pub fn need_to_link_entities(&self) -> bool {
        self.link_index < self.entities_to_link.len()
    }

    pub(crate) fn next_entities_to_link(&mut self, max: usize) -> Vec<(EntityKey, u64)> {
        let end = (self.link_index + max).min(self.entities_to_link.len());
        let batch = self.entities_to_link[self.link_index..end].to_vec();
        self.link_index = end;
        batch
    }

    /// Every entity touched by this message, in the order it was touched
    pub(crate) fn touched_entities(&self) -> &[(EntityKey, u64)] {
        &self.entities_to_link
    }

    // Validation

    pub fn need_to_validate_world(&self) -> bool {
        !self.world_validated
    }

    pub(crate) fn mark_world_validated(&mut self) {
        self.world_validated = true;
    }

    pub(crate) fn take_completion_action(&mut self) -> Option<CompletionAction> {
        self.completion_action.take()
    }
}
