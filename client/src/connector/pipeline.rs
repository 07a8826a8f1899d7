use log::{debug, error, trace, warn};
use serde_json::Value;

use replicant_shared::{ChangeSet, ChannelActionKind, ChannelAddress, EntityChange, EntityData};

use crate::{
    area_of_interest::AreaOfInterestAction,
    connection::MessageResponse,
    connector::Connector,
    error::{ChannelActionError, ConnectorError, EntityChangeError, InvariantError},
    events::ConnectorEvent,
    world::ReplicaError,
};

enum Progress {
    /// A stage ran; the message stays current
    Continue,
    /// The message arrived ahead of its predecessor and waits its turn
    Park,
    Committed,
}

impl Connector {
    /// Moves the current change message through exactly one pipeline stage:
    /// parse, channel actions, a bounded slice of entity changes, a bounded
    /// slice of links, validation or commit. Returns whether any work was
    /// done.
    ///
    /// A failing stage discards the message, asks to disconnect and returns
    /// the error.
    pub fn progress_response_processing(&mut self) -> Result<bool, ConnectorError> {
        let Some(connection) = self.connection.as_mut() else {
            return Ok(false);
        };
        if !connection.select_next_message_response() {
            return Ok(false);
        }
        let Some(mut response) = connection.take_current_message_response() else {
            return Ok(false);
        };

        match self.process_stage(&mut response) {
            Ok(Progress::Continue) => {
                if let Some(connection) = self.connection.as_mut() {
                    connection.restore_current_message_response(response);
                }
                Ok(true)
            }
            Ok(Progress::Park) => {
                if let Some(connection) = self.connection.as_mut() {
                    connection.park(response);
                }
                Ok(true)
            }
            Ok(Progress::Committed) => Ok(true),
            Err(failure) => {
                error!(
                    "Failed to process message for {}: {}",
                    self.schema.name(),
                    failure
                );
                let message = failure.to_string();
                let event = match failure {
                    ConnectorError::MessageRead(_) => {
                        ConnectorEvent::MessageReadFailure { error: message }
                    }
                    _ => ConnectorEvent::MessageProcessFailure { error: message },
                };
                self.emit(event);
                self.disconnect_if_possible();
                Err(failure)
            }
        }
    }

    fn process_stage(&mut self, response: &mut MessageResponse) -> Result<Progress, ConnectorError> {
        if response.needs_parsing() {
            return self.parse_response(response);
        }
        if response.need_to_process_channel_actions() {
            self.process_channel_actions(response)?;
            return Ok(Progress::Continue);
        }
        if response.need_to_process_changes() {
            self.process_entity_changes(response)?;
            return Ok(Progress::Continue);
        }
        if response.need_to_link_entities() {
            self.link_entities(response)?;
            return Ok(Progress::Continue);
        }
        if response.need_to_validate_world() {
            self.validate_world(response)?;
            response.mark_world_validated();
            return Ok(Progress::Continue);
        }
        self.commit(response)?;
        Ok(Progress::Committed)
    }

    // Parse

    fn parse_response(&mut self, response: &mut MessageResponse) -> Result<Progress, ConnectorError> {
        let change_set = ChangeSet::decode_for_schema(response.raw(), self.schema.id())?;
        let sequence = change_set.sequence;
        response.set_change_set(change_set);
        if response.is_out_of_band() {
            return Ok(Progress::Continue);
        }

        let expected = self
            .connection
            .as_ref()
            .map(|connection| connection.next_expected_sequence())
            .unwrap_or(1);
        if sequence < expected {
            return Err(ConnectorError::SequenceRegression {
                sequence,
                last_rx_sequence: expected - 1,
            });
        }
        if sequence > expected {
            debug!(
                "Holding message {} until message {} arrives",
                sequence, expected
            );
            return Ok(Progress::Park);
        }
        Ok(Progress::Continue)
    }

    // Channel actions

    fn process_channel_actions(&mut self, response: &mut MessageResponse) -> Result<(), ConnectorError> {
        let system_id = self.schema.id();
        let actions = response
            .change_set()
            .map(|change_set| change_set.channel_actions.clone())
            .unwrap_or_default();

        for action in actions {
            let address = action.address(system_id);
            self.schema
                .channel_for(&address)
                .map_err(ChannelActionError::from)?;
            trace!("Channel action {:?} on {}", action.action, address);
            let stats = response.stats_mut();
            match action.action {
                ChannelActionKind::Add => {
                    stats.channel_add_count += 1;
                    self.apply_channel_add(address, action.filter)?;
                }
                ChannelActionKind::Update => {
                    stats.channel_update_count += 1;
                    self.apply_channel_update(address, action.filter)?;
                }
                ChannelActionKind::Remove => {
                    stats.channel_remove_count += 1;
                    self.apply_channel_remove(address)?;
                }
                ChannelActionKind::Delete => {
                    stats.channel_remove_count += 1;
                    self.apply_channel_remove(address)?;
                    self.area_of_interest_requests
                        .retain(|request| request.address() != &address);
                    self.desired_areas_of_interest.remove(&address);
                }
            }
        }
        response.mark_channel_actions_processed();
        Ok(())
    }

    fn apply_channel_add(
        &mut self,
        address: ChannelAddress,
        filter: Option<Value>,
    ) -> Result<(), ConnectorError> {
        let explicit = self.has_in_progress_request(
            &[AreaOfInterestAction::Add, AreaOfInterestAction::Update],
            &address,
        );
        match self.registry.subscription_mut(&address) {
            Some(subscription) => {
                subscription.set_filter(filter);
                if explicit {
                    subscription.set_explicit(true);
                }
            }
            None => {
                self.registry.create_subscription(address, filter, explicit)?;
                self.emit(ConnectorEvent::SubscriptionCreated(address));
            }
        }
        Ok(())
    }

    fn apply_channel_update(
        &mut self,
        address: ChannelAddress,
        filter: Option<Value>,
    ) -> Result<(), ConnectorError> {
        let update_requested =
            self.has_in_progress_request(&[AreaOfInterestAction::Update], &address);
        let Some(subscription) = self.registry.subscription_mut(&address) else {
            return Err(ChannelActionError::UpdateWithoutSubscription { address }.into());
        };
        if !subscription.is_explicit() && !update_requested {
            return Err(ChannelActionError::UpdateOnImplicitSubscription { address }.into());
        }
        subscription.set_filter(filter);
        Ok(())
    }

    fn apply_channel_remove(&mut self, address: ChannelAddress) -> Result<(), ConnectorError> {
        let Some(disposed) = self.registry.dispose_subscription(&address) else {
            return Err(ChannelActionError::RemoveWithoutSubscription { address }.into());
        };
        self.emit_disposed(disposed);
        Ok(())
    }

    fn has_in_progress_request(
        &self,
        actions: &[AreaOfInterestAction],
        address: &ChannelAddress,
    ) -> bool {
        self.connection
            .as_ref()
            .map(|connection| connection.has_in_progress_request(actions, address))
            .unwrap_or(false)
    }

    // Entity changes

    fn process_entity_changes(&mut self, response: &mut MessageResponse) -> Result<(), ConnectorError> {
        for _ in 0..self.config.changes_to_process_per_tick.max(1) {
            let Some(change) = response.next_change().cloned() else {
                break;
            };
            response.advance_change();
            match &change.data {
                Some(data) => self.apply_entity_update(response, &change, data)?,
                None => self.apply_entity_removal(response, &change)?,
            }
        }
        Ok(())
    }

    fn apply_entity_update(
        &mut self,
        response: &mut MessageResponse,
        change: &EntityChange,
        data: &EntityData,
    ) -> Result<(), ConnectorError> {
        let key = change.key();
        if change.channels.is_empty() {
            return Err(EntityChangeError::NoChannels { key }.into());
        }
        let system_id = self.schema.id();
        let addresses: Vec<ChannelAddress> = change
            .channels
            .iter()
            .map(|channel| channel.address(system_id))
            .collect();
        for address in &addresses {
            self.schema
                .channel_for(address)
                .map_err(EntityChangeError::from)?;
        }

        let mapper_error = |reason: ReplicaError| EntityChangeError::Mapper {
            key,
            reason: reason.to_string(),
        };
        let instance_id = match self.registry.entity_mut(&key) {
            Some(entity) => {
                let instance_id = entity.instance_id();
                if let Some(replica) = entity.replica_mut() {
                    self.change_mapper
                        .update(key, replica, data)
                        .map_err(mapper_error)?;
                }
                response.stats_mut().entity_update_count += 1;
                instance_id
            }
            None => {
                let replica = self.change_mapper.create(key, data).map_err(mapper_error)?;
                response.stats_mut().entity_add_count += 1;
                self.registry.insert_entity(key, replica)
            }
        };

        for address in addresses {
            if !self.registry.has_subscription(&address) {
                self.registry.create_subscription(address, None, false)?;
                self.emit(ConnectorEvent::SubscriptionCreated(address));
            }
            self.registry.link(&key, &address);
        }
        response.add_entity_to_link(key, instance_id);
        Ok(())
    }

    fn apply_entity_removal(
        &mut self,
        response: &mut MessageResponse,
        change: &EntityChange,
    ) -> Result<(), ConnectorError> {
        let key = change.key();
        if self.registry.entity(&key).is_none() {
            let failure = EntityChangeError::RemoveOfMissingEntity { key };
            if self.config.check_invariants {
                return Err(failure.into());
            }
            warn!("Ignoring removal: {}", failure);
            return Ok(());
        }

        response.stats_mut().entity_remove_count += 1;
        let destroyed = if change.channels.is_empty() {
            self.registry.remove_entity(&key)
        } else {
            let system_id = self.schema.id();
            let mut destroyed = false;
            for channel in &change.channels {
                if self.registry.delink(&key, &channel.address(system_id)) {
                    destroyed = true;
                    break;
                }
            }
            destroyed
        };
        if destroyed {
            self.emit(ConnectorEvent::EntityDisposed(key));
        }
        Ok(())
    }

    // Linking

    fn link_entities(&mut self, response: &mut MessageResponse) -> Result<(), ConnectorError> {
        let batch = response.next_entities_to_link(self.config.links_to_process_per_tick.max(1));
        for (key, instance_id) in batch {
            // removed later in the same message
            if !self.registry.is_entity_alive(&key, instance_id) {
                continue;
            }
            self.registry
                .link_entity(&key)
                .map_err(|reason| EntityChangeError::Link {
                    key,
                    reason: reason.to_string(),
                })?;
            response.stats_mut().entity_link_count += 1;
        }
        Ok(())
    }

    // Validation

    fn validate_world(&self, response: &MessageResponse) -> Result<(), ConnectorError> {
        if !self.config.validate_on_load {
            return Ok(());
        }
        for (key, instance_id) in response.touched_entities() {
            if !self.registry.is_entity_alive(key, *instance_id) {
                continue;
            }
            let orphaned = self
                .registry
                .entity(key)
                .map(|entity| entity.subscriptions().is_empty())
                .unwrap_or(false);
            if orphaned {
                return Err(InvariantError::OrphanedEntity { key: *key }.into());
            }
            self.registry
                .verify_entity(key)
                .map_err(|reason| ConnectorError::EntityValidation {
                    key: *key,
                    reason: reason.to_string(),
                })?;
        }
        Ok(())
    }

    // Commit

    fn commit(&mut self, response: &mut MessageResponse) -> Result<(), ConnectorError> {
        let sequence = response.sequence().unwrap_or(0);

        if response.is_out_of_band() {
            if let Some(action) = response.take_completion_action() {
                self.run_completion_action(action)?;
            }
        } else {
            let Some(connection) = self.connection.as_mut() else {
                return Ok(());
            };
            let mut deferred = None;
            let mut correlated = true;
            if let Some(request_id) = response.request_id() {
                match connection.request_mut(&request_id) {
                    Some(entry) => {
                        entry.mark_results_arrived();
                        let cache_key = entry.cache_key().map(str::to_string);
                        deferred = entry.take_completion_action();
                        if deferred.is_some() {
                            connection.remove_request(&request_id);
                        }
                        let etag = response
                            .change_set()
                            .and_then(|change_set| change_set.etag.as_deref());
                        if let (Some(key), Some(etag), Some(cache)) =
                            (cache_key, etag, self.cache.as_mut())
                        {
                            if cache.store(&key, etag, response.raw()) {
                                debug!("Cached payload for {} with etag {}", key, etag);
                            }
                        }
                    }
                    None => {
                        let failure = InvariantError::UnknownRequest { request_id };
                        if self.config.check_invariants {
                            return Err(failure.into());
                        }
                        warn!(
                            "Applying message {} without advancing the receive sequence: {}",
                            sequence, failure
                        );
                        correlated = false;
                    }
                }
            }
            if correlated {
                connection.set_last_rx_sequence(sequence);
            } else {
                connection.skip_sequence(sequence);
            }
            if let Some(action) = deferred {
                self.run_completion_action(action)?;
            }
        }

        let stats = response.stats().clone();
        debug!(
            "Committed message {} for {}: {:?}",
            sequence,
            self.schema.name(),
            stats
        );
        self.emit(ConnectorEvent::MessageProcessed(stats.clone()));
        if let Some(hook) = self.post_message_response_hook.as_mut() {
            hook(&stats);
        }
        Ok(())
    }
}
