use log::{info, warn};

use replicant_shared::ConnectorState;

use crate::{
    area_of_interest::{AreaOfInterestAction, AreaOfInterestRequest},
    connection::Connection,
    connector::Connector,
    error::ConnectorError,
    events::ConnectorEvent,
    transport::{TransportContext, TransportEvent},
};

impl Connector {
    /// Starts connecting. Does nothing if already connecting or connected.
    pub fn connect(&mut self) -> Result<(), ConnectorError> {
        if self.disposed {
            return Err(ConnectorError::Disposed);
        }
        if matches!(
            self.state,
            ConnectorState::Connecting | ConnectorState::Connected
        ) {
            return Ok(());
        }
        info!("Connecting to {}", self.schema.name());
        self.set_state(ConnectorState::Connecting);
        let context = TransportContext::new(
            self.schema.id(),
            self.transport_sender.clone(),
            self.last_rx_sequence.clone(),
        );
        self.transport.request_connect(context);
        Ok(())
    }

    /// Starts disconnecting. Does nothing if already disconnecting or
    /// disconnected.
    pub fn disconnect(&mut self) -> Result<(), ConnectorError> {
        if self.disposed {
            return Err(ConnectorError::Disposed);
        }
        if matches!(
            self.state,
            ConnectorState::Disconnecting | ConnectorState::Disconnected
        ) {
            return Ok(());
        }
        info!("Disconnecting from {}", self.schema.name());
        self.set_state(ConnectorState::Disconnecting);
        self.transport.request_disconnect();
        Ok(())
    }

    /// Recovery after a failure that leaves the replica untrustworthy. A
    /// connector already mid-transition is left alone.
    pub fn disconnect_if_possible(&mut self) {
        if self.disposed || self.state.is_transitioning() {
            return;
        }
        if let Err(error) = self.disconnect() {
            warn!("Unable to disconnect from {}: {}", self.schema.name(), error);
        }
    }

    /// Applies everything the transport reported since the last tick
    pub(super) fn process_transport_events(&mut self) -> Result<bool, ConnectorError> {
        let mut processed = false;
        while let Ok(event) = self.transport_receiver.try_recv() {
            processed = true;
            self.on_transport_event(event)?;
        }
        Ok(processed)
    }

    fn on_transport_event(&mut self, event: TransportEvent) -> Result<(), ConnectorError> {
        match event {
            TransportEvent::Connected { connection_id } => self.on_connected(&connection_id),
            TransportEvent::ConnectFailed { error } => {
                warn!("Failed to connect to {}: {}", self.schema.name(), error);
                self.drop_connection();
                self.set_state(ConnectorState::Error);
                self.emit(ConnectorEvent::ConnectFailure { error });
            }
            TransportEvent::Disconnected => {
                info!("Disconnected from {}", self.schema.name());
                self.drop_connection();
                self.set_state(ConnectorState::Disconnected);
                self.emit(ConnectorEvent::Disconnected);
            }
            TransportEvent::DisconnectFailed { error } => {
                warn!("Failed to disconnect from {}: {}", self.schema.name(), error);
                self.drop_connection();
                self.set_state(ConnectorState::Error);
                self.emit(ConnectorEvent::DisconnectFailure { error });
            }
            TransportEvent::MessageReceived { raw } => match self.connection.as_mut() {
                Some(connection) => connection.enqueue_response(raw),
                None => warn!(
                    "Dropping message for {} received without a connection",
                    self.schema.name()
                ),
            },
            TransportEvent::MessageReadFailure { error } => {
                warn!("Transport failed to read message for {}: {}", self.schema.name(), error);
                self.emit(ConnectorEvent::MessageReadFailure { error });
                self.disconnect_if_possible();
            }
            TransportEvent::DisconnectRequested => self.disconnect_if_possible(),
            TransportEvent::RequestSucceeded {
                request_id,
                success,
            } => return self.on_area_of_interest_success(&request_id, success),
            TransportEvent::RequestFailed { request_id, error } => {
                self.on_area_of_interest_failure(&request_id, &error)
            }
        }
        Ok(())
    }

    fn on_connected(&mut self, connection_id: &str) {
        if self.state != ConnectorState::Connecting {
            warn!(
                "Connection {} to {} established while {}",
                connection_id,
                self.schema.name(),
                self.state
            );
        }
        info!("Connected to {} as {}", self.schema.name(), connection_id);
        self.connection = Some(Connection::new(
            connection_id,
            self.last_rx_sequence.clone(),
        ));

        // a fresh connection has no server-side subscriptions yet
        self.area_of_interest_requests.clear();
        let resubscribe: Vec<AreaOfInterestRequest> = self
            .desired_areas_of_interest
            .iter()
            .map(|(address, filter)| {
                AreaOfInterestRequest::new(*address, AreaOfInterestAction::Add, filter.clone())
            })
            .collect();
        self.area_of_interest_requests.extend(resubscribe);

        self.set_state(ConnectorState::Connected);
        self.emit(ConnectorEvent::Connected);
    }

    fn drop_connection(&mut self) {
        self.connection = None;
        self.area_of_interest_requests.clear();
        self.dispose_subscriptions();
    }
}
