use std::{collections::BTreeMap, mem};

use log::{info, warn};

use replicant_shared::ConnectorState;

use crate::{
    config::RuntimeConfig,
    connector::Connector,
    error::RuntimeError,
    runtime::ConnectorEntry,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeEvent {
    StateChanged(ConnectorState),
}

/// Collapses the states of the registered connectors into one, looking only
/// at required connectors. Error outranks Disconnected, which outranks
/// Disconnecting, which outranks Connecting.
pub fn aggregate_state<I>(connectors: I) -> ConnectorState
where
    I: IntoIterator<Item = (ConnectorState, bool)>,
{
    let required: Vec<ConnectorState> = connectors
        .into_iter()
        .filter(|(_, required)| *required)
        .map(|(state, _)| state)
        .collect();
    [
        ConnectorState::Error,
        ConnectorState::Disconnected,
        ConnectorState::Disconnecting,
        ConnectorState::Connecting,
    ]
    .into_iter()
    .find(|state| required.contains(state))
    .unwrap_or(ConnectorState::Connected)
}

/// Drives one Connector per system and reports their combined state
pub struct Runtime {
    config: RuntimeConfig,
    connectors: BTreeMap<i32, ConnectorEntry>,
    active: bool,
    state: ConnectorState,
    events: Vec<RuntimeEvent>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            connectors: BTreeMap::new(),
            active: false,
            state: ConnectorState::Connected,
            events: Vec::new(),
        }
    }

    pub fn register_connector(
        &mut self,
        connector: Connector,
        required: bool,
    ) -> Result<(), RuntimeError> {
        let system_id = connector.schema_id();
        if self.connectors.contains_key(&system_id) {
            return Err(RuntimeError::DuplicateConnector { system_id });
        }
        let limit = if required {
            &self.config.required_limiter
        } else {
            &self.config.optional_limiter
        };
        let entry = ConnectorEntry::new(connector, required, limit)
            .map_err(|source| RuntimeError::RateLimit { system_id, source })?;
        info!(
            "Registered {} connector for schema {}",
            if required { "required" } else { "optional" },
            system_id
        );
        self.connectors.insert(system_id, entry);
        self.update_state();
        Ok(())
    }

    pub fn connector(&self, system_id: i32) -> Option<&Connector> {
        self.connectors.get(&system_id).map(ConnectorEntry::connector)
    }

    pub fn connector_mut(&mut self, system_id: i32) -> Option<&mut Connector> {
        self.connectors
            .get_mut(&system_id)
            .map(ConnectorEntry::connector_mut)
    }

    pub fn entry_mut(&mut self, system_id: i32) -> Option<&mut ConnectorEntry> {
        self.connectors.get_mut(&system_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ConnectorEntry> {
        self.connectors.values()
    }

    pub fn state(&self) -> ConnectorState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Connects every connector, subject to each one's limiter. While active,
    /// `tick` keeps retrying those that drop to Disconnected.
    pub fn activate(&mut self) -> Result<(), RuntimeError> {
        self.active = true;
        for (system_id, entry) in self.connectors.iter_mut() {
            entry
                .activate()
                .map_err(|source| RuntimeError::Connector {
                    system_id: *system_id,
                    source,
                })?;
        }
        self.update_state();
        Ok(())
    }

    pub fn deactivate(&mut self) -> Result<(), RuntimeError> {
        self.active = false;
        for (system_id, entry) in self.connectors.iter_mut() {
            entry
                .deactivate()
                .map_err(|source| RuntimeError::Connector {
                    system_id: *system_id,
                    source,
                })?;
        }
        self.update_state();
        Ok(())
    }

    /// Ticks every connector once. Connectors in Error are left for the
    /// application to recover explicitly. Every connector is ticked even if
    /// one fails; the first failure is returned.
    pub fn tick(&mut self) -> Result<bool, RuntimeError> {
        let mut worked = false;
        let mut first_failure = None;
        for (system_id, entry) in self.connectors.iter_mut() {
            match entry.connector_mut().tick() {
                Ok(progress) => worked |= progress,
                Err(source) => {
                    warn!("Connector for schema {} failed: {}", system_id, source);
                    first_failure = first_failure.or(Some(RuntimeError::Connector {
                        system_id: *system_id,
                        source,
                    }));
                }
            }
            if self.active && entry.connector().state() == ConnectorState::Disconnected {
                match entry.activate() {
                    Ok(attempted) => worked |= attempted,
                    Err(source) => {
                        first_failure = first_failure.or(Some(RuntimeError::Connector {
                            system_id: *system_id,
                            source,
                        }));
                    }
                }
            }
        }
        self.update_state();
        match first_failure {
            Some(failure) => Err(failure),
            None => Ok(worked),
        }
    }

    /// Drains the events emitted since the last call
    pub fn take_events(&mut self) -> Vec<RuntimeEvent> {
        mem::take(&mut self.events)
    }

    fn update_state(&mut self) {
        let state = aggregate_state(
            self.connectors
                .values()
                .map(|entry| (entry.connector().state(), entry.is_required())),
        );
        if state != self.state {
            info!("Runtime state {} -> {}", self.state, state);
            self.state = state;
            self.events.push(RuntimeEvent::StateChanged(state));
        }
    }
}
