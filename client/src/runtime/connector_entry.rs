use log::debug;

use replicant_shared::{ConnectorState, RateLimitError, RateLimitedValue};

use crate::{config::RateLimitConfig, connector::Connector, error::ConnectorError};

/// A connector registered with the Runtime, with the limiter that throttles
/// how often it may be asked to connect or disconnect
pub struct ConnectorEntry {
    connector: Connector,
    required: bool,
    limiter: RateLimitedValue,
}

impl ConnectorEntry {
    pub fn new(
        connector: Connector,
        required: bool,
        limit: &RateLimitConfig,
    ) -> Result<Self, RateLimitError> {
        Ok(Self {
            connector,
            required,
            limiter: RateLimitedValue::new(limit.tokens_per_second, limit.max_tokens)?,
        })
    }

    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    pub fn connector_mut(&mut self) -> &mut Connector {
        &mut self.connector
    }

    /// Required connectors decide the Runtime's overall state
    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn limiter(&self) -> &RateLimitedValue {
        &self.limiter
    }

    pub fn limiter_mut(&mut self) -> &mut RateLimitedValue {
        &mut self.limiter
    }

    /// Asks the connector to connect if it is settled somewhere else and the
    /// limiter has a token. Returns whether an attempt was made.
    pub fn activate(&mut self) -> Result<bool, ConnectorError> {
        let state = self.connector.state();
        if self.connector.is_disposed()
            || state.is_transitioning()
            || state == ConnectorState::Connected
        {
            return Ok(false);
        }
        let connector = &mut self.connector;
        let attempted = self
            .limiter
            .attempt(1.0, || connector.connect())
            .transpose()?
            .is_some();
        if !attempted {
            debug!(
                "Connect attempt for schema {} throttled",
                self.connector.schema_id()
            );
        }
        Ok(attempted)
    }

    /// Counterpart of `activate` for disconnecting
    pub fn deactivate(&mut self) -> Result<bool, ConnectorError> {
        let state = self.connector.state();
        if self.connector.is_disposed()
            || state.is_transitioning()
            || state == ConnectorState::Disconnected
        {
            return Ok(false);
        }
        let connector = &mut self.connector;
        let attempted = self
            .limiter
            .attempt(1.0, || connector.disconnect())
            .transpose()?
            .is_some();
        if !attempted {
            debug!(
                "Disconnect attempt for schema {} throttled",
                self.connector.schema_id()
            );
        }
        Ok(attempted)
    }
}
