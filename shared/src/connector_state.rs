use std::fmt;

/// Lifecycle state of a connector's link to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    /// A connect or disconnect attempt failed. Only an explicit connect or
    /// disconnect moves the connector out of this state.
    Error,
}

impl ConnectorState {
    /// Returns true while a connect or disconnect is in flight
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting | Self::Disconnecting)
    }
}

impl fmt::Display for ConnectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Disconnecting => "DISCONNECTING",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}
