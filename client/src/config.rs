use std::default::Default;

/// Contains Config properties which will be used by a Connector
#[derive(Clone, Debug)]
pub struct ConnectorConfig {
    /// Maximum number of entity changes applied per tick of the message pipeline
    pub changes_to_process_per_tick: usize,
    /// Maximum number of entities whose references are linked per tick
    pub links_to_process_per_tick: usize,
    /// Run each touched entity's self-verification after a message is applied.
    /// A verification failure is fatal for the message.
    pub validate_on_load: bool,
    /// Treat tolerable invariant violations (such as removing a subscription
    /// that does not exist) as fatal errors rather than logging and dropping
    /// the offending request
    pub check_invariants: bool,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            changes_to_process_per_tick: 100,
            links_to_process_per_tick: 100,
            validate_on_load: cfg!(debug_assertions),
            check_invariants: cfg!(debug_assertions),
        }
    }
}

/// Token bucket parameters for throttling connect/disconnect attempts
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateLimitConfig {
    pub tokens_per_second: f64,
    pub max_tokens: f64,
}

/// Contains Config properties which will be used by the Runtime
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Limiter used by connectors whose systems the application cannot run without
    pub required_limiter: RateLimitConfig,
    /// Limiter used by optional connectors, which regenerate more slowly
    pub optional_limiter: RateLimitConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            required_limiter: RateLimitConfig {
                tokens_per_second: 1.0,
                max_tokens: 2.0,
            },
            optional_limiter: RateLimitConfig {
                tokens_per_second: 0.2,
                max_tokens: 2.0,
            },
        }
    }
}
