//! Broker entry point

use crate::{config::OrbConfig, error::Result, transport::Transport};

/// Publish/subscribe broker over a channel transport
///
/// An `Orb` owns no topic state of its own: every operation derives what it
/// needs from the transport, so any number of `Orb`s (in any number of
/// processes) sharing a transport see the same topics.
#[derive(Debug, Clone)]
pub struct Orb<T: Transport> {
    transport: T,
    config: OrbConfig,
}

impl<T: Transport> Orb<T> {
    /// Create a broker with the default configuration
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            config: OrbConfig::default(),
        }
    }

    /// Create a broker with a validated custom configuration
    pub fn with_config(transport: T, config: OrbConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { transport, config })
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The broker configuration
    pub fn config(&self) -> &OrbConfig {
        &self.config
    }
}
