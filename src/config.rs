//! Broker configuration: channel naming and enumeration bounds

use serde::{Deserialize, Serialize};

use crate::error::{OrbError, Result};

/// Default base path that channel paths are built under
pub const DEFAULT_BASE_PATH: &str = "/dev/uorb/";

/// Default well-known registration endpoint
pub const DEFAULT_REGISTER_PATH: &str = "/dev/usensor";

/// Default maximum length of a derived channel path, in bytes
pub const DEFAULT_MAX_PATH_LEN: usize = 64;

/// Default upper bound on instances probed by enumeration
pub const DEFAULT_MAX_INSTANCES: u32 = 256;

/// Configuration shared by every operation of an [`Orb`](crate::Orb)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrbConfig {
    /// Prefix of every channel path (`<base><name><instance>`)
    pub base_path: String,
    /// Path of the registration control endpoint
    pub register_path: String,
    /// Maximum derived path length; longer paths are rejected
    pub max_path_len: usize,
    /// Enumeration stops here even if every probed instance exists
    pub max_instances: u32,
}

impl Default for OrbConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            register_path: DEFAULT_REGISTER_PATH.to_string(),
            max_path_len: DEFAULT_MAX_PATH_LEN,
            max_instances: DEFAULT_MAX_INSTANCES,
        }
    }
}

impl OrbConfig {
    /// Create a configuration with default paths
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base path for channel paths
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Set the registration endpoint path
    pub fn with_register_path(mut self, register_path: impl Into<String>) -> Self {
        self.register_path = register_path.into();
        self
    }

    /// Set the maximum channel path length
    pub fn with_max_path_len(mut self, max_path_len: usize) -> Self {
        self.max_path_len = max_path_len;
        self
    }

    /// Set the enumeration bound
    pub fn with_max_instances(mut self, max_instances: u32) -> Self {
        self.max_instances = max_instances;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.base_path.is_empty() {
            return Err(OrbError::invalid_parameter(
                "base_path",
                "Base path cannot be empty",
            ));
        }

        if self.register_path.is_empty() {
            return Err(OrbError::invalid_parameter(
                "register_path",
                "Registration path cannot be empty",
            ));
        }

        // Registration endpoint must never be mistaken for a channel
        if self.register_path.starts_with(&self.base_path) {
            return Err(OrbError::invalid_parameter(
                "register_path",
                format!(
                    "Registration path {} lies under base path {}",
                    self.register_path, self.base_path
                ),
            ));
        }

        if self.max_path_len <= self.base_path.len() + 1 {
            return Err(OrbError::invalid_parameter(
                "max_path_len",
                format!(
                    "Maximum path length {} leaves no room after base path {}",
                    self.max_path_len, self.base_path
                ),
            ));
        }

        if self.max_instances == 0 {
            return Err(OrbError::invalid_parameter(
                "max_instances",
                "Enumeration bound must be greater than 0",
            ));
        }

        Ok(())
    }
}
