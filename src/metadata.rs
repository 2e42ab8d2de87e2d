//! Topic metadata: the immutable identity of a topic type

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::{OrbError, Result};

/// Name and element size of a topic type
///
/// Normally declared once per topic with [`orb_topic!`](crate::orb_topic)
/// and shared by every advertiser and subscriber of that type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicMetadata {
    name: Cow<'static, str>,
    size: usize,
}

impl TopicMetadata {
    /// Metadata for a statically named topic
    pub const fn new(name: &'static str, size: usize) -> Self {
        Self {
            name: Cow::Borrowed(name),
            size,
        }
    }

    /// Metadata for a topic whose name is only known at runtime
    pub fn owned(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            size,
        }
    }

    /// Topic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Check that the name can be used to build collision-free channel paths
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(OrbError::invalid_parameter("name", "Topic name cannot be empty"));
        }

        if self.name.contains('/') || self.name.contains('\0') {
            return Err(OrbError::invalid_parameter(
                "name",
                format!("Topic name {:?} contains a path separator or NUL", self.name),
            ));
        }

        // The instance number is appended in decimal
        if self.name.ends_with(|c: char| c.is_ascii_digit()) {
            return Err(OrbError::invalid_parameter(
                "name",
                format!("Topic name {:?} must not end with a digit", self.name),
            ));
        }

        if self.size == 0 {
            return Err(OrbError::invalid_parameter(
                "size",
                "Element size must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Declare a `static` [`TopicMetadata`] for a sample type
///
/// ```
/// #[repr(C)]
/// struct SensorBaro { timestamp: u64, pressure: f32, temperature: f32 }
///
/// orbit::orb_topic!(SENSOR_BARO, "sensor_baro", SensorBaro);
/// assert_eq!(SENSOR_BARO.size(), 16);
/// ```
#[macro_export]
macro_rules! orb_topic {
    ($vis:vis $ident:ident, $name:expr, $ty:ty) => {
        $vis static $ident: $crate::TopicMetadata =
            $crate::TopicMetadata::new($name, ::std::mem::size_of::<$ty>());
    };
}
