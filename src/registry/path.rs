//! Typed channel path builder

use std::fmt;

use crate::{
    config::OrbConfig,
    error::{OrbError, Result},
    metadata::TopicMetadata,
};

/// Path of the channel backing one (topic, instance) pair
///
/// Built as `<base><name><instance>`, with the instance in plain decimal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelPath(String);

impl ChannelPath {
    /// Build the path for `meta` and `instance` under `config`
    pub fn build(config: &OrbConfig, meta: &TopicMetadata, instance: u32) -> Result<Self> {
        meta.validate()?;

        let mut path =
            String::with_capacity(config.base_path.len() + meta.name().len() + 10);
        path.push_str(&config.base_path);
        path.push_str(meta.name());
        path.push_str(&instance.to_string());

        if path.len() > config.max_path_len {
            return Err(OrbError::path_too_long(path, config.max_path_len));
        }

        Ok(Self(path))
    }

    /// Path as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ChannelPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ChannelPath> for String {
    fn from(path: ChannelPath) -> Self {
        path.0
    }
}
