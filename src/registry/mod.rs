//! Resolution of (topic, instance) pairs to channels

pub mod path;
pub mod resolver;

pub use path::ChannelPath;
pub use resolver::Resolution;
