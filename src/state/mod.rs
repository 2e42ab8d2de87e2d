//! Topic state: raw control translation, interval configuration and probing

pub mod control;
pub mod probe;
pub mod types;

pub use types::TopicState;
