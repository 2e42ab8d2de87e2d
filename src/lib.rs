//! # Orbit - Topic Lifecycle and Channel Broker
//!
//! Orbit is a lightweight publish/subscribe broker for fixed-size data
//! objects ("topics"), addressed by a topic name and an instance number.
//! Advertisers and subscribers never reference each other: they meet on a
//! shared channel owned by a transport, which may span processes.
//!
//! ## Features
//!
//! - **Exactly-once channel creation**: concurrent openers race on
//!   registration and the losers treat "already exists" as success
//! - **Role-bound handles**: an owned handle is either an advertiser or a
//!   subscriber and is released on drop
//! - **Instance groups**: several independent instances per topic type,
//!   enumerated by probing for active advertisers
//! - **Channel state**: rate limits, batching, queue depth, subscriber
//!   counts and a generation counter, always read fresh from the transport
//! - **Pluggable transports**: in-process channels for tests, file-backed
//!   shared memory for cross-process use
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                    Orb                          │
//! ├──────────────┬──────────────┬───────────────────┤
//! │  Resolver    │ Handle Mgr   │ State / Enumerate │
//! │  - paths     │ - roles      │ - raw state       │
//! │  - register  │ - first open │ - intervals       │
//! └──────────────┴──────────────┴───────────────────┘
//!           │                         │
//!           ▼                         ▼
//! ┌─────────────────────────────────────────────────┐
//! │      Transport (MemoryTransport / ShmTransport) │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use orbit::{Orb, TopicMetadata, transport::MemoryTransport};
//!
//! static SENSOR_TEMP: TopicMetadata = TopicMetadata::new("sensor_temp", 4);
//!
//! let orb = Orb::new(MemoryTransport::new());
//! let mut advertiser = orb.advertise(&SENSOR_TEMP, Some(&21.5f32.to_ne_bytes()[..])).unwrap();
//! let mut subscriber = orb.subscribe(&SENSOR_TEMP).unwrap();
//!
//! assert!(subscriber.check_updated().unwrap());
//! let mut buf = [0u8; 4];
//! subscriber.copy_sample(&mut buf).unwrap();
//! assert_eq!(f32::from_ne_bytes(buf), 21.5);
//!
//! advertiser.publish_sample(&22.0f32.to_ne_bytes()).unwrap();
//! assert_eq!(subscriber.state().unwrap().generation, 2);
//! ```

pub mod config;
pub mod enumerate;
pub mod error;
pub mod handles;
pub mod metadata;
pub mod orb;
pub mod registry;
pub mod state;
pub mod time;
pub mod transport;

// Main API re-exports
pub use config::OrbConfig;
pub use error::{OrbError, Result};
pub use handles::{HandleOf, OrbHandle, Role};
pub use metadata::TopicMetadata;
pub use orb::Orb;
pub use registry::{ChannelPath, Resolution};
pub use state::TopicState;
pub use time::{elapsed_since, monotonic_timestamp, AbsTime};
pub use transport::{
    Channel, ControlOp, ControlReply, MemoryTransport, OpenMode, OpenOptions, RawState,
    ShmTransport, Transport,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
