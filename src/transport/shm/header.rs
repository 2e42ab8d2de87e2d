//! On-disk layout of a shared-memory channel
//!
//! ```text
//! ┌──────────────────────┬────────────────────┬───────────────────────────┐
//! │ ChannelHeader (64 B) │ identity (256 B)   │ ring: capacity × esize    │
//! └──────────────────────┴────────────────────┴───────────────────────────┘
//! ```

use std::{
    io,
    mem::size_of,
    sync::atomic::{AtomicU32, AtomicU64, Ordering},
};

/// Magic number identifying a channel file
pub const CHANNEL_MAGIC: u64 = 0x4F52_4249_5443_4831; // "ORBITCH1"

/// Layout version
pub const CHANNEL_VERSION: u32 = 1;

/// Bytes reserved for the bincode-encoded topic identity
pub const IDENTITY_CAPACITY: usize = 256;

/// Offset of the identity area
pub const IDENTITY_OFFSET: usize = size_of::<ChannelHeader>();

/// Offset of the first ring slot
pub const DATA_OFFSET: usize = IDENTITY_OFFSET + IDENTITY_CAPACITY;

/// Header at the start of every channel file; all mutable fields are atomics
#[repr(C)]
pub struct ChannelHeader {
    pub magic: u64,
    pub version: u32,
    pub esize: u32,
    /// Slots allocated in the file
    pub capacity: AtomicU32,
    /// Slots in use
    pub nbuffer: AtomicU32,
    pub nsubscribers: AtomicU32,
    pub nadvertisers: AtomicU32,
    pub min_interval: AtomicU32,
    pub min_latency: AtomicU32,
    pub identity_len: AtomicU32,
    _reserved: u32,
    /// Samples published and visible to readers
    pub generation: AtomicU64,
    /// Slots claimed by writers; runs ahead of `generation` during a write
    pub write_seq: AtomicU64,
}

const _: () = assert!(size_of::<ChannelHeader>() == 64);

impl ChannelHeader {
    /// Initialize a header in freshly zeroed memory
    pub fn initialize(&mut self, esize: u32, nbuffer: u32) {
        self.magic = CHANNEL_MAGIC;
        self.version = CHANNEL_VERSION;
        self.esize = esize;
        self.capacity = AtomicU32::new(nbuffer);
        self.nbuffer = AtomicU32::new(nbuffer);
        self.nsubscribers = AtomicU32::new(0);
        self.nadvertisers = AtomicU32::new(0);
        self.min_interval = AtomicU32::new(0);
        self.min_latency = AtomicU32::new(0);
        self.identity_len = AtomicU32::new(0);
        self._reserved = 0;
        self.generation = AtomicU64::new(0);
        self.write_seq = AtomicU64::new(0);
    }

    /// Validate the header magic and version
    pub fn validate(&self) -> io::Result<()> {
        if self.magic != CHANNEL_MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "invalid channel magic number",
            ));
        }
        if self.version != CHANNEL_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported channel layout version {}", self.version),
            ));
        }
        if self.esize == 0 || self.capacity.load(Ordering::Acquire) == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "channel header has zero element size or capacity",
            ));
        }
        Ok(())
    }

    /// File length needed for `capacity` slots
    pub fn file_len(esize: usize, capacity: u32) -> usize {
        DATA_OFFSET + esize * capacity as usize
    }
}
