//! Attachment to a shared-memory channel file

use std::{
    fs::{File, OpenOptions as FsOpenOptions},
    io,
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
    ptr,
    sync::atomic::Ordering,
    thread,
    time::{Duration, Instant},
};

use memmap2::{MmapMut, MmapOptions};

use crate::{
    metadata::TopicMetadata,
    transport::{
        permission_denied, unsupported, Channel, ControlOp, ControlReply, OpenMode, RawState,
    },
};

use super::{
    header::{ChannelHeader, DATA_OFFSET, IDENTITY_CAPACITY, IDENTITY_OFFSET},
    ShmTransport,
};

/// Sleep between readiness checks while blocking
const POLL_SLEEP: Duration = Duration::from_micros(100);

/// Attachment to a [`ShmTransport`] channel or its registration endpoint
#[derive(Debug)]
pub struct ShmChannel {
    kind: ChannelKind,
}

#[derive(Debug)]
enum ChannelKind {
    Endpoint(ShmTransport),
    Topic(Mapping),
    Released,
}

#[derive(Debug)]
struct Mapping {
    path: PathBuf,
    file: File,
    mmap: MmapMut,
    mode: OpenMode,
    cursor: u64,
}

impl ShmChannel {
    pub(super) fn endpoint(transport: ShmTransport) -> Self {
        Self {
            kind: ChannelKind::Endpoint(transport),
        }
    }

    pub(super) fn attach(path: &Path, mode: OpenMode, cloexec: bool) -> io::Result<Self> {
        let flags = if cloexec { libc::O_CLOEXEC } else { 0 };
        let file = FsOpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(flags)
            .open(path)?;

        let len = file.metadata()?.len() as usize;
        if len < DATA_OFFSET {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is too short to be a channel", path.display()),
            ));
        }

        let mmap = unsafe { MmapOptions::new().len(len).map_mut(&file)? };
        let mut mapping = Mapping {
            path: path.to_path_buf(),
            file,
            mmap,
            mode,
            cursor: 0,
        };
        mapping.header().validate()?;

        let generation = mapping.header().generation.load(Ordering::Acquire);
        mapping.cursor = generation.saturating_sub(1);

        let header = mapping.header();
        match mode {
            OpenMode::Advertiser => {
                header.nadvertisers.fetch_add(1, Ordering::AcqRel);
            }
            OpenMode::Subscriber => {
                header.nsubscribers.fetch_add(1, Ordering::AcqRel);
            }
            OpenMode::Probe | OpenMode::Control => {}
        }

        Ok(Self {
            kind: ChannelKind::Topic(mapping),
        })
    }

    /// Identity attached to this channel, if any
    pub fn identity(&self) -> io::Result<Option<TopicMetadata>> {
        match &self.kind {
            ChannelKind::Topic(mapping) => mapping.identity(),
            _ => Ok(None),
        }
    }

    fn mapping(&mut self, op: &ControlOp) -> io::Result<&mut Mapping> {
        match &mut self.kind {
            ChannelKind::Topic(mapping) => Ok(mapping),
            _ => Err(unsupported(op)),
        }
    }

    fn release(&mut self) {
        if let ChannelKind::Topic(mapping) = &self.kind {
            let header = mapping.header();
            match mapping.mode {
                OpenMode::Advertiser => {
                    header.nadvertisers.fetch_sub(1, Ordering::AcqRel);
                }
                OpenMode::Subscriber => {
                    header.nsubscribers.fetch_sub(1, Ordering::AcqRel);
                }
                OpenMode::Probe | OpenMode::Control => {}
            }
        }
        self.kind = ChannelKind::Released;
    }
}

impl Mapping {
    fn header(&self) -> &ChannelHeader {
        unsafe { &*(self.mmap.as_ptr() as *const ChannelHeader) }
    }

    fn esize(&self) -> usize {
        self.header().esize as usize
    }

    /// Remap if another process grew the ring beyond our mapping
    fn ensure_mapped(&mut self, nbuffer: u32) -> io::Result<()> {
        let needed = ChannelHeader::file_len(self.esize(), nbuffer);
        if needed <= self.mmap.len() {
            return Ok(());
        }
        let len = self.file.metadata()?.len() as usize;
        if len < needed {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is shorter than its ring", self.path.display()),
            ));
        }
        self.mmap = unsafe { MmapOptions::new().len(len).map_mut(&self.file)? };
        Ok(())
    }

    fn slot_offset(&self, seq: u64, nbuffer: u32) -> usize {
        DATA_OFFSET + (seq % nbuffer as u64) as usize * self.esize()
    }

    fn raw_state(&self) -> RawState {
        let header = self.header();
        RawState {
            min_interval: header.min_interval.load(Ordering::Acquire),
            min_latency: header.min_latency.load(Ordering::Acquire),
            nbuffer: header.nbuffer.load(Ordering::Acquire),
            nsubscribers: header.nsubscribers.load(Ordering::Acquire),
            nadvertisers: header.nadvertisers.load(Ordering::Acquire),
            generation: header.generation.load(Ordering::Acquire),
        }
    }

    fn has_unread(&self) -> bool {
        self.mode == OpenMode::Subscriber
            && self.cursor < self.header().generation.load(Ordering::Acquire)
    }

    fn identity(&self) -> io::Result<Option<TopicMetadata>> {
        let len = self.header().identity_len.load(Ordering::Acquire) as usize;
        if len == 0 {
            return Ok(None);
        }
        let bytes = &self.mmap[IDENTITY_OFFSET..IDENTITY_OFFSET + len.min(IDENTITY_CAPACITY)];
        bincode::deserialize(bytes)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn attach_identity(&mut self, meta: &TopicMetadata) -> io::Result<()> {
        let encoded =
            bincode::serialize(meta).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if encoded.len() > IDENTITY_CAPACITY {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "identity of {} is {} bytes, capacity is {}",
                    meta.name(),
                    encoded.len(),
                    IDENTITY_CAPACITY
                ),
            ));
        }
        // Racing first openers write identical bytes
        self.mmap[IDENTITY_OFFSET..IDENTITY_OFFSET + encoded.len()].copy_from_slice(&encoded);
        self.header()
            .identity_len
            .store(encoded.len() as u32, Ordering::Release);
        Ok(())
    }

    fn set_buffer_depth(&mut self, depth: u32) -> io::Result<()> {
        let header = self.header();
        let resizable = self.mode == OpenMode::Advertiser
            && depth > 0
            && header.nadvertisers.load(Ordering::Acquire) == 1
            && header.write_seq.load(Ordering::Acquire) == 0;
        if !resizable || depth == header.nbuffer.load(Ordering::Acquire) {
            return Ok(());
        }

        if depth > header.capacity.load(Ordering::Acquire) {
            let len = ChannelHeader::file_len(self.esize(), depth);
            self.file.set_len(len as u64)?;
            self.mmap = unsafe { MmapOptions::new().len(len).map_mut(&self.file)? };
            self.header().capacity.store(depth, Ordering::Release);
        }
        self.header().nbuffer.store(depth, Ordering::Release);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.mode != OpenMode::Advertiser {
            return Err(permission_denied(self.mode, "write"));
        }
        let esize = self.esize();
        if data.len() != esize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("sample is {} bytes, channel expects {}", data.len(), esize),
            ));
        }

        let nbuffer = self.header().nbuffer.load(Ordering::Acquire);
        self.ensure_mapped(nbuffer)?;

        let claim = self.header().write_seq.fetch_add(1, Ordering::AcqRel);

        // The slot is free once the claim that last used it is published
        let header = self.header();
        while header.generation.load(Ordering::Acquire) + (nbuffer as u64) <= claim {
            thread::yield_now();
        }

        let offset = self.slot_offset(claim, nbuffer);
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), self.mmap.as_mut_ptr().add(offset), esize);
        }

        // Publish in claim order
        let header = self.header();
        while header.generation.load(Ordering::Acquire) != claim {
            thread::yield_now();
        }
        header.generation.store(claim + 1, Ordering::Release);

        Ok(esize)
    }

    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        let esize = self.esize();
        let header = self.header();
        let generation = header.generation.load(Ordering::Acquire);
        if self.cursor >= generation {
            return Ok(None);
        }

        let nbuffer = header.nbuffer.load(Ordering::Acquire) as u64;
        let claimed = header.write_seq.load(Ordering::Acquire);
        let oldest = claimed.saturating_sub(nbuffer);
        let cursor = self.cursor.max(oldest);
        if cursor >= generation {
            return Ok(None);
        }

        self.ensure_mapped(nbuffer as u32)?;
        let offset = self.slot_offset(cursor, nbuffer as u32);
        unsafe {
            ptr::copy_nonoverlapping(self.mmap.as_ptr().add(offset), buf.as_mut_ptr(), esize);
        }

        // A writer lapped us while copying: the slot may be torn
        if self.header().write_seq.load(Ordering::Acquire) > cursor + nbuffer {
            self.cursor = cursor + 1;
            return Ok(None);
        }

        self.cursor = cursor + 1;
        Ok(Some(esize))
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.mode != OpenMode::Subscriber {
            return Err(permission_denied(self.mode, "read"));
        }
        let esize = self.esize();
        if buf.len() < esize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("buffer is {} bytes, channel sample is {}", buf.len(), esize),
            ));
        }

        loop {
            if let Some(n) = self.try_read(buf)? {
                return Ok(n);
            }
            thread::sleep(POLL_SLEEP);
        }
    }
}

impl Channel for ShmChannel {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match &mut self.kind {
            ChannelKind::Topic(mapping) => mapping.write(data),
            _ => Err(permission_denied(OpenMode::Control, "write")),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.kind {
            ChannelKind::Topic(mapping) => mapping.read(buf),
            _ => Err(permission_denied(OpenMode::Control, "read")),
        }
    }

    fn control(&mut self, op: ControlOp) -> io::Result<ControlReply> {
        if let ChannelKind::Endpoint(transport) = &self.kind {
            return match op {
                ControlOp::Register(info) => {
                    transport.register(&info)?;
                    Ok(ControlReply::Done)
                }
                other => Err(unsupported(&other)),
            };
        }

        let mapping = self.mapping(&op)?;
        match op {
            ControlOp::AttachIdentity(meta) => {
                mapping.attach_identity(&meta)?;
                Ok(ControlReply::Done)
            }
            ControlOp::SetBufferDepth(depth) => {
                mapping.set_buffer_depth(depth)?;
                Ok(ControlReply::Done)
            }
            ControlOp::GetRawState => Ok(ControlReply::State(mapping.raw_state())),
            ControlOp::SetMinInterval(interval) => {
                mapping
                    .header()
                    .min_interval
                    .store(interval, Ordering::Release);
                Ok(ControlReply::Done)
            }
            ControlOp::SetBatchLimit(latency) => {
                mapping
                    .header()
                    .min_latency
                    .store(latency, Ordering::Release);
                Ok(ControlReply::Done)
            }
            other => Err(unsupported(&other)),
        }
    }

    fn poll_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        let mapping = match &self.kind {
            ChannelKind::Topic(mapping) => mapping,
            _ => return Ok(false),
        };

        let deadline = Instant::now() + timeout;
        loop {
            if mapping.has_unread() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            thread::sleep(POLL_SLEEP);
        }
    }

    fn close(mut self) -> io::Result<()> {
        self.release();
        Ok(())
    }
}

impl Drop for ShmChannel {
    fn drop(&mut self) {
        self.release();
    }
}
