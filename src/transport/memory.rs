//! In-process transport
//!
//! Channels live in a process-wide map shared by every clone of a
//! [`MemoryTransport`]. Each channel keeps a ring of `nbuffer` samples, a
//! generation counter and one record per open attachment, so subscribers
//! track their own read cursor and interval settings.

use std::{
    collections::HashMap,
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Condvar, Mutex, MutexGuard,
    },
    time::{Duration, Instant},
};

use crate::{config::DEFAULT_REGISTER_PATH, metadata::TopicMetadata};

use super::{
    permission_denied, unsupported, Channel, ControlOp, ControlReply, OpenMode, OpenOptions,
    RawState, RegisterInfo, Transport,
};

/// In-process transport with resource accounting and fault injection
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    register_path: String,
    nodes: Mutex<HashMap<String, Arc<Node>>>,
    open_channels: AtomicUsize,
    registrations: AtomicUsize,
    register_fault: Mutex<Option<io::ErrorKind>>,
    write_limit: Mutex<Option<usize>>,
}

#[derive(Debug)]
struct Node {
    state: Mutex<NodeState>,
    readable: Condvar,
}

#[derive(Debug)]
struct NodeState {
    esize: usize,
    nbuffer: u32,
    ring: Vec<u8>,
    generation: u64,
    identity: Option<TopicMetadata>,
    users: HashMap<u64, UserRecord>,
    next_user: u64,
}

#[derive(Debug, Clone, Copy)]
struct UserRecord {
    mode: OpenMode,
    cursor: u64,
    interval: u32,
    latency: u32,
}

impl NodeState {
    fn new(esize: usize, nbuffer: u32) -> Self {
        let nbuffer = nbuffer.max(1);
        Self {
            esize,
            nbuffer,
            ring: vec![0; esize * nbuffer as usize],
            generation: 0,
            identity: None,
            users: HashMap::new(),
            next_user: 1,
        }
    }

    fn count(&self, mode: OpenMode) -> u32 {
        self.users.values().filter(|u| u.mode == mode).count() as u32
    }

    fn raw_state(&self) -> RawState {
        let min_nonzero = |f: fn(&UserRecord) -> u32| {
            self.users.values().map(f).filter(|v| *v != 0).min().unwrap_or(0)
        };

        RawState {
            min_interval: min_nonzero(|u| u.interval),
            min_latency: min_nonzero(|u| u.latency),
            nbuffer: self.nbuffer,
            nsubscribers: self.count(OpenMode::Subscriber),
            nadvertisers: self.count(OpenMode::Advertiser),
            generation: self.generation,
        }
    }

    fn has_unread(&self, user: u64) -> bool {
        self.users
            .get(&user)
            .map(|u| u.mode == OpenMode::Subscriber && u.cursor < self.generation)
            .unwrap_or(false)
    }
}

impl MemoryTransport {
    /// Create a transport with the default registration endpoint
    pub fn new() -> Self {
        Self::with_register_path(DEFAULT_REGISTER_PATH)
    }

    /// Create a transport whose registration endpoint lives at `register_path`
    pub fn with_register_path(register_path: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                register_path: register_path.into(),
                nodes: Mutex::new(HashMap::new()),
                open_channels: AtomicUsize::new(0),
                registrations: AtomicUsize::new(0),
                register_fault: Mutex::new(None),
                write_limit: Mutex::new(None),
            }),
        }
    }

    /// Number of attachments (including registration endpoints) currently open
    pub fn open_channels(&self) -> usize {
        self.shared.open_channels.load(Ordering::SeqCst)
    }

    /// Number of successful registrations
    pub fn registrations(&self) -> usize {
        self.shared.registrations.load(Ordering::SeqCst)
    }

    /// Number of channels that exist
    pub fn channel_count(&self) -> usize {
        lock(&self.shared.nodes).len()
    }

    /// Identity attached to the channel at `path`, if any
    pub fn identity(&self, path: &str) -> Option<TopicMetadata> {
        let node = lock(&self.shared.nodes).get(path).cloned()?;
        let state = lock(&node.state);
        state.identity.clone()
    }

    /// Make the next registration fail with `kind`
    pub fn fail_next_register(&self, kind: io::ErrorKind) {
        *lock(&self.shared.register_fault) = Some(kind);
    }

    /// Cap every write at `limit` bytes; a capped write publishes nothing
    pub fn limit_writes(&self, limit: Option<usize>) {
        *lock(&self.shared.write_limit) = limit;
    }

    fn register(&self, info: RegisterInfo) -> io::Result<()> {
        if let Some(kind) = lock(&self.shared.register_fault).take() {
            return Err(io::Error::new(kind, "injected registration failure"));
        }

        if info.esize == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "element size must be greater than 0",
            ));
        }

        if info.path == self.shared.register_path {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot register over the registration endpoint",
            ));
        }

        let mut nodes = lock(&self.shared.nodes);
        if nodes.contains_key(&info.path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already registered", info.path),
            ));
        }

        nodes.insert(
            info.path,
            Arc::new(Node {
                state: Mutex::new(NodeState::new(info.esize, info.nbuffer)),
                readable: Condvar::new(),
            }),
        );
        self.shared.registrations.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    type Channel = MemoryChannel;

    fn exists(&self, path: &str) -> bool {
        path == self.shared.register_path || lock(&self.shared.nodes).contains_key(path)
    }

    fn open(&self, path: &str, options: &OpenOptions) -> io::Result<MemoryChannel> {
        let is_endpoint = path == self.shared.register_path;

        let node = match (options.mode, is_endpoint) {
            (OpenMode::Control, true) => None,
            (OpenMode::Control, false) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} is not a registration endpoint", path),
                ))
            }
            (mode, true) => return Err(permission_denied(mode, "open the registration endpoint")),
            (_, false) => Some(
                lock(&self.shared.nodes)
                    .get(path)
                    .cloned()
                    .ok_or_else(|| {
                        io::Error::new(io::ErrorKind::NotFound, format!("{} does not exist", path))
                    })?,
            ),
        };

        let user = match &node {
            Some(node) => {
                let mut state = lock(&node.state);
                let user = state.next_user;
                state.next_user += 1;
                let cursor = state.generation.saturating_sub(1);
                state.users.insert(
                    user,
                    UserRecord {
                        mode: options.mode,
                        cursor,
                        interval: 0,
                        latency: 0,
                    },
                );
                user
            }
            None => 0,
        };

        self.shared.open_channels.fetch_add(1, Ordering::SeqCst);

        Ok(MemoryChannel {
            transport: self.clone(),
            node,
            user,
            mode: options.mode,
            released: false,
        })
    }
}

/// Attachment to a [`MemoryTransport`] channel
#[derive(Debug)]
pub struct MemoryChannel {
    transport: MemoryTransport,
    node: Option<Arc<Node>>,
    user: u64,
    mode: OpenMode,
    released: bool,
}

impl MemoryChannel {
    fn node(&self, op: &ControlOp) -> io::Result<&Arc<Node>> {
        self.node.as_ref().ok_or_else(|| unsupported(op))
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Some(node) = &self.node {
            lock(&node.state).users.remove(&self.user);
        }
        self.transport
            .shared
            .open_channels
            .fetch_sub(1, Ordering::SeqCst);
    }
}

impl Channel for MemoryChannel {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.mode != OpenMode::Advertiser {
            return Err(permission_denied(self.mode, "write"));
        }
        let node = self
            .node
            .as_ref()
            .ok_or_else(|| permission_denied(self.mode, "write"))?;

        if let Some(limit) = *lock(&self.transport.shared.write_limit) {
            if limit < data.len() {
                return Ok(limit);
            }
        }

        let mut state = lock(&node.state);
        if data.len() != state.esize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("sample is {} bytes, channel expects {}", data.len(), state.esize),
            ));
        }

        let esize = state.esize;
        let slot = (state.generation % state.nbuffer as u64) as usize;
        state.ring[slot * esize..(slot + 1) * esize].copy_from_slice(data);
        state.generation += 1;
        drop(state);

        node.readable.notify_all();
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.mode != OpenMode::Subscriber {
            return Err(permission_denied(self.mode, "read"));
        }
        let node = self
            .node
            .as_ref()
            .ok_or_else(|| permission_denied(self.mode, "read"))?;

        let mut state = lock(&node.state);
        if buf.len() < state.esize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("buffer is {} bytes, channel sample is {}", buf.len(), state.esize),
            ));
        }

        while !state.has_unread(self.user) {
            state = node
                .readable
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }

        let generation = state.generation;
        let nbuffer = state.nbuffer as u64;
        let esize = state.esize;
        let oldest = generation.saturating_sub(nbuffer);

        let user = state
            .users
            .get_mut(&self.user)
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "attachment released"))?;
        let cursor = user.cursor.max(oldest);
        user.cursor = cursor + 1;

        let slot = (cursor % nbuffer) as usize;
        buf[..esize].copy_from_slice(&state.ring[slot * esize..(slot + 1) * esize]);
        Ok(esize)
    }

    fn control(&mut self, op: ControlOp) -> io::Result<ControlReply> {
        if self.mode == OpenMode::Control {
            return match op {
                ControlOp::Register(info) => {
                    self.transport.register(info)?;
                    Ok(ControlReply::Done)
                }
                other => Err(unsupported(&other)),
            };
        }

        let node = self.node(&op)?;
        let mut state = lock(&node.state);

        match op {
            ControlOp::AttachIdentity(meta) => {
                state.identity = Some(meta);
                Ok(ControlReply::Done)
            }
            ControlOp::SetBufferDepth(depth) => {
                // Fixed once published to, or once a second advertiser exists
                let resizable = self.mode == OpenMode::Advertiser
                    && depth > 0
                    && state.generation == 0
                    && state.count(OpenMode::Advertiser) == 1;
                if resizable && depth != state.nbuffer {
                    let esize = state.esize;
                    state.nbuffer = depth;
                    state.ring = vec![0; esize * depth as usize];
                }
                Ok(ControlReply::Done)
            }
            ControlOp::GetRawState => Ok(ControlReply::State(state.raw_state())),
            ControlOp::SetMinInterval(interval) => {
                if let Some(user) = state.users.get_mut(&self.user) {
                    user.interval = interval;
                }
                Ok(ControlReply::Done)
            }
            ControlOp::SetBatchLimit(latency) => {
                if let Some(user) = state.users.get_mut(&self.user) {
                    user.latency = latency;
                }
                Ok(ControlReply::Done)
            }
            other => Err(unsupported(&other)),
        }
    }

    fn poll_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        let node = match &self.node {
            Some(node) => node,
            None => return Ok(false),
        };

        let mut state = lock(&node.state);
        if state.has_unread(self.user) || timeout.is_zero() {
            return Ok(state.has_unread(self.user));
        }

        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            let (guard, _) = node
                .readable
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state = guard;
            if state.has_unread(self.user) {
                return Ok(true);
            }
        }
    }

    fn close(mut self) -> io::Result<()> {
        self.release();
        Ok(())
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        self.release();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(transport: &MemoryTransport, path: &str, esize: usize, nbuffer: u32) {
        let mut endpoint = transport
            .open(DEFAULT_REGISTER_PATH, &OpenOptions::control())
            .unwrap();
        endpoint
            .control(ControlOp::Register(RegisterInfo {
                path: path.to_string(),
                esize,
                nbuffer,
            }))
            .unwrap();
    }

    #[test]
    fn test_register_once() {
        let transport = MemoryTransport::new();
        registered(&transport, "/dev/uorb/imu0", 4, 0);

        let mut endpoint = transport
            .open(DEFAULT_REGISTER_PATH, &OpenOptions::control())
            .unwrap();
        let err = endpoint
            .control(ControlOp::Register(RegisterInfo {
                path: "/dev/uorb/imu0".to_string(),
                esize: 4,
                nbuffer: 0,
            }))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(transport.registrations(), 1);
    }

    #[test]
    fn test_counts_follow_attachments() {
        let transport = MemoryTransport::new();
        registered(&transport, "/dev/uorb/imu0", 4, 0);

        let advertiser = transport
            .open("/dev/uorb/imu0", &OpenOptions::advertiser())
            .unwrap();
        let mut probe = transport
            .open("/dev/uorb/imu0", &OpenOptions::probe())
            .unwrap();

        let state = probe.control(ControlOp::GetRawState).unwrap().into_state().unwrap();
        assert_eq!(state.nadvertisers, 1);
        assert_eq!(state.nsubscribers, 0);
        assert_eq!(state.nbuffer, 1);

        drop(advertiser);
        let state = probe.control(ControlOp::GetRawState).unwrap().into_state().unwrap();
        assert_eq!(state.nadvertisers, 0);

        probe.close().unwrap();
        assert_eq!(transport.open_channels(), 0);
    }

    #[test]
    fn test_lapped_reader_skips_to_oldest() {
        let transport = MemoryTransport::new();
        registered(&transport, "/dev/uorb/imu0", 1, 2);

        let mut subscriber = transport
            .open("/dev/uorb/imu0", &OpenOptions::subscriber())
            .unwrap();
        let mut advertiser = transport
            .open("/dev/uorb/imu0", &OpenOptions::advertiser())
            .unwrap();

        for value in 1..=5u8 {
            advertiser.write(&[value]).unwrap();
        }

        let mut buf = [0u8; 1];
        subscriber.read(&mut buf).unwrap();
        assert_eq!(buf[0], 4);
        subscriber.read(&mut buf).unwrap();
        assert_eq!(buf[0], 5);
        assert!(!subscriber.poll_readable(Duration::ZERO).unwrap());
    }

    #[test]
    fn test_buffer_depth_fixed_after_publish() {
        let transport = MemoryTransport::new();
        registered(&transport, "/dev/uorb/imu0", 1, 0);

        let mut advertiser = transport
            .open("/dev/uorb/imu0", &OpenOptions::advertiser())
            .unwrap();
        advertiser.control(ControlOp::SetBufferDepth(4)).unwrap();
        advertiser.write(&[1]).unwrap();
        advertiser.control(ControlOp::SetBufferDepth(8)).unwrap();

        let state = advertiser
            .control(ControlOp::GetRawState)
            .unwrap()
            .into_state()
            .unwrap();
        assert_eq!(state.nbuffer, 4);
    }

    #[test]
    fn test_role_enforcement() {
        let transport = MemoryTransport::new();
        registered(&transport, "/dev/uorb/imu0", 1, 0);

        let mut subscriber = transport
            .open("/dev/uorb/imu0", &OpenOptions::subscriber())
            .unwrap();
        let err = subscriber.write(&[1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);

        let mut advertiser = transport
            .open("/dev/uorb/imu0", &OpenOptions::advertiser())
            .unwrap();
        let err = advertiser.read(&mut [0u8; 1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }
}
