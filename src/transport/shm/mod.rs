//! File-backed shared-memory transport
//!
//! Every channel is a file under a root directory, mapped with `memmap2` by
//! each process that opens it. Registration builds the file under a private
//! temporary name and publishes it with a hard link, so a channel is either
//! absent or fully initialized and exactly one racing registrar wins.

pub mod channel;
pub mod header;

use std::{
    fs::{self, OpenOptions as FsOpenOptions},
    io,
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use memmap2::MmapOptions;

use crate::{config::DEFAULT_REGISTER_PATH, metadata::TopicMetadata};

use super::{OpenMode, OpenOptions, RegisterInfo, Transport};

pub use channel::ShmChannel;
pub use header::{ChannelHeader, CHANNEL_MAGIC, DATA_OFFSET, IDENTITY_CAPACITY};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Transport whose channels are files under `root`
#[derive(Debug, Clone)]
pub struct ShmTransport {
    root: PathBuf,
    register_path: String,
    permissions: u32,
}

impl ShmTransport {
    /// Create a transport rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            register_path: DEFAULT_REGISTER_PATH.to_string(),
            permissions: 0o666,
        })
    }

    /// Use a different registration endpoint path
    pub fn with_register_path(mut self, register_path: impl Into<String>) -> Self {
        self.register_path = register_path.into();
        self
    }

    /// Set the Unix permissions of channel files
    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    /// Root directory of this transport
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing the channel at `path`
    pub fn file_path(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    /// Read the identity attached to the channel at `path`
    pub fn identity(&self, path: &str) -> io::Result<Option<TopicMetadata>> {
        let channel = self.open(path, &OpenOptions::probe())?;
        channel.identity()
    }

    /// List channel paths below `prefix` (for example the broker base path)
    pub fn list(&self, prefix: &str) -> io::Result<Vec<String>> {
        let dir = self.file_path(prefix);
        let dir = if prefix.ends_with('/') {
            dir
        } else {
            dir.parent().map(Path::to_path_buf).unwrap_or(dir)
        };

        let mut paths = Vec::new();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(paths),
            Err(e) => return Err(e),
        };

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.file_type()?.is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map(|p| format!("/{}", p.to_string_lossy()))
                .unwrap_or_default();
            if relative.starts_with(prefix) {
                paths.push(relative);
            }
        }

        paths.sort();
        Ok(paths)
    }

    fn register(&self, info: &RegisterInfo) -> io::Result<()> {
        if info.esize == 0 || info.esize > u32::MAX as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unusable element size {}", info.esize),
            ));
        }
        if info.path == self.register_path {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot register over the registration endpoint",
            ));
        }

        let target = self.file_path(&info.path);
        if target.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already registered", info.path),
            ));
        }

        let parent = target.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;

        let temp = parent.join(format!(
            ".{}.{}.{}.tmp",
            target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let outcome = self
            .write_channel_file(&temp, info)
            .and_then(|()| fs::hard_link(&temp, &target));
        let _ = fs::remove_file(&temp);
        outcome
    }

    fn write_channel_file(&self, temp: &Path, info: &RegisterInfo) -> io::Result<()> {
        let nbuffer = info.nbuffer.max(1);
        let len = ChannelHeader::file_len(info.esize, nbuffer);

        let file = FsOpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .mode(self.permissions)
            .custom_flags(libc::O_CLOEXEC)
            .open(temp)?;
        file.set_len(len as u64)?;

        let mut mmap = unsafe { MmapOptions::new().len(len).map_mut(&file)? };
        let header = unsafe { &mut *(mmap.as_mut_ptr() as *mut ChannelHeader) };
        header.initialize(info.esize as u32, nbuffer);
        mmap.flush()?;

        Ok(())
    }
}

impl Transport for ShmTransport {
    type Channel = ShmChannel;

    fn exists(&self, path: &str) -> bool {
        path == self.register_path || self.file_path(path).is_file()
    }

    fn open(&self, path: &str, options: &OpenOptions) -> io::Result<ShmChannel> {
        let is_endpoint = path == self.register_path;

        match (options.mode, is_endpoint) {
            (OpenMode::Control, true) => Ok(ShmChannel::endpoint(self.clone())),
            (OpenMode::Control, false) => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a registration endpoint", path),
            )),
            (mode, true) => Err(super::permission_denied(
                mode,
                "open the registration endpoint",
            )),
            (mode, false) => ShmChannel::attach(&self.file_path(path), mode, options.cloexec),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Channel, ControlOp};
    use tempfile::TempDir;

    fn register(transport: &ShmTransport, path: &str, esize: usize) -> io::Result<()> {
        let mut endpoint = transport.open(DEFAULT_REGISTER_PATH, &OpenOptions::control())?;
        endpoint
            .control(ControlOp::Register(RegisterInfo {
                path: path.to_string(),
                esize,
                nbuffer: 0,
            }))
            .map(|_| ())
    }

    #[test]
    fn test_register_creates_file_once() {
        let temp_dir = TempDir::new().unwrap();
        let transport = ShmTransport::new(temp_dir.path()).unwrap();

        assert!(!transport.exists("/dev/uorb/baro0"));
        register(&transport, "/dev/uorb/baro0", 8).unwrap();
        assert!(transport.exists("/dev/uorb/baro0"));

        let err = register(&transport, "/dev/uorb/baro0", 8).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

        // No temporary files are left behind
        assert_eq!(transport.list("/dev/uorb/").unwrap(), vec!["/dev/uorb/baro0"]);
    }

    #[test]
    fn test_open_missing_channel() {
        let temp_dir = TempDir::new().unwrap();
        let transport = ShmTransport::new(temp_dir.path()).unwrap();

        let err = transport
            .open("/dev/uorb/missing0", &OpenOptions::subscriber())
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
