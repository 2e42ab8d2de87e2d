//! Owned advertiser/subscriber handles

use std::time::Duration;

use crate::{
    error::{OrbError, Result},
    metadata::TopicMetadata,
    registry::ChannelPath,
    transport::{Channel, OpenOptions},
};

/// Role a handle was opened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Producer; write-only
    Advertiser,
    /// Consumer; read-only
    Subscriber,
}

impl Role {
    /// Transport open options for this role
    pub fn open_options(&self) -> OpenOptions {
        match self {
            Role::Advertiser => OpenOptions::advertiser(),
            Role::Subscriber => OpenOptions::subscriber(),
        }
    }

    /// Get a human-readable name for the role
    pub fn name(&self) -> &'static str {
        match self {
            Role::Advertiser => "advertiser",
            Role::Subscriber => "subscriber",
        }
    }
}

/// One open attachment to a topic channel in exactly one role
///
/// Dropping the handle releases the attachment; [`OrbHandle::close`] does
/// the same and reports the transport's result.
#[derive(Debug)]
pub struct OrbHandle<C: Channel> {
    channel: C,
    role: Role,
    meta: TopicMetadata,
    path: ChannelPath,
    instance: u32,
}

impl<C: Channel> OrbHandle<C> {
    pub(crate) fn new(
        channel: C,
        role: Role,
        meta: TopicMetadata,
        path: ChannelPath,
        instance: u32,
    ) -> Self {
        Self {
            channel,
            role,
            meta,
            path,
            instance,
        }
    }

    /// Role this handle was opened in
    pub fn role(&self) -> Role {
        self.role
    }

    /// Metadata of the topic
    pub fn metadata(&self) -> &TopicMetadata {
        &self.meta
    }

    /// Channel path
    pub fn path(&self) -> &ChannelPath {
        &self.path
    }

    /// Instance number
    pub fn instance(&self) -> u32 {
        self.instance
    }

    /// Write `data` as one sample, returning the bytes written
    pub fn publish(&mut self, data: &[u8]) -> Result<usize> {
        self.channel
            .write(data)
            .map_err(|e| OrbError::from_io(e, &format!("publish to {}", self.path)))
    }

    /// Publish exactly one element of the topic's size
    pub fn publish_sample(&mut self, data: &[u8]) -> Result<()> {
        let expected = self.meta.size();
        if data.len() != expected {
            return Err(OrbError::invalid_parameter(
                "data",
                format!("sample is {} bytes, {} expects {}", data.len(), self.meta.name(), expected),
            ));
        }

        let written = self.publish(data)?;
        if written != expected {
            return Err(OrbError::short_write(self.meta.name(), written, expected));
        }
        Ok(())
    }

    /// Copy the next sample into `buf`, returning the bytes read
    pub fn copy_out(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.channel
            .read(buf)
            .map_err(|e| OrbError::from_io(e, &format!("copy from {}", self.path)))
    }

    /// Copy exactly one element of the topic's size
    pub fn copy_sample(&mut self, buf: &mut [u8]) -> Result<()> {
        let expected = self.meta.size();
        if buf.len() != expected {
            return Err(OrbError::invalid_parameter(
                "buffer",
                format!("buffer is {} bytes, {} expects {}", buf.len(), self.meta.name(), expected),
            ));
        }

        let read = self.copy_out(buf)?;
        if read != expected {
            return Err(OrbError::invalid_parameter(
                "buffer",
                format!("read {} bytes from {}, expected {}", read, self.path, expected),
            ));
        }
        Ok(())
    }

    /// Whether unread data is available; never blocks and never consumes
    pub fn check_updated(&mut self) -> Result<bool> {
        self.channel
            .poll_readable(Duration::ZERO)
            .map_err(|e| OrbError::from_io(e, &format!("poll {}", self.path)))
    }

    /// Release the attachment
    pub fn close(self) -> Result<()> {
        let path = self.path;
        self.channel
            .close()
            .map_err(|e| OrbError::from_io(e, &format!("close {}", path)))
    }

    pub(crate) fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }
}
