//! Topic registry resolver: path derivation and exactly-once channel creation

use std::io;

use log::debug;

use crate::{
    error::{OrbError, Result},
    metadata::TopicMetadata,
    orb::Orb,
    transport::{Channel, ControlOp, OpenOptions, RegisterInfo, Transport},
};

use super::path::ChannelPath;

/// Outcome of [`Orb::resolve_and_ensure`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Path of the (now existing) channel
    pub path: ChannelPath,
    /// The channel was absent when checked, so this caller attempted creation.
    /// Several racing callers may all see `true`.
    pub first_open: bool,
}

impl<T: Transport> Orb<T> {
    /// Derive the channel path for (`meta`, `instance`)
    pub fn channel_path(&self, meta: &TopicMetadata, instance: u32) -> Result<ChannelPath> {
        ChannelPath::build(self.config(), meta, instance)
    }

    /// Resolve the channel for (`meta`, `instance`), registering it if absent
    ///
    /// `queue_size` is the requested buffer depth for a newly registered
    /// channel; 0 selects the transport default. Losing a registration race
    /// is not an error.
    pub fn resolve_and_ensure(
        &self,
        meta: &TopicMetadata,
        instance: u32,
        queue_size: u32,
    ) -> Result<Resolution> {
        let path = self.channel_path(meta, instance)?;

        if self.transport().exists(path.as_str()) {
            return Ok(Resolution {
                path,
                first_open: false,
            });
        }

        self.register(RegisterInfo {
            path: path.to_string(),
            esize: meta.size(),
            nbuffer: queue_size,
        })?;

        Ok(Resolution {
            path,
            first_open: true,
        })
    }

    fn register(&self, info: RegisterInfo) -> Result<()> {
        let path = info.path.clone();

        let mut endpoint = self
            .transport()
            .open(&self.config().register_path, &OpenOptions::control())
            .map_err(|e| OrbError::registration(&path, e))?;
        let outcome = endpoint.control(ControlOp::Register(info));
        drop(endpoint);

        match outcome {
            Ok(_) => {
                debug!("registered channel {}", path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("channel {} registered concurrently", path);
                Ok(())
            }
            Err(e) => Err(OrbError::registration(path, e)),
        }
    }
}
