//! Existence probe for (topic, instance) pairs

use std::io;

use crate::{
    error::{OrbError, Result},
    metadata::TopicMetadata,
    orb::Orb,
    transport::{Channel, ControlOp, OpenOptions, Transport},
};

impl<T: Transport> Orb<T> {
    /// Whether instance `instance` of `meta` has at least one advertiser
    ///
    /// Never registers anything. An absent channel is `Ok(false)`; other
    /// transport failures are errors.
    pub fn exists(&self, meta: &TopicMetadata, instance: u32) -> Result<bool> {
        let path = self.channel_path(meta, instance)?;
        if !self.transport().exists(path.as_str()) {
            return Ok(false);
        }

        let mut probe = match self.transport().open(path.as_str(), &OpenOptions::probe()) {
            Ok(probe) => probe,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(OrbError::from_io(e, &format!("probe {}", path))),
        };

        let reply = probe.control(ControlOp::GetRawState);
        drop(probe);

        let state = match reply.and_then(|reply| reply.into_state()) {
            Ok(state) => state,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(OrbError::from_io(e, &format!("probe {}", path))),
        };

        Ok(state.nadvertisers > 0)
    }
}
