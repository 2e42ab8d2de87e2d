//! Instance enumeration

use log::warn;

use crate::{
    error::{OrbError, Result},
    metadata::TopicMetadata,
    orb::Orb,
    transport::Transport,
};

impl<T: Transport> Orb<T> {
    /// Number of contiguous instances of `meta`, starting at 0, that have an advertiser
    ///
    /// Instances are assumed to be allocated without gaps: probing stops at
    /// the first instance without an advertiser, so a gap hides every
    /// instance after it. An instance whose path exceeds the length limit
    /// cannot exist and also ends the count.
    pub fn group_count(&self, meta: &TopicMetadata) -> Result<u32> {
        let limit = self.config().max_instances;

        let mut instance = 0;
        while instance < limit {
            match self.exists(meta, instance) {
                Ok(true) => instance += 1,
                Ok(false) => break,
                Err(OrbError::PathTooLong { .. }) if instance > 0 => break,
                Err(e) => return Err(e),
            }
        }

        if instance == limit {
            warn!("{}: enumeration stopped at bound {}", meta.name(), limit);
        }

        Ok(instance)
    }
}
