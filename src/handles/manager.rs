//! Channel handle manager: opening topics as advertiser or subscriber

use log::{debug, error, warn};

use crate::{
    error::{OrbError, Result},
    metadata::TopicMetadata,
    orb::Orb,
    transport::{Channel, ControlOp, Transport},
};

use super::handle::{OrbHandle, Role};

/// Handle type produced by an [`Orb`] over transport `T`
pub type HandleOf<T> = OrbHandle<<T as Transport>::Channel>;

impl<T: Transport> Orb<T> {
    /// Open (`meta`, `instance`) in `role`, registering the channel if needed
    ///
    /// A non-zero `queue_size` requests that buffer depth. Only the advertiser
    /// that finds the channel unbuffered and unpublished gets it; the request
    /// is ignored for subscribers and for later advertisers.
    pub fn open(
        &self,
        meta: &TopicMetadata,
        role: Role,
        instance: u32,
        queue_size: u32,
    ) -> Result<HandleOf<T>> {
        let queue_size = match role {
            Role::Advertiser => queue_size,
            Role::Subscriber => 0,
        };
        let resolution = self.resolve_and_ensure(meta, instance, queue_size)?;

        let mut channel = self
            .transport()
            .open(resolution.path.as_str(), &role.open_options())
            .map_err(|e| OrbError::from_io(e, &format!("open {}", resolution.path)))?;

        if resolution.first_open {
            // Idempotent: racing first openers attach the same identity
            if let Err(e) = channel.control(ControlOp::AttachIdentity(meta.clone())) {
                warn!("{}: attaching topic identity failed: {}", resolution.path, e);
            }
        }

        if queue_size != 0 {
            if let Err(e) = channel.control(ControlOp::SetBufferDepth(queue_size)) {
                warn!("{}: setting buffer depth {} failed: {}", resolution.path, queue_size, e);
            }
        }

        debug!(
            "opened {} as {} (first_open={})",
            resolution.path,
            role.name(),
            resolution.first_open
        );

        Ok(OrbHandle::new(
            channel,
            role,
            meta.clone(),
            resolution.path,
            instance,
        ))
    }

    /// Advertise `meta`, optionally publishing `initial_data` straight away
    ///
    /// With `instance` unset the next free instance (the current group size)
    /// is used. If the initial publish does not write exactly one element the
    /// handle is closed and the call fails.
    pub fn advertise_multi_queue(
        &self,
        meta: &TopicMetadata,
        initial_data: Option<&[u8]>,
        instance: Option<u32>,
        queue_size: u32,
    ) -> Result<HandleOf<T>> {
        let instance = match instance {
            Some(instance) => instance,
            None => self.group_count(meta)?,
        };

        let mut handle = self
            .open(meta, Role::Advertiser, instance, queue_size)
            .map_err(|e| {
                error!("{} advertise failed: {}", meta.name(), e);
                e
            })?;

        if let Some(data) = initial_data {
            let expected = meta.size();
            let outcome = handle.publish(data);
            match outcome {
                Ok(written) if written == expected => {}
                Ok(written) => {
                    error!("{} publish {}, expect {}", meta.name(), written, expected);
                    let _ = handle.close();
                    return Err(OrbError::short_write(meta.name(), written, expected));
                }
                Err(e) => {
                    error!("{} initial publish failed: {}", meta.name(), e);
                    let _ = handle.close();
                    return Err(e);
                }
            }
        }

        Ok(handle)
    }

    /// Advertise the next free instance with the default buffer depth
    pub fn advertise(&self, meta: &TopicMetadata, initial_data: Option<&[u8]>) -> Result<HandleOf<T>> {
        self.advertise_multi_queue(meta, initial_data, None, 0)
    }

    /// Advertise the next free instance with buffer depth `queue_size`
    pub fn advertise_queue(
        &self,
        meta: &TopicMetadata,
        initial_data: Option<&[u8]>,
        queue_size: u32,
    ) -> Result<HandleOf<T>> {
        self.advertise_multi_queue(meta, initial_data, None, queue_size)
    }

    /// Advertise a specific instance with the default buffer depth
    pub fn advertise_multi(
        &self,
        meta: &TopicMetadata,
        initial_data: Option<&[u8]>,
        instance: u32,
    ) -> Result<HandleOf<T>> {
        self.advertise_multi_queue(meta, initial_data, Some(instance), 0)
    }

    /// Stop advertising
    pub fn unadvertise(&self, handle: HandleOf<T>) -> Result<()> {
        handle.close()
    }

    /// Subscribe to instance 0
    pub fn subscribe(&self, meta: &TopicMetadata) -> Result<HandleOf<T>> {
        self.subscribe_multi(meta, 0)
    }

    /// Subscribe to a specific instance
    pub fn subscribe_multi(&self, meta: &TopicMetadata, instance: u32) -> Result<HandleOf<T>> {
        self.open(meta, Role::Subscriber, instance, 0)
    }

    /// Stop subscribing
    pub fn unsubscribe(&self, handle: HandleOf<T>) -> Result<()> {
        handle.close()
    }
}
