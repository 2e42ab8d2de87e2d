//! State and control accessors on open handles

use crate::{
    error::{OrbError, Result},
    handles::OrbHandle,
    transport::{Channel, ControlOp, ControlReply, RawState},
};

use super::types::TopicState;

impl<C: Channel> OrbHandle<C> {
    fn control(&mut self, op: ControlOp) -> Result<ControlReply> {
        let name = op.name();
        let path = self.path().clone();
        self.channel_mut()
            .control(op)
            .map_err(|e| OrbError::from_io(e, &format!("{} on {}", name, path)))
    }

    /// Fetch the channel's raw state with a single control operation
    pub fn raw_state(&mut self) -> Result<RawState> {
        let reply = self.control(ControlOp::GetRawState)?;
        reply
            .into_state()
            .map_err(|e| OrbError::from_io(e, "decode channel state"))
    }

    /// Fill `state` with the current topic state
    ///
    /// Fails with `InvalidParameter` when no output location is supplied.
    pub fn get_state(&mut self, state: Option<&mut TopicState>) -> Result<()> {
        let state = state
            .ok_or_else(|| OrbError::invalid_parameter("state", "output location missing"))?;
        *state = self.raw_state()?.into();
        Ok(())
    }

    /// Current topic state
    pub fn state(&mut self) -> Result<TopicState> {
        Ok(self.raw_state()?.into())
    }

    /// Set the minimum publish interval in microseconds
    pub fn set_interval(&mut self, interval_us: u32) -> Result<()> {
        self.control(ControlOp::SetMinInterval(interval_us))
            .map(|_| ())
    }

    /// Minimum publish interval in microseconds, 0 if unset
    pub fn get_interval(&mut self) -> Result<u32> {
        Ok(self.raw_state()?.min_interval)
    }

    /// Set the maximum batching delay in microseconds
    pub fn set_batch_interval(&mut self, interval_us: u32) -> Result<()> {
        self.control(ControlOp::SetBatchLimit(interval_us))
            .map(|_| ())
    }

    /// Maximum batching delay in microseconds, 0 if unset
    pub fn get_batch_interval(&mut self) -> Result<u32> {
        Ok(self.raw_state()?.min_latency)
    }

    /// Pass a transport-specific command straight through
    pub fn raw_control(&mut self, cmd: u32, arg: u64) -> Result<u64> {
        self.control(ControlOp::Raw { cmd, arg })
            .map(|reply| reply.value())
    }
}
