//! Test doubles shared by the unit tests

use std::collections::VecDeque;

use embedded_hal_async::delay::DelayNs;

use crate::Transport;

pub(crate) struct NoopDelay;

impl DelayNs for NoopDelay {
    async fn delay_ns(&mut self, _ns: u32) {}
}

/// Answers reads from a queue of canned replies, which may be shorter than the
/// request. Records what was written and how many bytes each read asked for
pub(crate) struct ScriptedBus {
    replies: VecDeque<Vec<u8>>,
    pub requested: Vec<usize>,
    pub writes: Vec<Vec<u8>>,
}

impl ScriptedBus {
    pub fn new(replies: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            requested: Vec::new(),
            writes: Vec::new(),
        }
    }

    fn answer(&mut self, buffer: &mut [u8]) -> Result<usize, ()> {
        self.requested.push(buffer.len());

        let reply = self.replies.pop_front().ok_or(())?;
        let len = reply.len().min(buffer.len());
        buffer[..len].copy_from_slice(&reply[..len]);

        Ok(len)
    }
}

impl Transport for ScriptedBus {
    type Error = ();

    async fn write(&mut self, _addr: u8, bytes: &[u8]) -> Result<(), ()> {
        self.writes.push(bytes.to_vec());
        Ok(())
    }

    async fn write_read(&mut self, _addr: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<usize, ()> {
        self.writes.push(bytes.to_vec());
        self.answer(buffer)
    }

    async fn read(&mut self, _addr: u8, buffer: &mut [u8]) -> Result<usize, ()> {
        self.answer(buffer)
    }
}
