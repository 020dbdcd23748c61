use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::anyhow;

use crate::messaging::message::Message;
use crate::messaging::messages::CommandLong;
use crate::messaging::packet::MavPacket;
use crate::messaging::sender::PacketSender;

/// Records all packets instead of sending them
#[derive(Debug, Default)]
pub struct TrackingPacketSender {
    tracker: Mutex<Vec<MavPacket>>,
    failing: AtomicBool,
}
impl TrackingPacketSender {
    pub fn new() -> Self {
        Default::default()
    }

    /// while failing, packets are rejected and not recorded
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    /// returns sent packets, clearing the internal buffer
    pub fn sent_packets(&self) -> Vec<MavPacket> {
        let mut lock = self.tracker.lock().unwrap();
        std::mem::take(&mut *lock)
    }

    /// returns sent `COMMAND_LONG` messages, clearing the internal buffer (including all other
    ///  packets)
    pub fn sent_commands(&self) -> Vec<CommandLong> {
        self.sent_packets().into_iter()
            .filter(|p| p.msgid == CommandLong::SCHEMA.id)
            .map(|mut p| CommandLong::unpack(&mut p.payload).unwrap())
            .collect()
    }
}

impl PacketSender for TrackingPacketSender {
    fn send_packet(&self, packet: MavPacket) -> anyhow::Result<()> {
        if self.failing.load(Ordering::Acquire) {
            return Err(anyhow!("simulated send failure"));
        }
        self.tracker.lock().unwrap().push(packet);
        Ok(())
    }
}
