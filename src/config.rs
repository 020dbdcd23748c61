use std::net::SocketAddr;
use std::time::Duration;

use anyhow::bail;

#[derive(Debug)]
pub struct MavConfig {
    /// local address of the UDP link
    pub bind_addr: SocketAddr,
    /// If this is `None`, the link sends to whichever address it last received a datagram from.
    ///  That is the usual setup with a vehicle (or a telemetry bridge) pushing to a well-known
    ///  ground station port.
    pub vehicle_addr: Option<SocketAddr>,

    /// system id that commands are addressed to
    pub target_system: u8,
    pub target_component: u8,

    /// the link is considered lost if no heartbeat arrives within this period
    pub heartbeat_timeout: Duration,
    pub heartbeat_check_interval: Duration,

    pub max_datagram_size: usize,
    pub event_channel_capacity: usize,
}

impl MavConfig {
    pub fn new(bind_addr: SocketAddr) -> MavConfig {
        MavConfig {
            bind_addr,
            vehicle_addr: None,
            target_system: 1,
            target_component: 1,
            heartbeat_timeout: Duration::from_secs(5),
            heartbeat_check_interval: Duration::from_millis(100),
            max_datagram_size: 2048,
            event_channel_capacity: 128,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.heartbeat_timeout.is_zero() {
            bail!("heartbeat timeout must be positive");
        }
        if self.heartbeat_check_interval.is_zero() || self.heartbeat_check_interval > self.heartbeat_timeout {
            bail!("heartbeat check interval must be positive and no longer than the heartbeat timeout");
        }
        if self.max_datagram_size < 263 {
            bail!("max datagram size must fit a complete packet (263 bytes)");
        }
        if self.event_channel_capacity == 0 {
            bail!("event channel capacity must be positive");
        }
        Ok(())
    }
}
