pub mod heartbeat_watchdog;
pub mod udp_link;

use tokio::sync::broadcast;
use tracing::trace;

/// Connectivity events of the link to the vehicle, raised by the link layer and consumed by
///  anything that needs to react to losing (or regaining) the vehicle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkEvent {
    Connected,
    Disconnected,
    HeartbeatFirst,
    HeartbeatRestored,
    HeartbeatTimeout,
}

pub struct LinkEventNotifier {
    sender: broadcast::Sender<LinkEvent>,
}
impl LinkEventNotifier {
    pub fn new(capacity: usize) -> LinkEventNotifier {
        let (sender, _) = broadcast::channel(capacity);

        LinkEventNotifier {
            sender
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.sender.subscribe()
    }

    pub fn send_event(&self, event: LinkEvent) {
        trace!("event: {:?}", event);
        let _ = self.sender.send(event);
    }
}
