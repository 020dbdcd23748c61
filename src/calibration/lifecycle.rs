use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::calibration::tracker::MagnetometerCalibration;
use crate::link::LinkEvent;

impl MagnetometerCalibration {
    /// Losing the link cancels the calibration - unconditionally, i.e. even if no calibration is
    ///  running. That sends a cancel command and notifies the listener regardless.
    pub fn on_link_event(&self, event: &LinkEvent) {
        match event {
            LinkEvent::HeartbeatTimeout | LinkEvent::Disconnected => {
                info!("link event {:?} - cancelling magnetometer calibration", event);
                if let Err(e) = self.cancel_calibration() {
                    error!("error sending cancel command: {}", e);
                }
            }
            _ => {}
        }
    }
}

/// Forwards link events to the calibration tracker until the event source is closed.
pub async fn run_lifecycle_bridge(calibration: Arc<MagnetometerCalibration>, mut events: broadcast::Receiver<LinkEvent>) {
    loop {
        match events.recv().await {
            Ok(evt) => calibration.on_link_event(&evt),
            Err(RecvError::Lagged(n)) => {
                warn!("lifecycle bridge lagging behind link events, {} events were skipped", n);
            }
            Err(RecvError::Closed) => {
                debug!("link events closed - shutting down lifecycle bridge");
                return;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use rstest::rstest;

    use crate::calibration::commands::MAV_CMD_DO_CANCEL_MAG_CAL;
    use crate::config::MavConfig;
    use crate::link::LinkEventNotifier;
    use crate::messaging::messages::AnyMessage;
    use crate::test_util::listener::{ListenerEvent, RecordingListener};
    use crate::test_util::message::test_progress;
    use crate::test_util::sender::TrackingPacketSender;

    use super::*;

    fn tracker() -> (Arc<MagnetometerCalibration>, Arc<TrackingPacketSender>, Arc<RecordingListener>) {
        let config = MavConfig::new(std::net::SocketAddr::from_str("127.0.0.1:14550").unwrap());
        let sender = Arc::new(TrackingPacketSender::new());
        let listener = Arc::new(RecordingListener::default());
        let tracker = Arc::new(MagnetometerCalibration::new(Arc::new(config), sender.clone()));
        tracker.set_listener(Some(listener.clone()));
        (tracker, sender, listener)
    }

    #[rstest]
    #[case::heartbeat_timeout(LinkEvent::HeartbeatTimeout, true)]
    #[case::disconnected(LinkEvent::Disconnected, true)]
    #[case::connected(LinkEvent::Connected, false)]
    #[case::heartbeat_first(LinkEvent::HeartbeatFirst, false)]
    #[case::heartbeat_restored(LinkEvent::HeartbeatRestored, false)]
    fn test_on_link_event_while_idle(#[case] event: LinkEvent, #[case] expect_cancel: bool) {
        let (tracker, sender, listener) = tracker();

        tracker.on_link_event(&event);

        assert_eq!(tracker.is_cancelled(), expect_cancel);
        let sent = sender.sent_commands();
        if expect_cancel {
            assert_eq!(listener.events(), vec![ListenerEvent::Cancelled]);
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].command, MAV_CMD_DO_CANCEL_MAG_CAL);
        }
        else {
            assert!(listener.events().is_empty());
            assert!(sent.is_empty());
        }
    }

    #[test]
    fn test_disconnect_keeps_entries() {
        let (tracker, _, listener) = tracker();

        tracker.start_calibration(false, false, 0).unwrap();
        tracker.process_calibration_message(&AnyMessage::MagCalProgress(test_progress(3, 42)));
        tracker.on_link_event(&LinkEvent::Disconnected);

        assert!(tracker.is_cancelled());
        assert_eq!(tracker.entry(3).unwrap().progress, Some(test_progress(3, 42)));
        assert_eq!(listener.events(), vec![ListenerEvent::Progress(3, 42), ListenerEvent::Cancelled]);
    }

    #[tokio::test]
    async fn test_run_lifecycle_bridge() {
        let (tracker, sender, listener) = tracker();
        let events = LinkEventNotifier::new(8);
        let bridge = tokio::spawn(run_lifecycle_bridge(tracker.clone(), events.subscribe()));

        events.send_event(LinkEvent::HeartbeatFirst);
        events.send_event(LinkEvent::HeartbeatTimeout);
        drop(events);
        bridge.await.unwrap();

        assert!(tracker.is_cancelled());
        assert_eq!(listener.events(), vec![ListenerEvent::Cancelled]);
        assert_eq!(sender.sent_commands().len(), 1);
    }
}
