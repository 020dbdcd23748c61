use std::sync::Arc;

use tokio::select;
use tokio::sync::mpsc;
use tokio::time::{self, Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::MavConfig;
use crate::link::{LinkEvent, LinkEventNotifier};
use crate::messaging::messages::Heartbeat;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum HeartbeatState {
    AwaitingFirst,
    Alive,
    TimedOut,
}

/// Derives link liveness from the vehicle's heartbeats. This is pure bookkeeping driven by the
///  caller's clock, [run_heartbeat_watchdog] provides the clock and the event plumbing.
pub struct HeartbeatWatchdog {
    timeout: Duration,
    last_heartbeat: Option<Instant>,
    state: HeartbeatState,
}

impl HeartbeatWatchdog {
    pub fn new(timeout: Duration) -> HeartbeatWatchdog {
        HeartbeatWatchdog {
            timeout,
            last_heartbeat: None,
            state: HeartbeatState::AwaitingFirst,
        }
    }

    pub fn on_heartbeat(&mut self, now: Instant) -> Option<LinkEvent> {
        self.last_heartbeat = Some(now);

        let event = match self.state {
            HeartbeatState::AwaitingFirst => Some(LinkEvent::HeartbeatFirst),
            HeartbeatState::TimedOut => Some(LinkEvent::HeartbeatRestored),
            HeartbeatState::Alive => None,
        };
        self.state = HeartbeatState::Alive;
        event
    }

    /// raises [LinkEvent::HeartbeatTimeout] once per loss of heartbeats - nothing before the
    ///  first heartbeat was received
    pub fn check_timeout(&mut self, now: Instant) -> Option<LinkEvent> {
        if self.state != HeartbeatState::Alive {
            return None;
        }
        let last = self.last_heartbeat?;
        if now.saturating_duration_since(last) > self.timeout {
            self.state = HeartbeatState::TimedOut;
            return Some(LinkEvent::HeartbeatTimeout);
        }
        None
    }
}

/// Runs the watchdog until the channel of received heartbeats is closed (i.e. the receiving side
///  of the link went away), which is reported as [LinkEvent::Disconnected]. Fails right away for
///  an invalid configuration.
pub async fn run_heartbeat_watchdog(config: Arc<MavConfig>, mut heartbeats: mpsc::Receiver<Heartbeat>, events: Arc<LinkEventNotifier>) -> anyhow::Result<()> {
    config.validate()?;

    let mut watchdog = HeartbeatWatchdog::new(config.heartbeat_timeout);
    let mut check_ticks = time::interval(config.heartbeat_check_interval);

    loop {
        select! {
            heartbeat = heartbeats.recv() => {
                match heartbeat {
                    Some(heartbeat) => {
                        debug!("received heartbeat: {:?}", heartbeat);
                        if let Some(evt) = watchdog.on_heartbeat(Instant::now()) {
                            info!("{:?}", evt);
                            events.send_event(evt);
                        }
                    }
                    None => {
                        info!("heartbeat source closed - link is disconnected");
                        events.send_event(LinkEvent::Disconnected);
                        return Ok(());
                    }
                }
            }
            _ = check_ticks.tick() => {
                if let Some(evt) = watchdog.check_timeout(Instant::now()) {
                    warn!("no heartbeat for {:?}", config.heartbeat_timeout);
                    events.send_event(evt);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use crate::test_util::message::test_heartbeat;

    use super::*;

    #[test]
    fn test_watchdog_transitions() {
        let start = Instant::now();
        let mut watchdog = HeartbeatWatchdog::new(Duration::from_secs(5));

        assert_eq!(watchdog.check_timeout(start + Duration::from_secs(100)), None);
        assert_eq!(watchdog.on_heartbeat(start), Some(LinkEvent::HeartbeatFirst));
        assert_eq!(watchdog.on_heartbeat(start + Duration::from_secs(1)), None);

        assert_eq!(watchdog.check_timeout(start + Duration::from_secs(6)), None);
        assert_eq!(watchdog.check_timeout(start + Duration::from_secs(7)), Some(LinkEvent::HeartbeatTimeout));
        assert_eq!(watchdog.check_timeout(start + Duration::from_secs(8)), None);

        assert_eq!(watchdog.on_heartbeat(start + Duration::from_secs(9)), Some(LinkEvent::HeartbeatRestored));
        assert_eq!(watchdog.check_timeout(start + Duration::from_secs(10)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_heartbeat_watchdog() {
        let config = Arc::new(MavConfig::new(std::net::SocketAddr::from_str("127.0.0.1:14550").unwrap()));
        let events = Arc::new(LinkEventNotifier::new(16));
        let mut subscriber = events.subscribe();
        let (send, recv) = mpsc::channel(16);

        let handle = tokio::spawn(run_heartbeat_watchdog(config, recv, events.clone()));

        send.send(test_heartbeat()).await.unwrap();
        assert_eq!(subscriber.recv().await.unwrap(), LinkEvent::HeartbeatFirst);

        time::sleep(Duration::from_secs(6)).await;
        assert_eq!(subscriber.recv().await.unwrap(), LinkEvent::HeartbeatTimeout);

        send.send(test_heartbeat()).await.unwrap();
        assert_eq!(subscriber.recv().await.unwrap(), LinkEvent::HeartbeatRestored);

        drop(send);
        assert_eq!(subscriber.recv().await.unwrap(), LinkEvent::Disconnected);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_run_heartbeat_watchdog_rejects_zero_check_interval() {
        let mut config = MavConfig::new(std::net::SocketAddr::from_str("127.0.0.1:14550").unwrap());
        config.heartbeat_check_interval = Duration::ZERO;
        let events = Arc::new(LinkEventNotifier::new(16));
        let mut subscriber = events.subscribe();
        let (_send, recv) = mpsc::channel(16);

        assert!(run_heartbeat_watchdog(Arc::new(config), recv, events).await.is_err());
        assert!(subscriber.try_recv().is_err());
    }
}
