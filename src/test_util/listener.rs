use std::sync::Mutex;

use crate::calibration::listener::CalibrationListener;
use crate::messaging::messages::{MagCalProgress, MagCalReport};

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ListenerEvent {
    Cancelled,
    /// compass id, completion percentage
    Progress(u8, u8),
    /// compass id, calibration status
    Completed(u8, u8),
}

/// Records callbacks in the order they happen
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
}
impl RecordingListener {
    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: ListenerEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl CalibrationListener for RecordingListener {
    fn on_calibration_cancelled(&self) {
        self.record(ListenerEvent::Cancelled);
    }

    fn on_calibration_progress(&self, progress: &MagCalProgress) {
        self.record(ListenerEvent::Progress(progress.compass_id, progress.completion_pct));
    }

    fn on_calibration_completed(&self, report: &MagCalReport) {
        self.record(ListenerEvent::Completed(report.compass_id, report.cal_status));
    }
}
