use crate::messaging::messages::{Heartbeat, MagCalProgress, MagCalReport};

pub fn test_heartbeat() -> Heartbeat {
    Heartbeat {
        custom_mode: 0,
        mav_type: 2,
        autopilot: 3,
        base_mode: 0x51,
        system_status: 4,
        mavlink_version: 3,
    }
}

/// a progress message for the given compass - different compass ids and percentages give
///  different messages, everything else is fixed
pub fn test_progress(compass_id: u8, completion_pct: u8) -> MagCalProgress {
    MagCalProgress {
        direction_x: 0.5,
        direction_y: -0.25,
        direction_z: 1.0,
        compass_id,
        cal_mask: 1 << (compass_id % 8),
        cal_status: 2,
        attempt: 1,
        completion_pct,
        completion_mask: [0x0f; 10],
    }
}

pub fn test_report(compass_id: u8, fitness: f32) -> MagCalReport {
    MagCalReport {
        fitness,
        ofs_x: 10.0,
        ofs_y: -20.0,
        ofs_z: 5.5,
        diag_x: 1.0,
        diag_y: 1.0,
        diag_z: 1.0,
        offdiag_x: 0.0,
        offdiag_y: 0.0,
        offdiag_z: 0.0,
        compass_id,
        cal_mask: 1 << (compass_id % 8),
        cal_status: 4,
        autosaved: 0,
    }
}
