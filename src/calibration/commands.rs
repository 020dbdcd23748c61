//! The vehicle-side magnetometer calibration is controlled with `COMMAND_LONG` messages. Retry,
//!  autosave and start delay are forwarded to the vehicle as command parameters, nothing of
//!  that is enforced on this side.

use crate::messaging::messages::CommandLong;

pub const MAV_CMD_DO_START_MAG_CAL: u16 = 42424;
pub const MAV_CMD_DO_ACCEPT_MAG_CAL: u16 = 42425;
pub const MAV_CMD_DO_CANCEL_MAG_CAL: u16 = 42426;

/// compass bitmask parameter value meaning "all compasses"
const ALL_COMPASSES: f32 = 0.0;

fn command(command: u16, target_system: u8, target_component: u8) -> CommandLong {
    CommandLong {
        param1: ALL_COMPASSES,
        param2: 0.0,
        param3: 0.0,
        param4: 0.0,
        param5: 0.0,
        param6: 0.0,
        param7: 0.0,
        command,
        target_system,
        target_component,
        confirmation: 0,
    }
}

/// `start_delay` is in seconds
pub fn start_mag_cal(target_system: u8, target_component: u8, retry_on_failure: bool, save_automatically: bool, start_delay: u16) -> CommandLong {
    CommandLong {
        param2: if retry_on_failure { 1.0 } else { 0.0 },
        param3: if save_automatically { 1.0 } else { 0.0 },
        param4: start_delay as f32,
        // param5: no automatic reboot after the calibration
        ..command(MAV_CMD_DO_START_MAG_CAL, target_system, target_component)
    }
}

pub fn accept_mag_cal(target_system: u8, target_component: u8) -> CommandLong {
    command(MAV_CMD_DO_ACCEPT_MAG_CAL, target_system, target_component)
}

pub fn cancel_mag_cal(target_system: u8, target_component: u8) -> CommandLong {
    command(MAV_CMD_DO_CANCEL_MAG_CAL, target_system, target_component)
}
