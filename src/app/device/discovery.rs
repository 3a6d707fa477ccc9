use tracing::{debug, info, warn};

use crate::app::adb::command::{DeviceCommand, HostCommand, FINGERPRINT_ENTRY};
use crate::app::adb::locator::BridgeProgram;
use crate::app::adb::parse::{listing_contains, ready_serials};
use crate::app::adb::runner::CommandRunner;
use crate::app::error::AppError;

/// Serials in state `device`, in the order adb prints them.
pub fn list_devices(
    runner: &dyn CommandRunner,
    program: &BridgeProgram,
    trace_id: &str,
) -> Result<Vec<String>, AppError> {
    let output = runner
        .run(program.command(), &HostCommand::Devices.args(), trace_id)
        .ok_or_else(|| AppError::command_failed("adb devices failed", trace_id))?;
    Ok(ready_serials(&output))
}

/// A supported unit lists the stock web app directory. A failed listing is `false`.
pub fn is_valid_device(
    runner: &dyn CommandRunner,
    program: &BridgeProgram,
    serial: &str,
    trace_id: &str,
) -> bool {
    runner
        .run(
            program.command(),
            &DeviceCommand::ListFingerprint.args(serial),
            trace_id,
        )
        .map(|output| listing_contains(&output, FINGERPRINT_ENTRY))
        .unwrap_or(false)
}

/// First listed device that passes validation. `Ok(None)` is a normal outcome.
pub fn find_device(
    runner: &dyn CommandRunner,
    program: &BridgeProgram,
    trace_id: &str,
) -> Result<Option<String>, AppError> {
    let candidates = list_devices(runner, program, trace_id)?;
    if candidates.is_empty() {
        debug!(trace_id = %trace_id, "no devices attached");
        return Ok(None);
    }

    for serial in &candidates {
        if is_valid_device(runner, program, serial, trace_id) {
            info!(trace_id = %trace_id, serial = %serial, "found supported device");
            return Ok(Some(serial.clone()));
        }
        debug!(trace_id = %trace_id, serial = %serial, "device is not a supported unit");
    }

    warn!(
        trace_id = %trace_id,
        candidates = candidates.len(),
        "devices attached but none is a supported unit"
    );
    Ok(None)
}
