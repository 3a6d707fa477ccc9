//! Backlight register mapping.
//!
//! The register is inverted: 0 is full brightness, 255 is dark.

pub const RAW_MAX: u8 = 255;
/// Writes issued by a smooth ramp, independent of distance.
pub const SMOOTH_STEPS: u32 = 10;
/// Register value 0 is avoided by ramps; the panel misbehaves there.
pub const RAMP_FLOOR: u8 = 1;

pub fn parse_brightness(raw: u8) -> f64 {
    1.0 - f64::from(raw) / f64::from(RAW_MAX)
}

/// Inputs outside 0.0..=1.0 (and NaN) are clamped first.
pub fn format_brightness(normalized: f64) -> u8 {
    let clamped = if normalized.is_nan() {
        0.0
    } else {
        normalized.clamp(0.0, 1.0)
    };
    RAW_MAX - (clamped * f64::from(RAW_MAX)).round() as u8
}

/// Register values written by a smooth ramp; the last one is the target.
pub fn ramp_values(current: u8, target: u8) -> Vec<u8> {
    let start = f64::from(current);
    let delta = f64::from(target) - start;
    (1..=SMOOTH_STEPS)
        .map(|step| {
            let value = start + delta * f64::from(step) / f64::from(SMOOTH_STEPS);
            value.round().clamp(0.0, f64::from(RAW_MAX)) as u8
        })
        .collect()
}

pub fn ramp_target(normalized: f64) -> u8 {
    format_brightness(normalized).max(RAMP_FLOOR)
}
