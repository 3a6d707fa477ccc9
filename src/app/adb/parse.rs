use crate::app::models::DeviceSummary;

pub const STATE_DEVICE: &str = "device";

pub fn parse_adb_devices(output: &str) -> Vec<DeviceSummary> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.trim_start().starts_with('*'))
        .filter(|line| !line.to_lowercase().contains("list of devices"))
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 2 {
                return None;
            }
            let mut summary = DeviceSummary {
                serial: tokens[0].to_string(),
                state: tokens[1].to_string(),
                model: None,
                product: None,
                transport_id: None,
            };
            for token in tokens.iter().skip(2) {
                if let Some(value) = token.strip_prefix("model:") {
                    summary.model = Some(value.to_string());
                } else if let Some(value) = token.strip_prefix("product:") {
                    summary.product = Some(value.to_string());
                } else if let Some(value) = token.strip_prefix("transport_id:") {
                    summary.transport_id = Some(value.to_string());
                }
            }
            Some(summary)
        })
        .collect()
}

/// Serials of devices the bridge reports as ready, in listing order.
pub fn ready_serials(output: &str) -> Vec<String> {
    parse_adb_devices(output)
        .into_iter()
        .filter(|summary| summary.state == STATE_DEVICE)
        .map(|summary| summary.serial)
        .collect()
}

/// `ls` output lists `entry` as one of its names.
pub fn listing_contains(output: &str, entry: &str) -> bool {
    output
        .split_whitespace()
        .any(|name| name.trim_end_matches('/') == entry)
}

pub fn is_missing_path_output(output: &str) -> bool {
    output.contains("No such file or directory")
}

/// Raw backlight register value from `cat` output.
pub fn parse_backlight_raw(output: &str) -> Option<u8> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())?
        .parse::<u8>()
        .ok()
}
