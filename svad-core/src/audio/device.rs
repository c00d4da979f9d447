//! Audio input device enumeration.

use serde::{Deserialize, Serialize};

/// Metadata about an audio input device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Human-readable device name reported by the OS.
    pub name: String,
    /// Whether this is the system default input device.
    pub is_default: bool,
    /// Native sample rate of the device's default input config, if known.
    pub default_sample_rate: Option<u32>,
    /// Channel count of the default input config, if known.
    pub channels: Option<u16>,
}

/// Sort key: default device first, then by case-insensitive name.
fn listing_order(device: &DeviceInfo) -> (bool, String) {
    (!device.is_default, device.name.to_ascii_lowercase())
}

/// Sort devices for display.
pub fn sort_for_listing(devices: &mut [DeviceInfo]) {
    devices.sort_by_key(listing_order);
}

/// List all available audio input devices on the system.
///
/// Returns an empty `Vec` if no devices can be enumerated.
#[cfg(feature = "audio-cpal")]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = match host.input_devices() {
        Ok(devices) => devices,
        Err(e) => {
            tracing::warn!("failed to enumerate input devices: {e}");
            return Vec::new();
        }
    };

    let mut list = devices
        .enumerate()
        .map(|(idx, device)| {
            let name = device
                .name()
                .unwrap_or_else(|_| format!("Input Device {}", idx + 1));
            let config = device.default_input_config().ok();
            DeviceInfo {
                is_default: default_name.as_deref() == Some(name.as_str()),
                default_sample_rate: config.as_ref().map(|c| c.sample_rate().0),
                channels: config.as_ref().map(|c| c.channels()),
                name,
            }
        })
        .collect::<Vec<_>>();

    sort_for_listing(&mut list);
    list
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    vec![]
}
