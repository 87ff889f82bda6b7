//! Resolves a device address to a bluest device handle
//! Already connected devices are checked first, then the adapter scans for the
//! requested service until the address shows up.

use anyhow::{Result, anyhow};
use bluest::{Adapter, Device, Uuid};
use futures_util::StreamExt;
use log::{debug, info};
use regex::Regex;

const MAC_PATTERN: &str = r"([0-9A-Fa-f]{2}[:\-_]){5}([0-9A-Fa-f]{2})";

pub struct BluetoothScanner {
    adapter: Adapter,
}

impl BluetoothScanner {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }

    /// Finds the device with `address` advertising `service`.
    ///
    /// Scans until the device is seen; callers bound the wait with a timeout.
    pub async fn find_device(&self, address: &str, service: Uuid) -> Result<Device> {
        let needle = normalize_address(address);
        if needle.is_empty() {
            return Err(anyhow!("Invalid device address: {:?}", address));
        }

        info!("Checking connected devices for {}", address);
        for device in self.adapter.connected_devices().await? {
            if device_matches(&device, &needle) {
                info!("Device {} is already connected", address);
                return Ok(device);
            }
        }

        info!("Scanning for {} (service {})", address, service);
        let services = [service];
        let mut scan_stream = self.adapter.scan(&services).await?;
        while let Some(discovered) = scan_stream.next().await {
            let device = discovered.device;
            debug!("Found device - Device: {:?}, RSSI: {:?}", device, discovered.rssi);
            if device_matches(&device, &needle) {
                let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
                info!("Found device {} ({})", address, name);
                return Ok(device);
            }
        }

        Err(anyhow!("Scan ended before device {} was found", address))
    }
}

fn device_matches(device: &Device, needle: &str) -> bool {
    let id = device.id().to_string();
    if let Some(mac) = extract_mac_address(&id) {
        if normalize_address(&mac) == needle {
            return true;
        }
    }
    normalize_address(&id).contains(needle)
}

/// Pulls the last MAC-looking group out of a platform device id.
pub fn extract_mac_address(device_id: &str) -> Option<String> {
    let re = Regex::new(MAC_PATTERN).ok()?;
    re.find_iter(device_id)
        .last()
        .map(|m| m.as_str().replace(['-', '_'], ":").to_uppercase())
}

/// Hex digits of an address, upper-cased, separators dropped.
fn normalize_address(address: &str) -> String {
    address
        .chars()
        .filter(char::is_ascii_hexdigit)
        .collect::<String>()
        .to_uppercase()
}
