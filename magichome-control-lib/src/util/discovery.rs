use std::cmp::max;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;
use std::time::Duration;

use anyhow::Context;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};

/// UDP port the controllers answer discovery probes on.
pub const DISCOVERY_PORT: u16 = 48899;
const PROBE_MESSAGE: &[u8] = b"HF-A11ASSISTHREAD";
const BROADCAST_ADDRESS: Ipv4Addr = Ipv4Addr::BROADCAST;

/// A controller which answered the discovery probe.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceIdentifier {
    pub ip_address: Ipv4Addr,
    /// Usually the MAC address without separators.
    pub device_id: String,
    pub model: String,
}

impl Display for DeviceIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.ip_address, self.device_id, self.model)
    }
}

pub struct Discovery;

impl Discovery {
    /// Parses an `address,id,model` record. Anything else is ignored.
    pub fn decode_discovery_response(data: &[u8]) -> Option<DeviceIdentifier> {
        let text = std::str::from_utf8(data).ok()?;
        let fields: Vec<&str> = text.trim().split(',').collect();
        if fields.len() != 3 {
            return None;
        }

        let ip_address = fields[0].parse::<Ipv4Addr>().ok()?;
        Some(DeviceIdentifier {
            ip_address,
            device_id: fields[1].to_string(),
            model: fields[2].to_string(),
        })
    }

    /// Broadcasts the probe and collects the answers until `given_timeout`
    /// is over. Devices answering more than once are reported once.
    pub async fn find_devices(given_timeout: Duration) -> anyhow::Result<HashSet<DeviceIdentifier>> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .context("Failed to bind discovery socket")?;
        socket.set_broadcast(true)?;
        socket
            .send_to(PROBE_MESSAGE, (BROADCAST_ADDRESS, DISCOVERY_PORT))
            .await
            .context("Failed to send discovery probe")?;

        Self::collect_responses(&socket, given_timeout).await
    }

    async fn collect_responses(
        socket: &UdpSocket,
        given_timeout: Duration,
    ) -> anyhow::Result<HashSet<DeviceIdentifier>> {
        let mut discovered_devices = HashSet::<DeviceIdentifier>::new();
        let mut buffer = [0; 1024];
        let timeout_end = Instant::now() + given_timeout;

        loop {
            let remaining_time = timeout_end.saturating_duration_since(Instant::now());
            if remaining_time.is_zero() {
                break;
            }

            match timeout(remaining_time, socket.recv_from(&mut buffer)).await {
                Ok(Ok((number_of_bytes, src_addr))) => {
                    let received_data = &buffer[..number_of_bytes];
                    // our own probe comes back on some networks
                    if received_data == PROBE_MESSAGE {
                        continue;
                    }
                    match Self::decode_discovery_response(received_data) {
                        Some(device) => {
                            if discovered_devices.contains(&device) {
                                debug!("Found device {} again, skipping", device);
                                continue;
                            }
                            info!("Found device: {}", device);
                            discovered_devices.insert(device);
                        }
                        None => debug!("Ignoring unexpected answer from {}", src_addr),
                    }
                }
                Ok(Err(e)) => {
                    return Err(e).context("Failed to receive discovery response");
                }
                Err(_) => {
                    info!("Discovery time complete. If devices are missing, try increasing the search timeout.");
                    break;
                }
            }
        }

        Ok(discovered_devices)
    }

    pub fn pretty_print_devices(devices: &HashSet<DeviceIdentifier>) {
        let mut devices: Vec<&DeviceIdentifier> = devices.iter().collect();
        devices.sort();

        let max_ip_width = devices
            .iter()
            .map(|d| d.ip_address.to_string().len())
            .fold("IP Address".len(), max);
        let max_device_id_width = devices
            .iter()
            .map(|d| d.device_id.len())
            .fold("Device ID".len(), max);
        let max_model_width = devices.iter().map(|d| d.model.len()).fold("Model".len(), max);

        println!(
            "{:<ip_width$} {:<device_id_width$} {:<model_width$}",
            "IP Address",
            "Device ID",
            "Model",
            ip_width = max_ip_width + 2,
            device_id_width = max_device_id_width + 2,
            model_width = max_model_width + 2,
        );
        println!(
            "{:<ip_width$} {:<device_id_width$} {:<model_width$}",
            "-".repeat(max_ip_width),
            "-".repeat(max_device_id_width),
            "-".repeat(max_model_width),
            ip_width = max_ip_width + 2,
            device_id_width = max_device_id_width + 2,
            model_width = max_model_width + 2,
        );
        for device in devices {
            println!(
                "{:<ip_width$} {:<device_id_width$} {:<model_width$}",
                device.ip_address,
                device.device_id,
                device.model,
                ip_width = max_ip_width + 2,
                device_id_width = max_device_id_width + 2,
                model_width = max_model_width + 2,
            );
        }
    }
}
