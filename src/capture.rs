//! Capture-handle plumbing over libpcap: one promiscuous, ingress-only,
//! IP-filtered input handle and one plain output handle for injection.

use anyhow::{bail, Context, Result};
use pcap::{Active, Capture, Device, Direction, Linktype};

/// Snaplen for the input handle; also bounds any assembled result frame.
pub const SNAPLEN: i32 = 65_535;

/// Worst-case blocking time of one `next_packet` call, so the shutdown flag
/// is observed at least once a second.
pub const READ_TIMEOUT_MS: i32 = 1_000;

pub const BPF_FILTER: &str = "ip";

pub struct CapturePair {
    pub input: Capture<Active>,
    pub output: Capture<Active>,
    pub link_header_len: usize,
}

fn device_by_name(name: &str) -> Result<Device> {
    if name == "any" {
        return Ok(Device::from("any"));
    }
    let devices = Device::list().context("Failed to list devices")?;
    for device in &devices {
        tracing::debug!(name = %device.name, "found network interface");
    }
    devices
        .into_iter()
        .find(|d| d.name == name)
        .with_context(|| format!("Failed to find device: {}", name))
}

/// Opens both handles and checks that they speak the same link type.
pub fn open_pair(input_iface: &str, output_iface: &str) -> Result<CapturePair> {
    let mut input = Capture::from_device(device_by_name(input_iface)?)
        .context("Failed to capture input device")?
        .promisc(true)
        .snaplen(SNAPLEN)
        .timeout(READ_TIMEOUT_MS)
        .open()
        .context("Failed to open input device")?;
    input
        .direction(Direction::In)
        .context("Failed to set capture direction")?;
    input
        .filter(BPF_FILTER, true)
        .context("Failed to compile packet filter")?;

    let output = Capture::from_device(device_by_name(output_iface)?)
        .context("Failed to capture output device")?
        .snaplen(SNAPLEN)
        .timeout(READ_TIMEOUT_MS)
        .open()
        .context("Failed to open output device")?;

    let link_input = input.get_datalink();
    let link_output = output.get_datalink();
    if link_input != link_output {
        bail!(
            "incompatible link types (input={}, output={})",
            link_input.0,
            link_output.0
        );
    }
    let link_header_len = link_header_len(link_input)?;
    tracing::debug!(
        link_type = link_input.0,
        link_header_len,
        "capture handles share a link type"
    );

    Ok(CapturePair {
        input,
        output,
        link_header_len,
    })
}

/// Bytes of link-layer header to skip before the IP header.
pub fn link_header_len(link: Linktype) -> Result<usize> {
    match link {
        Linktype(0) => Ok(4),                // DLT_NULL
        Linktype(1) => Ok(14),               // DLT_EN10MB
        Linktype(8) | Linktype(9) => Ok(24), // DLT_SLIP, DLT_PPP
        Linktype(other) => bail!("unsupported data link type: {}", other),
    }
}
