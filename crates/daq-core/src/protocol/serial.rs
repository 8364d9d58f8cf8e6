//! Serial port handling
//!
//! Port discovery and opening for the physical link. Everything above this
//! module talks to the port through [`Link`](super::link::Link).

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::time::Duration;

use super::link::best_effort;
use super::ProtocolError;

/// An available serial port, as shown to the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyACM0" or "COM3")
    pub name: String,

    /// USB product string, when the port is a USB device
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let product = match info.port_type {
            SerialPortType::UsbPort(usb) => usb.product,
            _ => None,
        };
        Self {
            name: info.port_name,
            product,
        }
    }
}

/// USB CDC boards (ttyACM*) first, then USB-serial adapters, then the rest.
fn port_rank(name: &str) -> (u8, String) {
    let base = name.rsplit('/').next().unwrap_or(name);
    let rank = if base.starts_with("ttyACM") {
        0
    } else if base.starts_with("ttyUSB") || base.starts_with("COM") {
        1
    } else {
        2
    };
    (rank, base.to_string())
}

/// List available serial ports in a stable order
pub fn list_ports() -> Vec<PortInfo> {
    let mut ports: Vec<PortInfo> = match serialport::available_ports() {
        Ok(found) => found.into_iter().map(PortInfo::from).collect(),
        Err(e) => {
            tracing::warn!("port enumeration failed: {e}");
            Vec::new()
        }
    };
    ports.sort_by_key(|p| port_rank(&p.name));
    ports.dedup_by(|a, b| a.name == b.name);
    ports
}

/// Open a serial port with the given line speed and read timeout
pub fn open_port(
    name: &str,
    baud_rate: u32,
    timeout: Duration,
) -> Result<Box<dyn SerialPort>, ProtocolError> {
    serialport::new(name, baud_rate)
        .timeout(timeout)
        .open()
        .map_err(ProtocolError::from)
        .and_then(|mut port| {
            configure_port(port.as_mut())?;
            Ok(port)
        })
        .map_err(|e| connection_failed(name, e))
}

/// Report any failure while bringing up `port` as a connection failure
fn connection_failed(port: &str, err: ProtocolError) -> ProtocolError {
    match err {
        ProtocolError::ConnectionFailed { .. } => err,
        ProtocolError::SerialError(reason) => ProtocolError::ConnectionFailed {
            port: port.to_string(),
            reason,
        },
        other => ProtocolError::ConnectionFailed {
            port: port.to_string(),
            reason: other.to_string(),
        },
    }
}

/// Standard 8N1 framing, no flow control
pub fn configure_port(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    port.set_data_bits(serialport::DataBits::Eight)?;
    port.set_parity(serialport::Parity::None)?;
    port.set_stop_bits(serialport::StopBits::One)?;
    port.set_flow_control(serialport::FlowControl::None)?;

    // Keeping DTR asserted avoids an extra reset on Arduino-style boards.
    best_effort("assert DTR", port.write_data_terminal_ready(true));
    Ok(())
}
