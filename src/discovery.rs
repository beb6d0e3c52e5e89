//! Serial port inventory.

use std::io;

use serde::Serialize;
use tokio_serial::SerialPortType;

/// A serial port visible to the host.
#[derive(Debug, Clone, Serialize)]
pub struct PortInfo {
    /// Device path (`/dev/ttyUSB0`, `COM7`, ...)
    pub device: String,

    /// Human-readable description, when the platform provides one
    pub description: Option<String>,
}

/// Enumerate the serial ports visible to the host.
pub fn list_ports() -> io::Result<Vec<PortInfo>> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    Ok(ports
        .into_iter()
        .map(|p| PortInfo {
            device: p.port_name,
            description: describe(&p.port_type),
        })
        .collect())
}

fn describe(port_type: &SerialPortType) -> Option<String> {
    match port_type {
        SerialPortType::UsbPort(usb) => usb
            .product
            .clone()
            .or_else(|| usb.manufacturer.clone()),
        SerialPortType::PciPort => Some("PCI serial device".to_string()),
        SerialPortType::BluetoothPort => Some("Bluetooth serial device".to_string()),
        SerialPortType::Unknown => None,
    }
}
