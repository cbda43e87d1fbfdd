//! Serial port transport
//!
//! Provides the real [`Transport`] implementation over a USB-serial adapter,
//! plus SET-line drivers using the adapter's modem-control outputs (RTS or
//! DTR), which is how a bare HC-12 is usually wired to a host.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::io::{self, Read, Write};
use std::time::Duration;

use super::{ControlLine, Level, Transport};
use crate::protocol::ConfigError;

/// Read timeout for the underlying port. The engine polls `available()`
/// before reading, so this only bounds the rare race where a byte vanishes
/// between the poll and the read.
const PORT_TIMEOUT: Duration = Duration::from_millis(100);

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (vid, pid, product) = match info.port_type {
            SerialPortType::UsbPort(usb_info) => {
                (Some(usb_info.vid), Some(usb_info.pid), usb_info.product)
            }
            _ => (None, None, None),
        };

        Self {
            name: info.port_name,
            vid,
            pid,
            product,
        }
    }
}

/// Helper used to sort port names so that:
///  - ttyUSB* ports come first (sorted numerically by suffix); HC-12s hang
///    off plain USB-UART bridges, not CDC-ACM devices
///  - then ttyACM* ports (sorted numerically)
///  - then other ports (sorted by name)
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (0, num, basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (1, num, basename.to_string());
    }
    (2, 0, basename.to_string())
}

/// List all available serial ports, with /dev fallbacks and deterministic ordering
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    for info in serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
    {
        let p = PortInfo::from(info);
        map.entry(p.name.clone()).or_insert(p);
    }

    // Linux-only: add /dev/ttyUSB* and /dev/ttyACM* entries present but not
    // reported by the serialport API
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyUSB") || fname.starts_with("ttyACM") {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone()).or_insert_with(|| PortInfo {
                        name: full,
                        vid: None,
                        pid: None,
                        product: None,
                    });
                }
            }
        }
    }

    let mut v: Vec<PortInfo> = map.into_values().collect();
    v.sort_by_key(|p| port_sort_key(&p.name));
    v
}

/// Which modem-control output of the adapter drives the module's SET pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetLineDriver {
    /// SET pin wired to the adapter's RTS output.
    Rts,
    /// SET pin wired to the adapter's DTR output.
    Dtr,
}

/// SET-line driver over a cloned handle of the transport's port.
///
/// Asserting the modem-control signal pulls the output low through the
/// usual adapter level shifting, which is exactly what the SET pin wants.
pub struct ModemControlLine {
    port: Box<dyn SerialPort>,
    driver: SetLineDriver,
}

impl ControlLine for ModemControlLine {
    fn set_output_mode(&mut self) {
        // Modem-control outputs are always outputs.
    }

    fn write_level(&mut self, level: Level) -> io::Result<()> {
        let assert = level == Level::Low;
        let result = match self.driver {
            SetLineDriver::Rts => self.port.write_request_to_send(assert),
            SetLineDriver::Dtr => self.port.write_data_terminal_ready(assert),
        };
        result.map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

/// [`Transport`] over a `serialport` handle.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    baud: u32,
}

impl SerialTransport {
    /// Open a port at the given baud rate with 8N1 framing.
    ///
    /// Deliberately leaves RTS and DTR alone: either may be wired to the
    /// module's SET pin and must stay under [`ModemControlLine`] control.
    pub fn open(name: &str, baud: u32) -> Result<Self, ConfigError> {
        let mut port = serialport::new(name, baud)
            .timeout(PORT_TIMEOUT)
            .open()
            .map_err(|e| ConfigError::Serial(e.to_string()))?;

        port.set_data_bits(serialport::DataBits::Eight)
            .map_err(|e| ConfigError::Serial(e.to_string()))?;
        port.set_parity(serialport::Parity::None)
            .map_err(|e| ConfigError::Serial(e.to_string()))?;
        port.set_stop_bits(serialport::StopBits::One)
            .map_err(|e| ConfigError::Serial(e.to_string()))?;
        port.set_flow_control(serialport::FlowControl::None)
            .map_err(|e| ConfigError::Serial(e.to_string()))?;

        Ok(Self { port, baud })
    }

    /// Clone the underlying port into a SET-line driver.
    pub fn modem_control_line(
        &self,
        driver: SetLineDriver,
    ) -> Result<ModemControlLine, ConfigError> {
        let port = self
            .port
            .try_clone()
            .map_err(|e| ConfigError::Serial(e.to_string()))?;
        Ok(ModemControlLine { port, driver })
    }

    /// Discard anything sitting in the OS receive and transmit buffers.
    pub fn clear_buffers(&mut self) -> Result<(), ConfigError> {
        self.port
            .clear(serialport::ClearBuffer::All)
            .map_err(|e| ConfigError::Serial(e.to_string()))
    }

    /// Baud rate the local side is currently tuned to.
    pub fn baud(&self) -> u32 {
        self.baud
    }
}

impl Transport for SerialTransport {
    fn is_listening(&self) -> bool {
        // An open handle is always receiving; the "UART never brought up"
        // case only exists on embedded targets.
        true
    }

    fn available(&mut self) -> usize {
        self.port.bytes_to_read().unwrap_or(0) as usize
    }

    fn read_byte(&mut self) -> Option<u8> {
        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(1) => Some(buf[0]),
            _ => None,
        }
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }

    fn set_baud(&mut self, baud: u32) -> io::Result<()> {
        tracing::debug!(baud, "retuning local serial port");
        self.port
            .set_baud_rate(baud)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        self.baud = baud;
        Ok(())
    }

    fn available_for_write(&mut self) -> bool {
        // No room query in the serialport API; report ready once the OS
        // transmit buffer has drained.
        self.port.bytes_to_write().map(|n| n == 0).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_ports() {
        // Just ensures the function doesn't panic on this host
        let ports = list_ports();
        for port in &ports {
            println!("Found port: {} - {:?}", port.name, port.product);
        }
    }

    #[test]
    fn test_port_sorting() {
        let names = vec![
            "/dev/ttyUSB1",
            "/dev/ttyACM1",
            "/dev/ttyUSB0",
            "/dev/ttyACM0",
            "/dev/someport",
            "/dev/ttyUSB10",
        ];
        let mut ports: Vec<PortInfo> = names
            .into_iter()
            .map(|n| PortInfo {
                name: n.to_string(),
                vid: None,
                pid: None,
                product: None,
            })
            .collect();

        ports.sort_by_key(|p| port_sort_key(&p.name));
        let ordered: Vec<String> = ports.into_iter().map(|p| p.name).collect();

        assert_eq!(
            ordered,
            vec![
                "/dev/ttyUSB0",
                "/dev/ttyUSB1",
                "/dev/ttyUSB10",
                "/dev/ttyACM0",
                "/dev/ttyACM1",
                "/dev/someport",
            ]
        );
    }
}
