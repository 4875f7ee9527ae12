//! Serial-port radio
//!
//! Exposes RFCOMM TTYs and USB-serial adapters through [`RadioCapability`].
//! The bonded registry is the configured device list, optionally extended
//! with whatever serial ports the OS enumerated when the radio was built.
//! Enumeration blocks, so build the radio off the async runtime.

use crate::config::{DeviceConfig, MonitorConfig};
use async_trait::async_trait;
use obd_link::{BoxedChannel, DeviceDescriptor, RadioCapability, SocketSecurity, SppSocket};
use std::io;
use std::path::Path;
use tokio_serial::{SerialPortBuilderExt, SerialPortType};
use tracing::{debug, info};
use uuid::Uuid;

const BLUETOOTH_CLASS_DIR: &str = "/sys/class/bluetooth";
const DEFAULT_BAUD_RATE: u32 = 38400;

/// A serial endpoint in the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialDevice {
    pub name: String,
    pub address: String,
    pub path: String,
    pub baud_rate: u32,
    pub secure: bool,
}

impl From<&DeviceConfig> for SerialDevice {
    fn from(config: &DeviceConfig) -> Self {
        Self {
            name: config.name.clone(),
            address: config.address.clone().unwrap_or_else(|| config.path.clone()),
            path: config.path.clone(),
            baud_rate: config.baud_rate,
            secure: config.secure,
        }
    }
}

impl SerialDevice {
    fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor::new(&self.name, &self.address)
    }
}

/// [`RadioCapability`] over local serial ports
pub struct SerialRadio {
    configured: Vec<SerialDevice>,
    registry: Vec<SerialDevice>,
    require_adapter: bool,
}

impl SerialRadio {
    /// Build the radio, enumerating serial ports if `scan_ports` is set
    pub fn new(configured: Vec<SerialDevice>, scan_ports: bool, require_adapter: bool) -> Self {
        let registry = if scan_ports {
            with_enumerated_ports(configured.clone())
        } else {
            configured.clone()
        };
        Self {
            configured,
            registry,
            require_adapter,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            config.devices.iter().map(SerialDevice::from).collect(),
            config.scan_ports,
            config.require_adapter,
        )
    }

    /// Configured devices followed by enumerated ports not already listed
    pub fn registry(&self) -> &[SerialDevice] {
        &self.registry
    }

    fn lookup(&self, address: &str) -> Option<&SerialDevice> {
        self.registry.iter().find(|d| d.address == address)
    }
}

fn with_enumerated_ports(mut devices: Vec<SerialDevice>) -> Vec<SerialDevice> {
    match tokio_serial::available_ports() {
        Ok(ports) => {
            for port in ports {
                if devices.iter().any(|d| d.path == port.port_name) {
                    continue;
                }
                let name = match &port.port_type {
                    SerialPortType::UsbPort(usb) => usb.product.clone().unwrap_or_default(),
                    _ => String::new(),
                };
                devices.push(SerialDevice {
                    name,
                    address: port.port_name.clone(),
                    path: port.port_name,
                    baud_rate: DEFAULT_BAUD_RATE,
                    secure: false,
                });
            }
        }
        Err(e) => debug!("Serial port enumeration failed: {}", e),
    }
    devices
}

impl RadioCapability for SerialRadio {
    fn adapter_available(&self) -> bool {
        if !self.require_adapter {
            return true;
        }
        std::fs::read_dir(BLUETOOTH_CLASS_DIR)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .any(|e| e.file_name().to_string_lossy().starts_with("hci"))
            })
            .unwrap_or(false)
    }

    fn is_authorized(&self) -> bool {
        self.configured.iter().all(|device| {
            match std::fs::metadata(Path::new(&device.path)) {
                Ok(meta) => !meta.permissions().readonly(),
                // Not present yet; the open will report it
                Err(_) => true,
            }
        })
    }

    fn bonded_devices(&self) -> Vec<DeviceDescriptor> {
        self.registry().iter().map(SerialDevice::descriptor).collect()
    }

    fn create_socket(
        &self,
        device: &DeviceDescriptor,
        _service: Uuid,
        security: SocketSecurity,
    ) -> io::Result<Box<dyn SppSocket>> {
        let serial = self.lookup(&device.address).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no serial device for {}", device.address),
            )
        })?;
        if security.is_secure() && !serial.secure {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{} is not bonded securely", serial.path),
            ));
        }
        Ok(Box::new(SerialSocket {
            path: serial.path.clone(),
            baud_rate: serial.baud_rate,
        }))
    }
}

struct SerialSocket {
    path: String,
    baud_rate: u32,
}

#[async_trait]
impl SppSocket for SerialSocket {
    async fn connect(self: Box<Self>) -> io::Result<BoxedChannel> {
        info!("Opening {} at {} baud", self.path, self.baud_rate);
        let stream = tokio_serial::new(&self.path, self.baud_rate)
            .open_native_async()
            .map_err(io::Error::from)?;
        Ok(Box::new(stream))
    }
}
