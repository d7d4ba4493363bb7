//! Capabilities the device browser needs from the platform.
//!
//! The browser never talks to a bluetooth stack directly. Everything goes through these traits so
//! that the btleplug backend can be swapped for a fake in tests.

use std::fmt::Debug;
use std::sync::Arc;
use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DeviceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDeviceOptions {
    pub accept_all_devices: bool,
    pub optional_services: Vec<Uuid>,
}

#[async_trait]
pub trait BluetoothPlatform: Send + Sync {
    /// Whether a bluetooth adapter can be used at all.
    async fn is_available(&self) -> bool;

    /// Let the user pick one device. A dismissed chooser yields [`DeviceError::NotFound`].
    async fn request_device(&self, options: RequestDeviceOptions) -> Result<Arc<dyn BluetoothDevice>, DeviceError>;
}

pub trait BluetoothDevice: Send + Sync + Debug {
    /// Opaque identifier, stable for the lifetime of the platform.
    fn id(&self) -> String;

    fn name(&self) -> Option<String>;

    fn gatt(&self) -> Option<Arc<dyn GattServer>>;
}

#[async_trait]
pub trait GattServer: Send + Sync {
    async fn connect(&self) -> Result<(), DeviceError>;

    async fn disconnect(&self) -> Result<(), DeviceError>;

    async fn is_connected(&self) -> bool;

    /// UUIDs of the characteristics of a primary service.
    async fn characteristics(&self, service: Uuid) -> Result<Vec<Uuid>, DeviceError>;

    async fn read(&self, service: Uuid, characteristic: Uuid) -> Result<Vec<u8>, DeviceError>;
}

/// Entry shown to the user while choosing a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChooserEntry {
    pub id: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
}

impl ChooserEntry {
    pub fn label(&self) -> String {
        let name = self.name.as_deref().unwrap_or("Unknown or Unsupported Device");
        match self.rssi {
            Some(rssi) => format!("{} ({}) {} dBm", name, self.id, rssi),
            None => format!("{} ({})", name, self.id),
        }
    }
}

#[async_trait]
pub trait DeviceChooser: Send + Sync {
    /// Returns the id of the chosen entry, `None` if the user cancelled.
    async fn choose(&self, entries: Vec<ChooserEntry>) -> Option<String>;
}

/// Blocking, user facing messages.
pub trait Alerts: Send + Sync {
    fn alert(&self, message: &str);
}
