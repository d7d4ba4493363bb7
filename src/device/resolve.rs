//! Best-effort lookup of a human readable device name.
//!
//! Each resolver is tried in order and the first one that produces a non-empty name wins. No
//! resolver ever fails: errors are logged and treated as "no name".

use async_trait::async_trait;
use log::{debug, warn};
use uuid::Uuid;

use crate::device::constants::{UNKNOWN_DEVICE_NAME, device_information_uuid, device_name_uuid, generic_access_uuid, manufacturer_name_uuid, model_number_uuid};
use crate::device::platform::{BluetoothDevice, GattServer};

#[async_trait]
pub trait NameResolver: Send + Sync {
    fn describe(&self) -> &'static str;

    /// `gatt` is the connected probe, `None` if the device has no GATT server or connecting failed.
    async fn resolve(&self, device: &dyn BluetoothDevice, gatt: Option<&dyn GattServer>) -> Option<String>;
}

pub fn decode_name(value: &[u8]) -> Option<String> {
    let name = String::from_utf8_lossy(value);
    let name = name.trim_end_matches('\0');

    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Finds a characteristic in the listing of a service, then reads it.
pub struct ListedCharacteristic {
    pub description: &'static str,
    pub service: Uuid,
    pub characteristic: Uuid,
}

#[async_trait]
impl NameResolver for ListedCharacteristic {
    fn describe(&self) -> &'static str {
        self.description
    }

    async fn resolve(&self, _device: &dyn BluetoothDevice, gatt: Option<&dyn GattServer>) -> Option<String> {
        let gatt = gatt?;

        let characteristics = match gatt.characteristics(self.service).await {
            Ok(v) => v,
            Err(err) => {
                warn!("Could not read device information ({}): {}", self.description, err);
                return None;
            },
        };

        if !characteristics.contains(&self.characteristic) {
            debug!("Device does not expose {}", self.description);
            return None;
        }

        match gatt.read(self.service, self.characteristic).await {
            Ok(value) => decode_name(&value),
            Err(err) => {
                warn!("Could not read {}: {}", self.description, err);
                None
            },
        }
    }
}

/// Reads a characteristic directly, without listing the service first.
pub struct DirectCharacteristic {
    pub description: &'static str,
    pub service: Uuid,
    pub characteristic: Uuid,
}

#[async_trait]
impl NameResolver for DirectCharacteristic {
    fn describe(&self) -> &'static str {
        self.description
    }

    async fn resolve(&self, _device: &dyn BluetoothDevice, gatt: Option<&dyn GattServer>) -> Option<String> {
        let gatt = gatt?;

        match gatt.read(self.service, self.characteristic).await {
            Ok(value) => decode_name(&value),
            Err(err) => {
                warn!("Could not read {}: {}", self.description, err);
                None
            },
        }
    }
}

/// The name the platform reported while scanning.
pub struct PlatformName;

#[async_trait]
impl NameResolver for PlatformName {
    fn describe(&self) -> &'static str {
        "platform name"
    }

    async fn resolve(&self, device: &dyn BluetoothDevice, _gatt: Option<&dyn GattServer>) -> Option<String> {
        device.name().filter(|name| !name.is_empty())
    }
}

/**
 * Model number first, because it is usually more specific than the advertised name. A name that
 * the platform already knows beats the manufacturer and the generic access device name.
 */
pub fn default_resolvers() -> Vec<Box<dyn NameResolver>> {
    vec![
        Box::new(ListedCharacteristic {
            description: "model number",
            service: device_information_uuid(),
            characteristic: model_number_uuid(),
        }),
        Box::new(PlatformName),
        Box::new(ListedCharacteristic {
            description: "manufacturer name",
            service: device_information_uuid(),
            characteristic: manufacturer_name_uuid(),
        }),
        Box::new(DirectCharacteristic {
            description: "generic access device name",
            service: generic_access_uuid(),
            characteristic: device_name_uuid(),
        }),
    ]
}

/**
 * Connects a probe to the device (if it has a GATT server), runs the resolvers and disconnects the
 * probe again. The probe is never the connection the user asked for.
 */
pub async fn resolve_device_name(device: &dyn BluetoothDevice, resolvers: &[Box<dyn NameResolver>]) -> String {
    let gatt = device.gatt();

    let probe = match &gatt {
        Some(gatt) => match gatt.connect().await {
            Ok(()) => Some(gatt.as_ref()),
            Err(err) => {
                warn!("Could not get detailed device information: {}", err);
                None
            },
        },
        None => None,
    };

    let mut name = None;
    for resolver in resolvers {
        if let Some(resolved) = resolver.resolve(device, probe).await {
            debug!("Resolved name of {} using {}: {}", device.id(), resolver.describe(), resolved);
            name = Some(resolved);
            break;
        }
    }

    if let Some(probe) = probe {
        if let Err(err) = probe.disconnect().await {
            warn!("Failed to disconnect probe from {}: {}", device.id(), err);
        }
    }

    name.unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string())
}
