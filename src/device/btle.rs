use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use log::{debug, info, warn};
use tokio::sync::OnceCell;
use tokio::time::sleep;
use uuid::Uuid;

use crate::device::platform::{BluetoothDevice, BluetoothPlatform, ChooserEntry, DeviceChooser, GattServer, RequestDeviceOptions};
use crate::error::DeviceError;

/**
 * Bluetooth through btleplug. Requesting a device scans for a while, then lets the `DeviceChooser`
 * pick one of the peripherals that were seen.
 */
pub struct BtlePlatform {
    manager: OnceCell<Manager>,
    chooser: Arc<dyn DeviceChooser>,
    scan_duration: Duration,
}

impl BtlePlatform {
    pub fn new(chooser: Arc<dyn DeviceChooser>, scan_duration: Duration) -> Self {
        BtlePlatform {
            manager: OnceCell::new(),
            chooser,
            scan_duration,
        }
    }

    async fn adapters(&self) -> Result<Vec<Adapter>, DeviceError> {
        let manager = self.manager.get_or_try_init(|| async {
            Manager::new().await.map_err(DeviceError::from)
        }).await?;

        Ok(manager.adapters().await?)
    }
}

/**
 * Starts items `0..count` in order. If one fails to start, the ones that were already started are
 * stopped again before the error is returned.
 */
async fn start_all<E, Start, StartFut, Stop, StopFut>(count: usize, mut start: Start, mut stop: Stop) -> Result<(), E>
where
    E: Display,
    Start: FnMut(usize) -> StartFut,
    StartFut: Future<Output = Result<(), E>>,
    Stop: FnMut(usize) -> StopFut,
    StopFut: Future<Output = Result<(), E>>,
{
    for index in 0..count {
        if let Err(err) = start(index).await {
            for started in 0..index {
                if let Err(stop_err) = stop(started).await {
                    warn!("Failed to stop scanning: {}", stop_err);
                }
            }
            return Err(err);
        }
    }

    Ok(())
}

async fn collect_candidates(adapters: &[Adapter]) -> Vec<(ChooserEntry, Peripheral)> {
    let mut candidates: Vec<(ChooserEntry, Peripheral)> = Vec::new();

    for adapter in adapters {
        let peripherals = match adapter.peripherals().await {
            Ok(v) => v,
            Err(err) => {
                warn!("Failed to query BLE adapter for peripherals: {}", err);
                continue;
            },
        };

        for peripheral in peripherals {
            let id = format!("{:?}", peripheral.id());
            if candidates.iter().any(|(entry, _)| entry.id == id) {
                continue;
            }

            let properties = match peripheral.properties().await {
                Ok(v) => v,
                Err(err) => {
                    warn!("Could not query peripheral for properties: {:?}", err);
                    None
                },
            };

            let (name, rssi) = match properties {
                Some(properties) => (properties.local_name, properties.rssi),
                None => (None, None),
            };

            candidates.push((ChooserEntry { id, name, rssi }, peripheral));
        }
    }

    candidates
}

#[async_trait]
impl BluetoothPlatform for BtlePlatform {
    async fn is_available(&self) -> bool {
        match self.adapters().await {
            Ok(adapters) => !adapters.is_empty(),
            Err(err) => {
                warn!("Failed to list bluetooth adapters: {}", err);
                false
            },
        }
    }

    async fn request_device(&self, options: RequestDeviceOptions) -> Result<Arc<dyn BluetoothDevice>, DeviceError> {
        let adapters = self.adapters().await?;

        // an empty filter reports every advertising device
        let filter = ScanFilter::default();
        if !options.accept_all_devices {
            debug!("Service filters are not supported by the chooser, showing all devices");
        }

        start_all(
            adapters.len(),
            |index| {
                let adapter = &adapters[index];
                let filter = filter.clone();
                async move {
                    info!("Scanning using adapter {}...", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
                    adapter.start_scan(filter).await
                }
            },
            |index| adapters[index].stop_scan(),
        ).await?;

        sleep(self.scan_duration).await;
        let candidates = collect_candidates(&adapters).await;

        for adapter in &adapters {
            if let Err(err) = adapter.stop_scan().await {
                warn!("Failed to stop scanning: {}", err);
            }
        }

        info!("Found {} peripherals", candidates.len());
        let entries = candidates.iter().map(|(entry, _)| entry.clone()).collect();
        let chosen = self.chooser.choose(entries).await.ok_or(DeviceError::NotFound)?;

        let (entry, peripheral) = candidates.into_iter()
            .find(|(entry, _)| entry.id == chosen)
            .ok_or(DeviceError::NotFound)?;

        Ok(Arc::new(BtleDevice {
            id: entry.id,
            name: entry.name,
            gatt: Arc::new(BtleGatt {
                peripheral,
                allowed_services: options.optional_services,
            }),
        }))
    }
}

#[derive(Debug)]
pub struct BtleDevice {
    id: String,
    name: Option<String>,
    gatt: Arc<BtleGatt>,
}

impl BluetoothDevice for BtleDevice {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn gatt(&self) -> Option<Arc<dyn GattServer>> {
        Some(self.gatt.clone())
    }
}

/**
 * GATT access to a chosen peripheral. Only services that were requested as optional services may be
 * used, everything else is refused.
 */
#[derive(Debug)]
pub struct BtleGatt {
    peripheral: Peripheral,
    allowed_services: Vec<Uuid>,
}

impl BtleGatt {
    async fn check_service(&self, service: Uuid) -> Result<(), DeviceError> {
        if !self.allowed_services.contains(&service) {
            return Err(DeviceError::ServiceNotAllowed(service));
        }

        if !self.is_connected().await {
            return Err(DeviceError::NotConnected);
        }

        Ok(())
    }
}

#[async_trait]
impl GattServer for BtleGatt {
    async fn connect(&self) -> Result<(), DeviceError> {
        info!("Connecting to peripheral...");
        self.peripheral.connect().await?;

        info!("Connected; Discovering services...");
        self.peripheral.discover_services().await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DeviceError> {
        self.peripheral.disconnect().await?;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        match self.peripheral.is_connected().await {
            Ok(connected) => connected,
            Err(err) => {
                warn!("Error checking for connection state: {:?}", err);
                false
            },
        }
    }

    async fn characteristics(&self, service: Uuid) -> Result<Vec<Uuid>, DeviceError> {
        self.check_service(service).await?;

        let service = self.peripheral.services()
            .into_iter()
            .find(|s| s.uuid == service)
            .ok_or(DeviceError::MissingService(service))?;

        Ok(service.characteristics.iter().map(|c| c.uuid).collect())
    }

    async fn read(&self, service: Uuid, characteristic: Uuid) -> Result<Vec<u8>, DeviceError> {
        self.check_service(service).await?;

        let found = self.peripheral.characteristics()
            .into_iter()
            .find(|c| c.service_uuid == service && c.uuid == characteristic)
            .ok_or(DeviceError::MissingCharacteristic(characteristic))?;

        Ok(self.peripheral.read(&found).await?)
    }
}
