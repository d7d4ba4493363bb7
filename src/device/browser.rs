use std::sync::Arc;
use log::{debug, error, info, warn};
use scopeguard::guard;
use tokio::sync::watch;

use crate::device::constants::optional_services;
use crate::device::platform::{Alerts, BluetoothPlatform, RequestDeviceOptions};
use crate::device::resolve::{default_resolvers, resolve_device_name, NameResolver};
use crate::device::types::{DeviceList, DeviceRecord, ScanOutcome};
use crate::error::DeviceError;

/**
 * Keeps the list of devices the user picked and their connection state.
 *
 * Observers get a new `DeviceList` snapshot from `subscribe_devices()` for every change. Platform
 * errors never escape: probe failures are logged, failures of scan/connect are shown once through
 * `Alerts`.
 */
pub struct DeviceBrowser {
    platform: Arc<dyn BluetoothPlatform>,
    alerts: Arc<dyn Alerts>,
    resolvers: Vec<Box<dyn NameResolver>>,
    devices: watch::Sender<DeviceList>,
    scanning: watch::Sender<bool>,
}

impl DeviceBrowser {
    pub fn new(platform: Arc<dyn BluetoothPlatform>, alerts: Arc<dyn Alerts>) -> Self {
        let (devices, _) = watch::channel(Arc::new(Vec::new()));
        let (scanning, _) = watch::channel(false);

        DeviceBrowser {
            platform,
            alerts,
            resolvers: default_resolvers(),
            devices,
            scanning,
        }
    }

    pub fn subscribe_devices(&self) -> watch::Receiver<DeviceList> {
        self.devices.subscribe()
    }

    pub fn subscribe_scanning(&self) -> watch::Receiver<bool> {
        self.scanning.subscribe()
    }

    pub fn devices(&self) -> DeviceList {
        self.devices.borrow().clone()
    }

    pub fn is_scanning(&self) -> bool {
        *self.scanning.borrow()
    }

    fn find(&self, id: &str) -> Option<DeviceRecord> {
        self.devices.borrow().iter().find(|d| d.id == id).cloned()
    }

    fn upsert(&self, record: DeviceRecord) {
        self.devices.send_modify(|list| {
            let mut next = list.as_ref().clone();

            match next.iter().position(|d| d.id == record.id) {
                Some(index) => next[index] = record,
                None => next.push(record),
            }

            *list = Arc::new(next);
        });
    }

    // returns false if the device is not in the list
    fn update<F: FnOnce(&mut DeviceRecord)>(&self, id: &str, modify: F) -> bool {
        self.devices.send_if_modified(|list| {
            let Some(index) = list.iter().position(|d| d.id == id) else {
                return false;
            };

            let mut next = list.as_ref().clone();
            modify(&mut next[index]);
            *list = Arc::new(next);
            true
        })
    }

    pub async fn scan(&self) -> ScanOutcome {
        if !self.platform.is_available().await {
            warn!("Bluetooth is not supported on this system");
            self.alerts.alert(&DeviceError::Unsupported.to_string());
            return ScanOutcome::Unsupported;
        }

        self.scanning.send_replace(true);
        let _scanning = guard((), |_| {
            self.scanning.send_replace(false);
        });

        let options = RequestDeviceOptions {
            accept_all_devices: true,
            optional_services: optional_services(),
        };

        let device = match self.platform.request_device(options).await {
            Ok(device) => device,
            Err(err) if err.is_user_cancellation() => {
                debug!("Device chooser was cancelled");
                return ScanOutcome::Cancelled;
            },
            Err(err) => {
                error!("Error scanning for Bluetooth devices: {}", err);
                self.alerts.alert(&format!("Error scanning for Bluetooth devices: {}", err));
                return ScanOutcome::Failed(err);
            },
        };

        let name = resolve_device_name(device.as_ref(), &self.resolvers).await;

        let record = DeviceRecord {
            id: device.id(),
            name,
            device,
            connected: false,
            connecting: false,
        };

        info!("Discovered device {} ({})", record.name, record.id);
        self.upsert(record.clone());
        ScanOutcome::Discovered(record)
    }

    /**
     * Toggles the connection: a connected device is disconnected instead.
     */
    pub async fn connect(&self, id: &str) {
        let Some(record) = self.find(id) else {
            warn!("Can not connect to unknown device {}", id);
            return;
        };

        if record.connected {
            self.disconnect(id).await;
            return;
        }

        self.update(id, |d| d.connecting = true);
        let _connecting = guard((), |_| {
            self.update(id, |d| d.connecting = false);
        });

        let result = match record.device.gatt() {
            None => Err(DeviceError::NoGattServer),
            Some(gatt) => gatt.connect().await,
        };

        match result {
            Ok(()) => {
                info!("Successfully connected to device: {}", record.name);
                self.update(id, |d| d.connected = true);
            },
            Err(err) => {
                error!("Error connecting to device {}: {}", record.name, err);
                self.alerts.alert(&format!("Connection failed: {}", err));
                self.update(id, |d| d.connected = false);
            },
        }
    }

    pub async fn disconnect(&self, id: &str) {
        let Some(record) = self.find(id) else {
            return;
        };

        if !record.connected {
            return;
        }

        if let Some(gatt) = record.device.gatt() {
            if gatt.is_connected().await {
                if let Err(err) = gatt.disconnect().await {
                    error!("Error disconnecting from device {}: {}", record.name, err);
                }
            }
        }

        self.update(id, |d| d.connected = false);
        info!("Disconnected from device: {}", record.name);
    }

    /**
     * Disconnects all connected devices, one after the other.
     */
    pub async fn teardown(&self) {
        let devices = self.devices();

        for record in devices.iter().filter(|d| d.connected) {
            self.disconnect(&record.id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::constants::UNKNOWN_DEVICE_NAME;
    use crate::device::fake::{FakeBluetooth, FakeDevice, RecordingAlerts};

    fn browser(platform: &Arc<FakeBluetooth>, alerts: &Arc<RecordingAlerts>) -> DeviceBrowser {
        DeviceBrowser::new(platform.clone(), alerts.clone())
    }

    #[tokio::test]
    async fn rescanning_the_same_device_replaces_its_entry() {
        let platform = Arc::new(FakeBluetooth::new());
        let alerts = Arc::new(RecordingAlerts::default());
        let browser = browser(&platform, &alerts);

        platform.choose(FakeDevice::new("dev-1").with_name("First").build());
        platform.choose(FakeDevice::new("dev-1").with_name("Second").build());

        browser.scan().await;
        browser.scan().await;

        let devices = browser.devices();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, "dev-1");
        assert_eq!(devices[0].name, "Second");
    }

    #[tokio::test]
    async fn different_devices_are_appended() {
        let platform = Arc::new(FakeBluetooth::new());
        let alerts = Arc::new(RecordingAlerts::default());
        let browser = browser(&platform, &alerts);

        platform.choose(FakeDevice::new("dev-1").build());
        platform.choose(FakeDevice::new("dev-2").with_manufacturer("Acme").build());

        browser.scan().await;
        browser.scan().await;

        let devices = browser.devices();
        let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec![UNKNOWN_DEVICE_NAME, "Acme"]);
    }

    #[tokio::test]
    async fn scan_requests_all_devices_with_optional_services() {
        let platform = Arc::new(FakeBluetooth::new());
        let alerts = Arc::new(RecordingAlerts::default());
        let browser = browser(&platform, &alerts);

        browser.scan().await;

        let requests = platform.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].accept_all_devices);
        assert_eq!(requests[0].optional_services, optional_services());
    }

    #[tokio::test]
    async fn cancelled_chooser_is_silent() {
        let platform = Arc::new(FakeBluetooth::new());
        let alerts = Arc::new(RecordingAlerts::default());
        let browser = browser(&platform, &alerts);

        platform.choose(FakeDevice::new("dev-1").build());
        browser.scan().await;
        let before = browser.devices();

        platform.fail(DeviceError::NotFound);
        let outcome = browser.scan().await;

        assert!(matches!(outcome, ScanOutcome::Cancelled));
        assert!(Arc::ptr_eq(&before, &browser.devices()));
        assert!(alerts.messages().is_empty());
        assert!(!browser.is_scanning());
    }

    #[tokio::test]
    async fn scan_failure_is_alerted_once() {
        let platform = Arc::new(FakeBluetooth::new());
        let alerts = Arc::new(RecordingAlerts::default());
        let browser = browser(&platform, &alerts);

        platform.fail(DeviceError::Btle("adapter powered off".to_string()));
        let outcome = browser.scan().await;

        assert!(matches!(outcome, ScanOutcome::Failed(_)));
        assert_eq!(alerts.messages().len(), 1);
        assert!(alerts.messages()[0].starts_with("Error scanning for Bluetooth devices: "));
        assert!(browser.devices().is_empty());
        assert!(!browser.is_scanning());
    }

    #[tokio::test]
    async fn scanning_flag_is_reset_after_success() {
        let platform = Arc::new(FakeBluetooth::new());
        let alerts = Arc::new(RecordingAlerts::default());
        let browser = browser(&platform, &alerts);
        let mut scanning = browser.subscribe_scanning();

        platform.choose(FakeDevice::new("dev-1").build());
        browser.scan().await;

        assert!(!browser.is_scanning());
        // the flag went up at some point during the scan
        assert!(scanning.has_changed().unwrap());
        assert!(!*scanning.borrow_and_update());
    }

    #[tokio::test]
    async fn unsupported_platform_alerts_without_scanning() {
        let platform = Arc::new(FakeBluetooth::unavailable());
        let alerts = Arc::new(RecordingAlerts::default());
        let browser = browser(&platform, &alerts);

        let outcome = browser.scan().await;

        assert!(matches!(outcome, ScanOutcome::Unsupported));
        assert!(platform.requests().is_empty());
        assert_eq!(alerts.messages(), vec![DeviceError::Unsupported.to_string()]);
        assert!(!browser.is_scanning());
    }

    #[tokio::test]
    async fn probe_connection_is_closed_after_scan() {
        let platform = Arc::new(FakeBluetooth::new());
        let alerts = Arc::new(RecordingAlerts::default());
        let browser = browser(&platform, &alerts);

        let device = FakeDevice::new("dev-1").with_model_number("M1").build();
        platform.choose(device.clone());
        browser.scan().await;

        let devices = browser.devices();
        let record = &devices[0];
        assert_eq!(record.name, "M1");
        assert!(!record.connected);
        assert!(!device.gatt_state().connected);
    }

    #[tokio::test]
    async fn connect_toggles_connection() {
        let platform = Arc::new(FakeBluetooth::new());
        let alerts = Arc::new(RecordingAlerts::default());
        let browser = browser(&platform, &alerts);

        let device = FakeDevice::new("dev-1").build();
        platform.choose(device.clone());
        browser.scan().await;
        let probe_connects = device.gatt_state().connect_calls;

        browser.connect("dev-1").await;
        let devices = browser.devices();
        let record = &devices[0];
        assert!(record.connected);
        assert!(!record.connecting);
        assert_eq!(device.gatt_state().connect_calls, probe_connects + 1);

        browser.connect("dev-1").await;
        let devices = browser.devices();
        let record = &devices[0];
        assert!(!record.connected);
        assert!(!device.gatt_state().connected);
        assert_eq!(device.gatt_state().connect_calls, probe_connects + 1);
        assert!(alerts.messages().is_empty());
    }

    #[tokio::test]
    async fn connect_failure_is_alerted_and_rolled_back() {
        let platform = Arc::new(FakeBluetooth::new());
        let alerts = Arc::new(RecordingAlerts::default());
        let browser = browser(&platform, &alerts);

        platform.choose(FakeDevice::new("dev-1").with_name("Lamp").failing_connect().build());
        browser.scan().await;

        browser.connect("dev-1").await;

        let devices = browser.devices();
        let record = &devices[0];
        assert!(!record.connected);
        assert!(!record.connecting);
        assert_eq!(alerts.messages().len(), 1);
        assert!(alerts.messages()[0].starts_with("Connection failed: "));
    }

    #[tokio::test]
    async fn connect_without_gatt_fails() {
        let platform = Arc::new(FakeBluetooth::new());
        let alerts = Arc::new(RecordingAlerts::default());
        let browser = browser(&platform, &alerts);

        platform.choose(FakeDevice::new("dev-1").without_gatt().build());
        browser.scan().await;
        browser.connect("dev-1").await;

        assert!(!browser.devices()[0].connected);
        assert_eq!(alerts.messages(), vec!["Connection failed: GATT server not available".to_string()]);
    }

    #[tokio::test]
    async fn connect_publishes_new_snapshots() {
        let platform = Arc::new(FakeBluetooth::new());
        let alerts = Arc::new(RecordingAlerts::default());
        let browser = browser(&platform, &alerts);

        platform.choose(FakeDevice::new("dev-1").build());
        browser.scan().await;

        let before = browser.devices();
        browser.connect("dev-1").await;
        let after = browser.devices();

        assert!(!Arc::ptr_eq(&before, &after));
        assert!(!before[0].connected);
        assert!(after[0].connected);
    }

    #[tokio::test]
    async fn connect_to_unknown_device_is_ignored() {
        let platform = Arc::new(FakeBluetooth::new());
        let alerts = Arc::new(RecordingAlerts::default());
        let browser = browser(&platform, &alerts);

        let device = FakeDevice::new("dev-1").build();
        platform.choose(device.clone());
        browser.scan().await;
        let before = browser.devices();
        let connects = device.gatt_state().connect_calls;

        browser.connect("missing").await;

        assert!(Arc::ptr_eq(&before, &browser.devices()));
        assert_eq!(device.gatt_state().connect_calls, connects);
        assert!(alerts.messages().is_empty());
    }

    #[tokio::test]
    async fn disconnect_of_disconnected_device_is_noop() {
        let platform = Arc::new(FakeBluetooth::new());
        let alerts = Arc::new(RecordingAlerts::default());
        let browser = browser(&platform, &alerts);

        let device = FakeDevice::new("dev-1").build();
        platform.choose(device.clone());
        browser.scan().await;
        let before = browser.devices();
        let disconnects = device.gatt_state().disconnect_calls;

        browser.disconnect("dev-1").await;

        assert!(Arc::ptr_eq(&before, &browser.devices()));
        assert_eq!(device.gatt_state().disconnect_calls, disconnects);
    }

    #[tokio::test]
    async fn failing_disconnect_still_clears_state() {
        let platform = Arc::new(FakeBluetooth::new());
        let alerts = Arc::new(RecordingAlerts::default());
        let browser = browser(&platform, &alerts);

        platform.choose(FakeDevice::new("dev-1").failing_disconnect().build());
        browser.scan().await;
        browser.connect("dev-1").await;
        assert!(browser.devices()[0].connected);

        browser.disconnect("dev-1").await;

        assert!(!browser.devices()[0].connected);
        assert!(alerts.messages().is_empty());
    }

    #[tokio::test]
    async fn teardown_disconnects_every_connected_device() {
        let platform = Arc::new(FakeBluetooth::new());
        let alerts = Arc::new(RecordingAlerts::default());
        let browser = browser(&platform, &alerts);

        let first = FakeDevice::new("dev-1").build();
        let second = FakeDevice::new("dev-2").build();
        let third = FakeDevice::new("dev-3").build();
        platform.choose(first.clone());
        platform.choose(second.clone());
        platform.choose(third.clone());
        browser.scan().await;
        browser.scan().await;
        browser.scan().await;

        browser.connect("dev-1").await;
        browser.connect("dev-3").await;

        browser.teardown().await;

        assert!(browser.devices().iter().all(|d| !d.connected));
        assert!(!first.gatt_state().connected);
        assert!(!third.gatt_state().connected);
        // only the probe touched the second device
        assert_eq!(second.gatt_state().connect_calls, 1);
    }
}
