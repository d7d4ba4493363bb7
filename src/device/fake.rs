use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use uuid::Uuid;

use crate::device::constants::{device_information_uuid, device_name_uuid, generic_access_uuid, manufacturer_name_uuid, model_number_uuid};
use crate::device::platform::{Alerts, BluetoothDevice, BluetoothPlatform, GattServer, RequestDeviceOptions};
use crate::error::DeviceError;

#[derive(Debug, Clone, Default)]
pub struct FakeGattState {
    pub connected: bool,
    pub connect_calls: usize,
    pub disconnect_calls: usize,
}

#[derive(Debug, Default)]
pub struct FakeGatt {
    state: Mutex<FakeGattState>,
    services: HashMap<Uuid, HashMap<Uuid, Vec<u8>>>,
    fail_connect: bool,
    fail_disconnect: bool,
}

#[async_trait]
impl GattServer for FakeGatt {
    async fn connect(&self) -> Result<(), DeviceError> {
        let mut state = self.state.lock().unwrap();
        state.connect_calls += 1;
        if self.fail_connect {
            return Err(DeviceError::Btle("connection refused".to_string()));
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DeviceError> {
        let mut state = self.state.lock().unwrap();
        state.disconnect_calls += 1;
        if self.fail_disconnect {
            return Err(DeviceError::Btle("disconnect failed".to_string()));
        }
        state.connected = false;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    async fn characteristics(&self, service: Uuid) -> Result<Vec<Uuid>, DeviceError> {
        if !self.state.lock().unwrap().connected {
            return Err(DeviceError::NotConnected);
        }
        self.services.get(&service)
            .map(|characteristics| characteristics.keys().cloned().collect())
            .ok_or(DeviceError::MissingService(service))
    }

    async fn read(&self, service: Uuid, characteristic: Uuid) -> Result<Vec<u8>, DeviceError> {
        if !self.state.lock().unwrap().connected {
            return Err(DeviceError::NotConnected);
        }
        self.services.get(&service)
            .ok_or(DeviceError::MissingService(service))?
            .get(&characteristic)
            .cloned()
            .ok_or(DeviceError::MissingCharacteristic(characteristic))
    }
}

#[derive(Debug)]
pub struct FakeDevice {
    id: String,
    name: Option<String>,
    gatt: Option<Arc<FakeGatt>>,
}

impl FakeDevice {
    pub fn new(id: &str) -> Self {
        FakeDevice {
            id: id.to_string(),
            name: None,
            gatt: Some(Arc::new(FakeGatt::default())),
        }
    }

    fn gatt_mut(&mut self) -> &mut FakeGatt {
        let gatt = self.gatt.get_or_insert_with(|| Arc::new(FakeGatt::default()));
        Arc::get_mut(gatt).expect("fake gatt is shared before build()")
    }

    fn with_characteristic(mut self, service: Uuid, characteristic: Uuid, value: &str) -> Self {
        self.gatt_mut().services
            .entry(service)
            .or_default()
            .insert(characteristic, value.as_bytes().to_vec());
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_model_number(self, value: &str) -> Self {
        self.with_characteristic(device_information_uuid(), model_number_uuid(), value)
    }

    pub fn with_manufacturer(self, value: &str) -> Self {
        self.with_characteristic(device_information_uuid(), manufacturer_name_uuid(), value)
    }

    pub fn with_device_name(self, value: &str) -> Self {
        self.with_characteristic(generic_access_uuid(), device_name_uuid(), value)
    }

    pub fn failing_connect(mut self) -> Self {
        self.gatt_mut().fail_connect = true;
        self
    }

    pub fn failing_disconnect(mut self) -> Self {
        self.gatt_mut().fail_disconnect = true;
        self
    }

    pub fn without_gatt(mut self) -> Self {
        self.gatt = None;
        self
    }

    pub fn build(self) -> Arc<FakeDevice> {
        Arc::new(self)
    }

    pub fn gatt_state(&self) -> FakeGattState {
        self.gatt.as_ref()
            .map(|gatt| gatt.state.lock().unwrap().clone())
            .unwrap_or_default()
    }
}

impl BluetoothDevice for FakeDevice {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn gatt(&self) -> Option<Arc<dyn GattServer>> {
        self.gatt.clone().map(|gatt| gatt as Arc<dyn GattServer>)
    }
}

/// Answers device requests from a queue, in order.
pub struct FakeBluetooth {
    available: bool,
    responses: Mutex<VecDeque<Result<Arc<dyn BluetoothDevice>, DeviceError>>>,
    requests: Mutex<Vec<RequestDeviceOptions>>,
}

impl FakeBluetooth {
    pub fn new() -> Self {
        FakeBluetooth {
            available: true,
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        FakeBluetooth {
            available: false,
            ..FakeBluetooth::new()
        }
    }

    pub fn choose(&self, device: Arc<FakeDevice>) {
        self.responses.lock().unwrap().push_back(Ok(device as Arc<dyn BluetoothDevice>));
    }

    pub fn fail(&self, error: DeviceError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<RequestDeviceOptions> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl BluetoothPlatform for FakeBluetooth {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn request_device(&self, options: RequestDeviceOptions) -> Result<Arc<dyn BluetoothDevice>, DeviceError> {
        self.requests.lock().unwrap().push(options);
        self.responses.lock().unwrap()
            .pop_front()
            .unwrap_or(Err(DeviceError::NotFound))
    }
}

#[derive(Default)]
pub struct RecordingAlerts {
    messages: Mutex<Vec<String>>,
}

impl RecordingAlerts {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Alerts for RecordingAlerts {
    fn alert(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}
