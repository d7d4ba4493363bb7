use std::sync::Arc;

use crate::device::platform::BluetoothDevice;
use crate::error::DeviceError;

#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    pub device: Arc<dyn BluetoothDevice>,
    pub connected: bool,
    pub connecting: bool,
}

/**
 * Snapshot of the discovered devices. Every change publishes a new `Arc`, so observers can compare
 * snapshots with `Arc::ptr_eq`.
 */
pub type DeviceList = Arc<Vec<DeviceRecord>>;

#[derive(Debug, Clone)]
pub enum ScanOutcome {
    /// No bluetooth adapter could be used.
    Unsupported,
    /// The chooser was dismissed.
    Cancelled,
    Discovered(DeviceRecord),
    Failed(DeviceError),
}
