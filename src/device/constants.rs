use btleplug::api::bleuuid::uuid_from_u16;
use uuid::Uuid;

/**
 * Name used for devices that do not report a name and expose no readable name characteristic.
 */
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";

/**
 * How long (milliseconds) the chooser collects advertisements before the user is asked to pick a
 * device, if not configured otherwise.
 */
pub const DEFAULT_CHOOSER_SCAN_MS: u64 = 4000;

pub const GENERIC_ACCESS_SERVICE: u16 = 0x1800;
pub const GENERIC_ATTRIBUTE_SERVICE: u16 = 0x1801;
pub const DEVICE_INFORMATION_SERVICE: u16 = 0x180a;
pub const BATTERY_SERVICE: u16 = 0x180f;

/**
 * The device_information service spelled out as a full 128-bit UUID. Requested in addition to the
 * 16-bit alias because some stacks only match the long form.
 */
pub const DEVICE_INFORMATION_SERVICE_LONG: &str = "0000180a-0000-1000-8000-00805f9b34fb";

pub const DEVICE_NAME_CHARACTERISTIC: u16 = 0x2a00;
pub const MODEL_NUMBER_CHARACTERISTIC: u16 = 0x2a24;
pub const MANUFACTURER_NAME_CHARACTERISTIC: u16 = 0x2a29;

pub fn generic_access_uuid() -> Uuid {
    uuid_from_u16(GENERIC_ACCESS_SERVICE)
}

pub fn device_information_uuid() -> Uuid {
    uuid_from_u16(DEVICE_INFORMATION_SERVICE)
}

pub fn device_name_uuid() -> Uuid {
    uuid_from_u16(DEVICE_NAME_CHARACTERISTIC)
}

pub fn model_number_uuid() -> Uuid {
    uuid_from_u16(MODEL_NUMBER_CHARACTERISTIC)
}

pub fn manufacturer_name_uuid() -> Uuid {
    uuid_from_u16(MANUFACTURER_NAME_CHARACTERISTIC)
}

/**
 * Services that may be accessed after a device has been chosen. GATT access to any other service
 * is refused.
 */
pub fn optional_services() -> Vec<Uuid> {
    let mut services = vec![
        uuid_from_u16(GENERIC_ACCESS_SERVICE),
        uuid_from_u16(GENERIC_ATTRIBUTE_SERVICE),
        uuid_from_u16(DEVICE_INFORMATION_SERVICE),
        uuid_from_u16(BATTERY_SERVICE),
    ];

    // parse of a constant, covered by tests
    if let Ok(long) = Uuid::parse_str(DEVICE_INFORMATION_SERVICE_LONG) {
        services.push(long);
    }

    services
}
