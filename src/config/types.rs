use serde::{Deserialize, Serialize};

use crate::device::constants::DEFAULT_CHOOSER_SCAN_MS;
use crate::push::constants::{API_URL, PUSH_SERVICE_URL, REGISTRATION_DELAY_MS, REQUEST_RETRIES, REQUEST_TIMEOUT_MS, VAPID_PUBLIC_KEY};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub api_url: String,
    pub vapid_public_key: String,
    pub push_service_url: String,
    pub request_timeout_ms: u64,
    pub request_retries: u32,
    pub chooser_scan_ms: u64,
    pub registration_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: API_URL.to_string(),
            vapid_public_key: VAPID_PUBLIC_KEY.to_string(),
            push_service_url: PUSH_SERVICE_URL.to_string(),
            request_timeout_ms: REQUEST_TIMEOUT_MS,
            request_retries: REQUEST_RETRIES,
            chooser_scan_ms: DEFAULT_CHOOSER_SCAN_MS,
            registration_delay_ms: REGISTRATION_DELAY_MS,
        }
    }
}
