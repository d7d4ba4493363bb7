use std::io;
use thiserror::Error;
use msgbox::IconType;
use std::fmt::Display;
use std::str::Utf8Error;
use btleplug;
use iced;
use serde_json;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to acquire file lock on config file: {source}")]
    CanNotLock { source: io::Error },

    #[error("Failed to encode/decode config as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read/write config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse/build config file: {source}")]
    JsonError { #[from] source: serde_json::Error },
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start application (iced): {source}")]
    Iced { #[from] source: iced::Error },

    #[error("Failed to start application (config): {source}")]
    ConfigError { #[from] source: ConfigError },

    #[error("Failed to start application (runtime): {source}")]
    Runtime { #[from] source: io::Error },

    #[error("{source}")]
    Push { #[from] source: PushError },

    #[error("{source}")]
    Worker { #[from] source: WorkerError },
}

#[derive(Error, Debug, Clone)]
pub enum DeviceError {
    #[error("Error communicating with device (btleplug): {0}")]
    Btle(String),

    /// The chooser was cancelled or closed without a selection.
    #[error("User cancelled the device chooser")]
    NotFound,

    #[error("Bluetooth is not supported on this system")]
    Unsupported,

    #[error("GATT server not available")]
    NoGattServer,

    #[error("GATT server is not connected")]
    NotConnected,

    #[error("Service {0} was not listed in the optional services of the device request")]
    ServiceNotAllowed(Uuid),

    #[error("Service {0} not found on device")]
    MissingService(Uuid),

    #[error("Characteristic {0} not found on device")]
    MissingCharacteristic(Uuid),
}

// btleplug::Error is not Clone; device errors are cloned into UI messages.
impl From<btleplug::Error> for DeviceError {
    fn from(source: btleplug::Error) -> Self {
        DeviceError::Btle(source.to_string())
    }
}

impl DeviceError {
    /// The only error the platform uses to report that the user dismissed the chooser.
    pub fn is_user_cancellation(&self) -> bool {
        matches!(self, DeviceError::NotFound)
    }
}

#[derive(Error, Debug)]
pub enum PushError {
    #[error("Push notifications are only available in an environment with service worker and push support")]
    EnvironmentUnsupported,

    #[error("Service Worker not registered")]
    NotRegistered,

    #[error("No active push subscription found. Please subscribe first.")]
    NotSubscribed,

    #[error("Invalid application server key: {0}")]
    InvalidApplicationServerKey(String),

    #[error("Failed to register service worker {script}: {reason}")]
    Registration { script: String, reason: String },

    #[error("Request to the notification backend failed: {source}")]
    Http { #[from] source: reqwest::Error },

    #[error("Failed to encode/decode JSON: {source}")]
    Json { #[from] source: serde_json::Error },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to parse push payload: {source}")]
    Payload { #[from] source: serde_json::Error },

    #[error("Failed to show notification: {source}")]
    Notify { #[from] source: notify_rust::error::Error },

    #[error("Failed to open client window: {source}")]
    OpenWindow { #[from] source: io::Error },

    #[error("The client window is gone")]
    ClientGone,
}

pub fn error_msgbox<T: Display>(message: &'static str, error: &T) {
    let message = format!("{}: {}", message, error);
    eprintln!("{}", &message);
    alert_msgbox(&message);
}

pub fn alert_msgbox(message: &str) {
    if let Err(err) = msgbox::create(concat!("Blue Push ", env!("CARGO_PKG_VERSION")), message, IconType::Error) {
        eprintln!("Failed to create msgbox: {:?}", err);
    }
}
