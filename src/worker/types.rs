use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WorkerError;

pub const OPEN_ACTION: &str = "open";
pub const OPEN_ACTION_TITLE: &str = "Open App";
pub const VIBRATE_PATTERN: [u32; 3] = [100, 50, 100];
pub const TAG_PREFIX: &str = "push-notification-";

/**
 * Where a click on the "open" action leads when no window is open.
 */
pub const ROOT_URL: &str = "/";

/**
 * JSON body of a push message, as sent by the backend.
 */
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PushPayload {
    #[serde(default)]
    pub title: String,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub timestamp: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    pub timestamp: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOptions {
    pub body: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub data: NotificationData,
    pub vibrate: Vec<u32>,
    pub actions: Vec<NotificationAction>,
    pub require_interaction: bool,
    /// Unique per push event, so rapid notifications do not replace each other.
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShownNotification {
    pub title: String,
    pub options: NotificationOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Push {
        data: Option<Vec<u8>>,
    },
    NotificationClick {
        /// Empty if the notification itself was clicked.
        action: String,
        notification: ShownNotification,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowClient {
    pub id: String,
    pub url: String,
    pub focused: bool,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn show_notification(&self, title: &str, options: &NotificationOptions) -> Result<(), WorkerError>;

    async fn close_notification(&self, tag: &str) -> Result<(), WorkerError>;
}

#[async_trait]
pub trait ClientWindows: Send + Sync {
    /// Open windows of the application.
    async fn match_all(&self) -> Result<Vec<WindowClient>, WorkerError>;

    async fn focus(&self, client: &WindowClient) -> Result<(), WorkerError>;

    async fn open_window(&self, url: &str) -> Result<(), WorkerError>;
}
