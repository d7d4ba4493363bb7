use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use log::{debug, error, info};

use crate::error::WorkerError;
use crate::worker::types::{
    ClientWindows, NotificationAction, NotificationData, NotificationOptions, NotificationSink, PushPayload,
    ShownNotification, WindowClient, WorkerEvent, OPEN_ACTION, OPEN_ACTION_TITLE, ROOT_URL, TAG_PREFIX, VIBRATE_PATTERN,
};

/**
 * Background handler for push messages and notification clicks.
 *
 * `handle()` only returns once all work for the event is done. Errors are logged, never returned:
 * a failing event must not take the handler down.
 */
pub struct PushWorker {
    notifications: Arc<dyn NotificationSink>,
    clients: Arc<dyn ClientWindows>,
    sequence: AtomicU64,
}

impl PushWorker {
    pub fn new(notifications: Arc<dyn NotificationSink>, clients: Arc<dyn ClientWindows>) -> Self {
        PushWorker {
            notifications,
            clients,
            sequence: AtomicU64::new(0),
        }
    }

    pub async fn handle(&self, event: WorkerEvent) {
        match event {
            WorkerEvent::Push { data: None } => {
                debug!("Push event without data, ignoring");
            },
            WorkerEvent::Push { data: Some(data) } => {
                if let Err(err) = self.handle_push(&data).await {
                    error!("Error processing push event: {}", err);
                }
            },
            WorkerEvent::NotificationClick { action, notification } => {
                info!("Notification clicked: {} ({})", notification.options.tag, action);
                if let Err(err) = self.handle_click(&action, &notification).await {
                    error!("Error handling notification click: {}", err);
                }
            },
        }
    }

    // millisecond timestamps alone collide when pushes arrive in a burst
    fn next_tag(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);

        format!("{}{}-{}", TAG_PREFIX, millis, sequence)
    }

    pub fn notification_for(&self, payload: PushPayload) -> ShownNotification {
        ShownNotification {
            title: payload.title,
            options: NotificationOptions {
                body: payload.body,
                icon: payload.icon,
                badge: payload.badge,
                data: NotificationData {
                    timestamp: payload.timestamp,
                },
                vibrate: VIBRATE_PATTERN.to_vec(),
                actions: vec![NotificationAction {
                    action: OPEN_ACTION.to_string(),
                    title: OPEN_ACTION_TITLE.to_string(),
                }],
                require_interaction: true,
                tag: self.next_tag(),
            },
        }
    }

    async fn handle_push(&self, data: &[u8]) -> Result<(), WorkerError> {
        let payload: PushPayload = serde_json::from_slice(data)?;
        info!("Push event received: {:?}", payload);

        let notification = self.notification_for(payload);

        match self.notifications.show_notification(&notification.title, &notification.options).await {
            Ok(()) => info!("Notification shown successfully"),
            Err(err) => error!("Error showing notification: {}", err),
        }

        Ok(())
    }

    async fn handle_click(&self, action: &str, notification: &ShownNotification) -> Result<(), WorkerError> {
        if let Err(err) = self.notifications.close_notification(&notification.options.tag).await {
            debug!("Failed to close notification {}: {}", notification.options.tag, err);
        }

        if action != OPEN_ACTION {
            return Ok(());
        }

        let clients = self.clients.match_all().await?;

        match pick_client(&clients) {
            Some(client) => {
                debug!("Focusing client {}", client.id);
                self.clients.focus(client).await
            },
            None => {
                debug!("No client open, opening {}", ROOT_URL);
                self.clients.open_window(ROOT_URL).await
            },
        }
    }
}

/// The last focused client if there is one, otherwise the first.
pub fn pick_client(clients: &[WindowClient]) -> Option<&WindowClient> {
    clients.iter()
        .rev()
        .find(|client| client.focused)
        .or_else(|| clients.first())
}
