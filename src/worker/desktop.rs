use std::env::current_exe;
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use async_trait::async_trait;
use futures::channel::mpsc::UnboundedSender;
use log::{debug, info, warn};
use notify_rust::{Notification, Timeout};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::spawn_blocking;

use crate::error::WorkerError;
use crate::worker::types::{ClientWindows, NotificationOptions, NotificationSink, ShownNotification, WindowClient, WorkerEvent};

const APP_NAME: &str = "Blue Push";

/// Each watched notification occupies a blocking thread until it is clicked or dismissed.
pub const MAX_ACTION_WATCHERS: usize = 16;

/// Name freedesktop notification servers report when a notification is dismissed without a click.
#[cfg(all(unix, not(target_os = "macos")))]
const CLOSED_ACTION: &str = "__closed";

/**
 * Shows notifications on the desktop. On freedesktop systems the clicked action is sent back to
 * `clicks` as a `WorkerEvent::NotificationClick`.
 */
pub struct DesktopNotifications {
    clicks: Option<UnboundedSender<WorkerEvent>>,
    watchers: Arc<Semaphore>,
}

impl DesktopNotifications {
    pub fn new(clicks: Option<UnboundedSender<WorkerEvent>>) -> Self {
        DesktopNotifications {
            clicks,
            watchers: Arc::new(Semaphore::new(MAX_ACTION_WATCHERS)),
        }
    }

    // None once MAX_ACTION_WATCHERS notifications are being watched
    #[cfg_attr(not(all(unix, not(target_os = "macos"))), allow(dead_code))]
    fn watcher_permit(&self) -> Option<OwnedSemaphorePermit> {
        self.watchers.clone().try_acquire_owned().ok()
    }
}

fn build_notification(title: &str, options: &NotificationOptions) -> Notification {
    let mut notification = Notification::new();
    notification.appname(APP_NAME).summary(title);

    if let Some(body) = &options.body {
        notification.body(body);
    }

    if let Some(icon) = &options.icon {
        notification.icon(icon);
    }

    for action in &options.actions {
        notification.action(&action.action, &action.title);
    }

    if options.require_interaction {
        notification.timeout(Timeout::Never);
    }

    notification
}

#[cfg(all(unix, not(target_os = "macos")))]
fn watch_actions(handle: notify_rust::NotificationHandle, shown: ShownNotification, clicks: UnboundedSender<WorkerEvent>, permit: OwnedSemaphorePermit) {
    spawn_blocking(move || {
        let _permit = permit;
        handle.wait_for_action(move |action| {
            if action == CLOSED_ACTION {
                debug!("Notification {} dismissed", shown.options.tag);
                return;
            }

            let event = WorkerEvent::NotificationClick {
                action: action.to_string(),
                notification: shown,
            };

            if let Err(err) = clicks.unbounded_send(event) {
                warn!("Failed to deliver notification click: {}", err);
            }
        });
    });
}

#[async_trait]
impl NotificationSink for DesktopNotifications {
    async fn show_notification(&self, title: &str, options: &NotificationOptions) -> Result<(), WorkerError> {
        let notification = build_notification(title, options);
        if options.badge.is_some() {
            debug!("Notification badges are not supported on the desktop");
        }

        let handle = spawn_blocking(move || notification.show())
            .await
            .expect("Failed to join show notification task")?;

        #[cfg(all(unix, not(target_os = "macos")))]
        {
            if let Some(clicks) = &self.clicks {
                match self.watcher_permit() {
                    Some(permit) => {
                        let shown = ShownNotification {
                            title: title.to_string(),
                            options: options.clone(),
                        };
                        watch_actions(handle, shown, clicks.clone(), permit);
                    },
                    None => warn!("Too many open notifications, clicks on {} are not reported", options.tag),
                }
            }
        }

        #[cfg(not(all(unix, not(target_os = "macos"))))]
        {
            let _ = handle;
            if self.clicks.is_some() {
                debug!("Notification actions are not reported on this platform");
            }
        }

        Ok(())
    }

    async fn close_notification(&self, tag: &str) -> Result<(), WorkerError> {
        // the notification server already removed it when the action was invoked
        debug!("Notification {} closed", tag);
        Ok(())
    }
}

/**
 * The window of a running GUI, as seen by the push handler.
 */
#[derive(Clone)]
pub struct AppWindow {
    pub focused: Arc<AtomicBool>,
    pub focus_requests: UnboundedSender<()>,
}

pub const MAIN_CLIENT_ID: &str = "main";

pub struct DesktopClients {
    window: Option<AppWindow>,
}

impl DesktopClients {
    /// `window` is `None` when running without a GUI in this process.
    pub fn new(window: Option<AppWindow>) -> Self {
        DesktopClients { window }
    }
}

#[async_trait]
impl ClientWindows for DesktopClients {
    async fn match_all(&self) -> Result<Vec<WindowClient>, WorkerError> {
        Ok(self.window.iter()
            .filter(|window| !window.focus_requests.is_closed())
            .map(|window| WindowClient {
                id: MAIN_CLIENT_ID.to_string(),
                url: "/".to_string(),
                focused: window.focused.load(Ordering::Relaxed),
            })
            .collect())
    }

    async fn focus(&self, client: &WindowClient) -> Result<(), WorkerError> {
        let window = self.window.as_ref().ok_or(WorkerError::ClientGone)?;
        debug!("Focusing window {}", client.id);
        window.focus_requests.unbounded_send(()).map_err(|_| WorkerError::ClientGone)
    }

    async fn open_window(&self, url: &str) -> Result<(), WorkerError> {
        let exe = current_exe()?;
        info!("Opening {} in a new window", url);
        Command::new(exe).spawn()?;
        Ok(())
    }
}
