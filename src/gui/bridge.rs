use std::convert::Infallible;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender};
use futures::{SinkExt, StreamExt};
use iced::subscription::{self, Subscription};
use log::{debug, warn};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::device::platform::{Alerts, ChooserEntry, DeviceChooser};
use crate::gui::types::{ChooserPrompt, UiEvent};

/// Receiver handed to a subscription. The subscription takes it on its first run.
pub type ReceiverSlot<T> = Arc<Mutex<Option<UnboundedReceiver<T>>>>;

pub fn receiver_slot<T>(receiver: UnboundedReceiver<T>) -> ReceiverSlot<T> {
    Arc::new(Mutex::new(Some(receiver)))
}

/// Shows the chooser in the window and waits for the user.
pub struct GuiChooser {
    events: UnboundedSender<UiEvent>,
}

impl GuiChooser {
    pub fn new(events: UnboundedSender<UiEvent>) -> Self {
        GuiChooser { events }
    }
}

#[async_trait]
impl DeviceChooser for GuiChooser {
    async fn choose(&self, entries: Vec<ChooserEntry>) -> Option<String> {
        let (prompt, receiver) = ChooserPrompt::new(entries);

        if let Err(err) = self.events.unbounded_send(UiEvent::Choose(prompt)) {
            warn!("Failed to show device chooser: {}", err);
            return None;
        }

        // a dropped prompt (window closed) counts as cancel
        receiver.await.unwrap_or(None)
    }
}

/// Queues alerts as notices in the window.
pub struct ChannelAlerts {
    events: UnboundedSender<UiEvent>,
}

impl ChannelAlerts {
    pub fn new(events: UnboundedSender<UiEvent>) -> Self {
        ChannelAlerts { events }
    }
}

impl Alerts for ChannelAlerts {
    fn alert(&self, message: &str) {
        if let Err(err) = self.events.unbounded_send(UiEvent::Alert(message.to_string())) {
            warn!("Failed to show alert \"{}\": {}", message, err);
        }
    }
}

/**
 * Forwards everything sent to the receiver in `slot` to the application.
 */
pub fn forward_subscription<I, T>(id: I, cancel: CancellationToken, slot: ReceiverSlot<T>) -> Subscription<T>
where
    I: Hash + 'static,
    T: Send + 'static,
{
    subscription::channel(id, 64, move |mut output| async move {
        let receiver = slot.lock().expect("Failed to lock receiver slot").take();

        if let Some(mut receiver) = receiver {
            loop {
                let item = tokio::select! {
                    _ = cancel.cancelled() => break,
                    item = receiver.next() => item,
                };

                let Some(item) = item else { break };
                if output.send(item).await.is_err() {
                    break;
                }
            }
        }

        debug!("Forwarding subscription stopped");
        // note: subscription::channel expects the future to never resolve (Infallible)
        futures::future::pending::<Infallible>().await
    })
}

/**
 * Emits the current value of `receiver`, and again every time it changes.
 */
pub fn watch_subscription<I, T>(id: I, cancel: CancellationToken, mut receiver: watch::Receiver<T>) -> Subscription<T>
where
    I: Hash + 'static,
    T: Clone + Send + Sync + 'static,
{
    subscription::channel(id, 16, move |mut output| async move {
        loop {
            let value = receiver.borrow_and_update().clone();
            if output.send(value).await.is_err() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = receiver.changed() => {
                    if changed.is_err() {
                        break;
                    }
                },
            }
        }

        debug!("Watch subscription stopped");
        futures::future::pending::<Infallible>().await
    })
}
