use std::sync::{Arc, Mutex};
use futures::channel::oneshot;
use iced::{Event, window};

use crate::config::types::Config;
use crate::device::platform::ChooserEntry;
use crate::device::types::{DeviceList, ScanOutcome};
use crate::push::status::PushAvailability;
use crate::worker::types::WorkerEvent;

/**
 * A pending device choice. The background scan waits on `reply` until the user picks an entry or
 * the prompt is dropped.
 */
#[derive(Debug, Clone)]
pub struct ChooserPrompt {
    pub entries: Vec<ChooserEntry>,
    pub reply: Arc<Mutex<Option<oneshot::Sender<Option<String>>>>>,
}

impl ChooserPrompt {
    pub fn new(entries: Vec<ChooserEntry>) -> (Self, oneshot::Receiver<Option<String>>) {
        let (sender, receiver) = oneshot::channel();
        let prompt = ChooserPrompt {
            entries,
            reply: Arc::new(Mutex::new(Some(sender))),
        };
        (prompt, receiver)
    }

    // only the first answer counts
    pub fn answer(&self, choice: Option<String>) {
        let sender = self.reply.lock().expect("Failed to lock chooser reply").take();
        if let Some(sender) = sender {
            // the scan may already be gone
            let _ = sender.send(choice);
        }
    }
}

/// Requests from background tasks that need the window.
#[derive(Debug, Clone)]
pub enum UiEvent {
    Alert(String),
    Choose(ChooserPrompt),
}

#[derive(Debug, Clone)]
pub enum Message {
    EventOccurred(Event),
    ConfigLoadComplete((Config, Option<String>)), // error message if the config could not be loaded
    NoticeConfirmed,
    Ui(UiEvent),

    Registered(Result<String, String>),
    AvailabilityChecked(PushAvailability),
    ServiceWorkerChecked(()),
    Subscribe,
    SubscribeComplete(Result<(), String>),
    SendTestNotification,
    SendTestNotificationComplete(Result<(), String>),
    SimulatePush,
    Worker(WorkerEvent),
    WorkerComplete(()),
    FocusRequested(()),

    Scan,
    ScanComplete(ScanOutcome),
    ScanningChanged(bool),
    DevicesChanged(DeviceList),
    ChooserPick(Option<String>),
    ToggleConnection(String),
    ConnectionComplete(()),
    TeardownComplete(window::Id),
}
