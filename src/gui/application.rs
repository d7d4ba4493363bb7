use std::any::TypeId;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use futures::channel::mpsc::{unbounded, UnboundedSender};
use iced::{Alignment, Application, Command, Element, Length, Settings, Size, Subscription, window};
use iced::event::{self, Event};
use iced::theme::{self, Theme};
use iced::widget::{
    Column, button, column, container, horizontal_rule, row, scrollable, text,
};
use log::{debug, error, info};
use serde_json::json;
use tokio_util::sync::{CancellationToken};

use crate::config::io::{ConfigIO};
use crate::config::types::Config;
use crate::device::browser::DeviceBrowser;
use crate::device::btle::BtlePlatform;
use crate::device::platform::BluetoothPlatform;
use crate::device::types::{DeviceList, DeviceRecord, ScanOutcome};
use crate::error::AppRunError;
use crate::gui::bridge::{forward_subscription, receiver_slot, watch_subscription, ChannelAlerts, GuiChooser, ReceiverSlot};
use crate::gui::style::{ChooserEntryStyleSheet, ERROR_COLOR, MUTED_COLOR, SUCCESS_COLOR};
use crate::gui::types::{ChooserPrompt, Message, UiEvent};
use crate::push::local::LocalPushPlatform;
use crate::push::registration::register_when_stable;
use crate::push::service::{BackendSettings, NotificationService};
use crate::push::status::{check_push_availability, PushPanel, StatusKind};
use crate::worker::desktop::{AppWindow, DesktopClients, DesktopNotifications};
use crate::worker::handler::PushWorker;
use crate::worker::types::WorkerEvent;

pub struct ApplicationFlags {
    config_io: ConfigIO,
    api_url: Option<String>,
}

// everything that needs the config, created once it has been loaded
#[derive(Clone)]
struct Services {
    bluetooth: Arc<BtlePlatform>,
    push_platform: Arc<LocalPushPlatform>,
    notifications: Arc<NotificationService>,
    browser: Arc<DeviceBrowser>,
    worker: Arc<PushWorker>,
}

pub struct MyApplication {
    // this token is cancelled upon exit
    app_cancel: CancellationToken,

    // messages that the user must click away
    notices: Vec<String>,

    config_io: ConfigIO,
    api_url_override: Option<String>,
    config: Config,
    services: Option<Services>,

    ui_sender: UnboundedSender<UiEvent>,
    ui_events: ReceiverSlot<UiEvent>,
    click_sender: UnboundedSender<WorkerEvent>,
    clicks: ReceiverSlot<WorkerEvent>,
    focus_sender: UnboundedSender<()>,
    focus_requests: ReceiverSlot<()>,
    window_focused: Arc<AtomicBool>,

    push_panel: PushPanel,
    push_busy: bool,

    devices: DeviceList,
    scanning: bool,
    chooser: Option<ChooserPrompt>,
}

impl MyApplication {
    fn before_close(&mut self) {
        self.app_cancel.cancel();

        if let Some(prompt) = self.chooser.take() {
            prompt.answer(None);
        }
    }

    fn load_config(&self) -> Command<Message> {
        let config_io = self.config_io.clone();

        let fut = async move {
            match config_io.read_or_init().await {
                Ok(config) => (config, None),
                Err(err) => {
                    error!("Failed to load config: {:?}", &err);
                    (Config::default(), Some(format!("Failed to load config: {}", &err)))
                },
            }
        };

        Command::perform(fut, Message::ConfigLoadComplete)
    }

    fn build_services(&self) -> Services {
        let config = &self.config;

        let bluetooth = Arc::new(BtlePlatform::new(
            Arc::new(GuiChooser::new(self.ui_sender.clone())),
            Duration::from_millis(config.chooser_scan_ms),
        ));
        let browser = Arc::new(DeviceBrowser::new(
            bluetooth.clone(),
            Arc::new(ChannelAlerts::new(self.ui_sender.clone())),
        ));

        let push_platform = Arc::new(LocalPushPlatform::new(&config.push_service_url));
        let notifications = Arc::new(NotificationService::new(
            push_platform.clone(),
            BackendSettings::from(config),
        ));

        let window = AppWindow {
            focused: self.window_focused.clone(),
            focus_requests: self.focus_sender.clone(),
        };
        let worker = Arc::new(PushWorker::new(
            Arc::new(DesktopNotifications::new(Some(self.click_sender.clone()))),
            Arc::new(DesktopClients::new(Some(window))),
        ));

        Services { bluetooth, push_platform, notifications, browser, worker }
    }

    fn register_service_worker(&self, services: &Services) -> Command<Message> {
        let platform = services.push_platform.clone();
        let bluetooth = services.bluetooth.clone();
        let delay = Duration::from_millis(self.config.registration_delay_ms);

        let fut = async move {
            // stable once the bluetooth stack has settled, which can take long while the OS asks
            // for permission
            let stable = async {
                bluetooth.is_available().await;
            };

            register_when_stable(platform.as_ref(), stable, delay).await
                .map_err(|err| err.to_string())
        };

        Command::perform(fut, Message::Registered)
    }

    fn check_push(&self, services: &Services) -> Command<Message> {
        let platform = services.push_platform.clone();
        let notifications = services.notifications.clone();

        Command::batch(vec![
            Command::perform(
                async move { check_push_availability(platform.as_ref()).await },
                Message::AvailabilityChecked,
            ),
            Command::perform(
                async move { notifications.check_service_worker().await },
                Message::ServiceWorkerChecked,
            ),
        ])
    }

    fn subscribe(&mut self) -> Command<Message> {
        let Some(services) = &self.services else { return Command::none() };
        if self.push_busy {
            return Command::none();
        }

        let notifications = services.notifications.clone();
        self.push_busy = true;

        let fut = async move {
            notifications.subscribe().await
                .map(|_| ())
                .map_err(|err| err.to_string())
        };

        Command::perform(fut, Message::SubscribeComplete)
    }

    fn send_test_notification(&mut self) -> Command<Message> {
        let Some(services) = &self.services else { return Command::none() };
        if self.push_busy {
            return Command::none();
        }

        let notifications = services.notifications.clone();
        self.push_busy = true;

        let fut = async move {
            notifications.send_test_notification().await
                .map(|_| ())
                .map_err(|err| err.to_string())
        };

        Command::perform(fut, Message::SendTestNotificationComplete)
    }

    fn dispatch_worker_event(&self, event: WorkerEvent) -> Command<Message> {
        let Some(services) = &self.services else { return Command::none() };
        let worker = services.worker.clone();

        Command::perform(async move { worker.handle(event).await }, Message::WorkerComplete)
    }

    fn scan(&self) -> Command<Message> {
        let Some(services) = &self.services else { return Command::none() };
        if self.scanning {
            return Command::none();
        }

        let browser = services.browser.clone();
        Command::perform(async move { browser.scan().await }, Message::ScanComplete)
    }

    fn toggle_connection(&self, id: String) -> Command<Message> {
        let Some(services) = &self.services else { return Command::none() };
        let browser = services.browser.clone();

        Command::perform(async move { browser.connect(&id).await }, Message::ConnectionComplete)
    }

    fn close(&mut self, id: window::Id) -> Command<Message> {
        self.before_close();

        match &self.services {
            Some(services) => {
                let browser = services.browser.clone();
                Command::perform(async move { browser.teardown().await }, move |_| Message::TeardownComplete(id))
            },
            None => window::close(id),
        }
    }
}

fn simulated_push() -> WorkerEvent {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let payload = json!({
        "title": "Test Notification",
        "body": "This notification was dispatched locally",
        "timestamp": timestamp,
    });

    WorkerEvent::Push { data: Some(payload.to_string().into_bytes()) }
}

impl Application for MyApplication {
    type Executor = iced::executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = ApplicationFlags;

    fn new(flags: ApplicationFlags) -> (MyApplication, Command<Self::Message>) {
        let (ui_sender, ui_receiver) = unbounded();
        let (click_sender, click_receiver) = unbounded();
        let (focus_sender, focus_receiver) = unbounded();

        let app = MyApplication {
            app_cancel: CancellationToken::new(),
            notices: Vec::new(),
            config_io: flags.config_io,
            api_url_override: flags.api_url,
            config: Config::default(),
            services: None,
            ui_sender,
            ui_events: receiver_slot(ui_receiver),
            click_sender,
            clicks: receiver_slot(click_receiver),
            focus_sender,
            focus_requests: receiver_slot(focus_receiver),
            window_focused: Arc::new(AtomicBool::new(true)),
            push_panel: PushPanel::default(),
            push_busy: false,
            devices: Arc::new(Vec::new()),
            scanning: false,
            chooser: None,
        };

        let command = app.load_config();
        (app, command)
    }

    fn title(&self) -> String {
        String::from(concat!("Blue Push ", env!("CARGO_PKG_VERSION")))
    }

    fn update(&mut self, message: Message) -> Command<Self::Message> {
        match message {
            Message::ConfigLoadComplete((config, error_message)) => {
                info!("Config load complete");
                self.config = config;
                if let Some(api_url) = self.api_url_override.take() {
                    info!("Using backend {} from the command line", api_url);
                    self.config.api_url = api_url;
                }
                if let Some(error_message) = error_message {
                    self.notices.push(error_message);
                }

                let services = self.build_services();
                let command = self.register_service_worker(&services);
                self.services = Some(services);
                return command;
            },
            Message::NoticeConfirmed => {
                if !self.notices.is_empty() {
                    self.notices.remove(0);
                }
            },
            Message::EventOccurred(Event::Window(id, window::Event::CloseRequested)) => {
                info!("Close requested");
                return self.close(id);
            },
            Message::EventOccurred(Event::Window(_, window::Event::Focused)) => {
                self.window_focused.store(true, Ordering::Relaxed);
            },
            Message::EventOccurred(Event::Window(_, window::Event::Unfocused)) => {
                self.window_focused.store(false, Ordering::Relaxed);
            },
            Message::TeardownComplete(id) => {
                info!("Devices disconnected, closing");
                return window::close(id);
            },
            Message::Ui(UiEvent::Alert(message)) => {
                self.notices.push(message);
            },
            Message::Ui(UiEvent::Choose(prompt)) => {
                if let Some(previous) = self.chooser.replace(prompt) {
                    previous.answer(None);
                }
            },

            Message::Registered(result) => {
                match result {
                    Ok(scope) => info!("Service Worker registered with scope: {}", scope),
                    Err(err) => error!("Service Worker registration failed: {}", err),
                }

                if let Some(services) = &self.services {
                    return self.check_push(services);
                }
            },
            Message::AvailabilityChecked(availability) => {
                self.push_panel.apply_availability(availability);
            },
            Message::Subscribe => {
                return self.subscribe();
            },
            Message::SubscribeComplete(result) => {
                self.push_busy = false;
                self.push_panel.subscribe_finished(result);
            },
            Message::SendTestNotification => {
                return self.send_test_notification();
            },
            Message::SendTestNotificationComplete(result) => {
                self.push_busy = false;
                self.push_panel.send_finished(result);
            },
            Message::SimulatePush => {
                return self.dispatch_worker_event(simulated_push());
            },
            Message::Worker(event) => {
                return self.dispatch_worker_event(event);
            },
            Message::FocusRequested(()) => {
                return window::gain_focus(window::Id::MAIN);
            },

            Message::Scan => {
                return self.scan();
            },
            Message::ScanComplete(outcome) => {
                if let ScanOutcome::Discovered(record) = outcome {
                    debug!("Scan complete: {} ({})", record.name, record.id);
                }
            },
            Message::ScanningChanged(scanning) => {
                self.scanning = scanning;
            },
            Message::DevicesChanged(devices) => {
                if !Arc::ptr_eq(&self.devices, &devices) {
                    self.devices = devices;
                }
            },
            Message::ChooserPick(choice) => {
                if let Some(prompt) = self.chooser.take() {
                    prompt.answer(choice);
                }
            },
            Message::ToggleConnection(id) => {
                return self.toggle_connection(id);
            },

            _ => {}
        }

        Command::none()
    }

    fn subscription(&self) -> Subscription<Message> {
        struct UiEvents;
        struct Clicks;
        struct FocusRequests;
        struct Devices;
        struct Scanning;

        let mut subscriptions = vec![
            event::listen().map(Message::EventOccurred),
            forward_subscription(TypeId::of::<UiEvents>(), self.app_cancel.clone(), self.ui_events.clone())
                .map(Message::Ui),
            forward_subscription(TypeId::of::<Clicks>(), self.app_cancel.clone(), self.clicks.clone())
                .map(Message::Worker),
            forward_subscription(TypeId::of::<FocusRequests>(), self.app_cancel.clone(), self.focus_requests.clone())
                .map(Message::FocusRequested),
        ];

        if let Some(services) = &self.services {
            subscriptions.push(
                watch_subscription(TypeId::of::<Devices>(), self.app_cancel.clone(), services.browser.subscribe_devices())
                    .map(Message::DevicesChanged),
            );
            subscriptions.push(
                watch_subscription(TypeId::of::<Scanning>(), self.app_cancel.clone(), services.browser.subscribe_scanning())
                    .map(Message::ScanningChanged),
            );
        }

        Subscription::batch(subscriptions)
    }

    fn view(&self) -> Element<Message> {
        if let Some(notice) = self.notices.first() {
            return container(
                column![
                    text(notice),

                    button(text("Okay"))
                        .on_press(Message::NoticeConfirmed),

                ].align_items(Alignment::Center).spacing(20),
            )
            .width(Length::Fill)
            .padding(20)
            .into()
        }

        if let Some(prompt) = &self.chooser {
            return self.view_chooser(prompt);
        }

        container(
            scrollable(
                column![
                    self.view_push_panel(),
                    horizontal_rule(10),
                    self.view_devices(),
                ]
                    .spacing(20)
                    .width(Length::Fill),
            ),
        )
        .width(Length::Fill)
        .height(Length::Fill)
        .padding(20)
        .into()
    }
}

impl MyApplication {
    fn view_push_panel(&self) -> Element<Message> {
        let panel = &self.push_panel;
        let mut content = Column::new()
            .spacing(10)
            .push(text("Push Notifications").size(24));

        if panel.available {
            let mut subscribe = button(text(panel.button_text()));
            let mut send = button(text("Send Test Notification"))
                .style(theme::Button::Secondary);

            if !self.push_busy {
                subscribe = subscribe.on_press(Message::Subscribe);
                send = send.on_press(Message::SendTestNotification);
            }

            content = content.push(row![subscribe, send].spacing(10));
        } else {
            let message = match (&panel.error_message, self.services.is_some()) {
                (Some(message), _) => message.as_str(),
                (None, true) => "Checking push notification support…",
                (None, false) => "Loading…",
            };
            content = content.push(text(message));
        }

        if let Some(status) = &panel.status {
            let color = match status.kind {
                StatusKind::Success => SUCCESS_COLOR,
                StatusKind::Error => ERROR_COLOR,
            };
            content = content.push(text(&status.message).style(color));
        }

        if !panel.debug.is_empty() {
            content = content.push(
                Column::with_children(
                    panel.debug
                        .iter()
                        .map(|(key, value)| text(format!("{}: {}", key, value)).size(12).style(MUTED_COLOR))
                        .map(Element::from)
                ).spacing(2),
            );

            content = content.push(
                button(text("Simulate Push").size(14))
                    .style(theme::Button::Secondary)
                    .on_press(Message::SimulatePush),
            );
        }

        content.into()
    }

    fn view_devices(&self) -> Element<Message> {
        let mut scan = button(text(if self.scanning { "Scanning…" } else { "Scan for Devices" }))
            .style(theme::Button::Primary);
        if self.services.is_some() && !self.scanning {
            scan = scan.on_press(Message::Scan);
        }

        let device_row = |record: &DeviceRecord| -> Element<Message> {
            let (label, style) = if record.connecting {
                ("Connecting…", theme::Button::Secondary)
            } else if record.connected {
                ("Disconnect", theme::Button::Destructive)
            } else {
                ("Connect", theme::Button::Positive)
            };

            let mut toggle = button(text(label)).style(style);
            if !record.connecting {
                toggle = toggle.on_press(Message::ToggleConnection(record.id.clone()));
            }

            row![
                column![
                    text(&record.name),
                    text(&record.id).size(12).style(MUTED_COLOR),
                ].width(Length::Fill),
                toggle,
            ]
            .align_items(Alignment::Center)
            .spacing(20)
            .into()
        };

        let list: Element<Message> = if self.devices.is_empty() {
            text("No devices yet").style(MUTED_COLOR).into()
        } else {
            Column::with_children(
                self.devices
                    .iter()
                    .map(device_row)
            )
            .spacing(10)
            .into()
        };

        column![
            text("Bluetooth Devices").size(24),
            scan,
            list,
        ]
        .spacing(10)
        .into()
    }

    fn view_chooser(&self, prompt: &ChooserPrompt) -> Element<Message> {
        let entries: Element<Message> = if prompt.entries.is_empty() {
            text("No devices found").into()
        } else {
            Column::with_children(
                prompt.entries
                    .iter()
                    .map(|entry| {
                        button(text(entry.label()))
                            .width(Length::Fill)
                            .style(theme::Button::Custom(Box::new(ChooserEntryStyleSheet)))
                            .on_press(Message::ChooserPick(Some(entry.id.clone())))
                    })
                    .map(Element::from)
            )
            .spacing(5)
            .into()
        };

        container(
            column![
                text("Pair with a device").size(24),
                scrollable(entries).height(Length::Fill),
                button(text("Cancel"))
                    .style(theme::Button::Secondary)
                    .on_press(Message::ChooserPick(None)),
            ]
            .spacing(20),
        )
        .width(Length::Fill)
        .padding(20)
        .into()
    }
}

pub fn run_application(api_url: Option<String>) -> Result<(), AppRunError> {
    let mut config_io = ConfigIO::new_sync()?;
    let mut config_locker = config_io.locker()?;
    let _lock_guard = config_locker.lock()?;

    let flags = ApplicationFlags { config_io, api_url };
    let mut settings = Settings::with_flags(flags);

    // handle exits ourselves (Event::CloseRequested)
    settings.id = Some("blue-push".to_string());
    settings.window.exit_on_close_request = false;
    settings.window.size = Size::new(600.0, 700.0);

    // this function will call process::exit() unless there was a startup error
    MyApplication::run(settings)?;
    Ok(())
}
