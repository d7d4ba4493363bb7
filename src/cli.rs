use std::sync::Arc;
use std::time::Duration;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use futures::channel::mpsc::unbounded;
use log::info;

use crate::config::io::ConfigIO;
use crate::config::types::Config;
use crate::device::browser::DeviceBrowser;
use crate::device::btle::BtlePlatform;
use crate::device::console::{ConsoleChooser, MsgboxAlerts};
use crate::device::types::ScanOutcome;
use crate::error::AppRunError;
use crate::gui::application::run_application;
use crate::push::local::LocalPushPlatform;
use crate::push::registration::register_when_stable;
use crate::push::service::{BackendSettings, NotificationService};
use crate::worker::desktop::{DesktopClients, DesktopNotifications};
use crate::worker::handler::PushWorker;
use crate::worker::types::WorkerEvent;

#[derive(Parser, Debug)]
#[command(author, version)]
#[command(about = "Push notifications and bluetooth devices.\n\nWithout a command the window is opened.", long_about = None)]
pub struct Args {
    /// Notification backend to use instead of the one in the config file
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Open the window
    Gui,

    /// Pick a bluetooth device on the console and print its name
    Scan {
        /// Connect to the device after it has been picked, disconnect before exiting
        #[arg(long)]
        connect: bool,
    },

    /// Subscribe to push notifications at the backend
    Subscribe {
        /// Ask the backend to push a test notification after subscribing
        #[arg(long)]
        send_test: bool,
    },

    /// Dispatch a push message to the local handler, as if it came from the push service
    PushEvent {
        /// JSON payload, for example {"title": "Hello", "body": "World"}. Empty for a push without data.
        payload: String,

        /// Handle the first click on the notification before exiting (freedesktop only)
        #[arg(long)]
        wait_for_click: bool,
    },
}

async fn load_config(api_url: Option<String>) -> Result<Config, AppRunError> {
    let config_io = ConfigIO::new_sync()?;
    let mut config = config_io.read_or_init().await?;

    if let Some(api_url) = api_url {
        config.api_url = api_url;
    }

    Ok(config)
}

async fn scan(config: Config, connect: bool) -> Result<(), AppRunError> {
    let platform = Arc::new(BtlePlatform::new(
        Arc::new(ConsoleChooser),
        Duration::from_millis(config.chooser_scan_ms),
    ));
    let browser = DeviceBrowser::new(platform, Arc::new(MsgboxAlerts));

    let record = match browser.scan().await {
        ScanOutcome::Discovered(record) => record,
        outcome => {
            info!("No device picked: {:?}", outcome);
            return Ok(());
        },
    };

    println!("{} ({})", record.name, record.id);

    if connect {
        browser.connect(&record.id).await;

        let connected = browser.devices().iter().any(|d| d.id == record.id && d.connected);
        println!("{}", if connected { "Connected" } else { "Not connected" });
    }

    browser.teardown().await;
    Ok(())
}

async fn subscribe(config: Config, send_test: bool) -> Result<(), AppRunError> {
    let platform = Arc::new(LocalPushPlatform::new(&config.push_service_url));

    // nothing to wait for on the console
    let scope = register_when_stable(
        platform.as_ref(),
        std::future::ready(()),
        Duration::from_millis(config.registration_delay_ms),
    ).await?;
    info!("Service Worker registered with scope: {}", scope);

    let service = NotificationService::new(platform, BackendSettings::from(&config));
    service.check_service_worker().await;

    let response = service.subscribe().await?;
    if let Some(subscription) = service.current_subscription() {
        println!("Subscribed {}", subscription.endpoint);
    }
    println!("Server response: {}", response);

    if send_test {
        let response = service.send_test_notification().await?;
        println!("Test notification sent: {}", response);
    }

    Ok(())
}

async fn push_event(payload: String, wait_for_click: bool) -> Result<(), AppRunError> {
    let (clicks, mut click_receiver) = unbounded();
    let worker = PushWorker::new(
        Arc::new(DesktopNotifications::new(wait_for_click.then_some(clicks))),
        Arc::new(DesktopClients::new(None)),
    );

    let data = if payload.is_empty() { None } else { Some(payload.into_bytes()) };
    worker.handle(WorkerEvent::Push { data }).await;

    if wait_for_click {
        info!("Waiting for the notification to be clicked");
        if let Some(event) = click_receiver.next().await {
            worker.handle(event).await;
        }
    }

    Ok(())
}

pub fn run(args: Args) -> Result<(), AppRunError> {
    let command = args.command.unwrap_or(Commands::Gui);
    if command == Commands::Gui {
        return run_application(args.api_url);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        match command {
            Commands::Gui => Ok(()),
            Commands::Scan { connect } => scan(load_config(args.api_url).await?, connect).await,
            Commands::Subscribe { send_test } => subscribe(load_config(args.api_url).await?, send_test).await,
            Commands::PushEvent { payload, wait_for_click } => push_event(payload, wait_for_click).await,
        }
    })
}
