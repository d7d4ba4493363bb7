use indexmap::IndexMap;
use log::error;

use crate::push::constants::{FALLBACK_SERVICE_WORKER_SCRIPT, SERVICE_WORKER_SCOPE};
use crate::push::platform::{PushPlatform, PushRegistration};
use crate::push::types::PushSubscription;

/**
 * Diagnostics shown to the user, in insertion order. Display only.
 */
pub type DebugInfo = IndexMap<String, String>;

pub const SUBSCRIBE_BUTTON: &str = "Subscribe to Notifications";
pub const UPDATE_SUBSCRIPTION_BUTTON: &str = "Update Notification Subscription";

#[derive(Debug, Clone, Default)]
pub struct PushAvailability {
    pub available: bool,
    pub subscribed: bool,
    pub error_message: Option<String>,
    pub debug: DebugInfo,
}

fn note(debug: &mut DebugInfo, key: &str, value: impl Into<String>) {
    debug.insert(key.to_string(), value.into());
}

fn note_subscription(availability: &mut PushAvailability, subscription: Option<PushSubscription>) {
    availability.subscribed = subscription.is_some();
    match subscription {
        Some(subscription) => {
            note(&mut availability.debug, "existingSubscription", "Found");
            note(&mut availability.debug, "subscriptionEndpoint", subscription.endpoint);
        },
        None => note(&mut availability.debug, "existingSubscription", "None"),
    }
}

async fn adopt_registration(availability: &mut PushAvailability, registration: &dyn PushRegistration) -> Result<(), String> {
    let subscription = registration.subscription().await.map_err(|err| err.to_string())?;
    note_subscription(availability, subscription);
    availability.available = true;
    Ok(())
}

/**
 * Works out whether push can be used. If no service worker is registered yet, the fallback worker
 * is registered right away so that the user can subscribe.
 */
pub async fn check_push_availability(platform: &dyn PushPlatform) -> PushAvailability {
    let mut availability = PushAvailability::default();
    note(&mut availability.debug, "serviceWorkerSupported", platform.service_worker_supported().to_string());
    note(&mut availability.debug, "pushManagerSupported", platform.push_manager_supported().to_string());
    note(&mut availability.debug, "platform", std::env::consts::OS);

    if !platform.service_worker_supported() {
        availability.error_message = Some("Service Worker is not supported on this system".to_string());
        return availability;
    }

    if !platform.push_manager_supported() {
        availability.error_message = Some("Push notifications are not supported on this system".to_string());
        return availability;
    }

    let registration = match platform.registration().await {
        Ok(registration) => registration,
        Err(err) => {
            error!("Error checking service worker registration: {}", err);
            availability.error_message = Some("Error checking service worker registration. Please restart the application.".to_string());
            note(&mut availability.debug, "error", err.to_string());
            return availability;
        },
    };

    note(&mut availability.debug, "registration", if registration.is_some() { "Found" } else { "Not found" });

    let result = match registration {
        Some(registration) => {
            note(&mut availability.debug, "registrationScope", registration.scope());
            adopt_registration(&mut availability, registration.as_ref()).await
        },
        None => {
            availability.error_message = Some("Service Worker is not registered. Please restart the application.".to_string());

            match platform.register(FALLBACK_SERVICE_WORKER_SCRIPT, SERVICE_WORKER_SCOPE).await {
                Ok(registration) => {
                    note(&mut availability.debug, "manualRegistration", "Successful");
                    note(&mut availability.debug, "manualRegistrationScope", registration.scope());
                    note(&mut availability.debug, "registeredServiceWorker", FALLBACK_SERVICE_WORKER_SCRIPT);
                    adopt_registration(&mut availability, registration.as_ref()).await
                },
                Err(err) => {
                    note(&mut availability.debug, "manualRegistrationError", err.to_string());
                    return availability;
                },
            }
        },
    };

    if let Err(err) = result {
        error!("Error checking service worker registration: {}", err);
        availability.error_message = Some("Error checking service worker registration. Please restart the application.".to_string());
        note(&mut availability.debug, "error", err);
    }

    availability
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionStatus {
    pub message: String,
    pub kind: StatusKind,
}

/**
 * What the push section of the window shows.
 */
#[derive(Debug, Clone, Default)]
pub struct PushPanel {
    pub available: bool,
    pub subscribed: bool,
    pub error_message: Option<String>,
    pub status: Option<SubscriptionStatus>,
    pub debug: DebugInfo,
}

impl PushPanel {
    pub fn apply_availability(&mut self, availability: PushAvailability) {
        self.available = availability.available;
        self.subscribed = availability.subscribed;
        self.error_message = availability.error_message;
        self.debug = availability.debug;
    }

    pub fn button_text(&self) -> &'static str {
        if self.subscribed { UPDATE_SUBSCRIPTION_BUTTON } else { SUBSCRIBE_BUTTON }
    }

    pub fn subscribe_finished(&mut self, result: Result<(), String>) {
        self.status = Some(match result {
            Ok(()) => {
                self.subscribed = true;
                SubscriptionStatus {
                    message: "Successfully subscribed to notifications!".to_string(),
                    kind: StatusKind::Success,
                }
            },
            Err(err) => SubscriptionStatus {
                message: format!("Failed to subscribe to notifications. {}", err),
                kind: StatusKind::Error,
            },
        });
    }

    pub fn send_finished(&mut self, result: Result<(), String>) {
        self.status = Some(match result {
            Ok(()) => SubscriptionStatus {
                message: "Test notification sent successfully!".to_string(),
                kind: StatusKind::Success,
            },
            Err(err) => SubscriptionStatus {
                message: format!("Failed to send test notification. {}", err),
                kind: StatusKind::Error,
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::constants::{PUSH_SERVICE_URL, SERVICE_WORKER_SCRIPT, VAPID_PUBLIC_KEY};
    use crate::push::local::LocalPushPlatform;

    #[tokio::test]
    async fn missing_registration_registers_the_fallback_worker() {
        let platform = LocalPushPlatform::new(PUSH_SERVICE_URL);

        let availability = check_push_availability(&platform).await;

        assert!(availability.available);
        assert!(!availability.subscribed);
        assert_eq!(availability.debug["registration"], "Not found");
        assert_eq!(availability.debug["manualRegistration"], "Successful");
        assert_eq!(availability.debug["registeredServiceWorker"], FALLBACK_SERVICE_WORKER_SCRIPT);
        assert_eq!(availability.debug["existingSubscription"], "None");
        assert!(availability.error_message.is_some());
        assert!(platform.registration().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn existing_subscription_is_reported() {
        let platform = LocalPushPlatform::new(PUSH_SERVICE_URL);
        let registration = platform.register(SERVICE_WORKER_SCRIPT, SERVICE_WORKER_SCOPE).await.unwrap();
        let subscription = registration.subscribe(VAPID_PUBLIC_KEY).await.unwrap();

        let availability = check_push_availability(&platform).await;

        assert!(availability.available);
        assert!(availability.subscribed);
        assert!(availability.error_message.is_none());
        assert_eq!(availability.debug["registrationScope"], "/");
        assert_eq!(availability.debug["subscriptionEndpoint"], subscription.endpoint);
    }

    #[tokio::test]
    async fn unsupported_push_manager_is_explained() {
        let platform = LocalPushPlatform::new(PUSH_SERVICE_URL).with_support(true, false);

        let availability = check_push_availability(&platform).await;

        assert!(!availability.available);
        assert_eq!(availability.error_message.as_deref(), Some("Push notifications are not supported on this system"));
        assert_eq!(availability.debug["pushManagerSupported"], "false");
    }

    #[test]
    fn panel_text_follows_subscription() {
        let mut panel = PushPanel::default();
        assert_eq!(panel.button_text(), SUBSCRIBE_BUTTON);

        panel.subscribe_finished(Err("Service Worker not registered".to_string()));
        assert_eq!(panel.button_text(), SUBSCRIBE_BUTTON);
        assert_eq!(panel.status.as_ref().unwrap().kind, StatusKind::Error);
        assert_eq!(panel.status.as_ref().unwrap().message, "Failed to subscribe to notifications. Service Worker not registered");

        panel.subscribe_finished(Ok(()));
        assert_eq!(panel.button_text(), UPDATE_SUBSCRIPTION_BUTTON);
        assert_eq!(panel.status.as_ref().unwrap().kind, StatusKind::Success);

        panel.send_finished(Ok(()));
        assert_eq!(panel.status.as_ref().unwrap().message, "Test notification sent successfully!");
    }
}
