use std::sync::{Arc, Mutex};
use std::time::Duration;
use log::{debug, error, info, warn};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

use crate::config::types::Config;
use crate::error::PushError;
use crate::push::constants::{SEND_PATH, SUBSCRIBE_PATH};
use crate::push::platform::PushPlatform;
use crate::push::types::PushSubscription;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub api_url: String,
    pub vapid_public_key: String,
    /// Per attempt.
    pub timeout: Duration,
    pub retries: u32,
}

impl From<&Config> for BackendSettings {
    fn from(config: &Config) -> Self {
        BackendSettings {
            api_url: config.api_url.clone(),
            vapid_public_key: config.vapid_public_key.clone(),
            timeout: Duration::from_millis(config.request_timeout_ms),
            retries: config.request_retries,
        }
    }
}

/**
 * Requests push subscriptions from the platform and hands them to the notification backend.
 *
 * The current subscription is only kept in memory.
 */
pub struct NotificationService {
    platform: Arc<dyn PushPlatform>,
    http: reqwest::Client,
    settings: BackendSettings,
    current_subscription: Mutex<Option<PushSubscription>>,
}

impl NotificationService {
    pub fn new(platform: Arc<dyn PushPlatform>, settings: BackendSettings) -> Self {
        NotificationService {
            platform,
            http: reqwest::Client::new(),
            settings,
            current_subscription: Mutex::new(None),
        }
    }

    pub fn current_subscription(&self) -> Option<PushSubscription> {
        self.current_subscription.lock().expect("Failed to lock current subscription").clone()
    }

    fn set_current_subscription(&self, subscription: PushSubscription) {
        *self.current_subscription.lock().expect("Failed to lock current subscription") = Some(subscription);
    }

    /**
     * Adopts a subscription that already exists on the platform. Failures are only logged.
     */
    pub async fn check_service_worker(&self) {
        if !self.platform.service_worker_supported() {
            info!("Service Workers not supported");
            return;
        }

        let registration = match self.platform.registration().await {
            Ok(Some(registration)) => registration,
            Ok(None) => {
                info!("No Service Worker registration found");
                return;
            },
            Err(err) => {
                error!("Service Worker check error: {}", err);
                return;
            },
        };

        info!(
            "Service Worker registration {} ({}), state: {}",
            registration.scope(),
            registration.script(),
            if registration.is_active() { "active" } else { "inactive" },
        );

        match registration.subscription().await {
            Ok(Some(subscription)) => {
                info!("Existing push subscription: {}", subscription.endpoint);
                self.set_current_subscription(subscription);
            },
            Ok(None) => info!("No existing push subscription"),
            Err(err) => error!("Service Worker check error: {}", err),
        }
    }

    pub async fn subscribe(&self) -> Result<Value, PushError> {
        if !self.platform.service_worker_supported() || !self.platform.push_manager_supported() {
            return Err(PushError::EnvironmentUnsupported);
        }

        let registration = self.platform.registration().await?
            .ok_or(PushError::NotRegistered)?;

        if registration.unsubscribe().await? {
            info!("Removed previous push subscription");
        }

        let subscription = registration.subscribe(&self.settings.vapid_public_key).await?;
        info!("New Push Subscription: {}", subscription.endpoint);
        self.set_current_subscription(subscription.clone());

        let response = self.post_subscription(SUBSCRIBE_PATH, &subscription).await
            .map_err(|err| {
                error!("Error subscribing to notifications: {}", err);
                err
            })?;

        info!("Server response: {}", response);
        Ok(response)
    }

    pub async fn send_test_notification(&self) -> Result<Value, PushError> {
        let subscription = self.current_subscription().ok_or(PushError::NotSubscribed)?;

        let response = self.post_subscription(SEND_PATH, &subscription).await
            .map_err(|err| {
                error!("Error sending test notification: {}", err);
                err
            })?;

        info!("Test notification sent: {}", response);
        Ok(response)
    }

    fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{}", self.settings.api_url.trim_end_matches('/'), path)
    }

    async fn post_subscription(&self, path: &str, subscription: &PushSubscription) -> Result<Value, PushError> {
        let url = self.endpoint_url(path);
        let mut attempt: u32 = 0;

        loop {
            match self.post_once(&url, subscription).await {
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.settings.retries => {
                    attempt += 1;
                    warn!("POST {} failed ({}), retry {}/{}", url, err, attempt, self.settings.retries);
                },
                Err(err) => return Err(err),
            }
        }
    }

    async fn post_once(&self, url: &str, subscription: &PushSubscription) -> Result<Value, PushError> {
        debug!("POST {}", url);

        let response = self.http.post(url)
            .header(CONTENT_TYPE, "application/json")
            .json(subscription)
            .timeout(self.settings.timeout)
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        Ok(parse_response_body(&body))
    }
}

/**
 * Empty bodies become `Null`, bodies that are not JSON are kept as a string.
 */
pub fn parse_response_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }

    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_body_parsing() {
        assert_eq!(parse_response_body(""), Value::Null);
        assert_eq!(parse_response_body("{\"ok\":true}"), json!({"ok": true}));
        assert_eq!(parse_response_body("Subscribed"), Value::String("Subscribed".to_string()));
    }

    #[test]
    fn settings_follow_config() {
        let config = Config::default();
        let settings = BackendSettings::from(&config);
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert_eq!(settings.retries, 3);
        assert_eq!(settings.api_url, config.api_url);
    }

    #[tokio::test]
    async fn existing_subscription_is_adopted() {
        use crate::push::constants::{PUSH_SERVICE_URL, SERVICE_WORKER_SCOPE, SERVICE_WORKER_SCRIPT, VAPID_PUBLIC_KEY};
        use crate::push::local::LocalPushPlatform;

        let platform = Arc::new(LocalPushPlatform::new(PUSH_SERVICE_URL));
        let service = NotificationService::new(platform.clone(), BackendSettings::from(&Config::default()));

        service.check_service_worker().await;
        assert!(service.current_subscription().is_none());

        let registration = platform.register(SERVICE_WORKER_SCRIPT, SERVICE_WORKER_SCOPE).await.unwrap();
        service.check_service_worker().await;
        assert!(service.current_subscription().is_none());

        let subscription = registration.subscribe(VAPID_PUBLIC_KEY).await.unwrap();
        service.check_service_worker().await;
        assert_eq!(service.current_subscription(), Some(subscription));
    }
}
