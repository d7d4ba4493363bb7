use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL;
use base64::Engine;
use log::info;
use p256::SecretKey;
use p256::elliptic_curve::rand_core::{OsRng, RngCore};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use uuid::Uuid;

use crate::error::PushError;
use crate::push::constants::AUTH_SECRET_LEN;
use crate::push::platform::{PushPlatform, PushRegistration};
use crate::push::types::{PushSubscription, SubscriptionKeys};

/**
 * Push capability of this process. Subscriptions are minted the way a browser does it: a fresh
 * P-256 key pair and auth secret per subscription, and an endpoint below the push service URL.
 * Registrations live as long as the platform.
 */
pub struct LocalPushPlatform {
    push_service_url: String,
    service_worker_supported: bool,
    push_manager_supported: bool,
    registration: Mutex<Option<Arc<LocalRegistration>>>,
}

impl LocalPushPlatform {
    pub fn new(push_service_url: &str) -> Self {
        LocalPushPlatform {
            push_service_url: push_service_url.trim_end_matches('/').to_string(),
            service_worker_supported: true,
            push_manager_supported: true,
            registration: Mutex::new(None),
        }
    }

    pub fn with_support(mut self, service_worker: bool, push_manager: bool) -> Self {
        self.service_worker_supported = service_worker;
        self.push_manager_supported = push_manager;
        self
    }
}

#[async_trait]
impl PushPlatform for LocalPushPlatform {
    fn service_worker_supported(&self) -> bool {
        self.service_worker_supported
    }

    fn push_manager_supported(&self) -> bool {
        self.push_manager_supported
    }

    async fn registration(&self) -> Result<Option<Arc<dyn PushRegistration>>, PushError> {
        if !self.service_worker_supported {
            return Err(PushError::EnvironmentUnsupported);
        }

        let registration = self.registration.lock().expect("Failed to lock registration");
        Ok(registration.clone().map(|r| r as Arc<dyn PushRegistration>))
    }

    async fn register(&self, script: &str, scope: &str) -> Result<Arc<dyn PushRegistration>, PushError> {
        if !self.service_worker_supported {
            return Err(PushError::EnvironmentUnsupported);
        }

        if script.is_empty() {
            return Err(PushError::Registration {
                script: script.to_string(),
                reason: "The script URL is empty".to_string(),
            });
        }

        if !scope.starts_with('/') {
            return Err(PushError::Registration {
                script: script.to_string(),
                reason: format!("The scope {} is not an absolute path", scope),
            });
        }

        let mut registration = self.registration.lock().expect("Failed to lock registration");

        // updating the script of a scope keeps its push subscription
        let subscription = registration.as_ref()
            .filter(|existing| existing.scope == scope)
            .and_then(|existing| existing.subscription.lock().expect("Failed to lock subscription").clone());

        let created = Arc::new(LocalRegistration {
            script: script.to_string(),
            scope: scope.to_string(),
            push_service_url: self.push_service_url.clone(),
            subscription: Mutex::new(subscription),
        });

        info!("Registered service worker {} with scope {}", script, scope);
        *registration = Some(created.clone());
        Ok(created)
    }
}

#[derive(Debug, Clone)]
struct IssuedSubscription {
    application_server_key: String,
    subscription: PushSubscription,
}

pub struct LocalRegistration {
    script: String,
    scope: String,
    push_service_url: String,
    subscription: Mutex<Option<IssuedSubscription>>,
}

/**
 * Checks that the key is an uncompressed P-256 point: 65 bytes starting with 0x04.
 */
pub fn validate_application_server_key(key: &str) -> Result<(), PushError> {
    let bytes = BASE64URL.decode(key.trim_end_matches('='))
        .map_err(|err| PushError::InvalidApplicationServerKey(err.to_string()))?;

    if bytes.len() != 65 || bytes[0] != 0x04 {
        return Err(PushError::InvalidApplicationServerKey(
            format!("expected a 65 byte uncompressed P-256 point, got {} bytes", bytes.len())
        ));
    }

    Ok(())
}

fn issue_subscription(push_service_url: &str) -> PushSubscription {
    let secret = SecretKey::random(&mut OsRng);
    let public = secret.public_key().to_encoded_point(false);

    let mut auth = [0u8; AUTH_SECRET_LEN];
    OsRng.fill_bytes(&mut auth);

    PushSubscription {
        endpoint: format!("{}/{}", push_service_url, Uuid::new_v4()),
        expiration_time: None,
        keys: SubscriptionKeys {
            p256dh: BASE64URL.encode(public.as_bytes()),
            auth: BASE64URL.encode(auth),
        },
    }
}

#[async_trait]
impl PushRegistration for LocalRegistration {
    fn scope(&self) -> String {
        self.scope.clone()
    }

    fn script(&self) -> String {
        self.script.clone()
    }

    fn is_active(&self) -> bool {
        true
    }

    async fn subscription(&self) -> Result<Option<PushSubscription>, PushError> {
        let issued = self.subscription.lock().expect("Failed to lock subscription");
        Ok(issued.as_ref().map(|issued| issued.subscription.clone()))
    }

    async fn subscribe(&self, application_server_key: &str) -> Result<PushSubscription, PushError> {
        validate_application_server_key(application_server_key)?;

        let mut issued = self.subscription.lock().expect("Failed to lock subscription");

        if let Some(existing) = issued.as_ref() {
            if existing.application_server_key == application_server_key {
                return Ok(existing.subscription.clone());
            }

            return Err(PushError::InvalidApplicationServerKey(
                "a subscription with a different application server key already exists".to_string()
            ));
        }

        let subscription = issue_subscription(&self.push_service_url);
        info!("Issued push subscription {}", subscription.endpoint);

        *issued = Some(IssuedSubscription {
            application_server_key: application_server_key.to_string(),
            subscription: subscription.clone(),
        });
        Ok(subscription)
    }

    async fn unsubscribe(&self) -> Result<bool, PushError> {
        let mut issued = self.subscription.lock().expect("Failed to lock subscription");
        Ok(issued.take().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::constants::{PUSH_SERVICE_URL, SERVICE_WORKER_SCOPE, SERVICE_WORKER_SCRIPT, VAPID_PUBLIC_KEY};

    #[test]
    fn configured_vapid_key_is_valid() {
        validate_application_server_key(VAPID_PUBLIC_KEY).unwrap();
    }

    #[test]
    fn short_keys_are_rejected() {
        let err = validate_application_server_key("BAAA").unwrap_err();
        assert!(matches!(err, PushError::InvalidApplicationServerKey(_)));

        let err = validate_application_server_key("not base64!").unwrap_err();
        assert!(matches!(err, PushError::InvalidApplicationServerKey(_)));
    }

    #[tokio::test]
    async fn no_registration_until_registered() {
        let platform = LocalPushPlatform::new(PUSH_SERVICE_URL);
        assert!(platform.registration().await.unwrap().is_none());

        platform.register(SERVICE_WORKER_SCRIPT, SERVICE_WORKER_SCOPE).await.unwrap();

        let registration = platform.registration().await.unwrap().unwrap();
        assert_eq!(registration.scope(), "/");
        assert_eq!(registration.script(), SERVICE_WORKER_SCRIPT);
    }

    #[tokio::test]
    async fn relative_scope_is_rejected() {
        let platform = LocalPushPlatform::new(PUSH_SERVICE_URL);
        let err = platform.register(SERVICE_WORKER_SCRIPT, "app").await.err().unwrap();
        assert!(matches!(err, PushError::Registration { .. }));
    }

    #[tokio::test]
    async fn issued_subscription_looks_like_a_browser_subscription() {
        let platform = LocalPushPlatform::new("https://push.example/");
        let registration = platform.register(SERVICE_WORKER_SCRIPT, SERVICE_WORKER_SCOPE).await.unwrap();

        let subscription = registration.subscribe(VAPID_PUBLIC_KEY).await.unwrap();

        assert!(subscription.endpoint.starts_with("https://push.example/"));
        assert!(!subscription.endpoint.starts_with("https://push.example//"));
        assert_eq!(BASE64URL.decode(&subscription.keys.p256dh).unwrap().len(), 65);
        assert_eq!(BASE64URL.decode(&subscription.keys.auth).unwrap().len(), AUTH_SECRET_LEN);
        assert_eq!(registration.subscription().await.unwrap(), Some(subscription.clone()));

        // same key, same subscription
        assert_eq!(registration.subscribe(VAPID_PUBLIC_KEY).await.unwrap(), subscription);
    }

    #[tokio::test]
    async fn unsubscribe_then_subscribe_issues_new_keys() {
        let platform = LocalPushPlatform::new(PUSH_SERVICE_URL);
        let registration = platform.register(SERVICE_WORKER_SCRIPT, SERVICE_WORKER_SCOPE).await.unwrap();

        let first = registration.subscribe(VAPID_PUBLIC_KEY).await.unwrap();
        assert!(registration.unsubscribe().await.unwrap());
        assert!(!registration.unsubscribe().await.unwrap());

        let second = registration.subscribe(VAPID_PUBLIC_KEY).await.unwrap();
        assert_ne!(first.endpoint, second.endpoint);
        assert_ne!(first.keys, second.keys);
    }

    #[tokio::test]
    async fn reregistering_the_scope_keeps_the_subscription() {
        let platform = LocalPushPlatform::new(PUSH_SERVICE_URL);
        let registration = platform.register("/ngsw-worker.js", SERVICE_WORKER_SCOPE).await.unwrap();
        let subscription = registration.subscribe(VAPID_PUBLIC_KEY).await.unwrap();

        let updated = platform.register(SERVICE_WORKER_SCRIPT, SERVICE_WORKER_SCOPE).await.unwrap();

        assert_eq!(updated.script(), SERVICE_WORKER_SCRIPT);
        assert_eq!(updated.subscription().await.unwrap(), Some(subscription));
    }

    #[tokio::test]
    async fn unsupported_platform_has_no_registrations() {
        let platform = LocalPushPlatform::new(PUSH_SERVICE_URL).with_support(false, false);
        assert!(matches!(platform.registration().await, Err(PushError::EnvironmentUnsupported)));
    }
}
