//! Capabilities the push side needs from the platform: service worker registrations and the push
//! manager that hangs off them.

use std::sync::Arc;
use async_trait::async_trait;

use crate::error::PushError;
use crate::push::types::PushSubscription;

#[async_trait]
pub trait PushPlatform: Send + Sync {
    fn service_worker_supported(&self) -> bool;

    fn push_manager_supported(&self) -> bool;

    /// The registration controlling the application, if any.
    async fn registration(&self) -> Result<Option<Arc<dyn PushRegistration>>, PushError>;

    /// Registers (or updates) the worker script for `scope`.
    async fn register(&self, script: &str, scope: &str) -> Result<Arc<dyn PushRegistration>, PushError>;
}

#[async_trait]
pub trait PushRegistration: Send + Sync {
    fn scope(&self) -> String;

    fn script(&self) -> String;

    fn is_active(&self) -> bool;

    async fn subscription(&self) -> Result<Option<PushSubscription>, PushError>;

    /// `application_server_key` is the base64url encoded VAPID public key.
    async fn subscribe(&self, application_server_key: &str) -> Result<PushSubscription, PushError>;

    /// Returns false if there was no subscription.
    async fn unsubscribe(&self) -> Result<bool, PushError>;
}
