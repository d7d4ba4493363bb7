/**
 * Public VAPID key of the notification backend. Subscriptions requested with another key are
 * rejected by the backend.
 */
pub const VAPID_PUBLIC_KEY: &str = "BJUGueezdQ1fUnOWNvNGpYtCHQIr2kZpxQHxm0IVD_bW6vzxfplaL7GKcSQYB8EE_JZ_fHjJpuOsGDOBGrMlkG4";

pub const API_URL: &str = "http://localhost:5281/api/notifications";

/**
 * Base URL of the push service that issues subscription endpoints.
 */
pub const PUSH_SERVICE_URL: &str = "http://localhost:5281/push";

pub const SUBSCRIBE_PATH: &str = "subscribe";
pub const SEND_PATH: &str = "send";

/**
 * How long (milliseconds) a single request to the backend may take.
 */
pub const REQUEST_TIMEOUT_MS: u64 = 5000;

/**
 * How often a failed request to the backend is retried.
 */
pub const REQUEST_RETRIES: u32 = 3;

pub const SERVICE_WORKER_SCRIPT: &str = "custom-sw.js";
pub const SERVICE_WORKER_SCOPE: &str = "/";

/**
 * Registered by the availability check when no registration exists yet.
 */
pub const FALLBACK_SERVICE_WORKER_SCRIPT: &str = "/ngsw-worker.js";

/**
 * Upper bound (milliseconds) on how long the service worker registration waits for the application
 * to become stable.
 */
pub const REGISTRATION_DELAY_MS: u64 = 30000;

/**
 * Length (bytes) of the auth secret of a subscription.
 */
pub const AUTH_SECRET_LEN: usize = 16;
