use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    /// Uncompressed P-256 public key of the client (base64url).
    pub p256dh: String,
    /// Auth secret (base64url).
    pub auth: String,
}

/**
 * A push subscription as issued by the platform. Serializes to the canonical JSON form that the
 * backend expects.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub endpoint: String,
    pub expiration_time: Option<u64>,
    pub keys: SubscriptionKeys,
}
