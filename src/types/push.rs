use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Processing,
    Sent,
    Failed,
}

/// A scheduled reminder row. Created by the reminders API and by the focus
/// timer's boundary cue; mutated only by the dispatcher, never deleted by it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub user: String,
    #[serde(with = "time::serde::rfc3339")]
    pub fire_at: OffsetDateTime,
    pub title: String,
    pub body: String,
    pub status: NotificationStatus,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub sent_at: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub claimed_at: Option<OffsetDateTime>,
}

/// One browser/device registration. `endpoint` is the unique key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub user: String,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tz: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ua: Option<String>,
}

/// What actually goes over the wire to the push service, as a JSON body the
/// service worker unpacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct VapidConfig {
    pub private_key: String,
    pub public_key: String,
    pub subject: String,
}
