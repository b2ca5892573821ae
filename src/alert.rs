//! data structures for deserializing incoming alerts
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// label and annotation maps keep the order alertmanager sent them in
pub type KeyValues = IndexMap<String, String>;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
/// data from prometheus received by the alertmanager webhook receiver
pub struct WebhookMessage {
    pub version: String,
    pub group_key: String,
    pub receiver: String,
    pub status: String,
    pub alerts: Vec<Alert>,

    #[serde(default)]
    pub truncated_alerts: u64,
    #[serde(default)]
    pub group_labels: KeyValues,
    #[serde(default)]
    pub common_labels: KeyValues,
    #[serde(default)]
    pub common_annotations: KeyValues,
    #[serde(default, rename = "externalURL")]
    pub external_url: String,
}

impl WebhookMessage {
    /// firing alerts in the order they were received
    pub fn firing(&self) -> impl Iterator<Item = &Alert> {
        self.alerts
            .iter()
            .filter(|alert| alert.status == AlertStatus::Firing)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Firing,
    Resolved,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub status: AlertStatus,
    pub labels: KeyValues,
    pub annotations: KeyValues,
    #[serde(rename = "generatorURL")]
    pub generator_url: String,

    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fingerprint: String,
}
