use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)]
pub struct Invite {
    pub id: Uuid,
    #[sqlx(rename = "invite_code")]
    pub code: String,
    /// Hex-encoded id of the node that redeemed this invite.
    #[sqlx(rename = "node_id")]
    pub remote_node_id: Option<String>,
    pub funding_amount: i64,
    pub push_amount: i64,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A row accepted by bulk-load. Amounts are validated before reaching the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvite {
    pub code: String,
    pub funding_amount: u64,
    pub push_amount: u64,
}

#[derive(Debug, Serialize)]
pub struct InviteResponse {
    pub code: String,
    pub funding_amount: i64,
    pub push_amount: i64,
    pub lnurl: String,
}

/// LNURL `channelRequest` payload returned to wallets from the start endpoint.
#[derive(Debug, Serialize)]
pub struct ChannelRequestPayload {
    pub callback: String,
    pub k1: String,
    pub uri: String,
    pub tag: &'static str,
}

/// LNURL status envelope. Errors carry a human-readable reason.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "UPPERCASE")]
pub enum StatusResponse {
    Ok,
    Error { reason: String },
}

impl StatusResponse {
    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error {
            reason: reason.into(),
        }
    }
}
