//! Durable invite records and the single-use consumption guarantee.

#[cfg(test)]
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::channel_request::NodeId;
use crate::models::invite::{Invite, NewInvite};

/// Result of an attempt to mark an invite as used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// This caller flipped the invite from unused to used.
    Consumed,
    /// The invite was already used; nothing changed.
    AlreadyUsed,
    NotFound,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invite code {0:?} already exists")]
    Duplicate(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait InviteStore: Send + Sync {
    async fn lookup(&self, code: &str) -> Result<Option<Invite>, StoreError>;

    /// Marks the invite used if, and only if, it is currently unused. Implementations must
    /// make the check and the write a single atomic step: of any number of concurrent callers
    /// for one code, exactly one sees `Consumed`.
    async fn try_consume(
        &self,
        code: &str,
        remote_node_id: &NodeId,
        used_at: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError>;

    /// Inserts new unused invites. Either every row is stored or none is.
    async fn insert_batch(&self, invites: &[NewInvite]) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
