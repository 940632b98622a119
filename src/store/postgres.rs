use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{ConsumeOutcome, InviteStore, StoreError};
use crate::models::channel_request::NodeId;
use crate::models::invite::{Invite, NewInvite};

#[derive(Clone)]
pub struct PgInviteStore {
    db: PgPool,
}

impl PgInviteStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl InviteStore for PgInviteStore {
    async fn lookup(&self, code: &str) -> Result<Option<Invite>, StoreError> {
        let invite = sqlx::query_as::<_, Invite>(
            "SELECT id, invite_code, node_id, funding_amount, push_amount, is_used, used_at, created_at
             FROM invites WHERE invite_code = $1",
        )
        .bind(code)
        .fetch_optional(&self.db)
        .await?;

        Ok(invite)
    }

    async fn try_consume(
        &self,
        code: &str,
        remote_node_id: &NodeId,
        used_at: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError> {
        // The existence probe reads the snapshot taken before the UPDATE, so a row consumed
        // by this very statement still counts as found.
        let (consumed, found): (bool, bool) = sqlx::query_as(
            "WITH consumed AS (
                 UPDATE invites SET is_used = TRUE, node_id = $2, used_at = $3
                 WHERE invite_code = $1 AND NOT is_used
                 RETURNING id
             )
             SELECT EXISTS (SELECT 1 FROM consumed),
                    EXISTS (SELECT 1 FROM invites WHERE invite_code = $1)",
        )
        .bind(code)
        .bind(remote_node_id.to_string())
        .bind(used_at)
        .fetch_one(&self.db)
        .await?;

        Ok(match (consumed, found) {
            (true, _) => ConsumeOutcome::Consumed,
            (false, true) => ConsumeOutcome::AlreadyUsed,
            (false, false) => ConsumeOutcome::NotFound,
        })
    }

    async fn insert_batch(&self, invites: &[NewInvite]) -> Result<u64, StoreError> {
        let mut tx = self.db.begin().await?;

        for invite in invites {
            let result = sqlx::query(
                "INSERT INTO invites (invite_code, funding_amount, push_amount) VALUES ($1, $2, $3)",
            )
            .bind(&invite.code)
            .bind(invite.funding_amount as i64)
            .bind(invite.push_amount as i64)
            .execute(&mut *tx)
            .await;

            if let Err(e) = result {
                let duplicate = e
                    .as_database_error()
                    .is_some_and(|d| d.is_unique_violation());
                return Err(if duplicate {
                    StoreError::Duplicate(invite.code.clone())
                } else {
                    StoreError::Database(e)
                });
            }
        }

        tx.commit().await?;
        Ok(invites.len() as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::models::channel_request::tests::{node, NODE_A, NODE_B};

    /// Connects to `DATABASE_URL` and applies migrations. Returns `None` when no database is
    /// configured so the suite still runs on machines without Postgres.
    async fn store() -> Option<PgInviteStore> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping Postgres store test");
            return None;
        };
        let db = PgPool::connect(&url).await.expect("failed to connect to test database");
        sqlx::migrate!().run(&db).await.expect("failed to run migrations");
        Some(PgInviteStore::new(db))
    }

    fn unique_code() -> String {
        format!("test-{}", Uuid::new_v4())
    }

    fn new_invite(code: &str) -> NewInvite {
        NewInvite {
            code: code.to_string(),
            funding_amount: 100_000,
            push_amount: 0,
        }
    }

    #[tokio::test]
    async fn consume_outcomes_follow_row_state() {
        let Some(store) = store().await else { return };
        let code = unique_code();
        store.insert_batch(&[new_invite(&code)]).await.unwrap();
        let used_at = Utc::now();

        let first = store.try_consume(&code, &node(NODE_A), used_at).await.unwrap();
        assert_eq!(first, ConsumeOutcome::Consumed);

        let second = store.try_consume(&code, &node(NODE_B), Utc::now()).await.unwrap();
        assert_eq!(second, ConsumeOutcome::AlreadyUsed);

        let missing = store
            .try_consume(&unique_code(), &node(NODE_A), Utc::now())
            .await
            .unwrap();
        assert_eq!(missing, ConsumeOutcome::NotFound);

        let row = store.lookup(&code).await.unwrap().unwrap();
        assert!(row.is_used);
        assert_eq!(row.remote_node_id.as_deref(), Some(NODE_A));
        // Postgres keeps microseconds.
        let drift = row.used_at.unwrap() - used_at;
        assert!(drift.num_microseconds().unwrap().abs() <= 1);
    }

    #[tokio::test]
    async fn concurrent_consumers_have_one_winner() {
        let Some(store) = store().await else { return };
        let store = Arc::new(store);
        let code = unique_code();
        store.insert_batch(&[new_invite(&code)]).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                let code = code.clone();
                tokio::spawn(async move { store.try_consume(&code, &node(NODE_A), Utc::now()).await })
            })
            .collect();

        let mut consumed = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == ConsumeOutcome::Consumed {
                consumed += 1;
            }
        }
        assert_eq!(consumed, 1);
    }

    #[tokio::test]
    async fn duplicate_in_batch_rolls_back() {
        let Some(store) = store().await else { return };
        let taken = unique_code();
        let fresh = unique_code();
        store.insert_batch(&[new_invite(&taken)]).await.unwrap();

        let err = store
            .insert_batch(&[new_invite(&fresh), new_invite(&taken)])
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Duplicate(code) if code == taken));
        assert!(store.lookup(&fresh).await.unwrap().is_none());
    }
}
