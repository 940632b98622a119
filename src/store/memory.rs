use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{ConsumeOutcome, InviteStore, StoreError};
use crate::models::channel_request::NodeId;
use crate::models::invite::{Invite, NewInvite};

/// In-process store. The mutex is held only for the duration of a single map operation.
#[derive(Default)]
pub struct MemoryInviteStore {
    invites: Mutex<HashMap<String, Invite>>,
}

impl MemoryInviteStore {
    pub fn with_invites(invites: &[NewInvite]) -> Self {
        let store = Self::default();
        {
            let mut map = store.invites.lock().unwrap();
            for invite in invites {
                map.insert(invite.code.clone(), new_row(invite));
            }
        }
        store
    }

    /// Forces an invite into the used state, bypassing `try_consume`.
    pub fn mark_used(&self, code: &str, remote_node_id: &NodeId) {
        let mut map = self.invites.lock().unwrap();
        if let Some(invite) = map.get_mut(code) {
            invite.is_used = true;
            invite.remote_node_id = Some(remote_node_id.to_string());
            invite.used_at = Some(Utc::now());
        }
    }
}

fn new_row(invite: &NewInvite) -> Invite {
    Invite {
        id: Uuid::new_v4(),
        code: invite.code.clone(),
        remote_node_id: None,
        funding_amount: invite.funding_amount as i64,
        push_amount: invite.push_amount as i64,
        is_used: false,
        used_at: None,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl InviteStore for MemoryInviteStore {
    async fn lookup(&self, code: &str) -> Result<Option<Invite>, StoreError> {
        Ok(self.invites.lock().unwrap().get(code).cloned())
    }

    async fn try_consume(
        &self,
        code: &str,
        remote_node_id: &NodeId,
        used_at: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError> {
        let mut map = self.invites.lock().unwrap();
        let Some(invite) = map.get_mut(code) else {
            return Ok(ConsumeOutcome::NotFound);
        };
        if invite.is_used {
            return Ok(ConsumeOutcome::AlreadyUsed);
        }
        invite.is_used = true;
        invite.remote_node_id = Some(remote_node_id.to_string());
        invite.used_at = Some(used_at);
        Ok(ConsumeOutcome::Consumed)
    }

    async fn insert_batch(&self, invites: &[NewInvite]) -> Result<u64, StoreError> {
        let mut map = self.invites.lock().unwrap();
        let mut seen = std::collections::HashSet::new();
        for invite in invites {
            if map.contains_key(&invite.code) || !seen.insert(invite.code.as_str()) {
                return Err(StoreError::Duplicate(invite.code.clone()));
            }
        }
        for invite in invites {
            map.insert(invite.code.clone(), new_row(invite));
        }
        Ok(invites.len() as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::channel_request::tests::{node, NODE_A, NODE_B};

    fn invite(code: &str) -> NewInvite {
        NewInvite {
            code: code.into(),
            funding_amount: 100_000,
            push_amount: 0,
        }
    }

    #[tokio::test]
    async fn consume_is_one_shot() {
        let store = MemoryInviteStore::with_invites(&[invite("abc")]);
        let first_at = Utc::now();

        let first = store.try_consume("abc", &node(NODE_A), first_at).await.unwrap();
        assert_eq!(first, ConsumeOutcome::Consumed);

        let second = store
            .try_consume("abc", &node(NODE_B), first_at + chrono::Duration::seconds(5))
            .await
            .unwrap();
        assert_eq!(second, ConsumeOutcome::AlreadyUsed);

        let row = store.lookup("abc").await.unwrap().unwrap();
        assert!(row.is_used);
        assert_eq!(row.remote_node_id.as_deref(), Some(NODE_A));
        assert_eq!(row.used_at, Some(first_at));
    }

    #[tokio::test]
    async fn consume_unknown_code() {
        let store = MemoryInviteStore::default();
        let outcome = store.try_consume("zzz", &node(NODE_A), Utc::now()).await.unwrap();
        assert_eq!(outcome, ConsumeOutcome::NotFound);
    }

    #[tokio::test]
    async fn concurrent_consumers_have_one_winner() {
        let store = Arc::new(MemoryInviteStore::with_invites(&[invite("abc")]));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.try_consume("abc", &node(NODE_A), Utc::now()).await })
            })
            .collect();

        let mut consumed = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                ConsumeOutcome::Consumed => consumed += 1,
                ConsumeOutcome::AlreadyUsed => {}
                ConsumeOutcome::NotFound => panic!("invite vanished"),
            }
        }
        assert_eq!(consumed, 1);
    }

    #[tokio::test]
    async fn batch_with_duplicate_inserts_nothing() {
        let store = MemoryInviteStore::with_invites(&[invite("taken")]);

        let err = store
            .insert_batch(&[invite("fresh"), invite("taken")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(code) if code == "taken"));
        assert!(store.lookup("fresh").await.unwrap().is_none());

        let err = store
            .insert_batch(&[invite("twice"), invite("twice")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(code) if code == "twice"));
    }

    #[tokio::test]
    async fn batch_inserts_unused_invites() {
        let store = MemoryInviteStore::default();
        let count = store.insert_batch(&[invite("a"), invite("b")]).await.unwrap();
        assert_eq!(count, 2);

        let row = store.lookup("b").await.unwrap().unwrap();
        assert!(!row.is_used);
        assert!(row.used_at.is_none());
        assert!(row.remote_node_id.is_none());
    }
}
