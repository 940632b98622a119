//! Invite redemption: validate the invite, open the channel, then commit.
//!
//! The invite check before funding is advisory. Exclusivity comes solely from
//! [`InviteStore::try_consume`], which runs after the channel open has succeeded, so a failed
//! open never burns an invite. The price is that two wallets racing on the same unused code
//! can both get a channel; the loser is reported as
//! [`RedeemError::FundingSucceededButInviteRaceLost`] for an operator to reconcile.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::funding::{ChannelOpened, FundingClient, FundingError, OpenChannel};
use crate::models::channel_request::ChannelRequest;
use crate::models::invite::Invite;
use crate::store::{ConsumeOutcome, InviteStore, StoreError};

/// Operator policy applied to every channel open.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedeemPolicy {
    /// Open private channels regardless of what the wallet asked for.
    pub force_private: bool,
    pub fee_rate: Option<u64>,
}

#[derive(Debug, Error)]
pub enum RedeemError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("this invite code is invalid")]
    InvalidInvite,
    #[error("this invite code has been used")]
    AlreadyUsed,
    #[error(transparent)]
    Funding(#[from] FundingError),
    /// The channel exists but the invite is not recorded as used by this request.
    #[error("channel {channel} opened for invite {code:?} but the invite was not marked used: {cause}")]
    FundingSucceededButInviteRaceLost {
        code: String,
        channel: ChannelOpened,
        cause: CommitFailure,
    },
    #[error("invite store unavailable: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum CommitFailure {
    #[error("another redemption consumed it first")]
    AlreadyUsed,
    #[error("the invite no longer exists")]
    NotFound,
    #[error(transparent)]
    Store(StoreError),
}

pub struct Coordinator {
    store: Arc<dyn InviteStore>,
    funding: Arc<dyn FundingClient>,
    policy: RedeemPolicy,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn InviteStore>,
        funding: Arc<dyn FundingClient>,
        policy: RedeemPolicy,
    ) -> Self {
        Self {
            store,
            funding,
            policy,
        }
    }

    /// Returns the invite if it exists and is still redeemable.
    pub async fn describe(&self, code: &str) -> Result<Invite, RedeemError> {
        let invite = self
            .store
            .lookup(code)
            .await?
            .ok_or(RedeemError::InvalidInvite)?;

        if invite.is_used {
            return Err(RedeemError::AlreadyUsed);
        }
        Ok(invite)
    }

    /// Opens the channel for an invite and marks it used. Returns the funding outpoint.
    pub async fn redeem(&self, request: &ChannelRequest) -> Result<ChannelOpened, RedeemError> {
        let code = request.code.as_str();
        let node = &request.remote_node_id;

        tracing::debug!(code, %node, "validating invite");
        let invite = self.describe(code).await?;

        let (Ok(funding_amount), Ok(push_amount)) = (
            u64::try_from(invite.funding_amount),
            u64::try_from(invite.push_amount),
        ) else {
            tracing::error!(code, "invite has negative amounts");
            return Err(RedeemError::InvalidInvite);
        };

        let open = OpenChannel {
            remote_node_id: *node,
            funding_amount,
            push_amount,
            private: self.policy.force_private || request.private,
            fee_rate: self.policy.fee_rate,
        };

        tracing::debug!(code, %node, funding_amount, push_amount, private = open.private, "opening channel");
        let channel = match self.funding.open_channel(&open).await {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!(code, %node, "channel open failed: {e}");
                return Err(e.into());
            }
        };

        tracing::debug!(code, %node, %channel, "committing invite");
        let cause = match self.store.try_consume(code, node, Utc::now()).await {
            Ok(ConsumeOutcome::Consumed) => {
                tracing::info!(code, %node, %channel, "invite redeemed");
                return Ok(channel);
            }
            Ok(ConsumeOutcome::AlreadyUsed) => CommitFailure::AlreadyUsed,
            Ok(ConsumeOutcome::NotFound) => CommitFailure::NotFound,
            Err(e) => CommitFailure::Store(e),
        };

        tracing::error!(
            anomaly = "invite_race_lost",
            code,
            %node,
            %channel,
            "channel opened but invite was not marked used, reconcile manually: {cause}"
        );
        Err(RedeemError::FundingSucceededButInviteRaceLost {
            code: code.to_string(),
            channel,
            cause,
        })
    }
}
