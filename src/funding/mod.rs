//! Opening channels from the managed node.

pub mod lnd;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::channel_request::NodeId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenChannel {
    pub remote_node_id: NodeId,
    pub funding_amount: u64,
    pub push_amount: u64,
    pub private: bool,
    /// sat/vbyte; `None` lets the node pick.
    pub fee_rate: Option<u64>,
}

/// Funding outpoint of a channel the node has started opening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOpened {
    pub funding_txid: String,
    pub output_index: u32,
}

impl fmt::Display for ChannelOpened {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.funding_txid, self.output_index)
    }
}

/// The channel was not opened. The reason is safe to show to the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct FundingError(pub String);

/// One call, one channel-open attempt. Implementations never retry.
#[async_trait]
pub trait FundingClient: Send + Sync {
    async fn open_channel(&self, request: &OpenChannel) -> Result<ChannelOpened, FundingError>;
}
