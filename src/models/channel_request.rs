use std::fmt;

use secp256k1::PublicKey;
use serde::Deserialize;

/// Length of a hex-encoded compressed public key.
const NODE_ID_HEX_LEN: usize = 66;

/// Identity of a Lightning node: a compressed secp256k1 public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(PublicKey);

impl NodeId {
    pub fn parse(s: &str) -> Result<Self, String> {
        if s.len() != NODE_ID_HEX_LEN {
            return Err(format!("remoteid must be {NODE_ID_HEX_LEN} hex characters"));
        }
        let bytes = hex::decode(s).map_err(|e| format!("remoteid is not valid hex: {e}"))?;
        PublicKey::from_slice(&bytes)
            .map(Self)
            .map_err(|_| "remoteid is not a compressed public key".to_string())
    }

    pub fn to_bytes(&self) -> [u8; 33] {
        self.0.serialize()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_bytes()))
    }
}

/// Raw query string of the LNURL channel callback, as sent by the wallet.
#[derive(Debug, Default, Deserialize)]
pub struct ChannelRequestParams {
    pub remoteid: Option<String>,
    pub k1: Option<String>,
    pub private: Option<String>,
}

/// A validated redemption request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRequest {
    pub code: String,
    pub remote_node_id: NodeId,
    pub private: bool,
}

impl ChannelRequestParams {
    /// Checks the callback parameters without touching the store or the node.
    /// Wallets that omit `private` get a private channel.
    pub fn validate(self) -> Result<ChannelRequest, String> {
        let remote_node_id = NodeId::parse(self.remoteid.as_deref().unwrap_or_default())?;

        let code = self.k1.unwrap_or_default();
        if code.is_empty() {
            return Err("k1 is required".into());
        }

        let private = match self.private.as_deref().map(str::trim) {
            None | Some("1") | Some("true") => true,
            Some("0") | Some("false") => false,
            Some(other) => return Err(format!("invalid private flag: {other}")),
        };

        Ok(ChannelRequest {
            code,
            remote_node_id,
            private,
        })
    }
}
