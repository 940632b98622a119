//! LND REST client for the synchronous `OpenChannel` call (`POST /v1/channels`).

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{ChannelOpened, FundingClient, FundingError, OpenChannel};
use crate::config::LndConfig;

const MACAROON_HEADER: &str = "Grpc-Metadata-macaroon";

#[derive(Debug, Error)]
pub enum LndSetupError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid TLS certificate: {0}")]
    Certificate(reqwest::Error),
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),
}

pub struct LndClient {
    http: reqwest::Client,
    rest_url: String,
    macaroon: Option<String>,
    spend_unconfirmed: bool,
}

impl LndClient {
    pub fn new(config: &LndConfig) -> Result<Self, LndSetupError> {
        let mut builder = reqwest::Client::builder();

        if let Some(path) = &config.tls_cert_path {
            let pem = read_file(path)?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(LndSetupError::Certificate)?;
            builder = builder.add_root_certificate(cert);
        }
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let macaroon = match (&config.macaroon_hex, &config.macaroon_path) {
            (Some(hex), _) => Some(hex.trim().to_string()),
            (None, Some(path)) => Some(hex::encode(read_file(path)?)),
            (None, None) => {
                tracing::warn!("no LND macaroon configured, channel opens will likely be rejected");
                None
            }
        };

        Ok(Self {
            http: builder.build().map_err(LndSetupError::Client)?,
            rest_url: config.rest_url.clone(),
            macaroon,
            spend_unconfirmed: config.spend_unconfirmed,
        })
    }
}

fn read_file(path: &str) -> Result<Vec<u8>, LndSetupError> {
    std::fs::read(path).map_err(|source| LndSetupError::Read {
        path: path.to_string(),
        source,
    })
}

#[derive(Debug, Serialize)]
struct OpenChannelBody {
    node_pubkey: String,
    local_funding_amount: u64,
    push_sat: u64,
    private: bool,
    spend_unconfirmed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    sat_per_vbyte: Option<u64>,
}

impl OpenChannelBody {
    fn new(request: &OpenChannel, spend_unconfirmed: bool) -> Self {
        Self {
            node_pubkey: BASE64.encode(request.remote_node_id.to_bytes()),
            local_funding_amount: request.funding_amount,
            push_sat: request.push_amount,
            private: request.private,
            spend_unconfirmed,
            sat_per_vbyte: request.fee_rate,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChannelPointBody {
    funding_txid_bytes: Option<String>,
    funding_txid_str: Option<String>,
    #[serde(default)]
    output_index: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

fn parse_channel_point(body: &str) -> Result<ChannelOpened, FundingError> {
    let point: ChannelPointBody = serde_json::from_str(body)
        .map_err(|e| FundingError(format!("unexpected response from node: {e}")))?;

    let funding_txid = match (point.funding_txid_str, point.funding_txid_bytes) {
        (Some(txid), _) => txid,
        (None, Some(b64)) => {
            let mut bytes = BASE64
                .decode(b64)
                .map_err(|e| FundingError(format!("unexpected funding txid from node: {e}")))?;
            // Wire order is little-endian; txids are displayed reversed.
            bytes.reverse();
            hex::encode(bytes)
        }
        (None, None) => return Err(FundingError("node returned no funding txid".into())),
    };

    Ok(ChannelOpened {
        funding_txid,
        output_index: point.output_index,
    })
}

fn error_reason(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(reason) = parsed.message.or(parsed.error).filter(|m| !m.is_empty()) {
            return reason;
        }
    }
    let body = body.trim();
    if body.is_empty() {
        format!("node returned {status}")
    } else {
        body.to_string()
    }
}

fn transport_reason(e: reqwest::Error) -> String {
    if e.is_timeout() {
        "channel open timed out".to_string()
    } else {
        e.without_url().to_string()
    }
}

#[async_trait]
impl FundingClient for LndClient {
    async fn open_channel(&self, request: &OpenChannel) -> Result<ChannelOpened, FundingError> {
        let mut req = self
            .http
            .post(format!("{}/v1/channels", self.rest_url))
            .json(&OpenChannelBody::new(request, self.spend_unconfirmed));
        if let Some(macaroon) = &self.macaroon {
            req = req.header(MACAROON_HEADER, macaroon);
        }

        let response = req.send().await.map_err(|e| FundingError(transport_reason(e)))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FundingError(transport_reason(e)))?;

        if !status.is_success() {
            return Err(FundingError(error_reason(status, &body)));
        }
        parse_channel_point(&body)
    }
}
