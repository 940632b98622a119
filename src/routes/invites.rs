use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::error::AppError;
use crate::models::channel_request::ChannelRequestParams;
use crate::models::invite::{ChannelRequestPayload, InviteResponse, StatusResponse};
use crate::redeem::RedeemError;
use crate::{lnurl, AppState};

const INVALID_PARAMS: &str = "invalid parameter(s) provided";
const INTERNAL: &str = "internal error";
const NOT_RECORDED: &str = "channel opened but the invite could not be recorded; contact the operator";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/i/{k1}", get(invite_info))
        .route("/s/{k1}", get(start))
        .route("/connect", get(connect))
}

/// Maps a redemption failure onto the reason shown by the wallet.
fn status_for(e: &RedeemError) -> StatusResponse {
    match e {
        RedeemError::InvalidRequest(detail) => {
            tracing::warn!("rejected channel request: {detail}");
            StatusResponse::error(INVALID_PARAMS)
        }
        RedeemError::InvalidInvite | RedeemError::AlreadyUsed => StatusResponse::error(e.to_string()),
        RedeemError::Funding(funding) => StatusResponse::error(funding.0.clone()),
        RedeemError::FundingSucceededButInviteRaceLost { .. } => StatusResponse::error(NOT_RECORDED),
        RedeemError::Store(store) => {
            tracing::error!("invite store error: {store}");
            StatusResponse::error(INTERNAL)
        }
    }
}

async fn invite_info(
    State(state): State<AppState>,
    Path(k1): Path<String>,
) -> Result<Json<InviteResponse>, AppError> {
    let invite = state.coordinator.describe(&k1).await?;
    let lnurl = lnurl::encode(&state.config.start_url(&invite.code))
        .map_err(|e| AppError::Internal(format!("LNURL encoding failed: {e}")))?;

    Ok(Json(InviteResponse {
        code: invite.code,
        funding_amount: invite.funding_amount,
        push_amount: invite.push_amount,
        lnurl,
    }))
}

async fn start(
    State(state): State<AppState>,
    Path(k1): Path<String>,
) -> Result<Json<ChannelRequestPayload>, Json<StatusResponse>> {
    // Checked even though the wallet could go straight to the callback, so nothing about
    // the node is revealed for unknown or spent codes.
    let invite = state
        .coordinator
        .describe(&k1)
        .await
        .map_err(|e| Json(status_for(&e)))?;

    Ok(Json(ChannelRequestPayload {
        callback: state.config.callback_url(),
        k1: invite.code,
        uri: state.config.node_uri.clone(),
        tag: "channelRequest",
    }))
}

async fn connect(
    State(state): State<AppState>,
    params: Result<Query<ChannelRequestParams>, QueryRejection>,
) -> Json<StatusResponse> {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => {
            return Json(status_for(&RedeemError::InvalidRequest(rejection.body_text())));
        }
    };
    let request = match params.validate() {
        Ok(request) => request,
        Err(reason) => return Json(status_for(&RedeemError::InvalidRequest(reason))),
    };

    match state.coordinator.redeem(&request).await {
        Ok(_) => Json(StatusResponse::Ok),
        Err(e) => Json(status_for(&e)),
    }
}
