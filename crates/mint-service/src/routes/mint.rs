use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use mint_core::{MintRequest, MintResponse};

use crate::error::mint_status;
use crate::state::AppState;

pub async fn mint(
    State(state): State<AppState>,
    Json(request): Json<MintRequest>,
) -> (StatusCode, Json<MintResponse>) {
    match state.mint.mint(&request).await {
        Ok(receipt) => (StatusCode::OK, Json(MintResponse::success(receipt))),
        Err(err) => (mint_status(&err), Json(MintResponse::failure(&err))),
    }
}
