use axum::extract::State;
use axum::Json;

use crate::dto::RegistryView;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn registry(State(state): State<AppState>) -> ApiResult<Json<RegistryView>> {
    Ok(Json(state.mint.registry().await?))
}
