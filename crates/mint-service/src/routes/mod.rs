use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

mod health;
mod mint;
mod registry;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/mint", post(mint::mint))
        .route("/registry", get(registry::registry))
}
