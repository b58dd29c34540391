use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mint_core::{MintError, MintResponse};

/// HTTP status for a failed mint. The body is always a [`MintResponse`].
pub fn mint_status(err: &MintError) -> StatusCode {
    match err {
        MintError::NotFound(_) => StatusCode::NOT_FOUND,
        MintError::Forbidden { .. } => StatusCode::FORBIDDEN,
        MintError::AlreadyMinted(_) | MintError::MintInProgress(_) => StatusCode::CONFLICT,
        MintError::InvalidPayload(_) => StatusCode::UNPROCESSABLE_ENTITY,
        MintError::InsufficientCredit(_) => StatusCode::PAYMENT_REQUIRED,
        MintError::ChainUnavailable(_) | MintError::RegistryMissing => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        MintError::ChainRejected(_) | MintError::DiscriminatorMismatch { .. } => {
            StatusCode::BAD_GATEWAY
        }
        MintError::OutcomeUnknown { .. } => StatusCode::GATEWAY_TIMEOUT,
        MintError::ConsistencyWarning { .. } => StatusCode::CONFLICT,
        MintError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Wrapper so handlers can return `Result<_, ApiError>` with `?`.
#[derive(Debug)]
pub struct ApiError(pub MintError);

impl From<MintError> for ApiError {
    fn from(err: MintError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (mint_status(&self.0), Json(MintResponse::failure(&self.0))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
