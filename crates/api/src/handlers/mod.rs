pub mod campaigns;
pub mod webhooks;

use axum::http::StatusCode;

pub use crate::AppState;

/// Map an engine error onto the HTTP status the caller sees.
pub fn error_status(err: &engine::EngineError) -> StatusCode {
    use engine::EngineError::*;
    match err {
        NotFound(_) => StatusCode::NOT_FOUND,
        Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Forbidden(_) => StatusCode::FORBIDDEN,
        Conflict(_) => StatusCode::CONFLICT,
        RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        Provider(_) | Transient(_) | Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
