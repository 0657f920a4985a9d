pub mod room_routes;
pub mod room_watch;

use std::sync::Arc;

use warp::http::StatusCode;
use warp::Filter;

use crate::error::DuelError;
use crate::judge::{GradingPipeline, HttpJudgeGateway};
use crate::room::RoomCoordinator;

pub type HttpGradingPipeline = GradingPipeline<HttpJudgeGateway>;

/// Shared handles injected into every route
pub struct AppState {
    pub coordinator: Arc<RoomCoordinator>,
    pub pipeline: Arc<HttpGradingPipeline>,
}

/// Room codes are entered and relayed by hand; accept any casing and
/// stray whitespace on every code-bearing route.
pub(crate) fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}

pub fn health_route() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "health").and(warp::get()).map(|| {
        warp::reply::json(&serde_json::json!({
            "status": "healthy",
            "service": "CodeDuel Server",
            "version": env!("CARGO_PKG_VERSION")
        }))
    })
}

/// Map the error taxonomy onto HTTP statuses. Client-correctable errors
/// carry 4xx, upstream problems 5xx; no error leaves without a typed body.
pub(crate) fn error_reply(err: &DuelError) -> warp::reply::WithStatus<warp::reply::Json> {
    let status = match err {
        DuelError::RoomNotFound(_)
        | DuelError::ProblemNotFound(_)
        | DuelError::UnsupportedLanguage(_)
        | DuelError::MissingTemplate { .. } => StatusCode::NOT_FOUND,
        DuelError::NotHost(_) | DuelError::NotPlayer(_) => StatusCode::FORBIDDEN,
        DuelError::RoomAlreadyExists(_)
        | DuelError::RoomLocked(_)
        | DuelError::AlreadyStarted(_)
        | DuelError::VersionConflict(_) => StatusCode::CONFLICT,
        DuelError::InvalidRequest(_) | DuelError::SerializationFailed(_) => {
            StatusCode::BAD_REQUEST
        }
        DuelError::GatewayUnavailable(_) | DuelError::MalformedGatewayResponse(_) => {
            StatusCode::BAD_GATEWAY
        }
        DuelError::CodeExhausted(_) | DuelError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "ok": false,
            "message": err.to_string(),
        })),
        status,
    )
}
