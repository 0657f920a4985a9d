use std::convert::Infallible;
use std::sync::Arc;

use serde::Deserialize;
use warp::http::StatusCode;
use warp::{reply, Filter, Reply};

use crate::room::UserProfile;

use super::{error_reply, normalize_code, with_state, AppState};

#[derive(Debug, Deserialize)]
struct CreateRoomRequest {
    room_name: Option<String>,
    mode: Option<String>,
    difficulty: Option<String>,
    user: UserProfile,
}

#[derive(Debug, Deserialize)]
struct JoinRoomRequest {
    code: String,
    user: UserProfile,
}

#[derive(Debug, Deserialize)]
struct CallerRequest {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    user_id: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct GradeRequest {
    code: String,
    problem_id: String,
    user_id: String,
    language: String,
    source: String,
}

/// All REST routes exposed to the presentation layer
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone {
    let create = warp::path!("api" / "rooms" / "create")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(create_room);

    let join = warp::path!("api" / "rooms" / "join")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(join_room);

    let start = warp::path!("api" / "rooms" / String / "start")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(start_match);

    let leave = warp::path!("api" / "rooms" / String / "leave")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(leave_room);

    let message = warp::path!("api" / "rooms" / String / "message")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(send_message);

    let get_room = warp::path!("api" / "rooms" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(fetch_room);

    let run = warp::path!("api" / "judge" / "run-code")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(run_code);

    let submit = warp::path!("api" / "judge" / "submit-code")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state))
        .and_then(submit_code);

    create
        .or(join)
        .or(start)
        .or(leave)
        .or(message)
        .or(get_room)
        .or(run)
        .or(submit)
}

async fn create_room(
    req: CreateRoomRequest,
    state: Arc<AppState>,
) -> Result<impl Reply, Infallible> {
    match state
        .coordinator
        .create_room(&req.user, req.room_name, req.mode, req.difficulty)
        .await
    {
        Ok((code, room)) => Ok(reply::with_status(
            reply::json(&serde_json::json!({ "ok": true, "code": code, "room": room })),
            StatusCode::CREATED,
        )),
        Err(e) => Ok(error_reply(&e)),
    }
}

async fn join_room(req: JoinRoomRequest, state: Arc<AppState>) -> Result<impl Reply, Infallible> {
    let code = normalize_code(&req.code);
    match state.coordinator.join_room(&code, &req.user).await {
        Ok(room) => Ok(reply::with_status(
            reply::json(&serde_json::json!({ "ok": true, "room": room })),
            StatusCode::OK,
        )),
        Err(e) => Ok(error_reply(&e)),
    }
}

async fn start_match(
    code: String,
    req: CallerRequest,
    state: Arc<AppState>,
) -> Result<impl Reply, Infallible> {
    let code = normalize_code(&code);
    match state.coordinator.start_match(&code, &req.user_id).await {
        Ok(room) => Ok(reply::with_status(
            reply::json(&serde_json::json!({ "ok": true, "room": room })),
            StatusCode::OK,
        )),
        Err(e) => Ok(error_reply(&e)),
    }
}

async fn leave_room(
    code: String,
    req: CallerRequest,
    state: Arc<AppState>,
) -> Result<impl Reply, Infallible> {
    let code = normalize_code(&code);
    match state.coordinator.leave_room(&code, &req.user_id).await {
        Ok(archived) => Ok(reply::with_status(
            reply::json(&serde_json::json!({ "ok": true, "archived": archived })),
            StatusCode::OK,
        )),
        Err(e) => Ok(error_reply(&e)),
    }
}

async fn send_message(
    code: String,
    req: MessageRequest,
    state: Arc<AppState>,
) -> Result<impl Reply, Infallible> {
    if req.text.trim().is_empty() {
        return Ok(error_reply(&crate::error::DuelError::invalid(
            "message text must not be empty",
        )));
    }
    let code = normalize_code(&code);
    match state
        .coordinator
        .send_message(&code, &req.user_id, &req.text)
        .await
    {
        Ok(_) => Ok(reply::with_status(
            reply::json(&serde_json::json!({ "ok": true })),
            StatusCode::OK,
        )),
        Err(e) => Ok(error_reply(&e)),
    }
}

async fn fetch_room(code: String, state: Arc<AppState>) -> Result<impl Reply, Infallible> {
    let code = normalize_code(&code);
    match state.coordinator.get_room(&code).await {
        Ok(room) => Ok(reply::with_status(
            reply::json(&serde_json::json!({ "ok": true, "room": room })),
            StatusCode::OK,
        )),
        Err(e) => Ok(error_reply(&e)),
    }
}

async fn run_code(req: GradeRequest, state: Arc<AppState>) -> Result<impl Reply, Infallible> {
    grade(req, state, false).await
}

async fn submit_code(req: GradeRequest, state: Arc<AppState>) -> Result<impl Reply, Infallible> {
    grade(req, state, true).await
}

async fn grade(
    req: GradeRequest,
    state: Arc<AppState>,
    is_submit: bool,
) -> Result<reply::WithStatus<reply::Json>, Infallible> {
    let code = normalize_code(&req.code);
    match state
        .pipeline
        .grade(
            &code,
            &req.problem_id,
            &req.user_id,
            &req.language,
            &req.source,
            is_submit,
        )
        .await
    {
        Ok(result) => Ok(reply::with_status(
            reply::json(&serde_json::json!({ "ok": true, "result": result })),
            StatusCode::OK,
        )),
        Err(e) => Ok(error_reply(&e)),
    }
}
