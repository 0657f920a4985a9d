mod api;
mod config;
mod error;
mod judge;
mod problems;
mod room;

use std::sync::Arc;

use warp::Filter;

use config::Config;
use judge::{GradingPipeline, HttpJudgeGateway};
use problems::ProblemCatalog;
use room::{ArchiveStore, RoomCoordinator, RoomStore};

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let catalog = Arc::new(ProblemCatalog::builtin());
    let coordinator = RoomCoordinator::new(
        Arc::new(RoomStore::new()),
        Arc::new(ArchiveStore::new()),
        catalog,
        config.room.clone(),
    );

    let gateway = Arc::new(
        HttpJudgeGateway::new(config.judge.clone()).expect("Failed to create judge HTTP client"),
    );
    let pipeline = Arc::new(GradingPipeline::new(
        gateway,
        coordinator.clone(),
        config.judge.clone(),
    ));

    let state = Arc::new(api::AppState {
        coordinator,
        pipeline,
    });

    let routes = api::room_routes::routes(state.clone())
        .or(api::room_watch::watch_route(state))
        .or(api::health_route());

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        judge_url = %config.judge.api_url,
        "CodeDuel server listening"
    );

    warp::serve(routes).run(config.bind_address()).await;
}
