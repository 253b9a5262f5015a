pub mod config;
pub mod game_loop;
pub mod health;
pub mod room_manager;
pub mod state;
pub mod ws;

use axum::Router;
use tower_http::services::ServeDir;

use tagrush_sim::arena::ArenaCatalog;
use tagrush_sim::config::TagConfig;

use config::ServerConfig;
use state::AppState;

/// Build the router and application state, loading the arena catalog and
/// gameplay tuning from their configured locations.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    build_app_with(config, ArenaCatalog::from_env(), TagConfig::load())
}

/// Build the router and application state from explicit game data.
pub fn build_app_with(
    config: ServerConfig,
    arenas: ArenaCatalog,
    tag_config: TagConfig,
) -> (Router<()>, AppState) {
    let web_root = config.web_root.clone();
    tracing::info!(arenas = arenas.len(), "Arena catalog ready");
    let state = AppState::new(config, arenas, tag_config);

    let app = Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .route("/health", axum::routing::get(health::health_check))
        .fallback_service(ServeDir::new(&web_root))
        .with_state(state.clone());

    (app, state)
}
