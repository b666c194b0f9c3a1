pub mod assets;
pub mod auth;
pub mod dashboard;
pub mod guides;
pub mod home;
pub mod reactions;

use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::guides::images::UPLOADS_URL_PREFIX;
use crate::state::AppState;

/// The whole site, ready to serve.
pub fn app(state: AppState) -> Router {
    let max_upload_bytes = state.config.server.max_upload_mb * 1024 * 1024;
    let uploads = ServeDir::new(state.images.dir());

    Router::new()
        .route("/", get(home::index))
        .route("/assets/{*path}", get(assets::serve))
        .merge(auth::router())
        .merge(dashboard::router(max_upload_bytes))
        .merge(guides::router())
        .merge(reactions::router())
        .nest_service(UPLOADS_URL_PREFIX, uploads)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
