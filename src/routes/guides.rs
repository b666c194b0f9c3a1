use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::error::AppResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/guides/{filename}", get(view_guide))
}

/// GET /guides/{filename}: the stored document, verbatim
async fn view_guide(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> AppResult<Response> {
    let document = state.guides.get(&filename)?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        document,
    )
        .into_response())
}
