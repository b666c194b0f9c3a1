use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::error::AppError;
use crate::extractors::MaybeUser;
use crate::reactions::ReactionSummary;
use crate::state::AppState;

/// Errors of the JSON endpoints, rendered as `{"error": ...}`.
pub struct JsonError(AppError);

impl From<AppError> for JsonError {
    fn from(e: AppError) -> Self {
        Self(e)
    }
}

impl IntoResponse for JsonError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        (status, Json(json!({ "error": self.0.public_message() }))).into_response()
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/get_reactions/{filename}", get(get_reactions))
        .route("/add_reaction/{filename}/{emoji}", post(add_reaction))
}

/// GET /get_reactions/{filename} -> { counts, userReaction }
async fn get_reactions(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(filename): Path<String>,
) -> Result<Json<ReactionSummary>, JsonError> {
    let summary = state.reactions.get_reactions(&filename, user.username())?;
    Ok(Json(summary))
}

/// POST /add_reaction/{filename}/{emoji} -> { success, counts }
async fn add_reaction(
    State(state): State<AppState>,
    user: MaybeUser,
    Path((filename, emoji)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, JsonError> {
    let counts = state
        .reactions
        .add_reaction(&filename, &emoji, user.username())?;
    Ok(Json(json!({ "success": true, "counts": counts })))
}
