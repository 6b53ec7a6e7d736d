use axum::Json;
use axum::extract::{Path, State};
use tracing::instrument;

use crate::engine::ScoreboardModel;
use crate::error::{AppError, ErrorBody};
use crate::state::AppState;
use crate::utils::game::find_game;

#[utoipa::path(
    get,
    path = "/{id}/scoreboard",
    tag = "Scoreboard",
    operation_id = "getScoreboard",
    summary = "Get the game scoreboard",
    description = "Served from cache; regenerated after any accepted answer.",
    params(("id" = i32, Path, description = "Game ID")),
    responses(
        (status = 200, description = "Scoreboard", body = ScoreboardModel),
        (status = 404, description = "Game not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_scoreboard(
    State(state): State<AppState>,
    Path(game_id): Path<i32>,
) -> Result<Json<ScoreboardModel>, AppError> {
    find_game(&state.db, game_id).await?;
    let board = state.scoreboard.get(game_id).await?;
    Ok(Json(board))
}
