use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/games", game_routes())
        .nest("/admin", admin_routes())
}

fn game_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::game::get_challenge_instance))
        .routes(routes!(handlers::scoreboard::get_scoreboard))
        .routes(routes!(handlers::submission::submit_answer))
        .routes(routes!(handlers::submission::get_submission))
        .routes(routes!(
            handlers::container::create_container,
            handlers::container::destroy_container
        ))
        .routes(routes!(handlers::container::extend_container))
}

fn admin_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::admin::flush_scoreboard))
        .routes(routes!(handlers::admin::list_cheat_info))
}
