//! Entity CRUD routes. Paths are parameterized so one handler set serves every catalog entity;
//! the three-segment route carries both `/{resource}/{lookup}/{value}` and `/{parent}/{id}/{collection}`.

use crate::handlers::entity::{create, delete as delete_handler, list, lookup, read, update};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/:path_segment", get(list).post(create))
        .route(
            "/:path_segment/:id",
            get(read).put(update).patch(update).delete(delete_handler),
        )
        .route("/:path_segment/:segment/:value", get(lookup))
        .with_state(state)
}
