mod dto;
pub mod engine;
pub mod handlers;
pub mod ledger;
pub mod repo;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::manage_routes())
}
