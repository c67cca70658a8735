pub mod actors;
pub mod genres;
pub mod halls;
pub mod performances;
pub mod plays;
pub mod reservations;
pub mod tickets;
pub mod users;

use axum::Router;
use serde::Deserialize;
use std::sync::Arc;

/// `?search=` on catalogue lists.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

pub fn routes() -> Router<Arc<crate::AppState>> {
    let theatre = Router::new()
        .merge(genres::routes())
        .merge(actors::routes())
        .merge(plays::routes())
        .merge(halls::routes())
        .merge(performances::routes())
        .merge(reservations::routes())
        .merge(tickets::routes());

    Router::new()
        .nest("/theatre", theatre)
        .nest("/user", users::routes())
}
