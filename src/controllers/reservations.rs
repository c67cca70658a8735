use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::{
    error::{ApiResult, AppError},
    extractors::{Page, Pagination},
    middleware::AuthUser,
    models::reservation::{Reservation, ReservationWithTickets},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reservations", get(list_reservations).post(create_reservation))
        .route(
            "/reservations/{id}",
            get(get_reservation).delete(delete_reservation),
        )
}

/// Own reservations, newest first. Staff see everyone's.
pub async fn list_reservations(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    pagination: Pagination,
) -> ApiResult<Json<Page<ReservationWithTickets>>> {
    let (reservations, count) = Reservation::list(
        &state.db.pool,
        user.owner_scope(),
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    Ok(Json(pagination.into_page(reservations, count)))
}

pub async fn get_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ReservationWithTickets>> {
    Reservation::with_tickets(&state.db.pool, id, user.owner_scope())
        .await?
        .map(Json)
        .ok_or(AppError::not_found("Reservation", id))
}

/// The body is ignored: a reservation always belongs to the caller.
pub async fn create_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<(StatusCode, Json<ReservationWithTickets>)> {
    let reservation = Reservation::create(&state.db.pool, user.user_id).await?;
    tracing::info!("Reservation {} opened by user {}", reservation.id, user.user_id);
    Ok((
        StatusCode::CREATED,
        Json(ReservationWithTickets { reservation, tickets: Vec::new() }),
    ))
}

pub async fn delete_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !Reservation::delete(&state.db.pool, id, user.owner_scope()).await? {
        return Err(AppError::not_found("Reservation", id));
    }
    tracing::info!("Reservation {} cancelled by user {}", id, user.user_id);
    // Билеты удалены каскадом, места снова свободны
    state.invalidate_performances().await;
    Ok(StatusCode::NO_CONTENT)
}
