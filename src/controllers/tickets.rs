use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::{
    error::{ApiResult, AppError},
    extractors::{Page, Pagination, ValidatedJson},
    middleware::AuthUser,
    models::{
        ticket::{Ticket, TicketDetail, TicketForm, TicketPatch},
        Performance, Reservation,
    },
    services::seating,
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tickets", get(list_tickets).post(create_ticket))
        .route(
            "/tickets/{id}",
            get(get_ticket)
                .put(update_ticket)
                .patch(patch_ticket)
                .delete(delete_ticket),
        )
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    pagination: Pagination,
) -> ApiResult<Json<Page<Ticket>>> {
    let (tickets, count) = Ticket::list(
        &state.db.pool,
        user.owner_scope(),
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    Ok(Json(pagination.into_page(tickets, count)))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<TicketDetail>> {
    Ticket::detail(&state.db.pool, id, user.owner_scope())
        .await?
        .map(Json)
        .ok_or(AppError::not_found("Ticket", id))
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidatedJson(form): ValidatedJson<TicketForm>,
) -> ApiResult<(StatusCode, Json<Ticket>)> {
    check(&state, &user, &form).await?;

    // Дубликат места ловит уникальный индекс (performance, row, seat)
    let ticket = Ticket::create(&state.db.pool, &form).await?;
    tracing::info!(
        "Ticket {} issued: performance={} row={} seat={} reservation={}",
        ticket.id,
        ticket.performance_id,
        ticket.row,
        ticket.seat,
        ticket.reservation_id
    );
    state.invalidate_performances().await;
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(form): ValidatedJson<TicketForm>,
) -> ApiResult<Json<Ticket>> {
    Ticket::find(&state.db.pool, id, user.owner_scope())
        .await?
        .ok_or(AppError::not_found("Ticket", id))?;
    save(&state, &user, id, form).await.map(Json)
}

pub async fn patch_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(patch): ValidatedJson<TicketPatch>,
) -> ApiResult<Json<Ticket>> {
    let current = Ticket::find(&state.db.pool, id, user.owner_scope())
        .await?
        .ok_or(AppError::not_found("Ticket", id))?;
    save(&state, &user, id, patch.merge(current)).await.map(Json)
}

pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    Ticket::find(&state.db.pool, id, user.owner_scope())
        .await?
        .ok_or(AppError::not_found("Ticket", id))?;
    if !Ticket::delete(&state.db.pool, id).await? {
        return Err(AppError::not_found("Ticket", id));
    }
    state.invalidate_performances().await;
    Ok(StatusCode::NO_CONTENT)
}

async fn save(state: &AppState, user: &AuthUser, id: i64, form: TicketForm) -> ApiResult<Ticket> {
    check(state, user, &form).await?;
    let ticket = Ticket::update(&state.db.pool, id, &form)
        .await?
        .ok_or(AppError::not_found("Ticket", id))?;
    state.invalidate_performances().await;
    Ok(ticket)
}

/// Target reservation must be the caller's, and the seat must exist in
/// the performance's hall.
async fn check(state: &AppState, user: &AuthUser, form: &TicketForm) -> ApiResult<()> {
    let reservation = Reservation::find(&state.db.pool, form.reservation, None)
        .await?
        .ok_or_else(|| does_not_exist("reservation", form.reservation))?;
    user.ensure_can_act_for(reservation.user_id)?;

    let layout = Performance::hall_layout(&state.db.pool, form.performance)
        .await?
        .ok_or_else(|| does_not_exist("performance", form.performance))?;
    seating::validate_seat(form.row, form.seat, layout)
}

fn does_not_exist(field: &str, id: i64) -> AppError {
    AppError::field(field, format!("Invalid pk \"{id}\" - object does not exist."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_relation_is_reported_on_its_field() {
        match does_not_exist("performance", 12) {
            AppError::Validation(errors) => assert_eq!(
                errors["performance"],
                vec!["Invalid pk \"12\" - object does not exist.".to_string()]
            ),
            other => panic!("unexpected {other:?}"),
        }
    }
}
