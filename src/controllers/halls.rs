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
    middleware::{AuthUser, StaffUser},
    models::theatre_hall::{TheatreHall, TheatreHallForm, TheatreHallPatch},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/halls", get(list_halls).post(create_hall))
        .route(
            "/halls/{id}",
            get(get_hall)
                .put(update_hall)
                .patch(patch_hall)
                .delete(delete_hall),
        )
}

pub async fn list_halls(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    pagination: Pagination,
) -> ApiResult<Json<Page<TheatreHall>>> {
    let (halls, count) =
        TheatreHall::list(&state.db.pool, pagination.limit(), pagination.offset()).await?;
    Ok(Json(pagination.into_page(halls, count)))
}

pub async fn get_hall(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<TheatreHall>> {
    TheatreHall::find(&state.db.pool, id)
        .await?
        .map(Json)
        .ok_or(AppError::not_found("Theatre hall", id))
}

pub async fn create_hall(
    State(state): State<Arc<AppState>>,
    StaffUser(_): StaffUser,
    ValidatedJson(form): ValidatedJson<TheatreHallForm>,
) -> ApiResult<(StatusCode, Json<TheatreHall>)> {
    let hall = TheatreHall::create(&state.db.pool, &form).await?;
    tracing::info!(
        "Theatre hall {} '{}' created with {} seats",
        hall.id,
        hall.name,
        hall.layout().capacity()
    );
    Ok((StatusCode::CREATED, Json(hall)))
}

pub async fn update_hall(
    State(state): State<Arc<AppState>>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
    ValidatedJson(form): ValidatedJson<TheatreHallForm>,
) -> ApiResult<Json<TheatreHall>> {
    save(&state, id, form).await.map(Json)
}

pub async fn patch_hall(
    State(state): State<Arc<AppState>>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
    ValidatedJson(patch): ValidatedJson<TheatreHallPatch>,
) -> ApiResult<Json<TheatreHall>> {
    let current = TheatreHall::find(&state.db.pool, id)
        .await?
        .ok_or(AppError::not_found("Theatre hall", id))?;
    save(&state, id, patch.merge(current)).await.map(Json)
}

pub async fn delete_hall(
    State(state): State<Arc<AppState>>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !TheatreHall::delete(&state.db.pool, id).await? {
        return Err(AppError::not_found("Theatre hall", id));
    }
    state.invalidate_performances().await;
    Ok(StatusCode::NO_CONTENT)
}

/// A hall can't shrink below seats that are already sold.
async fn save(state: &AppState, id: i64, form: TheatreHallForm) -> ApiResult<TheatreHall> {
    let stranded = TheatreHall::tickets_outside(&state.db.pool, id, form.layout()).await?;
    if stranded > 0 {
        return Err(AppError::bad_request(format!(
            "{stranded} sold ticket(s) would fall outside the new hall layout."
        )));
    }

    let hall = TheatreHall::update(&state.db.pool, id, &form)
        .await?
        .ok_or(AppError::not_found("Theatre hall", id))?;
    state.invalidate_performances().await;
    Ok(hall)
}
