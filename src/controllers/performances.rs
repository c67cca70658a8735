use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    cache::performances::key_for,
    error::{ApiResult, AppError},
    extractors::{Pagination, ValidatedJson},
    filters,
    middleware::{AuthUser, StaffUser},
    models::{
        performance::{
            Performance, PerformanceDetail, PerformanceFilter, PerformanceForm, PerformancePatch,
        },
        TheatreHall,
    },
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/performances", get(list_performances).post(create_performance))
        .route(
            "/performances/{id}",
            get(get_performance)
                .put(update_performance)
                .patch(patch_performance)
                .delete(delete_performance),
        )
}

#[derive(Debug, Deserialize)]
pub struct PerformancesQuery {
    pub play: Option<String>,
    pub hall: Option<String>,
    pub date: Option<String>,
}

impl PerformancesQuery {
    fn into_filter(self) -> Result<PerformanceFilter, AppError> {
        Ok(PerformanceFilter {
            play: filters::id("play", self.play.as_deref())?,
            hall: filters::id("hall", self.hall.as_deref())?,
            day: filters::day_range("date", self.date.as_deref())?,
        })
    }
}

/// Schedule with seats left per performance. Pages are served from Redis
/// when caching is enabled.
pub async fn list_performances(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    pagination: Pagination,
    Query(params): Query<PerformancesQuery>,
) -> ApiResult<Response> {
    let filter = params.into_filter()?;

    // 1. Ключ кеша из нормализованных фильтров и окна пагинации
    let key = key_for(&[
        filter.cache_fragment().as_str(),
        pagination.cache_fragment().as_str(),
    ]);

    // 2. Пытаемся отдать из кеша
    if let Some(cache) = &state.cache {
        if let Some(body) = cache.get_performances(&key).await {
            return Ok(cached_json(body, "HIT"));
        }
    }

    // 3. Cache miss: идём в базу
    let (items, count) =
        Performance::list(&state.db.pool, &filter, pagination.limit(), pagination.offset())
            .await?;
    let page = pagination.into_page(items, count);

    let Some(cache) = &state.cache else {
        return Ok(Json(page).into_response());
    };

    // 4. Сериализуем и сохраняем в кеш
    match serde_json::to_string(&page) {
        Ok(body) => {
            cache.put_performances(&key, &body).await;
            Ok(cached_json(body, "MISS"))
        }
        Err(e) => {
            tracing::error!("Failed to serialize performance page: {:?}", e);
            Ok(Json(page).into_response())
        }
    }
}

fn cached_json(body: String, status: &'static str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::HeaderName::from_static("x-cache"), status),
        ],
        body,
    )
        .into_response()
}

pub async fn get_performance(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<PerformanceDetail>> {
    Performance::detail(&state.db.pool, id)
        .await?
        .map(Json)
        .ok_or(AppError::not_found("Performance", id))
}

pub async fn create_performance(
    State(state): State<Arc<AppState>>,
    StaffUser(_): StaffUser,
    ValidatedJson(form): ValidatedJson<PerformanceForm>,
) -> ApiResult<(StatusCode, Json<Performance>)> {
    let performance = Performance::create(&state.db.pool, &form).await?;
    tracing::info!(
        "Performance {} scheduled: play={} hall={} at {}",
        performance.id,
        performance.play_id,
        performance.theatre_hall_id,
        performance.show_time
    );
    state.invalidate_performances().await;
    Ok((StatusCode::CREATED, Json(performance)))
}

pub async fn update_performance(
    State(state): State<Arc<AppState>>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
    ValidatedJson(form): ValidatedJson<PerformanceForm>,
) -> ApiResult<Json<Performance>> {
    let current = Performance::find(&state.db.pool, id)
        .await?
        .ok_or(AppError::not_found("Performance", id))?;
    save(&state, current, form).await.map(Json)
}

pub async fn patch_performance(
    State(state): State<Arc<AppState>>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
    ValidatedJson(patch): ValidatedJson<PerformancePatch>,
) -> ApiResult<Json<Performance>> {
    let current = Performance::find(&state.db.pool, id)
        .await?
        .ok_or(AppError::not_found("Performance", id))?;
    let form = patch.merge(current.clone());
    save(&state, current, form).await.map(Json)
}

pub async fn delete_performance(
    State(state): State<Arc<AppState>>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !Performance::delete(&state.db.pool, id).await? {
        return Err(AppError::not_found("Performance", id));
    }
    state.invalidate_performances().await;
    Ok(StatusCode::NO_CONTENT)
}

async fn save(
    state: &AppState,
    current: Performance,
    form: PerformanceForm,
) -> ApiResult<Performance> {
    // Перенос в другой зал: проданные места должны в нём существовать
    if form.theatre_hall != current.theatre_hall_id {
        let hall = TheatreHall::find(&state.db.pool, form.theatre_hall)
            .await?
            .ok_or_else(|| {
                AppError::field(
                    "theatre_hall",
                    format!("Invalid pk \"{}\" - object does not exist.", form.theatre_hall),
                )
            })?;
        let stranded =
            Performance::tickets_outside(&state.db.pool, current.id, hall.layout()).await?;
        if stranded > 0 {
            return Err(AppError::field(
                "theatre_hall",
                format!("{stranded} sold ticket(s) do not fit into hall \"{}\".", hall.name),
            ));
        }
    }

    let performance = Performance::update(&state.db.pool, current.id, &form)
        .await?
        .ok_or(AppError::not_found("Performance", current.id))?;
    state.invalidate_performances().await;
    Ok(performance)
}
