use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    error::{ApiResult, AppError, FieldErrors},
    extractors::{Page, Pagination, ValidatedJson},
    filters,
    middleware::{AuthUser, StaffUser},
    models::play::{Link, Play, PlayDetail, PlayFilter, PlayForm, PlayListItem, PlayPatch, PlayRecord},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/plays", get(list_plays).post(create_play))
        .route(
            "/plays/{id}",
            get(get_play)
                .put(update_play)
                .patch(patch_play)
                .delete(delete_play),
        )
}

#[derive(Debug, Deserialize)]
pub struct PlaysQuery {
    pub search: Option<String>,
    pub genres: Option<String>,
    pub actors: Option<String>,
}

impl PlaysQuery {
    fn into_filter(self) -> Result<PlayFilter, AppError> {
        Ok(PlayFilter {
            title: filters::search_pattern(self.search.as_deref()),
            genres: filters::id_list("genres", self.genres.as_deref())?,
            actors: filters::id_list("actors", self.actors.as_deref())?,
        })
    }
}

/// `?genres=1,2&actors=3` keeps plays linked to any of the listed ids.
pub async fn list_plays(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    pagination: Pagination,
    Query(params): Query<PlaysQuery>,
) -> ApiResult<Json<Page<PlayListItem>>> {
    let filter = params.into_filter()?;
    let (plays, count) =
        Play::list(&state.db.pool, &filter, pagination.limit(), pagination.offset()).await?;
    Ok(Json(pagination.into_page(plays, count)))
}

pub async fn get_play(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<PlayDetail>> {
    Play::detail(&state.db.pool, id)
        .await?
        .map(Json)
        .ok_or(AppError::not_found("Play", id))
}

pub async fn create_play(
    State(state): State<Arc<AppState>>,
    StaffUser(_): StaffUser,
    ValidatedJson(form): ValidatedJson<PlayForm>,
) -> ApiResult<(StatusCode, Json<PlayRecord>)> {
    check_links(&state.db.pool, &form).await?;
    let play = Play::create(&state.db.pool, &form).await?;
    tracing::info!("Play {} '{}' created", play.id, play.title);
    Ok((StatusCode::CREATED, Json(play)))
}

pub async fn update_play(
    State(state): State<Arc<AppState>>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
    ValidatedJson(form): ValidatedJson<PlayForm>,
) -> ApiResult<Json<PlayRecord>> {
    save(&state, id, form).await.map(Json)
}

pub async fn patch_play(
    State(state): State<Arc<AppState>>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
    ValidatedJson(patch): ValidatedJson<PlayPatch>,
) -> ApiResult<Json<PlayRecord>> {
    let current = Play::record(&state.db.pool, id)
        .await?
        .ok_or(AppError::not_found("Play", id))?;
    save(&state, id, patch.merge(current)).await.map(Json)
}

pub async fn delete_play(
    State(state): State<Arc<AppState>>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !Play::delete(&state.db.pool, id).await? {
        return Err(AppError::not_found("Play", id));
    }
    // Удаление каскадом снимает спектакли с расписания
    state.invalidate_performances().await;
    Ok(StatusCode::NO_CONTENT)
}

async fn save(state: &AppState, id: i64, form: PlayForm) -> ApiResult<PlayRecord> {
    check_links(&state.db.pool, &form).await?;
    let play = Play::update(&state.db.pool, id, &form)
        .await?
        .ok_or(AppError::not_found("Play", id))?;
    state.invalidate_performances().await;
    Ok(play)
}

/// Every actor and genre id must reference an existing row.
async fn check_links(pool: &PgPool, form: &PlayForm) -> ApiResult<()> {
    let mut errors = FieldErrors::new();
    for (link, ids) in [(Link::Actors, &form.actors), (Link::Genres, &form.genres)] {
        let missing = Play::missing_links(pool, link, ids).await?;
        if !missing.is_empty() {
            errors.insert(
                link.field().to_string(),
                missing
                    .iter()
                    .map(|id| format!("Invalid pk \"{id}\" - object does not exist."))
                    .collect(),
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_builds_filter() {
        let filter = PlaysQuery {
            search: Some("ham".to_string()),
            genres: Some("1,2".to_string()),
            actors: None,
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.title.as_deref(), Some("%ham%"));
        assert_eq!(filter.genres, Some(vec![1, 2]));
        assert_eq!(filter.actors, None);
    }

    #[test]
    fn non_integer_ids_are_rejected() {
        let result = PlaysQuery { search: None, genres: None, actors: Some("a".to_string()) }
            .into_filter();
        assert!(matches!(result, Err(AppError::Validation(errors)) if errors.contains_key("actors")));
    }
}
