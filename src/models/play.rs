use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use std::collections::HashMap;
use validator::Validate;

use super::{group_by, Actor, Genre};

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Play {
    pub id: i64,
    pub title: String,
    pub description: String,
}

/// Play as written by clients: related objects by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub actors: Vec<i64>,
    pub genres: Vec<i64>,
}

/// Play in list responses: actors by full name, genres by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayListItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub actors: Vec<String>,
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayDetail {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub actors: Vec<Actor>,
    pub genres: Vec<Genre>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PlayForm {
    #[serde(deserialize_with = "super::trimmed")]
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub actors: Vec<i64>,
    #[serde(default)]
    pub genres: Vec<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PlayPatch {
    #[serde(default, deserialize_with = "super::trimmed_opt")]
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub actors: Option<Vec<i64>>,
    pub genres: Option<Vec<i64>>,
}

impl PlayPatch {
    pub fn merge(self, current: PlayRecord) -> PlayForm {
        PlayForm {
            title: self.title.unwrap_or(current.title),
            description: self.description.unwrap_or(current.description),
            actors: self.actors.unwrap_or(current.actors),
            genres: self.genres.unwrap_or(current.genres),
        }
    }
}

#[derive(Debug, Default)]
pub struct PlayFilter {
    pub title: Option<String>,
    pub genres: Option<Vec<i64>>,
    pub actors: Option<Vec<i64>>,
}

#[derive(FromRow)]
struct CastRow {
    play_id: i64,
    #[sqlx(flatten)]
    actor: Actor,
}

#[derive(FromRow)]
struct GenreRow {
    play_id: i64,
    #[sqlx(flatten)]
    genre: Genre,
}

/// Which M2M link table a set of ids belongs to.
#[derive(Debug, Clone, Copy)]
pub enum Link {
    Actors,
    Genres,
}

impl Link {
    pub fn field(self) -> &'static str {
        match self {
            Link::Actors => "actors",
            Link::Genres => "genres",
        }
    }
}

impl Play {
    pub async fn list(
        pool: &PgPool,
        filter: &PlayFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PlayListItem>, i64), sqlx::Error> {
        // EXISTS вместо JOIN - без дублей, когда совпало несколько id
        const WHERE: &str = "
            WHERE ($1::text IS NULL OR p.title ILIKE $1)
              AND ($2::bigint[] IS NULL OR EXISTS (
                    SELECT 1 FROM play_genres pg
                    WHERE pg.play_id = p.id AND pg.genre_id = ANY($2)))
              AND ($3::bigint[] IS NULL OR EXISTS (
                    SELECT 1 FROM play_actors pa
                    WHERE pa.play_id = p.id AND pa.actor_id = ANY($3)))";

        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM plays p {WHERE}"))
            .bind(filter.title.as_deref())
            .bind(filter.genres.as_deref())
            .bind(filter.actors.as_deref())
            .fetch_one(pool)
            .await?;

        let plays = sqlx::query_as::<_, Play>(&format!(
            "SELECT p.id, p.title, p.description FROM plays p {WHERE}
             ORDER BY p.id LIMIT $4 OFFSET $5"
        ))
        .bind(filter.title.as_deref())
        .bind(filter.genres.as_deref())
        .bind(filter.actors.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let ids: Vec<i64> = plays.iter().map(|p| p.id).collect();
        let mut cast = Self::cast_of(pool, &ids).await?;
        let mut genres = Self::genres_of(pool, &ids).await?;

        let items = plays
            .into_iter()
            .map(|play| PlayListItem {
                actors: cast
                    .remove(&play.id)
                    .unwrap_or_default()
                    .iter()
                    .map(Actor::full_name)
                    .collect(),
                genres: genres
                    .remove(&play.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|g| g.name)
                    .collect(),
                id: play.id,
                title: play.title,
                description: play.description,
            })
            .collect();

        Ok((items, count))
    }

    pub async fn find(pool: &PgPool, id: i64) -> Result<Option<Play>, sqlx::Error> {
        sqlx::query_as::<_, Play>("SELECT id, title, description FROM plays WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn detail(pool: &PgPool, id: i64) -> Result<Option<PlayDetail>, sqlx::Error> {
        let Some(play) = Self::find(pool, id).await? else {
            return Ok(None);
        };
        let actors = Self::cast_of(pool, &[id]).await?.remove(&id).unwrap_or_default();
        let genres = Self::genres_of(pool, &[id]).await?.remove(&id).unwrap_or_default();
        Ok(Some(PlayDetail {
            id: play.id,
            title: play.title,
            description: play.description,
            actors,
            genres,
        }))
    }

    pub async fn record(pool: &PgPool, id: i64) -> Result<Option<PlayRecord>, sqlx::Error> {
        Ok(Self::detail(pool, id).await?.map(|d| PlayRecord {
            id: d.id,
            title: d.title,
            description: d.description,
            actors: d.actors.into_iter().map(|a| a.id).collect(),
            genres: d.genres.into_iter().map(|g| g.id).collect(),
        }))
    }

    /// Inserts the play and its links in one transaction.
    pub async fn create(pool: &PgPool, form: &PlayForm) -> Result<PlayRecord, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let play = sqlx::query_as::<_, Play>(
            "INSERT INTO plays (title, description) VALUES ($1, $2)
             RETURNING id, title, description",
        )
        .bind(&form.title)
        .bind(&form.description)
        .fetch_one(&mut *tx)
        .await?;

        let actors = replace_links(&mut *tx, Link::Actors, play.id, &form.actors).await?;
        let genres = replace_links(&mut *tx, Link::Genres, play.id, &form.genres).await?;
        tx.commit().await?;

        Ok(PlayRecord {
            id: play.id,
            title: play.title,
            description: play.description,
            actors,
            genres,
        })
    }

    pub async fn update(
        pool: &PgPool,
        id: i64,
        form: &PlayForm,
    ) -> Result<Option<PlayRecord>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let Some(play) = sqlx::query_as::<_, Play>(
            "UPDATE plays SET title = $2, description = $3 WHERE id = $1
             RETURNING id, title, description",
        )
        .bind(id)
        .bind(&form.title)
        .bind(&form.description)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        let actors = replace_links(&mut *tx, Link::Actors, id, &form.actors).await?;
        let genres = replace_links(&mut *tx, Link::Genres, id, &form.genres).await?;
        tx.commit().await?;

        Ok(Some(PlayRecord {
            id: play.id,
            title: play.title,
            description: play.description,
            actors,
            genres,
        }))
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query("DELETE FROM plays WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map(|r| r.rows_affected() > 0)
    }

    /// Ids from `ids` that have no row in the linked table.
    pub async fn missing_links(
        pool: &PgPool,
        link: Link,
        ids: &[i64],
    ) -> Result<Vec<i64>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let table = match link {
            Link::Actors => "actors",
            Link::Genres => "genres",
        };
        sqlx::query_scalar(&format!(
            "SELECT wanted FROM UNNEST($1::bigint[]) AS wanted
             WHERE NOT EXISTS (SELECT 1 FROM {table} t WHERE t.id = wanted)
             ORDER BY wanted"
        ))
        .bind(ids)
        .fetch_all(pool)
        .await
    }

    async fn cast_of(
        pool: &PgPool,
        play_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<Actor>>, sqlx::Error> {
        let rows = sqlx::query_as::<_, CastRow>(
            "SELECT pa.play_id, a.id, a.first_name, a.last_name
             FROM play_actors pa
             JOIN actors a ON a.id = pa.actor_id
             WHERE pa.play_id = ANY($1)
             ORDER BY a.id",
        )
        .bind(play_ids)
        .fetch_all(pool)
        .await?;

        Ok(group_by(rows, |r| r.play_id, |r| r.actor))
    }

    async fn genres_of(
        pool: &PgPool,
        play_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<Genre>>, sqlx::Error> {
        let rows = sqlx::query_as::<_, GenreRow>(
            "SELECT pg.play_id, g.id, g.name
             FROM play_genres pg
             JOIN genres g ON g.id = pg.genre_id
             WHERE pg.play_id = ANY($1)
             ORDER BY g.id",
        )
        .bind(play_ids)
        .fetch_all(pool)
        .await?;

        Ok(group_by(rows, |r| r.play_id, |r| r.genre))
    }
}

/// Sorted, duplicate-free copy of a client-supplied id list.
pub fn dedup_ids(ids: &[i64]) -> Vec<i64> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

async fn replace_links(
    conn: &mut PgConnection,
    link: Link,
    play_id: i64,
    ids: &[i64],
) -> Result<Vec<i64>, sqlx::Error> {
    let (delete, insert) = match link {
        Link::Actors => (
            "DELETE FROM play_actors WHERE play_id = $1",
            "INSERT INTO play_actors (play_id, actor_id) SELECT $1, UNNEST($2::bigint[])",
        ),
        Link::Genres => (
            "DELETE FROM play_genres WHERE play_id = $1",
            "INSERT INTO play_genres (play_id, genre_id) SELECT $1, UNNEST($2::bigint[])",
        ),
    };

    let ids = dedup_ids(ids);
    sqlx::query(delete).bind(play_id).execute(&mut *conn).await?;
    if !ids.is_empty() {
        sqlx::query(insert)
            .bind(play_id)
            .bind(&ids)
            .execute(&mut *conn)
            .await?;
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_sorts_and_removes_repeats() {
        assert_eq!(dedup_ids(&[3, 1, 3, 2, 1]), vec![1, 2, 3]);
        assert!(dedup_ids(&[]).is_empty());
    }

    #[test]
    fn blank_title_is_rejected() {
        let form: PlayForm = serde_json::from_str(r#"{"title": "  "}"#).unwrap();
        assert!(form.validate().is_err());
        let patch: PlayPatch = serde_json::from_str(r#"{"description": "New"}"#).unwrap();
        assert_eq!(patch.title, None);
        assert!(patch.validate().is_ok());
    }

    #[test]
    fn patch_replaces_only_given_relations() {
        let current = PlayRecord {
            id: 5,
            title: "Hamlet".to_string(),
            description: "A tragedy".to_string(),
            actors: vec![1, 2],
            genres: vec![3],
        };
        let form = PlayPatch { genres: Some(vec![]), ..Default::default() }.merge(current);
        assert_eq!(form.title, "Hamlet");
        assert_eq!(form.actors, vec![1, 2]);
        assert!(form.genres.is_empty());
    }
}
