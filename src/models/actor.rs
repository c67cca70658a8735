use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

impl Actor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ActorForm {
    #[serde(deserialize_with = "super::trimmed")]
    #[validate(length(min = 1, max = 255))]
    pub first_name: String,
    #[serde(deserialize_with = "super::trimmed")]
    #[validate(length(min = 1, max = 255))]
    pub last_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ActorPatch {
    #[serde(default, deserialize_with = "super::trimmed_opt")]
    #[validate(length(min = 1, max = 255))]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "super::trimmed_opt")]
    #[validate(length(min = 1, max = 255))]
    pub last_name: Option<String>,
}

impl ActorPatch {
    pub fn merge(self, current: Actor) -> ActorForm {
        ActorForm {
            first_name: self.first_name.unwrap_or(current.first_name),
            last_name: self.last_name.unwrap_or(current.last_name),
        }
    }
}

impl Actor {
    /// `search` matches either name part.
    pub async fn list(
        pool: &PgPool,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Actor>, i64), sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM actors
             WHERE ($1::text IS NULL OR first_name ILIKE $1 OR last_name ILIKE $1)",
        )
        .bind(search)
        .fetch_one(pool)
        .await?;

        let actors = sqlx::query_as::<_, Actor>(
            "SELECT id, first_name, last_name FROM actors
             WHERE ($1::text IS NULL OR first_name ILIKE $1 OR last_name ILIKE $1)
             ORDER BY id
             LIMIT $2 OFFSET $3",
        )
        .bind(search)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok((actors, count))
    }

    pub async fn find(pool: &PgPool, id: i64) -> Result<Option<Actor>, sqlx::Error> {
        sqlx::query_as::<_, Actor>("SELECT id, first_name, last_name FROM actors WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(pool: &PgPool, form: &ActorForm) -> Result<Actor, sqlx::Error> {
        sqlx::query_as::<_, Actor>(
            "INSERT INTO actors (first_name, last_name) VALUES ($1, $2)
             RETURNING id, first_name, last_name",
        )
        .bind(&form.first_name)
        .bind(&form.last_name)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: i64,
        form: &ActorForm,
    ) -> Result<Option<Actor>, sqlx::Error> {
        sqlx::query_as::<_, Actor>(
            "UPDATE actors SET first_name = $2, last_name = $3 WHERE id = $1
             RETURNING id, first_name, last_name",
        )
        .bind(id)
        .bind(&form.first_name)
        .bind(&form.last_name)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query("DELETE FROM actors WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map(|r| r.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::faker::name::en::{FirstName, LastName};
    use fake::Fake;

    #[test]
    fn full_name_joins_parts() {
        let first: String = FirstName().fake();
        let last: String = LastName().fake();
        let actor = Actor { id: 1, first_name: first.clone(), last_name: last.clone() };
        assert_eq!(actor.full_name(), format!("{first} {last}"));
    }

    #[test]
    fn whitespace_only_name_is_rejected() {
        let form: ActorForm =
            serde_json::from_str(r#"{"first_name": " Ian ", "last_name": "   "}"#).unwrap();
        assert_eq!(form.first_name, "Ian");
        let errors = form.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("last_name"));
        assert!(!errors.field_errors().contains_key("first_name"));
    }

    #[test]
    fn patch_keeps_untouched_fields() {
        let current = Actor {
            id: 1,
            first_name: "George".to_string(),
            last_name: "Clooney".to_string(),
        };
        let form = ActorPatch { last_name: Some("Harrison".to_string()), ..Default::default() }
            .merge(current);
        assert_eq!(form.first_name, "George");
        assert_eq!(form.last_name, "Harrison");
    }
}
