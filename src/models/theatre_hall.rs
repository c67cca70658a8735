use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::Validate;

use crate::services::seating::HallLayout;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct TheatreHall {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
}

impl TheatreHall {
    pub fn layout(&self) -> HallLayout {
        HallLayout { rows: self.rows, seats_in_row: self.seats_in_row }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TheatreHallForm {
    #[serde(deserialize_with = "super::trimmed")]
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(range(min = 1, message = "The number of rows must be greater than zero."))]
    pub rows: i32,
    #[validate(range(
        min = 1,
        message = "The number of seats per row must be greater than zero."
    ))]
    pub seats_in_row: i32,
}

impl TheatreHallForm {
    pub fn layout(&self) -> HallLayout {
        HallLayout { rows: self.rows, seats_in_row: self.seats_in_row }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TheatreHallPatch {
    #[serde(default, deserialize_with = "super::trimmed_opt")]
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(range(min = 1, message = "The number of rows must be greater than zero."))]
    pub rows: Option<i32>,
    #[validate(range(
        min = 1,
        message = "The number of seats per row must be greater than zero."
    ))]
    pub seats_in_row: Option<i32>,
}

impl TheatreHallPatch {
    pub fn merge(self, current: TheatreHall) -> TheatreHallForm {
        TheatreHallForm {
            name: self.name.unwrap_or(current.name),
            rows: self.rows.unwrap_or(current.rows),
            seats_in_row: self.seats_in_row.unwrap_or(current.seats_in_row),
        }
    }
}

impl TheatreHall {
    pub async fn list(
        pool: &PgPool,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TheatreHall>, i64), sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM theatre_halls")
            .fetch_one(pool)
            .await?;
        let halls = sqlx::query_as::<_, TheatreHall>(
            "SELECT id, name, rows, seats_in_row FROM theatre_halls
             ORDER BY id LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        Ok((halls, count))
    }

    pub async fn find(pool: &PgPool, id: i64) -> Result<Option<TheatreHall>, sqlx::Error> {
        sqlx::query_as::<_, TheatreHall>(
            "SELECT id, name, rows, seats_in_row FROM theatre_halls WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(pool: &PgPool, form: &TheatreHallForm) -> Result<TheatreHall, sqlx::Error> {
        sqlx::query_as::<_, TheatreHall>(
            "INSERT INTO theatre_halls (name, rows, seats_in_row) VALUES ($1, $2, $3)
             RETURNING id, name, rows, seats_in_row",
        )
        .bind(&form.name)
        .bind(form.rows)
        .bind(form.seats_in_row)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: i64,
        form: &TheatreHallForm,
    ) -> Result<Option<TheatreHall>, sqlx::Error> {
        sqlx::query_as::<_, TheatreHall>(
            "UPDATE theatre_halls SET name = $2, rows = $3, seats_in_row = $4 WHERE id = $1
             RETURNING id, name, rows, seats_in_row",
        )
        .bind(id)
        .bind(&form.name)
        .bind(form.rows)
        .bind(form.seats_in_row)
        .fetch_optional(pool)
        .await
    }

    /// Tickets already sold in this hall that would fall outside `layout`.
    pub async fn tickets_outside(
        pool: &PgPool,
        id: i64,
        layout: HallLayout,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM tickets t
             JOIN performances p ON p.id = t.performance_id
             WHERE p.theatre_hall_id = $1 AND (t.row > $2 OR t.seat > $3)",
        )
        .bind(id)
        .bind(layout.rows)
        .bind(layout.seats_in_row)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query("DELETE FROM theatre_halls WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map(|r| r.rows_affected() > 0)
    }
}
