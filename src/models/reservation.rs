use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use super::Ticket;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Reservation {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "user")]
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReservationWithTickets {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub tickets: Vec<Ticket>,
}

/// `owner = None` means every reservation is visible (staff).
impl Reservation {
    pub async fn list(
        pool: &PgPool,
        owner: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ReservationWithTickets>, i64), sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reservations WHERE ($1::bigint IS NULL OR user_id = $1)",
        )
        .bind(owner)
        .fetch_one(pool)
        .await?;

        let reservations = sqlx::query_as::<_, Reservation>(
            "SELECT id, created_at, user_id FROM reservations
             WHERE ($1::bigint IS NULL OR user_id = $1)
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(owner)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let ids: Vec<i64> = reservations.iter().map(|r| r.id).collect();
        let mut tickets = Ticket::for_reservations(pool, &ids).await?;
        let items = reservations
            .into_iter()
            .map(|reservation| ReservationWithTickets {
                tickets: tickets.remove(&reservation.id).unwrap_or_default(),
                reservation,
            })
            .collect();

        Ok((items, count))
    }

    pub async fn find(
        pool: &PgPool,
        id: i64,
        owner: Option<i64>,
    ) -> Result<Option<Reservation>, sqlx::Error> {
        sqlx::query_as::<_, Reservation>(
            "SELECT id, created_at, user_id FROM reservations
             WHERE id = $1 AND ($2::bigint IS NULL OR user_id = $2)",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(pool)
        .await
    }

    pub async fn with_tickets(
        pool: &PgPool,
        id: i64,
        owner: Option<i64>,
    ) -> Result<Option<ReservationWithTickets>, sqlx::Error> {
        let Some(reservation) = Self::find(pool, id, owner).await? else {
            return Ok(None);
        };
        let tickets = Ticket::for_reservations(pool, &[id])
            .await?
            .remove(&id)
            .unwrap_or_default();
        Ok(Some(ReservationWithTickets { reservation, tickets }))
    }

    pub async fn create(pool: &PgPool, user_id: i64) -> Result<Reservation, sqlx::Error> {
        sqlx::query_as::<_, Reservation>(
            "INSERT INTO reservations (user_id) VALUES ($1) RETURNING id, created_at, user_id",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i64, owner: Option<i64>) -> Result<bool, sqlx::Error> {
        sqlx::query("DELETE FROM reservations WHERE id = $1 AND ($2::bigint IS NULL OR user_id = $2)")
            .bind(id)
            .bind(owner)
            .execute(pool)
            .await
            .map(|r| r.rows_affected() > 0)
    }
}
