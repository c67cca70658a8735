use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use validator::Validate;

use super::{group_by, PerformanceListItem, Reservation};

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub row: i32,
    pub seat: i32,
    #[serde(rename = "performance")]
    pub performance_id: i64,
    #[serde(rename = "reservation")]
    pub reservation_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketDetail {
    pub id: i64,
    pub row: i32,
    pub seat: i32,
    pub performance: PerformanceListItem,
    pub reservation: Reservation,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TicketForm {
    pub row: i32,
    pub seat: i32,
    pub performance: i64,
    pub reservation: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TicketPatch {
    pub row: Option<i32>,
    pub seat: Option<i32>,
    pub performance: Option<i64>,
    pub reservation: Option<i64>,
}

impl TicketPatch {
    pub fn merge(self, current: Ticket) -> TicketForm {
        TicketForm {
            row: self.row.unwrap_or(current.row),
            seat: self.seat.unwrap_or(current.seat),
            performance: self.performance.unwrap_or(current.performance_id),
            reservation: self.reservation.unwrap_or(current.reservation_id),
        }
    }
}

/// Visibility follows the reservation: `owner = None` sees every ticket.
impl Ticket {
    pub async fn list(
        pool: &PgPool,
        owner: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Ticket>, i64), sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tickets t
             JOIN reservations r ON r.id = t.reservation_id
             WHERE ($1::bigint IS NULL OR r.user_id = $1)",
        )
        .bind(owner)
        .fetch_one(pool)
        .await?;

        let tickets = sqlx::query_as::<_, Ticket>(
            "SELECT t.id, t.row, t.seat, t.performance_id, t.reservation_id
             FROM tickets t
             JOIN reservations r ON r.id = t.reservation_id
             WHERE ($1::bigint IS NULL OR r.user_id = $1)
             ORDER BY t.id
             LIMIT $2 OFFSET $3",
        )
        .bind(owner)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok((tickets, count))
    }

    pub async fn find(
        pool: &PgPool,
        id: i64,
        owner: Option<i64>,
    ) -> Result<Option<Ticket>, sqlx::Error> {
        sqlx::query_as::<_, Ticket>(
            "SELECT t.id, t.row, t.seat, t.performance_id, t.reservation_id
             FROM tickets t
             JOIN reservations r ON r.id = t.reservation_id
             WHERE t.id = $1 AND ($2::bigint IS NULL OR r.user_id = $2)",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(pool)
        .await
    }

    pub async fn detail(
        pool: &PgPool,
        id: i64,
        owner: Option<i64>,
    ) -> Result<Option<TicketDetail>, sqlx::Error> {
        let Some(ticket) = Self::find(pool, id, owner).await? else {
            return Ok(None);
        };
        let Some(performance) =
            super::Performance::list_item(pool, ticket.performance_id).await?
        else {
            return Ok(None);
        };
        let Some(reservation) = Reservation::find(pool, ticket.reservation_id, None).await? else {
            return Ok(None);
        };
        Ok(Some(TicketDetail {
            id: ticket.id,
            row: ticket.row,
            seat: ticket.seat,
            performance,
            reservation,
        }))
    }

    pub async fn for_reservations(
        pool: &PgPool,
        reservation_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<Ticket>>, sqlx::Error> {
        if reservation_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let tickets = sqlx::query_as::<_, Ticket>(
            "SELECT t.id, t.row, t.seat, t.performance_id, t.reservation_id
             FROM tickets t
             WHERE t.reservation_id = ANY($1)
             ORDER BY t.id",
        )
        .bind(reservation_ids)
        .fetch_all(pool)
        .await?;
        Ok(group_by(tickets, |t| t.reservation_id, |t| t))
    }

    pub async fn create(pool: &PgPool, form: &TicketForm) -> Result<Ticket, sqlx::Error> {
        sqlx::query_as::<_, Ticket>(
            "INSERT INTO tickets (row, seat, performance_id, reservation_id)
             VALUES ($1, $2, $3, $4)
             RETURNING id, row, seat, performance_id, reservation_id",
        )
        .bind(form.row)
        .bind(form.seat)
        .bind(form.performance)
        .bind(form.reservation)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: i64,
        form: &TicketForm,
    ) -> Result<Option<Ticket>, sqlx::Error> {
        sqlx::query_as::<_, Ticket>(
            "UPDATE tickets SET row = $2, seat = $3, performance_id = $4, reservation_id = $5
             WHERE id = $1
             RETURNING id, row, seat, performance_id, reservation_id",
        )
        .bind(id)
        .bind(form.row)
        .bind(form.seat)
        .bind(form.performance)
        .bind(form.reservation)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query("DELETE FROM tickets WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map(|r| r.rows_affected() > 0)
    }
}
