use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::Validate;

use super::{PlayDetail, TheatreHall};
use crate::services::seating::{self, HallLayout};

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Performance {
    pub id: i64,
    #[serde(rename = "play")]
    pub play_id: i64,
    #[serde(rename = "theatre_hall")]
    pub theatre_hall_id: i64,
    pub show_time: DateTime<Utc>,
}

/// Row of the schedule: names instead of ids, plus seats left.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PerformanceListItem {
    pub id: i64,
    pub play: String,
    pub theatre_hall: String,
    pub show_time: DateTime<Utc>,
    pub tickets_available: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct TakenSeat {
    pub row: i32,
    pub seat: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceDetail {
    pub id: i64,
    pub play: PlayDetail,
    pub theatre_hall: TheatreHall,
    pub show_time: DateTime<Utc>,
    pub taken_seats: Vec<TakenSeat>,
    pub tickets_available: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PerformanceForm {
    pub play: i64,
    pub theatre_hall: i64,
    pub show_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PerformancePatch {
    pub play: Option<i64>,
    pub theatre_hall: Option<i64>,
    pub show_time: Option<DateTime<Utc>>,
}

impl PerformancePatch {
    pub fn merge(self, current: Performance) -> PerformanceForm {
        PerformanceForm {
            play: self.play.unwrap_or(current.play_id),
            theatre_hall: self.theatre_hall.unwrap_or(current.theatre_hall_id),
            show_time: self.show_time.unwrap_or(current.show_time),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct PerformanceFilter {
    pub play: Option<i64>,
    pub hall: Option<i64>,
    pub day: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl PerformanceFilter {
    /// Stable description of the filter, used in cache keys.
    pub fn cache_fragment(&self) -> String {
        let fmt = |v: Option<i64>| v.map(|id| id.to_string()).unwrap_or_default();
        let day = self
            .day
            .map(|(start, _)| start.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        format!("play={}&hall={}&date={}", fmt(self.play), fmt(self.hall), day)
    }
}

#[derive(FromRow)]
struct HallLayoutRow {
    rows: i32,
    seats_in_row: i32,
}

impl Performance {
    /// `tickets_available` is derived per row: hall capacity minus issued tickets.
    pub async fn list(
        pool: &PgPool,
        filter: &PerformanceFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PerformanceListItem>, i64), sqlx::Error> {
        let (day_start, day_end) = filter.day.unzip();
        const WHERE: &str = "
            WHERE ($1::bigint IS NULL OR p.play_id = $1)
              AND ($2::bigint IS NULL OR p.theatre_hall_id = $2)
              AND ($3::timestamptz IS NULL OR p.show_time >= $3)
              AND ($4::timestamptz IS NULL OR p.show_time < $4)";

        let count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM performances p {WHERE}"))
                .bind(filter.play)
                .bind(filter.hall)
                .bind(day_start)
                .bind(day_end)
                .fetch_one(pool)
                .await?;

        let items = sqlx::query_as::<_, PerformanceListItem>(&format!(
            "SELECT p.id,
                    pl.title AS play,
                    h.name AS theatre_hall,
                    p.show_time,
                    (h.rows::bigint * h.seats_in_row::bigint
                        - (SELECT COUNT(*) FROM tickets t WHERE t.performance_id = p.id))
                        AS tickets_available
             FROM performances p
             JOIN plays pl ON pl.id = p.play_id
             JOIN theatre_halls h ON h.id = p.theatre_hall_id
             {WHERE}
             ORDER BY p.id
             LIMIT $5 OFFSET $6"
        ))
        .bind(filter.play)
        .bind(filter.hall)
        .bind(day_start)
        .bind(day_end)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok((items, count))
    }

    pub async fn list_item(
        pool: &PgPool,
        id: i64,
    ) -> Result<Option<PerformanceListItem>, sqlx::Error> {
        sqlx::query_as::<_, PerformanceListItem>(
            "SELECT p.id,
                    pl.title AS play,
                    h.name AS theatre_hall,
                    p.show_time,
                    (h.rows::bigint * h.seats_in_row::bigint
                        - (SELECT COUNT(*) FROM tickets t WHERE t.performance_id = p.id))
                        AS tickets_available
             FROM performances p
             JOIN plays pl ON pl.id = p.play_id
             JOIN theatre_halls h ON h.id = p.theatre_hall_id
             WHERE p.id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find(pool: &PgPool, id: i64) -> Result<Option<Performance>, sqlx::Error> {
        sqlx::query_as::<_, Performance>(
            "SELECT id, play_id, theatre_hall_id, show_time FROM performances WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn detail(
        pool: &PgPool,
        id: i64,
    ) -> Result<Option<PerformanceDetail>, sqlx::Error> {
        let Some(performance) = Self::find(pool, id).await? else {
            return Ok(None);
        };
        let Some(play) = super::Play::detail(pool, performance.play_id).await? else {
            return Ok(None);
        };
        let Some(hall) = TheatreHall::find(pool, performance.theatre_hall_id).await? else {
            return Ok(None);
        };

        let taken_seats = sqlx::query_as::<_, TakenSeat>(
            "SELECT t.row, t.seat FROM tickets t WHERE t.performance_id = $1 ORDER BY t.row, t.seat",
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        let tickets_available = seating::tickets_available(hall.layout(), taken_seats.len() as i64);
        Ok(Some(PerformanceDetail {
            id: performance.id,
            play,
            theatre_hall: hall,
            show_time: performance.show_time,
            taken_seats,
            tickets_available,
        }))
    }

    /// Dimensions of the hall the performance is staged in.
    pub async fn hall_layout(pool: &PgPool, id: i64) -> Result<Option<HallLayout>, sqlx::Error> {
        let row = sqlx::query_as::<_, HallLayoutRow>(
            "SELECT h.rows, h.seats_in_row
             FROM performances p
             JOIN theatre_halls h ON h.id = p.theatre_hall_id
             WHERE p.id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|r| HallLayout { rows: r.rows, seats_in_row: r.seats_in_row }))
    }

    /// Tickets of this performance that would not fit into `layout`.
    pub async fn tickets_outside(
        pool: &PgPool,
        id: i64,
        layout: HallLayout,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM tickets t
             WHERE t.performance_id = $1 AND (t.row > $2 OR t.seat > $3)",
        )
        .bind(id)
        .bind(layout.rows)
        .bind(layout.seats_in_row)
        .fetch_one(pool)
        .await
    }

    pub async fn create(pool: &PgPool, form: &PerformanceForm) -> Result<Performance, sqlx::Error> {
        sqlx::query_as::<_, Performance>(
            "INSERT INTO performances (play_id, theatre_hall_id, show_time) VALUES ($1, $2, $3)
             RETURNING id, play_id, theatre_hall_id, show_time",
        )
        .bind(form.play)
        .bind(form.theatre_hall)
        .bind(form.show_time)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: i64,
        form: &PerformanceForm,
    ) -> Result<Option<Performance>, sqlx::Error> {
        sqlx::query_as::<_, Performance>(
            "UPDATE performances SET play_id = $2, theatre_hall_id = $3, show_time = $4
             WHERE id = $1
             RETURNING id, play_id, theatre_hall_id, show_time",
        )
        .bind(id)
        .bind(form.play)
        .bind(form.theatre_hall)
        .bind(form.show_time)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query("DELETE FROM performances WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map(|r| r.rows_affected() > 0)
    }
}
