use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::BTreeSet;
use tracing::debug;

use super::{LedgerStore, ReservationStore, SeatMapWrite, ShowtimeStore, StoreError};
use crate::database::Database;
use crate::models::{
    Grid, NewReservation, NewShowtime, ReleaseMode, Reservation, ReservationStatus, SeatCode,
    SeatMap, Showtime, ShowtimeFilter,
};

const SHOWTIME_COLUMNS: &str =
    "id, movie_id, date, time, price, seat_rows, seats_per_row, occupied_seats, version";
const RESERVATION_COLUMNS: &str = "id, user_id, showtime_id, seats, total_price, status, created_at";

#[derive(FromRow)]
struct ShowtimeRow {
    id: i64,
    movie_id: i64,
    date: NaiveDate,
    time: NaiveTime,
    price: i64,
    seat_rows: i64,
    seats_per_row: i64,
    occupied_seats: String,
    version: i64,
}

impl TryFrom<ShowtimeRow> for Showtime {
    type Error = StoreError;

    fn try_from(row: ShowtimeRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StoreError::Corrupt {
            entity: "showtime",
            id: row.id,
            reason,
        };

        let grid = u8::try_from(row.seat_rows)
            .ok()
            .zip(u16::try_from(row.seats_per_row).ok())
            .and_then(|(rows, per_row)| Grid::new(rows, per_row))
            .ok_or_else(|| corrupt(format!("bad grid {}x{}", row.seat_rows, row.seats_per_row)))?;
        let occupied_seats: BTreeSet<SeatCode> =
            serde_json::from_str(&row.occupied_seats).map_err(|e| corrupt(e.to_string()))?;
        let seat_map = SeatMap { grid, occupied_seats };
        if !seat_map.is_consistent() {
            return Err(corrupt("occupied seat outside the grid".to_string()));
        }
        let price = u32::try_from(row.price).map_err(|e| corrupt(e.to_string()))?;

        Ok(Showtime {
            id: row.id,
            movie_id: row.movie_id,
            date: row.date,
            time: row.time,
            price,
            seat_map,
            version: row.version,
        })
    }
}

#[derive(FromRow)]
struct ReservationRow {
    id: i64,
    user_id: i64,
    showtime_id: i64,
    seats: String,
    total_price: i64,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = StoreError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StoreError::Corrupt {
            entity: "reservation",
            id: row.id,
            reason,
        };

        let seats: Vec<SeatCode> = serde_json::from_str(&row.seats).map_err(|e| corrupt(e.to_string()))?;
        let status: ReservationStatus = row.status.parse().map_err(corrupt)?;
        let total_price = u64::try_from(row.total_price).map_err(|e| corrupt(e.to_string()))?;

        Ok(Reservation {
            id: row.id,
            user_id: row.user_id,
            showtime_id: row.showtime_id,
            seats,
            total_price,
            status,
            created_at: row.created_at,
        })
    }
}

fn encode_seats<'a>(seats: impl IntoIterator<Item = &'a SeatCode>) -> String {
    let codes: Vec<String> = seats.into_iter().map(SeatCode::to_string).collect();
    // a list of plain strings always serializes
    serde_json::to_string(&codes).unwrap_or_else(|_| "[]".to_string())
}

fn to_i64(value: u64, entity: &'static str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|e| StoreError::Corrupt {
        entity,
        id: 0,
        reason: e.to_string(),
    })
}

/// Version-checked seat-map update; zero affected rows means another writer won.
async fn write_seat_map(conn: &mut SqliteConnection, write: &SeatMapWrite) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE showtimes SET occupied_seats = ?, version = version + 1 WHERE id = ? AND version = ?",
    )
    .bind(encode_seats(&write.seat_map.occupied_seats))
    .bind(write.showtime_id)
    .bind(write.expected_version)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        debug!(
            "seat map write for showtime {} at version {} lost the race",
            write.showtime_id, write.expected_version
        );
        return Err(StoreError::showtime_conflict(write.showtime_id));
    }
    Ok(())
}

async fn fetch_reservation(conn: &mut SqliteConnection, id: i64) -> Result<Reservation, StoreError> {
    sqlx::query_as::<_, ReservationRow>(&format!(
        "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| StoreError::reservation_not_found(id))
    .and_then(Reservation::try_from)
}

async fn insert_reservation(conn: &mut SqliteConnection, new: NewReservation) -> Result<Reservation, StoreError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO reservations (user_id, showtime_id, seats, total_price, status, created_at)
         VALUES (?, ?, ?, ?, 'confirmed', ?)
         RETURNING id",
    )
    .bind(new.user_id)
    .bind(new.showtime_id)
    .bind(encode_seats(&new.seats))
    .bind(to_i64(new.total_price, "reservation")?)
    .bind(new.created_at)
    .fetch_one(&mut *conn)
    .await?;

    Ok(new.into_confirmed(id))
}

/// SQLite-backed store for showtimes and reservations.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(db: &Database) -> Self {
        Self { pool: db.pool.clone() }
    }

    pub async fn create_showtime(&self, new: &NewShowtime) -> Result<Showtime, StoreError> {
        let row = sqlx::query_as::<_, ShowtimeRow>(&format!(
            "INSERT INTO showtimes (movie_id, date, time, price, seat_rows, seats_per_row, occupied_seats, version)
             VALUES (?, ?, ?, ?, ?, ?, '[]', 0)
             RETURNING {SHOWTIME_COLUMNS}"
        ))
        .bind(new.movie_id)
        .bind(new.date)
        .bind(new.time)
        .bind(i64::from(new.price))
        .bind(i64::from(new.grid.rows))
        .bind(i64::from(new.grid.seats_per_row))
        .fetch_one(&self.pool)
        .await?;

        Showtime::try_from(row)
    }

    /// Showtimes ordered by date and time, optionally narrowed to a movie or a day.
    pub async fn list_showtimes(&self, filter: &ShowtimeFilter) -> Result<Vec<Showtime>, StoreError> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {SHOWTIME_COLUMNS} FROM showtimes WHERE 1 = 1"));
        if let Some(movie_id) = filter.movie_id {
            query.push(" AND movie_id = ").push_bind(movie_id);
        }
        if let Some(date) = filter.date {
            query.push(" AND date = ").push_bind(date);
        }
        query.push(" ORDER BY date, time, id");

        query
            .build_query_as::<ShowtimeRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Showtime::try_from)
            .collect()
    }

    pub async fn delete_showtime(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM showtimes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::showtime_not_found(id));
        }
        Ok(())
    }
}

#[async_trait]
impl ShowtimeStore for SqliteStore {
    async fn get_showtime(&self, id: i64) -> Result<Showtime, StoreError> {
        sqlx::query_as::<_, ShowtimeRow>(&format!(
            "SELECT {SHOWTIME_COLUMNS} FROM showtimes WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::showtime_not_found(id))
        .and_then(Showtime::try_from)
    }

    async fn save_showtime(&self, showtime: &Showtime) -> Result<Showtime, StoreError> {
        let row = sqlx::query_as::<_, ShowtimeRow>(&format!(
            "UPDATE showtimes
             SET movie_id = ?, date = ?, time = ?, price = ?, seat_rows = ?, seats_per_row = ?,
                 occupied_seats = ?, version = version + 1
             WHERE id = ? AND version = ?
             RETURNING {SHOWTIME_COLUMNS}"
        ))
        .bind(showtime.movie_id)
        .bind(showtime.date)
        .bind(showtime.time)
        .bind(i64::from(showtime.price))
        .bind(i64::from(showtime.seat_map.grid.rows))
        .bind(i64::from(showtime.seat_map.grid.seats_per_row))
        .bind(encode_seats(&showtime.seat_map.occupied_seats))
        .bind(showtime.id)
        .bind(showtime.version)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Showtime::try_from(row),
            None => {
                // tell a missing row apart from a stale version
                self.get_showtime(showtime.id).await?;
                Err(StoreError::showtime_conflict(showtime.id))
            }
        }
    }
}

#[async_trait]
impl ReservationStore for SqliteStore {
    async fn create_reservation(&self, new: NewReservation) -> Result<Reservation, StoreError> {
        let mut conn = self.pool.acquire().await?;
        insert_reservation(&mut conn, new).await
    }

    async fn get_reservation(&self, id: i64) -> Result<Reservation, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_reservation(&mut conn, id).await
    }

    async fn delete_reservation(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM reservations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::reservation_not_found(id));
        }
        Ok(())
    }

    async fn list_reservations_for_user(&self, user_id: i64) -> Result<Vec<Reservation>, StoreError> {
        sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations
             WHERE user_id = ? AND status = 'confirmed'
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Reservation::try_from)
        .collect()
    }
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn commit_booking(
        &self,
        write: SeatMapWrite,
        new: NewReservation,
    ) -> Result<Reservation, StoreError> {
        let mut tx = self.pool.begin().await?;
        write_seat_map(&mut tx, &write).await?;
        let reservation = insert_reservation(&mut tx, new).await?;
        tx.commit().await?;
        Ok(reservation)
    }

    async fn release_booking(
        &self,
        write: Option<SeatMapWrite>,
        reservation_id: i64,
        mode: ReleaseMode,
    ) -> Result<Reservation, StoreError> {
        let mut tx = self.pool.begin().await?;

        // retire first so the transaction takes the write lock before it reads
        let statement = match mode {
            ReleaseMode::Cancel => format!(
                "UPDATE reservations SET status = 'cancelled'
                 WHERE id = ? AND status = 'confirmed'
                 RETURNING {RESERVATION_COLUMNS}"
            ),
            ReleaseMode::Delete => format!(
                "DELETE FROM reservations
                 WHERE id = ? AND status = 'confirmed'
                 RETURNING {RESERVATION_COLUMNS}"
            ),
        };
        let retired = sqlx::query_as::<_, ReservationRow>(&statement)
            .bind(reservation_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = retired else {
            // missing, or already retired by another writer
            fetch_reservation(&mut tx, reservation_id).await?;
            return Err(StoreError::Conflict {
                entity: "reservation",
                id: reservation_id,
            });
        };
        let mut reservation = Reservation::try_from(row)?;

        if let Some(write) = &write {
            write_seat_map(&mut tx, write).await?;
        }

        tx.commit().await?;
        reservation.status = ReservationStatus::Cancelled;
        Ok(reservation)
    }
}
