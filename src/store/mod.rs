//! Persistence contracts used by the seat ledger.
//!
//! Every seat-map write is conditional on the showtime's row version: a
//! write made against a stale version fails with [`StoreError::Conflict`]
//! and leaves nothing behind. [`LedgerStore`] bundles the seat-map write
//! with the reservation write (or retirement) so both land or neither does.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{NewReservation, ReleaseMode, Reservation, SeatMap, Showtime};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{entity} {id} was modified concurrently")]
    Conflict { entity: &'static str, id: i64 },

    #[error("corrupt {entity} record {id}: {reason}")]
    Corrupt {
        entity: &'static str,
        id: i64,
        reason: String,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn showtime_not_found(id: i64) -> Self {
        StoreError::NotFound { entity: "showtime", id }
    }

    pub fn reservation_not_found(id: i64) -> Self {
        StoreError::NotFound { entity: "reservation", id }
    }

    pub fn showtime_conflict(id: i64) -> Self {
        StoreError::Conflict { entity: "showtime", id }
    }
}

/// New seat map for a showtime, valid only while the stored version still
/// equals `expected_version`.
#[derive(Debug, Clone)]
pub struct SeatMapWrite {
    pub showtime_id: i64,
    pub expected_version: i64,
    pub seat_map: SeatMap,
}

impl SeatMapWrite {
    pub fn replacing(showtime: &Showtime, seat_map: SeatMap) -> Self {
        Self {
            showtime_id: showtime.id,
            expected_version: showtime.version,
            seat_map,
        }
    }
}

#[async_trait]
pub trait ShowtimeStore: Send + Sync {
    async fn get_showtime(&self, id: i64) -> Result<Showtime, StoreError>;

    /// Writes every field of `showtime` if its `version` is still current and
    /// returns the stored record with the bumped version.
    async fn save_showtime(&self, showtime: &Showtime) -> Result<Showtime, StoreError>;
}

#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn create_reservation(&self, new: NewReservation) -> Result<Reservation, StoreError>;

    async fn get_reservation(&self, id: i64) -> Result<Reservation, StoreError>;

    async fn delete_reservation(&self, id: i64) -> Result<(), StoreError>;

    /// Confirmed reservations of a user, newest first.
    async fn list_reservations_for_user(&self, user_id: i64) -> Result<Vec<Reservation>, StoreError>;
}

#[async_trait]
pub trait LedgerStore: ShowtimeStore + ReservationStore {
    /// Applies the seat-map write and inserts the confirmed reservation in
    /// one atomic unit.
    async fn commit_booking(
        &self,
        write: SeatMapWrite,
        new: NewReservation,
    ) -> Result<Reservation, StoreError>;

    /// Applies the optional seat-map write and retires the reservation in
    /// one atomic unit. A reservation that is no longer confirmed yields
    /// `Conflict`. Returns the reservation in its cancelled state.
    async fn release_booking(
        &self,
        write: Option<SeatMapWrite>,
        reservation_id: i64,
        mode: ReleaseMode,
    ) -> Result<Reservation, StoreError>;
}
