use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::{LedgerStore, ReservationStore, SeatMapWrite, ShowtimeStore, StoreError};
use crate::models::{
    NewReservation, NewShowtime, ReleaseMode, Reservation, ReservationStatus, SeatMap, Showtime,
};

#[derive(Default)]
struct Tables {
    showtimes: HashMap<i64, Showtime>,
    reservations: BTreeMap<i64, Reservation>,
    last_showtime_id: i64,
    last_reservation_id: i64,
}

impl Tables {
    fn apply(&mut self, write: SeatMapWrite) -> Result<(), StoreError> {
        // a vanished showtime is reported as a lost race; the caller re-reads
        let showtime = self
            .showtimes
            .get_mut(&write.showtime_id)
            .ok_or_else(|| StoreError::showtime_conflict(write.showtime_id))?;
        if showtime.version != write.expected_version {
            return Err(StoreError::showtime_conflict(write.showtime_id));
        }
        showtime.seat_map = write.seat_map;
        showtime.version += 1;
        Ok(())
    }

    fn insert_reservation(&mut self, new: NewReservation) -> Reservation {
        self.last_reservation_id += 1;
        let reservation = new.into_confirmed(self.last_reservation_id);
        self.reservations.insert(reservation.id, reservation.clone());
        reservation
    }
}

/// Process-local store; one mutex over all tables makes every method atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_showtime(&self, new: NewShowtime) -> Showtime {
        let mut tables = self.tables.lock();
        tables.last_showtime_id += 1;
        let showtime = Showtime {
            id: tables.last_showtime_id,
            movie_id: new.movie_id,
            date: new.date,
            time: new.time,
            price: new.price,
            seat_map: SeatMap::empty(new.grid),
            version: 0,
        };
        tables.showtimes.insert(showtime.id, showtime.clone());
        showtime
    }

    pub fn remove_showtime(&self, id: i64) -> bool {
        self.tables.lock().showtimes.remove(&id).is_some()
    }
}

#[async_trait]
impl ShowtimeStore for MemoryStore {
    async fn get_showtime(&self, id: i64) -> Result<Showtime, StoreError> {
        self.tables
            .lock()
            .showtimes
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::showtime_not_found(id))
    }

    async fn save_showtime(&self, showtime: &Showtime) -> Result<Showtime, StoreError> {
        let mut tables = self.tables.lock();
        let stored = tables
            .showtimes
            .get_mut(&showtime.id)
            .ok_or_else(|| StoreError::showtime_not_found(showtime.id))?;
        if stored.version != showtime.version {
            return Err(StoreError::showtime_conflict(showtime.id));
        }
        *stored = Showtime {
            version: showtime.version + 1,
            ..showtime.clone()
        };
        Ok(stored.clone())
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn create_reservation(&self, new: NewReservation) -> Result<Reservation, StoreError> {
        Ok(self.tables.lock().insert_reservation(new))
    }

    async fn get_reservation(&self, id: i64) -> Result<Reservation, StoreError> {
        self.tables
            .lock()
            .reservations
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::reservation_not_found(id))
    }

    async fn delete_reservation(&self, id: i64) -> Result<(), StoreError> {
        self.tables
            .lock()
            .reservations
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::reservation_not_found(id))
    }

    async fn list_reservations_for_user(&self, user_id: i64) -> Result<Vec<Reservation>, StoreError> {
        let tables = self.tables.lock();
        let mut found: Vec<Reservation> = tables
            .reservations
            .values()
            .filter(|r| r.user_id == user_id && r.is_confirmed())
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(found)
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn commit_booking(
        &self,
        write: SeatMapWrite,
        new: NewReservation,
    ) -> Result<Reservation, StoreError> {
        let mut tables = self.tables.lock();
        tables.apply(write)?;
        Ok(tables.insert_reservation(new))
    }

    async fn release_booking(
        &self,
        write: Option<SeatMapWrite>,
        reservation_id: i64,
        mode: ReleaseMode,
    ) -> Result<Reservation, StoreError> {
        let mut tables = self.tables.lock();

        let current = tables
            .reservations
            .get(&reservation_id)
            .ok_or_else(|| StoreError::reservation_not_found(reservation_id))?;
        if !current.is_confirmed() {
            return Err(StoreError::Conflict {
                entity: "reservation",
                id: reservation_id,
            });
        }

        // seat map first: a failed write must leave the reservation untouched
        if let Some(write) = write {
            tables.apply(write)?;
        }

        let released = match mode {
            ReleaseMode::Cancel => {
                let reservation = tables
                    .reservations
                    .get_mut(&reservation_id)
                    .ok_or_else(|| StoreError::reservation_not_found(reservation_id))?;
                reservation.status = ReservationStatus::Cancelled;
                reservation.clone()
            }
            ReleaseMode::Delete => {
                let mut reservation = tables
                    .reservations
                    .remove(&reservation_id)
                    .ok_or_else(|| StoreError::reservation_not_found(reservation_id))?;
                reservation.status = ReservationStatus::Cancelled;
                reservation
            }
        };
        Ok(released)
    }
}
