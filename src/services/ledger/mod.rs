//! Seat ledger: the only writer of showtime seat maps.
//!
//! Commits and releases on one showtime are serialized twice over: an
//! in-process lock keyed by showtime id covers the read-check-write
//! sequence, and every store write is conditional on the seat map's row
//! version so other processes sharing the database cannot slip a write in
//! between. A lost conditional write is retried from a fresh read, a bounded
//! number of times.

mod error;
mod validate;

pub use error::LedgerError;
pub use validate::{check_availability, validate_seat_codes};

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::LedgerConfig;
use crate::models::{NewReservation, ReleaseMode, Reservation, ReservationStatus};
use crate::services::locks::{ShowtimeGuard, ShowtimeLocks};
use crate::store::{LedgerStore, SeatMapWrite, StoreError};

#[derive(Debug, Clone)]
pub struct LedgerSettings {
    /// Attempts per commit or release before a lost race is reported.
    pub max_attempts: u32,
    pub lock_timeout: Duration,
    /// Base pause between attempts, multiplied by the attempt number.
    pub retry_backoff: Duration,
    pub release_mode: ReleaseMode,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            lock_timeout: Duration::from_secs(2),
            retry_backoff: Duration::from_millis(10),
            release_mode: ReleaseMode::Cancel,
        }
    }
}

impl From<&LedgerConfig> for LedgerSettings {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            lock_timeout: Duration::from_millis(config.lock_timeout_ms),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            release_mode: config.release_mode,
        }
    }
}

#[derive(Clone)]
pub struct SeatLedger {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    locks: ShowtimeLocks,
    settings: LedgerSettings,
}

impl SeatLedger {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, settings: LedgerSettings) -> Self {
        Self {
            store,
            clock,
            locks: ShowtimeLocks::new(),
            settings,
        }
    }

    /// Books `codes` on the showtime for the user.
    ///
    /// Validation and availability are checked against a fresh read taken
    /// under the showtime lock; the seat map and the new reservation are
    /// then persisted as one unit.
    pub async fn commit_reservation<S: AsRef<str>>(
        &self,
        showtime_id: i64,
        user_id: i64,
        codes: &[S],
    ) -> Result<Reservation, LedgerError> {
        if codes.is_empty() {
            return Err(LedgerError::EmptySelection);
        }

        let _guard = self.lock(showtime_id).await?;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let showtime = self
                .store
                .get_showtime(showtime_id)
                .await
                .map_err(|e| storage("commit", showtime_id, e))?;
            let seats = validate_seat_codes(codes, showtime.seat_map.grid)?;

            if let Err(unavailable) = check_availability(&showtime, &seats) {
                info!("showtime {}: {} for user {}", showtime_id, unavailable, user_id);
                return Err(unavailable);
            }

            let write = SeatMapWrite::replacing(&showtime, showtime.seat_map.with_occupied(&seats));
            let new = NewReservation {
                user_id,
                showtime_id,
                total_price: showtime.total_price(seats.len()),
                seats,
                created_at: self.clock.now(),
            };

            match self.store.commit_booking(write, new).await {
                Ok(reservation) => {
                    info!(
                        "reservation {} committed: showtime {}, user {}, seats {:?}, total {}",
                        reservation.id,
                        showtime_id,
                        user_id,
                        reservation.seats.iter().map(ToString::to_string).collect::<Vec<_>>(),
                        reservation.total_price
                    );
                    return Ok(reservation);
                }
                Err(StoreError::Conflict { .. }) if attempt < self.settings.max_attempts => {
                    warn!("commit on showtime {} lost a concurrent write, attempt {}", showtime_id, attempt);
                    self.back_off(attempt).await;
                }
                Err(StoreError::Conflict { .. }) => {
                    warn!("commit on showtime {} gave up after {} attempts", showtime_id, attempt);
                    return Err(LedgerError::Conflict { showtime_id });
                }
                Err(e) => return Err(storage("commit", showtime_id, e)),
            }
        }
    }

    /// Frees the reservation's seats and retires it.
    ///
    /// Seats that are no longer occupied are skipped. If the showtime is
    /// gone only the reservation is retired. Releasing a reservation that
    /// is already cancelled returns it unchanged; in delete mode the record
    /// is gone, so a repeated release reports `NotFound`.
    pub async fn release_reservation(&self, reservation_id: i64) -> Result<Reservation, LedgerError> {
        let located = self
            .store
            .get_reservation(reservation_id)
            .await
            .map_err(|e| storage("release", reservation_id, e))?;
        let showtime_id = located.showtime_id;

        let _guard = self.lock(showtime_id).await?;
        let mut attempt = 0;

        loop {
            attempt += 1;

            // re-read under the lock; a concurrent release may have won
            let reservation = self
                .store
                .get_reservation(reservation_id)
                .await
                .map_err(|e| storage("release", reservation_id, e))?;
            if reservation.status == ReservationStatus::Cancelled {
                debug!("reservation {} already released", reservation_id);
                return Ok(reservation);
            }

            let write = match self.store.get_showtime(showtime_id).await {
                Ok(showtime) => Some(SeatMapWrite::replacing(
                    &showtime,
                    showtime.seat_map.without(&reservation.seats),
                )),
                Err(StoreError::NotFound { .. }) => {
                    warn!(
                        "showtime {} no longer exists, retiring reservation {} without seat release",
                        showtime_id, reservation_id
                    );
                    None
                }
                Err(e) => return Err(storage("release", reservation_id, e)),
            };

            match self
                .store
                .release_booking(write, reservation_id, self.settings.release_mode)
                .await
            {
                Ok(released) => {
                    info!(
                        "reservation {} released ({:?}): showtime {}, {} seats freed",
                        reservation_id,
                        self.settings.release_mode,
                        showtime_id,
                        released.seats.len()
                    );
                    return Ok(released);
                }
                Err(StoreError::Conflict { .. }) if attempt < self.settings.max_attempts => {
                    warn!("release of reservation {} lost a concurrent write, attempt {}", reservation_id, attempt);
                    self.back_off(attempt).await;
                }
                Err(StoreError::Conflict { .. }) => {
                    warn!("release of reservation {} gave up after {} attempts", reservation_id, attempt);
                    return Err(LedgerError::Conflict { showtime_id });
                }
                Err(e) => return Err(storage("release", reservation_id, e)),
            }
        }
    }

    async fn lock(&self, showtime_id: i64) -> Result<ShowtimeGuard, LedgerError> {
        self.locks
            .acquire(showtime_id, self.settings.lock_timeout)
            .await
            .map_err(|timeout| {
                warn!("{}", timeout);
                LedgerError::Conflict { showtime_id }
            })
    }

    async fn back_off(&self, attempt: u32) {
        tokio::time::sleep(self.settings.retry_backoff * attempt).await;
    }
}

fn storage(operation: &str, id: i64, err: StoreError) -> LedgerError {
    if !matches!(err, StoreError::NotFound { .. } | StoreError::Conflict { .. }) {
        error!("{} {}: {}", operation, id, err);
    }
    LedgerError::from(err)
}
