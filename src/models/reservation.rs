use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::seat::SeatCode;

/// `Confirmed` is the only initial state and `Cancelled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            other => Err(format!("unknown reservation status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: i64,
    pub user_id: i64,
    pub showtime_id: i64,
    /// Seats in the order they were requested.
    pub seats: Vec<SeatCode>,
    pub total_price: u64,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn is_confirmed(&self) -> bool {
        self.status == ReservationStatus::Confirmed
    }
}

/// A reservation that has passed the availability check but has no id yet.
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub user_id: i64,
    pub showtime_id: i64,
    pub seats: Vec<SeatCode>,
    pub total_price: u64,
    pub created_at: DateTime<Utc>,
}

impl NewReservation {
    pub fn into_confirmed(self, id: i64) -> Reservation {
        Reservation {
            id,
            user_id: self.user_id,
            showtime_id: self.showtime_id,
            seats: self.seats,
            total_price: self.total_price,
            status: ReservationStatus::Confirmed,
            created_at: self.created_at,
        }
    }
}

/// What happens to a reservation record once its seats are released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseMode {
    /// Keep the record with status `cancelled`.
    #[default]
    Cancel,
    /// Remove the record.
    Delete,
}

impl FromStr for ReleaseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cancel" => Ok(ReleaseMode::Cancel),
            "delete" => Ok(ReleaseMode::Delete),
            other => Err(format!("expected cancel or delete, got {other}")),
        }
    }
}
