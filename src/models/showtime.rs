use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::seat::{Grid, SeatMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Showtime {
    pub id: i64,
    pub movie_id: i64,
    pub date: NaiveDate,
    #[serde(with = "clock_time")]
    pub time: NaiveTime,
    /// Ticket price per seat.
    pub price: u32,
    #[serde(rename = "seatsLayout")]
    pub seat_map: SeatMap,
    /// Bumped on every seat-map write; stores reject writes made against a stale value.
    pub version: i64,
}

impl Showtime {
    pub fn total_price(&self, seat_count: usize) -> u64 {
        u64::from(self.price) * seat_count as u64
    }
}

/// Data for scheduling a screening; the seat map starts empty.
#[derive(Debug, Clone)]
pub struct NewShowtime {
    pub movie_id: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub price: u32,
    pub grid: Grid,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowtimeFilter {
    pub movie_id: Option<i64>,
    pub date: Option<NaiveDate>,
}

/// Screening times travel as `HH:MM`; `HH:MM:SS` is accepted on input.
pub mod clock_time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format("%H:%M"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid time: {raw}")))
    }

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .ok()
    }
}
