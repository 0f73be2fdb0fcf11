//! Seat codes, hall grids and per-showtime seat maps.
//!
//! A seat code is a row letter followed by a seat number (`A1`, `J10`).
//! Syntax is checked by [`SeatCode::from_str`]; range checks need the
//! showtime's [`Grid`] and are done by [`Grid::parse`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Row letters run from `A` to `Z`.
pub const MAX_ROWS: u8 = 26;

pub const DEFAULT_ROWS: u8 = 10;
pub const DEFAULT_SEATS_PER_ROW: u16 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SeatCodeError {
    #[error("malformed seat code")]
    Malformed,
    #[error("row is outside the hall")]
    RowOutOfRange,
    #[error("seat number is outside the row")]
    SeatOutOfRange,
}

/// One seat, identified by a zero-based row index and a one-based number.
///
/// Ordering is row-major, so `A2 < A10 < B1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeatCode {
    row: u8,
    number: u16,
}

impl SeatCode {
    pub fn new(row_letter: char, number: u16) -> Option<Self> {
        if !row_letter.is_ascii_uppercase() || number == 0 {
            return None;
        }
        Some(Self {
            row: row_letter as u8 - b'A',
            number,
        })
    }

    pub fn row_letter(&self) -> char {
        (b'A' + self.row) as char
    }

    pub fn row_index(&self) -> u8 {
        self.row
    }

    pub fn number(&self) -> u16 {
        self.number
    }
}

impl fmt::Display for SeatCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row_letter(), self.number)
    }
}

impl FromStr for SeatCode {
    type Err = SeatCodeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut chars = raw.chars();
        let letter = chars.next().ok_or(SeatCodeError::Malformed)?;
        let digits = chars.as_str();

        // "A01" and "A+1" are rejected; only canonical decimal numbers pass
        if digits.is_empty()
            || digits.starts_with('0')
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(SeatCodeError::Malformed);
        }
        let number: u16 = digits.parse().map_err(|_| SeatCodeError::Malformed)?;

        SeatCode::new(letter, number).ok_or(SeatCodeError::Malformed)
    }
}

impl Serialize for SeatCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SeatCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|e| serde::de::Error::custom(format!("{raw}: {e}")))
    }
}

/// Hall dimensions of a showtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grid {
    pub rows: u8,
    pub seats_per_row: u16,
}

impl Grid {
    /// Returns `None` for an empty grid or more rows than there are letters.
    pub fn new(rows: u8, seats_per_row: u16) -> Option<Self> {
        if rows == 0 || rows > MAX_ROWS || seats_per_row == 0 {
            return None;
        }
        Some(Self { rows, seats_per_row })
    }

    pub fn capacity(&self) -> usize {
        usize::from(self.rows) * usize::from(self.seats_per_row)
    }

    pub fn contains(&self, seat: SeatCode) -> bool {
        seat.row < self.rows && seat.number <= self.seats_per_row
    }

    /// Parses a seat code and checks it against the grid.
    pub fn parse(&self, raw: &str) -> Result<SeatCode, SeatCodeError> {
        let seat: SeatCode = raw.parse()?;
        if seat.row >= self.rows {
            return Err(SeatCodeError::RowOutOfRange);
        }
        if seat.number > self.seats_per_row {
            return Err(SeatCodeError::SeatOutOfRange);
        }
        Ok(seat)
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            seats_per_row: DEFAULT_SEATS_PER_ROW,
        }
    }
}

/// Grid plus the seats already taken.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatMap {
    #[serde(flatten)]
    pub grid: Grid,
    pub occupied_seats: BTreeSet<SeatCode>,
}

impl SeatMap {
    pub fn empty(grid: Grid) -> Self {
        Self {
            grid,
            occupied_seats: BTreeSet::new(),
        }
    }

    pub fn is_occupied(&self, seat: SeatCode) -> bool {
        self.occupied_seats.contains(&seat)
    }

    pub fn available_count(&self) -> usize {
        self.grid.capacity().saturating_sub(self.occupied_seats.len())
    }

    /// Seats from `requested` that are already taken, in request order.
    pub fn conflicts(&self, requested: &[SeatCode]) -> Vec<SeatCode> {
        requested
            .iter()
            .copied()
            .filter(|seat| self.is_occupied(*seat))
            .collect()
    }

    pub fn with_occupied(&self, seats: &[SeatCode]) -> Self {
        let mut next = self.clone();
        next.occupied_seats.extend(seats.iter().copied());
        next
    }

    /// Frees `seats`; seats that are not occupied are ignored.
    pub fn without(&self, seats: &[SeatCode]) -> Self {
        let mut next = self.clone();
        for seat in seats {
            next.occupied_seats.remove(seat);
        }
        next
    }

    /// Every occupied seat lies inside the grid.
    pub fn is_consistent(&self) -> bool {
        self.occupied_seats.iter().all(|seat| self.grid.contains(*seat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn seat(raw: &str) -> SeatCode {
        raw.parse().unwrap()
    }

    #[test]
    fn parses_canonical_codes() {
        let a1 = seat("A1");
        assert_eq!(a1.row_letter(), 'A');
        assert_eq!(a1.number(), 1);
        assert_eq!(seat("J10").to_string(), "J10");
    }

    #[test]
    fn rejects_malformed_codes() {
        for raw in ["", "A", "1A", "a1", "A0", "A01", "AA1", "A-1", "A 1", "Ä1", "A99999"] {
            assert_eq!(raw.parse::<SeatCode>(), Err(SeatCodeError::Malformed), "{raw}");
        }
    }

    #[test]
    fn grid_reports_which_bound_was_crossed() {
        let grid = Grid::default();
        assert_eq!(grid.parse("Z9"), Err(SeatCodeError::RowOutOfRange));
        assert_eq!(grid.parse("B11"), Err(SeatCodeError::SeatOutOfRange));
        assert_eq!(grid.parse("J10"), Ok(seat("J10")));
    }

    #[test]
    fn grid_rejects_degenerate_dimensions() {
        assert!(Grid::new(0, 10).is_none());
        assert!(Grid::new(10, 0).is_none());
        assert!(Grid::new(27, 10).is_none());
        assert_eq!(Grid::new(26, 15).map(|g| g.capacity()), Some(390));
    }

    #[test]
    fn seat_order_is_row_major() {
        let mut seats = vec![seat("B1"), seat("A10"), seat("A2")];
        seats.sort();
        assert_eq!(seats, vec![seat("A2"), seat("A10"), seat("B1")]);
    }

    #[test]
    fn release_ignores_free_seats() {
        let map = SeatMap::empty(Grid::default()).with_occupied(&[seat("A1"), seat("A2")]);
        let freed = map.without(&[seat("A2"), seat("C3")]);
        assert_eq!(freed.occupied_seats, BTreeSet::from([seat("A1")]));
        assert_eq!(freed.available_count(), 99);
    }

    #[test]
    fn seat_map_uses_layout_field_names() {
        let map = SeatMap::empty(Grid::default()).with_occupied(&[seat("C4")]);
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"rows": 10, "seatsPerRow": 10, "occupiedSeats": ["C4"]})
        );
    }

    proptest! {
        #[test]
        fn codes_inside_the_grid_always_parse(rows in 1u8..=26, per_row in 1u16..=40, r in 0u8..26, n in 1u16..=40) {
            let grid = Grid::new(rows, per_row).unwrap();
            let raw = format!("{}{}", (b'A' + r) as char, n);
            let parsed = grid.parse(&raw);
            if r < rows && n <= per_row {
                prop_assert_eq!(parsed.map(|s| s.to_string()), Ok(raw));
            } else {
                prop_assert!(parsed.is_err());
            }
        }

        #[test]
        fn arbitrary_strings_never_panic(raw in "\\PC{0,6}") {
            let _ = Grid::default().parse(&raw);
        }
    }
}
