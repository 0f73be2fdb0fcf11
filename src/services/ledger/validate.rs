use std::collections::HashSet;

use super::LedgerError;
use crate::models::{Grid, SeatCode, Showtime};

/// Parses every requested code against the grid.
///
/// All offending codes are collected in one pass, in request order, so the
/// caller can show a complete message. A code requested twice counts as
/// offending and is listed once.
pub fn validate_seat_codes<S: AsRef<str>>(codes: &[S], grid: Grid) -> Result<Vec<SeatCode>, LedgerError> {
    if codes.is_empty() {
        return Err(LedgerError::EmptySelection);
    }

    let mut seats = Vec::with_capacity(codes.len());
    let mut seen = HashSet::with_capacity(codes.len());
    let mut invalid: Vec<String> = Vec::new();

    for raw in codes {
        let raw = raw.as_ref();
        match grid.parse(raw) {
            Ok(seat) if seen.insert(seat) => seats.push(seat),
            _ => {
                if !invalid.iter().any(|code| code == raw) {
                    invalid.push(raw.to_string());
                }
            }
        }
    }

    if invalid.is_empty() {
        Ok(seats)
    } else {
        Err(LedgerError::InvalidFormat(invalid))
    }
}

/// Pure read: fails with the requested seats that are already occupied.
pub fn check_availability(showtime: &Showtime, seats: &[SeatCode]) -> Result<(), LedgerError> {
    let taken = showtime.seat_map.conflicts(seats);
    if taken.is_empty() {
        Ok(())
    } else {
        Err(LedgerError::SeatsUnavailable(
            taken.iter().map(ToString::to_string).collect(),
        ))
    }
}
