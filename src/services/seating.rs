//! Seat bounds and availability accounting for a theatre hall.

use crate::error::{AppError, FieldErrors};

/// Hall dimensions a ticket is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HallLayout {
    pub rows: i32,
    pub seats_in_row: i32,
}

impl HallLayout {
    pub fn capacity(&self) -> i64 {
        i64::from(self.rows) * i64::from(self.seats_in_row)
    }
}

/// Checks that `row` and `seat` both fall inside the hall, numbering from 1.
///
/// Each out-of-range coordinate is reported under its own field name.
pub fn validate_seat(row: i32, seat: i32, hall: HallLayout) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();
    for (value, name, limit_name, limit) in [
        (row, "row", "rows", hall.rows),
        (seat, "seat", "seats_in_row", hall.seats_in_row),
    ] {
        if !(1..=limit).contains(&value) {
            errors.insert(
                name.to_string(),
                vec![format!(
                    "{name} number must be in available range: (1, {limit_name}): (1, {limit})"
                )],
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Seats left for sale: hall capacity minus tickets already issued.
pub fn tickets_available(hall: HallLayout, sold: i64) -> i64 {
    hall.capacity() - sold
}
