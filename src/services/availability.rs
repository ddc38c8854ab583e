use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::queries;

/// Whether a car can be booked for `[start, end]`. Only paid, non-cancelled
/// bookings reserve dates; unpaid holds are optimistic and expire through
/// their payment deadline instead of blocking the slot.
///
/// Caller validates that the car exists and that start < end.
pub fn is_available(
    conn: &Connection,
    car_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> anyhow::Result<bool> {
    let blocking = queries::get_blocking_bookings(conn, car_id)?;

    // Closed-interval intersection: [start, end] touches [b.start, b.end].
    let conflict = blocking
        .iter()
        .any(|b| start <= b.end_date && end >= b.start_date);

    Ok(!conflict)
}
