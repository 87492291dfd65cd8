use chrono::{DateTime, Datelike, Timelike, Utc};

/// Convert an instant to DOS `(time, date)`.
///
/// DOS dates cover 1980 through 2107; instants outside that range are
/// clamped to its bounds.
pub fn dos_time(time: DateTime<Utc>) -> (u16, u16) {
    let year = time.year();
    if year < 1980 {
        return (0, (1 << 5) | 1);
    }
    if year > 2107 {
        return ((23 << 11) | (59 << 5) | 29, (127 << 9) | (12 << 5) | 31);
    }

    let date = (((year - 1980) as u16) << 9) | ((time.month() as u16) << 5) | time.day() as u16;
    let time = ((time.hour() as u16) << 11) | ((time.minute() as u16) << 5) | (time.second() as u16 >> 1);

    (time, date)
}
