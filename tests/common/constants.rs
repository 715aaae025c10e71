//! Ids, names and dates shared by the end-to-end fixtures.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};

pub const LABEL_1_ID: i64 = 1;
pub const LABEL_1_NAME: &str = "Harbor Records";
pub const LABEL_2_ID: i64 = 2;
pub const LABEL_2_NAME: &str = "Quiet Press";

pub const ARTIST_1_ID: i64 = 10;
pub const ARTIST_1_NAME: &str = "Artist A";
pub const ARTIST_2_ID: i64 = 11;
pub const ARTIST_2_NAME: &str = "Marlow Vance";
pub const ARTIST_3_ID: i64 = 12;
pub const ARTIST_3_NAME: &str = "Sable Reyes";
/// Has no signals at all.
pub const ARTIST_4_ID: i64 = 13;
pub const ARTIST_4_NAME: &str = "Nobody Yet";

/// Monday, 3 June 2024: daily and weekly archives are due.
pub fn monday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 6, 0, 0).unwrap()
}

/// Tuesday after [`monday`]: only the daily archive is due.
pub fn tuesday() -> DateTime<Utc> {
    monday() + Duration::days(1)
}

pub fn days_after_monday(days: i64) -> DateTime<Utc> {
    monday() + Duration::days(days)
}
