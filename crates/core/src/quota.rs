//! Monthly request quota rules.
//!
//! The quota itself is a business decision of the payments provider; this
//! module only turns "has the app benefit" plus "jobs created this month"
//! into a remaining request count.

use chrono::{Datelike, TimeZone, Utc};

use crate::types::Timestamp;

/// Requests per calendar month for users holding the app benefit.
pub const PRO_MONTHLY_QUOTA: i64 = 50;

/// Requests per calendar month for everyone else (including anonymous users).
pub const FREE_MONTHLY_QUOTA: i64 = 1;

/// Monthly quota for a user.
pub fn monthly_quota(has_app_benefit: bool) -> i64 {
    if has_app_benefit {
        PRO_MONTHLY_QUOTA
    } else {
        FREE_MONTHLY_QUOTA
    }
}

/// Remaining requests, never negative.
pub fn remaining(quota: i64, used: i64) -> i64 {
    (quota - used).max(0)
}

/// Half-open UTC window `[start, end)` of the calendar month containing `now`.
pub fn month_window(now: Timestamp) -> (Timestamp, Timestamp) {
    let (year, month) = (now.year(), now.month());
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    (
        first_of_month(year, month),
        first_of_month(next_year, next_month),
    )
}

fn first_of_month(year: i32, month: u32) -> Timestamp {
    // Midnight on the first of a month always exists in UTC.
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}
