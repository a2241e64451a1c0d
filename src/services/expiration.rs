//! Expiration policy: duration tokens, hour-granular UTC stamps, and
//! the expiry check.
//!
//! Stamps are serialized as `YYYYMMDDHH` (UTC, zero-padded), so a
//! file's effective lifetime is truncated to the hour. A stamp that
//! does not parse counts as expired: the resolving and sweep paths must
//! fail closed, never serve bytes behind a name they cannot read.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

const STAMP_FORMAT: &str = "%Y%m%d%H";
const STAMP_LEN: usize = 10;

/// Hours granted for a duration token. Unknown tokens resolve to the
/// shortest duration instead of erroring; a typo must never extend a
/// file's lifetime.
fn duration_hours(token: &str) -> i64 {
    match token {
        "1h" => 1,
        "6h" => 6,
        "24h" => 24,
        "72h" => 72,
        _ => 1,
    }
}

/// Expiration instant for a token, relative to now.
pub fn compute_expiration(token: &str) -> DateTime<Utc> {
    compute_expiration_at(token, Utc::now())
}

/// Expiration instant for a token, relative to an explicit clock.
pub fn compute_expiration_at(token: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::hours(duration_hours(token))
}

/// Serialize an instant into the stamp layout, dropping minutes and
/// seconds.
pub fn format_stamp(instant: DateTime<Utc>) -> String {
    instant.format(STAMP_FORMAT).to_string()
}

/// Parse a stamp back into the hour instant it encodes.
pub fn parse_stamp(stamp: &str) -> Option<DateTime<Utc>> {
    if stamp.len() != STAMP_LEN || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let date = NaiveDate::parse_from_str(&stamp[..8], "%Y%m%d").ok()?;
    let hour: u32 = stamp[8..].parse().ok()?;
    let naive = date.and_hms_opt(hour, 0, 0)?;
    Some(Utc.from_utc_datetime(&naive))
}

/// True once the current time is strictly past the stamped hour.
pub fn is_expired(stamp: &str) -> bool {
    is_expired_at(stamp, Utc::now())
}

/// Expiry check against an explicit clock. A malformed stamp is
/// expired.
pub fn is_expired_at(stamp: &str, now: DateTime<Utc>) -> bool {
    match parse_stamp(stamp) {
        Some(instant) => now > instant,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn tokens_map_to_hours() {
        let now = at(2024, 3, 5, 7, 0);
        assert_eq!(compute_expiration_at("1h", now), at(2024, 3, 5, 8, 0));
        assert_eq!(compute_expiration_at("6h", now), at(2024, 3, 5, 13, 0));
        assert_eq!(compute_expiration_at("24h", now), at(2024, 3, 6, 7, 0));
        assert_eq!(compute_expiration_at("72h", now), at(2024, 3, 8, 7, 0));
    }

    #[test]
    fn unknown_token_matches_shortest() {
        let now = at(2024, 3, 5, 7, 0);
        assert_eq!(
            compute_expiration_at("2weeks", now),
            compute_expiration_at("1h", now)
        );
    }

    #[test]
    fn stamp_is_zero_padded_and_hour_truncated() {
        assert_eq!(format_stamp(at(2024, 3, 5, 7, 42)), "2024030507");
    }

    #[test]
    fn stamp_round_trips_to_the_hour() {
        let stamp = format_stamp(at(2024, 12, 31, 23, 59));
        assert_eq!(parse_stamp(&stamp), Some(at(2024, 12, 31, 23, 0)));
    }

    #[test]
    fn fresh_expiration_is_not_expired() {
        let now = at(2024, 3, 5, 7, 30);
        let stamp = format_stamp(compute_expiration_at("1h", now));
        assert!(!is_expired_at(&stamp, now));
    }

    #[test]
    fn expired_once_time_passes_the_stamped_hour() {
        let now = at(2024, 3, 5, 7, 30);
        let stamp = format_stamp(compute_expiration_at("1h", now));
        // 61 minutes later: 8:31, strictly past the 8:00 stamp
        assert!(is_expired_at(&stamp, now + Duration::minutes(61)));
        // exactly on the stamped hour is still live (strict comparison)
        assert!(!is_expired_at(&stamp, at(2024, 3, 5, 8, 0)));
    }

    #[test]
    fn malformed_stamps_are_expired() {
        let now = at(2024, 3, 5, 7, 0);
        assert!(is_expired_at("", now));
        assert!(is_expired_at("20240305", now));
        assert!(is_expired_at("not-a-date", now));
        assert!(is_expired_at("2024030599", now)); // hour out of range
        assert!(parse_stamp("2024133107").is_none()); // month out of range
    }
}
