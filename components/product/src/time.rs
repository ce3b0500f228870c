use chrono::{DateTime, Duration, Utc};

/// Seconds between the Unix epoch and the GPS epoch (1980-01-06T00:00:00Z).
pub const GPS_UNIX_OFFSET_SECS: i64 = 315_964_800;

/// Fixed calibration applied when adjusting legacy seconds-since-epoch
/// values into generation time.
pub const GENERATION_EPOCH_MS: i64 = 315_964_819_000;

pub fn unix_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

pub fn gps_epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(GPS_UNIX_OFFSET_SECS, 0).expect("gps epoch in range")
}

/// Timestamp carried by the VMU common header and the v1 image sub-header:
/// whole seconds plus a millisecond fraction that may exceed one second.
pub fn vmu_time(coarse: u32, fine_ms: u16) -> DateTime<Utc> {
    let secs = coarse as i64 + fine_ms as i64 / 1000;
    let nanos = (fine_ms as u32 % 1000) * 1_000_000;
    DateTime::from_timestamp(secs, nanos).expect("vmu timestamp in range")
}

/// GPS-epoch-relative duration in nanoseconds, as carried by the v2
/// sub-headers.
pub fn gps_time(nanos: i64) -> DateTime<Utc> {
    gps_epoch() + Duration::nanoseconds(nanos)
}

/// Shifts a Unix-scale timestamp onto the GPS scale.
pub fn adjust_time(t: DateTime<Utc>) -> DateTime<Utc> {
    t + Duration::seconds(GPS_UNIX_OFFSET_SECS)
}

/// Interprets a legacy seconds value as generation time, applying the fixed
/// millisecond calibration.
pub fn adjust_generation_time(secs: i64) -> DateTime<Utc> {
    unix_epoch() + Duration::milliseconds(GENERATION_EPOCH_MS + secs * 1000)
}

/// Nanoseconds since the GPS epoch for a given instant; the inverse of
/// [`gps_time`], used by fixtures and encoders.
pub fn since_gps_epoch(t: DateTime<Utc>) -> i64 {
    (t - gps_epoch()).num_nanoseconds().unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn gps_epoch_is_jan_6_1980() {
        assert_eq!(gps_epoch(), Utc.with_ymd_and_hms(1980, 1, 6, 0, 0, 0).unwrap());
    }

    #[test]
    fn fine_part_may_overflow_a_second() {
        let t = vmu_time(100, 2500);
        assert_eq!(t.timestamp(), 102);
        assert_eq!(t.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn gps_roundtrip() {
        let t = Utc.with_ymd_and_hms(2018, 7, 1, 12, 30, 5).unwrap();
        assert_eq!(gps_time(since_gps_epoch(t)), t);
    }

    #[test]
    fn generation_adjustment_applies_calibration() {
        let t = adjust_generation_time(0);
        assert_eq!(t.timestamp(), GPS_UNIX_OFFSET_SECS + 19);
    }
}
