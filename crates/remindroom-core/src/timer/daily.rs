use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};
use std::time::Duration;

/// Next instant strictly after `now` at `hour:minute` wall-clock time.
///
/// Today's occurrence is used if it is still ahead, otherwise tomorrow's.
/// A local time that does not exist (DST gap) is shifted forward by one
/// hour; an ambiguous one resolves to the earlier instant. Returns `None`
/// for an invalid `hour:minute`.
pub fn next_daily_fire<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32, minute: u32) -> Option<DateTime<Tz>> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let tz = now.timezone();
    let today = now.date_naive();

    if let Some(candidate) = resolve_local(&tz, today.and_time(time)) {
        if candidate > *now {
            return Some(candidate);
        }
    }
    let tomorrow = today.succ_opt()?;
    resolve_local(&tz, tomorrow.and_time(time))
}

/// Delay from `now` until `at`, zero if `at` is not in the future.
pub fn delay_until<Tz: TimeZone>(now: &DateTime<Tz>, at: &DateTime<Tz>) -> Duration {
    at.clone()
        .signed_duration_since(now.clone())
        .to_std()
        .unwrap_or_default()
}

/// Longest step any timer is pushed forward by.
pub(crate) fn far_future() -> TimeDelta {
    TimeDelta::days(36_500)
}

/// `now + delay`, with the delay capped at [`far_future`]. Stays at `now`
/// if even that would leave the representable range.
pub fn instant_after<Tz: TimeZone>(now: &DateTime<Tz>, delay: Duration) -> DateTime<Tz> {
    let step = TimeDelta::from_std(delay).map_or_else(|_| far_future(), |d| d.min(far_future()));
    now.clone().checked_add_signed(step).unwrap_or_else(|| now.clone())
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&naive).earliest().or_else(|| {
        tz.from_local_datetime(&(naive + TimeDelta::hours(1)))
            .earliest()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use proptest::prelude::*;

    fn utc(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2024, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn later_today_is_used() {
        let now = utc(8, 59, 0);
        let next = next_daily_fire(&now, 9, 0).unwrap();
        assert_eq!(next, utc(9, 0, 0));
        assert_eq!(delay_until(&now, &next), Duration::from_secs(60));
    }

    #[test]
    fn passed_time_rolls_to_tomorrow() {
        let now = utc(9, 1, 0);
        let next = next_daily_fire(&now, 9, 0).unwrap();
        assert_eq!(next, utc(9, 0, 0) + TimeDelta::days(1));
        assert_eq!(delay_until(&now, &next), Duration::from_secs(24 * 3600 - 60));
    }

    #[test]
    fn instant_after_saturates_huge_delays() {
        let now = utc(12, 0, 0);
        assert_eq!(instant_after(&now, Duration::from_secs(90)), utc(12, 1, 30));
        let capped = now + far_future();
        assert_eq!(instant_after(&now, Duration::from_secs(10_000_000_000_000)), capped);
        assert_eq!(instant_after(&now, Duration::MAX), capped);
        assert_eq!(instant_after(&DateTime::<Utc>::MAX_UTC, Duration::from_secs(1)), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn exact_time_is_not_strictly_future() {
        let now = utc(9, 0, 0);
        let next = next_daily_fire(&now, 9, 0).unwrap();
        assert_eq!(next, utc(9, 0, 0) + TimeDelta::days(1));
    }

    #[test]
    fn invalid_time_yields_none() {
        assert!(next_daily_fire(&utc(0, 0, 0), 24, 0).is_none());
        assert!(next_daily_fire(&utc(0, 0, 0), 12, 60).is_none());
    }

    #[test]
    fn delay_until_past_is_zero() {
        assert_eq!(delay_until(&utc(10, 0, 0), &utc(9, 0, 0)), Duration::ZERO);
    }

    proptest! {
        #[test]
        fn next_fire_is_within_the_next_day(
            secs in 0i64..4_000_000_000,
            hour in 0u32..24,
            minute in 0u32..60,
        ) {
            let now = DateTime::<Utc>::from_timestamp(secs, 0).unwrap();
            let next = next_daily_fire(&now, hour, minute).unwrap();
            prop_assert!(next > now);
            prop_assert!(next <= now + TimeDelta::hours(24));
            prop_assert_eq!(next.time(), NaiveTime::from_hms_opt(hour, minute, 0).unwrap());
        }
    }
}
