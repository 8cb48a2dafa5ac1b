use chrono::{DateTime, Timelike, Utc};

/// Whether an instance is due for a fetch this tick.
///
/// The cadence is anchored to minutes since midnight rather than process
/// start, so independent processes and restarts agree on which tick is due
/// without coordination: an instance with multiplier N is due during the
/// first `pull_interval_minutes` of every `pull_interval_minutes * N` window.
pub fn is_due(now: DateTime<Utc>, pull_interval_minutes: u32, pull_multiplier: u32) -> bool {
    let pull_interval_minutes = pull_interval_minutes.max(1);
    let period = pull_interval_minutes * pull_multiplier.max(1);
    let minutes = now.hour() * 60 + now.minute();
    minutes % period < pull_interval_minutes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 25, h, m, 0).unwrap()
    }

    #[test]
    fn multiplier_one_is_due_every_tick() {
        for minute in [0, 7, 14, 15, 44, 59] {
            assert!(is_due(at(3, minute), 15, 1));
        }
    }

    #[test]
    fn multiplier_stretches_the_cadence() {
        // Period 30min: due in the first 15 minutes of each half hour.
        assert!(is_due(at(10, 0), 15, 2));
        assert!(is_due(at(10, 14), 15, 2));
        assert!(!is_due(at(10, 15), 15, 2));
        assert!(!is_due(at(10, 29), 15, 2));
        assert!(is_due(at(10, 30), 15, 2));
    }

    #[test]
    fn cadence_is_periodic_and_anchored_to_midnight() {
        let pull = 15u32;
        for multiplier in 1..=4u32 {
            let period = Duration::minutes(i64::from(pull * multiplier));
            for minute in 0..120u32 {
                let t = at(0, 0) + Duration::minutes(i64::from(minute));
                assert_eq!(
                    is_due(t, pull, multiplier),
                    is_due(t + period, pull, multiplier),
                    "multiplier {multiplier} minute {minute}"
                );
            }
            // Midnight itself is always a due tick.
            assert!(is_due(at(0, 0), pull, multiplier));
        }
    }

    #[test]
    fn zero_multiplier_is_treated_as_one() {
        assert_eq!(is_due(at(10, 7), 15, 0), is_due(at(10, 7), 15, 1));
    }
}
