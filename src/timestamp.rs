//! Validation and byte-shift correction of a packet's raw on-board
//! RTC timestamp, ahead of the timing engine's block-level work.

use crate::packet::PacketTimestamp;

/// Check that every field of a packet timestamp falls within its
/// calendar range. STEIN/HSK/Overflow packets carry the full
/// `(MM,DD,HH,mm,ss,ff)` form; MAGIC carries only `(HH,mm,ss,ff)`.
pub fn validate(ts: &PacketTimestamp) -> bool {
    match *ts {
        PacketTimestamp::Partial { hour, minute, second, centisecond } => {
            hour <= 23 && minute <= 59 && second <= 59 && centisecond <= 99
        }
        PacketTimestamp::Full { month, day, hour, minute, second, centisecond } => {
            (1..=12).contains(&month)
                && (1..=31).contains(&day)
                && hour <= 23
                && minute <= 59
                && second <= 59
                && centisecond <= 99
        }
    }
}

/// Correct a single-byte left-shift in the packet timestamp by
/// dropping the leading field and appending a zero centisecond.
///
/// Drops the *first* field of whichever tuple shape it was given, not
/// just the month of a full timestamp -- so repairing a shifted full
/// timestamp loses the month field, same as a shifted partial one
/// loses the hour. Callers should only invoke this when a timestamp
/// has failed [`validate`] and a single-byte shift is suspected.
pub fn shift(ts: &PacketTimestamp) -> PacketTimestamp {
    match *ts {
        PacketTimestamp::Full { day, hour, minute, second, centisecond, .. } => {
            PacketTimestamp::Full {
                month: day,
                day: hour,
                hour: minute,
                minute: second,
                second: centisecond,
                centisecond: 0,
            }
        }
        PacketTimestamp::Partial { minute, second, centisecond, .. } => {
            PacketTimestamp::Partial { hour: minute, minute: second, second: centisecond, centisecond: 0 }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_full_timestamp_in_range() {
        let ts = PacketTimestamp::Full { month: 6, day: 15, hour: 23, minute: 59, second: 59, centisecond: 99 };
        assert!(validate(&ts));
    }

    #[test]
    fn rejects_full_timestamp_with_zero_month() {
        let ts = PacketTimestamp::Full { month: 0, day: 15, hour: 10, minute: 0, second: 0, centisecond: 0 };
        assert!(!validate(&ts));
    }

    #[test]
    fn rejects_partial_timestamp_with_bad_hour() {
        let ts = PacketTimestamp::Partial { hour: 24, minute: 0, second: 0, centisecond: 0 };
        assert!(!validate(&ts));
    }

    #[test]
    fn shift_drops_leading_field_and_zeroes_centisecond() {
        let ts = PacketTimestamp::Full { month: 6, day: 15, hour: 10, minute: 20, second: 30, centisecond: 40 };
        let shifted = shift(&ts);
        assert_eq!(
            shifted,
            PacketTimestamp::Full { month: 15, day: 10, hour: 20, minute: 30, second: 40, centisecond: 0 }
        );
    }

    #[test]
    fn shift_on_partial_timestamp() {
        let ts = PacketTimestamp::Partial { hour: 10, minute: 20, second: 30, centisecond: 40 };
        let shifted = shift(&ts);
        assert_eq!(shifted, PacketTimestamp::Partial { hour: 20, minute: 30, second: 40, centisecond: 0 });
    }
}
