//! Business-day window computation.
//!
//! The portal's reporting "day" does not align with midnight: it runs from a
//! fixed local cutoff hour (operational closing time, default 22:00) to one
//! microsecond before the same hour the next day. Before the cutoff the
//! current business day started *yesterday*; at or after it, *today*.
//!
//! The window is kept in the configured local zone because the report
//! dialog's date inputs take naive local values; [`BusinessWindow::start_utc`]
//! and [`BusinessWindow::end_utc`] convert to canonical instants for
//! cross-checks.

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono::offset::LocalResult;
use chrono_tz::Tz;
use thiserror::Error;

/// Errors from business-day window computation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    /// The configured cutoff hour is outside 1..=23.
    #[error("cutoff hour must be between 1 and 23, got {0}")]
    CutoffOutOfRange(u32),

    /// The local wall-clock time cannot be mapped to an instant in the
    /// configured zone (DST gap longer than the bounded forward search).
    #[error("local time {0} cannot be resolved in this time zone")]
    UnresolvableLocal(NaiveDateTime),
}

/// A validated daily cutoff hour (1..=23).
///
/// Hour 0 is rejected: the "previous day at H minus one hour" arithmetic has
/// no meaning for a midnight cutoff, and the portal's operational day never
/// closes at midnight anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutoffHour(u32);

impl CutoffHour {
    /// The portal's operational closing time.
    pub const DEFAULT: CutoffHour = CutoffHour(22);

    pub fn new(hour: u32) -> Result<Self, WindowError> {
        if (1..=23).contains(&hour) {
            Ok(Self(hour))
        } else {
            Err(WindowError::CutoffOutOfRange(hour))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

/// One full business day: `[cutoff, cutoff + 1 day - 1 µs]` in local time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessWindow {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl BusinessWindow {
    /// Local rendering for the report dialog's start input, without a
    /// timezone suffix (the field is a naive `datetime-local` control).
    pub fn start_input(&self) -> String {
        self.start.format("%Y-%m-%dT%H:%M").to_string()
    }

    /// Local rendering for the report dialog's end input.
    pub fn end_input(&self) -> String {
        self.end.format("%Y-%m-%dT%H:%M").to_string()
    }

    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.with_timezone(&Utc)
    }

    pub fn end_utc(&self) -> DateTime<Utc> {
        self.end.with_timezone(&Utc)
    }
}

/// Computes the business-day window containing `now_local`.
///
/// If the local hour is before the cutoff, the window anchors on yesterday's
/// cutoff; otherwise on today's. The end bound is exactly one day minus one
/// microsecond after the start, in absolute time.
pub fn business_window(
    now_local: DateTime<Tz>,
    cutoff: CutoffHour,
) -> Result<BusinessWindow, WindowError> {
    let today = now_local.date_naive();
    let anchor = if now_local.hour() < cutoff.get() {
        today - Duration::days(1)
    } else {
        today
    };

    let cutoff_time = NaiveTime::from_hms_opt(cutoff.get(), 0, 0)
        .ok_or(WindowError::CutoffOutOfRange(cutoff.get()))?;
    let start = resolve_local(anchor.and_time(cutoff_time), now_local.timezone())?;
    let end = start + Duration::days(1) - Duration::microseconds(1);

    Ok(BusinessWindow { start, end })
}

/// Maps a naive local timestamp to an instant in `tz`.
///
/// Ambiguous wall times (DST fall-back) resolve to the earliest instant;
/// nonexistent wall times (spring-forward gap) shift forward minute by
/// minute, capped at two hours.
pub fn resolve_local(naive: NaiveDateTime, tz: Tz) -> Result<DateTime<Tz>, WindowError> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => {
            let mut probe = naive;
            for _ in 0..120 {
                probe += Duration::minutes(1);
                if let LocalResult::Single(dt) = tz.from_local_datetime(&probe) {
                    return Ok(dt);
                }
            }
            Err(WindowError::UnresolvableLocal(naive))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Paris;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Tz> {
        Paris.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn before_cutoff_window_starts_yesterday() {
        let w = business_window(at(2025, 4, 24, 9, 15), CutoffHour::DEFAULT).unwrap();
        assert_eq!(w.start, at(2025, 4, 23, 22, 0));
        assert_eq!(
            w.end,
            at(2025, 4, 24, 21, 59) + Duration::seconds(59) + Duration::microseconds(999_999)
        );
    }

    #[test]
    fn at_or_after_cutoff_window_starts_today() {
        let w = business_window(at(2025, 4, 24, 22, 0), CutoffHour::DEFAULT).unwrap();
        assert_eq!(w.start, at(2025, 4, 24, 22, 0));

        let w = business_window(at(2025, 4, 24, 23, 5), CutoffHour::DEFAULT).unwrap();
        assert_eq!(w.start, at(2025, 4, 24, 22, 0));
    }

    #[test]
    fn window_spans_one_day_minus_one_microsecond() {
        for hour in [0, 7, 21, 22, 23] {
            let w = business_window(at(2025, 1, 15, hour, 30), CutoffHour::DEFAULT).unwrap();
            assert_eq!(
                w.end - w.start,
                Duration::days(1) - Duration::microseconds(1)
            );
            assert!(w.end > w.start);
        }
    }

    #[test]
    fn input_rendering_is_local_without_suffix() {
        let w = business_window(at(2025, 4, 24, 9, 0), CutoffHour::DEFAULT).unwrap();
        assert_eq!(w.start_input(), "2025-04-23T22:00");
        assert_eq!(w.end_input(), "2025-04-24T21:59");
    }

    #[test]
    fn utc_conversion_applies_offset() {
        // Paris is CEST (+02:00) in late April: 22:00 local == 20:00Z.
        let w = business_window(at(2025, 4, 24, 9, 0), CutoffHour::DEFAULT).unwrap();
        assert_eq!(
            w.start_utc(),
            Utc.with_ymd_and_hms(2025, 4, 23, 20, 0, 0).unwrap()
        );
    }

    #[test]
    fn custom_cutoff_hour_is_honored() {
        let w = business_window(at(2025, 4, 24, 3, 0), CutoffHour::new(4).unwrap()).unwrap();
        assert_eq!(w.start, at(2025, 4, 23, 4, 0));
    }

    #[test]
    fn out_of_range_cutoff_rejected() {
        assert_eq!(CutoffHour::new(0).unwrap_err(), WindowError::CutoffOutOfRange(0));
        assert_eq!(CutoffHour::new(24).unwrap_err(), WindowError::CutoffOutOfRange(24));
    }

    #[test]
    fn paris_spring_forward_gap_shifts_start_forward() {
        // Paris jumps 02:00 -> 03:00 on 2025-03-30; a 02:00 cutoff lands in
        // the gap and resolves to 03:00 local.
        let w = business_window(at(2025, 3, 30, 12, 0), CutoffHour::new(2).unwrap()).unwrap();
        assert_eq!(w.start, at(2025, 3, 30, 3, 0));
    }

    #[test]
    fn paris_fall_back_ambiguity_prefers_earliest() {
        // Paris repeats 02:xx on 2025-10-26; 02:30 occurs at +02:00 then
        // +01:00. Earliest wins: 00:30Z.
        let naive = chrono::NaiveDate::from_ymd_opt(2025, 10, 26)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let got = resolve_local(naive, Paris).unwrap();
        assert_eq!(
            got.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2025, 10, 26, 0, 30, 0).unwrap()
        );
    }
}
