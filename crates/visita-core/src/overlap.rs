//! Time-range arithmetic and the overlap rules that prevent double-booking.
//!
//! All ranges are half-open: `[start, end)`. Two ranges that merely touch
//! (`09:00-10:00` and `10:00-11:00`) do not overlap.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, codes::DayCode, slot::PrisonTimeSlot};

/// A validated `[start, end)` range within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
  start: NaiveTime,
  end:   NaiveTime,
}

impl TimeRange {
  /// Fails unless `start < end`.
  pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
    if start < end {
      Ok(Self { start, end })
    } else {
      Err(Error::InvalidTimeRange { start, end })
    }
  }

  pub fn start(&self) -> NaiveTime { self.start }

  pub fn end(&self) -> NaiveTime { self.end }

  pub fn overlaps(&self, other: &TimeRange) -> bool {
    self.start < other.end && other.start < self.end
  }

  /// Whether `other` lies entirely within `self`.
  pub fn contains(&self, other: &TimeRange) -> bool {
    self.start <= other.start && other.end <= self.end
  }
}

/// Whether a slot with the given validity window is in force on `today`.
/// Also used to decide whether a slot applies to a visit date.
pub fn is_active(
  effective: NaiveDate,
  expiry: Option<NaiveDate>,
  today: NaiveDate,
) -> bool {
  effective <= today && expiry.is_none_or(|e| e >= today)
}

/// Whether two validity windows share a day that is `today` or later.
/// Windows that only coincided in the past cannot double-book anything.
pub fn windows_clash(
  (a_effective, a_expiry): (NaiveDate, Option<NaiveDate>),
  (b_effective, b_expiry): (NaiveDate, Option<NaiveDate>),
  today: NaiveDate,
) -> bool {
  let start = a_effective.max(b_effective);
  let end = match (a_expiry, b_expiry) {
    (Some(a), Some(b)) => Some(a.min(b)),
    (a, b) => a.or(b),
  };
  end.is_none_or(|end| start <= end && end >= today)
}

/// Proposed time-slot shape checked by [`check_time_slot_overlap`].
#[derive(Debug, Clone, Copy)]
pub struct SlotCandidate<'a> {
  pub prison_code: &'a str,
  pub day:         DayCode,
  pub range:       TimeRange,
  pub effective:   NaiveDate,
  pub expiry:      Option<NaiveDate>,
  /// The slot being updated, which must not conflict with itself.
  pub exclude_id:  Option<i64>,
}

/// Reject `candidate` if it overlaps any other slot for the same prison and
/// day whose validity window shares a current or future day with its own.
pub fn check_time_slot_overlap(
  candidate: &SlotCandidate<'_>,
  existing: &[PrisonTimeSlot],
  today: NaiveDate,
) -> Result<()> {
  let clash = existing.iter().find(|slot| {
    Some(slot.prison_time_slot_id) != candidate.exclude_id
      && slot.prison_code == candidate.prison_code
      && slot.day_code == candidate.day
      && windows_clash(
        (slot.effective_date, slot.expiry_date),
        (candidate.effective, candidate.expiry),
        today,
      )
      && slot.range().is_ok_and(|r| r.overlaps(&candidate.range))
  });

  match clash {
    None => Ok(()),
    Some(slot) => Err(Error::TimeSlotOverlap {
      prison_code:    candidate.prison_code.to_owned(),
      day:            candidate.day,
      start:          candidate.range.start(),
      end:            candidate.range.end(),
      existing_id:    slot.prison_time_slot_id,
      existing_start: slot.start_time,
      existing_end:   slot.end_time,
    }),
  }
}

/// Reject a visit whose range overlaps one already booked in the same visit
/// slot on the same date. `booked` holds `(official_visit_id, range)` pairs
/// for the non-cancelled visits in that slot and date.
pub fn check_visit_overlap(
  visit_slot_id: i64,
  date: NaiveDate,
  range: TimeRange,
  booked: &[(i64, TimeRange)],
) -> Result<()> {
  match booked.iter().find(|(_, r)| r.overlaps(&range)) {
    None => Ok(()),
    Some((existing_id, _)) => Err(Error::VisitOverlap {
      visit_slot_id,
      date,
      start: range.start(),
      end: range.end(),
      existing_id: *existing_id,
    }),
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;
  use crate::visit::Audit;

  fn t(h: u32, m: u32) -> NaiveTime { NaiveTime::from_hms_opt(h, m, 0).unwrap() }

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  fn range(s: NaiveTime, e: NaiveTime) -> TimeRange { TimeRange::new(s, e).unwrap() }

  fn slot(
    id: i64,
    start: NaiveTime,
    end: NaiveTime,
    effective: NaiveDate,
    expiry: Option<NaiveDate>,
  ) -> PrisonTimeSlot {
    PrisonTimeSlot {
      prison_time_slot_id: id,
      prison_code:         "MDI".into(),
      day_code:            DayCode::Mon,
      start_time:          start,
      end_time:            end,
      effective_date:      effective,
      expiry_date:         expiry,
      legacy:              None,
      audit:               Audit::created("tester", Utc.timestamp_opt(0, 0).unwrap()),
    }
  }

  fn monday(
    range: TimeRange,
    effective: NaiveDate,
    expiry: Option<NaiveDate>,
  ) -> SlotCandidate<'static> {
    SlotCandidate {
      prison_code: "MDI",
      day: DayCode::Mon,
      range,
      effective,
      expiry,
      exclude_id: None,
    }
  }

  #[test]
  fn touching_ranges_do_not_overlap() {
    assert!(!range(t(9, 0), t(10, 0)).overlaps(&range(t(10, 0), t(11, 0))));
    assert!(!range(t(10, 0), t(11, 0)).overlaps(&range(t(9, 0), t(10, 0))));
  }

  #[test]
  fn intersecting_ranges_overlap() {
    assert!(range(t(9, 0), t(10, 0)).overlaps(&range(t(9, 30), t(10, 30))));
    assert!(range(t(9, 0), t(12, 0)).overlaps(&range(t(10, 0), t(11, 0))));
  }

  #[test]
  fn empty_or_inverted_range_is_rejected() {
    assert!(matches!(
      TimeRange::new(t(10, 0), t(10, 0)),
      Err(Error::InvalidTimeRange { .. })
    ));
    assert!(TimeRange::new(t(11, 0), t(10, 0)).is_err());
  }

  #[test]
  fn activity_window_is_inclusive_at_both_ends() {
    let today = d(2026, 3, 2);
    assert!(is_active(today, None, today));
    assert!(is_active(d(2026, 1, 1), Some(today), today));
    assert!(!is_active(d(2026, 3, 3), None, today));
    assert!(!is_active(d(2026, 1, 1), Some(d(2026, 3, 1)), today));
  }

  #[test]
  fn overlap_with_active_slot_is_rejected() {
    let today = d(2026, 3, 2);
    let existing = vec![slot(7, t(9, 0), t(10, 0), d(2026, 1, 1), None)];
    let candidate = monday(range(t(9, 30), t(10, 30)), d(2026, 3, 2), None);

    let err = check_time_slot_overlap(&candidate, &existing, today).unwrap_err();
    assert!(matches!(err, Error::TimeSlotOverlap { existing_id: 7, .. }));
  }

  #[test]
  fn expired_and_self_slots_do_not_block() {
    let today = d(2026, 3, 2);
    let existing = vec![
      slot(1, t(9, 0), t(10, 0), d(2025, 1, 1), Some(d(2026, 1, 1))),
      slot(3, t(9, 0), t(10, 0), d(2026, 1, 1), None),
    ];
    let candidate = SlotCandidate {
      exclude_id: Some(3),
      ..monday(range(t(9, 0), t(10, 0)), d(2026, 1, 1), None)
    };

    assert!(check_time_slot_overlap(&candidate, &existing, today).is_ok());
  }

  #[test]
  fn future_slots_block_when_their_windows_meet() {
    let today = d(2026, 3, 2);
    let existing = vec![slot(2, t(9, 0), t(10, 0), d(2026, 6, 1), None)];

    let same_start = monday(range(t(9, 0), t(10, 0)), d(2026, 6, 1), None);
    let err = check_time_slot_overlap(&same_start, &existing, today).unwrap_err();
    assert!(matches!(err, Error::TimeSlotOverlap { existing_id: 2, .. }));

    let open_ended_now = monday(range(t(9, 30), t(10, 30)), today, None);
    assert!(check_time_slot_overlap(&open_ended_now, &existing, today).is_err());

    let ends_before = monday(range(t(9, 0), t(10, 0)), today, Some(d(2026, 5, 31)));
    assert!(check_time_slot_overlap(&ends_before, &existing, today).is_ok());
  }

  #[test]
  fn windows_meeting_only_in_the_past_do_not_clash() {
    let today = d(2026, 3, 2);
    let lapsed = (d(2025, 1, 1), Some(d(2026, 1, 31)));
    assert!(!windows_clash(lapsed, (d(2025, 6, 1), None), today));
    assert!(windows_clash((d(2025, 1, 1), Some(today)), (d(2025, 6, 1), None), today));
    assert!(!windows_clash(
      (d(2026, 4, 1), Some(d(2026, 4, 30))),
      (d(2026, 5, 1), None),
      today
    ));
  }

  #[test]
  fn other_prisons_and_days_do_not_block() {
    let today = d(2026, 3, 2);
    let mut other_day = slot(1, t(9, 0), t(10, 0), d(2026, 1, 1), None);
    other_day.day_code = DayCode::Tue;
    let mut other_prison = slot(2, t(9, 0), t(10, 0), d(2026, 1, 1), None);
    other_prison.prison_code = "BMI".into();

    let candidate = monday(range(t(9, 0), t(10, 0)), d(2026, 1, 1), None);
    assert!(
      check_time_slot_overlap(&candidate, &[other_day, other_prison], today).is_ok()
    );
  }

  #[test]
  fn visit_overlap_names_the_clashing_visit() {
    let booked = vec![(11, range(t(9, 0), t(10, 0))), (12, range(t(10, 0), t(11, 0)))];
    assert!(check_visit_overlap(5, d(2026, 3, 2), range(t(11, 0), t(12, 0)), &booked).is_ok());

    let err = check_visit_overlap(5, d(2026, 3, 2), range(t(10, 30), t(11, 30)), &booked)
      .unwrap_err();
    assert!(matches!(err, Error::VisitOverlap { existing_id: 12, .. }));
  }
}
