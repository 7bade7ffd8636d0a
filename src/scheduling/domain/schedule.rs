//! Schedule capability and date enumeration.
//!
//! A [`Schedule`] is opaque to the scheduler: it only has to yield its
//! occurrences in ascending order from a given instant. [`ScheduleDates`]
//! bounds that stream to a window and a maximum count.

use super::SchedulingDomainError;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Boxed occurrence stream returned by [`Schedule::occurrences_from`].
pub type Occurrences<'a> = Box<dyn Iterator<Item = DateTime<Utc>> + Send + 'a>;

/// Recurrence capability attached to a deployment.
pub trait Schedule: fmt::Debug + Send + Sync {
    /// Returns the occurrences at or after `start`, in ascending order.
    ///
    /// The stream may be unbounded; callers bound it with [`ScheduleDates`].
    fn occurrences_from(&self, start: DateTime<Utc>) -> Occurrences<'_>;
}

/// Fixed-interval schedule aligned to an anchor date.
///
/// Occurrences fall on `anchor_date + k * interval` for every integer `k`,
/// so the anchor fixes the phase rather than the first run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalSchedule {
    interval_seconds: i64,
    anchor_date: DateTime<Utc>,
}

impl IntervalSchedule {
    /// Creates an interval schedule.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingDomainError::NonPositiveInterval`] when the
    /// interval is zero or negative.
    pub const fn new(
        interval_seconds: i64,
        anchor_date: DateTime<Utc>,
    ) -> Result<Self, SchedulingDomainError> {
        if interval_seconds <= 0 {
            return Err(SchedulingDomainError::NonPositiveInterval {
                seconds: interval_seconds,
            });
        }
        Ok(Self {
            interval_seconds,
            anchor_date,
        })
    }

    /// Returns the interval between occurrences.
    #[must_use]
    pub fn interval(&self) -> Option<TimeDelta> {
        TimeDelta::try_seconds(self.interval_seconds)
    }

    /// Returns the anchor date.
    #[must_use]
    pub const fn anchor_date(&self) -> DateTime<Utc> {
        self.anchor_date
    }

    /// First occurrence at or after `start`, or `None` on overflow.
    fn first_at_or_after(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let step = self.interval_seconds.checked_mul(1_000)?;
        if step <= 0 {
            return None;
        }
        let delta = start.signed_duration_since(self.anchor_date).num_milliseconds();
        let mut steps = delta.div_euclid(step);
        if delta.rem_euclid(step) != 0 {
            steps = steps.checked_add(1)?;
        }
        let offset = TimeDelta::try_milliseconds(steps.checked_mul(step)?)?;
        self.anchor_date.checked_add_signed(offset)
    }
}

impl Schedule for IntervalSchedule {
    fn occurrences_from(&self, start: DateTime<Utc>) -> Occurrences<'_> {
        let (Some(interval), Some(first)) = (
            self.interval().filter(|interval| *interval > TimeDelta::zero()),
            self.first_at_or_after(start),
        ) else {
            return Box::new(std::iter::empty());
        };
        Box::new(std::iter::successors(Some(first), move |previous| {
            previous.checked_add_signed(interval)
        }))
    }
}

/// Schedule consisting of an explicit set of dates.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateListSchedule {
    dates: BTreeSet<DateTime<Utc>>,
}

impl DateListSchedule {
    /// Creates a schedule from the given dates; duplicates collapse.
    #[must_use]
    pub fn new(dates: impl IntoIterator<Item = DateTime<Utc>>) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }

    /// Returns the scheduled dates in ascending order.
    pub fn dates(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.dates.iter().copied()
    }
}

impl Schedule for DateListSchedule {
    fn occurrences_from(&self, start: DateTime<Utc>) -> Occurrences<'_> {
        Box::new(self.dates.range(start..).copied())
    }
}

/// Serializable schedule definition stored alongside deployments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleSpec {
    /// Fixed-interval recurrence.
    Interval(IntervalSchedule),
    /// Explicit list of dates.
    Dates(DateListSchedule),
}

impl Schedule for ScheduleSpec {
    fn occurrences_from(&self, start: DateTime<Utc>) -> Occurrences<'_> {
        match self {
            Self::Interval(schedule) => schedule.occurrences_from(start),
            Self::Dates(schedule) => schedule.occurrences_from(start),
        }
    }
}

/// Half-open time window `[start, end)` used to bound enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl ScheduleWindow {
    /// Creates a window. An `end` at or before `start` yields an empty window.
    #[must_use]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Inclusive lower bound.
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Exclusive upper bound.
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Returns `true` when `instant` lies within `[start, end)`.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Returns `true` when no instant can fall inside the window.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Bounded, strictly ascending enumeration of a schedule's dates.
///
/// Yields at most `max_runs` dates inside the window and stops at the first
/// occurrence at or past the window end. Out-of-order or repeated values from
/// a misbehaving schedule are skipped. The iterator is consumed as it goes and
/// cannot be restarted.
pub struct ScheduleDates<'a> {
    occurrences: Occurrences<'a>,
    window: ScheduleWindow,
    remaining: usize,
    last: Option<DateTime<Utc>>,
}

impl<'a> ScheduleDates<'a> {
    /// Starts enumerating `schedule` over `window`, capped at `max_runs`.
    #[must_use]
    pub fn new(schedule: &'a dyn Schedule, window: ScheduleWindow, max_runs: usize) -> Self {
        let remaining = if window.is_empty() { 0 } else { max_runs };
        Self {
            occurrences: schedule.occurrences_from(window.start()),
            window,
            remaining,
            last: None,
        }
    }
}

impl Iterator for ScheduleDates<'_> {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            let Some(candidate) = self.occurrences.next() else {
                self.remaining = 0;
                break;
            };
            if candidate >= self.window.end() {
                self.remaining = 0;
                break;
            }
            let is_ascending = self.last.is_none_or(|last| candidate > last);
            if candidate < self.window.start() || !is_ascending {
                continue;
            }
            self.last = Some(candidate);
            self.remaining -= 1;
            return Some(candidate);
        }
        None
    }
}

impl std::iter::FusedIterator for ScheduleDates<'_> {}

impl fmt::Debug for ScheduleDates<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleDates")
            .field("window", &self.window)
            .field("remaining", &self.remaining)
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}
