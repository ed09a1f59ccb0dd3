//! Dynamic date-preset resolution (spec §4.5 step 1): presets are resolved at request time, never
//! at configuration time, and the canonical window is open on the upper bound.

// crates.io
use chrono::{Datelike, Timelike};
// self
use crate::_prelude::*;

/// A date window requested via a catalog filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatePreset {
	/// The trailing `n` days, up to and excluding now.
	LastNDays(u32),
	/// The current calendar year to date.
	YearToDate,
	/// An explicit, already-resolved window.
	Custom { from: DateTime<Utc>, to: DateTime<Utc> },
}

/// The resolved, half-open `[from, to)` window for a preset, evaluated against `now`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateWindow {
	/// Inclusive lower bound.
	pub from: DateTime<Utc>,
	/// Exclusive upper bound.
	pub to: DateTime<Utc>,
}
impl DateWindow {
	/// Whether `instant` falls within this window.
	pub fn contains(&self, instant: DateTime<Utc>) -> bool {
		instant >= self.from && instant < self.to
	}
}

/// Resolve `preset` into a concrete window as of `now` (spec §4.5 step 1: "at request time, not
/// at configuration time").
pub fn resolve(preset: DatePreset, now: DateTime<Utc>) -> DateWindow {
	match preset {
		DatePreset::LastNDays(days) => DateWindow { from: now - TimeDelta::days(days.into()), to: now },
		DatePreset::YearToDate => {
			let year_start = now
				.with_month(1)
				.and_then(|d| d.with_day(1))
				.and_then(|d| d.with_hour(0))
				.and_then(|d| d.with_minute(0))
				.and_then(|d| d.with_second(0))
				.unwrap_or(now);

			DateWindow { from: year_start, to: now }
		},
		DatePreset::Custom { from, to } => DateWindow { from, to },
	}
}
