//! Timetable parsing: overflow clock normalization and schedule CSV loading.

pub mod errors;
pub mod overflow;
pub mod schedule;

pub use errors::ScheduleError;
pub use overflow::{convert, OverflowTime, TIMESTAMP_FORMAT};
pub use schedule::{parse_schedule, resolve_encoding, ScheduleOptions, ScheduleTable};

#[cfg(test)]
mod tests;
