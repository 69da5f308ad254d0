//! Carrier mapper: one digit-string record ⇄ the sub-second fields of one
//! carrier's three clocks.
//!
//! | Digits    | Clock    | Unit            |
//! |-----------|----------|-----------------|
//! | `[0, 3)`  | created  | milliseconds    |
//! | `[3, 10)` | accessed | 100 nanoseconds |
//! | `[10,17)` | modified | 100 nanoseconds |
//!
//! Whole seconds are never changed.  A reset carrier reads back as seventeen
//! nines, which classifies as the reserved index.

use std::path::Path;

use chrono::{DateTime, Timelike, Utc};

use crate::digits::parse_decimal;
use crate::error::{Error, Result};
use crate::layout::{Layout, ACCESSED_DIGITS, CREATED_DIGITS};
use crate::plan::DigitString;
use crate::store::TimestampStore;

const NANOS_PER_SECOND: u32 = 1_000_000_000;
const NANOS_PER_MILLI:  u32 = 1_000_000;
const NANOS_PER_TICK:   u32 = 100;

/// Creation sub-second of a reset carrier: 999 999 microseconds.
pub const SENTINEL_CREATED_NANOS: u32 = 999_999_000;
/// Access/modified sub-second of a reset carrier: 9 999 999 ticks.
pub const SENTINEL_TICK_NANOS: u32 = 9_999_999 * NANOS_PER_TICK;

#[derive(Debug, Clone, Copy)]
pub struct CarrierMapper {
    layout: Layout,
}

impl CarrierMapper {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Overwrite every sub-second field with the sentinel pattern.
    pub fn reset<S: TimestampStore + ?Sized>(&self, store: &mut S, carrier: &Path) -> Result<()> {
        let times = store.get_times(carrier)?;
        store.set_creation_time(carrier, with_subsec(times.created, SENTINEL_CREATED_NANOS)?)?;
        store.set_access_modified_times(
            carrier,
            with_subsec(times.accessed, SENTINEL_TICK_NANOS)?,
            with_subsec(times.modified, SENTINEL_TICK_NANOS)?,
        )
    }

    pub fn write<S: TimestampStore + ?Sized>(
        &self,
        store:   &mut S,
        carrier: &Path,
        record:  &DigitString,
    ) -> Result<()> {
        let (created, rest) = record.as_str().split_at(CREATED_DIGITS);
        let (accessed, modified) = rest.split_at(ACCESSED_DIGITS);

        let times = store.get_times(carrier)?;
        store.set_creation_time(
            carrier,
            with_subsec(times.created, field(created)? * NANOS_PER_MILLI)?,
        )?;
        store.set_access_modified_times(
            carrier,
            with_subsec(times.accessed, field(accessed)? * NANOS_PER_TICK)?,
            with_subsec(times.modified, field(modified)? * NANOS_PER_TICK)?,
        )
    }

    pub fn read<S: TimestampStore + ?Sized>(&self, store: &S, carrier: &Path) -> Result<DigitString> {
        let times = store.get_times(carrier)?;
        let created = subsec(&times.created) / NANOS_PER_MILLI;
        let accessed = subsec(&times.accessed) / NANOS_PER_TICK;
        let modified = subsec(&times.modified) / NANOS_PER_TICK;
        let raw = format!("{created:03}{accessed:07}{modified:07}");
        DigitString::parse(&raw, &self.layout)
    }
}

fn field(digits: &str) -> Result<u32> {
    let value = parse_decimal(digits)?;
    u32::try_from(value).map_err(|_| Error::InvalidDigits(digits.to_owned()))
}

/// Sub-second nanoseconds, folding chrono's leap-second representation.
fn subsec(time: &DateTime<Utc>) -> u32 {
    time.nanosecond() % NANOS_PER_SECOND
}

fn with_subsec(time: DateTime<Utc>, nanos: u32) -> Result<DateTime<Utc>> {
    time.with_nanosecond(nanos).ok_or_else(|| {
        Error::InvalidDigits(format!("{nanos} is not a valid sub-second value"))
    })
}
