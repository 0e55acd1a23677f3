use std::str::FromStr;

use chrono::{DateTime, Local, TimeDelta};
use serde::Serialize;

use crate::{
    core::{battery::BatteryModel, series::RawTimestamp},
    prelude::*,
    quantity::{power::Kilowatts, time::Hours},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, clap::ValueEnum, derive_more::Display)]
pub enum Operation {
    Charge,
    Discharge,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, derive_more::Display)]
pub enum EntryStatus {
    Scheduled,

    #[display("In progress")]
    InProgress,

    Completed,
}

/// User-requested operation, validated only when applied.
#[derive(Clone, Debug, PartialEq)]
pub struct ManualEntry {
    pub operation: Operation,
    pub power: Kilowatts,
    pub start: RawTimestamp,
    pub duration_hours: i64,
}

/// Parses `operation,power,start,hours`, for example `charge,2.5,2025-01-15 10:00,2`.
impl FromStr for ManualEntry {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        let [operation, power, start, hours] = parts.as_slice() else {
            return Err(Error::InvalidInput(format!(
                "expected `operation,power,start,hours`, got `{text}`"
            )));
        };
        let operation = <Operation as clap::ValueEnum>::from_str(operation, true)
            .map_err(|_| Error::InvalidInput(format!("unknown operation `{operation}`")))?;
        let power = power
            .parse::<f64>()
            .map_err(|error| Error::InvalidInput(format!("power `{power}`: {error}")))?;
        let duration_hours = hours
            .parse::<i64>()
            .map_err(|error| Error::InvalidInput(format!("duration `{hours}`: {error}")))?;
        Ok(Self {
            operation,
            power: Kilowatts::new(power),
            start: RawTimestamp::from(*start),
            duration_hours,
        })
    }
}

impl ManualEntry {
    pub const DURATION_HOURS: std::ops::RangeInclusive<i64> = 1..=12;

    /// Start and end of a well-formed entry.
    pub fn window(&self) -> Result<(DateTime<Local>, DateTime<Local>)> {
        let start = self
            .start
            .parse()
            .ok_or_else(|| Error::InvalidInput(format!("unparseable start `{:?}`", self.start)))?;
        if !Self::DURATION_HOURS.contains(&self.duration_hours) {
            return Err(Error::InvalidInput(format!(
                "duration of {} hours is outside 1-12",
                self.duration_hours
            )));
        }
        if !self.power.is_finite() || self.power <= Kilowatts::ZERO {
            return Err(Error::InvalidInput(format!("power must be positive, got {}", self.power)));
        }
        Ok((start, start + TimeDelta::hours(self.duration_hours)))
    }
}

impl EntryStatus {
    #[must_use]
    pub fn at(start: DateTime<Local>, end: DateTime<Local>, now: DateTime<Local>) -> Self {
        if now < start {
            Self::Scheduled
        } else if now < end {
            Self::InProgress
        } else {
            Self::Completed
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct ManualOutcome {
    pub operation: Operation,
    pub power: Kilowatts,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub status: EntryStatus,

    /// Whether the battery accepted the energy of an in-progress entry.
    pub applied: bool,
}

/// Apply the in-progress entries to the battery, one hour of energy each.
#[instrument(skip_all, name = "applying manual entries…", fields(n_entries = entries.len()))]
pub fn apply_entries(
    battery: &mut BatteryModel,
    entries: &[ManualEntry],
    now: DateTime<Local>,
) -> Vec<ManualOutcome> {
    let today = now.date_naive();
    entries
        .iter()
        .filter_map(|entry| {
            let (start, end) = entry
                .window()
                .inspect_err(|error| warn!(?entry, "skipping manual entry: {error:#}"))
                .ok()?;
            let status = EntryStatus::at(start, end, now);
            let applied = status == EntryStatus::InProgress && {
                let energy = entry.power * Hours::ONE;
                match entry.operation {
                    Operation::Charge => battery.charge_on(energy, today),
                    Operation::Discharge => battery.discharge_on(energy, today),
                }
            };
            if status == EntryStatus::InProgress && !applied {
                warn!(?entry, soc = battery.current_soc(), "battery declined the manual entry");
            }
            Some(ManualOutcome {
                operation: entry.operation,
                power: entry.power,
                start,
                end,
                status,
                applied,
            })
        })
        .collect()
}
