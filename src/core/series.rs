use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeDelta};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    prelude::*,
    quantity::{rate::KilowattHourRate, time::Hours},
};

/// Timestamp as it arrives from a collaborator, before normalization.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, derive_more::From)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Unix epoch seconds.
    Epoch(i64),

    /// RFC 3339, or naive local `YYYY-MM-DD HH:MM[:SS]`.
    Text(String),

    #[serde(skip)]
    Local(DateTime<Local>),
}

impl From<&str> for RawTimestamp {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl RawTimestamp {
    const NAIVE_FORMATS: [&str; 4] =
        ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

    pub fn parse(&self) -> Option<DateTime<Local>> {
        match self {
            Self::Local(timestamp) => Some(*timestamp),
            Self::Epoch(seconds) => {
                DateTime::from_timestamp(*seconds, 0).map(|timestamp| timestamp.with_timezone(&Local))
            }
            Self::Text(text) => {
                let text = text.trim();
                if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
                    return Some(timestamp.with_timezone(&Local));
                }
                Self::NAIVE_FORMATS
                    .iter()
                    .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                    .and_then(|naive| naive.and_local_timezone(Local).earliest())
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RawPricePoint {
    pub timestamp: RawTimestamp,

    /// Market price in €/kWh.
    pub price: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Local>,
    pub price: KilowattHourRate,
}

/// Single validated period of a [`PriceSeries`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Period {
    pub timestamp: DateTime<Local>,

    /// `None` when the period is skipped.
    pub price: Option<KilowattHourRate>,
}

impl Period {
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        self.price.is_none()
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Recoverable problem with a single period.
#[derive(Clone, Debug, PartialEq, Serialize, derive_more::Display)]
pub enum Warning {
    #[display("period #{index}: cannot parse timestamp {raw}, skipped")]
    UnparseableTimestamp { index: usize, raw: String },

    #[display("period #{index} at {timestamp}: invalid price {price}, skipped")]
    InvalidPrice { index: usize, timestamp: DateTime<Local>, price: f64 },
}

/// Strictly increasing price series with a uniform cadence.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceSeries {
    cadence: TimeDelta,
    periods: Vec<Period>,
    warnings: Vec<Warning>,
}

impl Default for PriceSeries {
    fn default() -> Self {
        Self { cadence: Self::DEFAULT_CADENCE, periods: Vec::new(), warnings: Vec::new() }
    }
}

impl PriceSeries {
    /// Two weeks of hourly prices.
    pub const MAX_LEN: usize = 14 * 24;

    pub const DEFAULT_CADENCE: TimeDelta = TimeDelta::hours(1);

    pub fn try_from_points(points: impl IntoIterator<Item = PricePoint>) -> Result<Self> {
        Self::try_from_slots(
            points.into_iter().map(|point| (Ok(point.timestamp), point.price.value())).collect(),
        )
    }

    /// Normalize loosely-typed input.
    ///
    /// Entries with unparseable timestamps keep their position and are skipped.
    #[instrument(skip_all, name = "ingesting prices…", fields(len = raw.len()))]
    pub fn ingest(raw: Vec<RawPricePoint>) -> Result<Self> {
        Self::try_from_slots(
            raw.into_iter()
                .map(|point| (point.timestamp.parse().ok_or(point.timestamp), point.price))
                .collect(),
        )
    }

    fn try_from_slots(slots: Vec<(Result<DateTime<Local>, RawTimestamp>, f64)>) -> Result<Self> {
        if slots.is_empty() {
            return Ok(Self::default());
        }
        if slots.len() > Self::MAX_LEN {
            return Err(Error::InvalidInput(format!(
                "{} periods exceed the limit of {}",
                slots.len(),
                Self::MAX_LEN,
            )));
        }

        let anchors = slots
            .iter()
            .enumerate()
            .filter_map(|(index, (timestamp, _))| Some((index, *timestamp.as_ref().ok()?)))
            .collect_vec();
        let Some(&(first_index, first_timestamp)) = anchors.first() else {
            return Err(Error::InvalidInput(format!(
                "none of the {} timestamps could be parsed",
                slots.len(),
            )));
        };

        let cadence = match anchors.get(1) {
            Some(&(index, timestamp)) => {
                if timestamp <= first_timestamp {
                    return Err(non_monotonic(index));
                }
                (timestamp - first_timestamp) / steps(index - first_index)
            }
            None => Self::DEFAULT_CADENCE,
        };
        for ((left_index, left), (right_index, right)) in anchors.iter().copied().tuple_windows() {
            if right <= left {
                return Err(non_monotonic(right_index));
            }
            if right - left != offset(cadence, right_index - left_index)? {
                return Err(Error::InvalidInput(format!(
                    "irregular cadence at period #{right_index}: expected steps of {cadence}",
                )));
            }
        }

        let origin = first_timestamp
            .checked_sub_signed(offset(cadence, first_index)?)
            .ok_or_else(|| out_of_range(0))?;
        let mut warnings = Vec::new();
        let periods = slots
            .into_iter()
            .enumerate()
            .map(|(index, (timestamp, price))| match timestamp {
                Ok(timestamp) if price.is_finite() => {
                    Ok(Period { timestamp, price: Some(KilowattHourRate::new(price)) })
                }
                Ok(timestamp) => {
                    warnings.push(Warning::InvalidPrice { index, timestamp, price });
                    Ok(Period { timestamp, price: None })
                }
                Err(raw) => {
                    let timestamp = origin
                        .checked_add_signed(offset(cadence, index)?)
                        .ok_or_else(|| out_of_range(index))?;
                    warnings.push(Warning::UnparseableTimestamp { index, raw: format!("{raw:?}") });
                    Ok(Period { timestamp, price: None })
                }
            })
            .collect::<Result<Vec<_>>>()?;
        for warning in &warnings {
            warn!(%warning, "malformed period");
        }

        Ok(Self { cadence, periods, warnings })
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.periods.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    #[must_use]
    pub const fn cadence(&self) -> TimeDelta {
        self.cadence
    }

    pub fn period_hours(&self) -> Hours {
        Hours::from(self.cadence)
    }

    #[must_use]
    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Number of periods covering the given number of hours, at least one.
    #[must_use]
    pub fn periods_in(&self, hours: u32) -> usize {
        let periods = f64::from(hours) / self.period_hours().value();
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let periods = periods.round() as usize;
        periods.max(1)
    }
}

fn non_monotonic(index: usize) -> Error {
    Error::InvalidInput(format!("timestamps are not strictly increasing at period #{index}"))
}

fn out_of_range(index: usize) -> Error {
    Error::InvalidInput(format!("inferred timestamp of period #{index} is out of range"))
}

fn steps(n: usize) -> i32 {
    // Bounded by `PriceSeries::MAX_LEN`.
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Duration of `n` periods, `InvalidInput` on overflow.
fn offset(cadence: TimeDelta, n: usize) -> Result<TimeDelta> {
    i32::try_from(n)
        .ok()
        .and_then(|n| cadence.checked_mul(n))
        .ok_or_else(|| Error::InvalidInput(format!("{n} periods of {cadence} are out of range")))
}
