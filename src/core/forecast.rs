use std::collections::BTreeMap;

use chrono::{DateTime, Local};

use crate::quantity::power::Kilowatts;

/// Solar production forecast, absent entries mean no production.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PvForecast(BTreeMap<DateTime<Local>, Kilowatts>);

impl FromIterator<(DateTime<Local>, Kilowatts)> for PvForecast {
    fn from_iter<T: IntoIterator<Item = (DateTime<Local>, Kilowatts)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl PvForecast {
    /// Forecasted power, never negative.
    pub fn at(&self, timestamp: DateTime<Local>) -> Kilowatts {
        self.0
            .get(&timestamp)
            .copied()
            .filter(|power| power.is_finite())
            .unwrap_or(Kilowatts::ZERO)
            .max(Kilowatts::ZERO)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
