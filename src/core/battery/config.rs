use std::fmt::{Display, Formatter};

use bon::Builder;
use chrono::{DateTime, Datelike, Days, Local, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};

use crate::{
    core::battery::consumption::{ConsumptionInterval, hourly_factor},
    prelude::*,
    quantity::{energy::KilowattHours, power::Kilowatts, rate::KilowattHourRate},
};

/// Immutable battery and household description.
///
/// Build it with [`BatteryConfig::builder`] or load it with [`BatteryConfig::from_toml_str`],
/// both validate the result.
#[derive(Clone, Debug, PartialEq, Builder, Serialize, Deserialize)]
#[builder(finish_fn(vis = "", name = build_unchecked))]
#[serde(deny_unknown_fields)]
pub struct BatteryConfig {
    #[builder(into)]
    pub name: String,

    /// Total usable capacity.
    pub capacity: KilowattHours,

    /// Physical floor of the state of charge.
    pub empty_soc: f64,

    /// Lowest state of charge the scheduler may discharge to.
    pub min_soc: f64,

    pub max_soc: f64,

    /// Maximum charging and discharging power.
    pub charge_rate: Kilowatts,

    #[builder(default = defaults::MAX_DAILY_CYCLES)]
    #[serde(default = "defaults::max_daily_cycles")]
    pub max_daily_cycles: f64,

    #[serde(default)]
    pub max_charge_events: Option<u32>,

    #[serde(default)]
    pub max_discharge_events: Option<u32>,

    /// Flat grid surcharge added on top of the market price.
    #[builder(default = defaults::SURCHARGE_RATE)]
    #[serde(default = "defaults::surcharge_rate")]
    pub surcharge_rate: KilowattHourRate,

    #[builder(default = defaults::YEARLY_CONSUMPTION)]
    #[serde(default = "defaults::yearly_consumption")]
    pub yearly_consumption: KilowattHours,

    #[builder(default)]
    #[serde(default)]
    pub monthly_distribution: MonthlyDistribution,

    #[builder(default)]
    #[serde(default)]
    pub usage_pattern: UsagePattern,

    #[builder(default = defaults::LOOK_AHEAD_HOURS)]
    #[serde(default = "defaults::look_ahead_hours")]
    pub look_ahead_hours: u32,

    #[builder(default = defaults::PV_EFFICIENCY)]
    #[serde(default = "defaults::pv_efficiency")]
    pub pv_efficiency: f64,

    /// Installed solar peak power in watts.
    #[builder(default)]
    #[serde(default)]
    pub max_watt_peak: f64,
}

impl<S: battery_config_builder::IsComplete> BatteryConfigBuilder<S> {
    pub fn build(self) -> Result<BatteryConfig> {
        let config = self.build_unchecked();
        config.validate()?;
        Ok(config)
    }
}

mod defaults {
    use crate::quantity::{energy::KilowattHours, rate::KilowattHourRate};

    pub const MAX_DAILY_CYCLES: f64 = 1.5;
    pub const SURCHARGE_RATE: KilowattHourRate = KilowattHourRate::new(0.050);
    pub const YEARLY_CONSUMPTION: KilowattHours = KilowattHours::new(5475.0);
    pub const LOOK_AHEAD_HOURS: u32 = 12;
    pub const PV_EFFICIENCY: f64 = 0.15;

    pub const fn max_daily_cycles() -> f64 {
        MAX_DAILY_CYCLES
    }

    pub const fn surcharge_rate() -> KilowattHourRate {
        SURCHARGE_RATE
    }

    pub const fn yearly_consumption() -> KilowattHours {
        YEARLY_CONSUMPTION
    }

    pub const fn look_ahead_hours() -> u32 {
        LOOK_AHEAD_HOURS
    }

    pub const fn pv_efficiency() -> f64 {
        PV_EFFICIENCY
    }
}

fn check(condition: bool, message: impl FnOnce() -> String) -> Result {
    if condition { Ok(()) } else { Err(Error::Configuration(message())) }
}

impl BatteryConfig {
    /// Parse a TOML profile and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|error| Error::Configuration(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result {
        check(self.capacity.is_finite() && self.capacity > KilowattHours::ZERO, || {
            format!("capacity must be positive, got {}", self.capacity)
        })?;
        check(
            0.0 <= self.empty_soc
                && self.empty_soc <= self.min_soc
                && self.min_soc < self.max_soc
                && self.max_soc <= 1.0,
            || {
                format!(
                    "expected 0 ≤ empty_soc ≤ min_soc < max_soc ≤ 1, got {} / {} / {}",
                    self.empty_soc, self.min_soc, self.max_soc,
                )
            },
        )?;
        check(self.charge_rate.is_finite() && self.charge_rate > Kilowatts::ZERO, || {
            format!("charge rate must be positive, got {}", self.charge_rate)
        })?;
        check(self.max_daily_cycles.is_finite() && self.max_daily_cycles > 0.0, || {
            format!("max daily cycles must be positive, got {}", self.max_daily_cycles)
        })?;
        check(self.surcharge_rate.is_finite() && self.surcharge_rate >= KilowattHourRate::ZERO, || {
            format!("surcharge must not be negative, got {}", self.surcharge_rate)
        })?;
        check(
            self.yearly_consumption.is_finite() && self.yearly_consumption >= KilowattHours::ZERO,
            || format!("yearly consumption must not be negative, got {}", self.yearly_consumption),
        )?;
        check(self.monthly_distribution.is_valid(), || {
            format!("monthly factors must be positive, got {:?}", self.monthly_distribution.0)
        })?;
        check(self.look_ahead_hours > 0, || "look-ahead must be at least one hour".to_string())?;
        check((0.0..=1.0).contains(&self.pv_efficiency), || {
            format!("PV efficiency must be within 0..=1, got {}", self.pv_efficiency)
        })?;
        check(self.max_watt_peak.is_finite() && self.max_watt_peak >= 0.0, || {
            format!("peak power must not be negative, got {}", self.max_watt_peak)
        })?;
        Ok(())
    }

    /// Check that the state of charge lies within the physical bounds.
    pub fn validate_soc(&self, soc: f64) -> Result {
        check((self.empty_soc..=self.max_soc).contains(&soc), || {
            format!(
                "state of charge {soc} is outside of {}..={}",
                self.empty_soc, self.max_soc
            )
        })
    }

    /// Market price plus the surcharge, rounded to a tenth of a cent.
    pub fn effective_price(&self, base_price: KilowattHourRate, _hour: u32) -> KilowattHourRate {
        (base_price + self.surcharge_rate).round_to(3)
    }

    pub fn daily_consumption_for(&self, date: NaiveDate) -> KilowattHours {
        self.yearly_consumption / 365.0 * self.monthly_distribution.factor(date.month())
    }

    /// Expected household consumption during the given hour of the day.
    ///
    /// Hours past midnight roll over to the following days.
    pub fn hourly_consumption(&self, hour: u32, date: NaiveDate) -> KilowattHours {
        let (hour, date) = if hour > 24 {
            (hour % 24, date.checked_add_days(Days::new(u64::from(hour / 24))).unwrap_or(date))
        } else {
            (hour, date)
        };
        let is_weekend = date.weekday().number_from_monday() >= 6;
        self.daily_consumption_for(date) / 24.0 * hourly_factor(hour, is_weekend)
    }

    pub fn consumption_at(&self, timestamp: DateTime<Local>) -> KilowattHours {
        self.hourly_consumption(timestamp.hour(), timestamp.date_naive())
    }

    pub fn consumption_interval(&self, date: NaiveDate) -> ConsumptionInterval {
        ConsumptionInterval::around(self.daily_consumption_for(date))
    }

    pub fn min_energy(&self) -> KilowattHours {
        self.capacity * self.min_soc
    }

    pub fn max_energy(&self) -> KilowattHours {
        self.capacity * self.max_soc
    }
}

/// Seasonal consumption factors for January through December.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthlyDistribution(pub [f64; 12]);

impl MonthlyDistribution {
    pub const STANDARD: Self = Self([1.2, 1.15, 1.0, 0.9, 0.8, 0.7, 0.7, 0.7, 0.8, 0.9, 1.0, 1.15]);

    /// Deeper summer dip, used by the built-in profiles.
    pub const SOLAR_SUMMER: Self =
        Self([1.2, 1.15, 1.0, 0.9, 0.5, 0.4, 0.5, 0.7, 0.8, 0.9, 1.0, 1.15]);

    /// Factor for the 1-based month, neutral for anything else.
    #[must_use]
    pub fn factor(&self, month: u32) -> f64 {
        month
            .checked_sub(1)
            .and_then(|index| self.0.get(index as usize))
            .copied()
            .unwrap_or(1.0)
    }

    fn is_valid(&self) -> bool {
        self.0.iter().all(|factor| factor.is_finite() && *factor > 0.0)
    }
}

impl Default for MonthlyDistribution {
    fn default() -> Self {
        Self::STANDARD
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UsagePattern {
    #[default]
    Flat,
    DayHeavy,
    NightHeavy,
}

impl Display for UsagePattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flat => write!(f, "Flat"),
            Self::DayHeavy => write!(f, "Day-heavy"),
            Self::NightHeavy => write!(f, "Night-heavy"),
        }
    }
}
