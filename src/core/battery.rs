mod config;
mod consumption;
mod counters;

use chrono::{DateTime, Local, NaiveDate, Timelike};
use serde::Serialize;

pub use self::{
    config::{BatteryConfig, BatteryConfigBuilder, MonthlyDistribution, UsagePattern},
    consumption::ConsumptionInterval,
    counters::DailyCounters,
};
use crate::{
    prelude::*,
    quantity::{energy::KilowattHours, power::Kilowatts, time::Hours},
};

/// Tolerance for state-of-charge bound checks.
const SOC_EPSILON: f64 = 1e-9;

/// Live battery state, mutated only through [`BatteryModel`].
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct BatteryState {
    pub current_soc: f64,

    /// Day the counters belong to.
    pub date: NaiveDate,

    pub counters: DailyCounters,
}

/// Battery configuration together with its live state.
///
/// Mutation requires `&mut self`, so a shared instance needs a single owner or a lock.
/// Optimizations run on a [`BatterySnapshot`] instead.
#[derive(Clone, Debug, derive_more::Deref)]
pub struct BatteryModel {
    #[deref]
    config: BatteryConfig,

    state: BatteryState,
}

impl BatteryModel {
    pub fn try_new(config: BatteryConfig, current_soc: f64) -> Result<Self> {
        Self::try_new_on(config, current_soc, Local::now().date_naive())
    }

    pub fn try_new_on(config: BatteryConfig, current_soc: f64, today: NaiveDate) -> Result<Self> {
        config.validate()?;
        config.validate_soc(current_soc)?;
        Ok(Self {
            config,
            state: BatteryState { current_soc, date: today, counters: DailyCounters::default() },
        })
    }

    #[must_use]
    pub const fn config(&self) -> &BatteryConfig {
        &self.config
    }

    #[must_use]
    pub const fn state(&self) -> &BatteryState {
        &self.state
    }

    #[must_use]
    pub const fn current_soc(&self) -> f64 {
        self.state.current_soc
    }

    pub fn available_capacity(&self) -> KilowattHours {
        self.config.capacity * (self.config.max_soc - self.state.current_soc)
    }

    pub fn current_energy(&self) -> KilowattHours {
        self.config.capacity * self.state.current_soc
    }

    #[must_use]
    pub fn can_charge(&self, amount: KilowattHours) -> bool {
        self.state.current_soc + amount / self.config.capacity <= self.config.max_soc + SOC_EPSILON
    }

    #[must_use]
    pub fn can_discharge(&self, amount: KilowattHours) -> bool {
        self.state.current_soc - amount / self.config.capacity >= self.config.min_soc - SOC_EPSILON
    }

    /// Charge using the wall-clock date for the daily budget.
    pub fn charge(&mut self, amount: KilowattHours) -> bool {
        self.charge_on(amount, Local::now().date_naive())
    }

    pub fn discharge(&mut self, amount: KilowattHours) -> bool {
        self.discharge_on(amount, Local::now().date_naive())
    }

    pub fn charge_on(&mut self, amount: KilowattHours, today: NaiveDate) -> bool {
        self.roll_over(today);
        if !Self::is_valid_amount(amount) || !self.can_charge(amount) {
            debug!(?amount, soc = self.state.current_soc, "charge declined");
            return false;
        }
        if !self.state.counters.can_charge_again(self.config.max_charge_events) {
            debug!(events = self.state.counters.charge_events, "charge event cap reached");
            return false;
        }
        self.apply(amount)
    }

    pub fn discharge_on(&mut self, amount: KilowattHours, today: NaiveDate) -> bool {
        self.roll_over(today);
        if !Self::is_valid_amount(amount) || !self.can_discharge(amount) {
            debug!(?amount, soc = self.state.current_soc, "discharge declined");
            return false;
        }
        if !self.state.counters.can_discharge_again(self.config.max_discharge_events) {
            debug!(events = self.state.counters.discharge_events, "discharge event cap reached");
            return false;
        }
        self.apply(-amount)
    }

    /// Book the signed energy if the daily cycle budget allows it.
    fn apply(&mut self, energy: KilowattHours) -> bool {
        let cycles = energy.abs() / self.config.capacity;
        if self.state.counters.cycles_used + cycles
            > self.config.max_daily_cycles + DailyCounters::EPSILON
        {
            debug!(cycles_used = self.state.counters.cycles_used, "daily cycle budget exhausted");
            return false;
        }
        self.state.current_soc = (self.state.current_soc + energy / self.config.capacity)
            .clamp(self.config.empty_soc, self.config.max_soc);
        self.state.counters.record(energy, self.config.capacity);
        info!(?energy, soc = self.state.current_soc, "battery updated");
        true
    }

    fn is_valid_amount(amount: KilowattHours) -> bool {
        amount.is_finite() && amount > KilowattHours::ZERO
    }

    fn roll_over(&mut self, today: NaiveDate) {
        if self.state.date != today {
            debug!(from = %self.state.date, to = %today, "resetting daily counters");
            self.state.date = today;
            self.state.counters = DailyCounters::default();
        }
    }

    /// Suggested instantaneous power for a battery without a schedule.
    pub fn current_power(&self, now: DateTime<Local>) -> Kilowatts {
        let soc = self.state.current_soc;
        let rate = self.config.charge_rate;
        let headroom = self.available_capacity() / Hours::ONE;
        let consumption = self.config.consumption_at(now) / Hours::ONE;

        if soc <= self.config.min_soc {
            Kilowatts::ZERO
        } else if soc < 0.3 {
            rate.min(headroom)
        } else if soc > 0.8 {
            -rate.min(consumption)
        } else {
            match now.hour() {
                0..=5 => (rate * 0.8).min(headroom),
                10..=15 => -(rate * 0.6).min(consumption),
                _ => -(rate * 0.3).min(consumption),
            }
        }
    }

    /// Immutable copy of the configuration and the current state of charge.
    #[must_use]
    pub fn snapshot(&self) -> BatterySnapshot {
        BatterySnapshot { config: self.config.clone(), soc: self.state.current_soc }
    }
}

/// Starting point of an optimization.
#[derive(Clone, Debug, PartialEq)]
pub struct BatterySnapshot {
    pub config: BatteryConfig,
    pub soc: f64,
}

impl BatterySnapshot {
    pub fn try_new(config: BatteryConfig, soc: f64) -> Result<Self> {
        config.validate()?;
        config.validate_soc(soc)?;
        Ok(Self { config, soc })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    use super::*;
    use crate::quantity::rate::KilowattHourRate;

    fn config() -> BatteryConfig {
        BatteryConfig::builder()
            .name("Test")
            .capacity(KilowattHours::new(10.0))
            .empty_soc(0.05)
            .min_soc(0.1)
            .max_soc(0.9)
            .charge_rate(Kilowatts::new(5.0))
            .max_daily_cycles(1.0)
            .surcharge_rate(KilowattHourRate::ZERO)
            .build()
            .unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    #[test]
    fn test_capacity_queries() {
        let battery = BatteryModel::try_new_on(config(), 0.5, today()).unwrap();
        assert_abs_diff_eq!(battery.available_capacity().value(), 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(battery.current_energy().value(), 5.0);
        assert!(battery.can_charge(KilowattHours::new(4.0)));
        assert!(!battery.can_charge(KilowattHours::new(4.1)));
        assert!(battery.can_discharge(KilowattHours::new(4.0)));
        assert!(!battery.can_discharge(KilowattHours::new(4.1)));
    }

    #[test]
    fn test_rejects_soc_out_of_bounds() {
        assert!(matches!(
            BatteryModel::try_new_on(config(), 0.95, today()),
            Err(Error::Configuration(_)),
        ));
    }

    #[test]
    fn test_charge_and_discharge() {
        let mut battery = BatteryModel::try_new_on(config(), 0.5, today()).unwrap();
        assert!(battery.charge_on(KilowattHours::new(3.0), today()));
        assert_abs_diff_eq!(battery.current_soc(), 0.8, epsilon = 1e-9);
        assert!(battery.discharge_on(KilowattHours::new(5.0), today()));
        assert_abs_diff_eq!(battery.current_soc(), 0.3, epsilon = 1e-9);
        assert_eq!(battery.state().counters.charge_events, 1);
        assert_eq!(battery.state().counters.discharge_events, 1);
        assert_abs_diff_eq!(battery.state().counters.cycles_used, 0.8, epsilon = 1e-9);
    }

    /// A declined operation leaves the state untouched.
    #[test]
    fn test_declined_capability() {
        let mut battery = BatteryModel::try_new_on(config(), 0.5, today()).unwrap();
        assert!(!battery.charge_on(KilowattHours::new(5.0), today()));
        assert!(!battery.discharge_on(KilowattHours::new(-1.0), today()));
        assert!(!battery.charge_on(KilowattHours::new(f64::NAN), today()));
        assert_abs_diff_eq!(battery.current_soc(), 0.5);
        assert_eq!(battery.state().counters, DailyCounters::default());
    }

    #[test]
    fn test_cycle_budget() {
        let mut battery = BatteryModel::try_new_on(config(), 0.5, today()).unwrap();
        assert!(battery.charge_on(KilowattHours::new(4.0), today()));
        assert!(battery.discharge_on(KilowattHours::new(5.0), today()));
        // 0.9 cycles used, 0.2 more would exceed the budget of 1.0:
        assert!(!battery.charge_on(KilowattHours::new(2.0), today()));
        assert!(battery.charge_on(KilowattHours::new(1.0), today()));
    }

    /// Counters start over on the next day.
    #[test]
    fn test_roll_over() {
        let mut battery = BatteryModel::try_new_on(config(), 0.5, today()).unwrap();
        assert!(battery.charge_on(KilowattHours::new(4.0), today()));
        assert!(battery.discharge_on(KilowattHours::new(5.0), today()));
        let tomorrow = today().succ_opt().unwrap();
        assert!(battery.charge_on(KilowattHours::new(2.0), tomorrow));
        assert_eq!(battery.state().date, tomorrow);
        assert_eq!(battery.state().counters.charge_events, 1);
        assert_eq!(battery.state().counters.discharge_events, 0);
    }

    #[test]
    fn test_event_caps() {
        let config = BatteryConfig { max_charge_events: Some(1), ..config() };
        let mut battery = BatteryModel::try_new_on(config, 0.2, today()).unwrap();
        assert!(battery.charge_on(KilowattHours::new(1.0), today()));
        assert!(!battery.charge_on(KilowattHours::new(1.0), today()));
        assert!(battery.discharge_on(KilowattHours::new(1.0), today()));
    }

    #[test]
    fn test_current_power() {
        let night = Local.with_ymd_and_hms(2025, 1, 15, 3, 0, 0).unwrap();
        let noon = Local.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();

        let empty = BatteryModel::try_new_on(config(), 0.1, today()).unwrap();
        assert_eq!(empty.current_power(noon), Kilowatts::ZERO);

        let low = BatteryModel::try_new_on(config(), 0.2, today()).unwrap();
        assert_abs_diff_eq!(low.current_power(noon).value(), 5.0);

        let half = BatteryModel::try_new_on(config(), 0.5, today()).unwrap();
        assert_abs_diff_eq!(half.current_power(night).value(), 4.0, epsilon = 1e-9);
        assert!(half.current_power(noon) < Kilowatts::ZERO);
    }

    #[test]
    fn test_snapshot() {
        let battery = BatteryModel::try_new_on(config(), 0.5, today()).unwrap();
        let snapshot = battery.snapshot();
        assert_abs_diff_eq!(snapshot.soc, 0.5);
        assert_eq!(snapshot.config, *battery.config());
        assert!(BatterySnapshot::try_new(config(), 0.01).is_err());
    }
}
