use std::collections::BTreeMap;

use chrono::NaiveDate;
use itertools::Itertools;
use serde::Serialize;

use crate::{
    core::{
        battery::{BatteryConfig, ConsumptionInterval, DailyCounters},
        optimizer::Step,
        series::Warning,
        thresholds::DayThresholds,
    },
    quantity::{
        cost::Cost,
        energy::KilowattHours,
        power::Kilowatts,
        rate::KilowattHourRate,
        time::Hours,
    },
};

/// Per-date consumption and budget usage within the horizon.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct DailyConsumption {
    pub date: NaiveDate,

    /// Modelled consumption of the whole day.
    pub expected: ConsumptionInterval,

    /// Net consumption of the scheduled periods of the day.
    pub scheduled: KilowattHours,

    pub counters: DailyCounters,
}

/// Plan produced by a single optimization.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct OptimizationResult {
    /// Signed power per period.
    pub schedule: Vec<Kilowatts>,

    /// State of charge at each quarter of each period.
    pub trajectory: Vec<f64>,

    pub steps: Vec<Step>,
    pub daily: Vec<DailyConsumption>,
    pub thresholds: BTreeMap<NaiveDate, DayThresholds>,
    pub warnings: Vec<Warning>,

    /// Net household consumption without the battery.
    pub consumption: KilowattHours,

    /// Cost of the net consumption at the raw prices.
    pub consumption_cost: Cost,

    /// Net energy the schedule draws into the battery.
    pub optimize_consumption: KilowattHours,

    /// Cost of the scheduled energy at the raw prices.
    pub optimize_cost: Cost,
}

impl OptimizationResult {
    /// Aggregate the steps of a finished optimization.
    pub(crate) fn collect(
        config: &BatteryConfig,
        period_hours: Hours,
        steps: Vec<Step>,
        counters: BTreeMap<NaiveDate, DailyCounters>,
        thresholds: BTreeMap<NaiveDate, DayThresholds>,
        warnings: Vec<Warning>,
    ) -> Self {
        let mut result = Self { thresholds, warnings, ..Self::default() };
        for step in &steps {
            let Some(price) = step.price else { continue };
            let energy = step.power * period_hours;
            result.consumption += step.net_consumption;
            result.consumption_cost += step.net_consumption * price;
            result.optimize_consumption += energy;
            result.optimize_cost += energy * price;
        }
        result.schedule = steps.iter().map(|step| step.power).collect();
        result.trajectory = steps.iter().flat_map(|step| step.trajectory.0).collect();
        result.daily = steps
            .iter()
            .chunk_by(|step| step.timestamp.date_naive())
            .into_iter()
            .map(|(date, steps)| DailyConsumption {
                date,
                expected: config.consumption_interval(date),
                scheduled: steps.map(|step| step.net_consumption).sum(),
                counters: counters.get(&date).copied().unwrap_or_default(),
            })
            .collect();
        result.steps = steps;
        result
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.schedule.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.schedule.is_empty()
    }

    pub fn savings(&self) -> Cost {
        self.consumption_cost - self.optimize_cost
    }

    /// Average raw price of the household consumption, zero without consumption.
    pub fn avg_price(&self) -> KilowattHourRate {
        if self.consumption > KilowattHours::ZERO {
            self.consumption_cost / self.consumption
        } else {
            KilowattHourRate::ZERO
        }
    }

    /// Average raw price of the scheduled energy, zero without net charging.
    pub fn avg_optimized_price(&self) -> KilowattHourRate {
        if self.optimize_consumption > KilowattHours::ZERO {
            self.optimize_cost / self.optimize_consumption
        } else {
            KilowattHourRate::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_empty() {
        let result = OptimizationResult::default();
        assert!(result.is_empty());
        assert_eq!(result.savings(), Cost::ZERO);
        assert_eq!(result.avg_price(), KilowattHourRate::ZERO);
        assert_eq!(result.avg_optimized_price(), KilowattHourRate::ZERO);
    }

    #[test]
    fn test_derived_metrics() {
        let result = OptimizationResult {
            consumption: KilowattHours::new(4.0),
            consumption_cost: Cost::new(1.0),
            optimize_consumption: KilowattHours::new(2.0),
            optimize_cost: Cost::new(0.3),
            ..OptimizationResult::default()
        };
        assert_abs_diff_eq!(result.savings().value(), 0.7);
        assert_abs_diff_eq!(result.avg_price().value(), 0.25);
        assert_abs_diff_eq!(result.avg_optimized_price().value(), 0.15);
    }

    /// Discharging more than charging leaves no meaningful average.
    #[test]
    fn test_negative_optimize_consumption() {
        let result = OptimizationResult {
            optimize_consumption: KilowattHours::new(-1.0),
            optimize_cost: Cost::new(-0.3),
            ..OptimizationResult::default()
        };
        assert_eq!(result.avg_optimized_price(), KilowattHourRate::ZERO);
    }
}
