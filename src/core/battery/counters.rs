use serde::Serialize;

use crate::quantity::energy::KilowattHours;

/// Throughput booked against a single calendar day.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct DailyCounters {
    /// Cumulative |energy| over capacity.
    pub cycles_used: f64,

    pub charge_events: u32,
    pub discharge_events: u32,
}

impl DailyCounters {
    /// Budgets within this margin count as exhausted.
    pub const EPSILON: f64 = 1e-9;

    pub fn remaining_cycles(&self, max_daily_cycles: f64) -> f64 {
        max_daily_cycles - self.cycles_used
    }

    pub fn is_exhausted(&self, max_daily_cycles: f64) -> bool {
        self.remaining_cycles(max_daily_cycles) <= Self::EPSILON
    }

    /// Book a signed energy flow, positive when charging.
    pub fn record(&mut self, energy: KilowattHours, capacity: KilowattHours) {
        self.cycles_used += energy.abs() / capacity;
        if energy > KilowattHours::ZERO {
            self.charge_events += 1;
        } else if energy < KilowattHours::ZERO {
            self.discharge_events += 1;
        }
    }

    pub fn can_charge_again(&self, cap: Option<u32>) -> bool {
        cap.is_none_or(|cap| self.charge_events < cap)
    }

    pub fn can_discharge_again(&self, cap: Option<u32>) -> bool {
        cap.is_none_or(|cap| self.discharge_events < cap)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_record() {
        let mut counters = DailyCounters::default();
        counters.record(KilowattHours::new(4.0), KilowattHours::new(10.0));
        counters.record(KilowattHours::new(-5.0), KilowattHours::new(10.0));
        counters.record(KilowattHours::ZERO, KilowattHours::new(10.0));
        assert_abs_diff_eq!(counters.cycles_used, 0.9);
        assert_eq!(counters.charge_events, 1);
        assert_eq!(counters.discharge_events, 1);
        assert_abs_diff_eq!(counters.remaining_cycles(1.5), 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_event_caps() {
        let counters = DailyCounters { cycles_used: 0.0, charge_events: 2, discharge_events: 0 };
        assert!(!counters.can_charge_again(Some(2)));
        assert!(counters.can_charge_again(None));
        assert!(counters.can_discharge_again(Some(1)));
    }
}
