use serde::Serialize;

use crate::{core::battery::BatteryConfig, quantity::energy::KilowattHours};

/// Number of trajectory points per period.
pub const SUBSTEPS: usize = 4;

const FRACTIONS: [f64; SUBSTEPS] = [0.25, 0.5, 0.75, 1.0];

/// Energy flows of a single period.
#[derive(Copy, Clone, Debug, Default)]
pub struct Flows {
    /// Scheduled battery energy, positive when charging.
    pub battery: KilowattHours,

    pub pv: KilowattHours,

    /// Free capacity at the start of the period.
    pub headroom: KilowattHours,

    /// Household consumption not covered by the solar production.
    pub net_consumption: KilowattHours,
}

/// State of charge at the end of each quarter of a period.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Projection(pub [f64; SUBSTEPS]);

impl Projection {
    #[must_use]
    pub const fn hold(soc: f64) -> Self {
        Self([soc; SUBSTEPS])
    }

    #[must_use]
    pub const fn final_soc(&self) -> f64 {
        self.0[SUBSTEPS - 1]
    }
}

#[derive(Copy, Clone, Debug)]
pub struct SocSimulator {
    pub capacity: KilowattHours,
    pub empty_soc: f64,
    pub max_soc: f64,
}

impl From<&BatteryConfig> for SocSimulator {
    fn from(config: &BatteryConfig) -> Self {
        Self { capacity: config.capacity, empty_soc: config.empty_soc, max_soc: config.max_soc }
    }
}

impl SocSimulator {
    /// Unit-less state-of-charge change over the whole period.
    #[must_use]
    pub fn net_delta(&self, flows: &Flows) -> f64 {
        let charge = flows.battery.max(KilowattHours::ZERO);
        let discharge = flows.battery.min(KilowattHours::ZERO).abs();
        let pv = flows.pv.min(flows.headroom).max(KilowattHours::ZERO);
        (charge + pv - discharge - flows.net_consumption) / self.capacity
    }

    /// Interpolate the period linearly, clipping each point to the physical bounds.
    #[must_use]
    pub fn project(&self, soc: f64, flows: &Flows) -> Projection {
        let delta = self.net_delta(flows);
        Projection(FRACTIONS.map(|fraction| (soc + delta * fraction).clamp(self.empty_soc, self.max_soc)))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn simulator() -> SocSimulator {
        SocSimulator { capacity: KilowattHours::new(10.0), empty_soc: 0.05, max_soc: 0.9 }
    }

    #[test]
    fn normal_operation() {
        let flows = Flows {
            battery: KilowattHours::new(4.0),
            headroom: KilowattHours::new(4.0),
            net_consumption: KilowattHours::new(0.6),
            ..Flows::default()
        };
        let projection = simulator().project(0.5, &flows);
        assert_abs_diff_eq!(projection.0[0], 0.585, epsilon = 1e-12);
        assert_abs_diff_eq!(projection.0[1], 0.67, epsilon = 1e-12);
        assert_abs_diff_eq!(projection.final_soc(), 0.84, epsilon = 1e-12);
    }

    /// Verify capping at the maximum.
    #[test]
    fn overflow() {
        let flows = Flows {
            battery: KilowattHours::new(2.0),
            pv: KilowattHours::new(6.0),
            headroom: KilowattHours::new(1.0),
            ..Flows::default()
        };
        let projection = simulator().project(0.8, &flows);
        assert_abs_diff_eq!(projection.0[0], 0.875, epsilon = 1e-12);
        assert_abs_diff_eq!(projection.0[1], 0.9);
        assert_abs_diff_eq!(projection.final_soc(), 0.9);
    }

    /// Verify capping at the physical floor.
    #[test]
    fn underflow() {
        let flows = Flows {
            battery: KilowattHours::new(-5.0),
            net_consumption: KilowattHours::new(1.0),
            ..Flows::default()
        };
        let projection = simulator().project(0.3, &flows);
        assert_abs_diff_eq!(projection.0[0], 0.15, epsilon = 1e-12);
        assert_abs_diff_eq!(projection.final_soc(), 0.05);
    }

    #[test]
    fn test_hold() {
        assert_eq!(Projection::hold(0.4).0, [0.4; SUBSTEPS]);
    }
}
