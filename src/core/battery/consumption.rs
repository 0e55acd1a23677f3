use serde::Serialize;

use crate::quantity::energy::KilowattHours;

/// Relative share of the daily consumption drawn during the hour.
pub const fn hourly_factor(hour: u32, is_weekend: bool) -> f64 {
    if is_weekend {
        match hour {
            9..=12 => 1.8,
            13..=22 => 1.5,
            _ => 0.4,
        }
    } else {
        match hour {
            7..=9 => 2.0,
            17..=22 => 2.5,
            0..=6 => 0.3,
            _ => 0.8,
        }
    }
}

/// Expected daily consumption with its 95% band.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConsumptionInterval {
    pub mean: KilowattHours,
    pub lower_95: KilowattHours,
    pub upper_95: KilowattHours,
}

impl ConsumptionInterval {
    const RELATIVE_DEVIATION: f64 = 0.15;
    const Z_95: f64 = 1.96;

    pub fn around(mean: KilowattHours) -> Self {
        let margin = mean * (Self::RELATIVE_DEVIATION * Self::Z_95);
        Self { mean, lower_95: mean - margin, upper_95: mean + margin }
    }
}
