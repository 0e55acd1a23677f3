use chrono::{DateTime, Local, Timelike};

use crate::{
    core::{battery::BatteryConfig, forecast::PvForecast, series::PriceSeries},
    quantity::power::Kilowatts,
};

pub trait PvForecastProvider {
    /// Expected solar power at the timestamp.
    fn forecast(&self, max_watt_peak: f64, pv_efficiency: f64, timestamp: DateTime<Local>)
    -> Kilowatts;

    /// Forecast every period of the series.
    fn collect(&self, config: &BatteryConfig, series: &PriceSeries) -> PvForecast {
        series
            .periods()
            .iter()
            .map(|period| {
                let power =
                    self.forecast(config.max_watt_peak, config.pv_efficiency, period.timestamp);
                (period.timestamp, power)
            })
            .collect()
    }
}

/// Symmetric daylight curve peaking at 13:00.
#[derive(Copy, Clone, Debug, Default)]
pub struct ClearSkyModel;

impl ClearSkyModel {
    const PEAK_HOUR: f64 = 13.0;
    const HALF_DAY_HOURS: f64 = 7.0;
}

impl PvForecastProvider for ClearSkyModel {
    fn forecast(
        &self,
        max_watt_peak: f64,
        pv_efficiency: f64,
        timestamp: DateTime<Local>,
    ) -> Kilowatts {
        let hour = timestamp.hour();
        if !(6..=20).contains(&hour) {
            return Kilowatts::ZERO;
        }
        let shape = 1.0 - (Self::PEAK_HOUR - f64::from(hour)).abs() / Self::HALF_DAY_HOURS;
        (Kilowatts::from_watts(max_watt_peak) * pv_efficiency * shape).max(Kilowatts::ZERO)
    }
}
