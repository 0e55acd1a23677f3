use bon::Builder;
use chrono::{DateTime, Local, TimeDelta, Timelike};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{core::series::PricePoint, prelude::*, quantity::rate::KilowattHourRate};

/// Hour of the day at which the next day's day-ahead prices get published.
const PUBLICATION_HOUR: u32 = 13;

/// Relative standard deviation of the synthetic noise.
const NOISE: f64 = 0.1;

pub trait PriceProvider {
    /// Hourly prices for the upcoming horizon.
    fn get_prices(&self, horizon_hours: u32) -> Result<Vec<PricePoint>>;
}

/// Whether tomorrow's day-ahead prices are already out.
#[must_use]
pub fn next_day_published(now: DateTime<Local>) -> bool {
    now.hour() >= PUBLICATION_HOUR
}

/// Reproducible day-ahead-like prices with morning and evening peaks.
#[derive(Builder)]
pub struct SyntheticPrices {
    /// Timestamp of the first period.
    start: DateTime<Local>,

    #[builder(default)]
    seed: u64,

    #[builder(default = KilowattHourRate::new(0.10))]
    base_price: KilowattHourRate,

    /// Prices never drop below the floor.
    #[builder(default = KilowattHourRate::new(0.05))]
    floor: KilowattHourRate,
}

impl SyntheticPrices {
    fn hour_factor(hour: u32) -> f64 {
        let sin = f64::from(hour).sin();
        match hour {
            0..=5 => 0.1f64.mul_add(sin, 0.7),
            6..=9 => 0.2f64.mul_add(sin, 1.3),
            10..=15 => 0.1f64.mul_add(sin, 1.1),
            16..=21 => 0.2f64.mul_add(sin, 1.4),
            _ => 0.1f64.mul_add(sin, 0.9),
        }
    }
}

impl PriceProvider for SyntheticPrices {
    #[instrument(skip_all, name = "generating prices…", fields(horizon_hours = horizon_hours, seed = self.seed))]
    fn get_prices(&self, horizon_hours: u32) -> Result<Vec<PricePoint>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let prices: Vec<PricePoint> = (0..horizon_hours)
            .map(|index| {
                let timestamp = self.start + TimeDelta::hours(i64::from(index));
                let noise = 1.0 + gaussian_noise(&mut rng, NOISE);
                let price = self.base_price * Self::hour_factor(timestamp.hour()) * noise;
                PricePoint { timestamp, price: price.max(self.floor) }
            })
            .collect();
        info!(len = prices.len(), "generated");
        Ok(prices)
    }
}

/// Box-Muller sample with the given standard deviation.
fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos() * std_dev
}
