use std::collections::BTreeMap;

use average::{Mean, Variance};
use bon::Builder;
use chrono::{DateTime, Local, NaiveDate, Timelike};
use itertools::{Itertools, MinMaxResult};
use serde::Serialize;

use crate::{
    core::{battery::BatteryConfig, series::PriceSeries},
    prelude::*,
    quantity::{rate::KilowattHourRate, time::Hours},
};

/// Horizon at which the forecast confidence bottoms out.
const CONFIDENCE_HORIZON: f64 = 48.0;

const MIN_CONFIDENCE: f64 = 0.5;

/// Number of standard deviations between the rolling mean and a threshold.
const DEVIATION_FACTOR: f64 = 0.7;

/// Forecast confidence, decaying linearly from 1.0 now to 0.5 two days ahead.
#[must_use]
pub fn confidence(timestamp: DateTime<Local>, now: DateTime<Local>) -> f64 {
    let hours_ahead = Hours::from(timestamp - now).value();
    (1.0 - hours_ahead / CONFIDENCE_HORIZON).clamp(MIN_CONFIDENCE, 1.0)
}

/// Whether the finite values are not all equal.
fn has_spread(values: impl IntoIterator<Item = f64>) -> bool {
    match values.into_iter().filter(|value| value.is_finite()).minmax() {
        MinMaxResult::MinMax(min, max) => max > min,
        MinMaxResult::NoElements | MinMaxResult::OneElement(_) => false,
    }
}

/// Linearly interpolated quantile, ignoring non-finite values.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn quantile(values: impl IntoIterator<Item = f64>, q: f64) -> Option<f64> {
    let sorted =
        values.into_iter().filter(|value| value.is_finite()).sorted_by(f64::total_cmp).collect_vec();
    let last = sorted.len().checked_sub(1)?;
    let position = q.clamp(0.0, 1.0) * last as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * (position - lower as f64))
}

/// Charge and discharge boundaries of a calendar day.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DayThresholds {
    pub charge: KilowattHourRate,
    pub discharge: KilowattHourRate,

    /// Average of the rolling means.
    pub mean: KilowattHourRate,

    /// Whether the market prices of the day move at all.
    ///
    /// Confidence weighting alone separates the thresholds of a flat day.
    pub market_spread: bool,
}

impl DayThresholds {
    /// Collapsed thresholds give no trading signal.
    #[must_use]
    pub fn has_spread(&self) -> bool {
        self.market_spread && self.discharge > self.charge
    }

    /// Collapse centered rolling statistics of the day's prices.
    ///
    /// Windows follow the centered alignment with `(window - 1) / 2` periods ahead,
    /// clipped to the day. Windows of a single sample have no deviation and only
    /// contribute to the mean.
    fn from_prices(prices: &[f64], look_ahead: usize) -> Option<Self> {
        let window = look_ahead.clamp(1, prices.len().max(1));
        let offset = (window - 1) / 2;

        let mut means = Vec::with_capacity(prices.len());
        let mut lower = Vec::with_capacity(prices.len());
        let mut upper = Vec::with_capacity(prices.len());
        for index in 0..prices.len() {
            let end = (index + offset + 1).min(prices.len());
            let start = (index + offset + 1).saturating_sub(window);
            let stats: Variance = prices[start..end].iter().copied().collect();
            means.push(stats.mean());
            if stats.len() >= 2 {
                let deviation = stats.sample_variance().sqrt();
                lower.push(stats.mean() - DEVIATION_FACTOR * deviation);
                upper.push(stats.mean() + DEVIATION_FACTOR * deviation);
            }
        }

        let lower: Mean = lower.into_iter().collect();
        let upper: Mean = upper.into_iter().collect();
        let means: Mean = means.into_iter().collect();
        if lower.is_empty() {
            return None;
        }
        Some(Self {
            charge: KilowattHourRate::new(lower.mean()),
            discharge: KilowattHourRate::new(upper.mean()),
            mean: KilowattHourRate::new(means.mean()),
            market_spread: has_spread(prices.iter().copied()),
        })
    }
}

/// Effective prices and per-day thresholds of a single optimization.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceAnalysis {
    /// One per period, `None` for skipped periods.
    pub effective_prices: Vec<Option<KilowattHourRate>>,

    /// Market prices plus the surcharge, without the confidence weighting.
    pub market_prices: Vec<Option<KilowattHourRate>>,

    pub thresholds: BTreeMap<NaiveDate, DayThresholds>,

    /// Look-ahead window length in periods.
    pub look_ahead: usize,
}

impl PriceAnalysis {
    /// Effective prices from the period on, within the look-ahead window.
    pub fn window(&self, index: usize) -> impl Iterator<Item = KilowattHourRate> + '_ {
        window_of(&self.effective_prices, index, self.look_ahead)
    }

    /// Whether the market prices move within the look-ahead window.
    #[must_use]
    pub fn window_has_spread(&self, index: usize) -> bool {
        let window = window_of(&self.market_prices, index, self.look_ahead);
        has_spread(window.map(KilowattHourRate::value))
    }
}

fn window_of(
    prices: &[Option<KilowattHourRate>],
    index: usize,
    look_ahead: usize,
) -> impl Iterator<Item = KilowattHourRate> + '_ {
    let end = (index + look_ahead).min(prices.len());
    prices.get(index..end).unwrap_or_default().iter().flatten().copied()
}

#[derive(Builder)]
#[builder(finish_fn(vis = ""))]
pub struct PriceThresholdAnalyzer<'a> {
    config: &'a BatteryConfig,
    series: &'a PriceSeries,

    /// Reference point of the forecast horizon.
    now: DateTime<Local>,
}

impl<S: price_threshold_analyzer_builder::IsComplete> PriceThresholdAnalyzerBuilder<'_, S> {
    pub fn analyze(self) -> PriceAnalysis {
        self.build().analyze()
    }
}

impl PriceThresholdAnalyzer<'_> {
    #[instrument(skip_all, name = "analyzing prices…", fields(len = self.series.len()))]
    fn analyze(self) -> PriceAnalysis {
        let look_ahead = self.series.periods_in(self.config.look_ahead_hours);
        let market_prices = self
            .series
            .periods()
            .iter()
            .map(|period| {
                period.price.map(|price| self.config.effective_price(price, period.timestamp.hour()))
            })
            .collect_vec();
        let effective_prices = self
            .series
            .periods()
            .iter()
            .zip(&market_prices)
            .map(|(period, price)| {
                price.map(|price| price * (0.9 + 0.1 * confidence(period.timestamp, self.now)))
            })
            .collect_vec();

        let thresholds = self
            .series
            .periods()
            .iter()
            .zip(effective_prices.iter().zip(&market_prices))
            .filter_map(|(period, (price, market))| {
                Some((period.date(), price.as_ref()?.value(), market.as_ref()?.value()))
            })
            .chunk_by(|(date, _, _)| *date)
            .into_iter()
            .filter_map(|(date, group)| {
                let (prices, markets): (Vec<_>, Vec<_>) =
                    group.map(|(_, price, market)| (price, market)).unzip();
                let Some(thresholds) = DayThresholds::from_prices(&prices, look_ahead) else {
                    debug!(%date, len = prices.len(), "too few prices for thresholds");
                    return None;
                };
                Some((date, DayThresholds { market_spread: has_spread(markets), ..thresholds }))
            })
            .collect::<BTreeMap<_, _>>();
        for (date, day) in &thresholds {
            debug!(%date, charge = %day.charge, discharge = %day.discharge, "thresholds");
        }

        PriceAnalysis { effective_prices, market_prices, thresholds, look_ahead }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::{TimeDelta, TimeZone};

    use super::*;
    use crate::{
        core::series::PricePoint,
        quantity::{energy::KilowattHours, power::Kilowatts},
    };

    fn config() -> BatteryConfig {
        BatteryConfig::builder()
            .name("Test")
            .capacity(KilowattHours::new(10.0))
            .empty_soc(0.05)
            .min_soc(0.1)
            .max_soc(0.9)
            .charge_rate(Kilowatts::new(5.0))
            .surcharge_rate(KilowattHourRate::ZERO)
            .build()
            .unwrap()
    }

    fn series(start: DateTime<Local>, prices: &[f64]) -> PriceSeries {
        PriceSeries::try_from_points(prices.iter().enumerate().map(|(index, price)| PricePoint {
            timestamp: start + TimeDelta::hours(i64::try_from(index).unwrap()),
            price: KilowattHourRate::new(*price),
        }))
        .unwrap()
    }

    #[test]
    fn test_confidence() {
        let now = Local.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap();
        assert_abs_diff_eq!(confidence(now, now), 1.0);
        assert_abs_diff_eq!(confidence(now + TimeDelta::hours(12), now), 0.75);
        assert_abs_diff_eq!(confidence(now + TimeDelta::hours(36), now), 0.5);
        assert_abs_diff_eq!(confidence(now - TimeDelta::hours(5), now), 1.0);
    }

    #[test]
    fn test_quantile() {
        let values = [0.4, 0.1, 0.3, 0.2, 0.5];
        assert_abs_diff_eq!(quantile(values, 0.0).unwrap(), 0.1);
        assert_abs_diff_eq!(quantile(values, 0.5).unwrap(), 0.3);
        assert_abs_diff_eq!(quantile(values, 0.1).unwrap(), 0.14, epsilon = 1e-12);
        assert_abs_diff_eq!(quantile(values, 0.95).unwrap(), 0.48, epsilon = 1e-12);
        assert_eq!(quantile(std::iter::empty(), 0.5), None);
    }

    /// Flat prices collapse both thresholds onto the price.
    #[test]
    fn test_flat_prices() {
        let thresholds = DayThresholds::from_prices(&[0.2; 6], 12).unwrap();
        assert_abs_diff_eq!(thresholds.charge.value(), 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(thresholds.discharge.value(), 0.2, epsilon = 1e-12);
        assert!(!thresholds.has_spread());
    }

    /// Four alternating prices: windows of 2, 3, 4 and 3 samples.
    #[test]
    fn test_alternating_prices() {
        let thresholds = DayThresholds::from_prices(&[0.1, 0.3, 0.1, 0.3], 12).unwrap();
        let mean_deviation = (0.2 / 2.0_f64.sqrt() + 3.0 * 0.2 / 3.0_f64.sqrt()) / 4.0;
        assert_abs_diff_eq!(thresholds.mean.value(), 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(
            thresholds.charge.value(),
            0.2 - DEVIATION_FACTOR * mean_deviation,
            epsilon = 1e-12,
        );
        assert_abs_diff_eq!(
            thresholds.discharge.value(),
            0.2 + DEVIATION_FACTOR * mean_deviation,
            epsilon = 1e-12,
        );
    }

    #[test]
    fn test_single_sample_day() {
        assert_eq!(DayThresholds::from_prices(&[0.2], 12), None);
        assert_eq!(DayThresholds::from_prices(&[0.2, 0.3], 1), None);
    }

    #[test]
    fn test_analyze_groups_by_date() {
        let start = Local.with_ymd_and_hms(2025, 1, 15, 20, 0, 0).unwrap();
        let series = series(start, &[0.1, 0.3, 0.2, 0.4, 0.1, 0.2, 0.3]);
        let analysis = PriceThresholdAnalyzer::builder()
            .config(&config())
            .series(&series)
            .now(start)
            .analyze();
        assert_eq!(analysis.effective_prices.len(), 7);
        assert_eq!(analysis.thresholds.len(), 2);
        assert_eq!(analysis.look_ahead, 12);
        assert_abs_diff_eq!(analysis.effective_prices[0].unwrap().value(), 0.1);
    }

    /// Far-future prices are discounted by at most ten percent.
    #[test]
    fn test_effective_price_weighting() {
        let now = Local.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap();
        let series = series(now + TimeDelta::hours(48), &[0.2, 0.2]);
        let analysis =
            PriceThresholdAnalyzer::builder().config(&config()).series(&series).now(now).analyze();
        assert_abs_diff_eq!(analysis.effective_prices[1].unwrap().value(), 0.19, epsilon = 1e-12);
    }

    #[test]
    fn test_window() {
        let now = Local.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap();
        let series = series(now, &[0.1, 0.2, 0.3]);
        let config = BatteryConfig { look_ahead_hours: 2, ..config() };
        let analysis =
            PriceThresholdAnalyzer::builder().config(&config).series(&series).now(now).analyze();
        assert_eq!(analysis.window(1).count(), 2);
        assert_eq!(analysis.window(2).count(), 1);
        assert_eq!(analysis.window(3).count(), 0);
        assert!(analysis.window_has_spread(0));
        assert!(!analysis.window_has_spread(2));
    }

    /// Confidence weighting alone must not open a spread on a flat day.
    #[test]
    fn test_flat_market_near_now() {
        let now = Local.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap();
        let series = series(now, &[0.2; 24]);
        let analysis =
            PriceThresholdAnalyzer::builder().config(&config()).series(&series).now(now).analyze();
        let day = analysis.thresholds[&now.date_naive()];
        assert!(day.discharge > day.charge);
        assert!(!day.market_spread);
        assert!(!day.has_spread());
        assert!(!analysis.window_has_spread(0));
    }
}
