use std::collections::BTreeMap;

use bon::Builder;
use chrono::{DateTime, Local, NaiveDate};
use itertools::Itertools;
use serde::Serialize;

use crate::{
    core::{
        battery::{BatterySnapshot, DailyCounters},
        forecast::PvForecast,
        policy::{Policy, PolicyFlag},
        result::OptimizationResult,
        series::{Period, PriceSeries},
        simulator::{Flows, Projection, SocSimulator},
        thresholds::{PriceAnalysis, PriceThresholdAnalyzer, quantile},
        working_mode::WorkingMode,
    },
    prelude::*,
    quantity::{
        energy::KilowattHours,
        power::Kilowatts,
        rate::KilowattHourRate,
        time::Hours,
    },
};

/// Single period of the plan.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Step {
    pub timestamp: DateTime<Local>,

    /// Raw market price, `None` for skipped periods.
    pub price: Option<KilowattHourRate>,

    /// Price the decision was based on.
    pub effective_price: Option<KilowattHourRate>,

    pub working_mode: WorkingMode,
    pub power: Kilowatts,
    pub pv: Kilowatts,
    pub net_consumption: KilowattHours,
    pub soc_before: f64,
    pub trajectory: Projection,
}

impl Step {
    #[must_use]
    pub const fn soc_after(&self) -> f64 {
        self.trajectory.final_soc()
    }
}

/// State threaded through the periods.
#[derive(Clone, Debug)]
struct SimulationState {
    soc: f64,
    counters: BTreeMap<NaiveDate, DailyCounters>,
}

/// Everything a decision may look at, energies are per period.
struct Situation {
    index: usize,
    date: NaiveDate,
    effective_price: KilowattHourRate,
    pv: Kilowatts,
    headroom: KilowattHours,
    dischargeable: KilowattHours,
    net_consumption: KilowattHours,
    budget: KilowattHours,
    counters: DailyCounters,
}

/// Greedy threshold-driven scheduler.
///
/// Simulates the battery from the snapshot without touching the live state,
/// so the same inputs always produce the same plan.
#[derive(Builder)]
#[builder(finish_fn(vis = ""))]
pub struct ScheduleOptimizer<'a> {
    battery: &'a BatterySnapshot,
    prices: &'a PriceSeries,
    pv_forecast: Option<&'a PvForecast>,

    #[builder(default)]
    policy: Policy,

    /// Reference point of the forecast confidence.
    now: DateTime<Local>,
}

impl<S: schedule_optimizer_builder::IsComplete> ScheduleOptimizerBuilder<'_, S> {
    pub fn optimize(self) -> OptimizationResult {
        self.build().optimize()
    }
}

impl ScheduleOptimizer<'_> {
    #[instrument(
        skip_all,
        name = "optimizing…",
        fields(len = self.prices.len(), soc = self.battery.soc, flags = ?self.policy.flags),
    )]
    fn optimize(self) -> OptimizationResult {
        let config = &self.battery.config;
        let analysis = PriceThresholdAnalyzer::builder()
            .config(config)
            .series(self.prices)
            .now(self.now)
            .analyze();

        let mut state =
            SimulationState { soc: self.battery.soc, counters: BTreeMap::new() };
        let mut steps = Vec::with_capacity(self.prices.len());
        for (index, period) in self.prices.periods().iter().enumerate() {
            let (next_state, step) = self.step(&analysis, state, index, period);
            state = next_state;
            steps.push(step);
        }

        let result = OptimizationResult::collect(
            config,
            self.prices.period_hours(),
            steps,
            state.counters,
            analysis.thresholds,
            self.prices.warnings().to_vec(),
        );
        info!(
            consumption_cost = %result.consumption_cost,
            optimize_cost = %result.optimize_cost,
            savings = %result.savings(),
            "optimized",
        );
        result
    }

    fn step(
        &self,
        analysis: &PriceAnalysis,
        mut state: SimulationState,
        index: usize,
        period: &Period,
    ) -> (SimulationState, Step) {
        let (Some(price), Some(effective_price)) = (period.price, analysis.effective_prices[index])
        else {
            let step = Step {
                timestamp: period.timestamp,
                price: None,
                effective_price: None,
                working_mode: WorkingMode::Skipped,
                power: Kilowatts::ZERO,
                pv: Kilowatts::ZERO,
                net_consumption: KilowattHours::ZERO,
                soc_before: state.soc,
                trajectory: Projection::hold(state.soc),
            };
            return (state, step);
        };

        let config = &self.battery.config;
        let hours = self.prices.period_hours();
        let date = period.date();
        let counters = state.counters.entry(date).or_default();

        let pv = self.pv_forecast.map_or(Kilowatts::ZERO, |forecast| forecast.at(period.timestamp));
        let consumption = config.consumption_at(period.timestamp) * hours.value();
        let net_consumption = (consumption - pv * hours).max(KilowattHours::ZERO);
        let headroom = (config.capacity * (config.max_soc - state.soc)).max(KilowattHours::ZERO);
        let available_discharge = config.capacity * (state.soc - config.min_soc);

        let (working_mode, power) = if counters.is_exhausted(config.max_daily_cycles) {
            (WorkingMode::Exhausted, Kilowatts::ZERO)
        } else {
            let situation = Situation {
                index,
                date,
                effective_price,
                pv,
                headroom,
                dischargeable: if self.policy.has(PolicyFlag::EventCaps) {
                    available_discharge - net_consumption
                } else {
                    available_discharge
                },
                net_consumption,
                budget: config.capacity * counters.remaining_cycles(config.max_daily_cycles),
                counters: *counters,
            };
            self.decide(analysis, &situation, hours)
        };
        counters.record(power * hours, config.capacity);

        let flows = Flows { battery: power * hours, pv: pv * hours, headroom, net_consumption };
        let trajectory = SocSimulator::from(config).project(state.soc, &flows);
        trace!(
            timestamp = %period.timestamp,
            %working_mode,
            ?power,
            soc = trajectory.final_soc(),
            "step",
        );

        let step = Step {
            timestamp: period.timestamp,
            price: Some(price),
            effective_price: Some(effective_price),
            working_mode,
            power,
            pv,
            net_consumption,
            soc_before: state.soc,
            trajectory,
        };
        state.soc = trajectory.final_soc();
        (state, step)
    }

    fn decide(
        &self,
        analysis: &PriceAnalysis,
        situation: &Situation,
        hours: Hours,
    ) -> (WorkingMode, Kilowatts) {
        let pv_priority = self.policy.has(PolicyFlag::PvPriority);
        if pv_priority && let Some(decision) = self.harvest(situation, hours) {
            return decision;
        }
        if let Some(decision) = self.trade(analysis, situation, hours) {
            return decision;
        }
        if !pv_priority && let Some(decision) = self.harvest(situation, hours) {
            return decision;
        }
        (WorkingMode::Idle, Kilowatts::ZERO)
    }

    /// Store the solar production while there is room for it.
    fn harvest(&self, situation: &Situation, hours: Hours) -> Option<(WorkingMode, Kilowatts)> {
        (situation.pv > Kilowatts::ZERO && situation.headroom > KilowattHours::ZERO).then(|| {
            let power = situation
                .pv
                .min(self.battery.config.charge_rate)
                .min(situation.headroom / hours)
                .min(situation.budget / hours);
            (WorkingMode::Harvest, power)
        })
    }

    /// Price-driven decision, `None` when the price gives no signal.
    fn trade(
        &self,
        analysis: &PriceAnalysis,
        situation: &Situation,
        hours: Hours,
    ) -> Option<(WorkingMode, Kilowatts)> {
        let config = &self.battery.config;
        let price = situation.effective_price;

        let (mut is_cheap, mut is_expensive) = analysis
            .thresholds
            .get(&situation.date)
            .filter(|thresholds| thresholds.has_spread())
            .map_or((false, false), |thresholds| {
                (price <= thresholds.charge, price >= thresholds.discharge)
            });
        if self.policy.has(PolicyFlag::QuantileDetection)
            && analysis.window_has_spread(situation.index)
        {
            let window = analysis.window(situation.index).map(KilowattHourRate::value).collect_vec();
            is_cheap |= quantile(window.iter().copied(), self.policy.valley_quantile)
                .is_some_and(|valley| price.value() <= valley);
            is_expensive |= quantile(window.iter().copied(), self.policy.peak_quantile)
                .is_some_and(|peak| price.value() >= peak);
        }

        let event_caps = self.policy.has(PolicyFlag::EventCaps);
        if is_cheap
            && situation.headroom > KilowattHours::ZERO
            && (!event_caps || situation.counters.can_charge_again(config.max_charge_events))
        {
            let power = config
                .charge_rate
                .min(situation.headroom / hours)
                .min(situation.budget / hours);
            return Some((WorkingMode::Charge, power));
        }

        if is_expensive
            && situation.dischargeable > KilowattHours::ZERO
            && (!event_caps || situation.counters.can_discharge_again(config.max_discharge_events))
        {
            if self.policy.has(PolicyFlag::PreservePeak) {
                let margin = price.abs() * self.policy.peak_margin;
                if analysis.window(situation.index).skip(1).any(|later| later - price > margin) {
                    debug!(%price, net_consumption = ?situation.net_consumption, "preserving for a better peak");
                    return Some((WorkingMode::Preserve, Kilowatts::ZERO));
                }
            }
            let power = config
                .charge_rate
                .min(situation.dischargeable / hours)
                .min(situation.budget / hours);
            return Some((WorkingMode::Discharge, -power));
        }

        None
    }
}
