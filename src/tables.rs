use average::Mean;
use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};
use dynamic_balancing::{
    core::{
        BatteryConfig,
        OptimizationResult,
        Step,
        manual::{EntryStatus, ManualOutcome},
        result::DailyConsumption,
    },
    quantity::{cost::Cost, power::Kilowatts, rate::KilowattHourRate},
};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table
}

fn percent(soc: f64) -> String {
    format!("{:.1}%", soc * 100.0)
}

pub fn build_steps_table(steps: &[Step]) -> Table {
    let mean_price: KilowattHourRate = {
        let estimate: Mean =
            steps.iter().filter_map(|step| step.effective_price).map(KilowattHourRate::value).collect();
        if estimate.is_empty() { KilowattHourRate::ZERO } else { estimate.mean().into() }
    };

    let mut table = new_table();
    table.set_header(vec![
        "Date", "Start", "Price", "Effective", "Mode", "Power", "PV", "Net", "Before", "After",
    ]);
    for step in steps {
        let price = step.price.map_or_else(|| "-".to_string(), |price| price.to_string());
        let effective_price = step.effective_price.map_or_else(
            || Cell::new("-").add_attribute(Attribute::Dim),
            |price| {
                Cell::new(price).fg(if price >= mean_price { Color::Red } else { Color::Green })
            },
        );
        table.add_row(vec![
            Cell::new(step.timestamp.format("%b %d")).add_attribute(Attribute::Dim),
            Cell::new(step.timestamp.format("%H:%M")),
            Cell::new(price).add_attribute(Attribute::Dim),
            effective_price,
            Cell::new(step.working_mode).fg(step.working_mode.color()),
            Cell::new(step.power).set_alignment(CellAlignment::Right).fg(
                if step.power > Kilowatts::ZERO {
                    Color::Green
                } else if step.power < Kilowatts::ZERO {
                    Color::Blue
                } else {
                    Color::Reset
                },
            ),
            Cell::new(step.pv).set_alignment(CellAlignment::Right).fg(Color::Cyan),
            Cell::new(step.net_consumption).set_alignment(CellAlignment::Right),
            Cell::new(percent(step.soc_before))
                .set_alignment(CellAlignment::Right)
                .add_attribute(Attribute::Dim),
            Cell::new(percent(step.soc_after())).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

pub fn build_daily_table(daily: &[DailyConsumption]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Date", "Expected", "95% band", "Scheduled", "Cycles", "Charges", "Discharges"]);
    for day in daily {
        table.add_row(vec![
            Cell::new(day.date.format("%b %d")),
            Cell::new(day.expected.mean).set_alignment(CellAlignment::Right),
            Cell::new(format!("{} … {}", day.expected.lower_95, day.expected.upper_95))
                .add_attribute(Attribute::Dim),
            Cell::new(day.scheduled).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", day.counters.cycles_used)).set_alignment(CellAlignment::Right),
            Cell::new(day.counters.charge_events).set_alignment(CellAlignment::Right),
            Cell::new(day.counters.discharge_events).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

pub fn build_summary_table(result: &OptimizationResult) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Consumption", "Cost", "Avg price", "Scheduled", "Cost", "Avg price", "Savings"]);
    let savings = result.savings();
    table.add_row(vec![
        Cell::new(result.consumption),
        Cell::new(result.consumption_cost),
        Cell::new(result.avg_price()).add_attribute(Attribute::Dim),
        Cell::new(result.optimize_consumption),
        Cell::new(result.optimize_cost),
        Cell::new(result.avg_optimized_price()).add_attribute(Attribute::Dim),
        Cell::new(savings).fg(if savings >= Cost::ONE_CENT {
            Color::Green
        } else if savings <= -Cost::ONE_CENT {
            Color::Red
        } else {
            Color::Reset
        }),
    ]);
    table
}

pub fn build_profiles_table(profiles: &[&BatteryConfig]) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        "Name", "Capacity", "SOC", "Rate", "Cycles", "Events", "Yearly", "Surcharge", "Peak", "Usage",
    ]);
    for config in profiles {
        let events = |cap: Option<u32>| cap.map_or_else(|| "∞".to_string(), |cap| cap.to_string());
        table.add_row(vec![
            Cell::new(&config.name).add_attribute(Attribute::Bold),
            Cell::new(config.capacity).set_alignment(CellAlignment::Right),
            Cell::new(format!(
                "{} / {} / {}",
                percent(config.empty_soc),
                percent(config.min_soc),
                percent(config.max_soc),
            )),
            Cell::new(config.charge_rate).set_alignment(CellAlignment::Right),
            Cell::new(config.max_daily_cycles).set_alignment(CellAlignment::Right),
            Cell::new(format!(
                "{} / {}",
                events(config.max_charge_events),
                events(config.max_discharge_events),
            )),
            Cell::new(config.yearly_consumption).set_alignment(CellAlignment::Right),
            Cell::new(config.surcharge_rate).set_alignment(CellAlignment::Right),
            Cell::new(format!("{} Wp", config.max_watt_peak)).set_alignment(CellAlignment::Right),
            Cell::new(config.usage_pattern),
        ]);
    }
    table
}

pub fn build_manual_table(outcomes: &[ManualOutcome]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Operation", "Power", "Start", "End", "Status", "Applied"]);
    for outcome in outcomes {
        table.add_row(vec![
            Cell::new(outcome.operation),
            Cell::new(outcome.power).set_alignment(CellAlignment::Right),
            Cell::new(outcome.start.format("%b %d %H:%M")),
            Cell::new(outcome.end.format("%b %d %H:%M")).add_attribute(Attribute::Dim),
            Cell::new(outcome.status).fg(match outcome.status {
                EntryStatus::Scheduled => Color::DarkYellow,
                EntryStatus::InProgress => Color::Green,
                EntryStatus::Completed => Color::DarkGrey,
            }),
            Cell::new(if outcome.applied { "yes" } else { "no" }).fg(if outcome.applied {
                Color::Green
            } else {
                Color::Reset
            }),
        ]);
    }
    table
}
