mod cli;
mod tables;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, crate_version};
use dynamic_balancing::{
    core::{BatteryModel, ScheduleOptimizer, manual::apply_entries},
    providers::{
        ClearSkyModel,
        MemoryProfileStore,
        ProfileStore,
        PvForecastProvider,
        prices::next_day_published,
    },
    prelude::{info, instrument},
};

use crate::{
    cli::{Args, Command, ManualArgs, OptimizeArgs},
    tables::{
        build_daily_table,
        build_manual_table,
        build_profiles_table,
        build_steps_table,
        build_summary_table,
    },
};

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().without_time().compact().init();
    info!(version = crate_version!(), "starting…");

    let args = Args::parse();

    match args.command {
        Command::Optimize(args) => optimize(&args)?,
        Command::Profiles => {
            println!("{}", build_profiles_table(&MemoryProfileStore::default().list_profiles()));
        }
        Command::Manual(args) => manual(&args)?,
    }

    info!("done!");
    Ok(())
}

#[instrument(skip_all)]
fn optimize(args: &OptimizeArgs) -> Result<()> {
    let now = Local::now();
    let battery = BatteryModel::try_new(args.battery.load_config()?, args.battery.soc)?;
    if args.prices.prices_path.is_none() && !next_day_published(now) {
        info!("tomorrow's day-ahead prices are not published yet");
    }
    let series = args.prices.load(now)?;
    info!(len = series.len(), cadence = %series.cadence(), "loaded prices");

    let forecast = ClearSkyModel.collect(battery.config(), &series);
    let snapshot = battery.snapshot();
    let result = ScheduleOptimizer::builder()
        .battery(&snapshot)
        .prices(&series)
        .pv_forecast(&forecast)
        .policy(args.policy())
        .now(now)
        .optimize();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", build_steps_table(&result.steps));
        println!("{}", build_daily_table(&result.daily));
        println!("{}", build_summary_table(&result));
    }
    info!(power = %battery.current_power(now), "suggested power without a schedule");
    Ok(())
}

#[instrument(skip_all)]
fn manual(args: &ManualArgs) -> Result<()> {
    let mut battery = BatteryModel::try_new(args.battery.load_config()?, args.battery.soc)?;
    let outcomes = apply_entries(&mut battery, &args.entries, Local::now());
    println!("{}", build_manual_table(&outcomes));
    info!(
        soc = battery.current_soc(),
        cycles_used = battery.state().counters.cycles_used,
        "battery updated",
    );
    Ok(())
}
