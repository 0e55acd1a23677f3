use std::{fs, path::PathBuf};

use anyhow::Context;
use chrono::{DateTime, DurationRound, Local, TimeDelta};
use clap::{Parser, Subcommand};
use dynamic_balancing::{
    core::{
        BatteryConfig,
        Policy,
        PolicyFlag,
        PriceSeries,
        RawPricePoint,
        manual::ManualEntry,
    },
    prelude::info,
    providers::{MemoryProfileStore, PriceProvider, ProfileStore, SyntheticPrices},
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: load the prices and plan the battery schedule.
    #[clap(name = "optimize")]
    Optimize(Box<OptimizeArgs>),

    /// List the built-in battery profiles.
    #[clap(name = "profiles")]
    Profiles,

    /// Apply manual charge and discharge entries to the battery.
    #[clap(name = "manual")]
    Manual(Box<ManualArgs>),
}

#[derive(Parser)]
pub struct BatteryArgs {
    /// Built-in profile name.
    #[clap(long, default_value = "Home Battery", env = "PROFILE")]
    pub profile: String,

    /// TOML profile, overrides `--profile`.
    #[clap(long = "profile-path", env = "PROFILE_PATH")]
    pub profile_path: Option<PathBuf>,

    /// Current state of charge.
    #[clap(long, default_value = "0.5", env = "SOC")]
    pub soc: f64,
}

impl BatteryArgs {
    pub fn load_config(&self) -> anyhow::Result<BatteryConfig> {
        if let Some(path) = &self.profile_path {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read `{}`", path.display()))?;
            let config = BatteryConfig::from_toml_str(&text)?;
            info!(path = %path.display(), name = %config.name, "loaded profile");
            Ok(config)
        } else {
            Ok(MemoryProfileStore::default().get_profile(&self.profile)?)
        }
    }
}

#[derive(Parser)]
pub struct PriceArgs {
    /// JSON array of `{"timestamp": …, "price": …}`, synthetic prices are used otherwise.
    #[clap(long = "prices-path", env = "PRICES_PATH")]
    pub prices_path: Option<PathBuf>,

    /// Seed of the synthetic prices.
    #[clap(long, default_value = "42", env = "SEED")]
    pub seed: u64,

    /// Horizon of the synthetic prices.
    #[clap(long, default_value = "24", env = "HOURS")]
    pub hours: u32,
}

impl PriceArgs {
    pub fn load(&self, now: DateTime<Local>) -> anyhow::Result<PriceSeries> {
        if let Some(path) = &self.prices_path {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read `{}`", path.display()))?;
            let raw: Vec<RawPricePoint> = serde_json::from_str(&text)
                .with_context(|| format!("failed to parse `{}`", path.display()))?;
            Ok(PriceSeries::ingest(raw)?)
        } else {
            let points = SyntheticPrices::builder()
                .start(now.duration_trunc(TimeDelta::hours(1))?)
                .seed(self.seed)
                .build()
                .get_prices(self.hours)?;
            Ok(PriceSeries::try_from_points(points)?)
        }
    }
}

#[derive(Parser)]
pub struct OptimizeArgs {
    #[clap(flatten)]
    pub battery: BatteryArgs,

    #[clap(flatten)]
    pub prices: PriceArgs,

    /// Optional heuristics.
    #[clap(
        long = "policy",
        env = "POLICY",
        value_delimiter = ',',
        num_args = 1..,
        default_value = "pv-priority",
    )]
    pub policy: Vec<PolicyFlag>,

    /// Print the result as JSON instead of the tables.
    #[clap(long)]
    pub json: bool,
}

impl OptimizeArgs {
    pub fn policy(&self) -> Policy {
        Policy::builder().flags(self.policy.iter().copied().collect()).build()
    }
}

#[derive(Parser)]
pub struct ManualArgs {
    #[clap(flatten)]
    pub battery: BatteryArgs,

    /// `operation,power,start,hours`, for example `charge,2.5,2025-01-15 10:00,2`.
    #[clap(long = "entry", required = true)]
    pub entries: Vec<ManualEntry>,
}
