pub mod battery;
pub mod forecast;
pub mod manual;
pub mod optimizer;
pub mod policy;
pub mod result;
pub mod series;
pub mod simulator;
pub mod thresholds;
pub mod working_mode;

pub use self::{
    battery::{BatteryConfig, BatteryModel, BatterySnapshot},
    forecast::PvForecast,
    optimizer::{ScheduleOptimizer, Step},
    policy::{Policy, PolicyFlag},
    result::OptimizationResult,
    series::{PricePoint, PriceSeries, RawPricePoint},
    working_mode::WorkingMode,
};
