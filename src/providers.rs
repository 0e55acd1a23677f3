//! Collaborators feeding the optimizer: prices, solar forecasts and battery profiles.

pub mod prices;
pub mod profiles;
pub mod pv;

pub use self::{
    prices::{PriceProvider, SyntheticPrices},
    profiles::{MemoryProfileStore, ProfileStore},
    pv::{ClearSkyModel, PvForecastProvider},
};
