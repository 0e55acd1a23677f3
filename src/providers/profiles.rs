use std::collections::BTreeMap;

use crate::{
    core::battery::{BatteryConfig, MonthlyDistribution, UsagePattern},
    prelude::*,
    quantity::{energy::KilowattHours, power::Kilowatts, rate::KilowattHourRate},
};

/// Named battery configurations.
pub trait ProfileStore {
    fn get_profile(&self, name: &str) -> Result<BatteryConfig>;

    /// Validate, and then insert or replace the profile under its name.
    fn save_profile(&mut self, config: BatteryConfig) -> Result;

    fn list_profiles(&self) -> Vec<&BatteryConfig>;

    fn delete_profile(&mut self, name: &str) -> Result;
}

/// In-memory store, pre-populated with the built-in profiles.
#[derive(Clone, Debug)]
pub struct MemoryProfileStore {
    profiles: BTreeMap<String, BatteryConfig>,
}

impl Default for MemoryProfileStore {
    fn default() -> Self {
        Self { profiles: built_in().into_iter().map(|config| (config.name.clone(), config)).collect() }
    }
}

impl MemoryProfileStore {
    fn is_built_in(name: &str) -> bool {
        built_in().iter().any(|config| config.name == name)
    }
}

impl ProfileStore for MemoryProfileStore {
    fn get_profile(&self, name: &str) -> Result<BatteryConfig> {
        self.profiles
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Profile(format!("no profile named `{name}`")))
    }

    fn save_profile(&mut self, config: BatteryConfig) -> Result {
        config.validate()?;
        info!(name = %config.name, "saving profile");
        self.profiles.insert(config.name.clone(), config);
        Ok(())
    }

    fn list_profiles(&self) -> Vec<&BatteryConfig> {
        self.profiles.values().collect()
    }

    fn delete_profile(&mut self, name: &str) -> Result {
        if Self::is_built_in(name) {
            return Err(Error::Profile(format!("`{name}` is built in")));
        }
        self.profiles
            .remove(name)
            .map(|_| info!(name, "deleted profile"))
            .ok_or_else(|| Error::Profile(format!("no profile named `{name}`")))
    }
}

fn built_in() -> [BatteryConfig; 3] {
    let profile = |name: &str,
                   capacity: f64,
                   (empty_soc, min_soc, max_soc): (f64, f64, f64),
                   charge_rate: f64,
                   yearly_consumption: f64,
                   max_daily_cycles: f64,
                   max_watt_peak: f64,
                   usage_pattern: UsagePattern| BatteryConfig {
        name: name.to_string(),
        capacity: KilowattHours::new(capacity),
        empty_soc,
        min_soc,
        max_soc,
        charge_rate: Kilowatts::new(charge_rate),
        max_daily_cycles,
        max_charge_events: Some(2),
        max_discharge_events: Some(1),
        surcharge_rate: KilowattHourRate::new(0.03),
        yearly_consumption: KilowattHours::new(yearly_consumption),
        monthly_distribution: MonthlyDistribution::SOLAR_SUMMER,
        usage_pattern,
        look_ahead_hours: 12,
        pv_efficiency: 0.15,
        max_watt_peak,
    };
    [
        profile("Home Battery", 20.0, (0.1, 0.2, 0.9), 12.0, 3475.0, 1.5, 5000.0, UsagePattern::DayHeavy),
        profile("EV Battery", 75.0, (0.1, 0.2, 0.8), 11.0, 7300.0, 2.0, 3000.0, UsagePattern::NightHeavy),
        profile("Small Battery", 5.0, (0.1, 0.15, 0.85), 3.3, 2920.0, 2.0, 2000.0, UsagePattern::Flat),
    ]
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_built_in() {
        let store = MemoryProfileStore::default();
        let names: Vec<&str> =
            store.list_profiles().into_iter().map(|config| config.name.as_str()).collect();
        assert_eq!(names, ["EV Battery", "Home Battery", "Small Battery"]);
        for config in store.list_profiles() {
            config.validate().unwrap();
        }

        let home = store.get_profile("Home Battery").unwrap();
        assert_eq!(home.capacity, KilowattHours::new(20.0));
        assert_eq!(home.usage_pattern, UsagePattern::DayHeavy);
        assert_eq!(home.max_charge_events, Some(2));
        assert_eq!(home.monthly_distribution, MonthlyDistribution::SOLAR_SUMMER);
    }

    #[test]
    fn test_missing() {
        assert!(matches!(MemoryProfileStore::default().get_profile("Nope"), Err(Error::Profile(_))));
    }

    #[test]
    fn test_save_and_delete() {
        let mut store = MemoryProfileStore::default();
        let mut config = store.get_profile("Small Battery").unwrap();
        config.name = "Garage".to_string();
        store.save_profile(config.clone()).unwrap();
        assert_eq!(store.get_profile("Garage").unwrap(), config);

        config.max_soc = 0.95;
        store.save_profile(config).unwrap();
        assert_eq!(store.list_profiles().len(), 4);
        assert_abs_diff_eq!(store.get_profile("Garage").unwrap().max_soc, 0.95);

        store.delete_profile("Garage").unwrap();
        assert!(store.get_profile("Garage").is_err());
        assert!(store.delete_profile("Garage").is_err());
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let mut store = MemoryProfileStore::default();
        let mut config = store.get_profile("Small Battery").unwrap();
        config.name = "Broken".to_string();
        config.min_soc = 0.95;
        assert!(matches!(store.save_profile(config), Err(Error::Configuration(_))));
        assert!(store.get_profile("Broken").is_err());
    }

    #[test]
    fn test_built_in_not_deletable() {
        let mut store = MemoryProfileStore::default();
        assert!(store.delete_profile("Home Battery").is_err());
        assert!(store.get_profile("Home Battery").is_ok());
    }
}
