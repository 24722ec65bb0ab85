//! Code for loading the model configuration.
//!
//! The model directory contains a `config.toml` describing the scenario,
//! cost assumptions and sector-coupling options. Scenario option tokens from
//! the descriptor string can override individual values (e.g. `dist1` switches
//! the electricity distribution grid on); those overrides are applied by the
//! pipeline after parsing, never here.
use crate::input::{is_sorted_and_unique, read_toml};
use crate::year::YearValue;
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

const CONFIG_FILE_NAME: &str = "config.toml";

/// The full model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// The default program log level
    #[serde(default)]
    pub log_level: Option<String>,
    /// Scenario selection
    pub scenario: ScenarioConfig,
    /// Cost table assumptions
    pub costs: CostsConfig,
    /// Historical emissions bookkeeping for carbon budgets
    #[serde(default)]
    pub emissions: EmissionsConfig,
    /// How to strip the electricity-only base network
    pub base_network: BaseNetworkConfig,
    /// Sector-coupling options
    pub sector: SectorConfig,
    /// Wave energy technologies (used by `wave` tokens)
    #[serde(default)]
    pub wave: WaveConfig,
}

impl Config {
    /// Read the model configuration from the specified model directory.
    pub fn from_path(model_dir: &Path) -> Result<Config> {
        let file_path = model_dir.join(CONFIG_FILE_NAME);
        let config: Config = read_toml(&file_path)?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", file_path.display()))?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let years = &self.scenario.planning_horizons;
        ensure!(!years.is_empty(), "planning_horizons is empty");
        ensure!(
            is_sorted_and_unique(years),
            "planning_horizons must be composed of unique values in order"
        );
        ensure!(
            years.contains(&self.scenario.investment_year),
            "investment_year {} is not a planning horizon",
            self.scenario.investment_year
        );

        Ok(())
    }
}

/// The scenario to prepare
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioConfig {
    /// `-`-delimited scenario option descriptor
    #[serde(default)]
    pub sector_opts: String,
    /// The ordered planning years of the transition path
    pub planning_horizons: Vec<u32>,
    /// The planning year this run prepares the network for
    pub investment_year: u32,
}

/// Assumptions applied when building the cost table
#[derive(Debug, Clone, Deserialize)]
pub struct CostsConfig {
    /// Conversion rate applied to USD-denominated cost entries
    pub usd_to_eur: f64,
    /// Default discount rate for technologies without one
    pub discount_rate: f64,
    /// Default lifetime in years for technologies without one
    pub lifetime: f64,
    /// CO2 cap as a fraction of base-year emissions (may vary by year)
    pub co2_budget: YearValue,
}

/// Reference years for historical emissions
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmissionsConfig {
    /// The year emission caps are expressed relative to
    pub base_year: u32,
    /// The most recent year with historical emissions data
    pub reference_year: u32,
    /// Years between the reference year and the first planning year, assumed
    /// to emit at the reference level and subtracted from carbon budgets
    pub flat_years: f64,
}

impl Default for EmissionsConfig {
    fn default() -> Self {
        EmissionsConfig {
            base_year: 1990,
            reference_year: 2018,
            flat_years: 2.0,
        }
    }
}

/// Planning foresight mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Foresight {
    /// A single overnight investment optimisation
    Overnight,
    /// Sequential planning with existing capacities carried between years
    Myopic,
}

/// How to strip the electricity-only base network before sector coupling
#[derive(Debug, Clone, Deserialize)]
pub struct BaseNetworkConfig {
    /// Planning foresight mode
    pub foresight: Foresight,
    /// Generator carriers to keep from the base network
    pub generators: Vec<String>,
    /// Storage unit carriers to keep from the base network
    #[serde(default)]
    pub storage_units: Vec<String>,
    /// Link carriers to keep from the base network
    #[serde(default = "default_link_carriers")]
    pub links: Vec<String>,
    /// Conventional fuel carriers given EU-level buses under myopic foresight
    #[serde(default)]
    pub conventional_carriers: Vec<String>,
}

fn default_link_carriers() -> Vec<String> {
    vec!["DC".to_string()]
}

/// Sector-coupling options consumed by the mutation functions
#[derive(Debug, Clone, Deserialize)]
pub struct SectorConfig {
    /// Whether district heating is available in high-density areas
    pub central: bool,
    /// Maximum fraction of urban heat demand servable by district heating
    pub central_fraction: f64,
    /// Relative distribution losses of district heating networks
    pub district_heating_loss: f64,
    /// Whether space heat demand is reduced exogenously (e.g. by renovation)
    #[serde(default)]
    pub reduce_space_heat_exogenously: bool,
    /// Fraction by which space heat demand is reduced (may vary by year)
    #[serde(default)]
    pub reduce_space_heat_exogenously_factor: Option<YearValue>,
    /// Use time-dependent coefficients of performance for heat pumps
    pub time_dep_hp_cop: bool,
    /// Build thermal energy storage (water tanks)
    pub tes: bool,
    /// Time constant in days for decentral thermal energy storage
    pub tes_tau: f64,
    /// Build resistive heaters and gas boilers
    pub boilers: bool,
    /// Build decentral oil boilers
    #[serde(default)]
    pub oil_boilers: bool,
    /// Build solar thermal collectors
    pub solar_thermal: bool,
    /// Build gas/biomass CHPs at district heating nodes
    pub chp: bool,
    /// Build micro-CHPs for individual heating
    #[serde(default)]
    pub micro_chp: bool,
    /// Allow vehicle-to-grid discharge
    pub v2g: bool,
    /// Allow demand-side management of EV charging
    pub bev_dsm: bool,
    /// Fraction of EV batteries available for demand-side management
    pub bev_availability: f64,
    /// Tank-to-wheel efficiency of fuel cell vehicles
    pub transport_fuel_cell_efficiency: f64,
    /// Tank-to-wheel efficiency of internal combustion vehicles
    pub transport_internal_combustion_efficiency: f64,
    /// Share of land transport covered by fuel cell vehicles (by year)
    pub land_transport_fuel_cell_share: YearValue,
    /// Share of land transport covered by battery-electric vehicles (by year)
    pub land_transport_electric_share: YearValue,
    /// Scaling of total land transport demand (by year)
    #[serde(default = "year_value_one")]
    pub land_transport_demand: YearValue,
    /// Store hydrogen in salt caverns where the geology allows
    pub hydrogen_underground_storage: bool,
    /// Build methanation (Sabatier) links
    pub methanation: bool,
    /// Build direct power-to-methane (helmeth) links
    #[serde(default)]
    pub helmeth: bool,
    /// Build steam methane reforming links
    pub smr: bool,
    /// Fraction of CO2 captured by carbon-capture variants
    pub cc_fraction: f64,
    /// Marginal cost applied to storage dischargers
    pub marginal_cost_storage: f64,
    /// Allow venting of stored CO2 to the atmosphere
    pub co2_vent: bool,
    /// Build direct air capture
    pub dac: bool,
    /// Capital cost of CO2 sequestration per tCO2
    pub co2_sequestration_cost: f64,
    /// Share of shipping converted to hydrogen
    pub shipping_h2_share: f64,
    /// Scaling of total shipping demand (by year)
    pub shipping_demand: YearValue,
    /// Average efficiency of today's shipping oil engines
    pub shipping_average_efficiency: f64,
    /// Scaling of total aviation demand (by year)
    pub aviation_demand: YearValue,
    /// Route Fischer-Tropsch waste heat into district heating
    pub use_fischer_tropsch_waste_heat: bool,
    /// Route biofuel process waste heat into district heating
    pub use_biofuel_waste_heat: bool,
    /// Route fuel cell waste heat into district heating
    pub use_fuel_cell_waste_heat: bool,
    /// Insert an electricity distribution grid (overridden by `dist` tokens)
    #[serde(default)]
    pub electricity_distribution_grid: bool,
    /// Investment cost factor for the distribution grid
    #[serde(default = "one")]
    pub electricity_distribution_grid_cost_factor: f64,
    /// Add gas distribution grid costs to decentral gas technologies
    #[serde(default)]
    pub gas_distribution_grid: bool,
    /// Investment cost factor for the gas distribution grid
    #[serde(default = "one")]
    pub gas_distribution_grid_cost_factor: f64,
    /// Add grid connection costs to onshore wind and utility solar
    #[serde(default)]
    pub electricity_grid_connection: bool,
    /// Convert AC lines to an HVDC transport model
    #[serde(default)]
    pub hvdc: bool,
    /// Build inter-node solid biomass transport links
    #[serde(default)]
    pub biomass_transport: bool,
}

fn one() -> f64 {
    1.0
}

fn year_value_one() -> YearValue {
    YearValue::Flat(1.0)
}

/// Wave energy technology assumptions
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WaveConfig {
    /// The bus wave generators attach to
    #[serde(default)]
    pub bus: Option<String>,
    /// Base capital cost in EUR/MW per wave technology
    #[serde(default)]
    pub technologies: BTreeMap<String, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, write_toy_config};
    use tempfile::tempdir;

    #[test]
    fn test_config_from_path() {
        let dir = tempdir().unwrap();
        write_toy_config(dir.path(), "T-H", 2030);

        let config = Config::from_path(dir.path()).unwrap();
        assert_eq!(config.scenario.sector_opts, "T-H");
        assert_eq!(config.scenario.investment_year, 2030);
        assert_eq!(config.base_network.foresight, Foresight::Overnight);
        assert!(config.sector.central);
    }

    #[test]
    fn test_config_rejects_investment_year_outside_horizons() {
        let dir = tempdir().unwrap();
        write_toy_config(dir.path(), "", 2055);

        assert_error!(
            Config::from_path(dir.path()),
            format!(
                "Invalid configuration in {}",
                dir.path().join(CONFIG_FILE_NAME).display()
            )
        );
    }
}
