//! The preparation pipeline dispatcher.
//!
//! A fixed, hand-ordered sequence of conditional stages. The order carries
//! the consistency guarantees:
//!
//! 1. legacy single-sector components are removed before any sector-coupled
//!    component is added;
//! 2. the cost table and the CO2 tracking buses exist before any
//!    technology-adding stage references them;
//! 3. heat and industry run before the cross-sector waste heat rewiring;
//! 4. temporal resampling runs after all component additions and before the
//!    CO2 limit, whose scaling uses snapshot weightings;
//! 5. the CO2 limit resolves configuration, carbon budget trajectory and
//!    explicit token overrides in that order;
//! 6. generic per-technology scaling runs last, on the final component set.
use crate::config::{Config, Foresight};
use crate::costs::CostTable;
use crate::emissions::load_or_build_carbon_budget;
use crate::layout::PopulationLayout;
use crate::network::io::{export_to_csv_dir, import_from_csv_dir};
use crate::network::resample::average_every_nhours;
use crate::network::topology::electric_components;
use crate::options::{ScenarioOption, ScenarioOptions};
use crate::sector::{
    PrepareContext, base, biomass, co2, generation, grid, heat, industry, storage, transport,
};
use crate::tables::{Profiles, Tables};
use anyhow::{Context, Result};
use log::{info, warn};
use std::path::Path;

/// Folder inside the model directory holding the base network
const NETWORK_DIR_NAME: &str = "network";

/// Folder inside the output directory receiving the prepared network
const PRENETWORK_DIR_NAME: &str = "prenetwork";

/// Run the full preparation pipeline for one scenario.
///
/// Imports the base electricity network from the model directory, applies the
/// scenario's mutation stages in order and exports the sector-coupled network
/// to the output directory. Any stage failure aborts the run; nothing is
/// written on error.
pub fn prepare(model_dir: &Path, mut config: Config, output_dir: &Path) -> Result<()> {
    let options = ScenarioOptions::parse(&config.scenario.sector_opts)?;
    info!("Scenario options: {}", config.scenario.sector_opts);
    info!("Investment year: {}", config.scenario.investment_year);

    // Token overrides of static configuration
    if let Some(cost_factor) = options.distribution_grid_factor() {
        config.sector.electricity_distribution_grid = true;
        config.sector.electricity_distribution_grid_cost_factor = cost_factor;
    }
    if options.has_no_district() {
        config.sector.central = false;
    }

    let mut network = import_from_csv_dir(&model_dir.join(NETWORK_DIR_NAME))
        .context("Failed to load the base network")?;
    info!(
        "Loaded base network with {} buses and {} snapshots",
        network.buses.len(),
        network.snapshots.len()
    );

    let nyears = network.nyears();
    let layout = PopulationLayout::from_path(model_dir)?;
    let costs = CostTable::from_path(model_dir, &config.costs, nyears)?;
    let tables = Tables::load(model_dir, &config, &options)?;
    let profiles = Profiles::load(model_dir, &config, &options, network.snapshots.len())?;

    let ctx = PrepareContext {
        model_dir: model_dir.to_path_buf(),
        config,
        options,
        costs,
        layout,
        tables,
        profiles,
        nyears,
    };

    // Strip the electricity-only network before adding anything
    base::remove_elec_base_techs(&mut network, &ctx)?;
    base::remove_non_electric_buses(&mut network);
    base::relabel_base_network(&mut network);
    if electric_components(&network) > 1 {
        warn!("The electricity grid is not connected");
    }
    base::update_wind_solar_costs(&mut network, &ctx)?;

    if ctx.config.base_network.foresight == Foresight::Myopic {
        base::add_lifetime_wind_solar(&mut network, &ctx)?;
        base::add_carrier_buses(&mut network, &ctx)?;
    }

    co2::add_co2_tracking(&mut network, &ctx)?;
    generation::add_generation(&mut network, &ctx)?;
    storage::add_storage(&mut network, &ctx)?;

    for option in ctx.options.iter() {
        if let ScenarioOption::Wave { cost_factor } = option {
            generation::add_wave(&mut network, &ctx, *cost_factor)?;
        }
    }

    if ctx.options.has_heat() {
        heat::add_heat(&mut network, &ctx)?;
    }

    if ctx.options.has_industry() {
        industry::add_industry(&mut network, &ctx)?;
    }

    if ctx.sector().hvdc {
        grid::hvdc_transport_model(&mut network)?;
    }

    if ctx.options.has_biomass() {
        biomass::add_biomass(&mut network, &ctx)?;
        if ctx.sector().biomass_transport {
            biomass::add_biomass_transport(&mut network, &ctx)?;
        }
    }

    if ctx.options.has_transport() {
        transport::add_land_transport(&mut network, &ctx)?;
    }

    if ctx.options.has_industry() && ctx.options.has_heat() {
        industry::add_waste_heat(&mut network, &ctx)?;
    }

    if ctx.sector().dac {
        co2::add_dac(&mut network, &ctx)?;
    }

    if ctx.options.has_decentral() {
        storage::decentral(&mut network);
    }

    if ctx.options.has_no_h2_network() {
        storage::remove_h2_network(&mut network, &ctx)?;
    }

    if let Some(hours) = ctx.options.resample_hours() {
        network = average_every_nhours(&network, hours)?;
    } else {
        info!("No resampling");
    }

    let limit = resolve_co2_limit(&ctx, model_dir, output_dir)?;
    co2::add_co2limit(&mut network, &ctx, limit)?;

    if let Some(gigawatts) = ctx.options.line_max_extension() {
        grid::apply_line_extension_limit(&mut network, gigawatts);
    }

    if ctx.sector().electricity_distribution_grid {
        grid::insert_electricity_distribution_grid(&mut network, &ctx)?;
    }

    for option in ctx.options.iter() {
        if let ScenarioOption::TechScale { tech, attr, factor } = option {
            grid::apply_tech_scaling(&mut network, tech, *attr, *factor)?;
        }
    }

    if ctx.sector().gas_distribution_grid {
        industry::insert_gas_distribution_costs(&mut network, &ctx)?;
    }
    if ctx.sector().electricity_grid_connection {
        grid::add_electricity_grid_connection(&mut network, &ctx)?;
    }

    network.validate().context("Prepared network is inconsistent")?;

    let prenetwork_dir = output_dir.join(PRENETWORK_DIR_NAME);
    export_to_csv_dir(&network, &prenetwork_dir)?;
    info!(
        "Prepared network exported to {}",
        prenetwork_dir.display()
    );

    Ok(())
}

/// Resolve the CO2 cap fraction for the investment year.
///
/// The configured budget applies unless a carbon budget token overrides it
/// with a trajectory value, which an explicit `Co2L` token in turn overrides.
fn resolve_co2_limit(ctx: &PrepareContext, model_dir: &Path, output_dir: &Path) -> Result<f64> {
    let year = ctx.investment_year();
    let mut limit = ctx
        .config
        .costs
        .co2_budget
        .resolve(year)
        .context("Could not resolve the configured CO2 budget")?;
    info!("CO2 limit set to {limit}");

    if let Some((budget, model)) = ctx.options.carbon_budget() {
        let path = load_or_build_carbon_budget(
            output_dir,
            model_dir,
            budget,
            model,
            &ctx.layout.countries(),
            &ctx.options,
            &ctx.config.emissions,
            &ctx.config.scenario.planning_horizons,
        )?;
        limit = path.cap(year)?;
        info!("Overriding CO2 limit with carbon budget trajectory limit {limit}");
    }

    if let Some(token_limit) = ctx.options.co2_limit() {
        limit = token_limit;
        info!("Overriding CO2 limit with scenario limit {limit}");
    }

    Ok(limit)
}
