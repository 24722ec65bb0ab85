//! Heating coupling: the five heat system variants per node.
use super::PrepareContext;
use crate::id::{BusID, CarrierID, GeneratorID, LinkID, LoadID, StoreID};
use crate::network::{Bus, Generator, Link, Load, Network, Store, TimeVarying};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::info;
use strum::{Display, EnumIter, IntoEnumIterator};

/// Countries where urban areas keep individual heating even when district
/// heating is enabled (low heat density)
const URBAN_DECENTRAL_COUNTRIES: [&str; 5] = ["ES", "GR", "PT", "IT", "BG"];

/// Time constant in days for central thermal energy storage
const CENTRAL_TES_TAU: f64 = 180.0;

/// The heat system variants a node's heat demand is split across
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum HeatSystem {
    /// Individual heating in low-density areas, residential sector
    #[strum(serialize = "residential rural")]
    ResidentialRural,
    /// Individual heating in low-density areas, services sector
    #[strum(serialize = "services rural")]
    ServicesRural,
    /// Individual heating in high-density areas, residential sector
    #[strum(serialize = "residential urban decentral")]
    ResidentialUrbanDecentral,
    /// Individual heating in high-density areas, services sector
    #[strum(serialize = "services urban decentral")]
    ServicesUrbanDecentral,
    /// District heating; residential and services are aggregated
    #[strum(serialize = "urban central")]
    UrbanCentral,
}

impl HeatSystem {
    /// Whether the system serves high-density areas
    fn is_urban(self) -> bool {
        !matches!(self, Self::ResidentialRural | Self::ServicesRural)
    }

    /// The demand sector, or `None` for the aggregated district system
    fn sector(self) -> Option<&'static str> {
        match self {
            Self::ResidentialRural | Self::ResidentialUrbanDecentral => Some("residential"),
            Self::ServicesRural | Self::ServicesUrbanDecentral => Some("services"),
            Self::UrbanCentral => None,
        }
    }

    /// Cost table prefix: district systems use central technology costs
    fn name_type(self) -> &'static str {
        match self {
            Self::UrbanCentral => "central",
            _ => "decentral",
        }
    }

    /// Heat pump source: urban areas lack ground collector space
    fn heat_pump_type(self) -> &'static str {
        if self.is_urban() { "air" } else { "ground" }
    }
}

/// Which nodes get which heat system.
///
/// Rural systems cover every node. With district heating enabled, urban
/// demand is central except in the low-heat-density countries; without it,
/// all urban demand is decentral and no node gets the central system.
pub fn heat_system_nodes(ctx: &PrepareContext) -> IndexMap<HeatSystem, Vec<BusID>> {
    let all: Vec<BusID> = ctx.nodes();
    let urban_decentral: Vec<BusID> = if ctx.sector().central {
        ctx.layout
            .nodes_in_countries(&URBAN_DECENTRAL_COUNTRIES)
            .cloned()
            .collect()
    } else {
        all.clone()
    };
    let urban_central: Vec<BusID> = all
        .iter()
        .filter(|node| !urban_decentral.contains(node))
        .cloned()
        .collect();

    IndexMap::from([
        (HeatSystem::ResidentialRural, all.clone()),
        (HeatSystem::ServicesRural, all),
        (HeatSystem::ResidentialUrbanDecentral, urban_decentral.clone()),
        (HeatSystem::ServicesUrbanDecentral, urban_decentral),
        (HeatSystem::UrbanCentral, urban_central),
    ])
}

/// Remove electric heating from the electricity load.
///
/// The base network's loads contain today's electric heating, which the heat
/// systems now model explicitly.
fn subtract_electric_heat(network: &mut Network, ctx: &PrepareContext) -> Result<()> {
    let supply = ctx.profiles.electric_heat_supply()?;
    let n_snapshots = network.snapshots.len();

    let electric_loads: Vec<_> = network
        .loads
        .iter()
        .filter(|(_, load)| load.carrier.as_str() == "electricity")
        .map(|(id, _)| id.clone())
        .collect();
    for id in electric_loads {
        let heat = supply.get(id.as_str())?;
        let load = network.load_mut(id.as_str())?;
        let mut values = match &load.p_set {
            TimeVarying::Static(v) => vec![*v; n_snapshots],
            TimeVarying::Series(values) => values.clone(),
        };
        for (value, h) in values.iter_mut().zip(heat) {
            *value -= h;
        }
        load.p_set = values.into();
    }

    Ok(())
}

/// The nodal heat load of one heat system, in MW per snapshot.
fn heat_load(
    ctx: &PrepareContext,
    system: HeatSystem,
    node: &BusID,
    space_reduction: f64,
) -> Result<Vec<f64>> {
    let urban_fraction = ctx
        .layout
        .urban_fraction(node, ctx.sector().central_fraction)?;

    let sectors: Vec<&str> = match system.sector() {
        Some(sector) => vec![sector],
        None => vec!["residential", "services"],
    };
    let n_snapshots = ctx
        .profiles
        .heat_demand("residential space")?
        .get(node.as_str())?
        .len();

    let mut load = vec![0.0; n_snapshots];
    for sector in sectors {
        let water = ctx.profiles.heat_demand(&format!("{sector} water"))?;
        let space = ctx.profiles.heat_demand(&format!("{sector} space"))?;
        for ((l, w), s) in load
            .iter_mut()
            .zip(water.get(node.as_str())?)
            .zip(space.get(node.as_str())?)
        {
            *l += w + (1.0 - space_reduction) * s;
        }
    }

    let factor = match system {
        HeatSystem::UrbanCentral => {
            urban_fraction * (1.0 + ctx.sector().district_heating_loss)
        }
        _ if system.is_urban() => urban_fraction,
        _ => 1.0 - urban_fraction,
    };
    for value in &mut load {
        *value *= factor;
    }

    Ok(load)
}

/// Add heat buses, loads and heating technologies for every heat system.
pub fn add_heat(network: &mut Network, ctx: &PrepareContext) -> Result<()> {
    info!("Adding heat");
    let costs = &ctx.costs;
    let system_nodes = heat_system_nodes(ctx);

    subtract_electric_heat(network, ctx)?;

    let space_reduction = if ctx.sector().reduce_space_heat_exogenously {
        let factor = ctx
            .sector()
            .reduce_space_heat_exogenously_factor
            .as_ref()
            .context("reduce_space_heat_exogenously requires a reduction factor")?
            .resolve(ctx.investment_year())?;
        info!("Assumed space heat reduction of {}%", factor * 100.0);
        factor
    } else {
        0.0
    };

    for system in HeatSystem::iter() {
        let nodes = &system_nodes[&system];
        let name_type = system.name_type();

        network.ensure_carrier(&format!("{system} heat"));
        for node in nodes {
            network.add_bus(
                node.suffixed(&format!(" {system} heat")),
                Bus {
                    carrier: CarrierID::new(&format!("{system} heat")),
                    location: node.to_string(),
                    country: None,
                },
            )?;
        }

        for node in nodes {
            let load = heat_load(ctx, system, node, space_reduction)?;
            network.add_load(
                LoadID::new(&format!("{node} {system} heat")),
                Load {
                    bus: node.suffixed(&format!(" {system} heat")),
                    carrier: CarrierID::new(&format!("{system} heat")),
                    p_set: load.into(),
                },
            )?;
        }

        // Heat pumps
        let pump_type = system.heat_pump_type();
        let costs_name = format!("{name_type} {pump_type}-sourced heat pump");
        let static_efficiency = costs.at(&costs_name, "efficiency")?;
        let cop = match pump_type {
            "air" => ctx.profiles.cop_air()?,
            _ => ctx.profiles.cop_soil()?,
        };
        network.ensure_carrier(&format!("{system} {pump_type} heat pump"));
        for node in nodes {
            let efficiency: TimeVarying = if ctx.sector().time_dep_hp_cop {
                cop.get(node.as_str())?.to_vec().into()
            } else {
                static_efficiency.into()
            };
            network.add_link(
                LinkID::new(&format!("{node} {system} {pump_type} heat pump")),
                Link {
                    bus0: node.clone(),
                    bus1: node.suffixed(&format!(" {system} heat")),
                    carrier: CarrierID::new(&format!("{system} {pump_type} heat pump")),
                    efficiency,
                    capital_cost: static_efficiency * costs.at(&costs_name, "fixed")?,
                    p_nom_extendable: true,
                    lifetime: costs.at(&costs_name, "lifetime")?,
                    ..Link::default()
                },
            )?;
        }

        if ctx.sector().tes {
            add_thermal_storage(network, ctx, system, nodes)?;
        }

        if ctx.sector().boilers {
            add_boilers(network, ctx, system, nodes)?;
        }

        if ctx.sector().solar_thermal {
            network.ensure_carrier(&format!("{system} solar thermal"));
            for node in nodes {
                network.add_generator(
                    GeneratorID::new(&format!("{node} {system} solar thermal collector")),
                    Generator {
                        bus: node.suffixed(&format!(" {system} heat")),
                        carrier: CarrierID::new(&format!("{system} solar thermal")),
                        p_nom_extendable: true,
                        capital_cost: costs.at(&format!("{name_type} solar thermal"), "fixed")?,
                        p_max_pu: ctx
                            .profiles
                            .solar_thermal()?
                            .get(node.as_str())?
                            .to_vec()
                            .into(),
                        lifetime: costs.at(&format!("{name_type} solar thermal"), "lifetime")?,
                        ..Generator::default()
                    },
                )?;
            }
        }

        if ctx.sector().chp {
            if system == HeatSystem::UrbanCentral {
                // Gas CHP; biomass CHP is added with the biomass sector
                add_central_gas_chp(network, ctx, nodes)?;
            } else if ctx.sector().micro_chp {
                add_micro_chp(network, ctx, system, nodes)?;
            }
        }
    }

    Ok(())
}

/// Add water tank thermal storage for one heat system.
fn add_thermal_storage(
    network: &mut Network,
    ctx: &PrepareContext,
    system: HeatSystem,
    nodes: &[BusID],
) -> Result<()> {
    let costs = &ctx.costs;
    let name_type = system.name_type();

    network.ensure_carrier(&format!("{system} water tanks"));
    for node in nodes {
        network.add_bus(
            node.suffixed(&format!(" {system} water tanks")),
            Bus {
                carrier: CarrierID::new(&format!("{system} water tanks")),
                location: node.to_string(),
                country: None,
            },
        )?;
        network.add_link(
            LinkID::new(&format!("{node} {system} water tanks charger")),
            Link {
                bus0: node.suffixed(&format!(" {system} heat")),
                bus1: node.suffixed(&format!(" {system} water tanks")),
                efficiency: costs.at("water tank charger", "efficiency")?.into(),
                carrier: CarrierID::new(&format!("{system} water tanks charger")),
                p_nom_extendable: true,
                ..Link::default()
            },
        )?;
        network.add_link(
            LinkID::new(&format!("{node} {system} water tanks discharger")),
            Link {
                bus0: node.suffixed(&format!(" {system} water tanks")),
                bus1: node.suffixed(&format!(" {system} heat")),
                carrier: CarrierID::new(&format!("{system} water tanks discharger")),
                efficiency: costs.at("water tank discharger", "efficiency")?.into(),
                p_nom_extendable: true,
                ..Link::default()
            },
        )?;

        let tau = if name_type == "decentral" {
            ctx.sector().tes_tau
        } else {
            CENTRAL_TES_TAU
        };
        network.add_store(
            StoreID::new(&format!("{node} {system} water tanks")),
            Store {
                bus: node.suffixed(&format!(" {system} water tanks")),
                carrier: CarrierID::new(&format!("{system} water tanks")),
                e_cyclic: true,
                e_nom_extendable: true,
                standing_loss: 1.0 - (-1.0 / (24.0 * tau)).exp(),
                // Conversion from EUR/m^3 to EUR/MWh for 40 K diff and
                // 1.17 kWh/m^3/K
                capital_cost: costs.at(&format!("{name_type} water tank storage"), "fixed")?
                    / (1.17e-3 * 40.0),
                lifetime: costs.at(&format!("{name_type} water tank storage"), "lifetime")?,
                ..Store::default()
            },
        )?;
    }

    Ok(())
}

/// Add resistive heaters and gas boilers for one heat system.
fn add_boilers(
    network: &mut Network,
    ctx: &PrepareContext,
    system: HeatSystem,
    nodes: &[BusID],
) -> Result<()> {
    let costs = &ctx.costs;
    let name_type = system.name_type();
    let heater = format!("{name_type} resistive heater");
    let boiler = format!("{name_type} gas boiler");

    network.ensure_carrier(&format!("{system} resistive heater"));
    network.ensure_carrier(&format!("{system} gas boiler"));
    for node in nodes {
        network.add_link(
            LinkID::new(&format!("{node} {system} resistive heater")),
            Link {
                bus0: node.clone(),
                bus1: node.suffixed(&format!(" {system} heat")),
                carrier: CarrierID::new(&format!("{system} resistive heater")),
                efficiency: costs.at(&heater, "efficiency")?.into(),
                capital_cost: costs.at(&heater, "efficiency")? * costs.at(&heater, "fixed")?,
                p_nom_extendable: true,
                lifetime: costs.at(&heater, "lifetime")?,
                ..Link::default()
            },
        )?;
        network.add_link(
            LinkID::new(&format!("{node} {system} gas boiler")),
            Link {
                p_nom_extendable: true,
                bus0: BusID::new("EU gas"),
                bus1: node.suffixed(&format!(" {system} heat")),
                bus2: Some(BusID::new("co2 atmosphere")),
                carrier: CarrierID::new(&format!("{system} gas boiler")),
                efficiency: costs.at(&boiler, "efficiency")?.into(),
                efficiency2: costs.at("gas", "CO2 intensity")?,
                capital_cost: costs.at(&boiler, "efficiency")? * costs.at(&boiler, "fixed")?,
                lifetime: costs.at(&boiler, "lifetime")?,
                ..Link::default()
            },
        )?;
    }

    Ok(())
}

/// Add gas CHPs, plain and with carbon capture, at district heating nodes.
fn add_central_gas_chp(network: &mut Network, ctx: &PrepareContext, nodes: &[BusID]) -> Result<()> {
    let costs = &ctx.costs;
    let gas_intensity = costs.at("gas", "CO2 intensity")?;
    let chp_efficiency = costs.at("central gas CHP", "efficiency")?;

    network.ensure_carrier("urban central gas CHP");
    network.ensure_carrier("urban central gas CHP CC");
    for node in nodes {
        network.add_link(
            LinkID::new(&format!("{node} urban central gas CHP")),
            Link {
                bus0: BusID::new("EU gas"),
                bus1: node.clone(),
                bus2: Some(node.suffixed(" urban central heat")),
                bus3: Some(BusID::new("co2 atmosphere")),
                carrier: CarrierID::new("urban central gas CHP"),
                p_nom_extendable: true,
                capital_cost: costs.at("central gas CHP", "fixed")? * chp_efficiency,
                marginal_cost: costs.at("central gas CHP", "VOM")?,
                efficiency: chp_efficiency.into(),
                efficiency2: chp_efficiency / costs.at("central gas CHP", "c_b")?,
                efficiency3: gas_intensity,
                lifetime: costs.at("central gas CHP", "lifetime")?,
                ..Link::default()
            },
        )?;

        network.add_link(
            LinkID::new(&format!("{node} urban central gas CHP CC")),
            Link {
                bus0: BusID::new("EU gas"),
                bus1: node.clone(),
                bus2: Some(node.suffixed(" urban central heat")),
                bus3: Some(BusID::new("co2 atmosphere")),
                bus4: Some(BusID::new("co2 stored")),
                carrier: CarrierID::new("urban central gas CHP CC"),
                p_nom_extendable: true,
                capital_cost: costs.at("central gas CHP", "fixed")? * chp_efficiency
                    + costs.at("biomass CHP capture", "fixed")? * gas_intensity,
                marginal_cost: costs.at("central gas CHP", "VOM")?,
                efficiency: (chp_efficiency
                    - gas_intensity
                        * (costs.at("biomass CHP capture", "electricity-input")?
                            + costs.at("biomass CHP capture", "compression-electricity-input")?))
                .into(),
                efficiency2: chp_efficiency / costs.at("central gas CHP", "c_b")?
                    + gas_intensity
                        * (costs.at("biomass CHP capture", "heat-output")?
                            + costs.at("biomass CHP capture", "compression-heat-output")?
                            - costs.at("biomass CHP capture", "heat-input")?),
                efficiency3: gas_intensity
                    * (1.0 - costs.at("biomass CHP capture", "capture_rate")?),
                efficiency4: gas_intensity * costs.at("biomass CHP capture", "capture_rate")?,
                lifetime: costs.at("central gas CHP", "lifetime")?,
                ..Link::default()
            },
        )?;
    }

    Ok(())
}

/// Add micro gas CHPs for one individual-heating system.
fn add_micro_chp(
    network: &mut Network,
    ctx: &PrepareContext,
    system: HeatSystem,
    nodes: &[BusID],
) -> Result<()> {
    let costs = &ctx.costs;

    network.ensure_carrier(&format!("{system} micro gas CHP"));
    for node in nodes {
        network.add_link(
            LinkID::new(&format!("{node} {system} micro gas CHP")),
            Link {
                p_nom_extendable: true,
                bus0: BusID::new("EU gas"),
                bus1: node.clone(),
                bus2: Some(node.suffixed(&format!(" {system} heat"))),
                bus3: Some(BusID::new("co2 atmosphere")),
                carrier: CarrierID::new(&format!("{system} micro gas CHP")),
                efficiency: costs.at("micro CHP", "efficiency")?.into(),
                efficiency2: costs.at("micro CHP", "efficiency-heat")?,
                efficiency3: costs.at("gas", "CO2 intensity")?,
                capital_cost: costs.at("micro CHP", "fixed")?,
                lifetime: costs.at("micro CHP", "lifetime")?,
                ..Link::default()
            },
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heat_system_names() {
        assert_eq!(HeatSystem::UrbanCentral.to_string(), "urban central");
        assert_eq!(
            HeatSystem::ResidentialUrbanDecentral.to_string(),
            "residential urban decentral"
        );
    }

    #[test]
    fn test_heat_system_types() {
        assert_eq!(HeatSystem::UrbanCentral.name_type(), "central");
        assert_eq!(HeatSystem::ResidentialRural.name_type(), "decentral");
        assert_eq!(HeatSystem::UrbanCentral.heat_pump_type(), "air");
        assert_eq!(HeatSystem::ServicesRural.heat_pump_type(), "ground");
        assert_eq!(HeatSystem::ServicesUrbanDecentral.heat_pump_type(), "air");
    }
}
