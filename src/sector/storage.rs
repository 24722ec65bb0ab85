//! Hydrogen and battery storage, power-to-gas and grid topology removals.
use super::PrepareContext;
use crate::id::{BusID, CarrierID, LinkID, StoreID};
use crate::network::topology::interconnector_topology;
use crate::network::{Bus, Link, Network, Store};
use anyhow::Result;
use log::info;

/// Add hydrogen and battery storage subsystems to every node.
///
/// Hydrogen gets a nodal bus with electrolysis and fuel cells, salt cavern
/// stores where the country's geology allows (tank storage elsewhere) and a
/// pipeline network along the grid corridors. Batteries get a nodal bus with
/// a cyclic store and charger/discharger links. Optionally adds methanation,
/// helmeth and steam methane reforming.
pub fn add_storage(network: &mut Network, ctx: &PrepareContext) -> Result<()> {
    info!("Adding electricity storage");
    let costs = &ctx.costs;
    let nodes = ctx.nodes();

    network.add_carrier(CarrierID::new("H2"), Default::default())?;
    for node in &nodes {
        network.add_bus(
            node.suffixed(" H2"),
            Bus {
                carrier: CarrierID::new("H2"),
                location: node.to_string(),
                country: None,
            },
        )?;
    }

    network.ensure_carrier("H2 Electrolysis");
    network.ensure_carrier("H2 Fuel Cell");
    for node in &nodes {
        network.add_link(
            LinkID::new(&format!("{node} H2 Electrolysis")),
            Link {
                bus0: node.clone(),
                bus1: node.suffixed(" H2"),
                p_nom_extendable: true,
                carrier: CarrierID::new("H2 Electrolysis"),
                efficiency: costs.at("electrolysis", "efficiency")?.into(),
                capital_cost: costs.at("electrolysis", "fixed")?,
                lifetime: costs.at("electrolysis", "lifetime")?,
                ..Link::default()
            },
        )?;
        network.add_link(
            LinkID::new(&format!("{node} H2 Fuel Cell")),
            Link {
                bus0: node.suffixed(" H2"),
                bus1: node.clone(),
                p_nom_extendable: true,
                carrier: CarrierID::new("H2 Fuel Cell"),
                efficiency: costs.at("fuel cell", "efficiency")?.into(),
                // NB: fixed cost is per MWel
                capital_cost: costs.at("fuel cell", "fixed")?
                    * costs.at("fuel cell", "efficiency")?,
                lifetime: costs.at("fuel cell", "lifetime")?,
                ..Link::default()
            },
        )?;
    }

    // Salt cavern storage where the country's geology allows, weighted within
    // a country by population; tank storage everywhere else
    network.ensure_carrier("H2 Store");
    let mut cavern_nodes = Vec::new();
    if ctx.sector().hydrogen_underground_storage {
        let caverns = ctx.tables.h2_caverns()?;
        let capital_cost = costs.at("hydrogen storage underground", "fixed")?;
        for node in &nodes {
            let entry = ctx.layout.get(node)?;
            let Some(potential) = caverns.at_optional(&entry.country, "potential") else {
                // No salt caverns in this country
                continue;
            };
            cavern_nodes.push(node.clone());
            network.add_store(
                StoreID::new(&format!("{node} H2 Store")),
                Store {
                    bus: node.suffixed(" H2"),
                    carrier: CarrierID::new("H2 Store"),
                    e_nom_extendable: true,
                    // 1e6 converts TWh to MWh
                    e_nom_max: potential * entry.fraction * 1e6,
                    e_cyclic: true,
                    capital_cost,
                    ..Store::default()
                },
            )?;
        }
    }

    let tank_cost = costs.at("hydrogen storage tank", "fixed")?;
    for node in nodes.iter().filter(|n| !cavern_nodes.contains(n)) {
        network.add_store(
            StoreID::new(&format!("{node} H2 Store")),
            Store {
                bus: node.suffixed(" H2"),
                carrier: CarrierID::new("H2 Store"),
                e_nom_extendable: true,
                e_cyclic: true,
                capital_cost: tank_cost,
                ..Store::default()
            },
        )?;
    }

    // Hydrogen pipelines along the electricity grid corridors
    network.ensure_carrier("H2 pipeline");
    for corridor in interconnector_topology(network) {
        network.add_link(
            LinkID::new(&corridor.name("H2 pipeline ")),
            Link {
                bus0: corridor.bus0.suffixed(" H2"),
                bus1: corridor.bus1.suffixed(" H2"),
                p_min_pu: (-1.0).into(),
                p_nom_extendable: true,
                length: corridor.length,
                capital_cost: costs.at("H2 pipeline", "fixed")? * corridor.length,
                carrier: CarrierID::new("H2 pipeline"),
                lifetime: costs.at("H2 pipeline", "lifetime")?,
                ..Link::default()
            },
        )?;
    }

    network.add_carrier(CarrierID::new("battery"), Default::default())?;
    network.ensure_carrier("battery charger");
    network.ensure_carrier("battery discharger");
    let inverter_efficiency = costs.at("battery inverter", "efficiency")?.sqrt();
    for node in &nodes {
        network.add_bus(
            node.suffixed(" battery"),
            Bus {
                carrier: CarrierID::new("battery"),
                location: node.to_string(),
                country: None,
            },
        )?;
        network.add_store(
            StoreID::new(&format!("{node} battery")),
            Store {
                bus: node.suffixed(" battery"),
                carrier: CarrierID::new("battery"),
                e_cyclic: true,
                e_nom_extendable: true,
                capital_cost: costs.at("battery storage", "fixed")?,
                lifetime: costs.at("battery storage", "lifetime")?,
                ..Store::default()
            },
        )?;
        network.add_link(
            LinkID::new(&format!("{node} battery charger")),
            Link {
                bus0: node.clone(),
                bus1: node.suffixed(" battery"),
                carrier: CarrierID::new("battery charger"),
                efficiency: inverter_efficiency.into(),
                capital_cost: costs.at("battery inverter", "fixed")?,
                p_nom_extendable: true,
                lifetime: costs.at("battery inverter", "lifetime")?,
                ..Link::default()
            },
        )?;
        network.add_link(
            LinkID::new(&format!("{node} battery discharger")),
            Link {
                bus0: node.suffixed(" battery"),
                bus1: node.clone(),
                carrier: CarrierID::new("battery discharger"),
                efficiency: inverter_efficiency.into(),
                marginal_cost: ctx.sector().marginal_cost_storage,
                p_nom_extendable: true,
                lifetime: costs.at("battery inverter", "lifetime")?,
                ..Link::default()
            },
        )?;
    }

    if ctx.sector().methanation {
        network.ensure_carrier("Sabatier");
        for node in &nodes {
            network.add_link(
                LinkID::new(&format!("{node} Sabatier")),
                Link {
                    bus0: node.suffixed(" H2"),
                    bus1: BusID::new("EU gas"),
                    bus2: Some(BusID::new("co2 stored")),
                    p_nom_extendable: true,
                    carrier: CarrierID::new("Sabatier"),
                    efficiency: costs.at("methanation", "efficiency")?.into(),
                    // The methane's carbon is withdrawn from storage
                    efficiency2: -costs.at("gas", "CO2 intensity")?
                        * costs.at("methanation", "efficiency")?,
                    capital_cost: costs.at("methanation", "fixed")?,
                    lifetime: costs.at("methanation", "lifetime")?,
                    ..Link::default()
                },
            )?;
        }
    }

    if ctx.sector().helmeth {
        network.ensure_carrier("helmeth");
        for node in &nodes {
            network.add_link(
                LinkID::new(&format!("{node} helmeth")),
                Link {
                    bus0: node.clone(),
                    bus1: BusID::new("EU gas"),
                    bus2: Some(BusID::new("co2 stored")),
                    carrier: CarrierID::new("helmeth"),
                    p_nom_extendable: true,
                    efficiency: costs.at("helmeth", "efficiency")?.into(),
                    efficiency2: -costs.at("helmeth", "efficiency")?
                        * costs.at("gas", "CO2 intensity")?,
                    capital_cost: costs.at("helmeth", "fixed")?,
                    lifetime: costs.at("helmeth", "lifetime")?,
                    ..Link::default()
                },
            )?;
        }
    }

    if ctx.sector().smr {
        let gas_intensity = costs.at("gas", "CO2 intensity")?;
        let cc_fraction = ctx.sector().cc_fraction;
        network.ensure_carrier("SMR CC");
        network.ensure_carrier("SMR");
        for node in &nodes {
            network.add_link(
                LinkID::new(&format!("{node} SMR CC")),
                Link {
                    bus0: BusID::new("EU gas"),
                    bus1: node.suffixed(" H2"),
                    bus2: Some(BusID::new("co2 atmosphere")),
                    bus3: Some(BusID::new("co2 stored")),
                    p_nom_extendable: true,
                    carrier: CarrierID::new("SMR CC"),
                    efficiency: costs.at("SMR CC", "efficiency")?.into(),
                    efficiency2: gas_intensity * (1.0 - cc_fraction),
                    efficiency3: gas_intensity * cc_fraction,
                    capital_cost: costs.at("SMR CC", "fixed")?,
                    lifetime: costs.at("SMR CC", "lifetime")?,
                    ..Link::default()
                },
            )?;
            network.add_link(
                LinkID::new(&format!("{node} SMR")),
                Link {
                    bus0: BusID::new("EU gas"),
                    bus1: node.suffixed(" H2"),
                    bus2: Some(BusID::new("co2 atmosphere")),
                    p_nom_extendable: true,
                    carrier: CarrierID::new("SMR"),
                    efficiency: costs.at("SMR", "efficiency")?.into(),
                    efficiency2: gas_intensity,
                    capital_cost: costs.at("SMR", "fixed")?,
                    lifetime: costs.at("SMR", "lifetime")?,
                    ..Link::default()
                },
            )?;
        }
    }

    Ok(())
}

/// Remove all interconnectors, leaving every node self-sufficient.
pub fn decentral(network: &mut Network) {
    info!("Removing interconnectors");
    network.lines.clear();
    network
        .links
        .retain(|_, link| !matches!(link.carrier.as_str(), "DC" | "B2B"));
}

/// Remove the hydrogen pipeline network and fall back to nodal storage.
///
/// Without inter-node transport, nodal stores are re-costed: where caverns
/// are available hydrogen competes with gas storage, otherwise tanks apply.
pub fn remove_h2_network(network: &mut Network, ctx: &PrepareContext) -> Result<()> {
    info!("Removing the hydrogen pipeline network");
    network
        .links
        .retain(|_, link| link.carrier.as_str() != "H2 pipeline");

    let capital_cost = if ctx.sector().hydrogen_underground_storage {
        ctx.costs.at("gas storage", "fixed")?
    } else {
        ctx.costs.at("hydrogen storage tank", "fixed")?
    };
    for node in ctx.nodes() {
        let store = network.store_mut(&format!("{node} H2 Store"))?;
        store.capital_cost = capital_cost;
    }

    Ok(())
}
