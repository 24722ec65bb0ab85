//! Stripping and re-costing of the electricity-only base network.
use super::PrepareContext;
use crate::id::{BusID, CarrierID, GeneratorID, StoreID};
use crate::network::{Bus, Generator, Network, Store};
use crate::tables::WideTable;
use anyhow::Result;
use indexmap::IndexSet;
use itertools::Itertools;
use log::{debug, info};

/// Remove conventional generators, storage units and extra links from the
/// base network; sector-coupled replacements are added back as links later.
///
/// Carriers not named in the keep-lists are dropped together with their
/// components.
pub fn remove_elec_base_techs(network: &mut Network, ctx: &PrepareContext) -> Result<()> {
    let base = &ctx.config.base_network;
    let mut dropped: IndexSet<CarrierID> = IndexSet::new();

    macro_rules! strip {
        ($field:ident, $keep:expr, $class:literal) => {
            let keep = $keep;
            let removed: Vec<_> = network
                .$field
                .iter()
                .filter(|(_, c)| !keep.iter().any(|k| k == c.carrier.as_str()))
                .map(|(id, c)| (id.clone(), c.carrier.clone()))
                .collect();
            if !removed.is_empty() {
                info!(
                    "Removing {} with carrier [{}]",
                    $class,
                    removed.iter().map(|(_, c)| c).unique().join(", ")
                );
            }
            for (id, carrier) in removed {
                network.$field.shift_remove(&id);
                dropped.insert(carrier);
            }
        };
    }

    strip!(generators, &base.generators, "generators");
    strip!(storage_units, &base.storage_units, "storage units");
    strip!(links, &base.links, "links");

    for carrier in dropped {
        network.carriers.shift_remove(&carrier);
    }

    Ok(())
}

/// Remove buses whose carrier is not an electricity bus carrier.
pub fn remove_non_electric_buses(network: &mut Network) {
    let dropped: IndexSet<&str> = network
        .buses
        .values()
        .map(|bus| bus.carrier.as_str())
        .filter(|c| !matches!(*c, "AC" | "DC"))
        .collect();
    if !dropped.is_empty() {
        info!("Dropping buses with carrier [{}]", dropped.iter().join(", "));
    }

    network
        .buses
        .retain(|_, bus| matches!(bus.carrier.as_str(), "AC" | "DC"));
}

/// Tag every load as electricity demand and anchor every bus at itself.
///
/// The base network leaves the load carrier blank and has no location
/// attribute; sector coupling relies on both.
pub fn relabel_base_network(network: &mut Network) {
    network.ensure_carrier("electricity");
    for load in network.loads.values_mut() {
        load.carrier = CarrierID::new("electricity");
    }
    for (id, bus) in &mut network.buses {
        bus.location = id.to_string();
    }
}

/// Update wind and solar capital costs to the planning-year cost table.
///
/// Offshore wind additionally carries substation costs and, where the
/// optional per-generator table `offshore_connection_costs.csv` provides
/// them, grid connection costs. NB: solar costs are revisited when the
/// distribution grid is inserted.
pub fn update_wind_solar_costs(network: &mut Network, ctx: &PrepareContext) -> Result<()> {
    let connection_costs_path = ctx.model_dir.join("offshore_connection_costs.csv");
    let connection_costs = if connection_costs_path.is_file() {
        Some(WideTable::from_path(&connection_costs_path)?)
    } else {
        debug!("No offshore connection cost table; assuming zero connection costs");
        None
    };

    let updates: Vec<(GeneratorID, f64)> = network
        .generators
        .iter()
        .filter_map(|(id, generator)| {
            let cost = match generator.carrier.as_str() {
                "solar" => ctx.costs.at("solar-utility", "fixed"),
                "onwind" => ctx.costs.at("onwind", "fixed"),
                tech @ ("offwind-ac" | "offwind-dc") => (|| -> Result<f64> {
                    let connection = connection_costs
                        .as_ref()
                        .and_then(|table| table.at_optional(id.as_str(), "cost"))
                        .unwrap_or(0.0);
                    Ok(ctx.costs.at("offwind", "fixed")?
                        + ctx.costs.at(&format!("{tech}-station"), "fixed")?
                        + connection)
                })(),
                _ => return None,
            };
            Some(cost.map(|c| (id.clone(), c)))
        })
        .collect::<Result<_>>()?;

    for (id, capital_cost) in updates {
        network.generator_mut(id.as_str())?.capital_cost = capital_cost;
    }

    Ok(())
}

/// Set lifetimes for wind and solar generators (myopic foresight only).
pub fn add_lifetime_wind_solar(network: &mut Network, ctx: &PrepareContext) -> Result<()> {
    let updates: Vec<(GeneratorID, f64)> = network
        .generators
        .iter()
        .filter_map(|(id, generator)| {
            let tech = match generator.carrier.as_str() {
                "offwind-ac" | "offwind-dc" => "offwind",
                tech @ ("solar" | "onwind") => tech,
                _ => return None,
            };
            Some(ctx.costs.at(tech, "lifetime").map(|l| (id.clone(), l)))
        })
        .collect::<Result<_>>()?;

    for (id, lifetime) in updates {
        network.generator_mut(id.as_str())?.lifetime = lifetime;
    }

    Ok(())
}

/// Add continental fuel buses for conventional carriers (myopic foresight).
///
/// Each carrier gets an `EU <carrier>` bus with an unbounded cyclic store and
/// a generator priced at the fuel cost, so existing conventional plants keep a
/// fuel supply.
pub fn add_carrier_buses(network: &mut Network, ctx: &PrepareContext) -> Result<()> {
    for carrier in &ctx.config.base_network.conventional_carriers {
        let bus = BusID::new(&format!("EU {carrier}"));
        network.add_carrier(CarrierID::new(carrier), Default::default())?;
        network.add_bus(
            bus.clone(),
            Bus {
                carrier: CarrierID::new(carrier),
                location: "EU".to_string(),
                country: None,
            },
        )?;
        network.add_store(
            StoreID::new(&format!("EU {carrier} Store")),
            Store {
                bus: bus.clone(),
                carrier: CarrierID::new(carrier),
                e_nom_extendable: true,
                e_cyclic: true,
                ..Store::default()
            },
        )?;
        network.add_generator(
            GeneratorID::new(&format!("EU {carrier}")),
            Generator {
                bus,
                carrier: CarrierID::new(carrier),
                p_nom_extendable: true,
                marginal_cost: ctx.costs.at(carrier, "fuel")?,
                ..Generator::default()
            },
        )?;
    }

    Ok(())
}
