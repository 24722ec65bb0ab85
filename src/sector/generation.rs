//! Conventional electricity generation and wave energy.
use super::PrepareContext;
use crate::costs::annuity;
use crate::id::{BusID, CarrierID, GeneratorID, LinkID, StoreID};
use crate::network::{Bus, Generator, Link, Network, Store};
use anyhow::{Context, Result};
use log::info;

/// Add gas-fired generation as links from a continental gas bus.
///
/// The gas bus carries an unbounded cyclic store and a fuel-priced generator;
/// each node gets an OCGT link whose CO2 rides on port 2 to the atmosphere.
pub fn add_generation(network: &mut Network, ctx: &PrepareContext) -> Result<()> {
    info!("Adding electricity generation");
    let costs = &ctx.costs;

    for (generator, carrier) in [("OCGT", "gas")] {
        let fuel_bus = BusID::new(&format!("EU {carrier}"));
        network.add_carrier(CarrierID::new(carrier), Default::default())?;
        network.add_bus(
            fuel_bus.clone(),
            Bus {
                carrier: CarrierID::new(carrier),
                location: "EU".to_string(),
                country: None,
            },
        )?;
        network.add_store(
            StoreID::new(&format!("EU {carrier} Store")),
            Store {
                bus: fuel_bus.clone(),
                carrier: CarrierID::new(carrier),
                e_nom_extendable: true,
                e_cyclic: true,
                ..Store::default()
            },
        )?;
        network.add_generator(
            GeneratorID::new(&format!("EU {carrier}")),
            Generator {
                bus: fuel_bus.clone(),
                carrier: CarrierID::new(carrier),
                p_nom_extendable: true,
                marginal_cost: costs.at(carrier, "fuel")?,
                ..Generator::default()
            },
        )?;

        let efficiency = costs.at(generator, "efficiency")?;
        network.ensure_carrier(generator);
        for node in ctx.nodes() {
            network.add_link(
                LinkID::new(&format!("{node} {generator}")),
                Link {
                    bus0: fuel_bus.clone(),
                    bus1: node.clone(),
                    bus2: Some(BusID::new("co2 atmosphere")),
                    carrier: CarrierID::new(generator),
                    // NB: VOM and fixed cost are per MWel
                    marginal_cost: efficiency * costs.at(generator, "VOM")?,
                    capital_cost: efficiency * costs.at(generator, "fixed")?,
                    p_nom_extendable: true,
                    efficiency: efficiency.into(),
                    efficiency2: costs.at(carrier, "CO2 intensity")?,
                    lifetime: costs.at(generator, "lifetime")?,
                    ..Link::default()
                },
            )?;
        }
    }

    Ok(())
}

/// Add wave energy generators at the configured bus.
///
/// One extendable generator per configured wave technology, with the base
/// capital cost scaled by the scenario token's cost factor and availability
/// taken from the wave profile.
pub fn add_wave(network: &mut Network, ctx: &PrepareContext, cost_factor: f64) -> Result<()> {
    info!("Including wave generators with cost factor of {cost_factor}");

    let bus = ctx
        .config
        .wave
        .bus
        .as_deref()
        .context("Wave token requires [wave] bus in the configuration")?;
    let profile = ctx.profiles.wave()?;

    network.ensure_carrier("wave");
    for (technology, base_cost) in &ctx.config.wave.technologies {
        network.add_generator(
            GeneratorID::new(&format!("{bus} {technology}")),
            Generator {
                bus: BusID::new(bus),
                carrier: CarrierID::new("wave"),
                p_nom_extendable: true,
                capital_cost: (annuity(25.0, 0.07) + 0.03) * base_cost * cost_factor,
                p_max_pu: profile.get(technology)?.to_vec().into(),
                ..Generator::default()
            },
        )?;
    }

    Ok(())
}
