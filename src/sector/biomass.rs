//! Biomass coupling: digestible and solid biomass chains.
use super::{PrepareContext, ensure_eu_oil_bus};
use crate::id::{BusID, CarrierID, GeneratorID, LinkID, StoreID};
use crate::network::topology::interconnector_topology;
use crate::network::{Bus, Generator, Link, Network, Store};
use anyhow::Result;
use log::info;

/// Digestible biomass feedstocks with nodal potentials
const DIGESTIBLE_BIOMASS_TYPES: [&str; 4] =
    ["manureslurry", "municipal biowaste", "sewage sludge", "straw"];

/// Solid biomass feedstocks with nodal potentials
const SOLID_BIOMASS_TYPES: [&str; 3] = ["poplar", "forest residues", "industry wood residues"];

/// Import tier step size in MWh (10 EJ)
const IMPORT_STEP: f64 = 10e9 / 3.6;

/// Import threshold in MWh below which the cheapest tier tops up EU supply
const IMPORT_LOW_LEVEL: f64 = 20e9 / 3.6;

/// Add biomass feedstocks, conversion chains and optional imports.
///
/// Potentials are national and distributed to nodes by population. Each
/// feedstock type gets its own nodal bus/store/generator feeding an
/// aggregated digestible or solid biomass bus per node, from which the
/// conversion links (upgrading to gas, hydrogen, liquids, electricity and
/// CHP) depart.
pub fn add_biomass(network: &mut Network, ctx: &PrepareContext) -> Result<()> {
    info!("Adding biomass");
    let costs = &ctx.costs;
    let nodes = ctx.nodes();
    let potentials = ctx.tables.biomass_potentials()?;
    let gas_intensity = costs.at("gas", "CO2 intensity")?;
    let solid_intensity = costs.at("solid biomass", "CO2 intensity")?;

    for aggregate in ["digestible biomass", "solid biomass"] {
        network.add_carrier(CarrierID::new(aggregate), Default::default())?;
        for node in &nodes {
            network.add_bus(
                node.suffixed(&format!(" {aggregate}")),
                Bus {
                    carrier: CarrierID::new(aggregate),
                    location: node.to_string(),
                    country: None,
                },
            )?;
            network.add_store(
                StoreID::new(&format!("{node} {aggregate}")),
                Store {
                    bus: node.suffixed(&format!(" {aggregate}")),
                    carrier: CarrierID::new(aggregate),
                    e_cyclic: true,
                    ..Store::default()
                },
            )?;
        }
    }

    // NB: input substrates are priced into the feedstock potential and cost
    for name in DIGESTIBLE_BIOMASS_TYPES {
        let carrier = format!("{name} digestible biomass");
        network.add_carrier(CarrierID::new(&carrier), Default::default())?;
        for node in &nodes {
            let potential = potentials.nodal(&ctx.layout, node, name)?;
            network.add_bus(
                node.suffixed(&format!(" {carrier}")),
                Bus {
                    carrier: CarrierID::new(&carrier),
                    location: node.to_string(),
                    country: None,
                },
            )?;
            network.add_store(
                StoreID::new(&format!("{node} {carrier}")),
                Store {
                    bus: node.suffixed(&format!(" {carrier}")),
                    carrier: CarrierID::new(&carrier),
                    e_nom_extendable: true,
                    e_cyclic: true,
                    ..Store::default()
                },
            )?;
            network.add_generator(
                GeneratorID::new(&format!("{node} {carrier}")),
                Generator {
                    bus: node.suffixed(&format!(" {carrier}")),
                    carrier: CarrierID::new(&carrier),
                    p_nom_extendable: true,
                    p_nom_max: potential / 8760.0,
                    marginal_cost: costs.at("digestible biomass", "fuel")?,
                    ..Generator::default()
                },
            )?;
            network.add_link(
                LinkID::new(&format!("{node} {carrier}")),
                Link {
                    bus0: node.suffixed(&format!(" {carrier}")),
                    bus1: node.suffixed(" digestible biomass"),
                    bus2: Some(BusID::new("co2 atmosphere")),
                    carrier: CarrierID::new("digestible biomass"),
                    efficiency: 1.0.into(),
                    // Adding the CO2 in the biogas mix
                    efficiency2: -gas_intensity
                        - costs.at("Anaerobic digestion", "CO2 stored")?,
                    p_nom_extendable: true,
                    ..Link::default()
                },
            )?;
        }
    }

    network.ensure_carrier("digestible biomass to gas");
    network.ensure_carrier("digestible biomass to hydrogen");
    let digestion_stored = costs.at("Anaerobic digestion", "CO2 stored")?;
    let digestion_rate = costs.at("Anaerobic digestion", "capture rate")?;
    for node in &nodes {
        // With pure CO2 from upgrading, capture is equivalent with and
        // without CC, so only the CC variant is built
        network.add_link(
            LinkID::new(&format!("{node} digestible biomass CC")),
            Link {
                bus0: node.suffixed(" digestible biomass"),
                bus1: BusID::new("EU gas"),
                bus2: Some(BusID::new("co2 stored")),
                bus3: Some(BusID::new("co2 atmosphere")),
                carrier: CarrierID::new("digestible biomass to gas"),
                capital_cost: costs.at("Anaerobic digestion", "fixed")?
                    + costs.at("biogas upgrading", "fixed")?,
                marginal_cost: costs.at("biogas upgrading", "VOM")?,
                efficiency: 1.0.into(),
                efficiency2: digestion_stored * digestion_rate,
                efficiency3: digestion_stored * (1.0 - digestion_rate),
                p_nom_extendable: true,
                ..Link::default()
            },
        )?;
        network.add_link(
            LinkID::new(&format!("{node} digestible biomass to hydrogen CC")),
            Link {
                bus0: node.suffixed(" digestible biomass"),
                bus1: node.suffixed(" H2"),
                bus2: Some(BusID::new("co2 stored")),
                bus3: Some(BusID::new("co2 atmosphere")),
                carrier: CarrierID::new("digestible biomass to hydrogen"),
                capital_cost: costs.at("BtL", "fixed")?
                    + costs.at("biogas upgrading", "fixed")?,
                marginal_cost: costs.at("biogas upgrading", "VOM")?,
                efficiency: 0.45.into(),
                efficiency2: (gas_intensity + digestion_stored) * digestion_rate,
                efficiency3: (gas_intensity + digestion_stored) * (1.0 - digestion_rate),
                p_nom_extendable: true,
                ..Link::default()
            },
        )?;
    }

    for name in SOLID_BIOMASS_TYPES {
        let carrier = format!("{name} solid biomass");
        network.add_carrier(CarrierID::new(&carrier), Default::default())?;
        for node in &nodes {
            let potential = potentials.nodal(&ctx.layout, node, name)?;
            network.add_bus(
                node.suffixed(&format!(" {carrier}")),
                Bus {
                    carrier: CarrierID::new(&carrier),
                    location: node.to_string(),
                    country: None,
                },
            )?;
            network.add_store(
                StoreID::new(&format!("{node} {carrier}")),
                Store {
                    bus: node.suffixed(&format!(" {carrier}")),
                    carrier: CarrierID::new(&carrier),
                    e_nom_extendable: true,
                    e_cyclic: true,
                    ..Store::default()
                },
            )?;
            network.add_generator(
                GeneratorID::new(&format!("{node} {carrier}")),
                Generator {
                    bus: node.suffixed(&format!(" {carrier}")),
                    carrier: CarrierID::new(&carrier),
                    p_nom_extendable: true,
                    p_nom_max: potential / 8760.0,
                    marginal_cost: costs.at("solid biomass", "fuel")?,
                    ..Generator::default()
                },
            )?;
            network.add_link(
                LinkID::new(&format!("{node} {carrier}")),
                Link {
                    bus0: node.suffixed(&format!(" {carrier}")),
                    bus1: node.suffixed(" solid biomass"),
                    bus2: Some(BusID::new("co2 atmosphere")),
                    carrier: CarrierID::new("solid biomass"),
                    efficiency: 1.0.into(),
                    efficiency2: -solid_intensity,
                    p_nom_extendable: true,
                    ..Link::default()
                },
            )?;
        }
    }

    if ctx.options.has_biomass_import() {
        add_biomass_import(network, ctx)?;
    }

    ensure_eu_oil_bus(network)?;
    network.ensure_carrier("BioSNG");
    network.ensure_carrier("solid biomass to hydrogen");
    network.ensure_carrier("biomass to liquid");
    network.ensure_carrier("solid biomass to electricity");
    network.ensure_carrier("solid biomass to electricity CC");
    let biosng_stored = costs.at("BioSNG", "CO2 stored")?;
    let biosng_rate = costs.at("BioSNG", "capture rate")?;
    let btl_stored = costs.at("BtL", "CO2 stored")?;
    let btl_rate = costs.at("BtL", "capture rate")?;
    let chp_efficiency = costs.at("central solid biomass CHP", "efficiency")?;
    for node in &nodes {
        network.add_link(
            LinkID::new(&format!("{node} solid biomass to gas")),
            Link {
                bus0: node.suffixed(" solid biomass"),
                bus1: BusID::new("EU gas"),
                bus3: Some(BusID::new("co2 atmosphere")),
                carrier: CarrierID::new("BioSNG"),
                lifetime: costs.at("BioSNG", "lifetime")?,
                efficiency: costs.at("BioSNG", "efficiency")?.into(),
                efficiency3: biosng_stored,
                p_nom_extendable: true,
                capital_cost: costs.at("BioSNG", "fixed")?,
                ..Link::default()
            },
        )?;
        network.add_link(
            LinkID::new(&format!("{node} solid biomass to gas CC")),
            Link {
                bus0: node.suffixed(" solid biomass"),
                bus1: BusID::new("EU gas"),
                bus2: Some(BusID::new("co2 stored")),
                bus3: Some(BusID::new("co2 atmosphere")),
                carrier: CarrierID::new("BioSNG"),
                lifetime: costs.at("BioSNG", "lifetime")?,
                efficiency: costs.at("BioSNG", "efficiency")?.into(),
                efficiency2: biosng_stored * biosng_rate,
                efficiency3: biosng_stored * (1.0 - biosng_rate),
                p_nom_extendable: true,
                capital_cost: costs.at("BioSNG", "fixed")?
                    + costs.at("biomass CHP capture", "fixed")? * biosng_stored,
                ..Link::default()
            },
        )?;
        network.add_link(
            LinkID::new(&format!("{node} solid biomass to hydrogen")),
            Link {
                bus0: node.suffixed(" solid biomass"),
                bus1: node.suffixed(" H2"),
                bus2: Some(BusID::new("co2 stored")),
                bus3: Some(BusID::new("co2 atmosphere")),
                carrier: CarrierID::new("solid biomass to hydrogen"),
                efficiency: 0.5.into(),
                efficiency2: solid_intensity * btl_rate,
                efficiency3: solid_intensity * (1.0 - btl_rate),
                p_nom_extendable: true,
                // CO2 separation included
                capital_cost: costs.at("BtL", "fixed")?,
                ..Link::default()
            },
        )?;
        network.add_link(
            LinkID::new(&format!("{node} biomass to liquid")),
            Link {
                bus0: node.suffixed(" solid biomass"),
                bus1: BusID::new("EU oil"),
                bus3: Some(BusID::new("co2 atmosphere")),
                carrier: CarrierID::new("biomass to liquid"),
                lifetime: costs.at("BtL", "lifetime")?,
                efficiency: costs.at("BtL", "efficiency")?.into(),
                efficiency3: btl_stored,
                p_nom_extendable: true,
                capital_cost: costs.at("BtL", "fixed")?,
                ..Link::default()
            },
        )?;
        network.add_link(
            LinkID::new(&format!("{node} biomass to liquid CC")),
            Link {
                bus0: node.suffixed(" solid biomass"),
                bus1: BusID::new("EU oil"),
                bus2: Some(BusID::new("co2 stored")),
                bus3: Some(BusID::new("co2 atmosphere")),
                carrier: CarrierID::new("biomass to liquid"),
                lifetime: costs.at("BtL", "lifetime")?,
                efficiency: costs.at("BtL", "efficiency")?.into(),
                efficiency2: btl_stored * btl_rate,
                efficiency3: btl_stored * (1.0 - btl_rate),
                p_nom_extendable: true,
                capital_cost: costs.at("BtL", "fixed")?
                    + costs.at("biomass CHP capture", "fixed")? * btl_stored,
                ..Link::default()
            },
        )?;
        network.add_link(
            LinkID::new(&format!("{node} solid biomass to electricity")),
            Link {
                bus0: node.suffixed(" solid biomass"),
                bus1: node.clone(),
                bus3: Some(BusID::new("co2 atmosphere")),
                carrier: CarrierID::new("solid biomass to electricity"),
                p_nom_extendable: true,
                capital_cost: 0.7
                    * costs.at("central solid biomass CHP", "fixed")?
                    * chp_efficiency,
                marginal_cost: costs.at("central solid biomass CHP", "VOM")?,
                efficiency: 0.4.into(),
                efficiency3: solid_intensity,
                lifetime: costs.at("central solid biomass CHP", "lifetime")?,
                ..Link::default()
            },
        )?;
        network.add_link(
            LinkID::new(&format!("{node} solid biomass to electricity CC")),
            Link {
                bus0: node.suffixed(" solid biomass"),
                bus1: node.clone(),
                bus3: Some(BusID::new("co2 atmosphere")),
                bus4: Some(BusID::new("co2 stored")),
                carrier: CarrierID::new("solid biomass to electricity CC"),
                p_nom_extendable: true,
                capital_cost: 0.7
                    * costs.at("central solid biomass CHP", "fixed")?
                    * chp_efficiency
                    + costs.at("biomass CHP capture", "fixed")? * solid_intensity,
                marginal_cost: costs.at("central solid biomass CHP", "VOM")?,
                efficiency: chp_efficiency.into(),
                efficiency3: solid_intensity * (1.0 - ctx.sector().cc_fraction),
                efficiency4: solid_intensity * ctx.sector().cc_fraction,
                lifetime: costs.at("central solid biomass CHP", "lifetime")?,
                ..Link::default()
            },
        )?;
    }

    // Solid biomass CHP at nodes with district heating
    let urban_central = network.buses_with_carrier("urban central heat");
    if !urban_central.is_empty() && ctx.sector().chp {
        network.ensure_carrier("urban central solid biomass CHP");
        network.ensure_carrier("urban central solid biomass CHP CC");
        for heat_bus in urban_central {
            let node = BusID::new(
                heat_bus
                    .as_str()
                    .strip_suffix(" urban central heat")
                    .unwrap_or(heat_bus.as_str()),
            );
            network.add_link(
                LinkID::new(&format!("{node} urban central solid biomass CHP")),
                Link {
                    bus0: node.suffixed(" solid biomass"),
                    bus1: node.clone(),
                    bus2: Some(node.suffixed(" urban central heat")),
                    bus3: Some(BusID::new("co2 atmosphere")),
                    carrier: CarrierID::new("urban central solid biomass CHP"),
                    p_nom_extendable: true,
                    capital_cost: costs.at("central solid biomass CHP", "fixed")?
                        * chp_efficiency,
                    marginal_cost: costs.at("central solid biomass CHP", "VOM")?,
                    efficiency: chp_efficiency.into(),
                    efficiency2: costs.at("central solid biomass CHP", "efficiency-heat")?,
                    efficiency3: solid_intensity,
                    lifetime: costs.at("central solid biomass CHP", "lifetime")?,
                    ..Link::default()
                },
            )?;
            network.add_link(
                LinkID::new(&format!("{node} urban central solid biomass CHP CC")),
                Link {
                    bus0: node.suffixed(" solid biomass"),
                    bus1: node.clone(),
                    bus2: Some(node.suffixed(" urban central heat")),
                    bus3: Some(BusID::new("co2 atmosphere")),
                    bus4: Some(BusID::new("co2 stored")),
                    carrier: CarrierID::new("urban central solid biomass CHP CC"),
                    p_nom_extendable: true,
                    capital_cost: costs.at("central solid biomass CHP", "fixed")?
                        * chp_efficiency
                        + costs.at("biomass CHP capture", "fixed")? * solid_intensity,
                    marginal_cost: costs.at("central solid biomass CHP", "VOM")?,
                    efficiency: chp_efficiency.into(),
                    efficiency2: costs.at("central solid biomass CHP", "efficiency-heat")?
                        + solid_intensity
                            * costs.at("biomass CHP capture", "compression-heat-output")?,
                    efficiency3: solid_intensity * (1.0 - ctx.sector().cc_fraction),
                    efficiency4: solid_intensity * ctx.sector().cc_fraction,
                    lifetime: costs.at("central solid biomass CHP", "lifetime")?,
                    ..Link::default()
                },
            )?;
        }
    }

    Ok(())
}

/// Add tiered solid biomass import at continental level.
///
/// The first tier tops EU supply up to a low threshold at the base price;
/// each further tier adds a fixed step of potential at a rising price.
fn add_biomass_import(network: &mut Network, ctx: &PrepareContext) -> Result<()> {
    info!("Adding biomass import");
    let costs = &ctx.costs;
    let potentials = ctx.tables.biomass_potentials()?;
    let solid_intensity = costs.at("solid biomass", "CO2 intensity")?;

    let mut total_eu_biomass = 0.0;
    for node in ctx.nodes() {
        for name in DIGESTIBLE_BIOMASS_TYPES.iter().chain(&SOLID_BIOMASS_TYPES) {
            total_eu_biomass += potentials.nodal(&ctx.layout, &node, name)?;
        }
    }
    info!("Total EU biomass: {} EJ", total_eu_biomass * 3.6 / 1e9);

    network.ensure_carrier("solid biomass import");
    let mut superfluous = (IMPORT_LOW_LEVEL - total_eu_biomass).min(0.0);
    for tier in 1..=3u32 {
        let (potential, cost) = if tier == 1 {
            // Subtract EU biomass from the threshold; if EU supply already
            // exceeds it, the overhang reduces the following tiers
            (
                (IMPORT_LOW_LEVEL - total_eu_biomass).max(0.0),
                15.0 * 3.6,
            )
        } else {
            let potential = (IMPORT_STEP + superfluous).max(0.0);
            superfluous += (-superfluous).min(IMPORT_STEP);
            (potential, (15.0 + 10.0 * 0.25 * f64::from(tier - 1)) * 3.6)
        };

        let import_bus = BusID::new(&format!("import{tier} solid biomass"));
        network.add_bus(
            import_bus.clone(),
            Bus {
                carrier: CarrierID::new("solid biomass import"),
                location: "EU".to_string(),
                country: None,
            },
        )?;
        network.add_store(
            StoreID::new(import_bus.as_str()),
            Store {
                bus: import_bus.clone(),
                carrier: CarrierID::new("solid biomass import"),
                e_nom_extendable: true,
                e_cyclic: true,
                ..Store::default()
            },
        )?;
        network.add_generator(
            GeneratorID::new(import_bus.as_str()),
            Generator {
                bus: import_bus.clone(),
                carrier: CarrierID::new("solid biomass import"),
                p_nom_extendable: true,
                p_nom_max: potential / 8760.0,
                marginal_cost: cost,
                ..Generator::default()
            },
        )?;

        for node in ctx.nodes() {
            network.add_link(
                LinkID::new(&format!("{node} import{tier} solid biomass")),
                Link {
                    bus0: import_bus.clone(),
                    bus1: node.suffixed(" solid biomass"),
                    bus2: Some(BusID::new("co2 atmosphere")),
                    carrier: CarrierID::new("solid biomass"),
                    efficiency: 1.0.into(),
                    efficiency2: -solid_intensity,
                    p_nom_extendable: true,
                    ..Link::default()
                },
            )?;
        }
    }

    Ok(())
}

/// Add bidirectional solid biomass transport along the grid corridors.
///
/// Transport is priced per tonne-km with the mean of the two end countries'
/// cost rates; a token capital cost keeps unused corridors out of the
/// solution.
pub fn add_biomass_transport(network: &mut Network, ctx: &PrepareContext) -> Result<()> {
    info!("Adding biomass transport");
    let transport_costs = ctx.tables.biomass_transport_costs()?;

    network.ensure_carrier("solid biomass transport");
    for corridor in interconnector_topology(network) {
        let rate0 = transport_costs.at(corridor.bus0.country(), "cost")?;
        let rate1 = transport_costs.at(corridor.bus1.country(), "cost")?;
        let marginal_cost = (rate0 + rate1) / 2.0 * 0.01 * corridor.length;

        for (bus0, bus1) in [
            (&corridor.bus0, &corridor.bus1),
            (&corridor.bus1, &corridor.bus0),
        ] {
            network.add_link(
                LinkID::new(&format!("Biomass transport {bus0} -> {bus1}")),
                Link {
                    bus0: bus0.suffixed(" solid biomass"),
                    bus1: bus1.suffixed(" solid biomass"),
                    p_nom_extendable: true,
                    length: corridor.length,
                    marginal_cost,
                    capital_cost: 1.0,
                    carrier: CarrierID::new("solid biomass transport"),
                    ..Link::default()
                },
            )?;
        }
    }

    Ok(())
}
