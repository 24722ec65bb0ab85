//! CO2 tracking, direct air capture and the global CO2 limit.
use super::PrepareContext;
use crate::emissions::co2_emissions;
use crate::id::{BusID, CarrierID, LinkID, StoreID};
use crate::network::{Bus, Carrier, GlobalConstraint, Link, Network, Sense, Store};
use anyhow::Result;
use log::info;

/// Add the virtual buses and stores that track CO2 mass.
///
/// Every combustion or conversion link routes its carbon through exactly one
/// of these buses: `co2 atmosphere` accumulates emissions (and may go
/// negative when carbon is drawn down), `co2 stored` accumulates captured
/// carbon up to the scenario's sequestration potential.
pub fn add_co2_tracking(network: &mut Network, ctx: &PrepareContext) -> Result<()> {
    // Minus sign because opposite to how fossil fuels are used: burning CH4
    // puts CH4 down, atmosphere up
    network.add_carrier(CarrierID::new("co2"), Carrier { co2_emissions: -1.0 })?;

    network.add_bus(
        BusID::new("co2 atmosphere"),
        Bus {
            carrier: CarrierID::new("co2"),
            location: "EU".to_string(),
            country: None,
        },
    )?;
    // NB: can also be negative
    network.add_store(
        StoreID::new("co2 atmosphere"),
        Store {
            bus: BusID::new("co2 atmosphere"),
            carrier: CarrierID::new("co2"),
            e_nom_extendable: true,
            e_min_pu: (-1.0).into(),
            ..Store::default()
        },
    )?;

    network.ensure_carrier("co2 stored");
    network.add_bus(
        BusID::new("co2 stored"),
        Bus {
            carrier: CarrierID::new("co2 stored"),
            location: "EU".to_string(),
            country: None,
        },
    )?;

    let sequestration_potential = ctx.options.sequestration_potential().unwrap_or(0.0);
    info!("CO2 sequestration potential: {sequestration_potential} MtCO2");
    network.add_store(
        StoreID::new("co2 stored"),
        Store {
            bus: BusID::new("co2 stored"),
            carrier: CarrierID::new("co2 stored"),
            e_nom_extendable: true,
            // 1e6 converts MtCO2 to tCO2
            e_nom_max: sequestration_potential * 1e6,
            capital_cost: ctx.sector().co2_sequestration_cost,
            ..Store::default()
        },
    )?;

    if ctx.sector().co2_vent {
        network.ensure_carrier("co2 vent");
        network.add_link(
            LinkID::new("co2 vent"),
            Link {
                bus0: BusID::new("co2 stored"),
                bus1: BusID::new("co2 atmosphere"),
                carrier: CarrierID::new("co2 vent"),
                p_nom_extendable: true,
                ..Link::default()
            },
        )?;
    }

    Ok(())
}

/// Add direct air capture at locations with district or decentral service heat.
///
/// DAC draws electricity (port 2) and heat (port 3) to move carbon from the
/// atmosphere into storage.
pub fn add_dac(network: &mut Network, ctx: &PrepareContext) -> Result<()> {
    let costs = &ctx.costs;
    let electricity_input = costs.at("direct air capture", "electricity-input")?
        + costs.at("direct air capture", "compression-electricity-input")?;
    let heat_input = costs.at("direct air capture", "heat-input")?
        - costs.at("direct air capture", "compression-heat-output")?;

    let heat_buses: Vec<BusID> = ["urban central heat", "services urban decentral heat"]
        .iter()
        .flat_map(|carrier| network.buses_with_carrier(carrier))
        .collect();

    network.ensure_carrier("DAC");
    for heat_bus in heat_buses {
        let location = BusID::from(network.bus(heat_bus.as_str())?.location.clone());
        network.add_link(
            LinkID::new(&format!("{location} DAC")),
            Link {
                bus0: BusID::new("co2 atmosphere"),
                bus1: BusID::new("co2 stored"),
                bus2: Some(location.clone()),
                bus3: Some(heat_bus),
                carrier: CarrierID::new("DAC"),
                capital_cost: costs.at("direct air capture", "fixed")?,
                efficiency: 1.0.into(),
                efficiency2: -electricity_input,
                efficiency3: -heat_input,
                p_nom_extendable: true,
                lifetime: costs.at("direct air capture", "lifetime")?,
                ..Link::default()
            },
        )?;
    }

    Ok(())
}

/// Add the global CO2 cap as a fraction of historical base-year emissions.
///
/// The historical total covers the same country and sector scope as the
/// scenario; `limit` arrives already resolved from the configured budget, a
/// carbon budget trajectory or an explicit `Co2L` token.
pub fn add_co2limit(network: &mut Network, ctx: &PrepareContext, limit: f64) -> Result<()> {
    info!("Adding CO2 budget limit of {limit} per unit of base-year levels");

    let countries = ctx.layout.countries();
    // 1e6 converts MtCO2 to tCO2
    let co2_limit =
        co2_emissions(&ctx.tables.co2_totals, &countries, &ctx.options)? * 1e6 * limit * ctx.nyears;

    network.add_global_constraint(
        "CO2Limit",
        GlobalConstraint {
            carrier_attribute: "co2_emissions".to_string(),
            sense: Sense::LessEqual,
            constant: co2_limit,
        },
    )
}
