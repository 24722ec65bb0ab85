//! Industry coupling: process steam, feedstocks, shipping, aviation and
//! process emissions.
use super::{PrepareContext, ensure_eu_oil_bus};
use crate::id::{BusID, CarrierID, GeneratorID, LinkID, LoadID, StoreID};
use crate::network::{Bus, Generator, Link, Load, Network, Store, TimeVarying};
use crate::sector::heat::{HeatSystem, heat_system_nodes};
use anyhow::Result;
use log::info;

/// Add industrial demand and its supply chains.
pub fn add_industry(network: &mut Network, ctx: &PrepareContext) -> Result<()> {
    info!("Adding industrial demand");
    let costs = &ctx.costs;
    let nodes = ctx.nodes();
    let demand = ctx.tables.industrial_demand()?;
    let gas_intensity = costs.at("gas", "CO2 intensity")?;
    let oil_intensity = costs.at("oil", "CO2 intensity")?;

    // Low-temperature process steam, servable from biomass, methane or H2
    network.ensure_carrier("lowT process steam");
    for node in &nodes {
        network.add_bus(
            node.suffixed(" lowT process steam"),
            Bus {
                carrier: CarrierID::new("lowT process steam"),
                location: node.to_string(),
                country: None,
            },
        )?;
        network.add_load(
            LoadID::new(&format!("{node} lowT process steam")),
            Load {
                bus: node.suffixed(" lowT process steam"),
                carrier: CarrierID::new("lowT process steam"),
                p_set: (demand.at(node.as_str(), "solid biomass")? / 8760.0).into(),
            },
        )?;
    }

    if ctx.options.has_biomass() {
        let solid_intensity = costs.at("solid biomass", "CO2 intensity")?;
        let capture_rate = costs.at("cement capture", "capture_rate")?;
        network.ensure_carrier("lowT process steam solid biomass");
        network.ensure_carrier("lowT process steam solid biomass CC");
        for node in &nodes {
            network.add_link(
                LinkID::new(&format!("{node} solid biomass for lowT industry")),
                Link {
                    bus0: node.suffixed(" solid biomass"),
                    bus1: node.suffixed(" lowT process steam"),
                    bus2: Some(BusID::new("co2 atmosphere")),
                    carrier: CarrierID::new("lowT process steam solid biomass"),
                    p_nom_extendable: true,
                    efficiency: costs.at("solid biomass to steam", "efficiency")?.into(),
                    efficiency2: solid_intensity,
                    capital_cost: costs.at("solid biomass to steam", "fixed")?,
                    ..Link::default()
                },
            )?;
            network.add_link(
                LinkID::new(&format!("{node} solid biomass for lowT industry CC")),
                Link {
                    bus0: node.suffixed(" solid biomass"),
                    bus1: node.suffixed(" lowT process steam"),
                    bus2: Some(BusID::new("co2 atmosphere")),
                    bus3: Some(BusID::new("co2 stored")),
                    carrier: CarrierID::new("lowT process steam solid biomass CC"),
                    p_nom_extendable: true,
                    efficiency: (0.9 * costs.at("solid biomass to steam", "efficiency")?).into(),
                    capital_cost: costs.at("solid biomass to steam", "fixed")?
                        + costs.at("cement capture", "fixed")? * solid_intensity,
                    efficiency2: solid_intensity * (1.0 - capture_rate),
                    efficiency3: solid_intensity * capture_rate,
                    lifetime: costs.at("cement capture", "lifetime")?,
                    ..Link::default()
                },
            )?;
        }
    }

    let capture_rate = costs.at("cement capture", "capture_rate")?;
    network.ensure_carrier("lowT process steam methane");
    network.ensure_carrier("lowT process steam methane CC");
    network.ensure_carrier("lowT process steam H2");
    for node in &nodes {
        network.add_link(
            LinkID::new(&format!("{node} methane for lowT industry")),
            Link {
                bus0: BusID::new("EU gas"),
                bus1: node.suffixed(" lowT process steam"),
                bus2: Some(BusID::new("co2 atmosphere")),
                carrier: CarrierID::new("lowT process steam methane"),
                p_nom_extendable: true,
                efficiency: costs.at("gas to steam", "efficiency")?.into(),
                capital_cost: costs.at("gas to steam", "fixed")?,
                efficiency2: gas_intensity,
                ..Link::default()
            },
        )?;
        network.add_link(
            LinkID::new(&format!("{node} methane for lowT industry CC")),
            Link {
                bus0: BusID::new("EU gas"),
                bus1: node.suffixed(" lowT process steam"),
                bus2: Some(BusID::new("co2 atmosphere")),
                bus3: Some(BusID::new("co2 stored")),
                carrier: CarrierID::new("lowT process steam methane CC"),
                p_nom_extendable: true,
                efficiency: (0.9 * costs.at("gas to steam", "efficiency")?).into(),
                capital_cost: costs.at("gas to steam", "fixed")?
                    + costs.at("cement capture", "fixed")? * gas_intensity,
                efficiency2: gas_intensity * (1.0 - capture_rate),
                efficiency3: gas_intensity * capture_rate,
                lifetime: costs.at("cement capture", "lifetime")?,
                ..Link::default()
            },
        )?;
        network.add_link(
            LinkID::new(&format!("{node} H2 for lowT industry")),
            Link {
                bus0: node.suffixed(" H2"),
                bus1: node.suffixed(" lowT process steam"),
                carrier: CarrierID::new("lowT process steam H2"),
                p_nom_extendable: true,
                efficiency: costs.at("gas to steam", "efficiency")?.into(),
                capital_cost: costs.at("gas to steam", "fixed")?,
                ..Link::default()
            },
        )?;
    }

    // Methane demand that must stay methane, with optional capture
    network.ensure_carrier("gas for industry");
    network.ensure_carrier("gas for industry CC");
    network.add_bus(
        BusID::new("gas for industry"),
        Bus {
            carrier: CarrierID::new("gas for industry"),
            location: "EU".to_string(),
            country: None,
        },
    )?;
    let methane_total: f64 = nodes
        .iter()
        .map(|node| demand.at(node.as_str(), "methane"))
        .sum::<Result<f64>>()?;
    network.add_load(
        LoadID::new("gas for industry"),
        Load {
            bus: BusID::new("gas for industry"),
            carrier: CarrierID::new("gas for industry"),
            p_set: (methane_total / 8760.0).into(),
        },
    )?;
    network.add_link(
        LinkID::new("gas for industry"),
        Link {
            bus0: BusID::new("EU gas"),
            bus1: BusID::new("gas for industry"),
            bus2: Some(BusID::new("co2 atmosphere")),
            carrier: CarrierID::new("gas for industry"),
            p_nom_extendable: true,
            efficiency: 1.0.into(),
            efficiency2: gas_intensity,
            ..Link::default()
        },
    )?;
    network.add_link(
        LinkID::new("gas for industry CC"),
        Link {
            bus0: BusID::new("EU gas"),
            bus1: BusID::new("gas for industry"),
            bus2: Some(BusID::new("co2 atmosphere")),
            bus3: Some(BusID::new("co2 stored")),
            carrier: CarrierID::new("gas for industry CC"),
            p_nom_extendable: true,
            capital_cost: costs.at("cement capture", "fixed")? * gas_intensity,
            efficiency: 0.9.into(),
            efficiency2: gas_intensity * (1.0 - capture_rate),
            efficiency3: gas_intensity * capture_rate,
            lifetime: costs.at("cement capture", "lifetime")?,
            ..Link::default()
        },
    )?;

    network.ensure_carrier("H2 for industry");
    for node in &nodes {
        network.add_load(
            LoadID::new(&format!("{node} H2 for industry")),
            Load {
                bus: node.suffixed(" H2"),
                carrier: CarrierID::new("H2 for industry"),
                p_set: (demand.at(node.as_str(), "hydrogen")? / 8760.0).into(),
            },
        )?;
    }

    ensure_eu_oil_bus(network)?;

    // Shipping splits between oil and hydrogen
    let year = ctx.investment_year();
    let shipping_demand = ctx.sector().shipping_demand.resolve(year)?;
    let h2_share = ctx.sector().shipping_h2_share;
    let energy_totals = ctx.tables.energy_totals()?;
    let navigation = |node: &BusID| -> Result<f64> {
        Ok(energy_totals.nodal(&ctx.layout, node, "total international navigation")?
            + energy_totals.nodal(&ctx.layout, node, "total domestic navigation")?)
    };

    let mut navigation_total = 0.0;
    for node in &nodes {
        navigation_total += navigation(node)?;
    }
    network.ensure_carrier("oil for shipping");
    // 1e6 converts TWh to MWh
    let shipping_oil = (1.0 - h2_share) * shipping_demand * navigation_total * 1e6 / 8760.0;
    network.add_load(
        LoadID::new("oil for shipping"),
        Load {
            bus: BusID::new("EU oil"),
            carrier: CarrierID::new("oil for shipping"),
            p_set: shipping_oil.into(),
        },
    )?;

    network.ensure_carrier("H2 for shipping");
    for node in &nodes {
        let p_set = h2_share * shipping_demand * navigation(node)? * 1e6
            * ctx.sector().shipping_average_efficiency
            / costs.at("fuel cell", "efficiency")?
            / 8760.0;
        network.add_load(
            LoadID::new(&format!("{node} H2 for shipping")),
            Load {
                bus: node.suffixed(" H2"),
                carrier: CarrierID::new("H2 for shipping"),
                p_set: p_set.into(),
            },
        )?;
    }

    if !network.stores.contains_key("EU oil Store") {
        network.add_store(
            StoreID::new("EU oil Store"),
            Store {
                bus: BusID::new("EU oil"),
                carrier: CarrierID::new("oil"),
                e_nom_extendable: true,
                e_cyclic: true,
                ..Store::default()
            },
        )?;
    }
    if !network.generators.contains_key("EU oil") {
        network.add_generator(
            GeneratorID::new("EU oil"),
            Generator {
                bus: BusID::new("EU oil"),
                carrier: CarrierID::new("oil"),
                p_nom_extendable: true,
                marginal_cost: costs.at("oil", "fuel")?,
                ..Generator::default()
            },
        )?;
    }

    if ctx.sector().oil_boilers {
        add_oil_boilers(network, ctx)?;
    }

    network.ensure_carrier("electrofuel");
    let ft_efficiency = costs.at("Fischer-Tropsch", "efficiency")?;
    let ft_capture = costs.at("Fischer-Tropsch", "capture rate")?;
    for node in &nodes {
        network.add_link(
            LinkID::new(&format!("{node} Fischer-Tropsch")),
            Link {
                bus0: node.suffixed(" H2"),
                bus1: BusID::new("EU oil"),
                bus2: Some(BusID::new("co2 stored")),
                bus3: Some(BusID::new("co2 atmosphere")),
                carrier: CarrierID::new("electrofuel"),
                efficiency: ft_efficiency.into(),
                capital_cost: costs.at("Fischer-Tropsch", "fixed")?,
                // The fuel's carbon plus the slip is drawn from storage; the
                // slip returns to the atmosphere
                efficiency2: -(1.0 + (1.0 - ft_capture)) * oil_intensity * ft_efficiency,
                efficiency3: (1.0 - ft_capture) * oil_intensity * ft_efficiency,
                p_nom_extendable: true,
                lifetime: costs.at("Fischer-Tropsch", "lifetime")?,
                ..Link::default()
            },
        )?;
    }

    let naphtha_total: f64 = nodes
        .iter()
        .map(|node| demand.at(node.as_str(), "naphtha"))
        .sum::<Result<f64>>()?;
    network.ensure_carrier("naphtha for industry");
    network.add_load(
        LoadID::new("naphtha for industry"),
        Load {
            bus: BusID::new("EU oil"),
            carrier: CarrierID::new("naphtha for industry"),
            p_set: (naphtha_total / 8760.0).into(),
        },
    )?;

    let mut aviation_total = 0.0;
    for node in &nodes {
        aviation_total += energy_totals.nodal(&ctx.layout, node, "total international aviation")?
            + energy_totals.nodal(&ctx.layout, node, "total domestic aviation")?;
    }
    let kerosene = ctx.sector().aviation_demand.resolve(year)? * aviation_total * 1e6 / 8760.0;
    network.ensure_carrier("kerosene for aviation");
    network.add_load(
        LoadID::new("kerosene for aviation"),
        Load {
            bus: BusID::new("EU oil"),
            carrier: CarrierID::new("kerosene for aviation"),
            p_set: kerosene.into(),
        },
    )?;

    // NB: CO2 is released again when plastics decay or kerosene is burned,
    // except for feedstock process emissions captured with the other
    // industry process emissions
    let feedstock_emissions: f64 = nodes
        .iter()
        .map(|node| demand.at(node.as_str(), "process emission from feedstock"))
        .sum::<Result<f64>>()?;
    let oil_emissions = (shipping_oil + naphtha_total / 8760.0 + kerosene) * oil_intensity
        - feedstock_emissions / 8760.0;
    network.ensure_carrier("oil emissions");
    network.add_load(
        LoadID::new("oil emissions"),
        Load {
            bus: BusID::new("co2 atmosphere"),
            carrier: CarrierID::new("oil emissions"),
            p_set: (-oil_emissions).into(),
        },
    )?;

    // Low-temperature heat from district heating where it exists
    network.ensure_carrier("low-temperature heat for industry");
    for node in &nodes {
        let central_bus = node.suffixed(" urban central heat");
        let bus = if network.has_bus(central_bus.as_str()) {
            central_bus
        } else {
            node.suffixed(" services urban decentral heat")
        };
        network.add_load(
            LoadID::new(&format!("{node} low-temperature heat for industry")),
            Load {
                bus,
                carrier: CarrierID::new("low-temperature heat for industry"),
                p_set: (demand.at(node.as_str(), "low-temperature heat")? / 8760.0).into(),
            },
        )?;
    }

    scale_down_industrial_electricity(network, ctx)?;

    network.ensure_carrier("industry electricity");
    for node in &nodes {
        network.add_load(
            LoadID::new(&format!("{node} industry electricity")),
            Load {
                bus: node.clone(),
                carrier: CarrierID::new("industry electricity"),
                p_set: (demand.at(node.as_str(), "electricity")? / 8760.0).into(),
            },
        )?;
    }

    // Process emissions get their own bus so capture competes with venting
    network.ensure_carrier("process emissions");
    network.ensure_carrier("process emissions CC");
    network.add_bus(
        BusID::new("process emissions"),
        Bus {
            carrier: CarrierID::new("process emissions"),
            location: "EU".to_string(),
            country: None,
        },
    )?;
    let process_emissions: f64 = nodes
        .iter()
        .map(|node| {
            Ok(demand.at(node.as_str(), "process emission")?
                + demand.at(node.as_str(), "process emission from feedstock")?)
        })
        .sum::<Result<f64>>()?;
    network.add_load(
        LoadID::new("process emissions"),
        Load {
            bus: BusID::new("process emissions"),
            carrier: CarrierID::new("process emissions"),
            p_set: (-process_emissions / 8760.0).into(),
        },
    )?;
    network.add_link(
        LinkID::new("process emissions"),
        Link {
            bus0: BusID::new("process emissions"),
            bus1: BusID::new("co2 atmosphere"),
            carrier: CarrierID::new("process emissions"),
            p_nom_extendable: true,
            efficiency: 1.0.into(),
            ..Link::default()
        },
    )?;
    // Assume enough local waste heat for the capture process
    network.add_link(
        LinkID::new("process emissions CC"),
        Link {
            bus0: BusID::new("process emissions"),
            bus1: BusID::new("co2 atmosphere"),
            bus2: Some(BusID::new("co2 stored")),
            carrier: CarrierID::new("process emissions CC"),
            p_nom_extendable: true,
            capital_cost: costs.at("cement capture", "fixed")?,
            efficiency: (1.0 - capture_rate).into(),
            efficiency2: capture_rate,
            lifetime: costs.at("cement capture", "lifetime")?,
            ..Link::default()
        },
    )?;

    Ok(())
}

/// Add decentral oil boilers to the individual-heating systems.
fn add_oil_boilers(network: &mut Network, ctx: &PrepareContext) -> Result<()> {
    let costs = &ctx.costs;
    let system_nodes = heat_system_nodes(ctx);
    let oil_intensity = costs.at("oil", "CO2 intensity")?;

    for system in [
        HeatSystem::ResidentialRural,
        HeatSystem::ServicesRural,
        HeatSystem::ResidentialUrbanDecentral,
        HeatSystem::ServicesUrbanDecentral,
    ] {
        network.ensure_carrier(&format!("{system} oil boiler"));
        for node in &system_nodes[&system] {
            network.add_link(
                LinkID::new(&format!("{node} {system} oil boiler")),
                Link {
                    p_nom_extendable: true,
                    bus0: BusID::new("EU oil"),
                    bus1: node.suffixed(&format!(" {system} heat")),
                    bus2: Some(BusID::new("co2 atmosphere")),
                    carrier: CarrierID::new(&format!("{system} oil boiler")),
                    efficiency: costs.at("decentral oil boiler", "efficiency")?.into(),
                    efficiency2: oil_intensity,
                    capital_cost: costs.at("decentral oil boiler", "efficiency")?
                        * costs.at("decentral oil boiler", "fixed")?,
                    lifetime: costs.at("decentral oil boiler", "lifetime")?,
                    ..Link::default()
                },
            )?;
        }
    }

    Ok(())
}

/// Remove today's industrial electricity demand by scaling down the base
/// electricity loads country by country.
fn scale_down_industrial_electricity(network: &mut Network, ctx: &PrepareContext) -> Result<()> {
    let demand = ctx.tables.industrial_demand()?;

    for country in ctx.layout.countries() {
        let load_ids: Vec<_> = network
            .loads
            .iter()
            .filter(|(id, load)| {
                id.country() == country && load.carrier.as_str() == "electricity"
            })
            .map(|(id, _)| id.clone())
            .collect();
        if load_ids.is_empty() {
            continue;
        }

        let mut current_industrial = 0.0;
        let mut total = 0.0;
        for id in &load_ids {
            current_industrial += demand.at(id.as_str(), "current electricity")?;
            let load = network.load(id.as_str())?;
            total += match &load.p_set {
                TimeVarying::Static(v) => v * network.snapshots.len() as f64,
                TimeVarying::Series(values) => values.iter().sum(),
            };
        }
        if total == 0.0 {
            continue;
        }

        let factor = 1.0 - current_industrial / total;
        for id in &load_ids {
            network.load_mut(id.as_str())?.p_set.map_series(|v| *v *= factor);
        }
    }

    Ok(())
}

/// Route industrial waste heat into district heating.
///
/// Runs only when both the industry and heat stages have run: spare link
/// ports of Fischer-Tropsch, biofuel and fuel cell plants at district heating
/// nodes are rewired to the local heat bus.
pub fn add_waste_heat(network: &mut Network, ctx: &PrepareContext) -> Result<()> {
    info!("Adding possibility to use industrial waste heat in district heating");

    let urban_central = network.buses_with_carrier("urban central heat");
    for heat_bus in urban_central {
        let node = BusID::new(
            heat_bus
                .as_str()
                .strip_suffix(" urban central heat")
                .unwrap_or(heat_bus.as_str()),
        );

        if ctx.sector().use_fischer_tropsch_waste_heat {
            let link = network.link_mut(&format!("{node} Fischer-Tropsch"))?;
            link.bus4 = Some(heat_bus.clone());
            link.efficiency4 = 0.95 - link.efficiency.static_value()?;
        }

        if ctx.options.has_biomass() && ctx.sector().use_biofuel_waste_heat {
            for tech in ["biomass to liquid", "solid biomass to gas"] {
                let link = network.link_mut(&format!("{node} {tech}"))?;
                link.bus4 = Some(heat_bus.clone());
                link.efficiency4 = 0.95 - link.efficiency.static_value()?;
            }
        }

        if ctx.sector().use_fuel_cell_waste_heat {
            let link = network.link_mut(&format!("{node} H2 Fuel Cell"))?;
            link.bus2 = Some(heat_bus.clone());
            link.efficiency2 = 0.95 - link.efficiency.static_value()?;
        }
    }

    Ok(())
}

/// Add gas distribution grid costs to decentral gas-burning technologies.
pub fn insert_gas_distribution_costs(network: &mut Network, ctx: &PrepareContext) -> Result<()> {
    let factor = ctx.sector().gas_distribution_grid_cost_factor;
    info!("Inserting gas distribution grid with investment cost factor of {factor}");
    let cost = ctx.costs.at("electricity distribution grid", "fixed")? * factor;

    for link in network.links.values_mut() {
        let carrier = link.carrier.as_str();
        let selected = (carrier.contains("gas boiler") && !carrier.contains("urban central"))
            || carrier.contains("micro gas")
            || carrier.contains("digestible biomass to gas")
            || carrier.contains("solid biomass to gas")
            || carrier.contains("methane for lowT industry");
        if selected {
            link.capital_cost += cost;
        }
    }

    Ok(())
}
