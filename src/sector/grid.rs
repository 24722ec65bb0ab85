//! Grid topology changes and final attribute scaling.
use super::PrepareContext;
use crate::id::{BusID, CarrierID, GeneratorID, LineID, LinkID, StoreID};
use crate::network::{Bus, Generator, Line, Link, Network, Store};
use crate::options::ScaleAttr;
use anyhow::Result;
use indexmap::IndexSet;
use log::{info, warn};

/// Maximum rooftop solar potential in MW per thousand people, assuming
/// 0.1 kW/m2 and 10 m2/person
const ROOFTOP_POTENTIAL_PER_POPULATION: f64 = 0.1 * 10.0;

/// Insert a low-voltage level below every node.
///
/// All electricity loads and the decentral technologies (EV charging,
/// vehicle-to-grid, heat pumps, resistive heaters, micro-CHP) are redirected
/// through a new distribution grid link; rooftop solar and home batteries
/// attach on the low-voltage side. The redirects happen before any component
/// is added, so no stage observes a partially rewired network.
pub fn insert_electricity_distribution_grid(
    network: &mut Network,
    ctx: &PrepareContext,
) -> Result<()> {
    let cost_factor = ctx.sector().electricity_distribution_grid_cost_factor;
    info!("Inserting electricity distribution grid with investment cost factor of {cost_factor}");
    let costs = &ctx.costs;
    let nodes = ctx.nodes();

    network.ensure_carrier("low voltage");
    network.ensure_carrier("electricity distribution grid");
    for node in &nodes {
        network.add_bus(
            node.suffixed(" low voltage"),
            Bus {
                carrier: CarrierID::new("low voltage"),
                location: node.to_string(),
                country: None,
            },
        )?;
        network.add_link(
            LinkID::new(&format!("{node} electricity distribution grid")),
            Link {
                bus0: node.clone(),
                bus1: node.suffixed(" low voltage"),
                p_nom_extendable: true,
                p_min_pu: (-1.0).into(),
                carrier: CarrierID::new("electricity distribution grid"),
                efficiency: 1.0.into(),
                lifetime: costs.at("electricity distribution grid", "lifetime")?,
                capital_cost: costs.at("electricity distribution grid", "fixed")? * cost_factor,
                ..Link::default()
            },
        )?;
    }

    // This catches the regular electricity load and "industry electricity"
    for load in network.loads.values_mut() {
        if load.carrier.as_str().contains("electricity") {
            load.bus = load.bus.suffixed(" low voltage");
        }
    }

    for link in network.links.values_mut() {
        match link.carrier.as_str() {
            "BEV charger" => link.bus0 = link.bus0.suffixed(" low voltage"),
            "V2G" => link.bus1 = link.bus1.suffixed(" low voltage"),
            carrier if carrier.contains("heat pump") || carrier.contains("resistive heater") => {
                link.bus0 = link.bus0.suffixed(" low voltage");
            }
            carrier if carrier.contains("micro gas") => {
                link.bus1 = link.bus1.suffixed(" low voltage");
            }
            _ => {}
        }
    }

    // Existing solar reverts to utility cost rather than the 50-50
    // rooftop-utility mix; rooftop potential is added separately below
    let solar_utility_cost = costs.at("solar-utility", "fixed")?;
    let rooftop: Vec<(GeneratorID, Generator)> = {
        let solar_ids: Vec<GeneratorID> = network
            .generators
            .iter()
            .filter(|(_, g)| g.carrier.as_str() == "solar")
            .map(|(id, _)| id.clone())
            .collect();

        let mut rooftop = Vec::new();
        for id in solar_ids {
            let generator = network.generator_mut(id.as_str())?;
            generator.capital_cost = solar_utility_cost;

            let node = BusID::from(generator.bus.to_string());
            // Population data is in thousands, yielding MW
            let potential =
                ROOFTOP_POTENTIAL_PER_POPULATION * ctx.layout.get(&node)?.total;
            rooftop.push((
                GeneratorID::new(&format!("{id} rooftop")),
                Generator {
                    bus: generator.bus.suffixed(" low voltage"),
                    carrier: CarrierID::new("solar rooftop"),
                    p_nom_extendable: true,
                    p_nom_max: potential,
                    marginal_cost: generator.marginal_cost,
                    capital_cost: costs.at("solar-rooftop", "fixed")?,
                    efficiency: generator.efficiency,
                    p_max_pu: generator.p_max_pu.clone(),
                    ..Generator::default()
                },
            ));
        }
        rooftop
    };
    network.ensure_carrier("solar rooftop");
    for (id, generator) in rooftop {
        network.add_generator(id, generator)?;
    }

    network.add_carrier(CarrierID::new("home battery"), Default::default())?;
    network.ensure_carrier("home battery charger");
    network.ensure_carrier("home battery discharger");
    let inverter_efficiency = costs.at("battery inverter", "efficiency")?.sqrt();
    for node in &nodes {
        network.add_bus(
            node.suffixed(" home battery"),
            Bus {
                carrier: CarrierID::new("home battery"),
                location: node.to_string(),
                country: None,
            },
        )?;
        network.add_store(
            StoreID::new(&format!("{node} home battery")),
            Store {
                bus: node.suffixed(" home battery"),
                carrier: CarrierID::new("home battery"),
                e_cyclic: true,
                e_nom_extendable: true,
                capital_cost: costs.at("battery storage", "fixed")?,
                lifetime: costs.at("battery storage", "lifetime")?,
                ..Store::default()
            },
        )?;
        network.add_link(
            LinkID::new(&format!("{node} home battery charger")),
            Link {
                bus0: node.suffixed(" low voltage"),
                bus1: node.suffixed(" home battery"),
                carrier: CarrierID::new("home battery charger"),
                efficiency: inverter_efficiency.into(),
                capital_cost: costs.at("battery inverter", "fixed")?,
                p_nom_extendable: true,
                lifetime: costs.at("battery inverter", "lifetime")?,
                ..Link::default()
            },
        )?;
        network.add_link(
            LinkID::new(&format!("{node} home battery discharger")),
            Link {
                bus0: node.suffixed(" home battery"),
                bus1: node.suffixed(" low voltage"),
                carrier: CarrierID::new("home battery discharger"),
                efficiency: inverter_efficiency.into(),
                marginal_cost: ctx.sector().marginal_cost_storage,
                p_nom_extendable: true,
                lifetime: costs.at("battery inverter", "lifetime")?,
                ..Link::default()
            },
        )?;
    }

    Ok(())
}

/// Add grid connection costs to onshore wind and utility solar.
pub fn add_electricity_grid_connection(network: &mut Network, ctx: &PrepareContext) -> Result<()> {
    let connection_cost = ctx.costs.at("electricity grid connection", "fixed")?;
    for generator in network.generators.values_mut() {
        if matches!(generator.carrier.as_str(), "onwind" | "solar") {
            generator.capital_cost += connection_cost;
        }
    }

    Ok(())
}

/// Replace AC lines by an HVDC transport model.
///
/// Every line becomes an extendable DC link with length-dependent losses; the
/// loss rule is also applied to the existing DC links.
pub fn hvdc_transport_model(network: &mut Network) -> Result<()> {
    info!("Changing AC lines to HVDC links");

    let lines: Vec<(LineID, Line)> = network.lines.drain(..).collect();
    network.ensure_carrier("DC");
    for (id, line) in lines {
        network.add_link(
            LinkID::new(id.as_str()),
            Link {
                bus0: line.bus0,
                bus1: line.bus1,
                p_nom_extendable: true,
                p_nom: line.s_nom,
                p_nom_min: line.s_nom,
                p_min_pu: (-1.0).into(),
                carrier: CarrierID::new("DC"),
                length: line.length,
                capital_cost: line.capital_cost,
                ..Link::default()
            },
        )?;
    }

    // Losses depend on length for all DC links, converted lines included
    for link in network.links.values_mut() {
        if link.carrier.as_str() == "DC" {
            link.efficiency = (1.0 - 0.03 * link.length / 1000.0).into();
        }
    }

    Ok(())
}

/// Cap line and DC link extension to a headroom above today's capacity.
pub fn apply_line_extension_limit(network: &mut Network, gigawatts: f64) {
    // 1e3 converts GW to MW
    let max_extension = gigawatts * 1e3;
    info!("Limiting new HVAC and HVDC extensions to {max_extension} MW");

    for line in network.lines.values_mut() {
        line.s_nom_max = line.s_nom + max_extension;
    }
    for link in network.links.values_mut() {
        if link.carrier.as_str() == "DC" {
            link.p_nom_max = link.p_nom + max_extension;
        }
    }
}

/// Scale an attribute of every component matching a technology prefix.
///
/// `<tech>+p<factor>` scales capacity bounds, `<tech>+c<factor>` capital
/// costs. The technology must prefix-match a present carrier family; `AC`
/// addresses the lines. Utility solar scaling deliberately skips rooftop
/// solar.
pub fn apply_tech_scaling(
    network: &mut Network,
    tech: &str,
    attr: ScaleAttr,
    factor: f64,
) -> Result<()> {
    let carrier_families: IndexSet<String> = network
        .generators
        .values()
        .map(|g| g.carrier.as_str())
        .chain(network.links.values().map(|l| l.carrier.as_str()))
        .chain(network.stores.values().map(|s| s.carrier.as_str()))
        .chain(network.storage_units.values().map(|s| s.carrier.as_str()))
        .map(|c| c.split('-').next().unwrap_or(c).to_string())
        .collect();
    if !carrier_families.iter().any(|family| tech.starts_with(family.as_str())) {
        warn!("Technology scaling token for {tech:?} matches no carrier; ignoring");
        return Ok(());
    }

    let attr_name = match attr {
        ScaleAttr::PNomMax => "p_nom_max",
        ScaleAttr::CapitalCost => "capital_cost",
    };
    info!("Changing {attr_name} for {tech} by factor {factor}");

    if tech == "AC" {
        // Lines have no carrier
        for line in network.lines.values_mut() {
            match attr {
                ScaleAttr::PNomMax => line.s_nom_max *= factor,
                ScaleAttr::CapitalCost => line.capital_cost *= factor,
            }
        }
        return Ok(());
    }

    let selected = |carrier: &str| {
        if tech == "solar" {
            carrier.contains("solar") && !carrier.contains("solar rooftop")
        } else {
            carrier.contains(tech)
        }
    };

    // Beware: if the factor is 0 and p_nom_max is inf, 0*inf is NaN
    let scale = |value: &mut f64| {
        if value.is_finite() || factor != 0.0 {
            *value *= factor;
        } else {
            *value = 0.0;
        }
    };

    for generator in network.generators.values_mut().filter(|g| selected(g.carrier.as_str())) {
        match attr {
            ScaleAttr::PNomMax => scale(&mut generator.p_nom_max),
            ScaleAttr::CapitalCost => generator.capital_cost *= factor,
        }
    }
    for link in network.links.values_mut().filter(|l| selected(l.carrier.as_str())) {
        match attr {
            ScaleAttr::PNomMax => scale(&mut link.p_nom_max),
            ScaleAttr::CapitalCost => link.capital_cost *= factor,
        }
    }
    for unit in network
        .storage_units
        .values_mut()
        .filter(|u| selected(u.carrier.as_str()))
    {
        match attr {
            ScaleAttr::PNomMax => scale(&mut unit.p_nom_max),
            ScaleAttr::CapitalCost => unit.capital_cost *= factor,
        }
    }
    if attr == ScaleAttr::CapitalCost {
        for store in network.stores.values_mut().filter(|s| selected(s.carrier.as_str())) {
            store.capital_cost *= factor;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::toy_network;
    use crate::network::TimeVarying;

    #[test]
    fn test_hvdc_transport_model() {
        let mut network = toy_network();
        let n_lines = network.lines.len();
        assert!(n_lines > 0);

        hvdc_transport_model(&mut network).unwrap();
        assert!(network.lines.is_empty());

        let converted = network.link("0").unwrap();
        assert_eq!(converted.carrier.as_str(), "DC");
        assert_eq!(
            converted.efficiency,
            TimeVarying::Static(1.0 - 0.03 * converted.length / 1000.0)
        );
        assert_eq!(converted.p_min_pu, TimeVarying::Static(-1.0));
    }

    #[test]
    fn test_tech_scaling_unknown_carrier_is_ignored() {
        let mut network = toy_network();
        let before = network.clone();
        apply_tech_scaling(&mut network, "unobtainium", ScaleAttr::PNomMax, 2.0).unwrap();
        assert_eq!(network, before);
    }

    #[test]
    fn test_tech_scaling_scales_generators() {
        let mut network = toy_network();
        for generator in network.generators.values_mut() {
            generator.p_nom_max = 100.0;
        }
        apply_tech_scaling(&mut network, "onwind", ScaleAttr::PNomMax, 3.0).unwrap();

        for (id, generator) in &network.generators {
            let expected = if generator.carrier.as_str() == "onwind" {
                300.0
            } else {
                100.0
            };
            assert_eq!(generator.p_nom_max, expected, "{id}");
        }
    }
}
