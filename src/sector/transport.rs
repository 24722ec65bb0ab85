//! Land transport coupling: electric, fuel cell and combustion vehicles.
use super::{PrepareContext, ensure_eu_oil_bus};
use crate::id::{BusID, CarrierID, LinkID, LoadID, StoreID};
use crate::network::{Bus, Link, Load, Network, Store};
use anyhow::{Context, Result, ensure};
use log::info;

/// Plug-in efficiency of EV chargers and vehicle-to-grid inverters
const EV_CHARGE_EFFICIENCY: f64 = 0.9;

/// Three-phase charger rating in MW per car at typical grid connection share
const EV_CHARGE_RATE: f64 = 0.011;

/// Average usable EV battery capacity in MWh per car
const EV_BATTERY_SIZE: f64 = 0.05;

/// The series rotated forward by `hours` snapshots, wrapping at the horizon
fn shift(series: &[f64], hours: usize) -> Vec<f64> {
    let n = series.len();
    (0..n).map(|i| series[(i + n - hours) % n]).collect()
}

/// Add land transport demand split across drivetrain technologies.
///
/// The investment-year-resolved fuel cell and electric shares decide which
/// subsystems appear: EV battery buses with availability-bound chargers
/// (optionally vehicle-to-grid links and demand-side-managed stores),
/// hydrogen loads for fuel cell vehicles, and oil loads plus an emissions
/// load for the remaining combustion share.
pub fn add_land_transport(network: &mut Network, ctx: &PrepareContext) -> Result<()> {
    info!("Adding land transport");
    let year = ctx.investment_year();
    let fuel_cell_share = ctx
        .sector()
        .land_transport_fuel_cell_share
        .resolve(year)
        .context("Could not resolve land transport fuel cell share")?;
    let electric_share = ctx
        .sector()
        .land_transport_electric_share
        .resolve(year)
        .context("Could not resolve land transport electric share")?;
    let ice_share = 1.0 - fuel_cell_share - electric_share;
    info!(
        "Shares of FCEV, EV and ICEV are {fuel_cell_share}, {electric_share}, {ice_share}"
    );
    ensure!(
        ice_share >= 0.0,
        "Fuel cell and electric vehicle shares add up to more than 1"
    );

    let nodes = ctx.nodes();
    let transport = ctx.profiles.transport()?;

    if electric_share > 0.0 {
        network.add_carrier(CarrierID::new("Li ion"), Default::default())?;
        network.ensure_carrier("land transport EV");
        network.ensure_carrier("BEV charger");

        for node in &nodes {
            let demand = transport.get(node.as_str())?;
            network.add_bus(
                node.suffixed(" EV battery"),
                Bus {
                    carrier: CarrierID::new("Li ion"),
                    location: node.to_string(),
                    country: None,
                },
            )?;

            // Charging is not instantaneous, so spread the demand over the
            // three most recent snapshots
            let smoothed: Vec<f64> = {
                let prev1 = shift(demand, 1);
                let prev2 = shift(demand, 2);
                demand
                    .iter()
                    .zip(prev1.iter().zip(&prev2))
                    .map(|(now, (p1, p2))| electric_share * (now + p1 + p2) / 3.0)
                    .collect()
            };
            network.add_load(
                LoadID::new(&format!("{node} land transport EV")),
                Load {
                    bus: node.suffixed(" EV battery"),
                    carrier: CarrierID::new("land transport EV"),
                    p_set: smoothed.into(),
                },
            )?;

            let cars = ctx
                .tables
                .transport_data()?
                .nodal(&ctx.layout, node, "number cars")?;
            let p_nom = cars * EV_CHARGE_RATE * electric_share;
            let availability = ctx.profiles.ev_availability()?.get(node.as_str())?;

            network.add_link(
                LinkID::new(&format!("{node} BEV charger")),
                Link {
                    bus0: node.clone(),
                    bus1: node.suffixed(" EV battery"),
                    p_nom,
                    carrier: CarrierID::new("BEV charger"),
                    p_max_pu: availability.to_vec().into(),
                    efficiency: EV_CHARGE_EFFICIENCY.into(),
                    ..Link::default()
                },
            )?;

            if ctx.sector().v2g {
                network.ensure_carrier("V2G");
                network.add_link(
                    LinkID::new(&format!("{node} V2G")),
                    Link {
                        bus0: node.suffixed(" EV battery"),
                        bus1: node.clone(),
                        p_nom,
                        carrier: CarrierID::new("V2G"),
                        p_max_pu: availability.to_vec().into(),
                        efficiency: EV_CHARGE_EFFICIENCY.into(),
                        ..Link::default()
                    },
                )?;
            }

            if ctx.sector().bev_dsm {
                network.ensure_carrier("battery storage");
                network.add_store(
                    StoreID::new(&format!("{node} battery storage")),
                    Store {
                        bus: node.suffixed(" EV battery"),
                        carrier: CarrierID::new("battery storage"),
                        e_cyclic: true,
                        e_nom: cars
                            * EV_BATTERY_SIZE
                            * ctx.sector().bev_availability
                            * electric_share,
                        e_min_pu: ctx.profiles.ev_dsm()?.get(node.as_str())?.to_vec().into(),
                        ..Store::default()
                    },
                )?;
            }
        }
    }

    if fuel_cell_share > 0.0 {
        network.ensure_carrier("land transport fuel cell");
        for node in &nodes {
            let demand = transport.get(node.as_str())?;
            let p_set: Vec<f64> = demand
                .iter()
                .map(|d| fuel_cell_share / ctx.sector().transport_fuel_cell_efficiency * d)
                .collect();
            network.add_load(
                LoadID::new(&format!("{node} land transport fuel cell")),
                Load {
                    bus: node.suffixed(" H2"),
                    carrier: CarrierID::new("land transport fuel cell"),
                    p_set: p_set.into(),
                },
            )?;
        }
    }

    if ice_share > 0.0 {
        ensure_eu_oil_bus(network)?;
        network.ensure_carrier("land transport oil");
        network.ensure_carrier("land transport oil emissions");
        let ice_efficiency = ctx.sector().transport_internal_combustion_efficiency;
        let oil_intensity = ctx.costs.at("oil", "CO2 intensity")?;

        for node in &nodes {
            let demand = transport.get(node.as_str())?;
            network.add_load(
                LoadID::new(&format!("{node} land transport oil")),
                Load {
                    bus: BusID::new("EU oil"),
                    carrier: CarrierID::new("land transport oil"),
                    p_set: demand
                        .iter()
                        .map(|d| ice_share / ice_efficiency * d)
                        .collect::<Vec<f64>>()
                        .into(),
                },
            )?;
            // Negative load: combustion puts the carbon into the atmosphere
            network.add_load(
                LoadID::new(&format!("{node} land transport oil emissions")),
                Load {
                    bus: BusID::new("co2 atmosphere"),
                    carrier: CarrierID::new("land transport oil emissions"),
                    p_set: demand
                        .iter()
                        .map(|d| -ice_share / ice_efficiency * d * oil_intensity)
                        .collect::<Vec<f64>>()
                        .into(),
                },
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_wraps_around() {
        let series = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(shift(&series, 1), vec![4.0, 1.0, 2.0, 3.0]);
        assert_eq!(shift(&series, 2), vec![3.0, 4.0, 1.0, 2.0]);
    }
}
