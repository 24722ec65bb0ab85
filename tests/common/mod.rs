//! Shared helpers for the integration tests: a complete two-node toy model.
#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use secnet::id::{BusID, CarrierID, GeneratorID, LineID, LoadID, StorageUnitID};
use secnet::network::io::export_to_csv_dir;
use secnet::network::{Bus, Carrier, Generator, Line, Load, Network, StorageUnit};
use std::fs;
use std::path::Path;

/// The two model nodes
pub const NODES: [&str; 2] = ["DE0 0", "DE0 1"];

/// Snapshots in the toy model
pub const N_SNAPSHOTS: usize = 6;

/// Build the electricity-only base network of the toy model
pub fn base_network() -> Network {
    let mut network = Network::new();

    let t0 = NaiveDate::from_ymd_opt(2013, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    network.snapshots = (0..N_SNAPSHOTS as i64).map(|h| t0 + Duration::hours(h)).collect();
    network.snapshot_weightings = vec![1.0; N_SNAPSHOTS];

    for carrier in ["AC", "onwind", "solar", "CCGT", "PHS"] {
        network
            .add_carrier(CarrierID::new(carrier), Carrier::default())
            .unwrap();
    }

    for node in NODES {
        network
            .add_bus(
                BusID::new(node),
                Bus {
                    carrier: CarrierID::new("AC"),
                    location: String::new(),
                    country: Some("DE".to_string()),
                },
            )
            .unwrap();
    }

    network
        .add_line(
            LineID::new("0"),
            Line {
                bus0: BusID::new("DE0 0"),
                bus1: BusID::new("DE0 1"),
                length: 100.0,
                s_nom: 500.0,
                capital_cost: 40.0,
                ..Line::default()
            },
        )
        .unwrap();

    for (name, carrier, profile) in [
        ("DE0 0 onwind", "onwind", vec![0.6, 0.4, 0.3, 0.7, 0.9, 0.5]),
        ("DE0 0 solar", "solar", vec![0.0, 0.1, 0.5, 0.6, 0.2, 0.0]),
        ("DE0 1 solar", "solar", vec![0.0, 0.2, 0.6, 0.5, 0.1, 0.0]),
    ] {
        network
            .add_generator(
                GeneratorID::new(name),
                Generator {
                    bus: BusID::new(&name[..5]),
                    carrier: CarrierID::new(carrier),
                    p_nom_extendable: true,
                    capital_cost: 1000.0,
                    p_max_pu: profile.into(),
                    ..Generator::default()
                },
            )
            .unwrap();
    }

    // A conventional generator that base-network stripping removes
    network
        .add_generator(
            GeneratorID::new("DE0 1 CCGT"),
            Generator {
                bus: BusID::new("DE0 1"),
                carrier: CarrierID::new("CCGT"),
                p_nom: 200.0,
                ..Generator::default()
            },
        )
        .unwrap();

    network
        .add_storage_unit(
            StorageUnitID::new("DE0 0 PHS"),
            StorageUnit {
                bus: BusID::new("DE0 0"),
                carrier: CarrierID::new("PHS"),
                p_nom: 100.0,
                max_hours: 6.0,
                ..StorageUnit::default()
            },
        )
        .unwrap();

    for (name, values) in [
        ("DE0 0", vec![400.0, 380.0, 390.0, 420.0, 450.0, 410.0]),
        ("DE0 1", vec![150.0, 140.0, 145.0, 160.0, 170.0, 155.0]),
    ] {
        network
            .add_load(
                LoadID::new(name),
                Load {
                    bus: BusID::new(name),
                    p_set: values.into(),
                    ..Load::default()
                },
            )
            .unwrap();
    }

    network
}

const CONFIG_TEMPLATE: &str = r#"
log_level = "off"

[scenario]
sector_opts = "{SECTOR_OPTS}"
planning_horizons = [2020, 2030, 2040, 2050]
investment_year = 2030

[costs]
usd_to_eur = 0.7532
discount_rate = 0.07
lifetime = 25.0
co2_budget = { 2020 = 0.7, 2030 = 0.45, 2040 = 0.2, 2050 = 0.0 }

[base_network]
foresight = "overnight"
generators = ["onwind", "solar"]
storage_units = ["PHS"]

[sector]
central = true
central_fraction = 0.6
district_heating_loss = 0.15
time_dep_hp_cop = true
tes = true
tes_tau = 3.0
boilers = true
solar_thermal = true
chp = false
v2g = true
bev_dsm = true
bev_availability = 0.5
transport_fuel_cell_efficiency = 0.5
transport_internal_combustion_efficiency = 0.3
land_transport_fuel_cell_share = { 2030 = 0.15 }
land_transport_electric_share = { 2030 = 0.25 }
hydrogen_underground_storage = false
methanation = false
smr = false
cc_fraction = 0.9
marginal_cost_storage = 0.01
co2_vent = true
dac = false
co2_sequestration_cost = 20.0
shipping_h2_share = 0.0
shipping_demand = 1.0
shipping_average_efficiency = 0.4
aviation_demand = 1.0
use_fischer_tropsch_waste_heat = true
use_biofuel_waste_heat = true
use_fuel_cell_waste_heat = true
"#;

const COSTS_CSV: &str = "\
technology,parameter,value,unit
gas,fuel,21.6,EUR/MWhth
gas,CO2 intensity,0.187,tCO2/MWhth
OCGT,efficiency,0.41,per unit
OCGT,investment,430,EUR/kWel
OCGT,FOM,3.4,%/year
OCGT,VOM,4.5,EUR/MWhel
OCGT,lifetime,25,years
onwind,investment,1040,EUR/kWel
onwind,FOM,2.5,%/year
onwind,lifetime,30,years
solar-utility,investment,600,EUR/kWel
solar-utility,lifetime,25,years
solar-rooftop,investment,1100,EUR/kWel
solar-rooftop,lifetime,25,years
oil,fuel,50,EUR/MWhth
oil,CO2 intensity,0.27,tCO2/MWhth
electrolysis,efficiency,0.8,per unit
electrolysis,investment,350,EUR/kWel
electrolysis,FOM,4,%/year
electrolysis,lifetime,18,years
fuel cell,efficiency,0.58,per unit
fuel cell,investment,339,EUR/kWel
fuel cell,FOM,3,%/year
fuel cell,lifetime,10,years
hydrogen storage tank,investment,57,EUR/kWhH2
hydrogen storage tank,lifetime,20,years
H2 pipeline,investment,267,EUR/MW/km
H2 pipeline,FOM,5,%/year
H2 pipeline,lifetime,40,years
battery storage,investment,230,EUR/kWh
battery storage,lifetime,15,years
battery inverter,efficiency,0.9,per unit
battery inverter,investment,270,EUR/kWel
battery inverter,lifetime,10,years
decentral air-sourced heat pump,efficiency,3,per unit
decentral air-sourced heat pump,investment,1050,EUR/kWth
decentral air-sourced heat pump,lifetime,20,years
central air-sourced heat pump,efficiency,3.5,per unit
central air-sourced heat pump,investment,700,EUR/kWth
central air-sourced heat pump,lifetime,25,years
decentral ground-sourced heat pump,efficiency,4,per unit
decentral ground-sourced heat pump,investment,1400,EUR/kWth
decentral ground-sourced heat pump,lifetime,20,years
water tank charger,efficiency,0.9,per unit
water tank discharger,efficiency,0.9,per unit
decentral water tank storage,investment,860,EUR/m3
decentral water tank storage,lifetime,20,years
central water tank storage,investment,250,EUR/m3
central water tank storage,lifetime,40,years
decentral resistive heater,efficiency,0.9,per unit
decentral resistive heater,investment,100,EUR/kWth
decentral resistive heater,lifetime,20,years
central resistive heater,efficiency,0.99,per unit
central resistive heater,investment,100,EUR/kWth
central resistive heater,lifetime,20,years
decentral gas boiler,efficiency,0.9,per unit
decentral gas boiler,investment,175,EUR/kWth
decentral gas boiler,lifetime,20,years
central gas boiler,efficiency,0.97,per unit
central gas boiler,investment,63,EUR/kWth
central gas boiler,lifetime,22,years
decentral solar thermal,investment,270,EUR/m2
decentral solar thermal,lifetime,20,years
central solar thermal,investment,140,EUR/m2
central solar thermal,lifetime,20,years
digestible biomass,fuel,15,EUR/MWh
solid biomass,fuel,25,EUR/MWh
solid biomass,CO2 intensity,0.3,tCO2/MWh
Anaerobic digestion,investment,1400,EUR/kW
Anaerobic digestion,CO2 stored,0.12,tCO2/MWh
Anaerobic digestion,capture rate,0.9,per unit
Anaerobic digestion,lifetime,20,years
biogas upgrading,investment,183,EUR/kW
biogas upgrading,VOM,3.5,EUR/MWh
biogas upgrading,lifetime,20,years
BtL,investment,3500,EUR/kW
BtL,efficiency,0.45,per unit
BtL,CO2 stored,0.57,tCO2/MWh
BtL,capture rate,0.9,per unit
BtL,lifetime,20,years
BioSNG,investment,2600,EUR/kW
BioSNG,efficiency,0.65,per unit
BioSNG,CO2 stored,0.2,tCO2/MWh
BioSNG,capture rate,0.9,per unit
BioSNG,lifetime,25,years
central solid biomass CHP,investment,3300,EUR/kWel
central solid biomass CHP,efficiency,0.31,per unit
central solid biomass CHP,VOM,3,EUR/MWhel
central solid biomass CHP,lifetime,25,years
biomass CHP capture,investment,2600,EUR/tCO2
biomass CHP capture,lifetime,25,years
";

const CO2_COLUMNS: &str = "country,electricity,rail non-elec,road non-elec,\
residential non-elec,services non-elec,industrial non-elec,industrial processes,\
domestic aviation,international aviation,domestic navigation,international navigation";

/// Historical emissions per country in Mt, per reference year
pub const CO2_1990: [f64; 5] = [600.0, 20.0, 150.0, 120.0, 60.0];
/// Reference-year emissions per country in Mt
pub const CO2_2018: [f64; 5] = [500.0, 15.0, 140.0, 100.0, 45.0];

fn co2_row(values: &[f64; 5]) -> String {
    format!(
        "DE,{},{},{},{},{},100,30,5,10,3,8",
        values[0], values[1], values[2], values[3], values[4]
    )
}

/// A wide profile CSV over the toy snapshots for both nodes
fn profile_csv(values: [[f64; 2]; N_SNAPSHOTS]) -> String {
    let mut out = String::from("snapshot,DE0 0,DE0 1\n");
    for (i, row) in values.iter().enumerate() {
        out.push_str(&format!("t{},{},{}\n", i, row[0], row[1]));
    }
    out
}

/// Write the complete toy model to `model_dir`.
pub fn write_toy_model(model_dir: &Path, sector_opts: &str) {
    fs::create_dir_all(model_dir.join("profiles")).unwrap();

    fs::write(
        model_dir.join("config.toml"),
        CONFIG_TEMPLATE.replace("{SECTOR_OPTS}", sector_opts),
    )
    .unwrap();

    export_to_csv_dir(&base_network(), &model_dir.join("network")).unwrap();

    fs::write(
        model_dir.join("pop_layout.csv"),
        "node,total,urban,rural\nDE0 0,3000,2000,1000\nDE0 1,1000,500,500\n",
    )
    .unwrap();

    fs::write(model_dir.join("costs.csv"), COSTS_CSV).unwrap();

    fs::write(
        model_dir.join("co2_totals.csv"),
        format!("{CO2_COLUMNS}\n{}\n", co2_row(&CO2_1990)),
    )
    .unwrap();
    fs::write(
        model_dir.join("co2_totals_1990.csv"),
        format!("{CO2_COLUMNS}\n{}\n", co2_row(&CO2_1990)),
    )
    .unwrap();
    fs::write(
        model_dir.join("co2_totals_2018.csv"),
        format!("{CO2_COLUMNS}\n{}\n", co2_row(&CO2_2018)),
    )
    .unwrap();

    fs::write(
        model_dir.join("transport_data.csv"),
        "country,number cars,average fuel efficiency\nDE,1000000,0.4\n",
    )
    .unwrap();

    fs::write(
        model_dir.join("biomass_potentials.csv"),
        "country,manureslurry,municipal biowaste,sewage sludge,straw,\
poplar,forest residues,industry wood residues\n\
DE,876000,876000,876000,876000,1752000,1752000,876000\n",
    )
    .unwrap();

    let profiles = model_dir.join("profiles");
    for (sector, use_, scale) in [
        ("residential", "space", 120.0),
        ("residential", "water", 40.0),
        ("services", "space", 60.0),
        ("services", "water", 20.0),
    ] {
        let values = std::array::from_fn(|i| {
            let shape = 0.8 + 0.1 * (i % 3) as f64;
            [scale * shape, scale * shape * 0.4]
        });
        fs::write(
            profiles.join(format!("heat_demand_{sector}_{use_}.csv")),
            profile_csv(values),
        )
        .unwrap();
    }
    fs::write(
        profiles.join("electric_heat_supply.csv"),
        profile_csv(std::array::from_fn(|_| [30.0, 12.0])),
    )
    .unwrap();
    fs::write(
        profiles.join("cop_air.csv"),
        profile_csv(std::array::from_fn(|i| {
            [2.5 + 0.1 * i as f64, 2.6 + 0.1 * i as f64]
        })),
    )
    .unwrap();
    fs::write(
        profiles.join("cop_soil.csv"),
        profile_csv(std::array::from_fn(|_| [3.6, 3.7])),
    )
    .unwrap();
    fs::write(
        profiles.join("solar_thermal.csv"),
        profile_csv(std::array::from_fn(|i| {
            let s = [0.0, 0.1, 0.4, 0.5, 0.2, 0.0][i];
            [s, s]
        })),
    )
    .unwrap();
    fs::write(
        profiles.join("transport_demand.csv"),
        profile_csv(std::array::from_fn(|i| {
            let s = [900.0, 600.0, 450.0, 700.0, 1100.0, 950.0][i];
            [s, s / 3.0]
        })),
    )
    .unwrap();
    fs::write(
        profiles.join("ev_availability.csv"),
        profile_csv(std::array::from_fn(|i| {
            let s = [0.95, 0.9, 0.85, 0.8, 0.85, 0.92][i];
            [s, s]
        })),
    )
    .unwrap();
    fs::write(
        profiles.join("ev_dsm.csv"),
        profile_csv(std::array::from_fn(|i| {
            let s = if i % 3 == 0 { 0.4 } else { 0.0 };
            [s, s]
        })),
    )
    .unwrap();
}
