//! Fixtures for tests
#![allow(missing_docs)]

use crate::config::CostsConfig;
use crate::id::{BusID, CarrierID, GeneratorID, LineID, LoadID, StorageUnitID};
use crate::network::{Bus, Carrier, Generator, Line, Load, Network, StorageUnit};
use crate::year::YearValue;
use chrono::{Duration, NaiveDate};
use std::fs;
use std::path::Path;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// Cost assumptions used across unit tests
pub fn costs_config() -> CostsConfig {
    CostsConfig {
        usd_to_eur: 0.7532,
        discount_rate: 0.07,
        lifetime: 25.0,
        co2_budget: YearValue::Flat(1.0),
    }
}

/// A two-node electricity-only network with hourly snapshots
pub fn toy_network() -> Network {
    let mut network = Network::new();

    let t0 = NaiveDate::from_ymd_opt(2013, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    network.snapshots = (0..6).map(|h| t0 + Duration::hours(h)).collect();
    network.snapshot_weightings = vec![1.0; 6];

    for carrier in ["AC", "onwind", "solar", "OCGT", "PHS"] {
        network
            .add_carrier(CarrierID::new(carrier), Carrier::default())
            .unwrap();
    }

    for node in ["DE0 0", "DE0 1"] {
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
        let node = &name[..5];
        network
            .add_generator(
                GeneratorID::new(name),
                Generator {
                    bus: BusID::new(node),
                    carrier: CarrierID::new(carrier),
                    p_nom_extendable: true,
                    capital_cost: 1000.0,
                    p_max_pu: profile.into(),
                    ..Generator::default()
                },
            )
            .unwrap();
    }

    // A conventional generator the base-network stripping removes
    network
        .add_generator(
            GeneratorID::new("DE0 1 OCGT"),
            Generator {
                bus: BusID::new("DE0 1"),
                carrier: CarrierID::new("OCGT"),
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

/// The configuration used by the toy model, as a TOML string
pub const TOY_CONFIG: &str = r#"
log_level = "off"

[scenario]
sector_opts = "{SECTOR_OPTS}"
planning_horizons = [2020, 2030, 2040, 2050]
investment_year = {YEAR}

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

/// Write the toy `config.toml` with the given scenario descriptor and year
pub fn write_toy_config(model_dir: &Path, sector_opts: &str, investment_year: u32) {
    let contents = TOY_CONFIG
        .replace("{SECTOR_OPTS}", sector_opts)
        .replace("{YEAR}", &investment_year.to_string());
    fs::write(model_dir.join("config.toml"), contents).unwrap();
}
