//! Integration tests driving the full preparation pipeline on a toy model.
mod common;

use common::{CO2_1990, CO2_2018, N_SNAPSHOTS, NODES, write_toy_model};
use float_cmp::assert_approx_eq;
use secnet::config::Config;
use secnet::emissions::build_carbon_budget;
use secnet::network::Network;
use secnet::network::io::import_from_csv_dir;
use secnet::options::DecayModel;
use secnet::pipeline::prepare;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Run the pipeline on a toy model with the given scenario descriptor
fn run_scenario(model_dir: &Path, output_dir: &Path, sector_opts: &str) -> Network {
    write_toy_model(model_dir, sector_opts);
    let config = Config::from_path(model_dir).unwrap();
    prepare(model_dir, config, output_dir).unwrap();

    import_from_csv_dir(&output_dir.join("prenetwork")).unwrap()
}

#[test]
fn test_sector_coupled_scenario() {
    let dir = tempdir().unwrap();
    let output_dir = dir.path().join("out");
    let network = run_scenario(dir.path(), &output_dir, "T-H-B-cb48be3");

    for node in NODES {
        // Transport: EV (25%), fuel cell (15%) and combustion (60%) shares
        assert!(network.buses.contains_key(&*format!("{node} EV battery")));
        assert!(network.loads.contains_key(&*format!("{node} land transport EV")));
        assert!(
            network
                .loads
                .contains_key(&*format!("{node} land transport fuel cell"))
        );
        assert!(network.loads.contains_key(&*format!("{node} land transport oil")));
        assert!(
            network
                .loads
                .contains_key(&*format!("{node} land transport oil emissions"))
        );
        assert!(network.links.contains_key(&*format!("{node} BEV charger")));
        assert!(network.links.contains_key(&*format!("{node} V2G")));
        assert!(network.stores.contains_key(&*format!("{node} battery storage")));

        // Heat: German nodes get the rural systems and district heating
        for system in ["residential rural", "services rural", "urban central"] {
            assert!(
                network.buses.contains_key(&*format!("{node} {system} heat")),
                "missing heat bus for {system}"
            );
            assert!(
                network.loads.contains_key(&*format!("{node} {system} heat")),
                "missing heat load for {system}"
            );
        }
        for system in ["residential urban decentral", "services urban decentral"] {
            assert!(!network.buses.contains_key(&*format!("{node} {system} heat")));
        }

        // Biomass: feedstock buses, stores and conversion links
        assert!(network.buses.contains_key(&*format!("{node} solid biomass")));
        assert!(network.stores.contains_key(&*format!("{node} solid biomass")));
        assert!(
            network
                .generators
                .contains_key(&*format!("{node} manureslurry digestible biomass"))
        );
        assert!(network.links.contains_key(&*format!("{node} biomass to liquid")));
        assert!(network.links.contains_key(&*format!("{node} solid biomass to gas")));

        // Unconditional stages
        assert!(network.buses.contains_key(&*format!("{node} H2")));
        assert!(network.links.contains_key(&*format!("{node} H2 Electrolysis")));
        assert!(network.links.contains_key(&*format!("{node} OCGT")));
    }

    // The hydrogen pipeline follows the single grid corridor
    assert!(network.links.contains_key("H2 pipeline DE0 0 -> DE0 1"));

    // CO2 tracking and the beta-decay carbon budget cap
    assert!(network.buses.contains_key("co2 atmosphere"));
    assert!(network.buses.contains_key("co2 stored"));

    let e_1990 = 0.001 * CO2_1990.iter().sum::<f64>();
    let e_2018 = 0.001 * CO2_2018.iter().sum::<f64>();
    let path = build_carbon_budget(
        48.0,
        DecayModel::Beta(3.0),
        e_1990,
        e_2018,
        &[2020, 2030, 2040, 2050],
        2.0,
    )
    .unwrap();
    let cap = path.cap(2030).unwrap();

    let nyears = N_SNAPSHOTS as f64 / 8760.0;
    let expected = CO2_1990.iter().sum::<f64>() * 1e6 * cap * nyears;
    let constraint = &network.global_constraints["CO2Limit"];
    assert_approx_eq!(f64, constraint.constant, expected, epsilon = 1e-6);

    // The trajectory is persisted for reuse within the run
    assert!(output_dir.join("carbon_budget_distribution.csv").is_file());
    assert!(output_dir.join("countries.csv").is_file());
}

#[test]
fn test_carbon_budget_is_memoised() {
    let dir = tempdir().unwrap();
    let output_dir = dir.path().join("out");
    run_scenario(dir.path(), &output_dir, "T-H-B-cb48be3");

    // Tamper with the persisted trajectory; a second invocation within the
    // same run directory must reuse it instead of recomputing
    fs::write(
        output_dir.join("carbon_budget_distribution.csv"),
        "planning_horizon,cap\n2020,0.7\n2030,0.123\n2040,0.05\n2050,0.0\n",
    )
    .unwrap();

    let config = Config::from_path(dir.path()).unwrap();
    prepare(dir.path(), config, &output_dir).unwrap();
    let network = import_from_csv_dir(&output_dir.join("prenetwork")).unwrap();

    let nyears = N_SNAPSHOTS as f64 / 8760.0;
    let expected = CO2_1990.iter().sum::<f64>() * 1e6 * 0.123 * nyears;
    assert_approx_eq!(
        f64,
        network.global_constraints["CO2Limit"].constant,
        expected,
        epsilon = 1e-6
    );
}

#[test]
fn test_resampling_scenario() {
    let dir = tempdir().unwrap();
    let output_dir = dir.path().join("out");
    let network = run_scenario(dir.path(), &output_dir, "3h");

    assert_eq!(network.snapshots.len(), N_SNAPSHOTS.div_ceil(3));
    assert_approx_eq!(
        f64,
        network.snapshot_weightings.iter().sum::<f64>(),
        N_SNAPSHOTS as f64
    );

    // The configured year-keyed budget applies without a cb token; with no
    // sector flags only electricity emissions are in scope
    let nyears = N_SNAPSHOTS as f64 / 8760.0;
    let expected = CO2_1990[0] * 1e6 * 0.45 * nyears;
    assert_approx_eq!(
        f64,
        network.global_constraints["CO2Limit"].constant,
        expected,
        epsilon = 1e-6
    );
}

#[test]
fn test_empty_descriptor_applies_only_unconditional_stages() {
    let dir = tempdir().unwrap();
    let output_dir = dir.path().join("out");
    let network = run_scenario(dir.path(), &output_dir, "");

    // Unconditional stages ran
    assert!(network.buses.contains_key("DE0 0 H2"));
    assert!(network.buses.contains_key("EU gas"));
    assert!(network.stores.contains_key("DE0 0 battery"));

    // Conditional sectors did not
    assert!(!network.buses.contains_key("DE0 0 urban central heat"));
    assert!(!network.buses.contains_key("DE0 0 EV battery"));
    assert!(!network.buses.contains_key("DE0 0 solid biomass"));

    // Legacy conventional generation was stripped, kept carriers survive
    assert!(!network.generators.contains_key("DE0 1 CCGT"));
    assert!(network.storage_units.contains_key("DE0 0 PHS"));
    assert!(network.generators.contains_key("DE0 0 onwind"));
}

#[test]
fn test_tech_scaling_and_line_extension_tokens() {
    let dir = tempdir().unwrap();
    let output_dir = dir.path().join("out");
    let network = run_scenario(dir.path(), &output_dir, "onwind+p3-linemaxext10");

    // linemaxext10 adds 10 GW of headroom over today's capacity
    let line = &network.lines["0"];
    assert_approx_eq!(f64, line.s_nom_max, 500.0 + 10e3);

    // onwind+p3 triples the (infinite) capacity bound; inf stays inf
    let onwind = &network.generators["DE0 0 onwind"];
    assert!(onwind.p_nom_max.is_infinite());
}
