//! Historical CO2 emissions and carbon budget trajectories.
//!
//! A carbon budget token (`cb<budget><be|ex><param>`) turns a total remaining
//! budget in GtCO2 into a per-planning-year cap expressed as a fraction of
//! base-year emissions. The trajectory is persisted next to the run's outputs
//! the first time it is computed and re-read on later invocations within the
//! same run; the cache is never invalidated.
use crate::config::EmissionsConfig;
use crate::options::{DecayModel, ScenarioOptions};
use crate::tables::WideTable;
use anyhow::{Context, Result, ensure};
use indexmap::IndexSet;
use log::info;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, ContinuousCDF};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// File the computed trajectory is persisted to
const BUDGET_FILE_NAME: &str = "carbon_budget_distribution.csv";

/// File the in-scope countries are persisted to alongside the trajectory
const COUNTRIES_FILE_NAME: &str = "countries.csv";

/// Emission table columns per sector flag.
///
/// Electricity is always in scope; the other groups join when the matching
/// sector option is present.
fn sector_columns(options: &ScenarioOptions) -> Vec<&'static str> {
    let mut columns = vec!["electricity"];
    if options.has_transport() {
        columns.extend(["rail non-elec", "road non-elec"]);
    }
    if options.has_heat() {
        columns.extend(["residential non-elec", "services non-elec"]);
    }
    if options.has_industry() {
        columns.extend([
            "industrial non-elec",
            "industrial processes",
            "domestic aviation",
            "international aviation",
            "domestic navigation",
            "international navigation",
        ]);
    }

    columns
}

/// Total historical emissions over the in-scope countries and sectors, in Mt.
///
/// The `totals` table holds one row per country in MtCO2.
pub fn co2_emissions(
    totals: &WideTable,
    countries: &IndexSet<&str>,
    options: &ScenarioOptions,
) -> Result<f64> {
    let mut total = 0.0;
    for column in sector_columns(options) {
        total += totals
            .column_sum(countries.iter().copied(), column)
            .with_context(|| format!("Missing emissions data for sector {column:?}"))?;
    }

    Ok(total)
}

/// Historical emissions for a reference year, in GtCO2.
///
/// Reads `co2_totals_<year>.csv` from the model directory and sums the
/// in-scope countries and sectors.
pub fn co2_emissions_year(
    model_dir: &Path,
    countries: &IndexSet<&str>,
    options: &ScenarioOptions,
    year: u32,
) -> Result<f64> {
    let totals = WideTable::from_path(&model_dir.join(format!("co2_totals_{year}.csv")))?;

    // 0.001 converts MtCO2 to GtCO2
    Ok(co2_emissions(&totals, countries, options)? * 0.001)
}

/// A year-indexed trajectory of emission caps relative to the base year
#[derive(Debug, Clone, PartialEq)]
pub struct CarbonBudgetPath(BTreeMap<u32, f64>);

impl CarbonBudgetPath {
    /// The cap for the given planning year, as a fraction of base-year levels
    pub fn cap(&self, year: u32) -> Result<f64> {
        self.0
            .get(&year)
            .copied()
            .with_context(|| format!("Carbon budget has no cap for planning year {year}"))
    }
}

/// Distribute a carbon budget over the planning horizon.
///
/// # Arguments
///
/// * `budget` - Total remaining budget in GtCO2
/// * `model` - The decay model from the scenario token
/// * `e_base` - Base year (e.g. 1990) emissions in GtCO2
/// * `e_ref` - Reference year (e.g. 2018) emissions in GtCO2
/// * `planning_horizons` - The planning years; the first anchors the path
/// * `flat_years` - Years assumed to emit at `e_ref` before the path starts,
///   subtracted from the budget
pub fn build_carbon_budget(
    budget: f64,
    model: DecayModel,
    e_base: f64,
    e_ref: f64,
    planning_horizons: &[u32],
    flat_years: f64,
) -> Result<CarbonBudgetPath> {
    ensure!(
        !planning_horizons.is_empty(),
        "No planning horizons to distribute the carbon budget over"
    );
    let budget = budget - flat_years * e_ref;
    ensure!(
        budget > 0.0,
        "Carbon budget is exhausted by the {flat_years} flat years before the first planning year"
    );
    let t0 = planning_horizons[0];

    let caps = match model {
        DecayModel::Beta(beta) => {
            // Symmetric beta shape: slow decay at both ends, steep in the middle
            let t_f = t0 + (2.0 * budget / e_ref).round() as u32;
            ensure!(
                t_f > t0,
                "Carbon budget too small for a beta decay path starting in {t0}"
            );
            let dist = Beta::new(beta, beta)
                .with_context(|| format!("Invalid beta decay parameter {beta}"))?;
            planning_horizons
                .iter()
                .map(|&t| {
                    let s = f64::from(t - t0) / f64::from(t_f - t0);
                    (t, (e_ref / e_base) * (1.0 - dist.cdf(s.min(1.0))))
                })
                .collect()
        }
        DecayModel::Exponential(rate) => {
            // The decay constant solves for the path integrating to the budget
            let big_t = budget / e_ref;
            let m = (1.0 + (1.0 + rate * big_t).sqrt()) / big_t;
            planning_horizons
                .iter()
                .map(|&t| {
                    let dt = f64::from(t - t0);
                    (
                        t,
                        (e_ref / e_base) * (1.0 + (m + rate) * dt) * (-m * dt).exp(),
                    )
                })
                .collect()
        }
    };

    Ok(CarbonBudgetPath(caps))
}

#[derive(Debug, Serialize, Deserialize)]
struct BudgetRecord {
    planning_horizon: u32,
    cap: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct CountryRecord {
    country: String,
}

/// Load the persisted trajectory for this run, or compute and persist it.
///
/// The cache key is the run directory: within one run the first carbon budget
/// token computes the file and later invocations re-read it.
pub fn load_or_build_carbon_budget(
    run_dir: &Path,
    model_dir: &Path,
    budget: f64,
    model: DecayModel,
    countries: &IndexSet<&str>,
    options: &ScenarioOptions,
    emissions_config: &EmissionsConfig,
    planning_horizons: &[u32],
) -> Result<CarbonBudgetPath> {
    let budget_path = run_dir.join(BUDGET_FILE_NAME);
    if budget_path.is_file() {
        info!(
            "Reusing carbon budget trajectory from {}",
            budget_path.display()
        );
        let records: Vec<BudgetRecord> = crate::input::read_vec_from_csv(&budget_path)?;
        return Ok(CarbonBudgetPath(
            records.into_iter().map(|r| (r.planning_horizon, r.cap)).collect(),
        ));
    }

    let e_base = co2_emissions_year(model_dir, countries, options, emissions_config.base_year)?;
    let e_ref =
        co2_emissions_year(model_dir, countries, options, emissions_config.reference_year)?;
    let path = build_carbon_budget(
        budget,
        model,
        e_base,
        e_ref,
        planning_horizons,
        emissions_config.flat_years,
    )?;

    fs::create_dir_all(run_dir)
        .with_context(|| format!("Could not create {}", run_dir.display()))?;
    let mut writer = csv::Writer::from_path(&budget_path)
        .with_context(|| format!("Could not write {}", budget_path.display()))?;
    for (planning_horizon, cap) in &path.0 {
        writer.serialize(BudgetRecord {
            planning_horizon: *planning_horizon,
            cap: *cap,
        })?;
    }
    writer.flush()?;

    let countries_path = run_dir.join(COUNTRIES_FILE_NAME);
    let mut writer = csv::Writer::from_path(&countries_path)
        .with_context(|| format!("Could not write {}", countries_path.display()))?;
    for country in countries {
        writer.serialize(CountryRecord {
            country: (*country).to_string(),
        })?;
    }
    writer.flush()?;
    info!(
        "Carbon budget trajectory persisted to {}",
        budget_path.display()
    );

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    const HORIZONS: &[u32] = &[2020, 2030, 2040, 2050];

    #[rstest]
    #[case(DecayModel::Beta(3.0))]
    #[case(DecayModel::Exponential(0.0))]
    #[case(DecayModel::Exponential(0.05))]
    fn test_path_starts_at_reference_fraction(#[case] model: DecayModel) {
        // At t0 both decay models evaluate to exactly e_ref/e_base
        let path = build_carbon_budget(48.0, model, 4.5, 3.5, HORIZONS, 2.0).unwrap();
        assert_approx_eq!(f64, path.cap(2020).unwrap(), 3.5 / 4.5, epsilon = 1e-12);
    }

    #[test]
    fn test_beta_path_is_decreasing() {
        let path =
            build_carbon_budget(48.0, DecayModel::Beta(3.0), 4.5, 3.5, HORIZONS, 2.0).unwrap();
        let caps: Vec<f64> = HORIZONS.iter().map(|&t| path.cap(t).unwrap()).collect();
        assert!(caps.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_exponential_path_matches_closed_form() {
        let (e_base, e_ref, budget, rate, flat) = (4.5, 3.5, 48.0, 0.05, 2.0);
        let path = build_carbon_budget(
            budget,
            DecayModel::Exponential(rate),
            e_base,
            e_ref,
            HORIZONS,
            flat,
        )
        .unwrap();

        let remaining = budget - flat * e_ref;
        let big_t = remaining / e_ref;
        let m = (1.0 + (1.0 + rate * big_t).sqrt()) / big_t;
        let expected = (e_ref / e_base) * (1.0 + (m + rate) * 10.0) * (-m * 10.0f64).exp();
        assert_approx_eq!(f64, path.cap(2030).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_exhausted_budget_is_an_error() {
        let result = build_carbon_budget(6.0, DecayModel::Beta(3.0), 4.5, 3.5, HORIZONS, 2.0);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_planning_year_is_an_error() {
        let path =
            build_carbon_budget(48.0, DecayModel::Beta(3.0), 4.5, 3.5, HORIZONS, 2.0).unwrap();
        assert!(path.cap(2060).is_err());
    }
}
