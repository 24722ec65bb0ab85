//! The technology cost table.
//!
//! Costs are read once from a CSV file keyed by (technology, parameter),
//! normalised to MW and EUR, filled with per-technology defaults and
//! annualised. The table is read-only afterwards and consumed by every
//! mutation function; a missing lookup is a data error that aborts the
//! pipeline.
use crate::config::CostsConfig;
use crate::input::read_vec_from_csv;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const COSTS_FILE_NAME: &str = "costs.csv";

/// The annualised "fixed" cost parameter derived for every technology
pub const FIXED: &str = "fixed";

/// A single row of the raw cost CSV file
#[derive(Debug, Deserialize)]
struct CostRecord {
    technology: String,
    parameter: String,
    value: f64,
    #[serde(default)]
    unit: String,
}

/// Lookup table of technology cost parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostTable(IndexMap<String, IndexMap<String, f64>>);

impl CostTable {
    /// Read and prepare the cost table from the model directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing the model input files
    /// * `config` - Currency, discount rate and lifetime assumptions
    /// * `nyears` - Number of years the network's snapshots represent
    pub fn from_path(model_dir: &Path, config: &CostsConfig, nyears: f64) -> Result<CostTable> {
        let records = read_vec_from_csv(&model_dir.join(COSTS_FILE_NAME))?;
        Ok(Self::from_records(records, config, nyears))
    }

    fn from_records(records: Vec<CostRecord>, config: &CostsConfig, nyears: f64) -> CostTable {
        let mut table: IndexMap<String, IndexMap<String, f64>> = IndexMap::new();
        for record in records {
            // Normalise units to MW and EUR
            let mut value = record.value;
            if record.unit.contains("/kW") {
                value *= 1e3;
            }
            if record.unit.contains("USD") {
                value *= config.usd_to_eur;
            }

            *table
                .entry(record.technology)
                .or_default()
                .entry(record.parameter)
                .or_insert(0.0) += value;
        }

        let defaults = [
            ("CO2 intensity", 0.0),
            ("FOM", 0.0),
            ("VOM", 0.0),
            ("discount rate", config.discount_rate),
            ("efficiency", 1.0),
            ("fuel", 0.0),
            ("investment", 0.0),
            ("lifetime", config.lifetime),
        ];
        for params in table.values_mut() {
            for (parameter, value) in defaults {
                params.entry(parameter.to_string()).or_insert(value);
            }

            let fixed = (annuity(params["lifetime"], params["discount rate"])
                + params["FOM"] / 100.0)
                * params["investment"]
                * nyears;
            params.insert(FIXED.to_string(), fixed);
        }

        CostTable(table)
    }

    /// Look up a cost parameter, e.g. `costs.at("electrolysis", "fixed")`.
    pub fn at(&self, technology: &str, parameter: &str) -> Result<f64> {
        let params = self
            .0
            .get(technology)
            .with_context(|| format!("No cost data for technology {technology:?}"))?;
        let value = params.get(parameter).with_context(|| {
            format!("No cost parameter {parameter:?} for technology {technology:?}")
        })?;

        Ok(*value)
    }

    /// Whether the table has an entry for the given technology
    pub fn contains(&self, technology: &str) -> bool {
        self.0.contains_key(technology)
    }
}

/// The annuity factor for an asset with the given lifetime and discount rate.
///
/// Used to annualise investment costs over the lifetime of an asset.
pub fn annuity(lifetime: f64, discount_rate: f64) -> f64 {
    if lifetime <= 0.0 {
        return 0.0;
    }
    if discount_rate == 0.0 {
        return 1.0 / lifetime;
    }

    discount_rate / (1.0 - (1.0 + discount_rate).powf(-lifetime))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, costs_config};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 0.05, 0.0)] // Edge case: lifetime==0
    #[case(10.0, 0.0, 0.1)] // Other edge case: discount_rate==0
    #[case(10.0, 0.05, 0.1295045749654567)]
    #[case(5.0, 0.03, 0.2183545714005762)]
    fn test_annuity(#[case] lifetime: f64, #[case] discount_rate: f64, #[case] expected: f64) {
        assert_approx_eq!(f64, annuity(lifetime, discount_rate), expected, epsilon = 1e-10);
    }

    fn record(technology: &str, parameter: &str, value: f64, unit: &str) -> CostRecord {
        CostRecord {
            technology: technology.to_string(),
            parameter: parameter.to_string(),
            value,
            unit: unit.to_string(),
        }
    }

    #[test]
    fn test_from_records() {
        let records = vec![
            record("electrolysis", "investment", 350.0, "EUR/kWel"),
            record("electrolysis", "lifetime", 18.0, "years"),
            record("electrolysis", "FOM", 4.0, "%/year"),
            record("electrolysis", "efficiency", 0.8, "per unit"),
            record("gas", "fuel", 21.6, "EUR/MWhth"),
        ];
        let costs = CostTable::from_records(records, &costs_config(), 1.0);

        // /kW entries are converted to /MW
        assert_approx_eq!(f64, costs.at("electrolysis", "investment").unwrap(), 350e3);
        // defaults are filled for missing parameters
        assert_approx_eq!(f64, costs.at("gas", "CO2 intensity").unwrap(), 0.0);
        assert_approx_eq!(f64, costs.at("gas", "efficiency").unwrap(), 1.0);

        let expected_fixed = (annuity(18.0, 0.07) + 0.04) * 350e3;
        assert_approx_eq!(
            f64,
            costs.at("electrolysis", FIXED).unwrap(),
            expected_fixed,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_missing_lookup_is_an_error() {
        let costs = CostTable::from_records(
            vec![record("gas", "fuel", 21.6, "EUR/MWhth")],
            &costs_config(),
            1.0,
        );
        assert_error!(
            costs.at("unobtainium", "fixed"),
            "No cost data for technology \"unobtainium\""
        );
    }
}
