//! Parameters that may depend on the investment year.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// A scenario parameter that is either a flat scalar or a year-keyed mapping.
///
/// Year-keyed parameters must contain the requested investment year; a missing
/// year aborts the pipeline rather than silently defaulting, since a silent
/// default would corrupt cost and demand assumptions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawYearValue")]
pub enum YearValue {
    /// The same value applies to every investment year
    Flat(f64),
    /// A separate value per investment year
    ByYear(BTreeMap<u32, f64>),
}

impl YearValue {
    /// Resolve the parameter for the given investment year
    pub fn resolve(&self, year: u32) -> Result<f64> {
        match self {
            YearValue::Flat(value) => Ok(*value),
            YearValue::ByYear(map) => map
                .get(&year)
                .copied()
                .with_context(|| format!("Parameter has no value for investment year {year}")),
        }
    }
}

impl From<f64> for YearValue {
    fn from(value: f64) -> Self {
        YearValue::Flat(value)
    }
}

/// Serde representation: TOML map keys arrive as strings
#[derive(Deserialize)]
#[serde(untagged)]
enum RawYearValue {
    Flat(f64),
    ByYear(BTreeMap<String, f64>),
}

impl TryFrom<RawYearValue> for YearValue {
    type Error = String;

    fn try_from(raw: RawYearValue) -> Result<Self, Self::Error> {
        match raw {
            RawYearValue::Flat(value) => Ok(YearValue::Flat(value)),
            RawYearValue::ByYear(map) => {
                let mut parsed = BTreeMap::new();
                for (key, value) in map {
                    let year: u32 = key
                        .parse()
                        .map_err(|_| format!("Invalid year key: {key}"))?;
                    parsed.insert(year, value);
                }
                Ok(YearValue::ByYear(parsed))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use rstest::rstest;

    #[rstest]
    #[case(2020)]
    #[case(2050)]
    fn test_resolve_flat_any_year(#[case] year: u32) {
        // A flat scalar resolves to itself for every investment year
        assert_eq!(YearValue::Flat(0.45).resolve(year).unwrap(), 0.45);
    }

    #[test]
    fn test_resolve_by_year() {
        let value: YearValue = toml::from_str::<BTreeMap<String, YearValue>>(
            "limit = { 2030 = 0.45, 2040 = 0.1 }",
        )
        .unwrap()
        .remove("limit")
        .unwrap();

        assert_eq!(value.resolve(2030).unwrap(), 0.45);
        assert_eq!(value.resolve(2040).unwrap(), 0.1);
        assert_error!(
            value.resolve(2050),
            "Parameter has no value for investment year 2050"
        );
    }

    #[test]
    fn test_invalid_year_key() {
        let result = toml::from_str::<BTreeMap<String, YearValue>>("limit = { x = 0.45 }");
        assert!(result.is_err());
    }
}
