//! Parsing of the scenario descriptor mini-language.
//!
//! A scenario descriptor is a `-`-delimited string of option tokens (e.g.
//! `"120h-T-H-B-I-onwind+p3-dist1-cb48be3"`). Each token is parsed exactly once
//! into a [`ScenarioOption`] variant; the pipeline dispatcher then matches on
//! variants instead of re-scanning substrings. Unrecognised tokens are
//! preserved and reported with a warning, but never abort the run.
use anyhow::{Context, Result, bail};
use log::warn;

/// Decay model for a carbon budget trajectory
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecayModel {
    /// Symmetric beta decay with the given shape parameter
    Beta(f64),
    /// Exponential decay with the given rate parameter
    Exponential(f64),
}

/// Attribute targeted by a `<tech>+<p|c><factor>` scaling token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleAttr {
    /// Scale the maximum extendable capacity (`p` tokens)
    PNomMax,
    /// Scale the capital cost (`c` tokens)
    CapitalCost,
}

/// A single parsed scenario option token
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioOption {
    /// Couple land transport (`T`)
    Transport,
    /// Couple heating (`H`)
    Heat,
    /// Couple industry (`I`)
    Industry,
    /// Couple biomass (`B`), optionally with solid biomass import (`B...Im`)
    Biomass {
        /// Whether tiered solid biomass import is enabled
        import: bool,
    },
    /// Remove interconnectors (`decentral`)
    Decentral,
    /// Replace the hydrogen pipeline network with nodal storage (`noH2network`)
    NoH2Network,
    /// Disable district heating (`nodistrict`)
    NoDistrict,
    /// Resample the network to multi-hour snapshots (`<num>h`)
    Resample {
        /// Length of the merged snapshots in hours
        hours: u32,
    },
    /// Carbon budget trajectory (`cb<budget><be|ex><param>`)
    CarbonBudget {
        /// Total remaining budget in GtCO2
        budget: f64,
        /// Decay model fitted to the budget
        model: DecayModel,
    },
    /// Override the CO2 cap as a fraction of base-year emissions (`Co2L<value>`)
    Co2Limit {
        /// Cap as a fraction of base-year emissions
        limit: f64,
    },
    /// Insert an electricity distribution grid (`dist<factor>`)
    DistributionGrid {
        /// Investment cost factor for the distribution grid
        cost_factor: f64,
    },
    /// Add wave energy generators (`wave<factor>`)
    Wave {
        /// Cost factor applied to the wave technology base costs
        cost_factor: f64,
    },
    /// Cap line/link extension headroom in GW (`linemaxext<value>`)
    LineMaxExtension {
        /// Maximum extension in GW
        gigawatts: f64,
    },
    /// CO2 sequestration potential in MtCO2 (`S<value>`)
    SequestrationPotential {
        /// Annual sequestration potential in MtCO2
        megatonnes: f64,
    },
    /// Scale an attribute of every component of a technology (`<tech>+<p|c><factor>`)
    TechScale {
        /// Carrier name prefix selecting the components
        tech: String,
        /// The attribute to scale
        attr: ScaleAttr,
        /// Multiplicative factor
        factor: f64,
    },
    /// A token no consumer recognises; ignored by every stage
    Unknown {
        /// The raw token
        token: String,
    },
}

/// The ordered sequence of options parsed from a scenario descriptor.
///
/// Order and duplicates are preserved. Where the source semantics are "last
/// token wins" (CO2 limit overrides, distribution grid factor, sequestration
/// potential), the accessors below encode that; where every occurrence acts
/// (wave generators, technology scaling), the pipeline iterates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioOptions(Vec<ScenarioOption>);

impl ScenarioOptions {
    /// Parse a `-`-delimited scenario descriptor.
    ///
    /// An empty descriptor yields an empty option sequence, which makes the
    /// dispatcher apply only unconditional stages.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut options = Vec::new();
        for token in descriptor.split('-').filter(|t| !t.is_empty()) {
            let option = parse_token(token)
                .with_context(|| format!("Invalid scenario option token {token:?}"))?;
            if let ScenarioOption::Unknown { token } = &option {
                warn!("Ignoring unrecognised scenario option token {token:?}");
            }
            options.push(option);
        }

        Ok(Self(options))
    }

    /// Iterate over the parsed options in descriptor order
    pub fn iter(&self) -> impl Iterator<Item = &ScenarioOption> {
        self.0.iter()
    }

    /// Whether land transport coupling is requested
    pub fn has_transport(&self) -> bool {
        self.0.contains(&ScenarioOption::Transport)
    }

    /// Whether heat coupling is requested
    pub fn has_heat(&self) -> bool {
        self.0.contains(&ScenarioOption::Heat)
    }

    /// Whether industry coupling is requested
    pub fn has_industry(&self) -> bool {
        self.0.contains(&ScenarioOption::Industry)
    }

    /// Whether biomass coupling is requested
    pub fn has_biomass(&self) -> bool {
        self.iter()
            .any(|o| matches!(o, ScenarioOption::Biomass { .. }))
    }

    /// Whether tiered solid biomass import is requested
    pub fn has_biomass_import(&self) -> bool {
        self.iter()
            .any(|o| matches!(o, ScenarioOption::Biomass { import: true }))
    }

    /// Whether interconnector removal is requested
    pub fn has_decentral(&self) -> bool {
        self.0.contains(&ScenarioOption::Decentral)
    }

    /// Whether hydrogen network removal is requested
    pub fn has_no_h2_network(&self) -> bool {
        self.0.contains(&ScenarioOption::NoH2Network)
    }

    /// Whether district heating is disabled
    pub fn has_no_district(&self) -> bool {
        self.0.contains(&ScenarioOption::NoDistrict)
    }

    /// Snapshot length in hours from the first resampling token, if any
    pub fn resample_hours(&self) -> Option<u32> {
        self.iter().find_map(|o| match o {
            ScenarioOption::Resample { hours } => Some(*hours),
            _ => None,
        })
    }

    /// Budget and decay model from the last carbon budget token, if any
    pub fn carbon_budget(&self) -> Option<(f64, DecayModel)> {
        self.0.iter().rev().find_map(|o| match o {
            ScenarioOption::CarbonBudget { budget, model } => Some((*budget, *model)),
            _ => None,
        })
    }

    /// CO2 cap fraction from the last explicit limit token, if any
    pub fn co2_limit(&self) -> Option<f64> {
        self.0.iter().rev().find_map(|o| match o {
            ScenarioOption::Co2Limit { limit } => Some(*limit),
            _ => None,
        })
    }

    /// Distribution grid cost factor from the last `dist` token, if any
    pub fn distribution_grid_factor(&self) -> Option<f64> {
        self.0.iter().rev().find_map(|o| match o {
            ScenarioOption::DistributionGrid { cost_factor } => Some(*cost_factor),
            _ => None,
        })
    }

    /// Sequestration potential in MtCO2 from the last `S` token, if any
    pub fn sequestration_potential(&self) -> Option<f64> {
        self.0.iter().rev().find_map(|o| match o {
            ScenarioOption::SequestrationPotential { megatonnes } => Some(*megatonnes),
            _ => None,
        })
    }

    /// Maximum line extension in GW from the last `linemaxext` token, if any
    pub fn line_max_extension(&self) -> Option<f64> {
        self.0.iter().rev().find_map(|o| match o {
            ScenarioOption::LineMaxExtension { gigawatts } => Some(*gigawatts),
            _ => None,
        })
    }
}

/// Parse a numeric field in which `p` stands for `.` and `m` for a minus sign
fn parse_factor(s: &str) -> Result<f64> {
    let s = s.replace('p', ".").replace('m', "-");
    s.parse().with_context(|| format!("Invalid number {s:?}"))
}

/// Classify a single option token
fn parse_token(token: &str) -> Result<ScenarioOption> {
    // Bare flags
    match token {
        "T" => return Ok(ScenarioOption::Transport),
        "H" => return Ok(ScenarioOption::Heat),
        "I" => return Ok(ScenarioOption::Industry),
        "B" => return Ok(ScenarioOption::Biomass { import: false }),
        "decentral" => return Ok(ScenarioOption::Decentral),
        "noH2network" => return Ok(ScenarioOption::NoH2Network),
        "nodistrict" => return Ok(ScenarioOption::NoDistrict),
        _ => {}
    }

    // Biomass with import suffix
    if token.starts_with('B') && token.ends_with("Im") {
        return Ok(ScenarioOption::Biomass { import: true });
    }

    // Temporal resampling, e.g. "3h" or "120H"
    if let Some(hours) = token
        .strip_suffix(['h', 'H'])
        .and_then(|h| h.parse().ok())
    {
        return Ok(ScenarioOption::Resample { hours });
    }

    if let Some(rest) = token.strip_prefix("cb") {
        // When both model markers appear, the exponential branch wins
        if let Some(pos) = rest.find("ex") {
            let budget = rest[..pos].parse().context("Invalid carbon budget")?;
            let rate = rest[pos + 2..].parse().context("Invalid decay rate")?;
            return Ok(ScenarioOption::CarbonBudget {
                budget,
                model: DecayModel::Exponential(rate),
            });
        }
        if let Some(pos) = rest.find("be") {
            let budget = rest[..pos].parse().context("Invalid carbon budget")?;
            let beta = rest[pos + 2..].parse().context("Invalid beta parameter")?;
            return Ok(ScenarioOption::CarbonBudget {
                budget,
                model: DecayModel::Beta(beta),
            });
        }
        bail!("Carbon budget token specifies neither a beta (be) nor an exponential (ex) decay");
    }

    if let Some(rest) = token.strip_prefix("Co2L") {
        return Ok(ScenarioOption::Co2Limit {
            limit: parse_factor(rest)?,
        });
    }

    if let Some(rest) = token.strip_prefix("dist") {
        return Ok(ScenarioOption::DistributionGrid {
            cost_factor: parse_factor(rest)?,
        });
    }

    if let Some(rest) = token.strip_prefix("wave") {
        return Ok(ScenarioOption::Wave {
            cost_factor: parse_factor(rest)?,
        });
    }

    if let Some(rest) = token.strip_prefix("linemaxext") {
        return Ok(ScenarioOption::LineMaxExtension {
            gigawatts: rest.parse().context("Invalid line extension limit")?,
        });
    }

    // Sequestration potential, e.g. "S400"
    if let Some(megatonnes) = token.strip_prefix('S').and_then(|s| s.parse().ok()) {
        return Ok(ScenarioOption::SequestrationPotential { megatonnes });
    }

    // Technology scaling, e.g. "onwind+p3" or "solar+c0p5"
    if let Some((tech, scaling)) = token.split_once('+') {
        let attr = match scaling.chars().next() {
            Some('p') => ScaleAttr::PNomMax,
            Some('c') => ScaleAttr::CapitalCost,
            _ => bail!("Technology scaling must target p (capacity) or c (cost)"),
        };
        return Ok(ScenarioOption::TechScale {
            tech: tech.to_string(),
            attr,
            factor: parse_factor(&scaling[1..])?,
        });
    }

    Ok(ScenarioOption::Unknown {
        token: token.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use rstest::rstest;

    #[rstest]
    #[case("T", ScenarioOption::Transport)]
    #[case("H", ScenarioOption::Heat)]
    #[case("I", ScenarioOption::Industry)]
    #[case("B", ScenarioOption::Biomass { import: false })]
    #[case("B3p0Im", ScenarioOption::Biomass { import: true })]
    #[case("decentral", ScenarioOption::Decentral)]
    #[case("noH2network", ScenarioOption::NoH2Network)]
    #[case("nodistrict", ScenarioOption::NoDistrict)]
    #[case("3h", ScenarioOption::Resample { hours: 3 })]
    #[case("120H", ScenarioOption::Resample { hours: 120 })]
    #[case(
        "cb48be3",
        ScenarioOption::CarbonBudget { budget: 48.0, model: DecayModel::Beta(3.0) }
    )]
    #[case(
        "cb25ex0",
        ScenarioOption::CarbonBudget { budget: 25.0, model: DecayModel::Exponential(0.0) }
    )]
    #[case("Co2L0p2", ScenarioOption::Co2Limit { limit: 0.2 })]
    #[case("Co2L0.05", ScenarioOption::Co2Limit { limit: 0.05 })]
    #[case("Co2Lm0p1", ScenarioOption::Co2Limit { limit: -0.1 })]
    #[case("dist1", ScenarioOption::DistributionGrid { cost_factor: 1.0 })]
    #[case("dist0p5", ScenarioOption::DistributionGrid { cost_factor: 0.5 })]
    #[case("wave2", ScenarioOption::Wave { cost_factor: 2.0 })]
    #[case("linemaxext10", ScenarioOption::LineMaxExtension { gigawatts: 10.0 })]
    #[case("S400", ScenarioOption::SequestrationPotential { megatonnes: 400.0 })]
    #[case(
        "onwind+p3",
        ScenarioOption::TechScale {
            tech: "onwind".to_string(),
            attr: ScaleAttr::PNomMax,
            factor: 3.0,
        }
    )]
    #[case(
        "solar+c0p5",
        ScenarioOption::TechScale {
            tech: "solar".to_string(),
            attr: ScaleAttr::CapitalCost,
            factor: 0.5,
        }
    )]
    #[case("mystery", ScenarioOption::Unknown { token: "mystery".to_string() })]
    fn test_parse_token(#[case] token: &str, #[case] expected: ScenarioOption) {
        assert_eq!(parse_token(token).unwrap(), expected);
    }

    #[test]
    fn test_parse_preserves_order_and_duplicates() {
        let options = ScenarioOptions::parse("T-T-H").unwrap();
        let parsed: Vec<_> = options.iter().cloned().collect();
        assert_eq!(
            parsed,
            vec![
                ScenarioOption::Transport,
                ScenarioOption::Transport,
                ScenarioOption::Heat
            ]
        );
    }

    #[test]
    fn test_parse_empty_descriptor() {
        let options = ScenarioOptions::parse("").unwrap();
        assert_eq!(options.iter().count(), 0);
    }

    #[test]
    fn test_carbon_budget_without_model_is_an_error() {
        assert_error!(
            ScenarioOptions::parse("cb48"),
            "Invalid scenario option token \"cb48\""
        );
    }

    #[test]
    fn test_last_co2_limit_wins() {
        let options = ScenarioOptions::parse("Co2L0p5-Co2L0p2").unwrap();
        assert_eq!(options.co2_limit(), Some(0.2));
    }

    #[test]
    fn test_resample_first_match_wins() {
        let options = ScenarioOptions::parse("3h-6h").unwrap();
        assert_eq!(options.resample_hours(), Some(3));
    }

    #[test]
    fn test_full_descriptor() {
        let options = ScenarioOptions::parse("120h-T-H-B-I-onwind+p3-dist1-cb48be3").unwrap();
        assert!(options.has_transport());
        assert!(options.has_heat());
        assert!(options.has_industry());
        assert!(options.has_biomass());
        assert!(!options.has_biomass_import());
        assert_eq!(options.resample_hours(), Some(120));
        assert_eq!(options.distribution_grid_factor(), Some(1.0));
        assert_eq!(
            options.carbon_budget(),
            Some((48.0, DecayModel::Beta(3.0)))
        );
    }
}
