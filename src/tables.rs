//! Auxiliary read-only input tables consumed by the mutation functions.
//!
//! National tables (energy totals, biomass potentials, transport data) are
//! keyed by country and distributed to nodes by population fraction; nodal
//! tables (industrial demand) are keyed by node. Per-node time series arrive
//! as prepared wide CSV profiles under `profiles/`; weather processing happens
//! upstream of this tool.
use crate::config::Config;
use crate::id::BusID;
use crate::input::read_series_columns;
use crate::layout::PopulationLayout;
use crate::options::{ScenarioOption, ScenarioOptions};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use std::path::Path;

/// A wide CSV table of numeric columns keyed by its first column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WideTable {
    columns: Vec<String>,
    rows: IndexMap<String, Vec<f64>>,
}

impl WideTable {
    /// Read a wide table from a CSV file.
    pub fn from_path(file_path: &Path) -> Result<WideTable> {
        let mut reader = csv::Reader::from_path(file_path)
            .with_context(|| format!("Error reading {}", file_path.display()))?;

        let columns: Vec<String> = reader
            .headers()
            .with_context(|| format!("Error reading {}", file_path.display()))?
            .iter()
            .skip(1)
            .map(String::from)
            .collect();

        let mut rows = IndexMap::new();
        for record in reader.records() {
            let record =
                record.with_context(|| format!("Error reading {}", file_path.display()))?;
            ensure!(
                record.len() == columns.len() + 1,
                "Ragged row in {}",
                file_path.display()
            );
            let key = record[0].to_string();
            let values: Vec<f64> = record
                .iter()
                .skip(1)
                .map(|field| {
                    // Empty fields mean "not applicable", e.g. countries
                    // without salt cavern potential
                    let field = field.trim();
                    if field.is_empty() {
                        Ok(f64::NAN)
                    } else {
                        field.parse().with_context(|| {
                            format!("Invalid value {:?} in {}", field, file_path.display())
                        })
                    }
                })
                .collect::<Result<_>>()?;
            rows.insert(key, values);
        }
        ensure!(!rows.is_empty(), "{} cannot be empty", file_path.display());

        Ok(WideTable { columns, rows })
    }

    /// Scale every value by a factor (e.g. TWh to MWh)
    pub fn scale(mut self, factor: f64) -> WideTable {
        for values in self.rows.values_mut() {
            for value in values {
                *value *= factor;
            }
        }
        self
    }

    /// Whether the table has a row for the given key
    pub fn has_row(&self, key: &str) -> bool {
        self.rows.contains_key(key)
    }

    /// The row keys, in file order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    /// Look up a single value, failing on a missing row or column
    pub fn at(&self, key: &str, column: &str) -> Result<f64> {
        let row = self
            .rows
            .get(key)
            .with_context(|| format!("No row {key:?} in table"))?;
        let index = self
            .columns
            .iter()
            .position(|c| c == column)
            .with_context(|| format!("No column {column:?} in table"))?;

        Ok(row[index])
    }

    /// Look up a value that may legitimately be absent (missing row or NaN)
    pub fn at_optional(&self, key: &str, column: &str) -> Option<f64> {
        let value = self.at(key, column).ok()?;
        (!value.is_nan()).then_some(value)
    }

    /// A national value distributed to a node by its population fraction
    pub fn nodal(&self, layout: &PopulationLayout, node: &BusID, column: &str) -> Result<f64> {
        let entry = layout.get(node)?;
        let value = self.at(&entry.country, column)?;

        Ok(value * entry.fraction)
    }

    /// Sum a column over all of the given keys
    pub fn column_sum<'a>(
        &self,
        keys: impl Iterator<Item = &'a str>,
        column: &str,
    ) -> Result<f64> {
        let mut total = 0.0;
        for key in keys {
            total += self.at(key, column)?;
        }

        Ok(total)
    }
}

/// A table of per-node time series aligned to the network snapshots
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesTable(IndexMap<String, Vec<f64>>);

impl SeriesTable {
    /// Read a series table, checking alignment with the snapshot count.
    pub fn from_path(file_path: &Path, n_snapshots: usize) -> Result<SeriesTable> {
        let columns = read_series_columns(file_path)?;
        for (name, values) in &columns {
            ensure!(
                values.len() == n_snapshots,
                "Series for {} in {} has {} values for {} snapshots",
                name,
                file_path.display(),
                values.len(),
                n_snapshots
            );
        }

        Ok(SeriesTable(columns))
    }

    /// The series for the given column
    pub fn get(&self, name: &str) -> Result<&[f64]> {
        self.0
            .get(name)
            .map(Vec::as_slice)
            .with_context(|| format!("No series for {name:?}"))
    }

    /// The column names, in file order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Scale every series by a factor
    pub fn scale(mut self, factor: f64) -> SeriesTable {
        for values in self.0.values_mut() {
            for value in values {
                *value *= factor;
            }
        }
        self
    }

    /// Element-wise sum of the series for the given columns
    pub fn sum_of<'a>(&self, names: impl Iterator<Item = &'a str>) -> Result<Vec<f64>> {
        let mut total: Option<Vec<f64>> = None;
        for name in names {
            let series = self.get(name)?;
            match &mut total {
                None => total = Some(series.to_vec()),
                Some(total) => {
                    for (t, v) in total.iter_mut().zip(series) {
                        *t += v;
                    }
                }
            }
        }

        total.context("No series to sum")
    }
}

/// The static national and nodal input tables
#[derive(Debug, Clone, Default)]
pub struct Tables {
    /// Historical CO2 emissions per country and sector, in MtCO2
    pub co2_totals: WideTable,
    /// Annual energy totals per country, in TWh
    energy_totals: Option<WideTable>,
    /// Vehicle stock data per country
    transport_data: Option<WideTable>,
    /// Biomass potentials per country and type, in MWh
    biomass_potentials: Option<WideTable>,
    /// Industrial energy demand per node, in MWh
    industrial_demand: Option<WideTable>,
    /// Hydrogen salt cavern potential per country, in TWh
    h2_caverns: Option<WideTable>,
    /// Solid biomass transport costs per country, in EUR/tkm
    biomass_transport_costs: Option<WideTable>,
}

impl Tables {
    /// Load the tables required by the scenario from the model directory.
    pub fn load(model_dir: &Path, config: &Config, options: &ScenarioOptions) -> Result<Tables> {
        let mut tables = Tables {
            co2_totals: WideTable::from_path(&model_dir.join("co2_totals.csv"))?,
            ..Tables::default()
        };

        if options.has_industry() {
            tables.energy_totals =
                Some(WideTable::from_path(&model_dir.join("energy_totals.csv"))?);
            // 1e6 converts TWh to MWh
            tables.industrial_demand = Some(
                WideTable::from_path(&model_dir.join("industrial_demand.csv"))?.scale(1e6),
            );
        }
        if options.has_transport() {
            tables.transport_data =
                Some(WideTable::from_path(&model_dir.join("transport_data.csv"))?);
        }
        if options.has_biomass() {
            tables.biomass_potentials =
                Some(WideTable::from_path(&model_dir.join("biomass_potentials.csv"))?);
            if config.sector.biomass_transport {
                tables.biomass_transport_costs = Some(WideTable::from_path(
                    &model_dir.join("biomass_transport_costs.csv"),
                )?);
            }
        }
        if config.sector.hydrogen_underground_storage {
            tables.h2_caverns = Some(WideTable::from_path(
                &model_dir.join("h2_salt_cavern_potentials.csv"),
            )?);
        }

        Ok(tables)
    }

    /// Annual energy totals (requires the industry option)
    pub fn energy_totals(&self) -> Result<&WideTable> {
        self.energy_totals
            .as_ref()
            .context("energy_totals.csv not loaded")
    }

    /// Vehicle stock data (requires the transport option)
    pub fn transport_data(&self) -> Result<&WideTable> {
        self.transport_data
            .as_ref()
            .context("transport_data.csv not loaded")
    }

    /// Biomass potentials (requires the biomass option)
    pub fn biomass_potentials(&self) -> Result<&WideTable> {
        self.biomass_potentials
            .as_ref()
            .context("biomass_potentials.csv not loaded")
    }

    /// Industrial demand (requires the industry option)
    pub fn industrial_demand(&self) -> Result<&WideTable> {
        self.industrial_demand
            .as_ref()
            .context("industrial_demand.csv not loaded")
    }

    /// Salt cavern potentials (requires hydrogen underground storage)
    pub fn h2_caverns(&self) -> Result<&WideTable> {
        self.h2_caverns
            .as_ref()
            .context("h2_salt_cavern_potentials.csv not loaded")
    }

    /// Biomass transport costs (requires biomass transport)
    pub fn biomass_transport_costs(&self) -> Result<&WideTable> {
        self.biomass_transport_costs
            .as_ref()
            .context("biomass_transport_costs.csv not loaded")
    }
}

/// Prepared per-node demand and availability profiles
#[derive(Debug, Clone, Default)]
pub struct Profiles {
    /// Heat demand per heat sector and use, in MW
    heat_demand: IndexMap<String, SeriesTable>,
    /// Electric heating already contained in the electricity load, in MW
    electric_heat_supply: Option<SeriesTable>,
    /// Air-sourced heat pump coefficient of performance
    cop_air: Option<SeriesTable>,
    /// Ground-sourced heat pump coefficient of performance
    cop_soil: Option<SeriesTable>,
    /// Solar thermal collector availability per unit
    solar_thermal: Option<SeriesTable>,
    /// Land transport demand, in MW
    transport: Option<SeriesTable>,
    /// Fraction of EVs plugged in
    ev_availability: Option<SeriesTable>,
    /// Minimum EV battery state of charge under demand-side management
    ev_dsm: Option<SeriesTable>,
    /// Wave generation availability per technology
    wave: Option<SeriesTable>,
}

impl Profiles {
    /// Load the profiles required by the scenario from `profiles/`.
    ///
    /// The land transport profile is scaled by the year-resolved
    /// `land_transport_demand` parameter at load time.
    pub fn load(
        model_dir: &Path,
        config: &Config,
        options: &ScenarioOptions,
        n_snapshots: usize,
    ) -> Result<Profiles> {
        let dir = model_dir.join("profiles");
        let read = |name: &str| SeriesTable::from_path(&dir.join(name), n_snapshots);

        let mut profiles = Profiles::default();
        if options.has_heat() {
            for sector in ["residential", "services"] {
                for use_ in ["water", "space"] {
                    profiles.heat_demand.insert(
                        format!("{sector} {use_}"),
                        read(&format!("heat_demand_{sector}_{use_}.csv"))?,
                    );
                }
            }
            profiles.electric_heat_supply = Some(read("electric_heat_supply.csv")?);
            profiles.cop_air = Some(read("cop_air.csv")?);
            profiles.cop_soil = Some(read("cop_soil.csv")?);
            if config.sector.solar_thermal {
                profiles.solar_thermal = Some(read("solar_thermal.csv")?);
            }
        }

        if options.has_transport() {
            let demand_factor = config
                .sector
                .land_transport_demand
                .resolve(config.scenario.investment_year)
                .context("Could not resolve land transport demand")?;
            profiles.transport = Some(read("transport_demand.csv")?.scale(demand_factor));
            profiles.ev_availability = Some(read("ev_availability.csv")?);
            profiles.ev_dsm = Some(read("ev_dsm.csv")?);
        }

        if options
            .iter()
            .any(|o| matches!(o, ScenarioOption::Wave { .. }))
        {
            profiles.wave = Some(read("wave.csv")?);
        }

        Ok(profiles)
    }

    /// Heat demand for a heat sector/use pair, e.g. `"residential space"`
    pub fn heat_demand(&self, sector_use: &str) -> Result<&SeriesTable> {
        self.heat_demand
            .get(sector_use)
            .with_context(|| format!("Heat demand profile {sector_use:?} not loaded"))
    }

    /// Heat demand table keys, e.g. `"residential space"`
    pub fn heat_demand_keys(&self) -> impl Iterator<Item = &str> {
        self.heat_demand.keys().map(String::as_str)
    }

    /// Electric heating supply profile (requires the heat option)
    pub fn electric_heat_supply(&self) -> Result<&SeriesTable> {
        self.electric_heat_supply
            .as_ref()
            .context("electric_heat_supply.csv not loaded")
    }

    /// Air-sourced heat pump COP (requires the heat option)
    pub fn cop_air(&self) -> Result<&SeriesTable> {
        self.cop_air.as_ref().context("cop_air.csv not loaded")
    }

    /// Ground-sourced heat pump COP (requires the heat option)
    pub fn cop_soil(&self) -> Result<&SeriesTable> {
        self.cop_soil.as_ref().context("cop_soil.csv not loaded")
    }

    /// Solar thermal availability (requires solar thermal collectors)
    pub fn solar_thermal(&self) -> Result<&SeriesTable> {
        self.solar_thermal
            .as_ref()
            .context("solar_thermal.csv not loaded")
    }

    /// Land transport demand (requires the transport option)
    pub fn transport(&self) -> Result<&SeriesTable> {
        self.transport
            .as_ref()
            .context("transport_demand.csv not loaded")
    }

    /// EV availability (requires the transport option)
    pub fn ev_availability(&self) -> Result<&SeriesTable> {
        self.ev_availability
            .as_ref()
            .context("ev_availability.csv not loaded")
    }

    /// EV DSM minimum state of charge (requires the transport option)
    pub fn ev_dsm(&self) -> Result<&SeriesTable> {
        self.ev_dsm.as_ref().context("ev_dsm.csv not loaded")
    }

    /// Wave generation availability (requires a wave token)
    pub fn wave(&self) -> Result<&SeriesTable> {
        self.wave.as_ref().context("wave.csv not loaded")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_wide_table() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("table.csv");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "country,alpha,beta").unwrap();
            writeln!(file, "DE,1.0,2.0").unwrap();
            writeln!(file, "ES,3.0,").unwrap();
        }

        let table = WideTable::from_path(&file_path).unwrap();
        assert_eq!(table.at("DE", "alpha").unwrap(), 1.0);
        assert_eq!(table.at_optional("ES", "beta"), None);
        assert_eq!(table.at_optional("FR", "alpha"), None);
        assert!(table.at("DE", "gamma").is_err());
        assert_eq!(
            table.column_sum(["DE", "ES"].into_iter(), "alpha").unwrap(),
            4.0
        );
    }

    #[test]
    fn test_series_table_alignment() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("profile.csv");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "snapshot,DE0 0").unwrap();
            writeln!(file, "t0,1.0").unwrap();
            writeln!(file, "t1,2.0").unwrap();
        }

        assert!(SeriesTable::from_path(&file_path, 2).is_ok());
        assert!(SeriesTable::from_path(&file_path, 3).is_err());
    }

    #[test]
    fn test_series_table_sum_of() {
        let mut table = SeriesTable::default();
        table.0.insert("a".to_string(), vec![1.0, 2.0]);
        table.0.insert("b".to_string(), vec![10.0, 20.0]);

        assert_eq!(
            table.sum_of(["a", "b"].into_iter()).unwrap(),
            vec![11.0, 22.0]
        );
    }
}
