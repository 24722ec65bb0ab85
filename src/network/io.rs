//! Reading and writing networks as folders of CSV files.
//!
//! Each component class maps to one CSV file (`buses.csv`, `links.csv`, ...)
//! plus one wide CSV file per time-varying attribute that any component of the
//! class carries as a series (`loads-p_set.csv`, `links-efficiency.csv`, ...).
//! Exporting and re-importing a network reproduces the same component names
//! and numeric attributes.
use super::{
    Bus, Carrier, Generator, GlobalConstraint, Line, Link, Load, Network, Sense, StorageUnit,
    Store, TimeVarying,
};
use crate::id::{BusID, CarrierID};
use crate::input::read_series_columns;
use anyhow::{Context, Result, ensure};
use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Timestamp format used for snapshots in CSV files
const SNAPSHOT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Read a network from a folder of CSV files.
///
/// `snapshots.csv` and `buses.csv` are required; any other missing component
/// file simply yields an empty component class.
pub fn import_from_csv_dir(dir: &Path) -> Result<Network> {
    let mut network = Network::new();

    for record in read_records::<RawSnapshot>(&dir.join("snapshots.csv"))?
        .context("Missing snapshots.csv")?
    {
        let snapshot = NaiveDateTime::parse_from_str(&record.snapshot, SNAPSHOT_FORMAT)
            .with_context(|| format!("Invalid snapshot {:?}", record.snapshot))?;
        network.snapshots.push(snapshot);
        network.snapshot_weightings.push(record.weighting);
    }

    if let Some(records) = read_records::<RawCarrier>(&dir.join("carriers.csv"))? {
        for record in records {
            network.add_carrier(
                CarrierID::from(record.name),
                Carrier {
                    co2_emissions: record.co2_emissions,
                },
            )?;
        }
    }

    for record in read_records::<RawBus>(&dir.join("buses.csv"))?.context("Missing buses.csv")? {
        network.add_bus(
            record.name.as_str().into(),
            Bus {
                carrier: CarrierID::from(record.carrier),
                location: record.location,
                country: record.country.filter(|c| !c.is_empty()),
            },
        )?;
    }

    if let Some(records) = read_records::<RawLine>(&dir.join("lines.csv"))? {
        for record in records {
            let (name, line) = record.into_parts();
            network.add_line(name.into(), line)?;
        }
    }

    if let Some(records) = read_records::<RawLink>(&dir.join("links.csv"))? {
        for record in records {
            let (name, link) = record.into_parts();
            network.add_link(name.into(), link)?;
        }
    }

    if let Some(records) = read_records::<RawGenerator>(&dir.join("generators.csv"))? {
        for record in records {
            let (name, generator) = record.into_parts();
            network.add_generator(name.into(), generator)?;
        }
    }

    if let Some(records) = read_records::<RawStorageUnit>(&dir.join("storage_units.csv"))? {
        for record in records {
            let (name, unit) = record.into_parts();
            network.add_storage_unit(name.into(), unit)?;
        }
    }

    if let Some(records) = read_records::<RawStore>(&dir.join("stores.csv"))? {
        for record in records {
            let (name, store) = record.into_parts();
            network.add_store(name.into(), store)?;
        }
    }

    if let Some(records) = read_records::<RawLoad>(&dir.join("loads.csv"))? {
        for record in records {
            let (name, load) = record.into_parts();
            network.add_load(name.into(), load)?;
        }
    }

    if let Some(records) =
        read_records::<RawGlobalConstraint>(&dir.join("global_constraints.csv"))?
    {
        for record in records {
            network.add_global_constraint(
                &record.name,
                GlobalConstraint {
                    carrier_attribute: record.carrier_attribute,
                    sense: record.sense,
                    constant: record.constant,
                },
            )?;
        }
    }

    import_series(&mut network, dir)?;
    network.validate()?;

    Ok(network)
}

/// Write a network to a folder of CSV files, creating the folder if needed.
pub fn export_to_csv_dir(network: &Network, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Could not create output folder {}", dir.display()))?;

    let snapshots: Vec<RawSnapshot> = network
        .snapshots
        .iter()
        .zip(&network.snapshot_weightings)
        .map(|(snapshot, weighting)| RawSnapshot {
            snapshot: snapshot.format(SNAPSHOT_FORMAT).to_string(),
            weighting: *weighting,
        })
        .collect();
    write_records(&dir.join("snapshots.csv"), &snapshots)?;

    write_class(
        &dir.join("carriers.csv"),
        network.carriers.iter().map(|(id, c)| RawCarrier {
            name: id.to_string(),
            co2_emissions: c.co2_emissions,
        }),
    )?;
    write_class(
        &dir.join("buses.csv"),
        network.buses.iter().map(|(id, b)| RawBus {
            name: id.to_string(),
            carrier: b.carrier.to_string(),
            location: b.location.clone(),
            country: b.country.clone(),
        }),
    )?;
    write_class(
        &dir.join("lines.csv"),
        network
            .lines
            .iter()
            .map(|(id, line)| RawLine::from_parts(id.as_str(), line)),
    )?;
    write_class(
        &dir.join("links.csv"),
        network
            .links
            .iter()
            .map(|(id, link)| RawLink::from_parts(id.as_str(), link)),
    )?;
    write_class(
        &dir.join("generators.csv"),
        network
            .generators
            .iter()
            .map(|(id, g)| RawGenerator::from_parts(id.as_str(), g)),
    )?;
    write_class(
        &dir.join("storage_units.csv"),
        network
            .storage_units
            .iter()
            .map(|(id, u)| RawStorageUnit::from_parts(id.as_str(), u)),
    )?;
    write_class(
        &dir.join("stores.csv"),
        network
            .stores
            .iter()
            .map(|(id, s)| RawStore::from_parts(id.as_str(), s)),
    )?;
    write_class(
        &dir.join("loads.csv"),
        network
            .loads
            .iter()
            .map(|(id, l)| RawLoad::from_parts(id.as_str(), l)),
    )?;
    write_class(
        &dir.join("global_constraints.csv"),
        network
            .global_constraints
            .iter()
            .map(|(name, c)| RawGlobalConstraint {
                name: name.clone(),
                carrier_attribute: c.carrier_attribute.clone(),
                sense: c.sense,
                constant: c.constant,
            }),
    )?;

    export_series(network, dir)?;

    Ok(())
}

/// Read the CSV file into records, or `None` if the file does not exist
fn read_records<T: DeserializeOwned>(file_path: &Path) -> Result<Option<Vec<T>>> {
    if !file_path.is_file() {
        return Ok(None);
    }

    crate::input::read_csv_allow_empty(file_path).map(Some)
}

fn write_records<T: Serialize>(file_path: &Path, records: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)
        .with_context(|| format!("Could not write {}", file_path.display()))?;
    for record in records {
        writer
            .serialize(record)
            .with_context(|| format!("Could not write {}", file_path.display()))?;
    }
    writer.flush()?;

    Ok(())
}

/// Write a component class file, skipping empty classes
fn write_class<T: Serialize>(file_path: &Path, records: impl Iterator<Item = T>) -> Result<()> {
    let records: Vec<T> = records.collect();
    if records.is_empty() {
        return Ok(());
    }

    write_records(file_path, &records)
}

/// Attach per-snapshot series from the wide `<class>-<attr>.csv` files
fn import_series(network: &mut Network, dir: &Path) -> Result<()> {
    let n_snapshots = network.snapshots.len();

    macro_rules! import_attr {
        ($file:literal, $get_mut:ident, $attr:ident) => {
            let file_path = dir.join($file);
            if file_path.is_file() {
                for (name, values) in read_series_columns(&file_path)? {
                    ensure!(
                        values.len() == n_snapshots,
                        "Series for {} in {} does not match the snapshots",
                        name,
                        $file
                    );
                    network.$get_mut(&name)?.$attr = TimeVarying::Series(values);
                }
            }
        };
    }

    import_attr!("loads-p_set.csv", load_mut, p_set);
    import_attr!("generators-p_max_pu.csv", generator_mut, p_max_pu);
    import_attr!("generators-p_min_pu.csv", generator_mut, p_min_pu);
    import_attr!("links-efficiency.csv", link_mut, efficiency);
    import_attr!("links-p_max_pu.csv", link_mut, p_max_pu);
    import_attr!("links-p_min_pu.csv", link_mut, p_min_pu);
    import_attr!("stores-e_min_pu.csv", store_mut, e_min_pu);
    import_attr!("stores-e_max_pu.csv", store_mut, e_max_pu);

    Ok(())
}

/// Write the wide series files for every attribute held as a series
fn export_series(network: &Network, dir: &Path) -> Result<()> {
    macro_rules! export_attr {
        ($file:literal, $field:ident, $attr:ident) => {
            let columns: Vec<(&str, &[f64])> = network
                .$field
                .iter()
                .filter_map(|(id, component)| match &component.$attr {
                    TimeVarying::Series(values) => Some((id.as_str(), values.as_slice())),
                    TimeVarying::Static(_) => None,
                })
                .collect();
            write_series_file(&dir.join($file), &network.snapshots, &columns)?;
        };
    }

    export_attr!("loads-p_set.csv", loads, p_set);
    export_attr!("generators-p_max_pu.csv", generators, p_max_pu);
    export_attr!("generators-p_min_pu.csv", generators, p_min_pu);
    export_attr!("links-efficiency.csv", links, efficiency);
    export_attr!("links-p_max_pu.csv", links, p_max_pu);
    export_attr!("links-p_min_pu.csv", links, p_min_pu);
    export_attr!("stores-e_min_pu.csv", stores, e_min_pu);
    export_attr!("stores-e_max_pu.csv", stores, e_max_pu);

    Ok(())
}

fn write_series_file(
    file_path: &Path,
    snapshots: &[NaiveDateTime],
    columns: &[(&str, &[f64])],
) -> Result<()> {
    if columns.is_empty() {
        return Ok(());
    }

    let mut writer = csv::Writer::from_path(file_path)
        .with_context(|| format!("Could not write {}", file_path.display()))?;
    let mut header = vec!["snapshot".to_string()];
    header.extend(columns.iter().map(|(name, _)| (*name).to_string()));
    writer.write_record(&header)?;

    for (i, snapshot) in snapshots.iter().enumerate() {
        let mut row = vec![snapshot.format(SNAPSHOT_FORMAT).to_string()];
        row.extend(columns.iter().map(|(_, values)| values[i].to_string()));
        writer.write_record(&row)?;
    }
    writer.flush()?;

    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct RawSnapshot {
    snapshot: String,
    weighting: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawCarrier {
    name: String,
    #[serde(default)]
    co2_emissions: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawBus {
    name: String,
    carrier: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawLine {
    name: String,
    bus0: String,
    bus1: String,
    length: f64,
    s_nom: f64,
    s_nom_min: f64,
    s_nom_max: f64,
    s_nom_extendable: bool,
    s_max_pu: f64,
    capital_cost: f64,
}

impl RawLine {
    fn from_parts(name: &str, line: &Line) -> Self {
        RawLine {
            name: name.to_string(),
            bus0: line.bus0.to_string(),
            bus1: line.bus1.to_string(),
            length: line.length,
            s_nom: line.s_nom,
            s_nom_min: line.s_nom_min,
            s_nom_max: line.s_nom_max,
            s_nom_extendable: line.s_nom_extendable,
            s_max_pu: line.s_max_pu,
            capital_cost: line.capital_cost,
        }
    }

    fn into_parts(self) -> (String, Line) {
        let line = Line {
            bus0: BusID::from(self.bus0),
            bus1: BusID::from(self.bus1),
            length: self.length,
            s_nom: self.s_nom,
            s_nom_min: self.s_nom_min,
            s_nom_max: self.s_nom_max,
            s_nom_extendable: self.s_nom_extendable,
            s_max_pu: self.s_max_pu,
            capital_cost: self.capital_cost,
        };
        (self.name, line)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RawLink {
    name: String,
    bus0: String,
    bus1: String,
    bus2: Option<String>,
    bus3: Option<String>,
    bus4: Option<String>,
    carrier: String,
    efficiency: f64,
    efficiency2: f64,
    efficiency3: f64,
    efficiency4: f64,
    p_nom: f64,
    p_nom_min: f64,
    p_nom_max: f64,
    p_nom_extendable: bool,
    p_min_pu: f64,
    p_max_pu: f64,
    capital_cost: f64,
    marginal_cost: f64,
    length: f64,
    lifetime: f64,
}

impl RawLink {
    fn from_parts(name: &str, link: &Link) -> Self {
        RawLink {
            name: name.to_string(),
            bus0: link.bus0.to_string(),
            bus1: link.bus1.to_string(),
            bus2: link.bus2.as_ref().map(ToString::to_string),
            bus3: link.bus3.as_ref().map(ToString::to_string),
            bus4: link.bus4.as_ref().map(ToString::to_string),
            carrier: link.carrier.to_string(),
            // Series values live in the wide files; the static column holds
            // the class default in that case
            efficiency: static_or(&link.efficiency, 1.0),
            efficiency2: link.efficiency2,
            efficiency3: link.efficiency3,
            efficiency4: link.efficiency4,
            p_nom: link.p_nom,
            p_nom_min: link.p_nom_min,
            p_nom_max: link.p_nom_max,
            p_nom_extendable: link.p_nom_extendable,
            p_min_pu: static_or(&link.p_min_pu, 0.0),
            p_max_pu: static_or(&link.p_max_pu, 1.0),
            capital_cost: link.capital_cost,
            marginal_cost: link.marginal_cost,
            length: link.length,
            lifetime: link.lifetime,
        }
    }

    fn into_parts(self) -> (String, Link) {
        let link = Link {
            bus0: BusID::from(self.bus0),
            bus1: BusID::from(self.bus1),
            bus2: self.bus2.filter(|b| !b.is_empty()).map(BusID::from),
            bus3: self.bus3.filter(|b| !b.is_empty()).map(BusID::from),
            bus4: self.bus4.filter(|b| !b.is_empty()).map(BusID::from),
            carrier: CarrierID::from(self.carrier),
            efficiency: self.efficiency.into(),
            efficiency2: self.efficiency2,
            efficiency3: self.efficiency3,
            efficiency4: self.efficiency4,
            p_nom: self.p_nom,
            p_nom_min: self.p_nom_min,
            p_nom_max: self.p_nom_max,
            p_nom_extendable: self.p_nom_extendable,
            p_min_pu: self.p_min_pu.into(),
            p_max_pu: self.p_max_pu.into(),
            capital_cost: self.capital_cost,
            marginal_cost: self.marginal_cost,
            length: self.length,
            lifetime: self.lifetime,
        };
        (self.name, link)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RawGenerator {
    name: String,
    bus: String,
    carrier: String,
    p_nom: f64,
    p_nom_extendable: bool,
    p_nom_max: f64,
    p_max_pu: f64,
    p_min_pu: f64,
    capital_cost: f64,
    marginal_cost: f64,
    efficiency: f64,
    lifetime: f64,
}

impl RawGenerator {
    fn from_parts(name: &str, generator: &Generator) -> Self {
        RawGenerator {
            name: name.to_string(),
            bus: generator.bus.to_string(),
            carrier: generator.carrier.to_string(),
            p_nom: generator.p_nom,
            p_nom_extendable: generator.p_nom_extendable,
            p_nom_max: generator.p_nom_max,
            p_max_pu: static_or(&generator.p_max_pu, 1.0),
            p_min_pu: static_or(&generator.p_min_pu, 0.0),
            capital_cost: generator.capital_cost,
            marginal_cost: generator.marginal_cost,
            efficiency: generator.efficiency,
            lifetime: generator.lifetime,
        }
    }

    fn into_parts(self) -> (String, Generator) {
        let generator = Generator {
            bus: BusID::from(self.bus),
            carrier: CarrierID::from(self.carrier),
            p_nom: self.p_nom,
            p_nom_extendable: self.p_nom_extendable,
            p_nom_max: self.p_nom_max,
            p_max_pu: self.p_max_pu.into(),
            p_min_pu: self.p_min_pu.into(),
            capital_cost: self.capital_cost,
            marginal_cost: self.marginal_cost,
            efficiency: self.efficiency,
            lifetime: self.lifetime,
        };
        (self.name, generator)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RawStorageUnit {
    name: String,
    bus: String,
    carrier: String,
    p_nom: f64,
    p_nom_max: f64,
    max_hours: f64,
    capital_cost: f64,
    marginal_cost: f64,
}

impl RawStorageUnit {
    fn from_parts(name: &str, unit: &StorageUnit) -> Self {
        RawStorageUnit {
            name: name.to_string(),
            bus: unit.bus.to_string(),
            carrier: unit.carrier.to_string(),
            p_nom: unit.p_nom,
            p_nom_max: unit.p_nom_max,
            max_hours: unit.max_hours,
            capital_cost: unit.capital_cost,
            marginal_cost: unit.marginal_cost,
        }
    }

    fn into_parts(self) -> (String, StorageUnit) {
        let unit = StorageUnit {
            bus: BusID::from(self.bus),
            carrier: CarrierID::from(self.carrier),
            p_nom: self.p_nom,
            p_nom_max: self.p_nom_max,
            max_hours: self.max_hours,
            capital_cost: self.capital_cost,
            marginal_cost: self.marginal_cost,
        };
        (self.name, unit)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RawStore {
    name: String,
    bus: String,
    carrier: String,
    e_nom: f64,
    e_nom_extendable: bool,
    e_nom_max: f64,
    e_cyclic: bool,
    e_min_pu: f64,
    e_max_pu: f64,
    capital_cost: f64,
    standing_loss: f64,
    lifetime: f64,
}

impl RawStore {
    fn from_parts(name: &str, store: &Store) -> Self {
        RawStore {
            name: name.to_string(),
            bus: store.bus.to_string(),
            carrier: store.carrier.to_string(),
            e_nom: store.e_nom,
            e_nom_extendable: store.e_nom_extendable,
            e_nom_max: store.e_nom_max,
            e_cyclic: store.e_cyclic,
            e_min_pu: static_or(&store.e_min_pu, 0.0),
            e_max_pu: static_or(&store.e_max_pu, 1.0),
            capital_cost: store.capital_cost,
            standing_loss: store.standing_loss,
            lifetime: store.lifetime,
        }
    }

    fn into_parts(self) -> (String, Store) {
        let store = Store {
            bus: BusID::from(self.bus),
            carrier: CarrierID::from(self.carrier),
            e_nom: self.e_nom,
            e_nom_extendable: self.e_nom_extendable,
            e_nom_max: self.e_nom_max,
            e_cyclic: self.e_cyclic,
            e_min_pu: self.e_min_pu.into(),
            e_max_pu: self.e_max_pu.into(),
            capital_cost: self.capital_cost,
            standing_loss: self.standing_loss,
            lifetime: self.lifetime,
        };
        (self.name, store)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RawLoad {
    name: String,
    bus: String,
    carrier: String,
    p_set: f64,
}

impl RawLoad {
    fn from_parts(name: &str, load: &Load) -> Self {
        RawLoad {
            name: name.to_string(),
            bus: load.bus.to_string(),
            carrier: load.carrier.to_string(),
            p_set: static_or(&load.p_set, 0.0),
        }
    }

    fn into_parts(self) -> (String, Load) {
        let load = Load {
            bus: BusID::from(self.bus),
            carrier: CarrierID::from(self.carrier),
            p_set: self.p_set.into(),
        };
        (self.name, load)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RawGlobalConstraint {
    name: String,
    carrier_attribute: String,
    sense: Sense,
    constant: f64,
}

/// The static value of an attribute, or the class default if it is a series
fn static_or(value: &TimeVarying, default: f64) -> f64 {
    match value {
        TimeVarying::Static(v) => *v,
        TimeVarying::Series(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::toy_network;
    use tempfile::tempdir;

    #[test]
    fn test_round_trip() {
        let network = toy_network();
        let dir = tempdir().unwrap();

        export_to_csv_dir(&network, dir.path()).unwrap();
        let imported = import_from_csv_dir(dir.path()).unwrap();

        assert_eq!(network, imported);
    }

    #[test]
    fn test_missing_snapshots_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(import_from_csv_dir(dir.path()).is_err());
    }
}
