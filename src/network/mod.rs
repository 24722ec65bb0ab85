//! The mutable sector-coupled network model.
//!
//! A [`Network`] is a graph of buses (location/energy-carrier pairs) to which
//! links, generators, stores and loads attach. Mutation functions grow the
//! network in place; consistency rests on two invariants enforced here rather
//! than by the callers:
//!
//! * every component must reference buses that already exist when it is added
//!   (a missing bus is a referential error that aborts the pipeline);
//! * component names are unique within their class (re-adding a name is an
//!   error, so accidentally applying a mutation twice fails loudly).
use crate::id::{
    BusID, CarrierID, GeneratorID, LineID, LinkID, LoadID, StorageUnitID, StoreID,
};
use anyhow::{Context, Result, bail, ensure};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};

pub mod io;
pub mod resample;
pub mod topology;

/// An attribute that is either static or varies per snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum TimeVarying {
    /// The same value in every snapshot
    Static(f64),
    /// One value per snapshot
    Series(Vec<f64>),
}

impl TimeVarying {
    /// The static value, or an error if the attribute is a series
    pub fn static_value(&self) -> Result<f64> {
        match self {
            TimeVarying::Static(value) => Ok(*value),
            TimeVarying::Series(_) => bail!("Expected a static value, found a series"),
        }
    }

    /// The value at the given snapshot index
    pub fn at(&self, snapshot: usize) -> f64 {
        match self {
            TimeVarying::Static(value) => *value,
            TimeVarying::Series(values) => values[snapshot],
        }
    }

    /// The series length, if the attribute is a series
    pub fn series_len(&self) -> Option<usize> {
        match self {
            TimeVarying::Static(_) => None,
            TimeVarying::Series(values) => Some(values.len()),
        }
    }

    /// Apply a function to every snapshot value (no-op for static values)
    pub fn map_series(&mut self, f: impl FnMut(&mut f64)) {
        if let TimeVarying::Series(values) = self {
            values.iter_mut().for_each(f);
        }
    }
}

impl Default for TimeVarying {
    fn default() -> Self {
        TimeVarying::Static(0.0)
    }
}

impl From<f64> for TimeVarying {
    fn from(value: f64) -> Self {
        TimeVarying::Static(value)
    }
}

impl From<Vec<f64>> for TimeVarying {
    fn from(values: Vec<f64>) -> Self {
        TimeVarying::Series(values)
    }
}

/// An energy type/technology tag, optionally with an emission factor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Carrier {
    /// Emissions in tCO2/MWh attributed to one unit of this carrier
    pub co2_emissions: f64,
}

/// A node of the network where components attach
#[derive(Debug, Clone, PartialEq)]
pub struct Bus {
    /// The energy carrier of the bus
    pub carrier: CarrierID,
    /// The model node this bus belongs to ("EU" for continental buses)
    pub location: String,
    /// Country code, where known
    pub country: Option<String>,
}

impl Default for Bus {
    fn default() -> Self {
        Bus {
            carrier: CarrierID::new("AC"),
            location: String::new(),
            country: None,
        }
    }
}

/// An AC transmission line
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// The bus at one end
    pub bus0: BusID,
    /// The bus at the other end
    pub bus1: BusID,
    /// Length in km
    pub length: f64,
    /// Nominal capacity in MVA
    pub s_nom: f64,
    /// Lower bound for capacity expansion
    pub s_nom_min: f64,
    /// Upper bound for capacity expansion
    pub s_nom_max: f64,
    /// Whether capacity may be expanded by the optimiser
    pub s_nom_extendable: bool,
    /// Security margin on usable capacity
    pub s_max_pu: f64,
    /// Annualised capital cost per MVA
    pub capital_cost: f64,
}

impl Default for Line {
    fn default() -> Self {
        Line {
            bus0: BusID::new(""),
            bus1: BusID::new(""),
            length: 0.0,
            s_nom: 0.0,
            s_nom_min: 0.0,
            s_nom_max: f64::INFINITY,
            s_nom_extendable: false,
            s_max_pu: 1.0,
            capital_cost: 0.0,
        }
    }
}

/// A directed multi-port energy conversion edge.
///
/// Power flows in at `bus0`; each further port `busN` receives (or, for
/// negative efficiencies, supplies) `efficiencyN` units per unit of input.
/// CO2 mass balance rides on these ports: emitting links carry the emitted
/// mass to `co2 atmosphere` and/or `co2 stored` via matching efficiencies.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// The input bus
    pub bus0: BusID,
    /// The primary output bus
    pub bus1: BusID,
    /// Optional 2nd output bus
    pub bus2: Option<BusID>,
    /// Optional 3rd output bus
    pub bus3: Option<BusID>,
    /// Optional 4th output bus
    pub bus4: Option<BusID>,
    /// The technology tag
    pub carrier: CarrierID,
    /// Efficiency to `bus1` (may vary in time, e.g. heat pump COP)
    pub efficiency: TimeVarying,
    /// Efficiency to `bus2`
    pub efficiency2: f64,
    /// Efficiency to `bus3`
    pub efficiency3: f64,
    /// Efficiency to `bus4`
    pub efficiency4: f64,
    /// Nominal capacity in MW
    pub p_nom: f64,
    /// Lower bound for capacity expansion
    pub p_nom_min: f64,
    /// Upper bound for capacity expansion
    pub p_nom_max: f64,
    /// Whether capacity may be expanded by the optimiser
    pub p_nom_extendable: bool,
    /// Minimum dispatch per unit of capacity (-1 allows reversal)
    pub p_min_pu: TimeVarying,
    /// Maximum dispatch per unit of capacity
    pub p_max_pu: TimeVarying,
    /// Annualised capital cost per MW
    pub capital_cost: f64,
    /// Marginal cost per MWh
    pub marginal_cost: f64,
    /// Length in km (pipelines and transmission links)
    pub length: f64,
    /// Lifetime in years
    pub lifetime: f64,
}

impl Default for Link {
    fn default() -> Self {
        Link {
            bus0: BusID::new(""),
            bus1: BusID::new(""),
            bus2: None,
            bus3: None,
            bus4: None,
            carrier: CarrierID::new(""),
            efficiency: TimeVarying::Static(1.0),
            efficiency2: 1.0,
            efficiency3: 1.0,
            efficiency4: 1.0,
            p_nom: 0.0,
            p_nom_min: 0.0,
            p_nom_max: f64::INFINITY,
            p_nom_extendable: false,
            p_min_pu: TimeVarying::Static(0.0),
            p_max_pu: TimeVarying::Static(1.0),
            capital_cost: 0.0,
            marginal_cost: 0.0,
            length: 0.0,
            lifetime: f64::INFINITY,
        }
    }
}

/// A bounded power source attached to a bus
#[derive(Debug, Clone, PartialEq)]
pub struct Generator {
    /// The bus the generator feeds
    pub bus: BusID,
    /// The technology tag
    pub carrier: CarrierID,
    /// Nominal capacity in MW
    pub p_nom: f64,
    /// Whether capacity may be expanded by the optimiser
    pub p_nom_extendable: bool,
    /// Upper bound for capacity expansion
    pub p_nom_max: f64,
    /// Maximum dispatch per unit of capacity (availability)
    pub p_max_pu: TimeVarying,
    /// Minimum dispatch per unit of capacity
    pub p_min_pu: TimeVarying,
    /// Annualised capital cost per MW
    pub capital_cost: f64,
    /// Marginal cost per MWh
    pub marginal_cost: f64,
    /// Conversion efficiency
    pub efficiency: f64,
    /// Lifetime in years
    pub lifetime: f64,
}

impl Default for Generator {
    fn default() -> Self {
        Generator {
            bus: BusID::new(""),
            carrier: CarrierID::new(""),
            p_nom: 0.0,
            p_nom_extendable: false,
            p_nom_max: f64::INFINITY,
            p_max_pu: TimeVarying::Static(1.0),
            p_min_pu: TimeVarying::Static(0.0),
            capital_cost: 0.0,
            marginal_cost: 0.0,
            efficiency: 1.0,
            lifetime: f64::INFINITY,
        }
    }
}

/// A legacy electricity-only storage unit (e.g. pumped hydro).
///
/// Sector-coupled storage is modelled with stores and charger/discharger
/// links instead; storage units survive only for the carriers kept from the
/// base network.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageUnit {
    /// The bus the unit attaches to
    pub bus: BusID,
    /// The technology tag
    pub carrier: CarrierID,
    /// Nominal power capacity in MW
    pub p_nom: f64,
    /// Upper bound for capacity expansion
    pub p_nom_max: f64,
    /// Energy capacity as hours at nominal power
    pub max_hours: f64,
    /// Annualised capital cost per MW
    pub capital_cost: f64,
    /// Marginal cost per MWh
    pub marginal_cost: f64,
}

impl Default for StorageUnit {
    fn default() -> Self {
        StorageUnit {
            bus: BusID::new(""),
            carrier: CarrierID::new(""),
            p_nom: 0.0,
            p_nom_max: f64::INFINITY,
            max_hours: 1.0,
            capital_cost: 0.0,
            marginal_cost: 0.0,
        }
    }
}

/// A capacity-bounded energy accumulator attached to a bus
#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    /// The bus the store attaches to
    pub bus: BusID,
    /// The technology tag
    pub carrier: CarrierID,
    /// Energy capacity in MWh
    pub e_nom: f64,
    /// Whether capacity may be expanded by the optimiser
    pub e_nom_extendable: bool,
    /// Upper bound for capacity expansion
    pub e_nom_max: f64,
    /// Whether the state of charge must wrap around the horizon
    pub e_cyclic: bool,
    /// Minimum state of charge per unit capacity (-1 allows net withdrawal)
    pub e_min_pu: TimeVarying,
    /// Maximum state of charge per unit capacity
    pub e_max_pu: TimeVarying,
    /// Annualised capital cost per MWh
    pub capital_cost: f64,
    /// Standing loss per hour
    pub standing_loss: f64,
    /// Lifetime in years
    pub lifetime: f64,
}

impl Default for Store {
    fn default() -> Self {
        Store {
            bus: BusID::new(""),
            carrier: CarrierID::new(""),
            e_nom: 0.0,
            e_nom_extendable: false,
            e_nom_max: f64::INFINITY,
            e_cyclic: false,
            e_min_pu: TimeVarying::Static(0.0),
            e_max_pu: TimeVarying::Static(1.0),
            capital_cost: 0.0,
            standing_loss: 0.0,
            lifetime: f64::INFINITY,
        }
    }
}

/// A demand time series attached to a bus
#[derive(Debug, Clone, PartialEq)]
pub struct Load {
    /// The bus the load draws from
    pub bus: BusID,
    /// The demand category tag
    pub carrier: CarrierID,
    /// Demand in MW per snapshot (negative values supply the bus)
    pub p_set: TimeVarying,
}

impl Default for Load {
    fn default() -> Self {
        Load {
            bus: BusID::new(""),
            carrier: CarrierID::new(""),
            p_set: TimeVarying::default(),
        }
    }
}

/// Direction of a global constraint
#[derive(Debug, Clone, Copy, PartialEq, SerializeLabeledStringEnum, DeserializeLabeledStringEnum)]
pub enum Sense {
    /// The aggregate quantity must not exceed the constant
    #[string = "<="]
    LessEqual,
    /// The aggregate quantity must reach at least the constant
    #[string = ">="]
    GreaterEqual,
    /// The aggregate quantity must equal the constant
    #[string = "=="]
    Equal,
}

/// A scalar limit on an aggregate quantity, e.g. total CO2 emissions
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalConstraint {
    /// The carrier attribute the constraint sums over
    pub carrier_attribute: String,
    /// Direction of the constraint
    pub sense: Sense,
    /// The constraint bound
    pub constant: f64,
}

/// The sector-coupled energy network
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Network {
    /// The time steps the model covers
    pub snapshots: Vec<NaiveDateTime>,
    /// Hours represented by each snapshot
    pub snapshot_weightings: Vec<f64>,
    /// Energy carriers
    pub carriers: IndexMap<CarrierID, Carrier>,
    /// Buses
    pub buses: IndexMap<BusID, Bus>,
    /// AC transmission lines
    pub lines: IndexMap<LineID, Line>,
    /// Multi-port conversion links
    pub links: IndexMap<LinkID, Link>,
    /// Generators
    pub generators: IndexMap<GeneratorID, Generator>,
    /// Legacy storage units
    pub storage_units: IndexMap<StorageUnitID, StorageUnit>,
    /// Stores
    pub stores: IndexMap<StoreID, Store>,
    /// Loads
    pub loads: IndexMap<LoadID, Load>,
    /// Global constraints
    pub global_constraints: IndexMap<String, GlobalConstraint>,
}

macro_rules! define_component_accessors {
    ($add:ident, $get:ident, $get_mut:ident, $field:ident, $id_ty:ty, $ty:ty, $class:literal) => {
        /// Add a component, failing on a duplicate name
        pub fn $add(&mut self, id: $id_ty, component: $ty) -> Result<()> {
            self.check_bus_refs(&id.0, component.bus_refs())?;
            ensure!(
                !self.$field.contains_key(&id),
                concat!($class, " {} already exists"),
                id
            );
            self.$field.insert(id, component);
            Ok(())
        }

        /// Look up a component by name
        pub fn $get(&self, id: &str) -> Result<&$ty> {
            self.$field
                .get(id)
                .with_context(|| format!(concat!("No such ", $class, " {}"), id))
        }

        /// Look up a component mutably by name
        pub fn $get_mut(&mut self, id: &str) -> Result<&mut $ty> {
            self.$field
                .get_mut(id)
                .with_context(|| format!(concat!("No such ", $class, " {}"), id))
        }
    };
}

/// Buses a component references, used for referential checks on add
trait BusRefs {
    fn bus_refs(&self) -> Vec<&BusID>;
}

impl BusRefs for Bus {
    fn bus_refs(&self) -> Vec<&BusID> {
        Vec::new()
    }
}

impl BusRefs for Line {
    fn bus_refs(&self) -> Vec<&BusID> {
        vec![&self.bus0, &self.bus1]
    }
}

impl BusRefs for Link {
    fn bus_refs(&self) -> Vec<&BusID> {
        let mut refs = vec![&self.bus0, &self.bus1];
        refs.extend([&self.bus2, &self.bus3, &self.bus4].into_iter().flatten());
        refs
    }
}

macro_rules! impl_single_bus_refs {
    ($($ty:ty),*) => {
        $(impl BusRefs for $ty {
            fn bus_refs(&self) -> Vec<&BusID> {
                vec![&self.bus]
            }
        })*
    };
}
impl_single_bus_refs!(Generator, StorageUnit, Store, Load);

impl Network {
    /// Create an empty network
    pub fn new() -> Network {
        Network::default()
    }

    /// The number of years represented by the snapshot weightings
    pub fn nyears(&self) -> f64 {
        self.snapshot_weightings.iter().sum::<f64>() / 8760.0
    }

    /// Add a carrier, failing on a duplicate name
    pub fn add_carrier(&mut self, id: CarrierID, carrier: Carrier) -> Result<()> {
        ensure!(
            !self.carriers.contains_key(&id),
            "Carrier {} already exists",
            id
        );
        self.carriers.insert(id, carrier);
        Ok(())
    }

    /// Add a carrier unless a carrier of that name already exists
    pub fn ensure_carrier(&mut self, id: &str) {
        if !self.carriers.contains_key(id) {
            self.carriers.insert(CarrierID::new(id), Carrier::default());
        }
    }

    /// Add a global constraint, failing on a duplicate name
    pub fn add_global_constraint(
        &mut self,
        name: &str,
        constraint: GlobalConstraint,
    ) -> Result<()> {
        ensure!(
            !self.global_constraints.contains_key(name),
            "GlobalConstraint {} already exists",
            name
        );
        self.global_constraints.insert(name.to_string(), constraint);
        Ok(())
    }

    define_component_accessors!(add_bus, bus, bus_mut, buses, BusID, Bus, "Bus");
    define_component_accessors!(add_line, line, line_mut, lines, LineID, Line, "Line");
    define_component_accessors!(add_link, link, link_mut, links, LinkID, Link, "Link");
    define_component_accessors!(
        add_generator,
        generator,
        generator_mut,
        generators,
        GeneratorID,
        Generator,
        "Generator"
    );
    define_component_accessors!(
        add_storage_unit,
        storage_unit,
        storage_unit_mut,
        storage_units,
        StorageUnitID,
        StorageUnit,
        "StorageUnit"
    );
    define_component_accessors!(add_store, store, store_mut, stores, StoreID, Store, "Store");
    define_component_accessors!(add_load, load, load_mut, loads, LoadID, Load, "Load");

    /// Whether a bus with the given name exists
    pub fn has_bus(&self, name: &str) -> bool {
        self.buses.contains_key(name)
    }

    /// Names of all buses with the given carrier, in insertion order
    pub fn buses_with_carrier(&self, carrier: &str) -> Vec<BusID> {
        self.buses
            .iter()
            .filter(|(_, bus)| bus.carrier.as_str() == carrier)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn check_bus_refs(&self, id: &str, refs: Vec<&BusID>) -> Result<()> {
        for bus in refs {
            ensure!(
                self.has_bus(bus.as_str()),
                "Bus {} referenced by {} does not exist",
                bus,
                id
            );
        }

        Ok(())
    }

    /// Check referential integrity and series alignment of the whole network.
    ///
    /// Components added through the `add_*` methods cannot dangle, but
    /// in-place rewiring (e.g. redirecting loads through a distribution grid)
    /// touches bus references directly, so the pipeline re-validates before
    /// exporting.
    pub fn validate(&self) -> Result<()> {
        for (id, line) in &self.lines {
            self.check_bus_refs(id.as_str(), line.bus_refs())?;
        }
        for (id, link) in &self.links {
            self.check_bus_refs(id.as_str(), link.bus_refs())?;
        }
        for (id, generator) in &self.generators {
            self.check_bus_refs(id.as_str(), generator.bus_refs())?;
        }
        for (id, unit) in &self.storage_units {
            self.check_bus_refs(id.as_str(), unit.bus_refs())?;
        }
        for (id, store) in &self.stores {
            self.check_bus_refs(id.as_str(), store.bus_refs())?;
        }
        for (id, load) in &self.loads {
            self.check_bus_refs(id.as_str(), load.bus_refs())?;
        }

        ensure!(
            self.snapshots.len() == self.snapshot_weightings.len(),
            "Snapshot weightings do not match snapshots"
        );
        let n_snapshots = self.snapshots.len();
        let check_series = |id: &str, attr: &str, value: &TimeVarying| -> Result<()> {
            if let Some(len) = value.series_len() {
                ensure!(
                    len == n_snapshots,
                    "Series {attr} of {id} has {len} values for {n_snapshots} snapshots"
                );
            }
            Ok(())
        };
        for (id, link) in &self.links {
            check_series(id.as_str(), "efficiency", &link.efficiency)?;
            check_series(id.as_str(), "p_min_pu", &link.p_min_pu)?;
            check_series(id.as_str(), "p_max_pu", &link.p_max_pu)?;
        }
        for (id, generator) in &self.generators {
            check_series(id.as_str(), "p_max_pu", &generator.p_max_pu)?;
            check_series(id.as_str(), "p_min_pu", &generator.p_min_pu)?;
        }
        for (id, store) in &self.stores {
            check_series(id.as_str(), "e_min_pu", &store.e_min_pu)?;
            check_series(id.as_str(), "e_max_pu", &store.e_max_pu)?;
        }
        for (id, load) in &self.loads {
            check_series(id.as_str(), "p_set", &load.p_set)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;

    fn network_with_bus(name: &str) -> Network {
        let mut network = Network::new();
        network
            .add_bus(BusID::new(name), Bus::default())
            .unwrap();
        network
    }

    #[test]
    fn test_duplicate_names_are_errors() {
        let mut network = network_with_bus("DE0 0");
        assert_error!(
            network.add_bus(BusID::new("DE0 0"), Bus::default()),
            "Bus DE0 0 already exists"
        );
    }

    #[test]
    fn test_missing_bus_reference_is_an_error() {
        let mut network = network_with_bus("DE0 0");
        assert_error!(
            network.add_load(
                LoadID::new("DE0 1 industry electricity"),
                Load {
                    bus: BusID::new("DE0 1"),
                    ..Load::default()
                },
            ),
            "Bus DE0 1 referenced by DE0 1 industry electricity does not exist"
        );
    }

    #[test]
    fn test_link_port_references_are_checked() {
        let mut network = network_with_bus("DE0 0");
        network
            .add_bus(BusID::new("EU gas"), Bus::default())
            .unwrap();

        let link = Link {
            bus0: BusID::new("EU gas"),
            bus1: BusID::new("DE0 0"),
            bus2: Some(BusID::new("co2 atmosphere")),
            ..Link::default()
        };
        assert_error!(
            network.add_link(LinkID::new("DE0 0 OCGT"), link),
            "Bus co2 atmosphere referenced by DE0 0 OCGT does not exist"
        );
    }

    #[test]
    fn test_buses_with_carrier() {
        let mut network = Network::new();
        for (name, carrier) in [("DE0 0", "AC"), ("DE0 0 H2", "H2"), ("DE0 1", "AC")] {
            network
                .add_bus(
                    BusID::new(name),
                    Bus {
                        carrier: CarrierID::new(carrier),
                        ..Bus::default()
                    },
                )
                .unwrap();
        }

        let ac: Vec<_> = network.buses_with_carrier("AC");
        assert_eq!(ac, vec![BusID::new("DE0 0"), BusID::new("DE0 1")]);
    }

    #[test]
    fn test_validate_catches_dangling_rewire() {
        let mut network = network_with_bus("DE0 0");
        network
            .add_load(
                LoadID::new("DE0 0"),
                Load {
                    bus: BusID::new("DE0 0"),
                    ..Load::default()
                },
            )
            .unwrap();
        network.load_mut("DE0 0").unwrap().bus = BusID::new("DE0 0 low voltage");
        assert!(network.validate().is_err());
    }

    #[test]
    fn test_validate_catches_misaligned_series() {
        let mut network = network_with_bus("DE0 0");
        network.snapshots = vec![
            chrono::NaiveDate::from_ymd_opt(2013, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        ];
        network.snapshot_weightings = vec![1.0];
        network
            .add_load(
                LoadID::new("DE0 0"),
                Load {
                    bus: BusID::new("DE0 0"),
                    p_set: vec![1.0, 2.0].into(),
                    ..Load::default()
                },
            )
            .unwrap();
        assert!(network.validate().is_err());
    }
}
