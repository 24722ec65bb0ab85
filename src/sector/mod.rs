//! The network mutation stages of the preparation pipeline.
//!
//! Each stage takes the shared network and the read-only [`PrepareContext`]
//! explicitly; there is no hidden cross-stage state. Stages re-derive their
//! guard sets (model nodes, buses of a given carrier) from the current network
//! state, so their correctness depends only on the dispatcher invoking them in
//! the documented order.
use crate::config::{Config, SectorConfig};
use crate::costs::CostTable;
use crate::id::{BusID, CarrierID};
use crate::layout::PopulationLayout;
use crate::network::{Bus, Network};
use crate::options::ScenarioOptions;
use crate::tables::{Profiles, Tables};
use anyhow::Result;
use std::path::PathBuf;

pub mod base;
pub mod biomass;
pub mod co2;
pub mod generation;
pub mod grid;
pub mod heat;
pub mod industry;
pub mod storage;
pub mod transport;

/// Read-only inputs shared by every mutation stage
pub struct PrepareContext {
    /// The model directory (for inputs read lazily by individual stages)
    pub model_dir: PathBuf,
    /// The model configuration, with scenario token overrides applied
    pub config: Config,
    /// The parsed scenario options
    pub options: ScenarioOptions,
    /// The prepared technology cost table
    pub costs: CostTable,
    /// The population layout of model nodes
    pub layout: PopulationLayout,
    /// Static national and nodal input tables
    pub tables: Tables,
    /// Per-node demand and availability profiles
    pub profiles: Profiles,
    /// Years represented by the un-resampled snapshot weightings
    pub nyears: f64,
}

impl PrepareContext {
    /// The investment year the scenario prepares for
    pub fn investment_year(&self) -> u32 {
        self.config.scenario.investment_year
    }

    /// The sector-coupling options
    pub fn sector(&self) -> &SectorConfig {
        &self.config.sector
    }

    /// The model nodes in layout order
    pub fn nodes(&self) -> Vec<BusID> {
        self.layout.nodes().cloned().collect()
    }
}

/// Add the continental oil bus unless an earlier stage already created it.
///
/// Several stages (biomass-to-liquid, land transport, industry) feed or draw
/// from `EU oil`; whichever runs first creates the bus.
pub(crate) fn ensure_eu_oil_bus(network: &mut Network) -> Result<()> {
    if !network.has_bus("EU oil") {
        network.ensure_carrier("oil");
        network.add_bus(
            BusID::new("EU oil"),
            Bus {
                carrier: CarrierID::new("oil"),
                location: "EU".to_string(),
                country: None,
            },
        )?;
    }

    Ok(())
}
