//! The population layout of model nodes.
//!
//! Every node carries its total population and an urban/rural split. The
//! country code is encoded in the first two characters of the node name.
//! National quantities (biomass potentials, carbon budgets, demand totals) are
//! distributed to nodes proportionally to their share of the national
//! population.
use crate::id::BusID;
use crate::input::read_vec_from_csv;
use anyhow::{Context, Result};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::path::Path;

const POP_LAYOUT_FILE_NAME: &str = "pop_layout.csv";

/// A single row of the population layout CSV file
#[derive(Debug, Deserialize)]
struct PopLayoutRecord {
    /// The node name (e.g. "DE0 1")
    node: String,
    /// Total population at the node, in thousands
    total: f64,
    /// Urban population at the node, in thousands
    urban: f64,
    /// Rural population at the node, in thousands
    rural: f64,
}

/// A node together with its population shares
#[derive(Debug, Clone, PartialEq)]
pub struct NodeEntry {
    /// Country code of the node
    pub country: String,
    /// Total population in thousands
    pub total: f64,
    /// Urban population in thousands
    pub urban: f64,
    /// Rural population in thousands
    pub rural: f64,
    /// The node's share of its country's population
    pub fraction: f64,
}

/// The population layout of all model nodes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulationLayout(IndexMap<BusID, NodeEntry>);

impl PopulationLayout {
    /// Read the population layout from the model directory.
    pub fn from_path(model_dir: &Path) -> Result<PopulationLayout> {
        let records: Vec<PopLayoutRecord> =
            read_vec_from_csv(&model_dir.join(POP_LAYOUT_FILE_NAME))?;

        // National totals, for per-node population fractions
        let mut country_totals: IndexMap<String, f64> = IndexMap::new();
        for record in &records {
            let country = record.node.chars().take(2).collect::<String>();
            *country_totals.entry(country).or_insert(0.0) += record.total;
        }

        let entries = records
            .into_iter()
            .map(|record| {
                let country = record.node.chars().take(2).collect::<String>();
                let fraction = record.total / country_totals[&country];
                (
                    BusID::from(record.node),
                    NodeEntry {
                        country,
                        total: record.total,
                        urban: record.urban,
                        rural: record.rural,
                        fraction,
                    },
                )
            })
            .collect();

        Ok(PopulationLayout(entries))
    }

    /// The model nodes, in file order
    pub fn nodes(&self) -> impl Iterator<Item = &BusID> {
        self.0.keys()
    }

    /// The number of nodes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the layout contains no nodes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The set of countries covered by the model nodes
    pub fn countries(&self) -> IndexSet<&str> {
        self.0.values().map(|entry| entry.country.as_str()).collect()
    }

    /// Look up a node's entry
    pub fn get(&self, node: &BusID) -> Result<&NodeEntry> {
        self.0
            .get(node)
            .with_context(|| format!("Node {node} not in population layout"))
    }

    /// The node's share of its country's population
    pub fn fraction(&self, node: &BusID) -> Result<f64> {
        Ok(self.get(node)?.fraction)
    }

    /// The fraction of a node's heat demand servable by district heating,
    /// given the maximum district heating share of urban demand.
    pub fn urban_fraction(&self, node: &BusID, central_fraction: f64) -> Result<f64> {
        let entry = self.get(node)?;
        Ok(central_fraction * entry.urban / (entry.urban + entry.rural))
    }

    /// Nodes belonging to one of the given countries
    pub fn nodes_in_countries<'a>(
        &'a self,
        countries: &'a [&str],
    ) -> impl Iterator<Item = &'a BusID> {
        self.0
            .iter()
            .filter(|(_, entry)| countries.contains(&entry.country.as_str()))
            .map(|(node, _)| node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn layout() -> PopulationLayout {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(POP_LAYOUT_FILE_NAME)).unwrap();
            writeln!(file, "node,total,urban,rural").unwrap();
            writeln!(file, "DE0 0,3000,2000,1000").unwrap();
            writeln!(file, "DE0 1,1000,500,500").unwrap();
            writeln!(file, "ES1 0,2000,800,1200").unwrap();
        }
        PopulationLayout::from_path(dir.path()).unwrap()
    }

    #[test]
    fn test_fractions() {
        let layout = layout();
        assert_approx_eq!(f64, layout.fraction(&"DE0 0".into()).unwrap(), 0.75);
        assert_approx_eq!(f64, layout.fraction(&"DE0 1".into()).unwrap(), 0.25);
        assert_approx_eq!(f64, layout.fraction(&"ES1 0".into()).unwrap(), 1.0);
    }

    #[test]
    fn test_countries() {
        let layout = layout();
        assert_eq!(
            layout.countries().into_iter().collect::<Vec<_>>(),
            vec!["DE", "ES"]
        );
    }

    #[test]
    fn test_urban_fraction() {
        let layout = layout();
        let f = layout
            .urban_fraction(&"ES1 0".into(), 0.6)
            .unwrap();
        assert_approx_eq!(f64, f, 0.6 * 800.0 / 2000.0);
    }

    #[test]
    fn test_unknown_node_is_an_error() {
        let layout = layout();
        assert!(layout.fraction(&"FR0 0".into()).is_err());
    }
}
