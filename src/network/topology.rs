//! Derivation of the interconnector topology.
//!
//! Several stages (hydrogen pipelines, solid biomass transport) lay new
//! infrastructure along the corridors of the existing electricity grid. The
//! corridor set is derived from the AC lines plus the DC links, with parallel
//! connections collapsed into one undirected edge of mean length.
use super::Network;
use crate::id::BusID;
use petgraph::algo::connected_components;
use petgraph::graphmap::UnGraphMap;

/// An undirected grid corridor between two buses
#[derive(Debug, Clone, PartialEq)]
pub struct Corridor {
    /// The lexicographically smaller end
    pub bus0: BusID,
    /// The lexicographically larger end
    pub bus1: BusID,
    /// Mean length of the parallel connections in km
    pub length: f64,
}

impl Corridor {
    /// The conventional name of the corridor, e.g. `"H2 pipeline DE0 -> DE1"`
    pub fn name(&self, prefix: &str) -> String {
        format!("{}{} -> {}", prefix, self.bus0, self.bus1)
    }
}

/// Build the undirected corridor graph from AC lines and DC links
fn corridor_graph(network: &Network) -> UnGraphMap<&str, (f64, usize)> {
    let candidates = network
        .lines
        .values()
        .map(|line| (&line.bus0, &line.bus1, line.length))
        .chain(
            network
                .links
                .values()
                .filter(|link| link.carrier.as_str() == "DC")
                .map(|link| (&link.bus0, &link.bus1, link.length)),
        );

    let mut graph: UnGraphMap<&str, (f64, usize)> = UnGraphMap::new();
    for (bus0, bus1, length) in candidates {
        if let Some((total, count)) = graph.edge_weight_mut(bus0.as_str(), bus1.as_str()) {
            *total += length;
            *count += 1;
        } else {
            graph.add_edge(bus0.as_str(), bus1.as_str(), (length, 1));
        }
    }

    graph
}

/// The grid corridors of the network, sorted by bus pair.
pub fn interconnector_topology(network: &Network) -> Vec<Corridor> {
    let graph = corridor_graph(network);

    let mut corridors: Vec<Corridor> = graph
        .all_edges()
        .map(|(a, b, (total, count))| {
            let (bus0, bus1) = if a <= b { (a, b) } else { (b, a) };
            Corridor {
                bus0: BusID::new(bus0),
                bus1: BusID::new(bus1),
                length: total / *count as f64,
            }
        })
        .collect();
    corridors.sort_by(|a, b| ((&a.bus0.0, &a.bus1.0)).cmp(&(&b.bus0.0, &b.bus1.0)));

    corridors
}

/// The number of connected components of the electricity grid.
///
/// Isolated AC buses count as their own component; a value above one after
/// stripping the base network usually indicates missing interconnectors in
/// the input data.
pub fn electric_components(network: &Network) -> usize {
    let mut graph = corridor_graph(network);
    for (id, bus) in &network.buses {
        if bus.carrier.as_str() == "AC" {
            graph.add_node(id.as_str());
        }
    }

    connected_components(&graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::toy_network;
    use crate::id::LineID;
    use crate::network::Line;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_parallel_connections_are_merged() {
        let mut network = toy_network();
        // A second, longer line along the same corridor, in reverse order
        network
            .add_line(
                LineID::new("1"),
                Line {
                    bus0: BusID::new("DE0 1"),
                    bus1: BusID::new("DE0 0"),
                    length: 300.0,
                    ..Line::default()
                },
            )
            .unwrap();

        let corridors = interconnector_topology(&network);
        assert_eq!(corridors.len(), 1);
        assert_eq!(corridors[0].bus0, BusID::new("DE0 0"));
        assert_eq!(corridors[0].bus1, BusID::new("DE0 1"));
        assert_approx_eq!(f64, corridors[0].length, 200.0);
        assert_eq!(corridors[0].name("H2 pipeline "), "H2 pipeline DE0 0 -> DE0 1");
    }

    #[test]
    fn test_electric_components() {
        let mut network = toy_network();
        assert_eq!(electric_components(&network), 1);

        network.lines.clear();
        assert_eq!(electric_components(&network), 2);
    }
}
