//! Temporal resampling of the network.
//!
//! Merging snapshots reduces the optimisation problem size. Snapshot
//! weightings are summed over each bin. Series are averaged, with two
//! exceptions that must hold for storage feasibility: a store's `e_max_pu`
//! takes the bin minimum and its `e_min_pu` the bin maximum, so the resampled
//! bounds never relax the hourly ones.
use super::{Network, TimeVarying};
use anyhow::{Result, ensure};
use log::info;

/// Aggregation rule for one series attribute
#[derive(Clone, Copy)]
enum Agg {
    Mean,
    Min,
    Max,
}

/// Resample the network to snapshots of `hours` length.
///
/// Returns a new network; the original is left untouched.
pub fn average_every_nhours(network: &Network, hours: u32) -> Result<Network> {
    ensure!(hours > 0, "Snapshot length must be positive");
    ensure!(
        !network.snapshots.is_empty(),
        "Cannot resample a network without snapshots"
    );
    info!("Resampling the network to {hours}h snapshots");

    // Assign each snapshot to a bin of `hours` hours from the first snapshot,
    // skipping bins left empty by gaps in the snapshots
    let t0 = network.snapshots[0];
    let mut bins = Vec::with_capacity(network.snapshots.len());
    let mut last_raw_bin = None;
    for t in &network.snapshots {
        let raw_bin = (*t - t0).num_hours() / i64::from(hours);
        if last_raw_bin != Some(raw_bin) {
            last_raw_bin = Some(raw_bin);
            bins.push(bins.last().map_or(0, |b| b + 1));
        } else {
            bins.push(*bins.last().unwrap());
        }
    }
    let n_bins = bins.last().unwrap() + 1;

    let mut resampled = network.clone();
    resampled.snapshots = Vec::with_capacity(n_bins);
    resampled.snapshot_weightings = vec![0.0; n_bins];
    for (i, &bin) in bins.iter().enumerate() {
        if resampled.snapshots.len() == bin {
            resampled.snapshots.push(network.snapshots[i]);
        }
        resampled.snapshot_weightings[bin] += network.snapshot_weightings[i];
    }

    let resample = |value: &mut TimeVarying, agg: Agg| {
        if let TimeVarying::Series(values) = value {
            *values = aggregate(values, &bins, n_bins, agg);
        }
    };

    for link in resampled.links.values_mut() {
        resample(&mut link.efficiency, Agg::Mean);
        resample(&mut link.p_min_pu, Agg::Mean);
        resample(&mut link.p_max_pu, Agg::Mean);
    }
    for generator in resampled.generators.values_mut() {
        resample(&mut generator.p_max_pu, Agg::Mean);
        resample(&mut generator.p_min_pu, Agg::Mean);
    }
    for store in resampled.stores.values_mut() {
        resample(&mut store.e_max_pu, Agg::Min);
        resample(&mut store.e_min_pu, Agg::Max);
    }
    for load in resampled.loads.values_mut() {
        resample(&mut load.p_set, Agg::Mean);
    }

    Ok(resampled)
}

fn aggregate(values: &[f64], bins: &[usize], n_bins: usize, agg: Agg) -> Vec<f64> {
    let mut sums = vec![0.0; n_bins];
    let mut counts = vec![0usize; n_bins];
    let mut extremes = vec![
        match agg {
            Agg::Min => f64::INFINITY,
            _ => f64::NEG_INFINITY,
        };
        n_bins
    ];

    for (value, &bin) in values.iter().zip(bins) {
        sums[bin] += value;
        counts[bin] += 1;
        extremes[bin] = match agg {
            Agg::Min => extremes[bin].min(*value),
            _ => extremes[bin].max(*value),
        };
    }

    match agg {
        Agg::Mean => sums
            .iter()
            .zip(&counts)
            .map(|(sum, count)| sum / *count as f64)
            .collect(),
        Agg::Min | Agg::Max => extremes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::toy_network;

    #[test]
    fn test_resample_to_3h() {
        let network = toy_network();
        let n_snapshots = network.snapshots.len();

        let resampled = average_every_nhours(&network, 3).unwrap();
        assert_eq!(resampled.snapshots.len(), n_snapshots.div_ceil(3));

        // Weightings are summed
        assert_eq!(
            resampled.snapshot_weightings.iter().sum::<f64>(),
            network.snapshot_weightings.iter().sum::<f64>()
        );
    }

    #[test]
    fn test_aggregation_rules() {
        let bins = vec![0, 0, 0, 1, 1, 1];
        let values = vec![1.0, 2.0, 3.0, 4.0, 6.0, 8.0];

        assert_eq!(aggregate(&values, &bins, 2, Agg::Mean), vec![2.0, 6.0]);
        assert_eq!(aggregate(&values, &bins, 2, Agg::Min), vec![1.0, 4.0]);
        assert_eq!(aggregate(&values, &bins, 2, Agg::Max), vec![3.0, 8.0]);
    }
}
