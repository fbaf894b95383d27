use kiddo::{KdTree, SquaredEuclidean};
use rayon::prelude::*;
use std::cmp::Ordering;
use tracing::debug;

/// A probe atom that sits closer than the cutoff to a receiver atom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClashContact {
    /// Index into the probe positions.
    pub probe: usize,
    /// Index into the receiver positions.
    pub receiver: usize,
    pub distance: f64,
}

/// Finds every probe/receiver pair closer than `cutoff` Angstroms.
///
/// Queries run on the current rayon pool; install a sized pool around the call to bound
/// the thread count. Contacts come back sorted by probe, then receiver index.
pub fn find_clashes(receiver: &[[f64; 3]], probes: &[[f64; 3]], cutoff: f64) -> Vec<ClashContact> {
    if receiver.is_empty() || probes.is_empty() || !(cutoff > 0.0) {
        return Vec::new();
    }
    let points = receiver.to_vec();
    let tree: KdTree<f64, 3> = (&points).into();
    let cutoff_sq = cutoff * cutoff;

    let mut contacts: Vec<ClashContact> = probes
        .par_iter()
        .enumerate()
        .flat_map_iter(|(probe, position)| {
            tree.within_unsorted::<SquaredEuclidean>(position, cutoff_sq)
                .into_iter()
                .filter(move |n| n.distance < cutoff_sq)
                .map(move |n| ClashContact {
                    probe,
                    receiver: n.item as usize,
                    distance: n.distance.sqrt(),
                })
        })
        .collect();

    contacts.sort_by(|a, b| {
        a.probe
            .cmp(&b.probe)
            .then(a.receiver.cmp(&b.receiver))
            .then(a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal))
    });
    debug!(
        probes = probes.len(),
        receivers = receiver.len(),
        contacts = contacts.len(),
        "Clash search finished."
    );
    contacts
}
