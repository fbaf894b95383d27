use super::state::{CandidateSite, DonorRef, GraftTarget, SequenceMotifHit};
use crate::core::models::structure::Structure;

/// Joins occupied density sites with sequence-motif hits on `(chain id, seq_num)`.
///
/// Output follows motif-hit order. Every matching pair produces a target, so a residue
/// reached by several hits is emitted several times. Hits whose positions no longer
/// resolve to a modelled residue are skipped.
pub fn reconcile(
    structure: &Structure,
    sites: &[CandidateSite],
    hits: &[SequenceMotifHit],
    donor: &DonorRef,
) -> Vec<GraftTarget> {
    let Some(model) = structure.models().first() else {
        return Vec::new();
    };
    let mut targets = Vec::new();
    for hit in hits {
        let Some(chain) = model.chains().get(hit.chain_index) else {
            continue;
        };
        let polymer = chain.polymer_indices();
        for motif in &hit.matches {
            let Some(&residue_index) = polymer.get(motif.start) else {
                continue;
            };
            let residue = &chain.residues()[residue_index];
            let occupied = sites.iter().filter(|site| {
                site.is_occupied()
                    && site.key.chain_id == hit.chain_id
                    && site.key.seq_num == residue.seq_num
            });
            for _ in occupied {
                targets.push(GraftTarget {
                    model: 0,
                    chain_index: hit.chain_index,
                    chain_id: hit.chain_id.clone(),
                    residue_index,
                    seq_num: residue.seq_num,
                    donor: donor.clone(),
                });
            }
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::chain::Chain;
    use crate::core::models::ids::{ResidueIndex, ResidueKey};
    use crate::core::models::residue::Residue;
    use crate::engine::state::{MotifMatch, Occupancy};
    use nalgebra::Point3;
    use std::path::PathBuf;

    fn structure() -> Structure {
        let mut structure = Structure::new("join");
        let mut chain = Chain::new("A");
        for (i, name) in ["TRP", "ALA", "GLY", "TRP"].iter().enumerate() {
            chain.push_residue(Residue::new(name, 100 + i as isize));
        }
        structure.model_or_insert(0).push_chain(chain);
        structure
    }

    fn site(seq_num: isize, occupancy: Occupancy) -> CandidateSite {
        CandidateSite {
            key: ResidueKey::new("A", seq_num),
            index: ResidueIndex::new(0, 0, (seq_num - 100) as usize),
            anchor: Point3::origin(),
            score: 1.0,
            sample_count: 10,
            threshold: 0.5,
            occupancy,
            window: String::new(),
        }
    }

    fn hit(starts: &[usize]) -> SequenceMotifHit {
        SequenceMotifHit {
            chain_index: 0,
            chain_id: "A".into(),
            sequence: "WAGW".into(),
            matches: starts
                .iter()
                .map(|&start| MotifMatch {
                    start,
                    end: start + 1,
                    text: "W".into(),
                })
                .collect(),
        }
    }

    fn donor() -> DonorRef {
        DonorRef {
            path: PathBuf::from("mannose.pdb"),
            glycan_index: 0,
        }
    }

    #[test]
    fn targets_require_an_occupied_site_and_a_motif_hit() {
        let sites = vec![site(100, Occupancy::Occupied), site(103, Occupancy::Empty)];
        let targets = reconcile(&structure(), &sites, &[hit(&[0, 3])], &donor());
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].key(), ResidueKey::new("A", 100));
        assert_eq!(targets[0].index(), ResidueIndex::new(0, 0, 0));
    }

    #[test]
    fn empty_inputs_give_no_targets() {
        let sites = vec![site(100, Occupancy::Occupied)];
        assert!(reconcile(&structure(), &sites, &[], &donor()).is_empty());
        assert!(reconcile(&structure(), &[], &[hit(&[0])], &donor()).is_empty());
    }

    #[test]
    fn duplicate_pairs_are_emitted_independently() {
        let sites = vec![site(103, Occupancy::Occupied)];
        let targets = reconcile(&structure(), &sites, &[hit(&[3]), hit(&[3])], &donor());
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().all(|t| t.seq_num == 103));
    }
}
