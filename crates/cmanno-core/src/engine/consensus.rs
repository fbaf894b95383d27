use super::error::EngineError;
use super::state::{MotifMatch, SequenceMotifHit};
use crate::core::models::chain::Chain;
use crate::core::models::structure::Structure;
use regex::Regex;
use tracing::warn;

fn compile(pattern: &str) -> Result<Regex, EngineError> {
    Regex::new(pattern).map_err(|source| EngineError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Scans chain sequences for the modification's sequence motif.
#[derive(Debug, Clone)]
pub struct ConsensusMatcher {
    motif: Regex,
}

impl ConsensusMatcher {
    pub fn new(motif: &str) -> Result<Self, EngineError> {
        Ok(Self {
            motif: compile(motif)?,
        })
    }

    /// Every non-overlapping match in `sequence`, left to right.
    pub fn scan(&self, sequence: &str) -> Vec<MotifMatch> {
        self.motif
            .find_iter(sequence)
            .map(|m| MotifMatch {
                start: m.start(),
                end: m.end(),
                text: m.as_str().to_string(),
            })
            .collect()
    }

    /// Motif hits for every polymer chain of the first model.
    ///
    /// The scanned sequence is the chain's SEQRES sequence when the structure has one,
    /// otherwise the modelled polymer sequence. A match is kept only if its start
    /// position indexes a modelled amino-acid residue whose one-letter code equals the
    /// matched character; other matches are logged and dropped. Chains without a kept
    /// match produce no hit.
    pub fn hits(&self, structure: &Structure) -> Vec<SequenceMotifHit> {
        let Some(model) = structure.models().first() else {
            return Vec::new();
        };
        let mut hits = Vec::new();
        for (chain_index, chain) in model.chains().iter().enumerate() {
            let polymer = chain.polymer_indices();
            if polymer.is_empty() {
                continue;
            }
            let sequence = structure
                .reference_sequence(&chain.id)
                .unwrap_or_else(|| chain.polymer_sequence());

            let matches: Vec<MotifMatch> = self
                .scan(&sequence)
                .into_iter()
                .filter(|m| {
                    let expected = m.text.chars().next();
                    let modelled = polymer
                        .get(m.start)
                        .and_then(|&i| chain.residues()[i].one_letter());
                    let agrees = expected.is_some() && expected == modelled;
                    if !agrees {
                        warn!(
                            chain = %chain.id,
                            position = m.start,
                            expected = ?expected,
                            modelled = ?modelled,
                            "Sequence and model disagree at motif position; dropping it"
                        );
                    }
                    agrees
                })
                .collect();

            if !matches.is_empty() {
                hits.push(SequenceMotifHit {
                    chain_index,
                    chain_id: chain.id.clone(),
                    sequence,
                    matches,
                });
            }
        }
        hits
    }
}

/// One-letter residue window around a residue, looked up by author numbering.
///
/// Covers `seq_num - half_window ..= seq_num + half_window`. Positions with no residue
/// of that number, or whose residue is not an amino acid, are written as `-`.
pub fn residue_window(chain: &Chain, seq_num: isize, half_window: usize) -> String {
    let half = half_window as isize;
    (-half..=half)
        .map(|offset| {
            chain
                .position_of(seq_num + offset)
                .and_then(|i| chain.residues()[i].one_letter())
                .unwrap_or('-')
        })
        .collect()
}

/// Sequence-context test applied to a candidate's residue window.
#[derive(Debug, Clone)]
pub struct SequonFilter {
    pattern: Regex,
    half_window: usize,
}

impl SequonFilter {
    pub fn new(pattern: &str, half_window: usize) -> Result<Self, EngineError> {
        Ok(Self {
            pattern: compile(pattern)?,
            half_window,
        })
    }

    pub fn half_window(&self) -> usize {
        self.half_window
    }

    /// Whether the pattern occurs within three residues either side of the centre.
    pub fn accepts(&self, window: &str) -> bool {
        let centre = self.half_window;
        let inner = window.get(centre.saturating_sub(3)..(centre + 4).min(window.len()));
        inner.is_some_and(|text| self.pattern.is_match(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::residue::Residue;

    fn chain_from(id: &str, first: isize, names: &[&str]) -> Chain {
        let mut chain = Chain::new(id);
        for (i, name) in names.iter().enumerate() {
            chain.push_residue(Residue::new(name, first + i as isize));
        }
        chain
    }

    fn structure_with(chains: Vec<Chain>) -> Structure {
        let mut structure = Structure::new("motif");
        for chain in chains {
            structure.model_or_insert(0).push_chain(chain);
        }
        structure
    }

    #[test]
    fn scan_reports_every_match_left_to_right() {
        let matcher = ConsensusMatcher::new("W").unwrap();
        let matches = matcher.scan("AWGGWK");
        let starts: Vec<_> = matches.iter().map(|m| m.start).collect();
        assert_eq!(starts, vec![1, 4]);
        assert_eq!(matches[0].end, 2);
        assert_eq!(matches[0].text, "W");
    }

    #[test]
    fn hits_use_modelled_sequence_without_seqres() {
        let structure = structure_with(vec![
            chain_from("A", 98, &["ALA", "GLY", "TRP", "SER", "GLY", "TRP"]),
            chain_from("B", 1, &["ALA", "GLY"]),
        ]);
        let hits = ConsensusMatcher::new("W").unwrap().hits(&structure);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chain_id, "A");
        assert_eq!(hits[0].sequence, "AGWSGW");
        let starts: Vec<_> = hits[0].matches.iter().map(|m| m.start).collect();
        assert_eq!(starts, vec![2, 5]);
    }

    #[test]
    fn desynchronised_seqres_positions_are_dropped() {
        let mut structure =
            structure_with(vec![chain_from("A", 1, &["ALA", "TRP", "GLY", "TRP"])]);
        // SEQRES has an unmodelled leading residue, shifting every position by one.
        structure.set_reference_sequence(
            "A",
            ["MET", "ALA", "TRP", "GLY", "TRP"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        let hits = ConsensusMatcher::new("W").unwrap().hits(&structure);
        assert!(hits.is_empty());
    }

    #[test]
    fn invalid_motif_is_a_configuration_error() {
        let err = ConsensusMatcher::new("W(").unwrap_err();
        assert!(matches!(err, EngineError::InvalidPattern { .. }));
    }

    #[test]
    fn window_marks_gaps_and_non_amino_acids() {
        let mut chain = chain_from("A", 97, &["TRP", "ALA", "GLY", "TRP", "SER", "HOH"]);
        chain.push_residue(Residue::new("TRP", 105));
        let window = residue_window(&chain, 100, 6);
        assert_eq!(window.len(), 13);
        assert_eq!(window, "---WAGWS--W--");
    }

    #[test]
    fn sequon_is_tested_on_the_inner_window() {
        let filter = SequonFilter::new("W.{2}W", 6).unwrap();
        assert!(filter.accepts("---WAGWS-----"));
        assert!(filter.accepts("------WSGW---"));
        // The pair sits outside offsets -3..=+3.
        assert!(!filter.accepts("WAGW---------"));
        assert!(!filter.accepts(""));
    }
}
