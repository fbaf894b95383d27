use crate::core::models::ids::{ResidueIndex, ResidueKey};
use crate::core::models::structure::Structure;
use nalgebra::Point3;
use serde::Serialize;
use std::path::PathBuf;

/// Where an anchor point came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    Geometric,
}

/// Expected sugar centroid next to a candidate residue.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorPoint {
    pub key: ResidueKey,
    pub index: ResidueIndex,
    pub position: Point3<f64>,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Occupancy {
    Occupied,
    Empty,
}

/// Blob-search verdict for one anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSite {
    pub key: ResidueKey,
    pub index: ResidueIndex,
    pub anchor: Point3<f64>,
    /// Mean density inside the sampling sphere; zero when the sphere is empty.
    pub score: f64,
    pub sample_count: usize,
    pub threshold: f64,
    pub occupancy: Occupancy,
    /// One-letter residue window centred on the candidate, `-` for gaps.
    pub window: String,
}

impl CandidateSite {
    pub fn is_occupied(&self) -> bool {
        self.occupancy == Occupancy::Occupied
    }

    pub fn summary_row(&self) -> CandidateRow {
        CandidateRow {
            chain: self.key.chain_id.clone(),
            residue: self.key.seq_num,
            score: format!("{:.3}", self.score),
            samples: self.sample_count,
            threshold: format!("{:.3}", self.threshold),
            occupancy: self.occupancy,
            window: self.window.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MotifMatch {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Motif matches found in one chain's sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceMotifHit {
    pub chain_index: usize,
    pub chain_id: String,
    pub sequence: String,
    pub matches: Vec<MotifMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DonorRef {
    pub path: PathBuf,
    pub glycan_index: usize,
}

/// A residue that should receive a glycan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraftTarget {
    pub model: usize,
    pub chain_index: usize,
    pub chain_id: String,
    /// Position of the residue within its chain.
    pub residue_index: usize,
    pub seq_num: isize,
    pub donor: DonorRef,
}

impl GraftTarget {
    pub fn key(&self) -> ResidueKey {
        ResidueKey::new(self.chain_id.clone(), self.seq_num)
    }

    pub fn index(&self) -> ResidueIndex {
        ResidueIndex::new(self.model, self.chain_index, self.residue_index)
    }
}

/// What the builder reports after inserting one glycan.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachedGraft {
    pub target: ResidueKey,
    pub receiving_residue: String,
    pub grafted_chain_id: String,
    pub sugars: Vec<ResidueKey>,
    /// Receiver residues the glycan came too close to, as `CHAIN/NUM NAME`.
    pub clashes: Vec<String>,
    pub average_clash_distance: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GraftStatus {
    Pending,
    Retained,
    Rejected,
}

/// Life of one graft through the cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct GraftOutcome {
    pub graft: AttachedGraft,
    pub rscc: Option<f64>,
    pub status: GraftStatus,
    /// Refinement pass after which the status was last set.
    pub pass: usize,
}

impl GraftOutcome {
    pub fn new(graft: AttachedGraft) -> Self {
        Self {
            graft,
            rscc: None,
            status: GraftStatus::Pending,
            pass: 0,
        }
    }

    pub fn is_retained(&self) -> bool {
        self.status == GraftStatus::Retained
    }

    pub fn summary_row(&self) -> OutcomeRow {
        OutcomeRow {
            chain: self.graft.target.chain_id.clone(),
            residue: self.graft.target.seq_num,
            residue_name: self.graft.receiving_residue.clone(),
            glycan_chain: self.graft.grafted_chain_id.clone(),
            sugars: self.graft.sugars.len(),
            clashes: self.graft.clashes.join(" "),
            average_clash_distance: self
                .graft
                .average_clash_distance
                .map(|d| format!("{d:.3}"))
                .unwrap_or_default(),
            rscc: self.rscc.map(|r| format!("{r:.3}")).unwrap_or_default(),
            status: self.status,
            pass: self.pass,
        }
    }
}

/// Result of running the graft cycle on one structure.
#[derive(Debug, Clone)]
pub struct GraftReport {
    pub outcomes: Vec<GraftOutcome>,
    /// Targets the builder could not attach, with the reason.
    pub failed_attachments: Vec<(ResidueKey, String)>,
    pub refinement_passes: usize,
    /// The validated model, or `None` when no graft survived.
    pub structure: Option<Structure>,
}

impl GraftReport {
    pub fn retained(&self) -> impl Iterator<Item = &GraftOutcome> {
        self.outcomes.iter().filter(|o| o.is_retained())
    }

    pub fn rejected(&self) -> impl Iterator<Item = &GraftOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == GraftStatus::Rejected)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateRow {
    pub chain: String,
    pub residue: isize,
    pub score: String,
    pub samples: usize,
    pub threshold: String,
    pub occupancy: Occupancy,
    pub window: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutcomeRow {
    pub chain: String,
    pub residue: isize,
    pub residue_name: String,
    pub glycan_chain: String,
    pub sugars: usize,
    pub clashes: String,
    pub average_clash_distance: String,
    pub rscc: String,
    pub status: GraftStatus,
    pub pass: usize,
}
