pub mod batch;
pub mod detect;
pub mod graft;
pub mod jobs;
pub mod run_job;

use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::ui::{CliProgressHandler, UiEvent};
use cmanno::core::io::pdb::PdbFile;
use cmanno::core::io::traits::MolecularFile;
use cmanno::core::models::structure::Structure;
use cmanno::engine::graft::builder::RigidGrafter;
use cmanno::engine::graft::cycle::Collaborators;
use cmanno::engine::graft::refine::RefmacRefiner;
use cmanno::engine::graft::rscc::ModelDensityRscc;
use cmanno::engine::graft::transform::GemmiTransform;
use cmanno::engine::progress::ProgressReporter;
use cmanno::engine::state::DonorRef;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// The production collaborators of the graft cycle, owned for one invocation.
pub struct Toolchain {
    grafter: RigidGrafter,
    refiner: RefmacRefiner,
    transform: GemmiTransform,
    scorer: ModelDensityRscc,
}

impl Toolchain {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            grafter: RigidGrafter::new(&config.graft)?,
            refiner: RefmacRefiner::new(config.refmac.clone()),
            transform: GemmiTransform::new(&config.map),
            scorer: ModelDensityRscc::new(config.graft.mask_radius),
        })
    }

    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            grafter: &self.grafter,
            refiner: &self.refiner,
            transform: &self.transform,
            scorer: &self.scorer,
        }
    }
}

pub fn reporter(ui_sender: &mpsc::Sender<UiEvent>) -> ProgressReporter<'static> {
    ProgressReporter::with_callback(CliProgressHandler::new(ui_sender.clone()).get_callback())
}

pub fn read_structure(path: &Path) -> Result<Structure> {
    PdbFile::read_from_path(path).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

/// The donor from the command line, else from the config file.
pub fn resolve_donor(
    path: Option<&PathBuf>,
    glycan_index: Option<usize>,
    config: &AppConfig,
) -> Option<DonorRef> {
    match (path, &config.donor) {
        (Some(path), configured) => Some(DonorRef {
            path: path.clone(),
            glycan_index: glycan_index
                .or(configured.as_ref().map(|d| d.glycan_index))
                .unwrap_or(0),
        }),
        (None, Some(configured)) => Some(DonorRef {
            path: configured.path.clone(),
            glycan_index: glycan_index.unwrap_or(configured.glycan_index),
        }),
        (None, None) => None,
    }
}

pub fn missing_donor() -> CliError {
    CliError::Config(
        "A donor model is required: pass --donor or set `graft.donor` in the config file."
            .to_string(),
    )
}

/// A scratch directory: the requested one, kept afterwards, or a temporary one.
pub enum Workspace {
    Kept(PathBuf),
    Temporary(TempDir),
}

impl Workspace {
    pub fn new(requested: Option<PathBuf>) -> Result<Self> {
        match requested {
            Some(path) => {
                std::fs::create_dir_all(&path)?;
                Ok(Self::Kept(path))
            }
            None => Ok(Self::Temporary(
                tempfile::Builder::new().prefix("cmanno-").tempdir()?,
            )),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Kept(path) => path,
            Self::Temporary(dir) => dir.path(),
        }
    }
}
