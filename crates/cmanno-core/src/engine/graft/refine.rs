use super::{Refined, Refiner};
use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::MolecularFile;
use crate::core::models::structure::Structure;
use crate::engine::config::RefmacConfig;
use crate::engine::error::EngineError;
use crate::engine::utils::process::{absolute_path, last_line, run_tool};
use std::ffi::OsString;
use std::fs;
use std::path::Path;
use tracing::{info, instrument, warn};

const INPUT_MODEL: &str = "input.pdb";
const OUTPUT_MODEL: &str = "refined.pdb";
const OUTPUT_MTZ: &str = "refined.mtz";
const OUTPUT_XML: &str = "refmac.xml";

/// Runs REFMAC as a batch subprocess.
///
/// Inputs and outputs are fixed file names inside the workspace. Completion is judged
/// only by the presence of both output files.
#[derive(Debug, Clone)]
pub struct RefmacRefiner {
    config: RefmacConfig,
}

impl RefmacRefiner {
    pub fn new(config: RefmacConfig) -> Self {
        Self { config }
    }

    fn arguments(&self, mtz: &Path, workspace: &Path, library: Option<&Path>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "HKLIN".into(),
            mtz.as_os_str().to_owned(),
            "XYZIN".into(),
            workspace.join(INPUT_MODEL).into_os_string(),
            "HKLOUT".into(),
            workspace.join(OUTPUT_MTZ).into_os_string(),
            "XYZOUT".into(),
            workspace.join(OUTPUT_MODEL).into_os_string(),
            "XMLOUT".into(),
            workspace.join(OUTPUT_XML).into_os_string(),
        ];
        if let Some(library) = library {
            args.push("LIBIN".into());
            args.push(library.as_os_str().to_owned());
        }
        args
    }

    fn keywords(&self, cycles: u32) -> String {
        format!(
            "LABIN FP={} SIGFP={} FREE={}\nNCYCLES {}\nWEIGHT AUTO\nMAKE HYDR NO\nEND\n",
            self.config.fp_column, self.config.sigfp_column, self.config.free_column, cycles
        )
    }
}

impl Refiner for RefmacRefiner {
    #[instrument(skip_all, name = "refmac", fields(cycles = cycles))]
    fn refine(
        &self,
        structure: &Structure,
        mtz: &Path,
        cycles: u32,
        workspace: &Path,
    ) -> Result<Refined, EngineError> {
        let workspace = &absolute_path(workspace)?;
        let mtz = absolute_path(mtz)?;
        let library = match &self.config.library {
            Some(library) => Some(absolute_path(library)?),
            None => None,
        };
        fs::create_dir_all(workspace).map_err(|source| EngineError::Io {
            path: workspace.to_path_buf(),
            source,
        })?;
        let input = workspace.join(INPUT_MODEL);
        PdbFile::write_to_path(structure, &input).map_err(|source| EngineError::ModelWrite {
            path: input.clone(),
            source,
        })?;

        let output = run_tool(
            &self.config.executable,
            self.arguments(&mtz, workspace, library.as_deref()),
            Some(&self.keywords(cycles)),
            workspace,
        )?;

        let model_out = workspace.join(OUTPUT_MODEL);
        let mtz_out = workspace.join(OUTPUT_MTZ);
        if !model_out.is_file() || !mtz_out.is_file() {
            let detail = last_line(&output.stderr);
            let detail = if detail.is_empty() {
                last_line(&output.stdout)
            } else {
                detail
            };
            warn!(status = %output.status, "Refinement left no output.");
            return Err(EngineError::Refinement(format!(
                "no refined model or reflections after exit {} ({})",
                output.status, detail
            )));
        }
        if !output.status.success() {
            warn!(status = %output.status, "Refinement exited abnormally but wrote its outputs.");
        }

        let mut refined =
            PdbFile::read_from_path(&model_out).map_err(|source| EngineError::ModelRead {
                path: model_out.clone(),
                source,
            })?;
        refined.name = structure.name.clone();
        if refined.resolution.is_none() {
            refined.resolution = structure.resolution;
        }
        if refined.cell.is_none() {
            refined.cell = structure.cell.clone();
            refined.space_group = structure.space_group.clone();
        }
        if refined.reference_sequences().is_empty() {
            for (chain, names) in structure.reference_sequences() {
                refined.set_reference_sequence(chain, names.clone());
            }
        }
        info!(atoms = refined.atom_count(), "Refinement finished.");
        Ok(Refined {
            structure: refined,
            mtz: mtz_out,
        })
    }
}
