use super::{Workspace, read_structure, reporter, resolve_donor};
use crate::cli::DetectArgs;
use crate::config::build_config;
use crate::error::{CliError, Result};
use crate::ui::UiEvent;
use cmanno::core::io::report::write_csv;
use cmanno::engine::error::EngineError;
use cmanno::engine::graft::DensityTransform;
use cmanno::engine::graft::transform::{GemmiTransform, PrecomputedMap};
use cmanno::engine::state::{CandidateSite, DonorRef};
use cmanno::workflows;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::info;

pub async fn run(args: DetectArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let config = build_config(&args.config, None)?;

    info!("Loading input structure from {:?}", &args.input);
    let structure = read_structure(&args.input)?;

    let workspace = Workspace::new(None)?;
    let columns = &config.map.difference_columns;
    let (transform, mtz): (Box<dyn DensityTransform>, &Path) =
        match (&args.source.map, &args.source.mtz) {
            (Some(map), _) => (
                Box::new(PrecomputedMap::new(map, true)) as Box<dyn DensityTransform>,
                map.as_path(),
            ),
            (None, Some(mtz)) => (
                Box::new(GemmiTransform::new(&config.map)) as Box<dyn DensityTransform>,
                mtz.as_path(),
            ),
            (None, None) => {
                return Err(CliError::Argument(
                    "either --map or --mtz is required".to_string(),
                ));
            }
        };
    let grid = tokio::task::block_in_place(|| {
        transform.compute_map(mtz, &columns.amplitude, &columns.phase, workspace.path())
    })?;

    // Targets only need a donor once they are grafted.
    let donor = resolve_donor(None, None, &config).unwrap_or(DonorRef {
        path: PathBuf::new(),
        glycan_index: 0,
    });
    let reporter = reporter(&ui_sender);
    let result = tokio::task::block_in_place(|| {
        workflows::detect::run(&structure, &grid, &config.detection, &donor, &reporter)
    })?;

    if let Some(path) = &args.csv {
        let rows: Vec<_> = result
            .candidates
            .iter()
            .map(CandidateSite::summary_row)
            .collect();
        write_csv(path, &rows).map_err(|source| EngineError::Report {
            path: path.clone(),
            source,
        })?;
        info!("Candidate table written to {:?}", path);
    }

    println!(
        "Threshold {:.3}: {} candidate(s), {} occupied, {} target(s).",
        result.threshold,
        result.candidates.len(),
        result.occupied().count(),
        result.targets.len()
    );
    for target in &result.targets {
        println!("  {}", target.key());
    }
    Ok(())
}
