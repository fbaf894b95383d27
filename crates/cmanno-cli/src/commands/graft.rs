use super::{Toolchain, Workspace, missing_donor, read_structure, reporter, resolve_donor};
use crate::cli::GraftArgs;
use crate::config::build_config;
use crate::error::Result;
use crate::ui::UiEvent;
use cmanno::core::io::pdb::PdbFile;
use cmanno::core::io::report::write_csv;
use cmanno::core::io::store::JobRecord;
use cmanno::core::io::traits::MolecularFile;
use cmanno::engine::error::EngineError;
use cmanno::engine::state::GraftOutcome;
use cmanno::workflows::pipeline::{self, PipelineConfig, UnitStatus};
use cmanno::workflows::regraft;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Detect, graft and validate one structure.
pub async fn run(args: GraftArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let config = build_config(&args.config, None)?;
    let donor = resolve_donor(args.donor.as_ref(), args.glycan_index, &config)
        .ok_or_else(missing_donor)?;
    let toolchain = Toolchain::new(&config)?;
    let workspace = Workspace::new(args.workspace.clone())?;

    let id = args
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "structure".to_string());
    let job = JobRecord {
        receiver_path: args.input.clone(),
        mtz_path: args.mtz.clone(),
        output_path: args.output.clone(),
        glycosylations: Vec::new(),
    };
    let pipeline_config = PipelineConfig {
        detection: config.detection.clone(),
        graft: config.graft.clone(),
        map: config.map.clone(),
        donor,
    };

    println!("Starting C-mannosylation grafting for '{}'...", id);
    let reporter = reporter(&ui_sender);
    let report = tokio::task::block_in_place(|| {
        pipeline::run_unit(
            &id,
            &job,
            toolchain.collaborators(),
            &pipeline_config,
            workspace.path(),
            &reporter,
        )
    })?;

    match report.status {
        UnitStatus::Grafted => println!(
            "✓ {} of {} graft(s) retained; model written to {} (summary: {}).",
            report.retained,
            report.targets,
            args.output.display(),
            pipeline::summary_path(&args.output).display()
        ),
        UnitStatus::NoTargets => println!("No C-mannosylation targets found; nothing written."),
        UnitStatus::Discarded => {
            warn!("Every graft was rejected by validation.");
            println!(
                "All {} graft(s) were rejected; no model written.",
                report.rejected
            );
        }
        UnitStatus::Failed => warn!(reason = ?report.reason, "Structure failed."),
    }
    Ok(())
}

/// Replace existing C-mannoses with fresh grafts and validate them.
pub async fn run_regraft(args: GraftArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let config = build_config(&args.config, None)?;
    let donor = resolve_donor(args.donor.as_ref(), args.glycan_index, &config)
        .ok_or_else(missing_donor)?;
    let toolchain = Toolchain::new(&config)?;
    let workspace = Workspace::new(args.workspace.clone())?;

    info!("Loading input structure from {:?}", &args.input);
    let structure = read_structure(&args.input)?;

    let reporter = reporter(&ui_sender);
    let result = tokio::task::block_in_place(|| {
        regraft::run(
            structure,
            &args.mtz,
            workspace.path(),
            &donor,
            toolchain.collaborators(),
            &config.graft,
            &config.map,
            &reporter,
        )
    })?;

    if result.removed.is_empty() {
        println!("No C-linked mannose found; nothing to regraft.");
        return Ok(());
    }
    for link in &result.removed {
        info!(
            sugar = %link.sugar,
            tryptophan = %link.tryptophan,
            distance = link.distance,
            "Stripped C-mannose."
        );
    }

    let report = &result.report;
    let Some(validated) = &report.structure else {
        println!(
            "Stripped {} sugar(s), but every regraft was rejected; no model written.",
            result.removed.len()
        );
        return Ok(());
    };
    PdbFile::write_to_path(validated, &args.output).map_err(|source| {
        EngineError::ModelWrite {
            path: args.output.clone(),
            source,
        }
    })?;
    let summary = pipeline::summary_path(&args.output);
    let rows: Vec<_> = report.outcomes.iter().map(GraftOutcome::summary_row).collect();
    write_csv(&summary, &rows).map_err(|source| EngineError::Report {
        path: summary.clone(),
        source,
    })?;
    println!(
        "✓ {} of {} regraft(s) retained after {} refinement pass(es); model written to {}.",
        report.retained().count(),
        report.outcomes.len(),
        report.refinement_passes,
        args.output.display()
    );
    Ok(())
}
