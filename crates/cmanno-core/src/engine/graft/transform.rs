use super::DensityTransform;
use crate::core::density::ccp4::Ccp4File;
use crate::core::density::grid::DensityGrid;
use crate::engine::config::MapConfig;
use crate::engine::error::EngineError;
use crate::engine::utils::process::{absolute_path, last_line, run_tool};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Computes maps with `gemmi sf2map` and normalizes them.
#[derive(Debug, Clone)]
pub struct GemmiTransform {
    program: PathBuf,
    sample_rate: f64,
}

impl GemmiTransform {
    pub fn new(config: &MapConfig) -> Self {
        Self {
            program: config.program.clone(),
            sample_rate: config.sample_rate,
        }
    }

    fn arguments(&self, mtz: &Path, amplitude: &str, phase: &str, out: &Path) -> Vec<OsString> {
        vec![
            "sf2map".into(),
            format!("--sample={}", self.sample_rate).into(),
            "-f".into(),
            amplitude.into(),
            "-p".into(),
            phase.into(),
            mtz.as_os_str().to_owned(),
            out.as_os_str().to_owned(),
        ]
    }
}

impl DensityTransform for GemmiTransform {
    fn compute_map(
        &self,
        mtz: &Path,
        amplitude: &str,
        phase: &str,
        workspace: &Path,
    ) -> Result<DensityGrid, EngineError> {
        let workspace = absolute_path(workspace)?;
        let out = workspace.join(format!("{amplitude}-{phase}.ccp4"));
        let output = run_tool(
            &self.program,
            self.arguments(&absolute_path(mtz)?, amplitude, phase, &out),
            None,
            &workspace,
        )?;
        if !output.status.success() || !out.is_file() {
            return Err(EngineError::ToolFailed {
                tool: self.program.display().to_string(),
                message: format!(
                    "sf2map {amplitude}/{phase} exited {}: {}",
                    output.status,
                    last_line(&output.stderr)
                ),
            });
        }
        let mut grid = Ccp4File::read_from_path(&out)?;
        grid.normalize();
        debug!(
            columns = %format!("{amplitude}/{phase}"),
            sampling = ?grid.sampling(),
            "Computed normalized map."
        );
        Ok(grid)
    }
}

/// Reads a precomputed map instead of transforming reflections.
///
/// Useful when the caller already has a CCP4 map for the data; the reflection path and
/// columns are ignored.
#[derive(Debug, Clone)]
pub struct PrecomputedMap {
    path: PathBuf,
    normalize: bool,
}

impl PrecomputedMap {
    pub fn new(path: impl Into<PathBuf>, normalize: bool) -> Self {
        Self {
            path: path.into(),
            normalize,
        }
    }
}

impl DensityTransform for PrecomputedMap {
    fn compute_map(
        &self,
        _mtz: &Path,
        _amplitude: &str,
        _phase: &str,
        _workspace: &Path,
    ) -> Result<DensityGrid, EngineError> {
        let mut grid = Ccp4File::read_from_path(&self.path)?;
        if self.normalize {
            grid.normalize();
        }
        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::density::cell::UnitCell;
    use ndarray::Array3;
    use tempfile::tempdir;

    #[test]
    fn sf2map_arguments_carry_sample_rate_and_columns() {
        let transform = GemmiTransform::new(&MapConfig::default());
        let args = transform.arguments(
            Path::new("in.mtz"),
            "DELFWT",
            "PHDELWT",
            Path::new("out.ccp4"),
        );
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec!["sf2map", "--sample=2", "-f", "DELFWT", "-p", "PHDELWT", "in.mtz", "out.ccp4"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn relative_reflections_and_workspace_reach_sf2map() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let fixtures = tempdir().unwrap();
        let map = fixtures.path().join("fixture.ccp4");
        let cell = UnitCell::orthogonal(4.0, 4.0, 4.0).unwrap();
        let mut data = Array3::zeros((4, 4, 4));
        data[[2, 2, 2]] = 3.0;
        Ccp4File::write_to_path(&DensityGrid::periodic(cell, data).unwrap(), &map).unwrap();
        let program = fixtures.path().join("fake-gemmi.sh");
        fs::write(
            &program,
            format!(
                "#!/bin/sh\n[ -f \"$7\" ] || {{ echo \"$7 missing\" >&2; exit 1; }}\ncp '{}' \"$8\"\n",
                map.display()
            ),
        )
        .unwrap();
        fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).unwrap();

        let dir = tempfile::tempdir_in(".").unwrap();
        let mtz = dir.path().join("data.mtz");
        fs::write(&mtz, b"").unwrap();
        let workspace = dir.path().join("scratch");
        fs::create_dir(&workspace).unwrap();
        let config = MapConfig {
            program,
            ..MapConfig::default()
        };

        let grid = GemmiTransform::new(&config)
            .compute_map(&mtz, "DELFWT", "PHDELWT", &workspace)
            .unwrap();
        assert!(grid.mean().abs() < 1e-6);
        assert!(workspace.join("DELFWT-PHDELWT.ccp4").is_file());
    }

    #[test]
    fn precomputed_map_is_read_and_normalized() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.ccp4");
        let cell = UnitCell::orthogonal(4.0, 4.0, 4.0).unwrap();
        let mut data = Array3::zeros((4, 4, 4));
        data[[1, 1, 1]] = 8.0;
        let grid = DensityGrid::periodic(cell, data).unwrap();
        Ccp4File::write_to_path(&grid, &path).unwrap();

        let map = PrecomputedMap::new(&path, true)
            .compute_map(Path::new("unused.mtz"), "F", "PHI", dir.path())
            .unwrap();
        assert!(map.mean().abs() < 1e-6);
        assert!((map.rms() - 1.0).abs() < 1e-5);
    }
}
