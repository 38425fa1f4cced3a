// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Command execution for the CLI: load, run, write

use crate::config::GeomSettings;
use crate::csg::{BatchProcessor, BatchReport, CsgOrchestrator, CsgOutcome};
use crate::geometry::{MeshSet, MeshStats};
use crate::io::{self, BatchManifest};
use crate::kernel::CsgOperation;
use crate::repair::{simplify_mesh_set, MeshSetInfo, MeshValidator, ValidationParams};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

/// Result of a boolean command
pub struct BooleanRun {
    pub outcome: CsgOutcome,
    pub stats: MeshStats,
    pub duration: Duration,
}

/// Result of a repair command
pub struct RepairRun {
    pub before: MeshSetInfo,
    pub after: MeshSetInfo,
    pub mesh_set: MeshSet,
    pub duration: Duration,
}

/// Runner for executing CLI commands
pub struct Runner {
    settings: GeomSettings,
    show_progress: bool,
}

impl Runner {
    pub fn new(settings: GeomSettings) -> Self {
        Self {
            settings,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn settings(&self) -> &GeomSettings {
        &self.settings
    }

    fn load(&self, path: &Path) -> Result<MeshSet> {
        io::load_stl(path, self.settings.csg_epsilon)
    }

    fn validator(&self) -> MeshValidator {
        MeshValidator::new(ValidationParams::new(&self.settings, self.settings.csg_epsilon))
    }

    /// Combine two STL files, optionally writing the result
    pub fn run_boolean(&self, a: &Path, b: &Path, op: CsgOperation, output: Option<&Path>) -> Result<BooleanRun> {
        let mesh_a = self.load(a)?;
        let mesh_b = self.load(b)?;

        let start = Instant::now();
        let outcome = CsgOrchestrator::new(self.settings.clone()).compute(&mesh_a, &mesh_b, op);
        let duration = start.elapsed();

        let stats = outcome.result.as_ref().map(MeshStats::analyze).unwrap_or_else(MeshStats::empty);
        if let Some(output) = output {
            let result = outcome.result.clone().unwrap_or_default();
            io::export_stl(&result, output).context("Failed to export boolean result")?;
        }
        Ok(BooleanRun {
            outcome,
            stats,
            duration,
        })
    }

    pub fn run_validate(&self, path: &Path) -> Result<MeshSetInfo> {
        let mut mesh_set = self.load(path)?;
        Ok(self.validator().check(&mut mesh_set))
    }

    /// Run the simplify pipeline on one file
    pub fn run_repair(&self, input: &Path, output: Option<&Path>, triangulate: bool) -> Result<RepairRun> {
        let mut mesh_set = self.load(input)?;
        let validator = self.validator();
        let before = validator.check(&mut mesh_set);

        let start = Instant::now();
        let after = simplify_mesh_set(&mut mesh_set, &self.settings, validator.params(), triangulate);
        let duration = start.elapsed();

        if let Some(output) = output {
            io::export_stl(&mesh_set, output).context("Failed to export repaired mesh")?;
        }
        Ok(RepairRun {
            before,
            after,
            mesh_set,
            duration,
        })
    }

    /// Run a manifest in parallel, write the JSON report and optionally every result
    pub fn run_batch(&self, manifest: &Path, report_path: &Path, out_dir: Option<&Path>) -> Result<(BatchReport, Duration)> {
        let jobs = BatchManifest::load(manifest)?.into_jobs(self.settings.csg_epsilon)?;

        let start = Instant::now();
        let output = BatchProcessor::new(self.settings.clone())
            .with_progress(self.show_progress)
            .run(jobs)?;
        let duration = start.elapsed();

        if let Some(dir) = out_dir {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
            for (id, result) in &output.results {
                if let Some(mesh_set) = result {
                    io::export_stl(mesh_set, dir.join(format!("{}.stl", file_stem(id))))?;
                }
            }
        }

        let report = output.report.context("Batch produced no report")?;
        io::save_report(&report, report_path)?;
        Ok((report, duration))
    }
}

/// Entity ids as safe file names
fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives;
    use nalgebra::Point3;
    use tempfile::TempDir;

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("wall/12 a"), "wall_12_a");
        assert_eq!(file_stem("door-3_b"), "door-3_b");
    }

    #[test]
    fn test_validate_and_repair_files() -> Result<()> {
        let dir = TempDir::new()?;
        let input = dir.path().join("block.stl");
        io::export_stl(&primitives::cuboid(Point3::origin(), Point3::new(3.0, 2.0, 1.0)), &input)?;

        let runner = Runner::new(GeomSettings::default());
        assert!(runner.run_validate(&input)?.mesh_set_valid);

        let output = dir.path().join("block_repaired.stl");
        let run = runner.run_repair(&input, Some(&output), false)?;
        assert!(run.after.mesh_set_valid);
        assert_eq!(run.after.num_faces, 6);
        assert!(output.exists());
        Ok(())
    }
}
