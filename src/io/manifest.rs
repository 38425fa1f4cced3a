// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! JSON batch manifests and reports

use super::stl::load_stl;
use crate::csg::{BatchReport, EntityJob};
use crate::kernel::CsgOperation;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_operation() -> CsgOperation {
    CsgOperation::AMinusB
}

/// One entity in a manifest. Paths are relative to the manifest file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    pub base: PathBuf,
    #[serde(default)]
    pub operands: Vec<PathBuf>,
    #[serde(default = "default_operation")]
    pub operation: CsgOperation,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchManifest {
    pub entities: Vec<ManifestEntry>,
    #[serde(skip)]
    root: PathBuf,
}

impl BatchManifest {
    /// A manifest whose relative paths resolve against the working directory
    pub fn new(entities: Vec<ManifestEntry>) -> Self {
        Self {
            entities,
            root: PathBuf::new(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let mut manifest: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))?;
        manifest.root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(manifest)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self).context("Failed to serialize manifest")?;
        fs::write(path, content).with_context(|| format!("Failed to write manifest: {}", path.display()))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Load every referenced STL file
    pub fn into_jobs(self, eps: f64) -> Result<Vec<EntityJob>> {
        let mut jobs = Vec::with_capacity(self.entities.len());
        for entry in &self.entities {
            let base = load_stl(self.resolve(&entry.base), eps)
                .with_context(|| format!("Entity {}: failed to load base", entry.id))?;
            let operands = entry
                .operands
                .iter()
                .map(|operand| load_stl(self.resolve(operand), eps))
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("Entity {}: failed to load operands", entry.id))?;
            jobs.push(EntityJob {
                id: entry.id.clone(),
                base,
                operands,
                operation: entry.operation,
            });
        }
        Ok(jobs)
    }
}

pub fn save_report(report: &BatchReport, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let content = serde_json::to_string_pretty(report).context("Failed to serialize batch report")?;
    fs::write(path, content).with_context(|| format!("Failed to write report: {}", path.display()))
}

pub fn load_report(path: impl AsRef<Path>) -> Result<BatchReport> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read report: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse report: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives;
    use crate::io::export_stl;
    use nalgebra::Point3;
    use tempfile::TempDir;

    #[test]
    fn test_manifest_resolves_relative_paths() -> Result<()> {
        let dir = TempDir::new()?;
        export_stl(&primitives::cuboid(Point3::origin(), Point3::new(2.0, 2.0, 2.0)), dir.path().join("wall.stl"))?;
        export_stl(
            &primitives::cuboid(Point3::new(0.5, 0.5, -1.0), Point3::new(1.5, 1.5, 3.0)),
            dir.path().join("hole.stl"),
        )?;
        let manifest_path = dir.path().join("batch.json");
        fs::write(
            &manifest_path,
            r#"{ "entities": [ { "id": "wall-1", "base": "wall.stl", "operands": ["hole.stl"] } ] }"#,
        )?;

        let jobs = BatchManifest::load(&manifest_path)?.into_jobs(1e-6)?;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].operation, CsgOperation::AMinusB);
        assert_eq!(jobs[0].operands.len(), 1);
        assert_eq!(jobs[0].base.num_vertices(), 8);
        Ok(())
    }

    #[test]
    fn test_missing_operand_file_fails() -> Result<()> {
        let dir = TempDir::new()?;
        let manifest_path = dir.path().join("batch.json");
        fs::write(
            &manifest_path,
            r#"{ "entities": [ { "id": "e", "base": "nope.stl", "operation": "union" } ] }"#,
        )?;
        let err = BatchManifest::load(&manifest_path)?.into_jobs(1e-6).unwrap_err();
        assert!(format!("{err:#}").contains("Entity e"));
        Ok(())
    }
}
