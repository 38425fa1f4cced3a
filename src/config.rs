// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry settings: tolerances, ceilings and retry variants

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default settings file looked up by [`GeomSettings::load`]
pub const DEFAULT_SETTINGS_FILE: &str = "polyframe-csg.toml";

/// One parameter variant for a pairwise boolean attempt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CsgOperationParams {
    /// Multiplier applied to `csg_epsilon`
    pub epsilon_factor: f64,
    /// Map operands into a unit frame before computing
    pub normalize_coords: bool,
    /// Accept degenerate edges in operands and result
    pub allow_degenerate_edges: bool,
    /// Accept fin edges in the result
    pub allow_fin_edges_in_result: bool,
}

impl CsgOperationParams {
    pub const fn new(
        epsilon_factor: f64,
        normalize_coords: bool,
        allow_degenerate_edges: bool,
        allow_fin_edges_in_result: bool,
    ) -> Self {
        Self {
            epsilon_factor,
            normalize_coords,
            allow_degenerate_edges,
            allow_fin_edges_in_result,
        }
    }

    /// Ordered retry list used by the one-against-many entry point
    pub fn default_variants() -> Vec<Self> {
        vec![
            Self::new(1.0, true, false, false),
            Self::new(1.0, true, true, false),
            Self::new(15.3, true, true, false),
            Self::new(0.11, true, true, false),
            Self::new(1.0, true, true, true),
            Self::new(1.0, false, true, false),
        ]
    }
}

impl Default for CsgOperationParams {
    fn default() -> Self {
        Self::new(1.0, true, false, false)
    }
}

/// Tolerances and cost ceilings for repair passes and boolean operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeomSettings {
    /// Maximum distance of a vertex from a plane to count as coplanar
    pub eps_coplanar_distance: f64,
    /// Maximum `1 - cos(angle)` between two face normals to count as coplanar
    pub eps_coplanar_angle: f64,
    /// Maximum edge count of a merged face
    pub max_num_face_edges: usize,
    /// Base tolerance for boolean classification and vertex welding
    pub csg_epsilon: f64,
    /// Operands with more vertices are not processed
    pub max_operand_vertices: usize,
    /// Meshes with more faces are not merged
    pub max_faces_to_merge: usize,
    /// Open-boundary resolution gives up above this many open edges
    pub max_open_edges_to_resolve: usize,
    /// Open-boundary resolution gives up above this many faces
    pub max_faces_to_resolve: usize,
    /// Meshes with fewer faces are not capped
    pub min_faces_to_resolve: usize,
    /// Edge loops longer than this are reported as corrupt
    pub max_loop_edges: usize,
    /// Maximum `||cos| - 1|` between two chained edges to count as collinear
    pub collinear_tolerance: f64,
    /// A_MINUS_B results must keep this share of `vol(a) - vol(b)`
    pub min_result_volume_ratio: f64,
    /// Worker threads for batch processing (`None` uses all cores)
    pub worker_threads: Option<usize>,
    /// Ordered retry variants for the one-against-many case
    pub csg_variants: Vec<CsgOperationParams>,
}

impl Default for GeomSettings {
    fn default() -> Self {
        Self {
            eps_coplanar_distance: 1e-6,
            eps_coplanar_angle: 1e-6,
            max_num_face_edges: 10_000,
            csg_epsilon: 1e-7,
            max_operand_vertices: 4000,
            max_faces_to_merge: 600,
            max_open_edges_to_resolve: 1000,
            max_faces_to_resolve: 5000,
            min_faces_to_resolve: 6,
            max_loop_edges: 10_000,
            collinear_tolerance: 0.001,
            min_result_volume_ratio: 0.99,
            worker_threads: None,
            csg_variants: CsgOperationParams::default_variants(),
        }
    }
}

impl GeomSettings {
    /// Load settings from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read settings file: {:?}", path.as_ref()))?;
        let settings: GeomSettings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {:?}", path.as_ref()))?;
        settings.check()?;
        Ok(settings)
    }

    /// Load settings from the default file if present, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut settings = if PathBuf::from(DEFAULT_SETTINGS_FILE).exists() {
            Self::from_file(DEFAULT_SETTINGS_FILE)?
        } else {
            Self::default()
        };
        settings.apply_env_overrides();
        settings.check()?;
        Ok(settings)
    }

    /// Apply `POLYFRAME_CSG_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        if let Some(eps) = env_parse::<f64>("POLYFRAME_CSG_EPSILON") {
            self.csg_epsilon = eps;
        }
        if let Some(dist) = env_parse::<f64>("POLYFRAME_CSG_COPLANAR_DISTANCE") {
            self.eps_coplanar_distance = dist;
        }
        if let Some(limit) = env_parse::<usize>("POLYFRAME_CSG_MAX_VERTICES") {
            self.max_operand_vertices = limit;
        }
        if let Some(threads) = env_parse::<usize>("POLYFRAME_CSG_THREADS") {
            self.worker_threads = Some(threads);
        }
    }

    /// Save settings to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write settings file: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Reject settings that would make every comparison fail
    pub fn check(&self) -> Result<()> {
        if !(self.csg_epsilon > 0.0 && self.csg_epsilon.is_finite()) {
            anyhow::bail!("csg_epsilon must be positive, got {}", self.csg_epsilon);
        }
        if self.eps_coplanar_distance < 0.0 || self.eps_coplanar_angle < 0.0 {
            anyhow::bail!("coplanarity tolerances must not be negative");
        }
        if self.max_num_face_edges < 3 {
            anyhow::bail!("max_num_face_edges must be at least 3");
        }
        if self.csg_variants.is_empty() {
            anyhow::bail!("at least one csg variant is required");
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.trim().parse().ok())
}
