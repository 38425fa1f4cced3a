// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Repair pipeline run on boolean operands and results

use super::{
    CollinearMerger, CoplanarMerger, MeshSetInfo, MeshValidator, OpenEdgeResolver, Retriangulator,
    ValidationParams,
};
use crate::config::GeomSettings;
use crate::error::CsgResult;
use crate::geometry::MeshSet;
use tracing::{debug, warn};

/// Run one pass on a scratch copy, keeping the original if the pass fails
fn run_pass<T>(
    mesh_set: &mut MeshSet,
    name: &'static str,
    pass: impl FnOnce(&mut MeshSet) -> CsgResult<T>,
) -> Option<T> {
    let mut scratch = mesh_set.clone();
    match pass(&mut scratch) {
        Ok(value) => {
            *mesh_set = scratch;
            Some(value)
        }
        Err(err) => {
            warn!(pass = name, %err, "repair pass failed, keeping previous mesh set");
            None
        }
    }
}

/// Resolve open edges, merge coplanar faces, remove collinear vertices and
/// optionally re-triangulate. Returns the diagnostics of the final set.
pub fn simplify_mesh_set(
    mesh_set: &mut MeshSet,
    settings: &GeomSettings,
    validation: &ValidationParams,
    triangulate: bool,
) -> MeshSetInfo {
    mesh_set.cache_edges();
    if mesh_set.num_open_edges() > 0 {
        let resolver = OpenEdgeResolver::new(settings, validation.epsilon);
        if let Some(caps) = run_pass(mesh_set, "open_edges", |set| resolver.resolve(set)) {
            debug!(caps, "open-boundary pass done");
        }
    }

    let coplanar = CoplanarMerger::new(settings);
    if let Some(merges) = run_pass(mesh_set, "coplanar", |set| coplanar.merge(set, validation)) {
        debug!(merges, "coplanar pass done");
    }

    let collinear = CollinearMerger::new(settings);
    if let Some(removed) = run_pass(mesh_set, "collinear", |set| collinear.merge(set, validation)) {
        debug!(removed, "collinear pass done");
    }

    if triangulate {
        let retriangulator = Retriangulator::new(*validation);
        run_pass(mesh_set, "triangulate", |set| retriangulator.triangulate(set, false));
    }

    MeshValidator::new(*validation).check(mesh_set)
}

/// Drop meshes enclosing less than `min_volume` in either orientation, such
/// as flat slivers left behind by a boolean. Returns how many were removed.
pub fn remove_degenerate_meshes(mesh_set: &mut MeshSet, min_volume: f64) -> usize {
    let before = mesh_set.meshes.len();
    let vertices = &mesh_set.vertices;
    mesh_set
        .meshes
        .retain(|mesh| mesh.signed_volume(vertices).abs() >= min_volume);
    let removed = before - mesh_set.meshes.len();
    if removed > 0 {
        mesh_set.collect_vertices();
        debug!(removed, "removed meshes without volume");
    }
    removed
}
