// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh repair passes
//!
//! Every pass works in place and leaves the mesh set untouched when it
//! cannot improve it.

mod collinear;
mod coplanar;
mod normalizer;
mod open_edges;
mod simplify;
mod triangulate;
mod validator;

pub use collinear::{merge_collinear_edges, CollinearMerger};
pub use coplanar::{merge_coplanar_faces, CoplanarMerger};
pub use normalizer::MeshNormalizer;
pub use open_edges::OpenEdgeResolver;
pub use simplify::{remove_degenerate_meshes, simplify_mesh_set};
pub use triangulate::Retriangulator;
pub use validator::{
    check_edge_pointers, count_degenerate_edges, is_better_for_bool_op, MeshSetInfo, MeshValidator,
    ValidationParams,
};
