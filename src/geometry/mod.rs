// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - half-edge mesh representation and measurements

mod analytics;
mod bbox;
mod builder;
mod halfedge;
pub mod primitives;

pub use analytics::MeshStats;
pub use bbox::BoundingBox;
pub use builder::PolyhedronBuilder;
pub use halfedge::{Face, FaceEdges, HalfEdge, Mesh, MeshSet};
pub use primitives::Primitive;
