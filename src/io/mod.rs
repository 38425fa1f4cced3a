// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! I/O module - STL files, batch manifests and reports

mod manifest;
mod stl;

pub use manifest::{load_report, save_report, BatchManifest, ManifestEntry};
pub use stl::{export_stl, load_stl, read_stl, write_stl};
