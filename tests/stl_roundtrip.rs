// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! STL files, manifests and settings on disk

use anyhow::Result;
use approx::assert_relative_eq;
use nalgebra::Point3;
use polyframe_csg::cli::Runner;
use polyframe_csg::geometry::primitives;
use polyframe_csg::io::{export_stl, load_report, load_stl, BatchManifest, ManifestEntry};
use polyframe_csg::repair::ValidationParams;
use polyframe_csg::{compute_boolean, CsgOperation, GeomSettings, MeshSet, MeshValidator};
use tempfile::TempDir;

fn cube(min: [f64; 3], max: [f64; 3]) -> MeshSet {
    primitives::cuboid(Point3::from(min), Point3::from(max))
}

#[test]
fn test_boolean_result_survives_stl() -> Result<()> {
    let dir = TempDir::new()?;
    let settings = GeomSettings::default();
    let a = cube([0.0; 3], [2.0, 1.0, 1.0]);
    let b = cube([0.5, -0.5, 0.25], [1.5, 1.5, 0.75]);

    let outcome = compute_boolean(&a, &b, CsgOperation::AMinusB, &settings);
    assert!(outcome.success);
    let result = outcome.result.expect("result");
    let path = dir.path().join("notched.stl");
    export_stl(&result, &path)?;

    let mut loaded = load_stl(&path, settings.csg_epsilon)?;
    assert_relative_eq!(loaded.volume(), result.volume(), epsilon = 1e-5);
    assert_relative_eq!(loaded.volume(), 1.5, epsilon = 1e-5);

    // Single precision on disk; welding must still close every edge
    let validator = MeshValidator::new(ValidationParams::new(&settings, settings.csg_epsilon));
    let info = validator.check(&mut loaded);
    assert!(info.mesh_set_valid, "{info}");
    assert_eq!(info.num_open_edges, 0);
    Ok(())
}

#[test]
fn test_manifest_batch_writes_report_and_results() -> Result<()> {
    let dir = TempDir::new()?;
    export_stl(&cube([0.0; 3], [4.0, 1.0, 3.0]), dir.path().join("wall.stl"))?;
    export_stl(&cube([1.0, -0.5, 1.0], [2.0, 1.5, 2.0]), dir.path().join("door.stl"))?;
    export_stl(&cube([10.0; 3], [11.0; 3]), dir.path().join("far.stl"))?;

    let manifest = BatchManifest::new(vec![
        ManifestEntry {
            id: "wall/1".into(),
            base: "wall.stl".into(),
            operands: vec!["door.stl".into()],
            operation: CsgOperation::AMinusB,
        },
        ManifestEntry {
            id: "wall/2".into(),
            base: "wall.stl".into(),
            operands: vec!["far.stl".into()],
            operation: CsgOperation::AMinusB,
        },
    ]);
    let manifest_path = dir.path().join("batch.json");
    manifest.save(&manifest_path)?;

    let settings = GeomSettings {
        worker_threads: Some(2),
        ..GeomSettings::default()
    };
    let report_path = dir.path().join("report.json");
    let out_dir = dir.path().join("out");
    let (report, _) = Runner::new(settings.clone()).run_batch(&manifest_path, &report_path, Some(&out_dir))?;

    assert_eq!(report.total, 2);
    assert!(report.all_succeeded());

    let reloaded = load_report(&report_path)?;
    assert_eq!(reloaded.total, 2);
    assert_eq!(reloaded.entities[0].id, "wall/1");
    assert_eq!(reloaded.entities[1].id, "wall/2");

    let drilled = load_stl(out_dir.join("wall_1.stl"), settings.csg_epsilon)?;
    assert_relative_eq!(drilled.volume(), 11.0, epsilon = 1e-4);
    let untouched = load_stl(out_dir.join("wall_2.stl"), settings.csg_epsilon)?;
    assert_relative_eq!(untouched.volume(), 12.0, epsilon = 1e-4);
    Ok(())
}

#[test]
fn test_settings_toml_round_trip() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("csg.toml");
    let settings = GeomSettings {
        csg_epsilon: 1e-6,
        worker_threads: Some(3),
        ..GeomSettings::default()
    };
    settings.save(&path)?;

    let loaded = GeomSettings::from_file(&path)?;
    assert_eq!(loaded.csg_epsilon, 1e-6);
    assert_eq!(loaded.worker_threads, Some(3));
    assert_eq!(loaded.csg_variants, settings.csg_variants);
    Ok(())
}

#[test]
fn test_settings_without_variants_are_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("csg.toml");
    let settings = GeomSettings {
        csg_variants: Vec::new(),
        ..GeomSettings::default()
    };
    let text = toml::to_string_pretty(&settings)?;
    std::fs::write(&path, text)?;

    assert!(GeomSettings::from_file(&path).is_err());
    Ok(())
}
