// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polyframe CSG CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use polyframe_csg::cli::{Reporter, Runner};
use polyframe_csg::{CsgOperation, GeomSettings};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "polyframe-csg")]
#[command(version, about = "Polyframe CSG - mesh repair and fault-tolerant boolean operations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (TOML)
    #[arg(short, long, global = true, value_name = "TOML")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Combine two STL solids
    Boolean {
        /// First operand
        a: PathBuf,

        /// Second operand
        b: PathBuf,

        /// Operation: union, a-minus-b, b-minus-a, intersection
        #[arg(long, default_value = "a-minus-b")]
        op: CsgOperation,

        /// Output STL file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Check STL files for topological validity
    Validate {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Merge coplanar faces, remove collinear vertices and cap open boundaries
    Repair {
        input: PathBuf,

        /// Output STL file
        #[arg(short, long)]
        output: PathBuf,

        /// Re-triangulate the repaired faces
        #[arg(long)]
        triangulate: bool,
    },

    /// Process a JSON manifest of entities in parallel
    Batch {
        manifest: PathBuf,

        /// Report file (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Directory for result STL files
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Print the effective settings or write them to a file
    Config {
        #[arg(long, value_name = "PATH")]
        write: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "polyframe_csg=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_settings(path: Option<&Path>) -> Result<GeomSettings> {
    let mut settings = match path {
        Some(path) => GeomSettings::from_file(path)?,
        None => return GeomSettings::load(),
    };
    settings.apply_env_overrides();
    settings.check()?;
    Ok(settings)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let settings = load_settings(cli.config.as_deref())?;

    match &cli.command {
        Commands::Boolean { a, b, op, output } => {
            let run = Runner::new(settings).run_boolean(a, b, *op, Some(output))?;
            Reporter::report_boolean(*op, &run.outcome, &run.stats, run.duration);
            if !run.outcome.success {
                Reporter::report_warning("result is the fallback operand");
            }
        }
        Commands::Validate { files } => {
            let runner = Runner::new(settings);
            let mut invalid = 0;
            for file in files {
                match runner.run_validate(file) {
                    Ok(info) => {
                        if !info.mesh_set_valid {
                            invalid += 1;
                        }
                        Reporter::report_validation(&file.display().to_string(), &info);
                    }
                    Err(e) => {
                        invalid += 1;
                        Reporter::report_error(&format!("{e:#}"));
                    }
                }
            }
            if invalid > 0 {
                std::process::exit(1);
            }
        }
        Commands::Repair {
            input,
            output,
            triangulate,
        } => {
            let run = Runner::new(settings).run_repair(input, Some(output), *triangulate)?;
            let stats = polyframe_csg::MeshStats::analyze(&run.mesh_set);
            Reporter::report_repair(&input.display().to_string(), &run.before, &run.after, &stats);
            Reporter::report_info(&format!("Repaired in {}", Reporter::format_duration(run.duration)));
        }
        Commands::Batch {
            manifest,
            output,
            out_dir,
        } => {
            let (report, duration) = Runner::new(settings)
                .with_progress(true)
                .run_batch(manifest, output, out_dir.as_deref())?;
            Reporter::report_batch(&report, duration);
            Reporter::success(&format!("Report written to {}", output.display()));
        }
        Commands::Config { write } => match write {
            Some(path) => {
                settings.save(path)?;
                Reporter::success(&format!("Settings written to {}", path.display()));
            }
            None => {
                let text = toml::to_string_pretty(&settings).context("Failed to serialize settings")?;
                println!("{text}");
            }
        },
    }

    Ok(())
}
