// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CLI output reporter with colored formatting

use crate::csg::{BatchReport, CsgOutcome};
use crate::geometry::MeshStats;
use crate::kernel::CsgOperation;
use crate::repair::MeshSetInfo;
use colored::*;
use std::time::Duration;

/// CLI reporter for formatted output
pub struct Reporter;

impl Reporter {
    fn rule() {
        println!("{}", "━".repeat(80).bright_black());
    }

    fn header(label: &str, subject: &str) {
        println!();
        Self::rule();
        println!("{} {}", label.bold(), subject.cyan());
        Self::rule();
    }

    /// Report a pairwise or one-against-many boolean run
    pub fn report_boolean(op: CsgOperation, outcome: &CsgOutcome, stats: &MeshStats, duration: Duration) {
        Self::header("Boolean:", op.as_str());
        if outcome.success {
            println!("{} {}", "✅".green(), "Operation succeeded".green().bold());
        } else {
            println!("{} {}", "❌".red(), "Operation fell back to an operand".red().bold());
        }

        let trace: Vec<String> = outcome.states.iter().map(|s| s.to_string()).collect();
        println!("\n{}", "Pipeline:".bold());
        println!("  {} {}", "States:".bright_black(), trace.join(" → "));
        println!("  {} {}", "Kernel calls:".bright_black(), outcome.kernel_calls.to_string().cyan());

        println!("\n{}", "Result:".bold());
        if outcome.result.is_none() {
            println!("  {}", "empty".yellow());
        } else {
            Self::print_stats(stats);
        }

        println!("\n{}", "Performance:".bold());
        println!("  {} {}", "Time:".bright_black(), Self::format_duration(duration).yellow());
        Self::rule();
    }

    /// Report validator diagnostics for one file
    pub fn report_validation(file: &str, info: &MeshSetInfo) {
        Self::header("Validated:", file);
        if info.mesh_set_valid {
            println!("{} {}", "✅".green(), "Mesh set is valid".green().bold());
        } else {
            println!("{} {} {}", "❌".red(), "Mesh set is invalid:".red().bold(), info.details);
        }
        println!("\n{}", "Topology:".bold());
        Self::print_count("Faces", info.num_faces, false);
        Self::print_count("Closed edges", info.num_closed_edges, false);
        Self::print_count("Open edges", info.num_open_edges, true);
        Self::print_count("Degenerate edges", info.degenerate_edges, true);
        Self::print_count("Fin edges", info.fin_edges, true);
        Self::print_count("Zero-area faces", info.num_zero_area_faces, true);
        println!(
            "  {} {}",
            "Pointers:".bright_black(),
            if info.all_pointers_valid { "consistent".green() } else { "corrupt".red() }
        );
        println!("  {} {:.6}", "Surface area:".bright_black(), info.surface_area);
        Self::rule();
    }

    /// Report a repair run with before/after diagnostics
    pub fn report_repair(file: &str, before: &MeshSetInfo, after: &MeshSetInfo, stats: &MeshStats) {
        Self::header("Repaired:", file);
        let status = match (before.mesh_set_valid, after.mesh_set_valid) {
            (_, true) => format!("{} {}", "✅".green(), "Result is valid".green().bold()),
            (true, false) => format!("{} {}", "❌".red(), "Repair invalidated the mesh set".red().bold()),
            (false, false) => format!("{} {} {}", "⚠️ ".yellow(), "Still invalid:".yellow().bold(), after.details),
        };
        println!("{status}");
        println!("\n{}", "Changes:".bold());
        println!("  {} {} → {}", "Faces:".bright_black(), before.num_faces, after.num_faces.to_string().cyan());
        println!(
            "  {} {} → {}",
            "Open edges:".bright_black(),
            before.num_open_edges,
            after.num_open_edges.to_string().cyan()
        );
        println!("\n{}", "Result:".bold());
        Self::print_stats(stats);
        Self::rule();
    }

    pub fn report_batch(report: &BatchReport, duration: Duration) {
        Self::header("Batch:", &format!("{} entities", report.total));
        for entity in &report.entities {
            let mark = if entity.success { "✓".green() } else { "✗".red() };
            println!(
                "  {} {} {} {}",
                mark,
                entity.id.cyan(),
                format!("({}, {} kernel calls, {}ms)", entity.operation, entity.kernel_calls, entity.duration_ms)
                    .bright_black(),
                entity.messages.len().to_string().yellow()
            );
            for message in &entity.messages {
                println!("      {}", message.to_string().bright_black());
            }
        }
        println!(
            "\n  {} {}  {} {}  {} {}",
            "Succeeded:".bright_black(),
            report.succeeded.to_string().green(),
            "Failed:".bright_black(),
            report.failed.to_string().red(),
            "Workers:".bright_black(),
            report.worker_threads
        );
        println!("  {} {}", "Time:".bright_black(), Self::format_duration(duration).yellow());
        Self::rule();
    }

    /// Report error
    pub fn report_error(message: &str) {
        eprintln!("\n{} {}", "❌ Error:".red().bold(), message);
    }

    /// Report warning
    pub fn report_warning(message: &str) {
        println!("\n{} {}", "⚠️  Warning:".yellow().bold(), message);
    }

    /// Report info
    pub fn report_info(message: &str) {
        println!("{} {}", "ℹ️".bright_blue(), message);
    }

    /// Print success message
    pub fn success(message: &str) {
        println!("{} {}", "✅".green(), message.green());
    }

    fn print_stats(stats: &MeshStats) {
        let [x, y, z] = stats.size();
        println!("  {} {}", "Meshes:".bright_black(), stats.mesh_count.to_string().cyan());
        println!("  {} {}", "Vertices:".bright_black(), stats.vertex_count.to_string().cyan());
        println!("  {} {}", "Faces:".bright_black(), stats.face_count.to_string().cyan());
        println!("  {} {:.6}", "Volume:".bright_black(), stats.volume);
        println!("  {} {:.4} × {:.4} × {:.4}", "Size:".bright_black(), x, y, z);
        if !stats.is_closed {
            println!("  {} {}", "Open edges:".bright_black(), stats.open_edge_count.to_string().red());
        }
    }

    /// Counts that should be zero are shown red when they are not
    fn print_count(name: &str, value: usize, zero_expected: bool) {
        let text = value.to_string();
        let formatted = if !zero_expected {
            text.cyan()
        } else if value == 0 {
            text.green()
        } else {
            text.red()
        };
        println!("  {} {}", format!("{name}:").bright_black(), formatted);
    }

    /// Format duration for display
    pub fn format_duration(duration: Duration) -> String {
        let micros = duration.as_micros();

        if micros < 1_000 {
            format!("{}µs", micros)
        } else if micros < 1_000_000 {
            format!("{:.2}ms", micros as f64 / 1_000.0)
        } else {
            format!("{:.2}s", micros as f64 / 1_000_000.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(Reporter::format_duration(Duration::from_micros(500)), "500µs");
        assert_eq!(Reporter::format_duration(Duration::from_millis(5)), "5.00ms");
        assert_eq!(Reporter::format_duration(Duration::from_secs(2)), "2.00s");
    }
}
