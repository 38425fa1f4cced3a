// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Parallel boolean processing of independent entities
//!
//! Each entity (a base solid and the operands applied to it) is handled by
//! exactly one worker. Finished entities are sent over a channel to a
//! single aggregator thread, which owns the output and message maps.

use super::orchestrator::CsgOrchestrator;
use super::status::{MessageLog, StatusMessage};
use crate::config::GeomSettings;
use crate::geometry::{MeshSet, MeshStats};
use crate::kernel::CsgOperation;
use ahash::{AHashMap, AHashSet};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// One entity: a base solid and the operands combined with it
#[derive(Debug, Clone)]
pub struct EntityJob {
    pub id: String,
    pub base: MeshSet,
    pub operands: Vec<MeshSet>,
    pub operation: CsgOperation,
}

/// What a worker sends back for one entity
#[derive(Debug, Clone)]
pub struct EntityResult {
    pub id: String,
    pub result: Option<MeshSet>,
    pub success: bool,
    pub messages: Vec<StatusMessage>,
    pub kernel_calls: usize,
    pub duration_ms: u64,
}

/// Per-entity line of a [`BatchReport`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySummary {
    pub id: String,
    pub operation: CsgOperation,
    pub success: bool,
    pub kernel_calls: usize,
    pub duration_ms: u64,
    /// Absent when the result is empty
    pub stats: Option<MeshStats>,
    pub messages: Vec<StatusMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub worker_threads: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Sorted by entity id
    pub entities: Vec<EntitySummary>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Everything a batch run produced
#[derive(Debug, Default)]
pub struct BatchOutput {
    /// `None` for entities whose result is empty
    pub results: AHashMap<String, Option<MeshSet>>,
    pub messages: AHashMap<String, Vec<StatusMessage>>,
    pub report: Option<BatchReport>,
}

#[derive(Default)]
struct Aggregate {
    results: AHashMap<String, Option<MeshSet>>,
    messages: AHashMap<String, Vec<StatusMessage>>,
    seen: AHashMap<String, AHashSet<StatusMessage>>,
    summaries: Vec<EntitySummary>,
}

impl Aggregate {
    fn absorb(&mut self, result: EntityResult, operation: CsgOperation) {
        let seen = self.seen.entry(result.id.clone()).or_default();
        let messages = self.messages.entry(result.id.clone()).or_default();
        for message in &result.messages {
            if seen.insert(message.clone()) {
                messages.push(message.clone());
            }
        }

        self.summaries.push(EntitySummary {
            id: result.id.clone(),
            operation,
            success: result.success,
            kernel_calls: result.kernel_calls,
            duration_ms: result.duration_ms,
            stats: result.result.as_ref().map(MeshStats::analyze),
            messages: messages.clone(),
        });
        self.results.insert(result.id, result.result);
    }
}

/// Runs entity jobs on a worker pool
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    orchestrator: CsgOrchestrator,
    worker_threads: Option<usize>,
    show_progress: bool,
}

impl BatchProcessor {
    pub fn new(settings: GeomSettings) -> Self {
        let worker_threads = settings.worker_threads;
        Self {
            orchestrator: CsgOrchestrator::new(settings),
            worker_threads,
            show_progress: false,
        }
    }

    /// Use a custom orchestrator, e.g. with different kernels
    pub fn with_orchestrator(mut self, orchestrator: CsgOrchestrator) -> Self {
        self.worker_threads = orchestrator.settings().worker_threads;
        self.orchestrator = orchestrator;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Process one entity on the calling thread
    pub fn process(&self, job: EntityJob) -> EntityResult {
        let start = Instant::now();
        let log = Arc::new(MessageLog::new());
        let orchestrator = self.orchestrator.clone().with_sink(log.clone());
        let outcome = orchestrator.compute_against_many(&job.base, &job.operands, job.operation, Some(&job.id));
        debug!(entity = %job.id, success = outcome.success, kernel_calls = outcome.kernel_calls, "entity processed");

        EntityResult {
            id: job.id,
            result: outcome.result,
            success: outcome.success,
            messages: log.take(),
            kernel_calls: outcome.kernel_calls,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Process every job in parallel. A failing entity keeps its fallback
    /// result; only pool or aggregator setup failures return an error.
    pub fn run(&self, jobs: Vec<EntityJob>) -> Result<BatchOutput> {
        let started_at = Utc::now();
        let total = jobs.len();
        let operations: AHashMap<String, CsgOperation> =
            jobs.iter().map(|job| (job.id.clone(), job.operation)).collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_threads.unwrap_or(0))
            .thread_name(|i| format!("csg-worker-{i}"))
            .build()
            .context("Failed to build worker pool")?;
        let worker_threads = pool.current_num_threads();
        info!(entities = total, worker_threads, "starting batch");

        let progress = self.progress_bar(total);
        let (tx, rx) = mpsc::channel::<EntityResult>();

        let aggregate = std::thread::scope(|scope| {
            let aggregator = scope.spawn(|| aggregate(rx, &operations, progress));
            pool.install(|| {
                jobs.into_par_iter().with_min_len(1).for_each_with(tx, |tx, job| {
                    let result = self.process(job);
                    // The receiver only goes away if the aggregator panicked
                    let _ = tx.send(result);
                });
            });
            aggregator.join()
        })
        .map_err(|_| anyhow!("Batch aggregator thread panicked"))?;

        let Aggregate {
            results,
            messages,
            mut summaries,
            ..
        } = aggregate;
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        let succeeded = summaries.iter().filter(|s| s.success).count();
        let report = BatchReport {
            started_at,
            finished_at: Utc::now(),
            worker_threads,
            total,
            succeeded,
            failed: summaries.len() - succeeded,
            entities: summaries,
        };
        info!(total, succeeded, failed = report.failed, "batch finished");

        Ok(BatchOutput {
            results,
            messages,
            report: Some(report),
        })
    }

    fn progress_bar(&self, len: usize) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        Some(pb)
    }
}

fn aggregate(
    rx: Receiver<EntityResult>,
    operations: &AHashMap<String, CsgOperation>,
    progress: Option<ProgressBar>,
) -> Aggregate {
    let mut aggregate = Aggregate::default();
    for result in rx {
        if let Some(pb) = &progress {
            pb.set_message(result.id.clone());
            pb.inc(1);
        }
        let operation = operations.get(&result.id).copied().unwrap_or(CsgOperation::AMinusB);
        aggregate.absorb(result, operation);
    }
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    aggregate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csg::status::Severity;
    use crate::geometry::primitives;
    use nalgebra::Point3;

    fn result(id: &str, text: &str) -> EntityResult {
        EntityResult {
            id: id.to_string(),
            result: None,
            success: false,
            messages: vec![StatusMessage {
                text: text.to_string(),
                severity: Severity::Warning,
                origin: "compute_pair".to_string(),
                entity: Some(id.to_string()),
            }],
            kernel_calls: 0,
            duration_ms: 0,
        }
    }

    #[test]
    fn test_aggregator_dedups_messages_per_entity() {
        let (tx, rx) = mpsc::channel();
        tx.send(result("wall-1", "open edges")).unwrap();
        tx.send(result("wall-1", "open edges")).unwrap();
        tx.send(result("wall-2", "open edges")).unwrap();
        drop(tx);

        let aggregate = aggregate(rx, &AHashMap::new(), None);
        assert_eq!(aggregate.messages["wall-1"].len(), 1);
        assert_eq!(aggregate.messages["wall-2"].len(), 1);
        assert_eq!(aggregate.summaries.len(), 3);
        assert_eq!(aggregate.results.len(), 2);
    }

    #[test]
    fn test_process_single_entity() {
        let processor = BatchProcessor::new(GeomSettings::default());
        let job = EntityJob {
            id: "slab".into(),
            base: primitives::cuboid(Point3::origin(), Point3::new(4.0, 4.0, 1.0)),
            operands: vec![primitives::cuboid(Point3::new(10.0, 0.0, 0.0), Point3::new(11.0, 1.0, 1.0))],
            operation: CsgOperation::AMinusB,
        };
        let result = processor.process(job);
        assert!(result.success);
        assert_eq!(result.kernel_calls, 0);
        assert!(result.messages.is_empty());
    }
}
