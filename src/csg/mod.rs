// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Fault-tolerant boolean operations: orchestration, diagnostics and batches

mod batch;
mod orchestrator;
mod status;

pub use batch::{BatchOutput, BatchProcessor, BatchReport, EntityJob, EntityResult, EntitySummary};
pub use orchestrator::{fallback_result, CsgOrchestrator, CsgOutcome, CsgState};
pub use status::{MessageLog, NullSink, Severity, StatusMessage, StatusSink, TracingSink};
