// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Boolean operation state machine
//!
//! A pairwise operation walks
//! `RejectTrivial → Normalize → SimplifyOperandA → SimplifyOperandB →
//! ValidateOperands → Classify → ValidateResult` and ends in `Success` or
//! `Fail`. A subtraction whose minuend has cavities first tries
//! `SeparateInnerMeshes`. An invalid result is repaired and validated again
//! before it is rejected. A rejected result is retried once with coplanar
//! faces merged on the first operand and the normal-based strategy, then
//! once more on the alternate engine. Whatever goes wrong, the caller gets
//! the fallback result for the operation instead of an error.

use super::status::{Severity, StatusSink, TracingSink};
use crate::config::{CsgOperationParams, GeomSettings};
use crate::error::{CsgError, CsgResult};
use crate::geometry::MeshSet;
use crate::kernel::{BooleanKernel, BspKernel, ClassificationStrategy, CsgOperation, FragmentKernel};
use crate::repair::{
    is_better_for_bool_op, remove_degenerate_meshes, simplify_mesh_set, CoplanarMerger, MeshNormalizer, MeshSetInfo,
    MeshValidator, ValidationParams,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

const ORIGIN_PAIR: &str = "compute_pair";
const ORIGIN_MANY: &str = "compute_against_many";

/// Operands below this many vertices or faces after simplification are rejected
const MIN_OPERAND_ELEMENTS: usize = 4;

/// Tolerance band for result plausibility checks, in multiples of the epsilon
const PLAUSIBILITY_BAND_FACTOR: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CsgState {
    RejectTrivial,
    Normalize,
    SimplifyOperandA,
    SimplifyOperandB,
    ValidateOperands,
    SeparateInnerMeshes,
    Classify,
    ValidateResult,
    RetryWithMergedFaces,
    RetryWithAlternateEngine,
    Success,
    Fail,
}

impl fmt::Display for CsgState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RejectTrivial => "reject-trivial",
            Self::Normalize => "normalize",
            Self::SimplifyOperandA => "simplify-operand-a",
            Self::SimplifyOperandB => "simplify-operand-b",
            Self::ValidateOperands => "validate-operands",
            Self::SeparateInnerMeshes => "separate-inner-meshes",
            Self::Classify => "classify",
            Self::ValidateResult => "validate-result",
            Self::RetryWithMergedFaces => "retry-with-merged-faces",
            Self::RetryWithAlternateEngine => "retry-with-alternate-engine",
            Self::Success => "success",
            Self::Fail => "fail",
        };
        f.write_str(name)
    }
}

/// Result of a boolean operation
#[derive(Debug, Clone)]
pub struct CsgOutcome {
    /// `None` stands for an empty result
    pub result: Option<MeshSet>,
    pub success: bool,
    /// Every state visited, in order
    pub states: Vec<CsgState>,
    /// Number of boolean kernel invocations
    pub kernel_calls: usize,
}

impl CsgOutcome {
    pub fn visited(&self, state: CsgState) -> bool {
        self.states.contains(&state)
    }
}

/// Result assigned when an operation is skipped or cannot be computed:
/// the minuend for subtractions, the first operand for unions and nothing
/// for intersections.
pub fn fallback_result(op: CsgOperation, a: Option<&MeshSet>, b: Option<&MeshSet>) -> Option<MeshSet> {
    match op {
        CsgOperation::AMinusB => a.cloned(),
        CsgOperation::BMinusA => b.cloned(),
        CsgOperation::Union => a.or(b).cloned(),
        CsgOperation::Intersection => None,
    }
}

struct Trace<'e> {
    states: Vec<CsgState>,
    kernel_calls: usize,
    entity: Option<&'e str>,
}

impl<'e> Trace<'e> {
    fn new(entity: Option<&'e str>) -> Self {
        Self {
            states: Vec::new(),
            kernel_calls: 0,
            entity,
        }
    }

    fn entity(&self) -> &str {
        self.entity.unwrap_or("-")
    }

    fn enter(&mut self, state: CsgState) {
        debug!(entity = self.entity(), %state, "csg state");
        self.states.push(state);
    }

    fn finish(mut self, result: Option<MeshSet>, success: bool) -> CsgOutcome {
        self.enter(if success { CsgState::Success } else { CsgState::Fail });
        CsgOutcome {
            result,
            success,
            states: self.states,
            kernel_calls: self.kernel_calls,
        }
    }
}

/// A rejected kernel output, kept to compare attempts
struct Candidate {
    info: MeshSetInfo,
    mesh_set: MeshSet,
    /// Valid and plausible, held back only for its degenerate edges
    usable: bool,
}

impl Candidate {
    fn rejected(info: MeshSetInfo, mesh_set: MeshSet) -> Self {
        Self {
            info,
            mesh_set,
            usable: false,
        }
    }
}

enum Verdict {
    /// `None` is an accepted empty result
    Accept(Option<MeshSet>),
    Reject(Option<Candidate>, String),
}

/// Frame and tolerances shared by every attempt of one pairwise run
struct PairContext<'w> {
    op: CsgOperation,
    a: &'w MeshSet,
    b: &'w MeshSet,
    eps: f64,
    validator: MeshValidator,
}

/// Drives boolean operations through repair, classification and retries
#[derive(Clone)]
pub struct CsgOrchestrator {
    settings: GeomSettings,
    primary: Arc<dyn BooleanKernel>,
    alternate: Option<Arc<dyn BooleanKernel>>,
    sink: Arc<dyn StatusSink>,
}

impl fmt::Debug for CsgOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsgOrchestrator")
            .field("primary", &self.primary.name())
            .field("alternate", &self.alternate.as_ref().map(|k| k.name()))
            .finish_non_exhaustive()
    }
}

impl CsgOrchestrator {
    /// BSP kernel first, fragment kernel as the alternate engine
    pub fn new(settings: GeomSettings) -> Self {
        Self {
            settings,
            primary: Arc::new(BspKernel::new()),
            alternate: Some(Arc::new(FragmentKernel::new())),
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_kernel(mut self, kernel: Arc<dyn BooleanKernel>) -> Self {
        self.primary = kernel;
        self
    }

    pub fn with_alternate(mut self, kernel: Option<Arc<dyn BooleanKernel>>) -> Self {
        self.alternate = kernel;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn settings(&self) -> &GeomSettings {
        &self.settings
    }

    /// Pairwise operation with the first configured variant
    pub fn compute(&self, a: &MeshSet, b: &MeshSet, op: CsgOperation) -> CsgOutcome {
        let params = self.settings.csg_variants.first().copied().unwrap_or_default();
        self.compute_pair(Some(a), Some(b), op, &params, None)
    }

    /// Run the full state machine on one operand pair
    pub fn compute_pair(
        &self,
        a: Option<&MeshSet>,
        b: Option<&MeshSet>,
        op: CsgOperation,
        params: &CsgOperationParams,
        entity: Option<&str>,
    ) -> CsgOutcome {
        let mut trace = Trace::new(entity);
        trace.enter(CsgState::RejectTrivial);

        let (Some(op_a), Some(op_b)) = (a, b) else {
            return self.settle(trace, fallback_result(op, a, b), false, "operand is missing");
        };
        if std::ptr::eq(op_a, op_b) {
            let result = match op {
                CsgOperation::Intersection => Some(op_a.clone()),
                _ => fallback_result(op, a, b),
            };
            return self.settle(trace, result, true, "operands are the same instance");
        }
        if op_a.is_empty() || op_b.is_empty() {
            let result = match op {
                CsgOperation::Union => [op_a, op_b].into_iter().find(|set| !set.is_empty()).cloned(),
                CsgOperation::Intersection => None,
                _ => fallback_result(op, a, b).filter(|set| !set.is_empty()),
            };
            return self.settle(trace, result, true, "operand is empty");
        }

        let limit = self.settings.max_operand_vertices;
        for (name, operand) in [("first", op_a), ("second", op_b)] {
            let count = operand.num_vertices();
            if count > limit {
                let err = CsgError::LimitExceeded {
                    what: "operand vertex",
                    count,
                    limit,
                };
                let reason = format!("{name} operand skipped: {err}");
                return self.settle(trace, fallback_result(op, a, b), false, &reason);
            }
        }

        let eps = self.settings.csg_epsilon * params.epsilon_factor;
        let normalizer = if params.normalize_coords {
            MeshNormalizer::new(op_a, op_b)
        } else {
            MeshNormalizer::identity()
        };
        // `eps` holds in the unit frame; the boxes are still in model units
        let model_eps = normalizer.model_epsilon(eps);
        if op != CsgOperation::Union && !op_a.bbox().intersects(&op_b.bbox(), model_eps) {
            return self.settle(trace, fallback_result(op, a, b), true, "operand bounding boxes do not overlap");
        }

        trace.enter(CsgState::Normalize);
        let mut work_a = op_a.clone();
        let mut work_b = op_b.clone();
        normalizer.normalize(&mut work_a);
        normalizer.normalize(&mut work_b);

        let validation = ValidationParams::new(&self.settings, eps).allow_degenerate_edges(params.allow_degenerate_edges);
        trace.enter(CsgState::SimplifyOperandA);
        let info_a = simplify_mesh_set(&mut work_a, &self.settings, &validation, true);
        trace.enter(CsgState::SimplifyOperandB);
        let info_b = simplify_mesh_set(&mut work_b, &self.settings, &validation, true);

        trace.enter(CsgState::ValidateOperands);
        for (name, set, info) in [("first", &work_a, &info_a), ("second", &work_b, &info_b)] {
            if set.num_vertices() < MIN_OPERAND_ELEMENTS || set.num_faces() < MIN_OPERAND_ELEMENTS {
                let reason = format!("{name} operand is too small after simplification");
                return self.settle(trace, fallback_result(op, a, b), false, &reason);
            }
            if !info.mesh_set_valid {
                let reason = format!("{name} operand is invalid: {}", info.details);
                return self.settle(trace, fallback_result(op, a, b), false, &reason);
            }
        }

        let result_params = validation.allow_fin_edges(params.allow_fin_edges_in_result);
        let context = PairContext {
            op,
            a: &work_a,
            b: &work_b,
            eps,
            validator: MeshValidator::new(result_params),
        };

        if op == CsgOperation::AMinusB && work_a.meshes.len() > 1 {
            if let Some(result) = self.subtract_with_cavities(&mut trace, &context) {
                return self.succeed(trace, result, &normalizer, &result_params);
            }
        }

        trace.enter(CsgState::Classify);
        let first = self.classify(&mut trace, self.primary.as_ref(), &work_a, &work_b, op, ClassificationStrategy::Edge, eps);
        trace.enter(CsgState::ValidateResult);
        let (mut best, mut reason) = match self.assess(first, &context) {
            Verdict::Accept(result) => return self.succeed(trace, result, &normalizer, &result_params),
            Verdict::Reject(candidate, reason) => (candidate, reason),
        };
        debug!(entity = trace.entity(), %reason, "edge classification rejected");

        // Only the first operand is merged before the normal-strategy retry
        trace.enter(CsgState::RetryWithMergedFaces);
        let mut merged_a = work_a.clone();
        if let Err(err) = CoplanarMerger::new(&self.settings).merge(&mut merged_a, &validation) {
            debug!(entity = trace.entity(), %err, "coplanar merge before retry failed");
            merged_a = work_a.clone();
        }
        let second = self.classify(&mut trace, self.primary.as_ref(), &merged_a, &work_b, op, ClassificationStrategy::Normal, eps);
        trace.enter(CsgState::ValidateResult);
        match self.assess(second, &context) {
            Verdict::Accept(result) => return self.succeed(trace, result, &normalizer, &result_params),
            Verdict::Reject(candidate, why) => {
                best = better_candidate(best, candidate);
                reason = why;
            }
        }
        best = match best {
            Some(candidate) if candidate.usable => {
                debug!(entity = trace.entity(), "keeping the better of the edge and normal results");
                return self.succeed(trace, Some(candidate.mesh_set), &normalizer, &result_params);
            }
            other => other,
        };

        if let Some(alternate) = &self.alternate {
            trace.enter(CsgState::RetryWithAlternateEngine);
            let third = self.classify(&mut trace, alternate.as_ref(), &work_a, &work_b, op, ClassificationStrategy::Edge, eps);
            trace.enter(CsgState::ValidateResult);
            match self.assess(third, &context) {
                Verdict::Accept(result) => return self.succeed(trace, result, &normalizer, &result_params),
                Verdict::Reject(candidate, why) => {
                    best = better_candidate(best, candidate);
                    reason = why;
                }
            }
        }

        match best {
            Some(candidate) if candidate.usable => {
                self.succeed(trace, Some(candidate.mesh_set), &normalizer, &result_params)
            }
            best => {
                if let Some(best) = &best {
                    reason = format!("{reason}; best attempt had {} open edges", best.info.num_open_edges);
                }
                self.settle(trace, fallback_result(op, a, b), false, &reason)
            }
        }
    }

    /// Combine `base` with every operand in turn, largest operand first.
    /// Each pair tries the configured variants until one succeeds; a pair
    /// that never succeeds leaves the accumulated result unchanged.
    ///
    /// This is a left fold for every operation: the running result is the
    /// first operand of the next pair. Intersection therefore yields
    /// `base ∩ o1 ∩ o2 ...` and B-minus-A yields `o2 - (o1 - base)`.
    pub fn compute_against_many(
        &self,
        base: &MeshSet,
        operands: &[MeshSet],
        op: CsgOperation,
        entity: Option<&str>,
    ) -> CsgOutcome {
        let volumes: Vec<f64> = operands.iter().map(|operand| operand.volume().abs()).collect();
        let mut order: Vec<usize> = (0..operands.len()).collect();
        order.sort_by(|&i, &j| volumes[j].total_cmp(&volumes[i]));

        let variants = if self.settings.csg_variants.is_empty() {
            CsgOperationParams::default_variants()
        } else {
            self.settings.csg_variants.clone()
        };

        let mut accumulated = Some(base.clone());
        let mut states = Vec::new();
        let mut kernel_calls = 0;
        let mut success = true;

        for index in order {
            let operand = &operands[index];
            if accumulated.is_none() {
                match op {
                    CsgOperation::Union | CsgOperation::BMinusA => {
                        accumulated = Some(operand.clone());
                        continue;
                    }
                    CsgOperation::AMinusB | CsgOperation::Intersection => break,
                }
            }

            let mut next = None;
            for (attempt, params) in variants.iter().enumerate() {
                let outcome = self.compute_pair(accumulated.as_ref(), Some(operand), op, params, entity);
                kernel_calls += outcome.kernel_calls;
                states.extend(outcome.states);
                if outcome.success {
                    next = Some(outcome.result);
                    break;
                }
                debug!(entity = entity.unwrap_or("-"), operand = index, attempt, "pairwise variant failed");
            }

            match next {
                Some(result) => accumulated = result,
                None => {
                    success = false;
                    let text = format!("operand {index} could not be applied with any variant");
                    warn!(entity = entity.unwrap_or("-"), %op, operand = index, "all variants failed");
                    self.sink.report(&text, Severity::Error, ORIGIN_MANY, entity);
                }
            }
        }

        CsgOutcome {
            result: accumulated,
            success,
            states,
            kernel_calls,
        }
    }

    fn classify(
        &self,
        trace: &mut Trace<'_>,
        kernel: &dyn BooleanKernel,
        a: &MeshSet,
        b: &MeshSet,
        op: CsgOperation,
        strategy: ClassificationStrategy,
        eps: f64,
    ) -> CsgResult<MeshSet> {
        trace.kernel_calls += 1;
        debug!(entity = trace.entity(), kernel = kernel.name(), %op, ?strategy, eps, "invoking boolean kernel");
        kernel.compute(a, b, op, strategy, eps)
    }

    fn assess(&self, result: CsgResult<MeshSet>, context: &PairContext<'_>) -> Verdict {
        let mut mesh_set = match result {
            Ok(mesh_set) => mesh_set,
            Err(err) => return Verdict::Reject(None, err.to_string()),
        };
        if mesh_set.is_empty() || mesh_set.num_faces() == 0 {
            return if empty_result_expected(context) {
                Verdict::Accept(None)
            } else {
                Verdict::Reject(None, "classification produced an empty result".to_string())
            };
        }

        let mut info = context.validator.check(&mut mesh_set);
        if !info.mesh_set_valid || info.degenerate_edges > 0 {
            info = self.repair_result(&mut mesh_set, context);
        }
        if !info.mesh_set_valid {
            let reason = format!("result is invalid: {}", info.details);
            return Verdict::Reject(Some(Candidate::rejected(info, mesh_set)), reason);
        }
        if let Err(reason) =
            check_plausibility(context, &mesh_set, self.settings.min_result_volume_ratio)
        {
            return Verdict::Reject(Some(Candidate::rejected(info, mesh_set)), reason);
        }
        if info.degenerate_edges > 0 {
            let reason = format!("result has {} degenerate edges", info.degenerate_edges);
            let candidate = Candidate {
                info,
                mesh_set,
                usable: true,
            };
            return Verdict::Reject(Some(candidate), reason);
        }
        Verdict::Accept(Some(mesh_set))
    }

    /// Simplify a kernel output, drop meshes without volume and validate again
    fn repair_result(&self, mesh_set: &mut MeshSet, context: &PairContext<'_>) -> MeshSetInfo {
        let params = context.validator.params();
        simplify_mesh_set(mesh_set, &self.settings, params, false);
        let removed = remove_degenerate_meshes(mesh_set, params.epsilon);
        let info = context.validator.check(mesh_set);
        debug!(removed, valid = info.mesh_set_valid, details = %info.details, "repaired classification result");
        info
    }

    /// Subtract from the minuend's outer shells with its cavities folded
    /// into the subtrahend. `None` when the minuend has no cavities or the
    /// attempt is rejected; the regular classification runs after that.
    fn subtract_with_cavities(&self, trace: &mut Trace<'_>, context: &PairContext<'_>) -> Option<Option<MeshSet>> {
        let minuend = context.a;
        let cavities: Vec<usize> = (0..minuend.meshes.len())
            .filter(|&i| minuend.meshes[i].signed_volume(&minuend.vertices) < 0.0)
            .filter(|&i| minuend.enclosing_mesh(i).is_some())
            .collect();
        if cavities.is_empty() {
            return None;
        }
        trace.enter(CsgState::SeparateInnerMeshes);
        let shells: Vec<usize> = (0..minuend.meshes.len()).filter(|i| !cavities.contains(i)).collect();
        let outer = minuend.subset(&shells);

        let mut subtrahend = context.b.clone();
        for &cavity in &cavities {
            let mut filler = minuend.subset(&[cavity]);
            filler.invert();
            let merged = self.classify(
                trace,
                self.primary.as_ref(),
                &subtrahend,
                &filler,
                CsgOperation::Union,
                ClassificationStrategy::Edge,
                context.eps,
            );
            subtrahend = match merged {
                Ok(merged) if !merged.is_empty() => merged,
                Ok(_) => return None,
                Err(err) => {
                    debug!(entity = trace.entity(), %err, "merging a cavity into the subtrahend failed");
                    return None;
                }
            };
        }
        let mut info = context.validator.check(&mut subtrahend);
        if !info.mesh_set_valid {
            info = self.repair_result(&mut subtrahend, context);
        }
        if !info.mesh_set_valid {
            debug!(entity = trace.entity(), details = %info.details, "subtrahend with cavities is invalid");
            return None;
        }

        let result = self.classify(
            trace,
            self.primary.as_ref(),
            &outer,
            &subtrahend,
            CsgOperation::AMinusB,
            ClassificationStrategy::Edge,
            context.eps,
        );
        trace.enter(CsgState::ValidateResult);
        match self.assess(result, context) {
            Verdict::Accept(result) => Some(result),
            Verdict::Reject(_, reason) => {
                debug!(entity = trace.entity(), %reason, "subtraction from outer shells rejected");
                None
            }
        }
    }

    fn succeed(
        &self,
        trace: Trace<'_>,
        result: Option<MeshSet>,
        normalizer: &MeshNormalizer,
        params: &ValidationParams,
    ) -> CsgOutcome {
        let result = result.map(|mut mesh_set| {
            let info = simplify_mesh_set(&mut mesh_set, &self.settings, params, true);
            if !info.mesh_set_valid {
                debug!(entity = trace.entity(), details = %info.details, "post-processed result is not valid");
            }
            normalizer.mark(&mut mesh_set);
            normalizer.denormalize(&mut mesh_set);
            mesh_set
        });
        trace.finish(result, true)
    }

    /// End the run without computing: log, report and hand back `result`
    fn settle(&self, trace: Trace<'_>, result: Option<MeshSet>, success: bool, reason: &str) -> CsgOutcome {
        if success {
            debug!(entity = trace.entity(), reason, "boolean operation short-circuited");
        } else {
            warn!(entity = trace.entity(), reason, "boolean operation fell back");
            self.sink.report(reason, Severity::Warning, ORIGIN_PAIR, trace.entity);
        }
        trace.finish(result, success)
    }
}

/// Usable candidates win over rejected ones; otherwise the repair comparison decides
fn better_candidate(current: Option<Candidate>, new: Option<Candidate>) -> Option<Candidate> {
    match (current, new) {
        (Some(current), Some(new)) => {
            let take_new = if new.usable != current.usable {
                new.usable
            } else {
                is_better_for_bool_op(&new.info, &current.info, false)
            };
            if take_new {
                Some(new)
            } else {
                Some(current)
            }
        }
        (current, new) => current.or(new),
    }
}

fn minuend_and_subtrahend<'w>(context: &PairContext<'w>) -> Option<(&'w MeshSet, &'w MeshSet)> {
    match context.op {
        CsgOperation::AMinusB => Some((context.a, context.b)),
        CsgOperation::BMinusA => Some((context.b, context.a)),
        CsgOperation::Union | CsgOperation::Intersection => None,
    }
}

/// A subtraction may legitimately remove everything when the subtrahend encloses the minuend
fn empty_result_expected(context: &PairContext<'_>) -> bool {
    let band = context.eps * PLAUSIBILITY_BAND_FACTOR;
    minuend_and_subtrahend(context)
        .is_some_and(|(minuend, subtrahend)| subtrahend.bbox().contains(&minuend.bbox(), band))
}

fn check_plausibility(context: &PairContext<'_>, result: &MeshSet, min_volume_ratio: f64) -> Result<(), String> {
    let Some((minuend, subtrahend)) = minuend_and_subtrahend(context) else {
        return Ok(());
    };
    let band = context.eps * PLAUSIBILITY_BAND_FACTOR;
    let result_box = result.bbox();
    let minuend_box = minuend.bbox();
    let subtrahend_box = subtrahend.bbox();

    if !result_box.intersects(&minuend_box, band) {
        return Err("result does not overlap the minuend".to_string());
    }
    for axis in 0..3 {
        if minuend_box.min[axis] < subtrahend_box.min[axis] - band
            && (result_box.min[axis] - minuend_box.min[axis]).abs() > band
        {
            return Err(format!("result lost the minuend's lower extent on axis {axis}"));
        }
        if minuend_box.max[axis] > subtrahend_box.max[axis] + band
            && (result_box.max[axis] - minuend_box.max[axis]).abs() > band
        {
            return Err(format!("result lost the minuend's upper extent on axis {axis}"));
        }
    }

    let expected = (minuend.volume() - subtrahend.volume()) * min_volume_ratio;
    let volume = result.volume();
    if volume < expected {
        return Err(format!("result volume {volume:.6} is below the expected {expected:.6}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csg::status::MessageLog;
    use crate::geometry::primitives;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn cube(min: [f64; 3], max: [f64; 3]) -> MeshSet {
        primitives::cuboid(Point3::from(min), Point3::from(max))
    }

    fn context<'w>(op: CsgOperation, a: &'w MeshSet, b: &'w MeshSet) -> PairContext<'w> {
        let settings = GeomSettings::default();
        PairContext {
            op,
            a,
            b,
            eps: settings.csg_epsilon,
            validator: MeshValidator::new(ValidationParams::new(&settings, settings.csg_epsilon)),
        }
    }

    #[test]
    fn test_fallback_policy() {
        let a = cube([0.0; 3], [1.0; 3]);
        let b = cube([0.5, 0.0, 0.0], [1.5, 1.0, 1.0]);

        let pick = |op| fallback_result(op, Some(&a), Some(&b)).map(|set| set.bbox().min.x);
        assert_eq!(pick(CsgOperation::AMinusB), Some(0.0));
        assert_eq!(pick(CsgOperation::BMinusA), Some(0.5));
        assert_eq!(pick(CsgOperation::Union), Some(0.0));
        assert_eq!(pick(CsgOperation::Intersection), None);
        assert!(fallback_result(CsgOperation::Union, None, Some(&b)).is_some());
    }

    #[test]
    fn test_missing_operand_reports_and_falls_back() {
        let log = Arc::new(MessageLog::new());
        let orchestrator = CsgOrchestrator::new(GeomSettings::default()).with_sink(log.clone());
        let a = cube([0.0; 3], [1.0; 3]);

        let outcome = orchestrator.compute_pair(
            Some(&a),
            None,
            CsgOperation::AMinusB,
            &CsgOperationParams::default(),
            Some("wall-3"),
        );
        assert!(!outcome.success);
        assert_eq!(outcome.kernel_calls, 0);
        assert_eq!(outcome.states, vec![CsgState::RejectTrivial, CsgState::Fail]);
        assert_relative_eq!(outcome.result.map(|set| set.volume()).unwrap_or_default(), 1.0);
        assert_eq!(log.count(Severity::Warning), 1);
    }

    #[test]
    fn test_same_instance_short_circuits() {
        let orchestrator = CsgOrchestrator::new(GeomSettings::default());
        let a = cube([0.0; 3], [1.0; 3]);
        let outcome = orchestrator.compute(&a, &a, CsgOperation::AMinusB);
        assert!(outcome.success);
        assert_eq!(outcome.kernel_calls, 0);
        assert!(outcome.result.is_some());
    }

    #[test]
    fn test_plausibility_rejects_lost_extent() {
        let a = cube([0.0; 3], [1.0; 3]);
        let b = cube([0.5, 0.0, 0.0], [1.5, 1.0, 1.0]);
        let ctx = context(CsgOperation::AMinusB, &a, &b);

        let good = cube([0.0; 3], [0.5, 1.0, 1.0]);
        assert!(check_plausibility(&ctx, &good, 0.99).is_ok());

        let shrunk = cube([0.2, 0.0, 0.0], [0.5, 1.0, 1.0]);
        assert!(check_plausibility(&ctx, &shrunk, 0.99).is_err());

        let outside = cube([3.0, 0.0, 0.0], [4.0, 1.0, 1.0]);
        assert!(check_plausibility(&ctx, &outside, 0.99).is_err());
    }

    #[test]
    fn test_plausibility_checks_volume() {
        let a = cube([0.0; 3], [2.0, 1.0, 1.0]);
        let b = cube([0.5, 0.25, 0.25], [1.5, 0.75, 0.75]);
        let ctx = context(CsgOperation::AMinusB, &a, &b);

        // Same outer box as the minuend but far too little material
        let mut corners = cube([0.0; 3], [0.1; 3]).polygon_points();
        corners.extend(cube([1.9, 0.9, 0.9], [2.0, 1.0, 1.0]).polygon_points());
        let sparse = MeshSet::from_polygons(&corners, 1e-9);
        assert_eq!(sparse.meshes.len(), 2);
        let err = check_plausibility(&ctx, &sparse, 0.99).unwrap_err();
        assert!(err.contains("volume"), "{err}");
    }

    #[test]
    fn test_box_gap_tolerance_follows_model_scale() {
        let orchestrator = CsgOrchestrator::new(GeomSettings::default()).with_alternate(None);

        // A gap of 2e-5 exceeds the tolerance at unit scale
        let a = cube([0.0; 3], [1.0; 3]);
        let b = cube([1.0 + 2e-5, 0.0, 0.0], [2.0, 1.0, 1.0]);
        let outcome = orchestrator.compute(&a, &b, CsgOperation::AMinusB);
        assert!(outcome.success);
        assert_eq!(outcome.kernel_calls, 0);
        assert!(!outcome.visited(CsgState::Normalize));

        // The same gap on a 2000-unit model is within the scaled tolerance
        let a = cube([0.0; 3], [1000.0; 3]);
        let b = cube([1000.0 + 2e-5, 0.0, 0.0], [2000.0, 1000.0, 1000.0]);
        let outcome = orchestrator.compute(&a, &b, CsgOperation::AMinusB);
        assert!(outcome.visited(CsgState::Normalize));
        assert!(outcome.kernel_calls > 0);
    }

    fn candidate(open_edges: usize, usable: bool) -> Candidate {
        let info = MeshSetInfo {
            num_open_edges: open_edges,
            num_closed_edges: 18,
            num_faces: 12,
            all_pointers_valid: true,
            mesh_set_valid: usable,
            ..Default::default()
        };
        Candidate {
            info,
            mesh_set: cube([0.0; 3], [open_edges as f64 + 1.0, 1.0, 1.0]),
            usable,
        }
    }

    #[test]
    fn test_usable_candidate_wins() {
        let best = better_candidate(Some(candidate(4, false)), Some(candidate(0, true))).unwrap();
        assert!(best.usable);

        let best = better_candidate(Some(candidate(0, true)), Some(candidate(2, false))).unwrap();
        assert!(best.usable);
        assert_relative_eq!(best.mesh_set.volume(), 1.0, epsilon = 1e-12);

        let best = better_candidate(Some(candidate(6, false)), Some(candidate(2, false))).unwrap();
        assert_eq!(best.info.num_open_edges, 2);
        assert_relative_eq!(best.mesh_set.volume(), 3.0, epsilon = 1e-12);

        assert!(better_candidate(None, None).is_none());
        assert_eq!(better_candidate(None, Some(candidate(6, false))).unwrap().info.num_open_edges, 6);
    }

    #[test]
    fn test_empty_result_expected_when_enclosed() {
        let a = cube([0.25; 3], [0.75; 3]);
        let b = cube([0.0; 3], [1.0; 3]);
        assert!(empty_result_expected(&context(CsgOperation::AMinusB, &a, &b)));
        assert!(!empty_result_expected(&context(CsgOperation::BMinusA, &a, &b)));
        assert!(!empty_result_expected(&context(CsgOperation::Union, &a, &b)));
    }
}
