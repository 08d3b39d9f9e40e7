//! Progress & Cost Ledger (spec §4.9).
//!
//! A Job's `progress` field is a weighted sum of per-stage sub-progress;
//! its `cost.total` is the sum of booked "actual" line items plus any
//! "quote" line items not yet resolved to an actual. Grounded on the
//! teacher's `CostLedger`-shaped bookkeeping idiom seen in
//! `llm-proxy`'s `UsageInfo` (usage always carried alongside the
//! generation result, never computed lazily).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Download,
    Decode,
    Recognize,
    Segment,
    PostEdit,
    Translate,
    Synthesize,
    Mux,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Download => "download",
            Stage::Decode => "decode",
            Stage::Recognize => "recognize",
            Stage::Segment => "segment",
            Stage::PostEdit => "post_edit",
            Stage::Translate => "translate",
            Stage::Synthesize => "synthesize",
            Stage::Mux => "mux",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobKind {
    Transcribe,
    Translate,
    Synthesize,
    Dub,
}

/// Declared stage weights for a job kind. Weights for stages the job
/// kind does not run are simply absent (and thus contribute 0).
impl JobKind {
    pub fn stage_weights(&self) -> &'static [(Stage, u32)] {
        match self {
            JobKind::Transcribe => &[
                (Stage::Download, 10),
                (Stage::Decode, 10),
                (Stage::Recognize, 60),
                (Stage::Segment, 20),
            ],
            JobKind::Translate => &[(Stage::Translate, 100)],
            JobKind::Synthesize => &[(Stage::Synthesize, 100)],
            JobKind::Dub => &[
                (Stage::Download, 5),
                (Stage::Decode, 5),
                (Stage::Recognize, 20),
                (Stage::Segment, 5),
                (Stage::PostEdit, 10),
                (Stage::Translate, 10),
                (Stage::Synthesize, 30),
                (Stage::Mux, 15),
            ],
        }
    }

    fn total_weight(&self) -> u32 {
        self.stage_weights().iter().map(|(_, w)| *w).sum()
    }
}

/// Tracks per-stage sub-progress in `[0, 100]` and computes the Job's
/// overall progress as a weighted sum, rounded down. Progress can only
/// move forward: a lower sub-progress report for a stage is ignored,
/// which is what guarantees the monotone-progress invariant (spec §8)
/// holds regardless of how stages report.
#[derive(Debug, Clone)]
pub struct ProgressLedger {
    kind: JobKind,
    sub_progress: BTreeMap<Stage, u32>,
}

impl ProgressLedger {
    pub fn new(kind: JobKind) -> Self {
        Self {
            kind,
            sub_progress: BTreeMap::new(),
        }
    }

    /// Reports sub-progress `[0, 100]` for `stage`. Values below the
    /// stage's current recorded value are ignored (monotonicity).
    pub fn report(&mut self, stage: Stage, sub_progress: u32) {
        let sub_progress = sub_progress.min(100);
        let entry = self.sub_progress.entry(stage).or_insert(0);
        if sub_progress > *entry {
            *entry = sub_progress;
        }
    }

    pub fn complete(&mut self, stage: Stage) {
        self.report(stage, 100);
    }

    /// The Job's overall progress: the weighted sum of stage
    /// sub-progress, rounded down, per spec §4.9.
    pub fn overall(&self) -> u32 {
        let weights = self.kind.stage_weights();
        let total_weight = self.kind.total_weight();
        if total_weight == 0 {
            return 0;
        }

        let weighted_sum: u64 = weights
            .iter()
            .map(|(stage, weight)| {
                let sub = *self.sub_progress.get(stage).unwrap_or(&0) as u64;
                sub * (*weight as u64)
            })
            .sum();

        (weighted_sum / (total_weight as u64)).min(100) as u32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LineKind {
    Quote,
    Actual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLine {
    pub stage: Stage,
    pub kind: LineKind,
    pub units: f64,
    pub rate: f64,
    pub amount: f64,
}

impl CostLine {
    pub fn new(stage: Stage, kind: LineKind, units: f64, rate: f64) -> Self {
        Self {
            stage,
            kind,
            units,
            rate,
            amount: units * rate,
        }
    }
}

/// Per-job running cost total. `quote(stage, ...)` is recorded when a
/// billable stage begins; `actual(stage, ...)` replaces that stage's
/// quote when it ends. `total()` is "sum of actuals + remaining
/// quotes" per spec §4.9, which keeps the running total meaningful at
/// any point during a run.
#[derive(Debug, Clone, Default)]
pub struct CostLedger {
    lines: Vec<CostLine>,
}

impl CostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quote(&mut self, stage: Stage, units: f64, rate: f64) {
        self.lines
            .push(CostLine::new(stage, LineKind::Quote, units, rate));
    }

    /// Books the actual cost for `stage`, removing any still-pending
    /// quote line for that same stage (the quote is now resolved).
    pub fn actual(&mut self, stage: Stage, units: f64, rate: f64) {
        self.lines.retain(|l| !(l.stage == stage && l.kind == LineKind::Quote));
        self.lines
            .push(CostLine::new(stage, LineKind::Actual, units, rate));
    }

    pub fn lines(&self) -> &[CostLine] {
        &self.lines
    }

    pub fn total(&self) -> f64 {
        self.lines.iter().map(|l| l.amount).sum()
    }

    /// The sum of only the `actual` lines — used to check the monotone
    /// cost invariant (spec §8), since quotes can be added and
    /// retracted but actuals never shrink.
    pub fn actual_total(&self) -> f64 {
        self.lines
            .iter()
            .filter(|l| l.kind == LineKind::Actual)
            .map(|l| l.amount)
            .sum()
    }

    /// What the total would become if `stage` quoted `units * rate`
    /// on top of the current ledger — used by the budget gate (spec
    /// §4.1) before any billable stage runs.
    pub fn projected_total_with(&self, units: f64, rate: f64) -> f64 {
        self.total() + units * rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dub_progress_is_weighted_sum_rounded_down() {
        let mut ledger = ProgressLedger::new(JobKind::Dub);
        ledger.complete(Stage::Download); // 5
        ledger.complete(Stage::Decode); // 5
        ledger.report(Stage::Recognize, 50); // 20 * 0.5 = 10
        assert_eq!(ledger.overall(), 20);
    }

    #[test]
    fn progress_never_moves_backward() {
        let mut ledger = ProgressLedger::new(JobKind::Transcribe);
        ledger.report(Stage::Recognize, 80);
        ledger.report(Stage::Recognize, 10);
        assert_eq!(ledger.sub_progress[&Stage::Recognize], 80);
    }

    #[test]
    fn completing_every_stage_reaches_100() {
        let mut ledger = ProgressLedger::new(JobKind::Dub);
        for (stage, _) in JobKind::Dub.stage_weights() {
            ledger.complete(*stage);
        }
        assert_eq!(ledger.overall(), 100);
    }

    #[test]
    fn cost_actual_replaces_quote() {
        let mut ledger = CostLedger::new();
        ledger.quote(Stage::Synthesize, 5000.0, 0.00002);
        assert_eq!(ledger.total(), 0.1);
        ledger.actual(Stage::Synthesize, 4800.0, 0.00002);
        assert_eq!(ledger.lines().len(), 1);
        assert!((ledger.total() - 0.096).abs() < 1e-9);
    }

    #[test]
    fn actual_total_only_counts_actuals() {
        let mut ledger = CostLedger::new();
        ledger.quote(Stage::Recognize, 60.0, 0.01);
        ledger.actual(Stage::Recognize, 55.0, 0.01);
        ledger.quote(Stage::Synthesize, 5000.0, 0.00002);
        assert!((ledger.actual_total() - 0.55).abs() < 1e-9);
        assert!((ledger.total() - (0.55 + 0.1)).abs() < 1e-9);
    }

    #[quickcheck_macros::quickcheck]
    fn prop_overall_progress_in_bounds(values: Vec<u8>) -> bool {
        let mut ledger = ProgressLedger::new(JobKind::Dub);
        let stages = [
            Stage::Download,
            Stage::Decode,
            Stage::Recognize,
            Stage::Segment,
            Stage::PostEdit,
            Stage::Translate,
            Stage::Synthesize,
            Stage::Mux,
        ];
        for (i, v) in values.iter().enumerate() {
            ledger.report(stages[i % stages.len()], *v as u32);
        }
        ledger.overall() <= 100
    }

    #[quickcheck_macros::quickcheck]
    fn prop_cost_total_never_negative(amounts: Vec<(u8, u8)>) -> bool {
        let mut ledger = CostLedger::new();
        for (units, rate) in amounts {
            ledger.actual(Stage::Synthesize, units as f64, rate as f64);
        }
        ledger.total() >= 0.0
    }
}
