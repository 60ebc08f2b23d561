//! IngestionRun: the audit record of one framework ingestion attempt

use crate::graph::Framework;
use crate::storage::UpsertResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Upper bound on reasons kept per run; the count itself is always exact.
pub const MAX_SKIP_REASONS: usize = 500;

/// Unique identifier for an ingestion run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Partial,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Partial | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Partial => "PARTIAL",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage at which a record was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipStage {
    /// Adapter could not segment or extract the unit
    Parse,
    /// Normalizer refused the record
    Validation,
    /// Batch transaction failed after retries
    Upsert,
    /// Store refused an edge with a missing endpoint
    MissingEndpoint,
}

/// Why a record (or a group of records) was skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipReason {
    pub stage: SkipStage,
    /// Records covered by this reason (a failed batch covers many)
    pub records: usize,
    pub detail: String,
}

/// Skip count plus human-readable reasons.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkipCounter {
    pub count: usize,
    /// Exact counts per stage, kept even once `reasons` is full
    #[serde(default)]
    pub by_stage: BTreeMap<SkipStage, usize>,
    pub reasons: Vec<SkipReason>,
}

impl SkipCounter {
    fn add(&mut self, stage: SkipStage, records: usize, detail: String) {
        self.count += records;
        *self.by_stage.entry(stage).or_default() += records;
        if self.reasons.len() < MAX_SKIP_REASONS {
            self.reasons.push(SkipReason {
                stage,
                records,
                detail,
            });
        }
    }

    pub fn count_for(&self, stage: SkipStage) -> usize {
        self.by_stage.get(&stage).copied().unwrap_or(0)
    }
}

/// One ingestion attempt for one framework.
///
/// Mutated only by the ingestion engine while `status` is `Running`; every
/// mutator is a no-op once the run reaches a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionRun {
    run_id: RunId,
    framework: Framework,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    status: RunStatus,
    nodes_upserted: usize,
    nodes_created: usize,
    edges_upserted: usize,
    batch_failures: usize,
    batches_committed: usize,
    records_skipped: SkipCounter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
}

impl IngestionRun {
    /// A run record in `Pending` state.
    pub fn pending(framework: Framework) -> Self {
        Self {
            run_id: RunId::new(),
            framework,
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Pending,
            nodes_upserted: 0,
            nodes_created: 0,
            edges_upserted: 0,
            batch_failures: 0,
            batches_committed: 0,
            records_skipped: SkipCounter::default(),
            failure: None,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn framework(&self) -> Framework {
        self.framework
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn nodes_upserted(&self) -> usize {
        self.nodes_upserted
    }

    pub fn nodes_created(&self) -> usize {
        self.nodes_created
    }

    pub fn edges_upserted(&self) -> usize {
        self.edges_upserted
    }

    pub fn batch_failures(&self) -> usize {
        self.batch_failures
    }

    pub fn records_skipped(&self) -> &SkipCounter {
        &self.records_skipped
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub(crate) fn start(&mut self) {
        if self.status == RunStatus::Pending {
            self.status = RunStatus::Running;
            self.started_at = Utc::now();
        }
    }

    pub(crate) fn record_upsert(&mut self, result: &UpsertResult) {
        if self.status != RunStatus::Running {
            return;
        }
        self.batches_committed += 1;
        self.nodes_upserted += result.nodes_written;
        self.nodes_created += result.nodes_created;
        self.edges_upserted += result.edges_written;
        for rejected in &result.rejected {
            self.records_skipped.add(
                SkipStage::MissingEndpoint,
                1,
                format!(
                    "{} {} -> {}: missing endpoint {}",
                    rejected.edge.relation, rejected.edge.source, rejected.edge.target, rejected.missing
                ),
            );
        }
    }

    pub(crate) fn skip(&mut self, stage: SkipStage, detail: impl Into<String>) {
        self.skip_many(stage, 1, detail);
    }

    pub(crate) fn skip_many(&mut self, stage: SkipStage, records: usize, detail: impl Into<String>) {
        if self.status != RunStatus::Running || records == 0 {
            return;
        }
        self.records_skipped.add(stage, records, detail.into());
    }

    pub(crate) fn record_batch_failure(&mut self, records: usize, detail: impl Into<String>) {
        if self.status != RunStatus::Running {
            return;
        }
        self.batch_failures += 1;
        self.records_skipped.add(SkipStage::Upsert, records, detail.into());
    }

    /// Terminate with FAILED regardless of progress so far.
    pub(crate) fn fail(&mut self, reason: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.failure = Some(reason.into());
        self.status = RunStatus::Failed;
        self.finished_at = Some(Utc::now());
    }

    /// Decide the terminal status from the accumulated counters.
    pub(crate) fn conclude(&mut self) {
        if self.status != RunStatus::Running {
            return;
        }
        let clean = self.records_skipped.count == 0 && self.batch_failures == 0;
        let committed = self.batches_committed > 0
            && (self.nodes_upserted > 0 || self.edges_upserted > 0);

        self.status = if clean {
            RunStatus::Succeeded
        } else if committed {
            RunStatus::Partial
        } else {
            self.failure = Some(format!(
                "no records committed: {} skipped, {} batch failures",
                self.records_skipped.count, self.batch_failures
            ));
            RunStatus::Failed
        };
        self.finished_at = Some(Utc::now());
    }
}
