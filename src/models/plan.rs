//! Plan data model.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ordered set of filesystem operations for one library root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationPlan {
    /// Unique plan ID.
    pub id: String,
    /// Creation timestamp.
    pub created_at: String,
    /// Library root every destination lives under.
    pub library_root: PathBuf,
    /// Operations, applied in order.
    pub operations: Vec<PlannedOperation>,
}

impl OrganizationPlan {
    /// Whether the plan has nothing to do.
    pub fn is_noop(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// A single rename or move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedOperation {
    /// Current location.
    pub source: PathBuf,
    /// Target location.
    pub destination: PathBuf,
    /// How the file moves.
    pub kind: OperationKind,
}

/// Operation kind, decided by comparing source and destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Same directory, new name.
    Rename,
    /// New directory, same name.
    Move,
    /// New directory and new name.
    MoveAndRename,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Rename => write!(f, "rename"),
            OperationKind::Move => write!(f, "move"),
            OperationKind::MoveAndRename => write!(f, "move+rename"),
        }
    }
}

/// How a successful operation moved its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMethod {
    /// Atomic rename on the same filesystem.
    Rename,
    /// Copy, verify, then delete the original.
    CopyVerifyDelete,
}

/// Result of one planned operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationOutcome {
    Succeeded { method: TransferMethod },
    SkippedAlreadyCorrect,
    Failed { reason: String },
    NotAttempted,
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            OperationOutcome::Succeeded { .. } | OperationOutcome::SkippedAlreadyCorrect
        )
    }
}

/// Per-operation outcomes of executing a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Plan this report belongs to.
    pub plan_id: String,
    /// One entry per planned operation, in plan order.
    pub outcomes: Vec<OperationOutcome>,
    /// Index of the first operation that still needs to run, if any.
    pub resume_from: Option<usize>,
    /// Whether execution stopped because the caller cancelled.
    pub cancelled: bool,
}

impl ExecutionReport {
    /// Whether every operation succeeded or was already in place.
    pub fn is_complete(&self) -> bool {
        self.resume_from.is_none()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, OperationOutcome::Failed { .. }))
            .count()
    }

    /// The operations still to run, for resuming a partially executed plan.
    pub fn remaining(&self, plan: &OrganizationPlan) -> OrganizationPlan {
        let start = self.resume_from.unwrap_or(plan.operations.len());
        OrganizationPlan {
            operations: plan.operations.get(start..).unwrap_or_default().to_vec(),
            ..plan.clone()
        }
    }
}
