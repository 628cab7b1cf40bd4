//! Plan executor module.
//!
//! Applies the operations of a plan in order:
//! - already in place: skipped
//! - destination taken: failed, nothing is overwritten
//! - otherwise: parent directories created, then a hard link and unlink of
//!   the source, falling back to copy, verify and delete across filesystems
//!
//! Files only ever land in place through `hard_link`, which refuses an
//! existing destination even when another process created it after the
//! existence check.
//!
//! Execution stops at the first failure. Cancellation is checked between
//! operations, never during one.

use crate::events::{Event, EventBus};
use crate::models::config::ExecutorConfig;
use crate::models::plan::{
    ExecutionReport, OperationOutcome, OrganizationPlan, PlannedOperation, TransferMethod,
};
use crate::utils::fs::same_file;
use crate::utils::hash;
use crate::{Error, Result};
use futures::future::join_all;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Content digest used to verify copies.
type Digest = fn(PathBuf) -> Result<String>;

/// Plan executor.
#[derive(Debug, Clone)]
pub struct Executor {
    config: ExecutorConfig,
    events: EventBus,
    digest: Digest,
}

impl Executor {
    pub fn new(config: ExecutorConfig, events: EventBus) -> Self {
        Self {
            config,
            events,
            digest: |path| hash::sha256_file(&path),
        }
    }

    /// Check a plan before execution: destinations must be unique and live
    /// under the library root.
    pub fn validate(&self, plan: &OrganizationPlan) -> Result<()> {
        let mut seen = HashSet::new();
        let mut errors = Vec::new();

        for (index, op) in plan.operations.iter().enumerate() {
            if !op.destination.starts_with(&plan.library_root) {
                errors.push(format!(
                    "operation {}: {} is outside {}",
                    index,
                    op.destination.display(),
                    plan.library_root.display()
                ));
            }
            if !seen.insert(&op.destination) {
                errors.push(format!(
                    "operation {}: {} is planned twice",
                    index,
                    op.destination.display()
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidPlanFile(errors.join("; ")))
        }
    }

    /// Execute a plan.
    pub async fn execute(&self, plan: &OrganizationPlan, cancel: &CancellationToken) -> ExecutionReport {
        let total = plan.operations.len();
        let mut report = ExecutionReport {
            plan_id: plan.id.clone(),
            outcomes: vec![OperationOutcome::NotAttempted; total],
            resume_from: None,
            cancelled: false,
        };

        tracing::info!("Executing plan {} ({} operations)", plan.id, total);

        for (index, op) in plan.operations.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!("Plan {} cancelled before operation {}", plan.id, index);
                self.events.emit(Event::PlanCancelled {
                    plan_id: plan.id.clone(),
                    resume_from: index,
                });
                report.cancelled = true;
                report.resume_from = Some(index);
                break;
            }

            tracing::info!(
                "Execute [{}/{}]: {} - {}",
                index + 1,
                total,
                op.kind,
                op.destination.display()
            );
            self.events.emit(Event::OperationStarted {
                plan_id: plan.id.clone(),
                index,
                source: op.source.clone(),
            });

            match self.apply(op).await {
                Ok(Some(method)) => {
                    report.outcomes[index] = OperationOutcome::Succeeded { method };
                    self.events.emit(Event::OperationSucceeded {
                        plan_id: plan.id.clone(),
                        index,
                        destination: op.destination.clone(),
                    });
                }
                Ok(None) => {
                    report.outcomes[index] = OperationOutcome::SkippedAlreadyCorrect;
                    self.events.emit(Event::OperationSkipped {
                        plan_id: plan.id.clone(),
                        index,
                    });
                }
                Err(e) => {
                    tracing::error!("Operation failed: {} - {}", op.destination.display(), e);
                    let reason = e.to_string();
                    report.outcomes[index] = OperationOutcome::Failed {
                        reason: reason.clone(),
                    };
                    self.events.emit(Event::OperationFailed {
                        plan_id: plan.id.clone(),
                        index,
                        reason,
                    });
                    report.resume_from = Some(index);
                    break;
                }
            }
        }

        tracing::info!(
            "Plan {}: {} done, {} failed, {} remaining",
            plan.id,
            report.succeeded(),
            report.failed(),
            report
                .outcomes
                .iter()
                .filter(|o| **o == OperationOutcome::NotAttempted)
                .count()
        );
        report
    }

    /// Execute several plans. Plans for different library roots run
    /// concurrently; plans sharing a root run one after another.
    pub async fn execute_all(&self, plans: &[OrganizationPlan], cancel: &CancellationToken) -> Vec<ExecutionReport> {
        let mut by_root: BTreeMap<&Path, Vec<usize>> = BTreeMap::new();
        for (index, plan) in plans.iter().enumerate() {
            by_root.entry(plan.library_root.as_path()).or_default().push(index);
        }

        let groups = by_root.into_values().map(|indices| async move {
            let mut reports = Vec::with_capacity(indices.len());
            for index in indices {
                reports.push((index, self.execute(&plans[index], cancel).await));
            }
            reports
        });

        let mut reports: Vec<(usize, ExecutionReport)> = join_all(groups).await.into_iter().flatten().collect();
        reports.sort_by_key(|(index, _)| *index);
        reports.into_iter().map(|(_, report)| report).collect()
    }

    /// Apply one operation. `None` means it was already in place.
    async fn apply(&self, op: &PlannedOperation) -> Result<Option<TransferMethod>> {
        let source = &op.source;
        let destination = &op.destination;

        if same_file(source, destination) {
            tracing::debug!("Already in place: {:?}", destination);
            return Ok(None);
        }
        if !exists(source).await? {
            return Err(Error::PathNotFound(source.display().to_string()));
        }
        if exists(destination).await? {
            return Err(Error::DestinationExists(destination.to_path_buf()));
        }

        // Create parent directory if needed
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::filesystem(parent, e))?;
        }

        if !self.config.always_copy {
            // Same filesystem: link then unlink, instant and no-clobber
            match place(source, destination).await {
                Ok(()) => {
                    fs::remove_file(source)
                        .await
                        .map_err(|e| Error::filesystem(source, e))?;
                    tracing::debug!("Moved (link): {:?} -> {:?}", source, destination);
                    return Ok(Some(TransferMethod::Rename));
                }
                Err(Error::Filesystem { source: e, .. })
                    if e.kind() == std::io::ErrorKind::CrossesDevices || link_refused(&e) =>
                {
                    tracing::debug!("Cannot link {:?}, using copy+delete", source);
                }
                Err(e) => return Err(e),
            }
        }

        self.copy_verify_delete(source, destination).await?;
        Ok(Some(TransferMethod::CopyVerifyDelete))
    }

    /// Copy to a temporary sibling, verify, move into place, then delete the
    /// source. The source is left alone unless the copy verified.
    async fn copy_verify_delete(&self, source: &Path, destination: &Path) -> Result<()> {
        let temp = temp_sibling(destination);

        let copied = self.copy_and_verify(source, &temp).await;
        if let Err(e) = copied {
            let _ = fs::remove_file(&temp).await;
            return Err(e);
        }

        let placed = match place(&temp, destination).await {
            Err(Error::Filesystem { source: e, .. }) if link_refused(&e) => {
                rename_if_absent(&temp, destination).await
            }
            other => other,
        };
        let _ = fs::remove_file(&temp).await;
        placed?;

        fs::remove_file(source)
            .await
            .map_err(|e| Error::filesystem(source, e))?;
        tracing::debug!("Moved (copy+delete): {:?} -> {:?}", source, destination);
        Ok(())
    }

    async fn copy_and_verify(&self, source: &Path, temp: &Path) -> Result<()> {
        let copied = fs::copy(source, temp)
            .await
            .map_err(|e| Error::filesystem(source, e))?;
        let expected = fs::metadata(source)
            .await
            .map_err(|e| Error::filesystem(source, e))?
            .len();
        if copied != expected {
            return Err(Error::VerificationFailed {
                path: source.to_path_buf(),
                reason: format!("size mismatch: {} of {} bytes", copied, expected),
            });
        }

        if self.config.verify_checksum {
            let (original, copy) =
                tokio::try_join!(self.checksum(source), self.checksum(temp))?;
            if original != copy {
                return Err(Error::VerificationFailed {
                    path: source.to_path_buf(),
                    reason: "checksum mismatch".to_string(),
                });
            }
        }
        Ok(())
    }

    async fn checksum(&self, path: &Path) -> Result<String> {
        let digest = self.digest;
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || digest(path))
            .await
            .map_err(|e| Error::other(format!("checksum task failed: {}", e)))?
    }
}

/// vfat and some network mounts have no hard links.
fn link_refused(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::Unsupported | std::io::ErrorKind::PermissionDenied
    )
}

/// Rename fallback for filesystems without links. Only the existence check
/// guards the destination here.
async fn rename_if_absent(from: &Path, to: &Path) -> Result<()> {
    if exists(to).await? {
        return Err(Error::DestinationExists(to.to_path_buf()));
    }
    fs::rename(from, to).await.map_err(|e| Error::filesystem(to, e))
}

/// Link `from` at `to`, refusing to replace an existing file.
async fn place(from: &Path, to: &Path) -> Result<()> {
    match fs::hard_link(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(Error::DestinationExists(to.to_path_buf()))
        }
        Err(e) => Err(Error::filesystem(to, e)),
    }
}

async fn exists(path: &Path) -> Result<bool> {
    fs::try_exists(path).await.map_err(|e| Error::filesystem(path, e))
}

/// Hidden file next to `destination` used while copying.
fn temp_sibling(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tag = &Uuid::new_v4().simple().to_string()[..8];
    destination.with_file_name(format!(".{}.{}.partial", name, tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::plan::OperationKind;

    fn op(source: PathBuf, destination: PathBuf) -> PlannedOperation {
        PlannedOperation {
            source,
            destination,
            kind: OperationKind::MoveAndRename,
        }
    }

    #[test]
    fn test_temp_sibling_is_hidden_next_to_destination() {
        let temp = temp_sibling(Path::new("/lib/Movie/Movie.mkv"));
        assert_eq!(temp.parent(), Some(Path::new("/lib/Movie")));
        let name = temp.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".Movie.mkv."));
        assert!(name.ends_with(".partial"));
    }

    #[test]
    fn test_validate_rejects_duplicates_and_escapes() {
        let executor = Executor::new(ExecutorConfig::default(), EventBus::default());
        let plan = OrganizationPlan {
            id: "p".to_string(),
            library_root: PathBuf::from("/lib"),
            operations: vec![
                op(PathBuf::from("/in/a"), PathBuf::from("/lib/a")),
                op(PathBuf::from("/in/b"), PathBuf::from("/lib/a")),
                op(PathBuf::from("/in/c"), PathBuf::from("/elsewhere/c")),
            ],
            ..Default::default()
        };
        let err = executor.validate(&plan).unwrap_err().to_string();
        assert!(err.contains("planned twice"));
        assert!(err.contains("outside"));
    }

    #[tokio::test]
    async fn test_missing_source_fails() {
        let temp = tempfile::TempDir::new().unwrap();
        let executor = Executor::new(ExecutorConfig::default(), EventBus::default());
        let plan = OrganizationPlan {
            id: "p".to_string(),
            library_root: temp.path().to_path_buf(),
            operations: vec![op(temp.path().join("gone.mkv"), temp.path().join("out/gone.mkv"))],
            ..Default::default()
        };
        let report = executor.execute(&plan, &CancellationToken::new()).await;
        assert!(matches!(report.outcomes[0], OperationOutcome::Failed { .. }));
        assert_eq!(report.resume_from, Some(0));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let temp = tempfile::TempDir::new().unwrap();
        let source = temp.path().join("a.mkv");
        std::fs::write(&source, b"data").unwrap();

        let executor = Executor::new(ExecutorConfig::default(), EventBus::default());
        let plan = OrganizationPlan {
            id: "p".to_string(),
            library_root: temp.path().to_path_buf(),
            operations: vec![op(source.clone(), temp.path().join("out/a.mkv"))],
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = executor.execute(&plan, &cancel).await;
        assert!(report.cancelled);
        assert_eq!(report.resume_from, Some(0));
        assert_eq!(report.outcomes, vec![OperationOutcome::NotAttempted]);
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_failed_verification_keeps_source() {
        let temp = tempfile::TempDir::new().unwrap();
        let source = temp.path().join("in/a.flac");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        std::fs::write(&source, b"lossless").unwrap();
        let destination = temp.path().join("lib/Album/a.flac");

        let mut executor = Executor::new(
            ExecutorConfig {
                verify_checksum: true,
                always_copy: true,
            },
            EventBus::default(),
        );
        // Every path hashes differently, so no copy ever verifies
        executor.digest = |path| Ok(path.display().to_string());

        let plan = OrganizationPlan {
            id: "p".to_string(),
            library_root: temp.path().join("lib"),
            operations: vec![op(source.clone(), destination.clone())],
            ..Default::default()
        };
        let report = executor.execute(&plan, &CancellationToken::new()).await;

        match &report.outcomes[0] {
            OperationOutcome::Failed { reason } => assert!(reason.contains("checksum mismatch")),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(std::fs::read(&source).unwrap(), b"lossless");
        assert!(!destination.exists());
        let leftovers = std::fs::read_dir(destination.parent().unwrap())
            .unwrap()
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_place_never_replaces_a_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let from = temp.path().join("from.mkv");
        let to = temp.path().join("to.mkv");
        std::fs::write(&from, b"new").unwrap();
        std::fs::write(&to, b"old").unwrap();

        let err = place(&from, &to).await.unwrap_err();

        assert!(matches!(err, Error::DestinationExists(ref path) if path == &to));
        assert_eq!(std::fs::read(&to).unwrap(), b"old");
        assert!(from.exists());
    }
}
