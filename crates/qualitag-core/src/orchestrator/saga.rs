//! Compensation stack for create operations and progress tracking for
//! delete cascades

use std::fmt;

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::{CascadeFailure, CascadeReport, QualitagError, QualitagResult};
use crate::linker::{Relation, RelationshipLinker};
use crate::models::EntityRef;
use crate::store::Repository;

/// Lifecycle of one composite create operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaState {
    Pending,
    Step(&'static str),
    Committed,
    RollingBack,
    Failed,
}

/// Inverse of one completed step
#[derive(Debug, Clone, PartialEq)]
pub enum Compensation {
    Delete(EntityRef),
    Unlink {
        relation: Relation,
        owner_id: String,
        member_id: String,
    },
}

impl Compensation {
    pub fn unlink(relation: Relation, owner_id: &str, member_id: &str) -> Self {
        Compensation::Unlink {
            relation,
            owner_id: owner_id.to_string(),
            member_id: member_id.to_string(),
        }
    }
}

impl fmt::Display for Compensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compensation::Delete(target) => write!(f, "delete {}", target),
            Compensation::Unlink {
                relation,
                owner_id,
                member_id,
            } => write!(f, "unlink {:?} {} / {}", relation, owner_id, member_id),
        }
    }
}

/// Ordered steps with a stack of compensations.
///
/// Steps record their compensation right after their write is durable.
/// On failure the stack is unwound in reverse; a compensation that fails
/// is logged and skipped, never retried.
pub struct Saga<'a> {
    operation: &'static str,
    repo: &'a Repository,
    linker: RelationshipLinker,
    state: SagaState,
    compensations: Vec<Compensation>,
}

impl<'a> Saga<'a> {
    pub fn begin(operation: &'static str, repo: &'a Repository) -> Self {
        debug!(operation = operation, "Saga started");
        Self {
            operation,
            repo,
            linker: RelationshipLinker::new(),
            state: SagaState::Pending,
            compensations: Vec::new(),
        }
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    pub fn step(&mut self, name: &'static str) {
        debug!(operation = self.operation, step = name, "Saga step");
        self.state = SagaState::Step(name);
    }

    pub fn compensate(&mut self, compensation: Compensation) {
        self.compensations.push(compensation);
    }

    pub fn commit(mut self) -> SagaState {
        self.state = SagaState::Committed;
        debug!(operation = self.operation, "Saga committed");
        self.state
    }

    /// Unwind every recorded step and return the error to surface.
    ///
    /// The original failure is returned as-is when every compensation
    /// succeeded; otherwise it is wrapped in
    /// [`QualitagError::NeedsReconciliation`].
    pub async fn abort(mut self, cause: QualitagError) -> QualitagError {
        let failed_step = match self.state {
            SagaState::Step(name) => name,
            _ => "validate",
        };
        warn!(
            operation = self.operation,
            step = failed_step,
            error = %cause,
            compensations = self.compensations.len(),
            "Saga failed, rolling back"
        );
        self.state = SagaState::RollingBack;

        let mut failures = Vec::new();
        while let Some(compensation) = self.compensations.pop() {
            if let Err(e) = self.undo(&compensation).await {
                error!(
                    operation = self.operation,
                    compensation = %compensation,
                    error = %e,
                    "Compensation failed, manual reconciliation required"
                );
                failures.push(format!("{}: {}", compensation, e));
            }
        }
        self.state = SagaState::Failed;

        if failures.is_empty() {
            cause
        } else {
            QualitagError::NeedsReconciliation {
                operation: self.operation.to_string(),
                cause: Box::new(cause),
                compensation_failures: failures,
            }
        }
    }

    async fn undo(&self, compensation: &Compensation) -> QualitagResult<()> {
        match compensation {
            Compensation::Delete(target) => {
                self.repo.delete(target).await?;
                Ok(())
            }
            Compensation::Unlink {
                relation,
                owner_id,
                member_id,
            } => {
                let (owner_side, member_side) = relation.sides();
                let owner = EntityRef::new(owner_side, owner_id);
                let member = EntityRef::new(member_side, member_id);
                detach_stored(self.repo, &self.linker, *relation, &owner, member_id).await?;
                detach_stored(self.repo, &self.linker, *relation, &member, owner_id).await?;
                Ok(())
            }
        }
    }
}

/// Load a record, drop its reference to `other_id` and save it if it changed.
/// A missing record is already detached.
pub(crate) async fn detach_stored(
    repo: &Repository,
    linker: &RelationshipLinker,
    relation: Relation,
    target: &EntityRef,
    other_id: &str,
) -> QualitagResult<()> {
    let Some(mut record) = repo.find_record(target).await? else {
        return Ok(());
    };
    if linker.detach(relation, &mut record, other_id) {
        repo.save_record(record).await?;
    }
    Ok(())
}

/// Records touched by a completed delete cascade
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeSummary {
    pub target: EntityRef,
    pub processed: Vec<EntityRef>,
}

/// Progress through a fixed delete plan.
///
/// Deletes are not rolled back. When an item fails, the plan splits into
/// completed items, the failed item and untouched items.
pub struct Cascade {
    operation: &'static str,
    target: EntityRef,
    plan: Vec<EntityRef>,
    completed: usize,
}

impl Cascade {
    pub fn new(operation: &'static str, target: EntityRef, plan: Vec<EntityRef>) -> Self {
        debug!(operation = operation, target = %target, items = plan.len(), "Cascade planned");
        Self {
            operation,
            target,
            plan,
            completed: 0,
        }
    }

    /// Items still to process, in order
    pub fn pending(&self) -> Vec<EntityRef> {
        self.plan.get(self.completed..).map(<[EntityRef]>::to_vec).unwrap_or_default()
    }

    pub fn advance(&mut self) {
        self.completed += 1;
    }

    /// Stop at the current item and build the partial-failure report
    pub fn fail(&self, error: QualitagError) -> QualitagError {
        let (done, rest) = self.plan.split_at(self.completed.min(self.plan.len()));
        let (failed, remaining) = match rest.split_first() {
            Some((failed, remaining)) => (failed.clone(), remaining.to_vec()),
            None => (self.target.clone(), Vec::new()),
        };
        warn!(
            operation = self.operation,
            target = %self.target,
            failed = %failed,
            error = %error,
            completed = done.len(),
            remaining = remaining.len(),
            "Cascade aborted"
        );
        QualitagError::PartialFailure(Box::new(CascadeReport {
            operation: self.operation.to_string(),
            target: self.target.clone(),
            completed: done.to_vec(),
            failure: CascadeFailure {
                entity: failed,
                error: error.to_string(),
            },
            remaining,
        }))
    }

    pub fn finish(self) -> CascadeSummary {
        debug!(operation = self.operation, target = %self.target, "Cascade finished");
        CascadeSummary {
            target: self.target,
            processed: self.plan,
        }
    }
}
