//! # Identity & Scope Resolver
//!
//! Turns raw ids into loaded records and runs the policy check.
//!
//! ```text
//! actor_id ──► validate_uuid ──► IdentityStore::find ──► Worker
//!                  │                     │
//!                  ▼                     ▼
//!          InvalidIdentifier         NotFound
//!
//! Worker + Action + branch ──► policy::authorize ──► Allow | Forbidden
//! ```

use std::sync::Arc;

use tracing::warn;

use branchbook_core::validation::validate_uuid;
use branchbook_core::{authorize, authorize_role, Action, Branch, Decision, Scope, Worker};

use crate::error::{InvoicingError, InvoicingResult};
use crate::store::{BranchStore, IdentityStore};

/// Fails with `InvalidIdentifier` unless `value` is a well-formed UUID.
pub(crate) fn check_id(field: &str, value: &str) -> InvoicingResult<()> {
    validate_uuid(field, value).map_err(|_| InvoicingError::invalid_identifier(field, value))
}

#[derive(Clone)]
pub struct IdentityResolver {
    identities: Arc<dyn IdentityStore>,
    branches: Arc<dyn BranchStore>,
}

impl IdentityResolver {
    pub fn new(identities: Arc<dyn IdentityStore>, branches: Arc<dyn BranchStore>) -> Self {
        IdentityResolver {
            identities,
            branches,
        }
    }

    pub async fn resolve_actor(&self, actor_id: &str) -> InvoicingResult<Worker> {
        check_id("actor_id", actor_id)?;
        self.identities
            .find(actor_id)
            .await?
            .ok_or_else(|| InvoicingError::not_found("Worker", actor_id))
    }

    pub async fn resolve_branch(&self, branch_id: &str) -> InvoicingResult<Branch> {
        check_id("branch_id", branch_id)?;
        self.branches
            .find(branch_id)
            .await?
            .ok_or_else(|| InvoicingError::not_found("Branch", branch_id))
    }

    pub fn scope(&self, worker: &Worker) -> Scope {
        Scope::of(worker)
    }

    /// Runs the policy engine, turning a deny into `Forbidden`.
    pub fn ensure(
        &self,
        actor: &Worker,
        action: Action,
        target_branch: Option<&str>,
    ) -> InvoicingResult<()> {
        deny_unless(actor, action, target_branch, authorize(actor, action, target_branch))
    }

    /// Rejects roles that may never perform `action`, before the target is
    /// loaded. Callers still run [`ensure`](Self::ensure) afterwards.
    pub fn ensure_role(&self, actor: &Worker, action: Action) -> InvoicingResult<()> {
        deny_unless(actor, action, None, authorize_role(actor.role, action))
    }
}

fn deny_unless(
    actor: &Worker,
    action: Action,
    target_branch: Option<&str>,
    decision: Decision,
) -> InvoicingResult<()> {
    match decision {
        Decision::Allow => Ok(()),
        Decision::Deny(reason) => {
            warn!(
                actor_id = %actor.id,
                role = %actor.role,
                %action,
                target_branch = target_branch.unwrap_or("-"),
                %reason,
                "Action denied"
            );
            Err(InvoicingError::Forbidden { action, reason })
        }
    }
}
