//! # Role Policy Engine
//!
//! Single decision point for "may this worker do this action on this branch".
//!
//! ## Decision Table
//! ```text
//! ┌──────────────────────────┬──────────┬────────────┬────────────┐
//! │ Action                   │ Admin    │ Manager    │ Staff      │
//! ├──────────────────────────┼──────────┼────────────┼────────────┤
//! │ CreateInvoice            │ any      │ own branch │ deny       │
//! │ UpdateInvoice            │ any      │ own branch │ deny       │
//! │ ReadInvoice              │ any      │ own branch │ deny       │
//! │ ListBranchInvoices       │ any      │ own branch │ deny       │
//! │ ListAllInvoices          │ allow    │ deny       │ deny       │
//! │ DeleteInvoice            │ allow    │ deny       │ deny       │
//! │ ReconcileBranch          │ allow    │ deny       │ deny       │
//! │ ReadStaff                │ any      │ own branch │ own branch │
//! │ ListBranchStaff          │ any      │ own branch │ deny       │
//! │ ListAllStaff             │ allow    │ deny       │ deny       │
//! └──────────────────────────┴──────────┴────────────┴────────────┘
//! ```
//!
//! "Own branch" is plain string equality between the worker's `branch_id`
//! and the target branch id. No I/O happens here.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Role, Worker};

// =============================================================================
// Actions, Scopes, Decisions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreateInvoice,
    UpdateInvoice,
    ReadInvoice,
    ListBranchInvoices,
    ListAllInvoices,
    DeleteInvoice,
    ReconcileBranch,
    ReadStaff,
    ListBranchStaff,
    ListAllStaff,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::CreateInvoice => "create invoice",
            Action::UpdateInvoice => "update invoice",
            Action::ReadInvoice => "read invoice",
            Action::ListBranchInvoices => "list branch invoices",
            Action::ListAllInvoices => "list all invoices",
            Action::DeleteInvoice => "delete invoice",
            Action::ReconcileBranch => "reconcile branch",
            Action::ReadStaff => "read staff",
            Action::ListBranchStaff => "list branch staff",
            Action::ListAllStaff => "list all staff",
        };
        f.write_str(s)
    }
}

/// The set of branches a worker may touch for invoice work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    AllBranches,
    Branch(String),
    None,
}

impl Scope {
    pub fn of(worker: &Worker) -> Scope {
        match (worker.role, worker.branch_id.as_deref()) {
            (Role::Admin, _) => Scope::AllBranches,
            (Role::Manager, Some(branch)) => Scope::Branch(branch.to_string()),
            _ => Scope::None,
        }
    }

    pub fn includes(&self, branch_id: &str) -> bool {
        match self {
            Scope::AllBranches => true,
            Scope::Branch(own) => own == branch_id,
            Scope::None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The role may never perform this action.
    RoleNotPermitted,
    /// The role may perform it, but not on this branch.
    OutOfScope,
    /// A branch-scoped role has no home branch on record.
    MissingHomeBranch,
    /// A branch-scoped action was asked without a target branch.
    MissingTarget,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DenyReason::RoleNotPermitted => "your role is not permitted to do this",
            DenyReason::OutOfScope => "the target branch is outside your branch",
            DenyReason::MissingHomeBranch => "you are not assigned to a branch",
            DenyReason::MissingTarget => "no target branch was given",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    #[inline]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

// =============================================================================
// Authorization
// =============================================================================

enum Grant {
    Any,
    OwnBranch,
    Never,
}

fn grant(role: Role, action: Action) -> Grant {
    use Action::*;

    match (role, action) {
        (Role::Admin, _) => Grant::Any,

        (Role::Manager, CreateInvoice | UpdateInvoice | ReadInvoice | ListBranchInvoices) => {
            Grant::OwnBranch
        }
        (Role::Manager, ReadStaff | ListBranchStaff) => Grant::OwnBranch,
        (Role::Manager, _) => Grant::Never,

        (Role::Staff, ReadStaff) => Grant::OwnBranch,
        (Role::Staff, _) => Grant::Never,
    }
}

/// Decides whether `worker` may perform `action` on `target_branch`.
///
/// ```rust
/// use branchbook_core::policy::{authorize, Action, Decision, DenyReason};
/// # use branchbook_core::types::{Role, Worker};
/// # let now = chrono::Utc::now();
/// # let manager = Worker {
/// #     id: "w1".into(), role: Role::Manager, branch_id: Some("b1".into()),
/// #     full_name: "M".into(), email: "m@example.com".into(), phone_number: None,
/// #     address: None, created_at: now, updated_at: now,
/// # };
///
/// assert_eq!(authorize(&manager, Action::CreateInvoice, Some("b1")), Decision::Allow);
/// assert_eq!(
///     authorize(&manager, Action::CreateInvoice, Some("b2")),
///     Decision::Deny(DenyReason::OutOfScope)
/// );
/// ```
pub fn authorize(worker: &Worker, action: Action, target_branch: Option<&str>) -> Decision {
    match grant(worker.role, action) {
        Grant::Any => Decision::Allow,
        Grant::Never => Decision::Deny(DenyReason::RoleNotPermitted),
        Grant::OwnBranch => {
            let Some(target) = target_branch else {
                return Decision::Deny(DenyReason::MissingTarget);
            };
            match worker.branch_id.as_deref() {
                None => Decision::Deny(DenyReason::MissingHomeBranch),
                Some(own) if own == target => Decision::Allow,
                Some(_) => Decision::Deny(DenyReason::OutOfScope),
            }
        }
    }
}

/// Role-only pre-check for actions whose target branch is not known yet.
///
/// Denies with `RoleNotPermitted` when no branch could ever allow the action.
/// An `Allow` here still needs [`authorize`] once the target is loaded.
pub fn authorize_role(role: Role, action: Action) -> Decision {
    match grant(role, action) {
        Grant::Never => Decision::Deny(DenyReason::RoleNotPermitted),
        Grant::Any | Grant::OwnBranch => Decision::Allow,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
