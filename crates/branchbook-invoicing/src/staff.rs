//! Staff directory: reading worker records within scope, and self-service
//! profile edits.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use branchbook_core::validation::validate_profile_patch;
use branchbook_core::{Action, Branch, BranchSummary, ProfilePatch, Worker};

use crate::error::{InvoicingError, InvoicingResult};
use crate::identity::{check_id, IdentityResolver};
use crate::settings::InvoicingSettings;
use crate::store::{BranchStore, IdentityStore, Stores};

/// A worker joined with a summary of their branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffMember {
    #[serde(flatten)]
    pub worker: Worker,
    pub branch: Option<BranchSummary>,
}

#[derive(Clone)]
pub struct StaffDirectory {
    identities: Arc<dyn IdentityStore>,
    branches: Arc<dyn BranchStore>,
    resolver: IdentityResolver,
    page_cap: u32,
}

impl StaffDirectory {
    pub fn new(stores: &Stores, settings: &InvoicingSettings) -> Self {
        StaffDirectory {
            identities: Arc::clone(&stores.identities),
            branches: Arc::clone(&stores.branches),
            resolver: IdentityResolver::new(
                Arc::clone(&stores.identities),
                Arc::clone(&stores.branches),
            ),
            page_cap: settings.list_page_cap,
        }
    }

    /// Reads one worker. Non-admins only see workers of their own branch.
    pub async fn get_staff(&self, actor_id: &str, staff_id: &str) -> InvoicingResult<StaffMember> {
        check_id("actor_id", actor_id)?;
        check_id("staff_id", staff_id)?;

        let actor = self.resolver.resolve_actor(actor_id).await?;
        let worker = self
            .identities
            .find(staff_id)
            .await?
            .ok_or_else(|| InvoicingError::not_found("Worker", staff_id))?;
        self.resolver
            .ensure(&actor, Action::ReadStaff, worker.branch_id.as_deref())?;

        let branch = match worker.branch_id.as_deref() {
            Some(id) => self.branches.find(id).await?,
            None => None,
        };

        Ok(StaffMember {
            branch: branch.as_ref().map(BranchSummary::from),
            worker,
        })
    }

    pub async fn list_branch_staff(
        &self,
        actor_id: &str,
        branch_id: &str,
    ) -> InvoicingResult<Vec<StaffMember>> {
        check_id("actor_id", actor_id)?;
        check_id("branch_id", branch_id)?;

        let actor = self.resolver.resolve_actor(actor_id).await?;
        self.resolver
            .ensure(&actor, Action::ListBranchStaff, Some(branch_id))?;
        let branch = self.resolver.resolve_branch(branch_id).await?;

        let summary = BranchSummary::from(&branch);
        let workers = self.identities.find_by_branch(branch_id, self.page_cap).await?;

        Ok(workers
            .into_iter()
            .map(|worker| StaffMember {
                worker,
                branch: Some(summary.clone()),
            })
            .collect())
    }

    pub async fn list_all_staff(&self, actor_id: &str) -> InvoicingResult<Vec<StaffMember>> {
        check_id("actor_id", actor_id)?;

        let actor = self.resolver.resolve_actor(actor_id).await?;
        self.resolver.ensure(&actor, Action::ListAllStaff, None)?;

        let workers = self.identities.find_all(self.page_cap).await?;

        let mut branches: HashMap<String, Option<Branch>> = HashMap::new();
        let mut members = Vec::with_capacity(workers.len());
        for worker in workers {
            let branch = match worker.branch_id.as_deref() {
                Some(id) => {
                    if !branches.contains_key(id) {
                        branches.insert(id.to_string(), self.branches.find(id).await?);
                    }
                    branches
                        .get(id)
                        .and_then(Option::as_ref)
                        .map(BranchSummary::from)
                }
                None => None,
            };
            members.push(StaffMember { worker, branch });
        }

        Ok(members)
    }

    /// Edits the actor's own profile. Absent fields keep their value.
    pub async fn update_profile(
        &self,
        actor_id: &str,
        patch: ProfilePatch,
    ) -> InvoicingResult<Worker> {
        check_id("actor_id", actor_id)?;
        validate_profile_patch(&patch)?;

        let mut worker = self.resolver.resolve_actor(actor_id).await?;
        let before = worker.clone();

        if let Some(full_name) = patch.full_name {
            worker.full_name = full_name.trim().to_string();
        }
        if let Some(email) = patch.email {
            worker.email = email.trim().to_string();
        }
        if patch.phone_number.is_some() {
            worker.phone_number = patch.phone_number;
        }
        if patch.address.is_some() {
            worker.address = patch.address;
        }

        if worker == before {
            return Ok(worker);
        }

        worker.updated_at = Utc::now();
        self.identities.save(&worker).await?;
        info!(worker_id = %worker.id, "Profile updated");

        Ok(worker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::fixture;

    #[tokio::test]
    async fn test_staff_reads_colleague_but_not_other_branch() {
        let fx = fixture().await;
        let directory = fx.staff_directory();

        let member = directory.get_staff(&fx.staff.id, &fx.manager.id).await.unwrap();
        assert_eq!(member.worker.id, fx.manager.id);
        assert_eq!(member.branch.unwrap().id, fx.branch.id);

        let err = directory
            .get_staff(&fx.staff.id, &fx.other_manager.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_list_branch_staff() {
        let fx = fixture().await;
        let directory = fx.staff_directory();

        let members = directory
            .list_branch_staff(&fx.manager.id, &fx.branch.id)
            .await
            .unwrap();
        let ids: Vec<&str> = members.iter().map(|m| m.worker.id.as_str()).collect();
        assert_eq!(ids, vec![fx.manager.id.as_str(), fx.staff.id.as_str()]);

        let err = directory
            .list_branch_staff(&fx.staff.id, &fx.branch.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_list_all_staff_admin_only() {
        let fx = fixture().await;
        let directory = fx.staff_directory();

        let members = directory.list_all_staff(&fx.admin.id).await.unwrap();
        assert_eq!(members.len(), 4);
        assert!(members[0].branch.is_none());

        let err = directory.list_all_staff(&fx.manager.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_update_profile_keeps_absent_fields() {
        let fx = fixture().await;
        let directory = fx.staff_directory();

        let updated = directory
            .update_profile(
                &fx.staff.id,
                ProfilePatch {
                    phone_number: Some("+977 9800000000".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.phone_number.as_deref(), Some("+977 9800000000"));
        assert_eq!(updated.email, fx.staff.email);

        let stored = fx.db.workers().get_by_id(&fx.staff.id).await.unwrap().unwrap();
        assert_eq!(stored.phone_number, updated.phone_number);
    }

    #[tokio::test]
    async fn test_update_profile_rejects_bad_email() {
        let fx = fixture().await;
        let err = fx
            .staff_directory()
            .update_profile(
                &fx.staff.id,
                ProfilePatch {
                    email: Some("not-an-email".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn test_update_profile_email_taken() {
        let fx = fixture().await;
        let err = fx
            .staff_directory()
            .update_profile(
                &fx.staff.id,
                ProfilePatch {
                    email: Some(fx.admin.email.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
