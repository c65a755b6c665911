//! Bulk Operation Coordinator
//!
//! Applies unlock across many students with no transactional atomicity:
//! per-id attempts are independent, nothing rolls back, and every id lands
//! in exactly one partition of the report.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::eligibility::{
    CertificateStatus, EligibilityError, EligibilityLedger, StudentId, UnlockOutcome,
};
use crate::templates::CertificateType;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailure {
    pub student_id: StudentId,
    /// Computed state at the time of the attempt, for diagnostics.
    pub status: CertificateStatus,
}

/// Complete three-way partition of a bulk unlock. Never an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BulkUnlockReport {
    pub succeeded: Vec<StudentId>,
    pub requires_admin_approval: Vec<StudentId>,
    pub failed: Vec<BulkFailure>,
}

impl BulkUnlockReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.requires_admin_approval.len() + self.failed.len()
    }
}

/// Run `unlock` independently for every id. Already-unlocked records count
/// as successes (the unlock goal is met either way).
pub fn bulk_unlock(
    ledger: &EligibilityLedger,
    student_ids: &[StudentId],
    certificate_type: CertificateType,
) -> BulkUnlockReport {
    let mut report = BulkUnlockReport::default();
    for student_id in student_ids {
        match ledger.unlock(student_id, certificate_type) {
            Ok(UnlockOutcome::Unlocked { .. }) | Ok(UnlockOutcome::AlreadyUnlocked) => {
                report.succeeded.push(student_id.clone());
            }
            Ok(UnlockOutcome::NeedsApproval) => {
                report.requires_admin_approval.push(student_id.clone());
            }
            Err(EligibilityError::NotEligible { status }) => {
                report.failed.push(BulkFailure {
                    student_id: student_id.clone(),
                    status,
                });
            }
        }
    }
    info!(
        certificate_type = %certificate_type,
        succeeded = report.succeeded.len(),
        requires_admin_approval = report.requires_admin_approval.len(),
        failed = report.failed.len(),
        "bulk unlock finished"
    );
    report
}

/// Pure filter used to pre-populate bulk targets.
pub fn select_eligible(
    ledger: &EligibilityLedger,
    student_ids: &[StudentId],
    certificate_type: CertificateType,
) -> Vec<StudentId> {
    student_ids
        .iter()
        .filter(|id| ledger.status(id, certificate_type) == CertificateStatus::Eligible)
        .cloned()
        .collect()
}
