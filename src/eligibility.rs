//! Eligibility & Unlock State Machine
//!
//! One record per (student, certificate type). Records are created lazily,
//! never deleted, and only move forward: progress feeds may rise and fall,
//! but unlock/approve/generate flags never revert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, info};

use crate::templates::CertificateType;

pub type StudentId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    NotStarted,
    InProgress,
    Completed,
    Excellent,
}

impl ProjectStatus {
    pub fn review_passed(&self) -> bool {
        matches!(self, ProjectStatus::Completed | ProjectStatus::Excellent)
    }
}

impl Default for ProjectStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

/// Derived state. `LOCKED -> ELIGIBLE -> UNLOCKED -> GENERATED`, with
/// `PENDING_ADMIN_APPROVAL` as a side-state for org-gated types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateStatus {
    Locked,
    Eligible,
    PendingAdminApproval,
    Unlocked,
    Generated,
}

impl std::fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CertificateStatus::Locked => "LOCKED",
            CertificateStatus::Eligible => "ELIGIBLE",
            CertificateStatus::PendingAdminApproval => "PENDING_ADMIN_APPROVAL",
            CertificateStatus::Unlocked => "UNLOCKED",
            CertificateStatus::Generated => "GENERATED",
        };
        f.write_str(s)
    }
}

impl CertificateType {
    /// Organization-level gating applies to recommendation letters only.
    pub fn requires_admin_approval(&self) -> bool {
        matches!(self, CertificateType::Lor)
    }

    fn progress_met(&self, record: &EligibilityRecord) -> bool {
        match self {
            CertificateType::Completion | CertificateType::Offer => {
                record.completion_percentage >= 100
            }
            CertificateType::Lor => record.project_status.review_passed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityRecord {
    pub student_id: StudentId,
    pub certificate_type: CertificateType,
    #[serde(default)]
    pub completion_percentage: u8,
    #[serde(default)]
    pub project_status: ProjectStatus,
    #[serde(default)]
    pub unlocked: bool,
    #[serde(default)]
    pub unlocked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub admin_approved: bool,
    #[serde(default)]
    pub generated: bool,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
}

impl EligibilityRecord {
    pub fn new(student_id: impl Into<StudentId>, certificate_type: CertificateType) -> Self {
        Self {
            student_id: student_id.into(),
            certificate_type,
            completion_percentage: 0,
            project_status: ProjectStatus::NotStarted,
            unlocked: false,
            unlocked_at: None,
            admin_approved: false,
            generated: false,
            generated_at: None,
        }
    }

    /// Derive the current state.
    ///
    /// Unlock flags are checked before progress so the status never
    /// regresses once unlocked, even if progress later decreases.
    pub fn status(&self) -> CertificateStatus {
        if self.unlocked {
            if self.generated {
                CertificateStatus::Generated
            } else {
                CertificateStatus::Unlocked
            }
        } else if !self.certificate_type.progress_met(self) {
            CertificateStatus::Locked
        } else if self.certificate_type.requires_admin_approval() && !self.admin_approved {
            CertificateStatus::PendingAdminApproval
        } else {
            CertificateStatus::Eligible
        }
    }
}

/// Unlock is three-way: a state change, an idempotent no-op, or a request
/// for admin sign-off. None of these are failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnlockOutcome {
    #[serde(rename_all = "camelCase")]
    Unlocked { unlocked_at: DateTime<Utc> },
    AlreadyUnlocked,
    NeedsApproval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum EligibilityError {
    #[error("operation out of sequence: current status is {status}")]
    #[serde(rename_all = "camelCase")]
    NotEligible { status: CertificateStatus },
}

/// Outcome of the generation flag transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationMark {
    /// True when the certificate had already been generated before.
    pub reissue: bool,
    pub generated_at: DateTime<Utc>,
}

type RecordKey = (StudentId, CertificateType);

/// Owner of all eligibility records, keyed by (student, certificate type).
///
/// All mutation happens under the write lock, which also serializes the
/// generated-flag transition per key.
pub struct EligibilityLedger {
    records: RwLock<HashMap<RecordKey, EligibilityRecord>>,
}

impl EligibilityLedger {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Load a ledger snapshot written by [`persist_to_file`](Self::persist_to_file).
    pub fn load_from_file(path: &Path) -> Result<Self, std::io::Error> {
        let ledger = Self::new();
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let snapshot: Vec<EligibilityRecord> = serde_json::from_str(&content)?;
            let mut records = ledger.records.write().unwrap();
            for record in snapshot {
                records.insert(
                    (record.student_id.clone(), record.certificate_type),
                    record,
                );
            }
        }
        Ok(ledger)
    }

    /// Persist every record as a deterministic JSON snapshot.
    pub fn persist_to_file(&self, path: &Path) -> Result<(), std::io::Error> {
        let mut snapshot: Vec<EligibilityRecord> =
            self.records.read().unwrap().values().cloned().collect();
        snapshot.sort_by(|a, b| {
            (a.student_id.as_str(), a.certificate_type.as_str())
                .cmp(&(b.student_id.as_str(), b.certificate_type.as_str()))
        });
        let json = serde_json::to_string_pretty(&snapshot)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Snapshot of the record. An absent record reads as a fresh locked
    /// default - fail-closed, and reading never creates state.
    pub fn record(
        &self,
        student_id: &str,
        certificate_type: CertificateType,
    ) -> EligibilityRecord {
        self.records
            .read()
            .unwrap()
            .get(&(student_id.to_string(), certificate_type))
            .cloned()
            .unwrap_or_else(|| EligibilityRecord::new(student_id, certificate_type))
    }

    pub fn status(&self, student_id: &str, certificate_type: CertificateType) -> CertificateStatus {
        self.record(student_id, certificate_type).status()
    }

    /// External progress feed: course completion percentage (clamped to 100).
    /// Never clears unlock/generate flags.
    pub fn record_progress(
        &self,
        student_id: &str,
        certificate_type: CertificateType,
        completion_percentage: u8,
    ) {
        let mut records = self.records.write().unwrap();
        let record = Self::entry(&mut records, student_id, certificate_type);
        record.completion_percentage = completion_percentage.min(100);
        debug!(
            student = student_id,
            certificate_type = %certificate_type,
            percentage = record.completion_percentage,
            "progress recorded"
        );
    }

    /// External progress feed: project review outcome.
    pub fn record_project_review(
        &self,
        student_id: &str,
        certificate_type: CertificateType,
        project_status: ProjectStatus,
    ) {
        let mut records = self.records.write().unwrap();
        let record = Self::entry(&mut records, student_id, certificate_type);
        record.project_status = project_status;
        debug!(
            student = student_id,
            certificate_type = %certificate_type,
            "project review recorded"
        );
    }

    /// Grant admin approval. Does not unlock: callers re-invoke
    /// [`unlock`](Self::unlock) afterward (explicit two-step protocol).
    pub fn approve(&self, student_id: &str, certificate_type: CertificateType) {
        let mut records = self.records.write().unwrap();
        let record = Self::entry(&mut records, student_id, certificate_type);
        record.admin_approved = true;
        info!(
            student = student_id,
            certificate_type = %certificate_type,
            "admin approval granted"
        );
    }

    /// Attempt to unlock. Eligible records transition; pending-approval
    /// records report [`UnlockOutcome::NeedsApproval`] without mutating;
    /// already-unlocked records are a no-op success; locked records fail.
    pub fn unlock(
        &self,
        student_id: &str,
        certificate_type: CertificateType,
    ) -> Result<UnlockOutcome, EligibilityError> {
        let mut records = self.records.write().unwrap();
        let record = Self::entry(&mut records, student_id, certificate_type);
        match record.status() {
            CertificateStatus::Unlocked | CertificateStatus::Generated => {
                Ok(UnlockOutcome::AlreadyUnlocked)
            }
            CertificateStatus::PendingAdminApproval => Ok(UnlockOutcome::NeedsApproval),
            CertificateStatus::Eligible => {
                let now = Utc::now();
                record.unlocked = true;
                record.unlocked_at = Some(now);
                info!(
                    student = student_id,
                    certificate_type = %certificate_type,
                    "certificate unlocked"
                );
                Ok(UnlockOutcome::Unlocked { unlocked_at: now })
            }
            status => Err(EligibilityError::NotEligible { status }),
        }
    }

    /// Flip the generated flag. The check-and-set runs entirely under the
    /// write lock, so the flag transitions exactly once per key even with
    /// parallel callers; a repeat call reports a reissue.
    pub fn mark_generated(
        &self,
        student_id: &str,
        certificate_type: CertificateType,
    ) -> Result<GenerationMark, EligibilityError> {
        let mut records = self.records.write().unwrap();
        let record = Self::entry(&mut records, student_id, certificate_type);
        match record.status() {
            CertificateStatus::Generated => Ok(GenerationMark {
                reissue: true,
                generated_at: record.generated_at.unwrap_or_else(Utc::now),
            }),
            CertificateStatus::Unlocked => {
                let now = Utc::now();
                record.generated = true;
                record.generated_at = Some(now);
                info!(
                    student = student_id,
                    certificate_type = %certificate_type,
                    "certificate generated"
                );
                Ok(GenerationMark {
                    reissue: false,
                    generated_at: now,
                })
            }
            status => Err(EligibilityError::NotEligible { status }),
        }
    }

    fn entry<'a>(
        records: &'a mut HashMap<RecordKey, EligibilityRecord>,
        student_id: &str,
        certificate_type: CertificateType,
    ) -> &'a mut EligibilityRecord {
        records
            .entry((student_id.to_string(), certificate_type))
            .or_insert_with(|| EligibilityRecord::new(student_id, certificate_type))
    }
}

impl Default for EligibilityLedger {
    fn default() -> Self {
        Self::new()
    }
}
