//! Assembly Pipeline - Single Entry Point
//!
//! CRITICAL: generate MUST consult eligibility internally. No bypass.
//! Previews run the same assembly with sample context and never touch
//! eligibility state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::bulk::{self, BulkUnlockReport};
use crate::eligibility::{
    CertificateStatus, EligibilityError, EligibilityLedger, ProjectStatus, StudentId,
    UnlockOutcome,
};
use crate::hashing::{compute_issuance_hash, compute_spec_hash};
use crate::layout::Orientation;
use crate::styling::{parse_markup, StyledLine};
use crate::substitution::{substitute, SubstitutionContext};
use crate::templates::{
    Alignment, Background, CertificateType, ColorFill, Element, ElementId, FontSpec, ImageKind,
    Position, Size, Template, TemplateStore, TemplateValidationError,
};
use crate::ENGINE_VERSION;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static ELIGIBILITY_CONSULT_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_eligibility_consult_count() -> u32 {
    ELIGIBILITY_CONSULT_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_eligibility_consult_count() {
    ELIGIBILITY_CONSULT_COUNT.store(0, Ordering::SeqCst)
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no template saved for certificate type: {0}")]
    TemplateNotFound(CertificateType),

    #[error("template save rejected: {0}")]
    Validation(#[from] TemplateValidationError),

    #[error("not eligible for generation: current status is {status}")]
    NotEligible { status: CertificateStatus },

    #[error("template requires engine >= {required}, current is {current}")]
    EngineVersionMismatch { required: String, current: String },

    #[error("invalid version string: {0}")]
    InvalidVersion(String),

    #[error("template has no orientation, nothing to assemble")]
    MissingOrientation,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<EligibilityError> for EngineError {
    fn from(e: EligibilityError) -> Self {
        match e {
            EligibilityError::NotEligible { status } => EngineError::NotEligible { status },
        }
    }
}

/// A template element with placeholders substituted and markup parsed,
/// ready for a renderer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResolvedElement {
    #[serde(rename_all = "camelCase")]
    Text {
        id: ElementId,
        lines: Vec<StyledLine>,
        position: Position,
        font: FontSpec,
        color: ColorFill,
        alignment: Alignment,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        id: ElementId,
        kind: ImageKind,
        image_ref: String,
        position: Position,
        size: Size,
    },
}

/// Renderer-ready document: background plus ordered resolved elements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSpec {
    pub certificate_type: CertificateType,
    pub orientation: Orientation,
    pub canvas: [f64; 2],
    pub background: Background,
    pub border_color: String,
    pub elements: Vec<ResolvedElement>,
}

/// Issuance manifest: the document plus the audit trail around it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCertificate {
    pub id: String,
    pub student_id: StudentId,
    pub certificate_type: CertificateType,
    /// True when the record was already generated and this is a re-derivation.
    pub reissue: bool,
    pub issued_at: DateTime<Utc>,
    pub engine_version: String,
    pub spec_hash: String,
    pub issuance_hash: String,
    pub document: DocumentSpec,
}

/// Resolve a template against a context. Element order in the output equals
/// the template's insertion order; identical input gives identical output.
pub fn assemble(
    template: &Template,
    context: &SubstitutionContext,
) -> Result<DocumentSpec, EngineError> {
    let orientation = template.orientation.ok_or(EngineError::MissingOrientation)?;
    let canvas = crate::layout::canvas_dimensions(orientation);

    let elements = template
        .elements
        .iter()
        .map(|element| match element {
            Element::Text {
                id,
                text,
                position,
                font,
                color,
                alignment,
            } => ResolvedElement::Text {
                id: *id,
                lines: parse_markup(&substitute(text, context)),
                position: *position,
                font: font.clone(),
                color: color.clone(),
                alignment: *alignment,
            },
            Element::Image {
                id,
                kind,
                image_ref,
                position,
                size,
            } => ResolvedElement::Image {
                id: *id,
                kind: *kind,
                image_ref: image_ref.clone(),
                position: *position,
                size: *size,
            },
        })
        .collect();

    Ok(DocumentSpec {
        certificate_type: template.certificate_type,
        orientation,
        canvas,
        background: template.background.clone(),
        border_color: template.border_color.clone(),
        elements,
    })
}

/// The certificate engine - single entry point for callers.
///
/// Wraps the template store and the eligibility ledger behind the three
/// caller-facing surfaces: templates, eligibility, preview.
pub struct CertificateEngine {
    templates: TemplateStore,
    ledger: EligibilityLedger,
}

impl CertificateEngine {
    pub fn new(templates: TemplateStore, ledger: EligibilityLedger) -> Self {
        Self { templates, ledger }
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn ledger(&self) -> &EligibilityLedger {
        &self.ledger
    }

    // --- Template API ---

    pub fn get_template(&self, certificate_type: CertificateType) -> Result<Template, EngineError> {
        self.templates
            .get(certificate_type)
            .ok_or(EngineError::TemplateNotFound(certificate_type))
    }

    pub fn save_template(
        &self,
        certificate_type: CertificateType,
        template: Template,
    ) -> Result<(), EngineError> {
        self.templates.save(certificate_type, template)?;
        Ok(())
    }

    // --- Eligibility API ---

    pub fn get_status(&self, student_id: &str, certificate_type: CertificateType) -> CertificateStatus {
        self.ledger.status(student_id, certificate_type)
    }

    pub fn record_progress(
        &self,
        student_id: &str,
        certificate_type: CertificateType,
        completion_percentage: u8,
    ) {
        self.ledger
            .record_progress(student_id, certificate_type, completion_percentage)
    }

    pub fn record_project_review(
        &self,
        student_id: &str,
        certificate_type: CertificateType,
        project_status: ProjectStatus,
    ) {
        self.ledger
            .record_project_review(student_id, certificate_type, project_status)
    }

    pub fn unlock(
        &self,
        student_id: &str,
        certificate_type: CertificateType,
    ) -> Result<UnlockOutcome, EligibilityError> {
        self.ledger.unlock(student_id, certificate_type)
    }

    pub fn approve(&self, student_id: &str, certificate_type: CertificateType) {
        self.ledger.approve(student_id, certificate_type)
    }

    pub fn bulk_unlock(
        &self,
        student_ids: &[StudentId],
        certificate_type: CertificateType,
    ) -> BulkUnlockReport {
        bulk::bulk_unlock(&self.ledger, student_ids, certificate_type)
    }

    pub fn select_eligible(
        &self,
        student_ids: &[StudentId],
        certificate_type: CertificateType,
    ) -> Vec<StudentId> {
        bulk::select_eligible(&self.ledger, student_ids, certificate_type)
    }

    // --- Preview API ---

    /// Assemble a (possibly unsaved) template with sample context.
    /// Always allowed; eligibility state is never consulted or mutated.
    pub fn render_preview(
        &self,
        template: &Template,
        sample_context: &SubstitutionContext,
    ) -> Result<DocumentSpec, EngineError> {
        debug!(certificate_type = %template.certificate_type, "assembling preview");
        assemble(template, sample_context)
    }

    // --- Generation ---

    /// Issue a certificate.
    ///
    /// CRITICAL: The eligibility state machine is ALWAYS consulted first.
    /// No template is assembled for a student who is not unlocked, and the
    /// generated flag transitions exactly once per (student, type).
    pub fn generate(
        &self,
        student_id: &str,
        certificate_type: CertificateType,
        context: &SubstitutionContext,
    ) -> Result<IssuedCertificate, EngineError> {
        #[cfg(feature = "test-hooks")]
        ELIGIBILITY_CONSULT_COUNT.fetch_add(1, Ordering::SeqCst);

        let status = self.ledger.status(student_id, certificate_type);
        if !matches!(
            status,
            CertificateStatus::Unlocked | CertificateStatus::Generated
        ) {
            return Err(EngineError::NotEligible { status });
        }

        let template = self.get_template(certificate_type)?;
        self.check_engine_version(&template)?;

        let document = assemble(&template, context)?;
        // Final gate: atomic check-and-set. A concurrent winner downgrades
        // this call to a reissue; the flag still transitions exactly once.
        let mark = self.ledger.mark_generated(student_id, certificate_type)?;

        let spec_hash = compute_spec_hash(&document)?;
        let issuance_hash = compute_issuance_hash(
            student_id,
            certificate_type.as_str(),
            &spec_hash,
            ENGINE_VERSION,
        );

        info!(
            student = student_id,
            certificate_type = %certificate_type,
            reissue = mark.reissue,
            "certificate issued"
        );

        Ok(IssuedCertificate {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            certificate_type,
            reissue: mark.reissue,
            issued_at: mark.generated_at,
            engine_version: ENGINE_VERSION.to_string(),
            spec_hash,
            issuance_hash,
            document,
        })
    }

    fn check_engine_version(&self, template: &Template) -> Result<(), EngineError> {
        let engine_ver = semver::Version::parse(ENGINE_VERSION)
            .map_err(|_| EngineError::InvalidVersion(ENGINE_VERSION.to_string()))?;
        let min_ver = semver::Version::parse(&template.engine_min_version)
            .map_err(|_| EngineError::InvalidVersion(template.engine_min_version.clone()))?;

        if engine_ver < min_ver {
            return Err(EngineError::EngineVersionMismatch {
                required: template.engine_min_version.clone(),
                current: ENGINE_VERSION.to_string(),
            });
        }

        Ok(())
    }
}

impl Default for CertificateEngine {
    fn default() -> Self {
        Self::new(TemplateStore::default(), EligibilityLedger::default())
    }
}
