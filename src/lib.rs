//! CertForge Core - Certificate Issuance Compiler
//!
//! # The Five Laws (Non-Negotiable)
//! 1. Templates Are Contracts
//! 2. Validation Is Protective
//! 3. Eligibility Gates Generation
//! 4. Deterministic Assembly
//! 5. Renderers Receive, Engine Decides

pub mod templates;
pub mod layout;
pub mod substitution;
pub mod styling;
pub mod eligibility;
pub mod bulk;
pub mod pipeline;
pub mod render;
pub mod hashing;

pub use templates::{
    CertificateType, Element, ElementId, Template, TemplateStore, TemplateValidationError,
};
pub use layout::{canvas_dimensions, move_element, resize_element, LayoutError, Orientation};
pub use substitution::{substitute, PlaceholderToken, StudentProfile, SubstitutionContext};
pub use styling::{parse_markup, StyledRun};
pub use eligibility::{
    CertificateStatus, EligibilityError, EligibilityLedger, EligibilityRecord, ProjectStatus,
    StudentId, UnlockOutcome,
};
pub use bulk::{BulkFailure, BulkUnlockReport};
pub use pipeline::{
    CertificateEngine, DocumentSpec, EngineError, IssuedCertificate, ResolvedElement,
};
pub use render::{RenderBackend, RenderError, RenderOptions, RenderedArtifact};
pub use hashing::{canonical_json, compute_issuance_hash, compute_spec_hash};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const MIN_TEMPLATE_VERSION: &str = "1.0.0";
