//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees.

use certforge_core::{
    eligibility::ProjectStatus,
    layout::Orientation,
    pipeline::assemble,
    styling::{parse_markup, StyledRun},
    substitution::{PlaceholderToken, SubstitutionContext},
    templates::{
        Alignment, CertificateType, ColorFill, FontSpec, ImageKind, Position, Size, Template,
        TemplateStore, TemplateValidationError,
    },
    CertificateEngine, CertificateStatus, EligibilityLedger, EngineError, ResolvedElement,
    UnlockOutcome,
};

fn completion_template() -> Template {
    let mut template = Template::new(CertificateType::Completion);
    template.orientation = Some(Orientation::Portrait);
    template.elements.insert_text(
        "Hello {student_name}",
        Position { x: 100.0, y: 200.0 },
        FontSpec::default(),
        ColorFill::default(),
        Alignment::Center,
    );
    template.elements.insert_image(
        ImageKind::Logo,
        "assets/logo.png",
        Position { x: 20.0, y: 20.0 },
        Size {
            width: 96.0,
            height: 96.0,
        },
    );
    template
}

fn engine_with_template() -> CertificateEngine {
    let engine = CertificateEngine::default();
    engine
        .save_template(CertificateType::Completion, completion_template())
        .unwrap();
    engine
}

fn asha_context() -> SubstitutionContext {
    SubstitutionContext::new().with(PlaceholderToken::StudentName, "Asha")
}

#[test]
fn invariant_empty_template_is_not_savable() {
    let store = TemplateStore::new();

    let mut template = Template::new(CertificateType::Completion);
    template.orientation = Some(Orientation::Portrait);
    assert_eq!(
        store.save(CertificateType::Completion, template),
        Err(TemplateValidationError::NoElements),
    );

    // Nothing was persisted on failure.
    assert!(store.get(CertificateType::Completion).is_none());
}

#[test]
fn invariant_validation_order_and_codes() {
    let store = TemplateStore::new();

    let draft = Template::new(CertificateType::Lor);
    assert_eq!(
        store.save(CertificateType::Lor, draft),
        Err(TemplateValidationError::MissingOrientation),
    );

    let mut blank = Template::new(CertificateType::Lor);
    blank.orientation = Some(Orientation::Landscape);
    blank.elements.insert_text(
        "   \n  ",
        Position { x: 0.0, y: 0.0 },
        FontSpec::default(),
        ColorFill::default(),
        Alignment::Left,
    );
    assert_eq!(
        store.save(CertificateType::Lor, blank),
        Err(TemplateValidationError::NoContent),
    );
}

#[test]
fn invariant_assembly_substitutes_and_preserves_order() {
    let template = completion_template();
    let document = assemble(&template, &asha_context()).unwrap();

    assert_eq!(document.elements.len(), 2);
    match &document.elements[0] {
        ResolvedElement::Text { lines, .. } => {
            assert_eq!(lines.len(), 1);
            assert_eq!(lines[0], vec![StyledRun::plain("Hello Asha")]);
        }
        other => panic!("expected text element first, got {other:?}"),
    }
    match &document.elements[1] {
        ResolvedElement::Image { image_ref, .. } => assert_eq!(image_ref, "assets/logo.png"),
        other => panic!("expected image element second, got {other:?}"),
    }
}

#[test]
fn invariant_assembly_is_deterministic() {
    let template = completion_template();
    let context = asha_context();

    let first = assemble(&template, &context).unwrap();
    let second = assemble(&template, &context).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        certforge_core::compute_spec_hash(&first).unwrap(),
        certforge_core::compute_spec_hash(&second).unwrap(),
    );
}

#[test]
fn invariant_markup_contract() {
    let lines = parse_markup("This is **bold** and *italic* and __under__ text");
    assert_eq!(
        lines[0],
        vec![
            StyledRun::plain("This is "),
            StyledRun::bold("bold"),
            StyledRun::plain(" and "),
            StyledRun::italic("italic"),
            StyledRun::plain(" and "),
            StyledRun::underline("under"),
            StyledRun::plain(" text"),
        ],
    );
}

#[test]
fn invariant_completion_lifecycle() {
    let engine = engine_with_template();

    engine.record_progress("s1", CertificateType::Completion, 100);
    assert_eq!(
        engine.get_status("s1", CertificateType::Completion),
        CertificateStatus::Eligible,
    );

    let outcome = engine.unlock("s1", CertificateType::Completion).unwrap();
    assert!(matches!(outcome, UnlockOutcome::Unlocked { .. }));
    assert_eq!(
        engine.get_status("s1", CertificateType::Completion),
        CertificateStatus::Unlocked,
    );

    let issued = engine
        .generate("s1", CertificateType::Completion, &asha_context())
        .unwrap();
    assert!(!issued.reissue);
    assert!(!issued.spec_hash.is_empty());
    assert!(!issued.document.elements.is_empty());
    assert_eq!(
        engine.get_status("s1", CertificateType::Completion),
        CertificateStatus::Generated,
    );
}

#[test]
fn invariant_generate_requires_unlock() {
    let engine = engine_with_template();

    engine.record_progress("s2", CertificateType::Completion, 100);
    let err = engine
        .generate("s2", CertificateType::Completion, &asha_context())
        .unwrap_err();
    match err {
        EngineError::NotEligible { status } => {
            assert_eq!(status, CertificateStatus::Eligible);
        }
        other => panic!("expected NotEligible, got {other:?}"),
    }
    // The failed attempt must not have flipped anything.
    assert_eq!(
        engine.get_status("s2", CertificateType::Completion),
        CertificateStatus::Eligible,
    );
}

#[test]
fn invariant_generate_is_idempotent() {
    let engine = engine_with_template();

    engine.record_progress("s3", CertificateType::Completion, 100);
    engine.unlock("s3", CertificateType::Completion).unwrap();

    let first = engine
        .generate("s3", CertificateType::Completion, &asha_context())
        .unwrap();
    let second = engine
        .generate("s3", CertificateType::Completion, &asha_context())
        .unwrap();

    assert!(!first.reissue);
    assert!(second.reissue);
    assert_eq!(first.spec_hash, second.spec_hash);
    assert_eq!(first.issued_at, second.issued_at);
}

#[test]
fn invariant_lor_two_step_approval() {
    let engine = CertificateEngine::default();

    engine.record_project_review("s4", CertificateType::Lor, ProjectStatus::Completed);
    assert_eq!(
        engine.get_status("s4", CertificateType::Lor),
        CertificateStatus::PendingAdminApproval,
    );

    let outcome = engine.unlock("s4", CertificateType::Lor).unwrap();
    assert_eq!(outcome, UnlockOutcome::NeedsApproval);
    assert_eq!(
        engine.get_status("s4", CertificateType::Lor),
        CertificateStatus::PendingAdminApproval,
    );

    engine.approve("s4", CertificateType::Lor);
    let outcome = engine.unlock("s4", CertificateType::Lor).unwrap();
    assert!(matches!(outcome, UnlockOutcome::Unlocked { .. }));
}

#[test]
fn invariant_bulk_partition_is_complete() {
    let engine = CertificateEngine::default();

    engine.record_project_review("s1", CertificateType::Lor, ProjectStatus::Excellent);
    engine.approve("s1", CertificateType::Lor);
    engine.record_project_review("s2", CertificateType::Lor, ProjectStatus::Completed);
    engine.record_project_review("s3", CertificateType::Lor, ProjectStatus::InProgress);

    let ids: Vec<String> = vec!["s1".into(), "s2".into(), "s3".into()];
    assert_eq!(
        engine.select_eligible(&ids, CertificateType::Lor),
        vec!["s1".to_string()],
    );
    let report = engine.bulk_unlock(&ids, CertificateType::Lor);

    assert_eq!(report.total(), ids.len());
    assert_eq!(report.succeeded, vec!["s1".to_string()]);
    assert_eq!(report.requires_admin_approval, vec!["s2".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].student_id, "s3");
    assert_eq!(report.failed[0].status, CertificateStatus::Locked);
}

#[test]
fn invariant_preview_never_touches_eligibility() {
    let engine = engine_with_template();

    let template = completion_template();
    engine.render_preview(&template, &asha_context()).unwrap();

    assert_eq!(
        engine.get_status("someone", CertificateType::Completion),
        CertificateStatus::Locked,
    );
}

#[test]
fn invariant_generate_without_template_mutates_nothing() {
    let engine = CertificateEngine::default();

    engine.record_progress("s5", CertificateType::Offer, 100);
    engine.unlock("s5", CertificateType::Offer).unwrap();

    let err = engine
        .generate("s5", CertificateType::Offer, &asha_context())
        .unwrap_err();
    assert!(matches!(err, EngineError::TemplateNotFound(_)));
    assert_eq!(
        engine.get_status("s5", CertificateType::Offer),
        CertificateStatus::Unlocked,
    );
}

#[test]
fn invariant_engine_version_gate() {
    let engine = CertificateEngine::default();

    let mut template = completion_template();
    template.engine_min_version = "99.0.0".to_string();
    engine
        .save_template(CertificateType::Completion, template)
        .unwrap();

    engine.record_progress("s6", CertificateType::Completion, 100);
    engine.unlock("s6", CertificateType::Completion).unwrap();

    let err = engine
        .generate("s6", CertificateType::Completion, &asha_context())
        .unwrap_err();
    assert!(matches!(err, EngineError::EngineVersionMismatch { .. }));
    // Refusal happens before the generated flag transition.
    assert_eq!(
        engine.get_status("s6", CertificateType::Completion),
        CertificateStatus::Unlocked,
    );
}

#[test]
fn invariant_rendered_bytes_stay_opaque() {
    use certforge_core::{
        render::{render_certificate, OutputFormat, RenderBackend, RenderError, RenderOptions},
        DocumentSpec,
    };

    struct FixedBackend;

    impl RenderBackend for FixedBackend {
        fn render(
            &self,
            _document: &DocumentSpec,
            _options: &RenderOptions,
        ) -> Result<Vec<u8>, RenderError> {
            Ok(b"rendered".to_vec())
        }
    }

    let engine = engine_with_template();
    engine.record_progress("s9", CertificateType::Completion, 100);
    engine.unlock("s9", CertificateType::Completion).unwrap();
    let issued = engine
        .generate("s9", CertificateType::Completion, &asha_context())
        .unwrap();

    let options = RenderOptions::custom(150, OutputFormat::Png).unwrap();
    let artifact = render_certificate(&FixedBackend, &issued, &options).unwrap();

    assert_eq!(artifact.filename, "completion-s9.png");
    assert_eq!(
        artifact.content_hash,
        certforge_core::hashing::sha256_hex(b"rendered"),
    );
    // The engine passes bytes through untouched, base64-wrapped.
    assert_eq!(artifact.data_base64, "cmVuZGVyZWQ=");
}

#[test]
fn invariant_template_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();

    let store = TemplateStore::new();
    store
        .save(CertificateType::Completion, completion_template())
        .unwrap();
    store.persist_to_dir(dir.path()).unwrap();

    let reloaded = TemplateStore::load_from_dir(dir.path()).unwrap();
    assert_eq!(
        reloaded.get(CertificateType::Completion),
        store.get(CertificateType::Completion),
    );
}

#[test]
fn invariant_ledger_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("eligibility.json");

    let ledger = EligibilityLedger::new();
    ledger.record_progress("s7", CertificateType::Completion, 100);
    ledger.unlock("s7", CertificateType::Completion).unwrap();
    ledger.persist_to_file(&path).unwrap();

    let reloaded = EligibilityLedger::load_from_file(&path).unwrap();
    assert_eq!(
        reloaded.record("s7", CertificateType::Completion),
        ledger.record("s7", CertificateType::Completion),
    );
    assert_eq!(
        reloaded.status("s7", CertificateType::Completion),
        CertificateStatus::Unlocked,
    );
}

#[cfg(feature = "test-hooks")]
#[test]
fn invariant_generate_always_consults_eligibility() {
    use certforge_core::pipeline::get_eligibility_consult_count;

    let engine = engine_with_template();

    // Counter deltas, not absolutes: other tests in this binary may be
    // generating concurrently.
    let before = get_eligibility_consult_count();
    let _ = engine.generate("s8", CertificateType::Completion, &asha_context());
    assert!(get_eligibility_consult_count() > before);

    engine.record_progress("s8", CertificateType::Completion, 100);
    engine.unlock("s8", CertificateType::Completion).unwrap();
    let before = get_eligibility_consult_count();
    engine
        .generate("s8", CertificateType::Completion, &asha_context())
        .unwrap();
    assert!(get_eligibility_consult_count() > before);
}
