use std::sync::Arc;

use super::common::*;
use crate::workflows::approvals::audit::{AuditTrail, MemoryAuditTrail, WorkflowAction};
use crate::workflows::approvals::documents::DocumentRequirementChecker;
use crate::workflows::approvals::domain::{
    ActorContext, ActorId, ActorRole, ApplicationId, ApplicationStatus, ApplicationType,
    DocumentType,
};
use crate::workflows::approvals::repository::{ApplicationRepository, ProvisioningHook};
use crate::workflows::approvals::service::{
    TransitionRequest, WorkflowEngine, WorkflowError, WorkflowErrorKind,
};
use crate::workflows::approvals::transition::{
    InspectionDecision, OfficerDecision, RemarkField, Transition, TransitionPayload,
};
use crate::workflows::approvals::validator::TransitionRejection;

#[test]
fn water_connection_submit_waits_for_mandatory_documents() {
    let harness = harness();
    let draft = harness
        .engine
        .create_draft(&clerk(), water_draft("ward-07", Vec::new()))
        .expect("draft created");
    let id = draft.application_id.clone();

    match harness.engine.submit(&id, &clerk()) {
        Err(WorkflowError::Rejected(TransitionRejection::DocumentRequirementNotMet { missing })) => {
            assert_eq!(
                missing,
                vec![
                    DocumentType::ApplicationForm,
                    DocumentType::IdProof,
                    DocumentType::AddressProof,
                ]
            );
        }
        other => panic!("expected missing documents, got {other:?}"),
    }
    let record = stored(&harness, &id);
    assert_eq!(record.status(), ApplicationStatus::Draft);
    assert!(record.timestamps().submitted_at.is_none());

    for document in water_documents() {
        harness
            .engine
            .attach_document(&id, &clerk(), document)
            .expect("attach succeeds");
    }
    harness.clock.advance_minutes(10);
    let view = harness.engine.submit(&id, &clerk()).expect("submit succeeds");

    assert_eq!(view.status, ApplicationStatus::Submitted);
    assert_eq!(view.timestamps.submitted_at, Some(harness.clock_now()));
    assert_eq!(
        view.actor_refs.submitted_by,
        Some(ActorId("clerk-ward7".to_string()))
    );
    assert_eq!(view.documents, 3);
}

#[test]
fn send_back_keeps_inspector_remarks_next_to_officer_remarks() {
    let harness = harness();
    let id = submitted_application(&harness, "ward-07");

    harness.clock.advance_minutes(15);
    let escalated = harness
        .engine
        .execute(TransitionRequest {
            application_id: id.clone(),
            transition: Transition::Escalate,
            actor: inspector(),
            payload: TransitionPayload::default()
                .with(
                    RemarkField::EscalationReason,
                    "Connection size exceeds ward allotment",
                )
                .with(RemarkField::InspectorRemarks, "Site visited, meter point is fine"),
        })
        .expect("escalated")
        .expect("record kept");
    assert_eq!(escalated.status, ApplicationStatus::Escalated);
    assert!(escalated.timestamps.escalated_at.is_some());

    harness.clock.advance_minutes(15);
    let returned = harness
        .engine
        .officer_decide(
            &id,
            &officer(),
            OfficerDecision::SendBack,
            Some("Attach the revised load calculation"),
        )
        .expect("sent back");

    assert_eq!(returned.status, ApplicationStatus::Returned);
    assert_eq!(
        returned.remarks.inspector_remarks.as_deref(),
        Some("Site visited, meter point is fine")
    );
    assert_eq!(
        returned.remarks.escalation_reason.as_deref(),
        Some("Connection size exceeds ward allotment")
    );
    assert_eq!(
        returned.remarks.officer_remarks.as_deref(),
        Some("Attach the revised load calculation")
    );
    assert!(returned.remarks.return_reason.is_none());
    assert!(returned.timestamps.decided_at.is_none());
    assert_eq!(
        returned.actor_refs.decided_by_officer,
        Some(ActorId("officer-zone2".to_string()))
    );
}

#[test]
fn escalation_remark_survives_an_officer_send_back() {
    let harness = harness();
    let id = submitted_application(&harness, "ward-07");

    harness
        .engine
        .inspect(
            &id,
            &inspector(),
            InspectionDecision::Escalate,
            Some("needs officer review"),
        )
        .expect("escalated");
    let returned = harness
        .engine
        .officer_decide(
            &id,
            &officer(),
            OfficerDecision::SendBack,
            Some("incomplete address"),
        )
        .expect("sent back");

    assert_eq!(returned.status, ApplicationStatus::Returned);
    assert_eq!(
        returned.remarks.inspector_remarks.as_deref(),
        Some("needs officer review")
    );
    assert_eq!(
        returned.remarks.escalation_reason.as_deref(),
        Some("needs officer review")
    );
    assert_eq!(
        returned.remarks.officer_remarks.as_deref(),
        Some("incomplete address")
    );
}

#[test]
fn inspector_approval_fires_provisioning_once() {
    let harness = harness();
    let id = submitted_application(&harness, "ward-07");

    harness
        .engine
        .inspect(&id, &inspector(), InspectionDecision::Approve, None)
        .expect("approved");

    assert_eq!(harness.provisioning.deliveries(), 1);
    assert_eq!(harness.provisioning.provisioned(), 1);

    harness
        .provisioning
        .on_application_approved(&id, ApplicationType::WaterConnection)
        .expect("redelivery accepted");
    assert_eq!(harness.provisioning.deliveries(), 2);
    assert_eq!(
        harness.provisioning.provisioned(),
        1,
        "redelivery must not provision twice"
    );
}

#[test]
fn provisioning_failure_does_not_undo_the_approval() {
    let repository = Arc::new(MemoryRepository::default());
    let audit = Arc::new(MemoryAuditTrail::default());
    let provisioning = Arc::new(CountingProvisioning::failing());
    let engine = WorkflowEngine::new(
        repository.clone(),
        audit.clone(),
        provisioning.clone(),
        DocumentRequirementChecker::default(),
    );

    let draft = engine
        .create_draft(&clerk(), water_draft("ward-03", water_documents()))
        .expect("draft");
    let id = draft.application_id;
    engine.submit(&id, &clerk()).expect("submitted");
    engine
        .inspect(&id, &inspector(), InspectionDecision::Escalate, Some("needs sign-off"))
        .expect("escalated");

    let view = engine
        .officer_decide(&id, &officer(), OfficerDecision::Approve, None)
        .expect("approval stands");

    assert_eq!(view.status, ApplicationStatus::Approved);
    assert!(view.timestamps.decided_at.is_some());
    assert_eq!(provisioning.deliveries(), 1);
    assert_eq!(provisioning.provisioned(), 0);
    let record = repository.fetch(&id).expect("fetch").expect("present");
    assert_eq!(record.status(), ApplicationStatus::Approved);
}

#[test]
fn only_clerks_create_drafts() {
    let harness = harness();

    let error = harness
        .engine
        .create_draft(&inspector(), water_draft("ward-07", Vec::new()))
        .expect_err("inspectors cannot draft");

    assert_eq!(error.kind(), WorkflowErrorKind::InvalidTransition);
    assert!(matches!(
        error,
        WorkflowError::Rejected(TransitionRejection::ActionNotPermitted {
            role: ActorRole::Inspector,
            ..
        })
    ));
    assert_eq!(harness.audit.len(), 1);
    assert!(harness
        .repository
        .by_status(ApplicationStatus::Draft)
        .expect("list")
        .is_empty());
}

#[test]
fn created_drafts_get_typed_application_numbers() {
    let harness = harness();
    let view = harness
        .engine
        .create_draft(&clerk(), water_draft("ward-07", Vec::new()))
        .expect("draft");

    assert!(view.application_id.0.starts_with("app-"));
    assert!(view.application_number.0.starts_with("WTR-2025-"));
    assert_eq!(view.status, ApplicationStatus::Draft);
    assert_eq!(view.timestamps.created_at, start_time());

    let entries = history(&harness, &view.application_id);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, WorkflowAction::Create);
    assert_eq!(entries[0].from_state, None);
    assert_eq!(entries[0].to_state, Some(ApplicationStatus::Draft));
}

#[test]
fn editing_is_limited_to_the_creating_clerk_in_editable_states() {
    let harness = harness();
    let id = submitted_application(&harness, "ward-07");

    let mut fields = stored(&harness, &id).payload_fields().clone();
    fields.insert("connection_size_mm".to_string(), serde_json::json!(20));

    let locked = harness
        .engine
        .save_draft(&id, &clerk(), fields.clone())
        .expect_err("submitted applications are locked");
    assert_eq!(locked.kind(), WorkflowErrorKind::PreconditionFailed);

    harness
        .engine
        .inspect(&id, &inspector(), InspectionDecision::Return, Some("Wrong pipe size"))
        .expect("returned");

    let stranger = ActorContext::new("clerk-ward9", ActorRole::Clerk, false);
    let refused = harness
        .engine
        .save_draft(&id, &stranger, fields.clone())
        .expect_err("only the creator edits");
    assert_eq!(refused.kind(), WorkflowErrorKind::InvalidTransition);

    let view = harness
        .engine
        .save_draft(&id, &clerk(), fields)
        .expect("creator edits returned application");
    assert_eq!(view.status, ApplicationStatus::Returned);
    assert_eq!(
        stored(&harness, &id).payload_fields().get("connection_size_mm"),
        Some(&serde_json::json!(20))
    );
}

#[test]
fn creator_claim_from_another_clerk_is_refused() {
    let harness = harness();
    let id = harness
        .engine
        .create_draft(&clerk(), water_draft("ward-07", water_documents()))
        .expect("draft")
        .application_id;
    let impostor = ActorContext::new("clerk-somebody-else", ActorRole::Clerk, true);

    let attach = harness
        .engine
        .attach_document(&id, &impostor, document(DocumentType::SitePlan))
        .expect_err("attach refused");
    assert_eq!(attach.kind(), WorkflowErrorKind::InvalidTransition);

    let submit = harness
        .engine
        .submit(&id, &impostor)
        .expect_err("submit refused");
    assert_eq!(submit.kind(), WorkflowErrorKind::InvalidTransition);

    let delete = harness
        .engine
        .delete_draft(&id, &impostor)
        .expect_err("delete refused");
    assert_eq!(delete.kind(), WorkflowErrorKind::InvalidTransition);

    let view = harness
        .engine
        .status_for(&id, &impostor)
        .expect("status view");
    assert_eq!(view.available_actions, Some(Vec::new()));

    let record = stored(&harness, &id);
    assert_eq!(record.status(), ApplicationStatus::Draft);
    assert_eq!(record.documents().len(), 3);
    assert_eq!(
        history(&harness, &id)
            .iter()
            .filter(|entry| !entry.succeeded)
            .count(),
        3
    );

    harness
        .engine
        .submit(&id, &clerk())
        .expect("drafting clerk still submits");
}

#[test]
fn duplicate_attachments_are_ignored() {
    let harness = harness();
    let view = harness
        .engine
        .create_draft(&clerk(), water_draft("ward-07", water_documents()))
        .expect("draft");
    let before = stored(&harness, &view.application_id).version();

    let after = harness
        .engine
        .attach_document(
            &view.application_id,
            &clerk(),
            document(DocumentType::IdProof),
        )
        .expect("attach is accepted");

    assert_eq!(after.documents, 3);
    assert_eq!(stored(&harness, &view.application_id).version(), before);
}

#[test]
fn delete_draft_removes_record_but_keeps_audit() {
    let harness = harness();
    let view = harness
        .engine
        .create_draft(&clerk(), water_draft("ward-07", Vec::new()))
        .expect("draft");
    let id = view.application_id;

    harness.engine.delete_draft(&id, &clerk()).expect("deleted");

    match harness.engine.get(&id) {
        Err(WorkflowError::NotFound(missing)) => assert_eq!(missing, id),
        other => panic!("expected not found, got {other:?}"),
    }
    let entries = history(&harness, &id);
    assert_eq!(entries.len(), 2);
    let last = entries.last().expect("delete audited");
    assert_eq!(last.action, WorkflowAction::Transition(Transition::Delete));
    assert!(last.succeeded);
    assert_eq!(last.to_state, None);
}

#[test]
fn delete_after_submission_is_a_precondition_failure() {
    let harness = harness();
    let id = submitted_application(&harness, "ward-07");

    let error = harness
        .engine
        .delete_draft(&id, &clerk())
        .expect_err("submitted applications stay");

    assert_eq!(error.kind(), WorkflowErrorKind::PreconditionFailed);
    assert!(!error.is_retryable());
    assert_eq!(stored(&harness, &id).status(), ApplicationStatus::Submitted);
}

#[test]
fn unknown_application_is_not_found_and_audited() {
    let harness = harness();
    let id = ApplicationId("app-missing".to_string());

    let error = harness
        .engine
        .submit(&id, &clerk())
        .expect_err("nothing to submit");

    assert_eq!(error.kind(), WorkflowErrorKind::NotFound);
    let entries = history(&harness, &id);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].from_state, None);
    assert!(!entries[0].succeeded);
}

#[test]
fn lost_race_is_a_retryable_conflict() {
    let repository = Arc::new(RacingRepository::default());
    let audit = Arc::new(MemoryAuditTrail::default());
    let engine = WorkflowEngine::new(
        repository.clone(),
        audit.clone(),
        Arc::new(CountingProvisioning::default()),
        DocumentRequirementChecker::default(),
    );
    let draft = engine
        .create_draft(&clerk(), water_draft("ward-07", water_documents()))
        .expect("draft");
    let id = draft.application_id;

    repository.arm();
    let error = engine.submit(&id, &clerk()).expect_err("stale write refused");
    assert_eq!(error.kind(), WorkflowErrorKind::Conflict);
    assert!(error.is_retryable());

    let retry = engine.submit(&id, &clerk()).expect_err("re-evaluated");
    assert_eq!(retry.kind(), WorkflowErrorKind::InvalidTransition);

    let failures: Vec<_> = audit
        .entries_for(&id)
        .expect("audit")
        .into_iter()
        .filter(|entry| !entry.succeeded)
        .collect();
    assert_eq!(failures.len(), 2);
}

#[test]
fn concurrent_inspector_decisions_commit_exactly_once() {
    let harness = harness();
    let id = submitted_application(&harness, "ward-07");

    let outcomes: Vec<_> = std::thread::scope(|scope| {
        let approve = scope.spawn(|| {
            harness
                .engine
                .inspect(&id, &inspector(), InspectionDecision::Approve, None)
        });
        let escalate = scope.spawn(|| {
            harness.engine.inspect(
                &id,
                &ActorContext::inspector("insp-ward8"),
                InspectionDecision::Escalate,
                Some("Second opinion"),
            )
        });
        vec![
            approve.join().expect("approve thread"),
            escalate.join().expect("escalate thread"),
        ]
    });

    let committed = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(committed, 1);
    for outcome in outcomes.iter().filter_map(|outcome| outcome.as_ref().err()) {
        assert!(matches!(
            outcome.kind(),
            WorkflowErrorKind::Conflict | WorkflowErrorKind::InvalidTransition
        ));
    }
    assert_ne!(stored(&harness, &id).status(), ApplicationStatus::Submitted);
}

#[test]
fn storage_outage_is_unavailable() {
    let engine = WorkflowEngine::new(
        Arc::new(UnavailableRepository),
        Arc::new(MemoryAuditTrail::default()),
        Arc::new(CountingProvisioning::default()),
        DocumentRequirementChecker::default(),
    );

    let error = engine
        .submit(&ApplicationId("app-000001".to_string()), &clerk())
        .expect_err("storage offline");

    assert_eq!(error.kind(), WorkflowErrorKind::Unavailable);
    assert!(!error.is_retryable());
}

#[test]
fn audit_outage_does_not_fail_a_committed_transition() {
    let repository = Arc::new(MemoryRepository::default());
    let engine = WorkflowEngine::new(
        repository.clone(),
        Arc::new(FailingAuditTrail),
        Arc::new(CountingProvisioning::default()),
        DocumentRequirementChecker::default(),
    );

    let draft = engine
        .create_draft(&clerk(), water_draft("ward-07", water_documents()))
        .expect("draft survives audit outage");
    let view = engine
        .submit(&draft.application_id, &clerk())
        .expect("submit survives audit outage");

    assert_eq!(view.status, ApplicationStatus::Submitted);
    assert!(matches!(
        engine.history(&draft.application_id),
        Err(WorkflowError::Audit(_))
    ));
}

#[test]
fn submit_merges_documents_from_the_external_store() {
    let repository = Arc::new(MemoryRepository::default());
    let documents = Arc::new(StaticDocumentStore::default());
    let engine = WorkflowEngine::new(
        repository.clone(),
        Arc::new(MemoryAuditTrail::default()),
        Arc::new(CountingProvisioning::default()),
        DocumentRequirementChecker::default(),
    )
    .with_document_store(documents.clone());

    let draft = engine
        .create_draft(
            &clerk(),
            water_draft("ward-07", vec![document(DocumentType::ApplicationForm)]),
        )
        .expect("draft");
    let id = draft.application_id;

    documents.upload(&id, document(DocumentType::IdProof));
    documents.upload(&id, document(DocumentType::AddressProof));
    documents.upload(&id, document(DocumentType::ApplicationForm));

    let view = engine.submit(&id, &clerk()).expect("store documents count");
    assert_eq!(view.documents, 3);
    assert_eq!(
        repository
            .fetch(&id)
            .expect("fetch")
            .expect("present")
            .documents()
            .len(),
        3
    );
}

#[test]
fn updated_at_never_moves_backwards() {
    let harness = harness();
    let id = submitted_application(&harness, "ward-07");
    let submitted = stored(&harness, &id).timestamps().updated_at;

    harness.clock.rewind_minutes(120);
    harness
        .engine
        .begin_inspection(&id, &inspector())
        .expect("inspection opened");

    let record = stored(&harness, &id);
    assert_eq!(record.timestamps().updated_at, submitted);
    assert_eq!(record.timestamps().inspected_at, Some(submitted));
    assert_eq!(record.status(), ApplicationStatus::UnderInspection);
}

#[test]
fn approved_water_connections_can_be_completed() {
    let harness = harness();
    let id = submitted_application(&harness, "ward-07");
    harness
        .engine
        .inspect(&id, &inspector(), InspectionDecision::Approve, Some("Meter fitted"))
        .expect("approved");

    let mut record = stored(&harness, &id);
    let version = record.version();
    record
        .mark_completed(harness.clock_now())
        .expect("water connection completes");
    harness
        .repository
        .update(record, version)
        .expect("completion stored");

    assert_eq!(stored(&harness, &id).status(), ApplicationStatus::Completed);

    let mut again = stored(&harness, &id);
    assert!(matches!(
        again.mark_completed(harness.clock_now()),
        Err(TransitionRejection::PreconditionFailed { .. })
    ));
}

#[test]
fn worklists_list_applications_by_current_status() {
    let harness = harness();
    let draft = harness
        .engine
        .create_draft(&clerk(), water_draft("ward-07", Vec::new()))
        .expect("draft created")
        .application_id;
    let submitted = submitted_application(&harness, "ward-07");
    let escalated = escalated_application(&harness, "ward-08");

    let ids = |status| -> Vec<ApplicationId> {
        harness
            .engine
            .list(status)
            .expect("worklist")
            .iter()
            .map(|record| record.id().clone())
            .collect()
    };

    assert_eq!(ids(ApplicationStatus::Draft), vec![draft]);
    assert_eq!(ids(ApplicationStatus::Submitted), vec![submitted]);
    assert_eq!(ids(ApplicationStatus::Escalated), vec![escalated]);
    assert!(ids(ApplicationStatus::Approved).is_empty());
}

#[test]
fn application_ids_and_numbers_share_one_increasing_sequence() {
    let harness = harness();
    let first = harness
        .engine
        .create_draft(&clerk(), water_draft("ward-07", Vec::new()))
        .expect("first draft");
    let second = harness
        .engine
        .create_draft(&clerk(), water_draft("ward-07", Vec::new()))
        .expect("second draft");

    assert!(second.application_id > first.application_id);
    for view in [&first, &second] {
        let sequence = view.application_id.0.trim_start_matches("app-");
        assert!(view.application_number.0.ends_with(sequence));
    }
}
