use crate::infra::{InMemoryApplicationRepository, InMemoryWardDirectory, LoggingProvisioning};
use crate::routes::transition_rows;
use civic_workflow::error::AppError;
use civic_workflow::workflows::approvals::{
    write_csv, ActorContext, ActorId, ApplicationStatusView, ApplicationType, AuditEntry,
    DocumentReference, DocumentRequirementChecker, DocumentType, DraftApplication,
    InspectionDecision, Jurisdiction, MemoryAuditTrail, OfficerDecision, PayloadFields, WardId,
    WorkflowEngine,
};
use chrono::SecondsFormat;
use clap::Args;
use serde_json::Value;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Write the demo's audit trail to this CSV file.
    #[arg(long)]
    pub(crate) audit_csv: Option<PathBuf>,
}

pub(crate) fn print_transition_table() {
    println!(
        "{:<18} {:<20} {:<18} {:<10} {:<8} {:<18} docs",
        "from", "transition", "to", "role", "creator", "requires"
    );
    for row in transition_rows() {
        println!(
            "{:<18} {:<20} {:<18} {:<10} {:<8} {:<18} {}",
            row.from,
            row.transition,
            row.to.unwrap_or("(removed)"),
            row.role,
            if row.creator_only { "yes" } else { "-" },
            row.required_field.unwrap_or("-"),
            if row.requires_documents { "yes" } else { "-" },
        );
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let repository = Arc::new(InMemoryApplicationRepository::default());
    let audit = Arc::new(MemoryAuditTrail::default());
    let provisioning = Arc::new(LoggingProvisioning::default());
    let engine = WorkflowEngine::new(
        repository,
        audit.clone(),
        provisioning.clone(),
        DocumentRequirementChecker::default(),
    );
    let router = engine.escalation_router(Arc::new(
        InMemoryWardDirectory::default().assign("officer-zone2", &["ward-07", "ward-08"]),
    ));

    let clerk = ActorContext::clerk("clerk-ward7");
    let inspector = ActorContext::inspector("insp-ward7");
    let officer = ActorContext::officer("officer-zone2");

    println!("Water connection approval demo");
    let draft = engine.create_draft(
        &clerk,
        DraftApplication {
            application_type: ApplicationType::WaterConnection,
            jurisdiction: Jurisdiction {
                ulb_id: "ulb-demo".to_string(),
                ward_id: WardId("ward-07".to_string()),
            },
            payload_fields: demo_payload(15),
            documents: vec![document(DocumentType::ApplicationForm)],
        },
    )?;
    let id = draft.application_id.clone();
    print_step("Clerk drafted", &draft);

    if let Err(err) = engine.submit(&id, &clerk) {
        println!("  Submit refused: {err}");
    }
    for document_type in [DocumentType::IdProof, DocumentType::AddressProof] {
        engine.attach_document(&id, &clerk, document(document_type))?;
    }
    print_step("Clerk submitted", &engine.submit(&id, &clerk)?);

    let escalated = engine.inspect(
        &id,
        &inspector,
        InspectionDecision::Escalate,
        Some("Connection crosses the state highway; needs officer sign-off"),
    )?;
    print_step("Inspector escalated", &escalated);

    let officer_id = ActorId("officer-zone2".to_string());
    match router.queue_for(&officer_id) {
        Ok(queue) => println!(
            "  Officer queue for {}: {} application(s)",
            officer_id,
            queue.len()
        ),
        Err(err) => println!("  Officer queue unavailable: {err}"),
    }

    let returned = engine.officer_decide(
        &id,
        &officer,
        OfficerDecision::SendBack,
        Some("Attach the road cutting permission and reduce the pipe size"),
    )?;
    print_step("Officer sent back", &returned);

    engine.save_draft(&id, &clerk, demo_payload(12))?;
    engine.attach_document(&id, &clerk, document(DocumentType::NoObjectionCertificate))?;
    let resubmitted =
        engine.submit_with_remarks(&id, &clerk, Some("Permission attached, size reduced"))?;
    print_step("Clerk resubmitted", &resubmitted);

    engine.begin_inspection(&id, &inspector)?;
    let approved = engine.inspect(
        &id,
        &inspector,
        InspectionDecision::Approve,
        Some("Verified on site"),
    )?;
    print_step("Inspector approved", &approved);
    println!(
        "  Provisioned applications: {}",
        provisioning
            .provisioned()
            .iter()
            .map(|id| id.0.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    match serde_json::to_string_pretty(&approved) {
        Ok(json) => println!("  Final status payload:\n{json}"),
        Err(err) => println!("  Final status payload unavailable: {err}"),
    }

    let history = engine.history(&id)?;
    println!("\nAudit trail ({} entries)", history.len());
    for entry in &history {
        print_audit_entry(entry);
    }

    if let Some(path) = args.audit_csv {
        let file = File::create(&path)?;
        write_csv(&history, file)?;
        println!("\nAudit trail exported to {}", path.display());
    }

    Ok(())
}

fn demo_payload(connection_size_mm: u32) -> PayloadFields {
    let mut fields = PayloadFields::new();
    fields.insert("holding_no".to_string(), Value::from("07-118-B"));
    fields.insert("connection_size_mm".to_string(), Value::from(connection_size_mm));
    fields.insert("usage".to_string(), Value::from("DOMESTIC"));
    fields
}

fn document(document_type: DocumentType) -> DocumentReference {
    DocumentReference {
        document_type,
        reference: format!("dms://demo/{}", document_type.label().to_ascii_lowercase()),
    }
}

fn print_step(label: &str, view: &ApplicationStatusView) {
    println!(
        "- {label}: {} ({}) -> {}",
        view.application_number, view.application_id, view.status
    );
}

fn print_audit_entry(entry: &AuditEntry) {
    let outcome = if entry.succeeded { "ok" } else { "refused" };
    let detail = entry
        .failure_reason
        .as_deref()
        .or(entry.remarks.as_deref())
        .unwrap_or("");
    println!(
        "  {} {:<22} {:<7} {:<10} {} {}",
        entry.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        entry.action.label(),
        outcome,
        entry.actor_role.label(),
        entry.actor_id,
        detail
    );
}
