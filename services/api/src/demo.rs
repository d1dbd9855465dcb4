use crate::infra::{demo_directory, InMemoryObjectStore, LoggingDispatcher};
use chrono::Utc;
use clap::Args;
use hairflow::access::Identity;
use hairflow::dashboards::{agent_dashboard, clinic_dashboard, PatientDirectory};
use hairflow::error::AppError;
use hairflow::forms::{
    AnswerValue, FieldKind, FieldPatch, FormBuilder, FormCollaborators, FormService,
    FormSettings, InMemoryDistributionRepository, InMemorySubmissionRepository,
    InMemoryTemplateRepository, PageTransition, SendRequest, UploadKind, UploadPayload,
};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Comma separated patient e-mails the consultation form is sent to
    #[arg(long, default_value = "john@example.com, sarah@example.com")]
    pub(crate) recipients: String,
    /// Origin used for share links in the demo output
    #[arg(long, default_value = "http://localhost:8080")]
    pub(crate) base_url: String,
    /// Skip the dashboard snapshot at the end of the demo
    #[arg(long)]
    pub(crate) skip_dashboards: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        recipients,
        base_url,
        skip_dashboards,
    } = args;

    let objects = Arc::new(InMemoryObjectStore::new(&base_url));
    let service = FormService::new(
        FormCollaborators {
            templates: Arc::new(InMemoryTemplateRepository::default()),
            distributions: Arc::new(InMemoryDistributionRepository::default()),
            submissions: Arc::new(InMemorySubmissionRepository::default()),
            dispatcher: Arc::new(LoggingDispatcher),
            storage: objects.clone(),
        },
        FormSettings {
            share_base_url: base_url,
            ..FormSettings::default()
        },
    );

    println!("HairFlow intake demo");

    let mut builder = FormBuilder::new();
    builder.set_name("Hair Transplant Consultation");
    builder.set_description("Pre-consultation questionnaire for FUE candidates");
    let pattern = builder.add_field();
    builder.update_field(
        &pattern,
        FieldPatch {
            kind: Some(FieldKind::SingleSelect),
            label: Some("Hair Loss Pattern".to_string()),
            required: Some(true),
            ..FieldPatch::default()
        },
    );
    builder.set_options_text(&pattern, "Male Pattern\nFemale Pattern\nAlopecia Areata\nOther");
    let photos = builder.add_field();
    builder.update_field(
        &photos,
        FieldPatch {
            kind: Some(FieldKind::File),
            label: Some("Scalp Photos".to_string()),
            ..FieldPatch::default()
        },
    );

    let now = Utc::now();
    let template = builder
        .save(|draft| service.save_template(draft.clone(), now))?
        .template;
    println!("\nSaved form template");
    println!("  • {} ({})", template.name, template.id);
    println!("  • {} fields, share link {}", template.fields.len(), template.share_url);

    let receipt = service.send_form(
        &template.id,
        SendRequest {
            recipients,
            message: None,
        },
        now,
    )?;
    println!("\nSent to {} recipient(s)", receipt.recipient_count);

    let Some(invite) = receipt.distribution_ids.first().cloned() else {
        println!("  • no distribution records created");
        return Ok(());
    };

    let session = service.start_intake(&template.id.0, Some(invite.clone()), now)?;
    let session_id = session.session_id.clone();
    println!(
        "\nPatient opened invitation {invite}: page {}/{} ({:.0}% complete)",
        session.render.page + 1,
        session.render.page_count,
        session.render.progress_percent
    );

    for (field, value) in [
        ("1", "John"),
        ("2", "Smith"),
        ("3", "john@example.com"),
    ] {
        service.record_answer(
            &session_id,
            &hairflow::forms::FieldId::new(field),
            AnswerValue::Text(value.to_string()),
        )?;
    }
    service.record_answer(
        &session_id,
        &pattern,
        AnswerValue::Text("Male Pattern".to_string()),
    )?;
    let files = service
        .upload_files(
            &session_id,
            &photos,
            UploadKind::Photos,
            vec![UploadPayload {
                file_name: "crown.jpg".to_string(),
                content_type: None,
                bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
            }],
        )
        .await?;
    for file in &files {
        println!("  • uploaded {} → {}", file.name, file.url);
    }

    loop {
        let step = service.advance(&session_id, Utc::now())?;
        match step.transition {
            PageTransition::Advanced { page } => {
                println!("  • advanced to page {}", page + 1);
            }
            PageTransition::Submitted => {
                println!("  • submitted: {}", step.session.render.message);
                break;
            }
            PageTransition::Retreated { .. } | PageTransition::Unchanged => break,
        }
    }

    let panel = service.share_panel(&template.id)?;
    println!(
        "\nSharing analytics: {} sent, {} completed ({}%)",
        panel.analytics.total_sent, panel.analytics.completed, panel.analytics.completion_rate
    );
    for record in &panel.records {
        println!(
            "  • {:<24} {:<10} expires {}",
            record.recipient.email,
            record.badge.label,
            record.expires_at.format("%Y-%m-%d")
        );
    }

    let summary = service.portfolio_summary()?;
    println!(
        "\nPortfolio: {} form(s), {} sent, {} completed, {}% average completion, {} stored file(s)",
        summary.total_forms,
        summary.total_sent,
        summary.total_completed,
        summary.average_completion_rate,
        objects.len()
    );

    if !skip_dashboards {
        render_dashboards(summary.total_forms);
    }

    Ok(())
}

fn render_dashboards(active_forms: usize) {
    let directory = demo_directory();
    let agent = Identity {
        user_id: "demo-agent".to_string(),
        email: "agent@hairflow.test".to_string(),
        full_name: None,
        role: None,
    };

    match directory.agent_patients(&agent) {
        Ok(patients) => {
            let dashboard = agent_dashboard(&agent, patients, active_forms, None);
            println!("\n{}", dashboard.title);
            for stat in &dashboard.stats {
                println!("  • {}: {}", stat.title, stat.value);
            }
            for row in &dashboard.patients {
                println!(
                    "  • {:<16} {:<24} {}",
                    row.patient.name, row.patient.clinic, row.badge.label
                );
            }
        }
        Err(err) => println!("\nAgent dashboard unavailable: {err}"),
    }

    match directory.clinic_patients(&agent) {
        Ok(patients) => {
            let dashboard = clinic_dashboard(&agent, patients, Utc::now().date_naive());
            println!("\n{}", dashboard.title);
            for stat in &dashboard.stats {
                println!("  • {}: {}", stat.title, stat.value);
            }
            println!(
                "  • {} agent referral(s), {} direct patient(s)",
                dashboard.agent_referrals.len(),
                dashboard.direct_patients.len()
            );
        }
        Err(err) => println!("\nClinic dashboard unavailable: {err}"),
    }
}
