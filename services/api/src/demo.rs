use crate::infra::DemoCollaborators;
use clap::Args;
use serde::Serialize;
use tenant_lifecycle::config::{AppConfig, LifecycleConfig};
use tenant_lifecycle::error::AppError;
use tenant_lifecycle::workflows::lifecycle::{
    CallerContext, CleanupReport, CreationOutcome, EventOutcome, Identity, StatusView, TenantEvent,
    TenantId, TenantRecord,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Leave deployment dispatch unconfigured to show the failure path.
    #[arg(long)]
    pub(crate) unconfigured_dispatch: bool,
}

/// Everything observed while walking one tenant through creation and deletion.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DemoTranscript {
    pub(crate) creation: Result<CreationOutcome, String>,
    pub(crate) dispatched: Vec<String>,
    pub(crate) status: Result<StatusView, String>,
    pub(crate) anonymous_status: Result<StatusView, String>,
    pub(crate) cleanup: Option<CleanupReport>,
    pub(crate) status_after_delete: Result<StatusView, String>,
    pub(crate) sites_remaining: Vec<String>,
    pub(crate) identities_remaining: usize,
    pub(crate) config_targets_remaining: Vec<String>,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let transcript = village7_scenario(!args.unconfigured_dispatch, &config.lifecycle).await?;

    println!("Tenant lifecycle demo (in-memory collaborators)");
    match &transcript.creation {
        Ok(outcome) => println!(
            "  Created: site {} on {}, hosting {:?}",
            outcome.site_id, outcome.domain, outcome.hosting
        ),
        Err(err) => println!("  Creation failed: {}", err),
    }
    if transcript.dispatched.is_empty() {
        println!("  Deployment runs: none dispatched");
    } else {
        println!("  Deployment runs: {}", transcript.dispatched.join(", "));
    }

    match &transcript.status {
        Ok(view) => println!(
            "  Status (authenticated): {}",
            view.deployment_status.label()
        ),
        Err(err) => println!("  Status (authenticated) unavailable: {}", err),
    }
    if let Err(err) = &transcript.anonymous_status {
        println!("  Status (anonymous): {}", err);
    }

    if let Some(report) = &transcript.cleanup {
        println!(
            "\nDeleted: {} identities attempted, {} succeeded, {} failed",
            report.attempted, report.succeeded, report.failed
        );
        match serde_json::to_string_pretty(report) {
            Ok(json) => println!("  Cleanup report:\n{}", json),
            Err(err) => println!("  Cleanup report unavailable: {}", err),
        }
    }
    if let Err(err) = &transcript.status_after_delete {
        println!("  Status after deletion: {}", err);
    }
    println!(
        "  Remaining: {} sites, {} identities, {} hosting config targets",
        transcript.sites_remaining.len(),
        transcript.identities_remaining,
        transcript.config_targets_remaining.len()
    );

    Ok(())
}

/// Provision `village7`, query its status, then delete it and query again.
pub(crate) async fn village7_scenario(
    dispatch_configured: bool,
    config: &LifecycleConfig,
) -> Result<DemoTranscript, AppError> {
    let demo = DemoCollaborators::new(dispatch_configured);
    let collaborators = demo.collaborators();
    let dispatcher = collaborators.dispatcher(config);
    let status = collaborators.status_service(config);

    let tenant = TenantId::new("village7");
    let record = TenantRecord::new("village7", "village7-abc123", "");
    demo.registry.insert(record.clone()).await;
    demo.identities
        .seed(
            &tenant,
            ["uid-sarpanch", "uid-secretary", "uid-clerk"]
                .into_iter()
                .map(|uid| Identity {
                    uid: uid.to_string(),
                    email: Some(format!("{uid}@village7.example")),
                })
                .collect(),
        )
        .await;
    demo.hosting_config.seed("village7").await;

    let creation = match dispatcher.handle(&TenantEvent::Created(record)).await {
        Ok(EventOutcome::Created(outcome)) => Ok(outcome),
        Ok(EventOutcome::Deleted(_)) => Err("unexpected cleanup for a created tenant".to_string()),
        Err(err) => Err(err.to_string()),
    };

    let operator = CallerContext::authenticated("ops@village7.example");
    let current = status
        .deployment_status(&operator, &tenant)
        .await
        .map_err(|err| err.to_string());
    let anonymous_status = status
        .deployment_status(&CallerContext::Anonymous, &tenant)
        .await
        .map_err(|err| err.to_string());

    let removed = demo.registry.remove(&tenant).await;
    let cleanup = match removed {
        Some(record) => match dispatcher.handle(&TenantEvent::Deleted(record)).await? {
            EventOutcome::Deleted(report) => Some(report),
            EventOutcome::Created(_) => None,
        },
        None => None,
    };

    let status_after_delete = status
        .deployment_status(&operator, &tenant)
        .await
        .map_err(|err| err.to_string());

    Ok(DemoTranscript {
        creation,
        dispatched: demo.dispatcher.runs().await,
        status: current,
        anonymous_status,
        cleanup,
        status_after_delete,
        sites_remaining: demo.hosting.sites().await,
        identities_remaining: demo.identities.remaining(&tenant).await,
        config_targets_remaining: demo.hosting_config.targets().await,
    })
}
