use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info};

use super::creation::{CreationError, CreationOrchestrator, CreationOutcome};
use super::deletion::{CleanupReport, DeletionOrchestrator};
use super::domain::{TenantEvent, TenantId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EventOutcome {
    Created(CreationOutcome),
    Deleted(CleanupReport),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationFailure {
    pub tenant_id: TenantId,
    pub error: String,
}

/// Totals for one pass over an event channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopSummary {
    pub handled: usize,
    pub created: usize,
    pub deleted: usize,
    pub creation_failures: Vec<CreationFailure>,
}

/// Routes registry change notifications to the matching orchestrator.
pub struct LifecycleDispatcher {
    creation: CreationOrchestrator,
    deletion: DeletionOrchestrator,
}

impl LifecycleDispatcher {
    pub fn new(creation: CreationOrchestrator, deletion: DeletionOrchestrator) -> Self {
        Self { creation, deletion }
    }

    pub async fn handle(&self, event: &TenantEvent) -> Result<EventOutcome, CreationError> {
        match event {
            TenantEvent::Created(record) => self
                .creation
                .on_created(record)
                .await
                .map(EventOutcome::Created),
            TenantEvent::Deleted(record) => {
                Ok(EventOutcome::Deleted(self.deletion.on_deleted(record).await))
            }
        }
    }

    /// Consume events one at a time until every sender is dropped.
    pub async fn run(&self, mut events: mpsc::Receiver<TenantEvent>) -> LoopSummary {
        let mut summary = LoopSummary::default();

        while let Some(event) = events.recv().await {
            summary.handled += 1;
            match self.handle(&event).await {
                Ok(EventOutcome::Created(_)) => summary.created += 1,
                Ok(EventOutcome::Deleted(_)) => summary.deleted += 1,
                Err(failure) => {
                    error!(
                        tenant_id = %event.tenant_id(),
                        kind = event.kind(),
                        error = %failure,
                        "tenant event failed"
                    );
                    summary.creation_failures.push(CreationFailure {
                        tenant_id: event.tenant_id().clone(),
                        error: failure.to_string(),
                    });
                }
            }
        }

        info!(
            handled = summary.handled,
            failures = summary.creation_failures.len(),
            "event channel closed"
        );
        summary
    }
}
