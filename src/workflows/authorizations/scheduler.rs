use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};

use super::domain::AuthorizationId;
use super::repository::{AuditLogger, AuthorizationRepository, Notifier};
use super::service::AuthorizationWorkflow;

/// Spawn the fixed evaluation worker pool draining the workflow's bounded
/// queue. Submissions reserve queue capacity up front, so the queue depth is
/// the only admission control; workers simply pull ids and run
/// `evaluate_and_route`, whose own retry loop owns conflict handling.
///
/// Returns the number of workers started; zero means the queue receiver was
/// already taken by an earlier call.
pub fn start_evaluation_workers<R, N, A>(
    workflow: &Arc<AuthorizationWorkflow<R, N, A>>,
    workers: usize,
) -> usize
where
    R: AuthorizationRepository + 'static,
    N: Notifier + 'static,
    A: AuditLogger + 'static,
{
    let Some(rx) = workflow.take_evaluation_rx() else {
        return 0;
    };

    let workers = workers.max(1);
    let rx = Arc::new(Mutex::new(rx));

    for worker_id in 0..workers {
        let workflow = workflow.clone();
        let rx = rx.clone();
        tokio::spawn(async move {
            loop {
                let next = {
                    let mut guard = rx.lock().await;
                    guard.recv().await
                };
                let Some(id) = next else {
                    info!(worker_id, "evaluation worker shutting down");
                    break;
                };
                run_evaluation(&workflow, worker_id, id).await;
            }
        });
    }

    info!(workers, "evaluation worker pool started");
    workers
}

async fn run_evaluation<R, N, A>(
    workflow: &AuthorizationWorkflow<R, N, A>,
    worker_id: usize,
    id: AuthorizationId,
) where
    R: AuthorizationRepository + 'static,
    N: Notifier + 'static,
    A: AuditLogger + 'static,
{
    if let Err(cause) = workflow.evaluate_and_route(&id).await {
        // Surfaced through the audit trail already; the worker keeps going.
        error!(worker_id, %id, %cause, "evaluation failed");
    }
}
