use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::criteria::CriteriaLibrary;
use super::domain::{
    Authorization, AuthorizationId, AuthorizationStatus, InvalidTransition,
};
use super::evaluation::CriteriaEvaluator;
use super::intake::{AuthorizationRequest, IntakeValidator, ValidationError};
use super::repository::{
    AuditEvent, AuditLogger, AuthorizationRepository, Notifier, RepositoryError,
    StatusChangeNotice,
};
use super::store::AuthorizationStore;

const SYSTEM_ACTOR: &str = "system";

/// Reviewer verdict on an authorization in UNDER_REVIEW.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewerDecision {
    Approve,
    Deny,
    RequestDocuments,
}

impl ReviewerDecision {
    pub const fn target_status(self) -> AuthorizationStatus {
        match self {
            ReviewerDecision::Approve => AuthorizationStatus::Approved,
            ReviewerDecision::Deny => AuthorizationStatus::Denied,
            ReviewerDecision::RequestDocuments => AuthorizationStatus::PendingDocuments,
        }
    }
}

/// Error raised by the workflow service.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("concurrent modification of authorization {0}")]
    VersionConflict(AuthorizationId),
    #[error("evaluation queue at capacity; retry later")]
    CapacityExceeded,
    #[error("authorization {0} not found")]
    NotFound(AuthorizationId),
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),
}

impl WorkflowError {
    fn from_repository(id: AuthorizationId, error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound => WorkflowError::NotFound(id),
            RepositoryError::VersionConflict { .. } => WorkflowError::VersionConflict(id),
            RepositoryError::Unavailable(cause) => WorkflowError::DependencyUnavailable(cause),
        }
    }
}

/// Tuning for the orchestrator's write retries and evaluation pool.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub max_write_retries: u32,
    pub retry_backoff: Duration,
    pub evaluation_queue_depth: usize,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_write_retries: 3,
            retry_backoff: Duration::from_millis(50),
            evaluation_queue_depth: 64,
        }
    }
}

/// Orchestrator for the prior authorization lifecycle.
///
/// Owns the status-transition policy end to end: intake validation, the
/// asynchronous evaluation hand-off, reviewer actions, and the audit and
/// notification side effects around every committed transition. Persistence
/// goes through the optimistic-version store, so the precondition status is
/// re-verified at write time: a concurrent writer advances the version and
/// the losing write fails instead of clobbering.
pub struct AuthorizationWorkflow<R, N, A> {
    store: AuthorizationStore<R>,
    criteria: Arc<CriteriaLibrary>,
    validator: IntakeValidator,
    notifier: Arc<N>,
    audit: Arc<A>,
    settings: WorkflowSettings,
    evaluation_tx: mpsc::Sender<AuthorizationId>,
    evaluation_rx: Mutex<Option<mpsc::Receiver<AuthorizationId>>>,
}

impl<R, N, A> AuthorizationWorkflow<R, N, A>
where
    R: AuthorizationRepository + 'static,
    N: Notifier + 'static,
    A: AuditLogger + 'static,
{
    pub fn new(
        repository: Arc<R>,
        notifier: Arc<N>,
        audit: Arc<A>,
        criteria: Arc<CriteriaLibrary>,
        list_ttl: Duration,
        settings: WorkflowSettings,
    ) -> Self {
        let (evaluation_tx, evaluation_rx) =
            mpsc::channel(settings.evaluation_queue_depth.max(1));
        Self {
            store: AuthorizationStore::new(repository, list_ttl),
            criteria,
            validator: IntakeValidator::new(),
            notifier,
            audit,
            settings,
            evaluation_tx,
            evaluation_rx: Mutex::new(Some(evaluation_rx)),
        }
    }

    /// Take the evaluation queue receiver so the scheduler can drain it.
    /// Returns `None` once workers have already been started.
    pub(crate) fn take_evaluation_rx(&self) -> Option<mpsc::Receiver<AuthorizationId>> {
        self.evaluation_rx
            .lock()
            .ok()
            .and_then(|mut guard| guard.take())
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Validate a request and persist a new authorization in DRAFT.
    pub fn create(&self, request: AuthorizationRequest) -> Result<Authorization, WorkflowError> {
        let actor = request.requested_by.clone();
        let entity = self.validator.authorization_from_request(request)?;
        let id = entity.authorization_id;

        let stored = self
            .store
            .put(&entity, entity.version)
            .map_err(|error| self.audit_repository_failure(id, "create", &actor, error))?;

        info!(%id, "authorization created");
        self.audit
            .record(AuditEvent::success(id, "AUTHORIZATION_CREATED", &actor));
        Ok(stored)
    }

    /// Transition DRAFT → SUBMITTED and schedule asynchronous evaluation.
    ///
    /// Queue capacity is reserved before anything is written, so a saturated
    /// pool rejects the submission without a half-applied transition.
    pub fn submit(
        &self,
        id: &AuthorizationId,
        actor: &str,
    ) -> Result<Authorization, WorkflowError> {
        let permit = self
            .evaluation_tx
            .try_reserve()
            .map_err(|error| match error {
                mpsc::error::TrySendError::Full(()) => WorkflowError::CapacityExceeded,
                mpsc::error::TrySendError::Closed(()) => WorkflowError::DependencyUnavailable(
                    "evaluation queue closed".to_string(),
                ),
            })?;

        let stored = self.transition_once(id, AuthorizationStatus::Submitted, "Submitted for review", actor)?;

        permit.send(*id);
        info!(%id, "authorization submitted; evaluation scheduled");
        Ok(stored)
    }

    /// Evaluate a submitted authorization and route it per the outcome.
    ///
    /// Invoked by the evaluation workers. Retries the load-evaluate-write
    /// cycle on version conflicts and repository outages up to the configured
    /// bound; a concurrent cancellation is observed on re-read and aborts the
    /// evaluation without a competing transition.
    pub async fn evaluate_and_route(&self, id: &AuthorizationId) -> Result<(), WorkflowError> {
        let mut last_error: Option<RepositoryError> = None;

        for attempt in 0..self.settings.max_write_retries {
            if attempt > 0 {
                tokio::time::sleep(self.settings.retry_backoff * attempt).await;
            }

            let mut entity = match self.store.get(id) {
                Ok(entity) => entity,
                Err(RepositoryError::Unavailable(cause)) => {
                    last_error = Some(RepositoryError::Unavailable(cause));
                    continue;
                }
                Err(error) => {
                    return Err(WorkflowError::from_repository(*id, error));
                }
            };

            if entity.status != AuthorizationStatus::Submitted {
                self.audit.record(AuditEvent::failure(
                    *id,
                    "AUTHORIZATION_EVALUATED",
                    SYSTEM_ACTOR,
                    &format!("evaluation aborted: status is {}", entity.status.label()),
                ));
                info!(%id, status = entity.status.label(), "evaluation aborted");
                return Ok(());
            }

            let expected_version = entity.version;
            let old_status = entity.status;
            let rule_set = self
                .criteria
                .lookup(&entity.medication.drug_name, &entity.medication.drug_class);

            let (target, reason) = match rule_set {
                Some(rule_set) => {
                    let outcome = CriteriaEvaluator::evaluate(
                        &entity.medication,
                        &entity.clinical,
                        &rule_set,
                        chrono::Utc::now().date_naive(),
                    );
                    let decision = outcome.routing();
                    let reason = decision.reason(&outcome);
                    entity.evaluation = Some(outcome);
                    (decision.target_status(), reason)
                }
                None => (
                    AuthorizationStatus::UnderReview,
                    format!(
                        "No clinical criteria on file for {}",
                        entity.medication.drug_name
                    ),
                ),
            };

            // The lifecycle graph has no SUBMITTED -> APPROVED edge; an
            // auto-approval passes through UNDER_REVIEW within the same
            // persisted write, leaving both steps in the history.
            if target == AuthorizationStatus::Approved {
                entity.transition(
                    AuthorizationStatus::UnderReview,
                    "Clinical criteria evaluation complete",
                    SYSTEM_ACTOR,
                )?;
            }
            entity.transition(target, &reason, SYSTEM_ACTOR)?;

            match self.store.put(&entity, expected_version) {
                Ok(stored) => {
                    self.audit.record(AuditEvent::success(
                        *id,
                        "AUTHORIZATION_EVALUATED",
                        SYSTEM_ACTOR,
                    ));
                    self.dispatch_notice(&stored, old_status, &reason);
                    info!(%id, status = stored.status.label(), "evaluation routed");
                    return Ok(());
                }
                Err(RepositoryError::NotFound) => {
                    return Err(WorkflowError::NotFound(*id));
                }
                Err(error) => {
                    warn!(%id, attempt, %error, "evaluation write lost; retrying");
                    last_error = Some(error);
                }
            }
        }

        let error = match last_error {
            Some(error) => WorkflowError::from_repository(*id, error),
            None => WorkflowError::VersionConflict(*id),
        };
        self.audit.record(AuditEvent::failure(
            *id,
            "AUTHORIZATION_EVALUATED",
            SYSTEM_ACTOR,
            &error.to_string(),
        ));
        Err(error)
    }

    /// Apply a reviewer verdict to an authorization in UNDER_REVIEW.
    ///
    /// Version conflicts surface directly so the reviewer can re-fetch and
    /// decide with current state.
    pub fn reviewer_decision(
        &self,
        id: &AuthorizationId,
        decision: ReviewerDecision,
        reason: &str,
        actor: &str,
    ) -> Result<Authorization, WorkflowError> {
        let target = decision.target_status();
        let current = self
            .store
            .get(id)
            .map_err(|error| WorkflowError::from_repository(*id, error))?;
        if current.status != AuthorizationStatus::UnderReview {
            let error = InvalidTransition {
                from: current.status,
                to: target,
            };
            self.audit.record(AuditEvent::failure(
                *id,
                "REVIEWER_DECISION",
                actor,
                &error.to_string(),
            ));
            return Err(error.into());
        }

        let stored = self.transition_once(id, target, reason, actor)?;
        self.audit
            .record(AuditEvent::success(*id, "REVIEWER_DECISION", actor));
        Ok(stored)
    }

    /// Cancel from any non-terminal status.
    pub fn cancel(
        &self,
        id: &AuthorizationId,
        reason: &str,
        actor: &str,
    ) -> Result<Authorization, WorkflowError> {
        let stored = self.transition_once(id, AuthorizationStatus::Cancelled, reason, actor)?;
        self.audit
            .record(AuditEvent::success(*id, "AUTHORIZATION_CANCELLED", actor));
        Ok(stored)
    }

    pub fn get(&self, id: &AuthorizationId) -> Result<Authorization, WorkflowError> {
        self.store
            .get(id)
            .map_err(|error| WorkflowError::from_repository(*id, error))
    }

    pub fn list_by_status(
        &self,
        status: AuthorizationStatus,
    ) -> Result<Vec<Authorization>, WorkflowError> {
        self.store.find_by_status(status).map_err(|error| {
            WorkflowError::DependencyUnavailable(error.to_string())
        })
    }

    pub fn pending(&self) -> Result<Vec<Authorization>, WorkflowError> {
        self.store
            .find_pending()
            .map_err(|error| WorkflowError::DependencyUnavailable(error.to_string()))
    }

    /// Single guarded transition with one optimistic write; conflicts are not
    /// retried here, callers re-fetch and retry with intent.
    fn transition_once(
        &self,
        id: &AuthorizationId,
        target: AuthorizationStatus,
        reason: &str,
        actor: &str,
    ) -> Result<Authorization, WorkflowError> {
        let mut entity = self
            .store
            .get(id)
            .map_err(|error| WorkflowError::from_repository(*id, error))?;
        let expected_version = entity.version;
        let old_status = entity.status;

        if let Err(error) = entity.transition(target, reason, actor) {
            self.audit.record(AuditEvent::failure(
                *id,
                "STATUS_TRANSITION",
                actor,
                &error.to_string(),
            ));
            return Err(error.into());
        }

        let stored = self
            .store
            .put(&entity, expected_version)
            .map_err(|error| self.audit_repository_failure(*id, "STATUS_TRANSITION", actor, error))?;

        self.dispatch_notice(&stored, old_status, reason);
        Ok(stored)
    }

    fn audit_repository_failure(
        &self,
        id: AuthorizationId,
        action: &str,
        actor: &str,
        error: RepositoryError,
    ) -> WorkflowError {
        let mapped = WorkflowError::from_repository(id, error);
        self.audit
            .record(AuditEvent::failure(id, action, actor, &mapped.to_string()));
        mapped
    }

    /// Notify stakeholders of a committed transition. The write is the source
    /// of truth, so a notification outage is audited and logged rather than
    /// failing the already-persisted operation.
    fn dispatch_notice(&self, entity: &Authorization, old_status: AuthorizationStatus, reason: &str) {
        let notice = StatusChangeNotice {
            authorization_id: entity.authorization_id,
            old_status,
            new_status: entity.status,
            reason: reason.to_string(),
        };
        if let Err(error) = self.notifier.notify(notice) {
            warn!(id = %entity.authorization_id, %error, "status notification failed");
            self.audit.record(AuditEvent::failure(
                entity.authorization_id,
                "STATUS_NOTIFICATION",
                SYSTEM_ACTOR,
                &error.to_string(),
            ));
        }
    }
}
