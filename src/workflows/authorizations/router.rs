use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::domain::{Authorization, AuthorizationId, AuthorizationStatus, StatusChange};
use super::intake::AuthorizationRequest;
use super::repository::{AuditLogger, AuthorizationRepository, Notifier};
use super::service::{AuthorizationWorkflow, ReviewerDecision, WorkflowError};

/// Sanitized representation of an authorization for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationView {
    pub authorization_id: AuthorizationId,
    pub status: &'static str,
    pub version: u64,
    pub drug_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f64>,
    pub decision_rationale: String,
    pub status_history: Vec<StatusChange>,
}

impl From<&Authorization> for AuthorizationView {
    fn from(entity: &Authorization) -> Self {
        let decision_rationale = match &entity.evaluation {
            Some(outcome) => outcome.summary(),
            None => "pending evaluation".to_string(),
        };
        Self {
            authorization_id: entity.authorization_id,
            status: entity.status.label(),
            version: entity.version,
            drug_name: entity.medication.drug_name.clone(),
            match_score: entity.evaluation.as_ref().map(|outcome| outcome.match_score),
            decision_rationale,
            status_history: entity.status_history.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitBody {
    #[serde(default = "default_actor")]
    pub(crate) actor: String,
}

impl Default for SubmitBody {
    fn default() -> Self {
        Self {
            actor: default_actor(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DecisionBody {
    pub(crate) decision: ReviewerDecision,
    pub(crate) reason: String,
    #[serde(default = "default_actor")]
    pub(crate) actor: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CancelBody {
    pub(crate) reason: String,
    #[serde(default = "default_actor")]
    pub(crate) actor: String,
}

fn default_actor() -> String {
    "provider".to_string()
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListParams {
    pub(crate) status: Option<String>,
}

/// Router builder exposing the authorization workflow over HTTP.
pub fn authorization_router<R, N, A>(
    workflow: Arc<AuthorizationWorkflow<R, N, A>>,
) -> Router
where
    R: AuthorizationRepository + 'static,
    N: Notifier + 'static,
    A: AuditLogger + 'static,
{
    Router::new()
        .route(
            "/api/v1/authorizations",
            post(create_handler::<R, N, A>).get(list_handler::<R, N, A>),
        )
        .route(
            "/api/v1/authorizations/:authorization_id",
            get(get_handler::<R, N, A>),
        )
        .route(
            "/api/v1/authorizations/:authorization_id/submit",
            post(submit_handler::<R, N, A>),
        )
        .route(
            "/api/v1/authorizations/:authorization_id/decision",
            post(decision_handler::<R, N, A>),
        )
        .route(
            "/api/v1/authorizations/:authorization_id/cancel",
            post(cancel_handler::<R, N, A>),
        )
        .with_state(workflow)
}

fn error_response(error: &WorkflowError) -> Response {
    let status = match error {
        WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
        WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
        WorkflowError::InvalidTransition(_) | WorkflowError::VersionConflict(_) => {
            StatusCode::CONFLICT
        }
        WorkflowError::CapacityExceeded => StatusCode::TOO_MANY_REQUESTS,
        WorkflowError::DependencyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}

fn parse_id(raw: &str) -> Result<AuthorizationId, Response> {
    Uuid::parse_str(raw).map(AuthorizationId).map_err(|_| {
        let payload = json!({ "error": format!("invalid authorization id '{raw}'") });
        (StatusCode::BAD_REQUEST, Json(payload)).into_response()
    })
}

pub(crate) async fn create_handler<R, N, A>(
    State(workflow): State<Arc<AuthorizationWorkflow<R, N, A>>>,
    Json(request): Json<AuthorizationRequest>,
) -> Response
where
    R: AuthorizationRepository + 'static,
    N: Notifier + 'static,
    A: AuditLogger + 'static,
{
    match workflow.create(request) {
        Ok(entity) => {
            (StatusCode::CREATED, Json(AuthorizationView::from(&entity))).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn submit_handler<R, N, A>(
    State(workflow): State<Arc<AuthorizationWorkflow<R, N, A>>>,
    Path(authorization_id): Path<String>,
    body: Option<Json<SubmitBody>>,
) -> Response
where
    R: AuthorizationRepository + 'static,
    N: Notifier + 'static,
    A: AuditLogger + 'static,
{
    let id = match parse_id(&authorization_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let Json(body) = body.unwrap_or_default();

    match workflow.submit(&id, &body.actor) {
        Ok(entity) => {
            (StatusCode::ACCEPTED, Json(AuthorizationView::from(&entity))).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn decision_handler<R, N, A>(
    State(workflow): State<Arc<AuthorizationWorkflow<R, N, A>>>,
    Path(authorization_id): Path<String>,
    Json(body): Json<DecisionBody>,
) -> Response
where
    R: AuthorizationRepository + 'static,
    N: Notifier + 'static,
    A: AuditLogger + 'static,
{
    let id = match parse_id(&authorization_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match workflow.reviewer_decision(&id, body.decision, &body.reason, &body.actor) {
        Ok(entity) => Json(AuthorizationView::from(&entity)).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn cancel_handler<R, N, A>(
    State(workflow): State<Arc<AuthorizationWorkflow<R, N, A>>>,
    Path(authorization_id): Path<String>,
    Json(body): Json<CancelBody>,
) -> Response
where
    R: AuthorizationRepository + 'static,
    N: Notifier + 'static,
    A: AuditLogger + 'static,
{
    let id = match parse_id(&authorization_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match workflow.cancel(&id, &body.reason, &body.actor) {
        Ok(entity) => Json(AuthorizationView::from(&entity)).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn get_handler<R, N, A>(
    State(workflow): State<Arc<AuthorizationWorkflow<R, N, A>>>,
    Path(authorization_id): Path<String>,
) -> Response
where
    R: AuthorizationRepository + 'static,
    N: Notifier + 'static,
    A: AuditLogger + 'static,
{
    let id = match parse_id(&authorization_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match workflow.get(&id) {
        Ok(entity) => Json(AuthorizationView::from(&entity)).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn list_handler<R, N, A>(
    State(workflow): State<Arc<AuthorizationWorkflow<R, N, A>>>,
    Query(params): Query<ListParams>,
) -> Response
where
    R: AuthorizationRepository + 'static,
    N: Notifier + 'static,
    A: AuditLogger + 'static,
{
    let result = match params.status.as_deref() {
        None => workflow.pending(),
        Some(raw) => match AuthorizationStatus::parse(raw) {
            Some(status) => workflow.list_by_status(status),
            None => {
                let payload = json!({ "error": format!("unknown status '{raw}'") });
                return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
            }
        },
    };

    match result {
        Ok(entities) => {
            let views: Vec<AuthorizationView> =
                entities.iter().map(AuthorizationView::from).collect();
            Json(views).into_response()
        }
        Err(error) => error_response(&error),
    }
}
