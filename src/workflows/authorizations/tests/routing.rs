use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use super::common::{self, read_json_body};
use crate::workflows::authorizations::domain::AuthorizationStatus;
use crate::workflows::authorizations::router::{
    cancel_handler, create_handler, decision_handler, get_handler, list_handler, submit_handler,
    CancelBody, DecisionBody, ListParams, SubmitBody,
};
use crate::workflows::authorizations::service::ReviewerDecision;

#[tokio::test]
async fn create_returns_created_with_a_view() {
    let (workflow, _, _, _) = common::build_workflow();

    let response = create_handler(State(workflow), Json(common::request())).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json_body(response).await;
    assert_eq!(body["status"], "DRAFT");
    assert_eq!(body["version"], 1);
    assert_eq!(body["drug_name"], "Semaglutide");
    assert!(body.get("match_score").is_none());
    assert_eq!(body["status_history"].as_array().map(Vec::len), Some(1));
    // Patient demographics never leave through the API view.
    assert!(body.get("patient").is_none());
}

#[tokio::test]
async fn invalid_payload_is_a_bad_request() {
    let (workflow, _, _, _) = common::build_workflow();

    let mut request = common::request();
    request.clinical.diagnosis_codes.clear();

    let response = create_handler(State(workflow), Json(request)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("diagnosis"));
}

#[tokio::test]
async fn submit_accepts_and_defaults_the_actor() {
    let (workflow, _, _, _) = common::build_workflow();
    let created = workflow.create(common::request()).expect("create");

    let response = submit_handler(
        State(workflow.clone()),
        Path(created.authorization_id.to_string()),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let stored = workflow.get(&created.authorization_id).expect("get");
    assert_eq!(stored.status, AuthorizationStatus::Submitted);
    assert_eq!(stored.last_modified_by, "provider");
}

#[tokio::test]
async fn malformed_id_is_a_bad_request() {
    let (workflow, _, _, _) = common::build_workflow();

    let response = get_handler(State(workflow), Path("not-a-uuid".to_string())).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_id_is_not_found() {
    let (workflow, _, _, _) = common::build_workflow();
    let id = crate::workflows::authorizations::AuthorizationId::new();

    let response = get_handler(State(workflow), Path(id.to_string())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn premature_decision_is_a_conflict() {
    let (workflow, _, _, _) = common::build_workflow();
    let created = workflow.create(common::request()).expect("create");

    let response = decision_handler(
        State(workflow),
        Path(created.authorization_id.to_string()),
        Json(DecisionBody {
            decision: ReviewerDecision::Approve,
            reason: "looks fine".to_string(),
            actor: "reviewer.chen".to_string(),
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn cancel_of_a_terminal_request_is_a_conflict() {
    let (workflow, _, _, _) = common::build_workflow();
    let created = workflow.create(common::request()).expect("create");
    workflow
        .submit(&created.authorization_id, "dr.singh")
        .expect("submit");
    workflow
        .evaluate_and_route(&created.authorization_id)
        .await
        .expect("evaluate");

    let response = cancel_handler(
        State(workflow),
        Path(created.authorization_id.to_string()),
        Json(CancelBody {
            reason: "changed mind".to_string(),
            actor: "dr.singh".to_string(),
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn saturated_queue_maps_to_too_many_requests() {
    let repository = std::sync::Arc::new(
        crate::workflows::authorizations::InMemoryAuthorizationRepository::new(),
    );
    let notifier = std::sync::Arc::new(super::common::MemoryNotifier::default());
    let audit = std::sync::Arc::new(super::common::MemoryAudit::default());
    let workflow = std::sync::Arc::new(
        crate::workflows::authorizations::AuthorizationWorkflow::new(
            repository,
            notifier,
            audit,
            common::library(),
            std::time::Duration::from_secs(30),
            crate::workflows::authorizations::WorkflowSettings {
                evaluation_queue_depth: 1,
                ..common::settings()
            },
        ),
    );

    let first = workflow.create(common::request()).expect("create first");
    let second = workflow.create(common::request()).expect("create second");
    workflow
        .submit(&first.authorization_id, "dr.singh")
        .expect("fill the queue");

    let response = submit_handler(
        State(workflow),
        Path(second.authorization_id.to_string()),
        Some(Json(SubmitBody::default())),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn listing_filters_by_status_and_defaults_to_pending() {
    let (workflow, _, _, _) = common::build_workflow();
    let created = workflow.create(common::request()).expect("create");
    workflow
        .submit(&created.authorization_id, "dr.singh")
        .expect("submit");

    let response = list_handler(
        State(workflow.clone()),
        Query(ListParams {
            status: Some("SUBMITTED".to_string()),
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let response = list_handler(State(workflow.clone()), Query(ListParams { status: None })).await;
    let body = read_json_body(response).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let response = list_handler(
        State(workflow),
        Query(ListParams {
            status: Some("REJECTED".to_string()),
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
