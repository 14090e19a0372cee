use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use serde_json::Value;

use crate::workflows::authorizations::domain::{
    Authorization, AuthorizationId, ClinicalInfo, DocumentReference, InsuranceInfo, LabResult,
    MedicationInfo, PatientInfo, ProviderInfo, TreatmentOutcome, TreatmentRecord,
};
use crate::workflows::authorizations::intake::AuthorizationRequest;
use crate::workflows::authorizations::repository::{
    AuditEvent, AuditLogger, AuthorizationRepository, InMemoryAuthorizationRepository, Notifier,
    NotifyError, RepositoryError, StatusChangeNotice,
};
use crate::workflows::authorizations::{
    AuthorizationWorkflow, CriteriaLibrary, WorkflowSettings,
};

pub(super) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub(super) fn days_ago(days: i64) -> NaiveDate {
    today() - ChronoDuration::days(days)
}

pub(super) fn patient() -> PatientInfo {
    PatientInfo {
        member_id: "M-100200".to_string(),
        first_name: "Jordan".to_string(),
        last_name: "Reyes".to_string(),
        birth_date: NaiveDate::from_ymd_opt(1968, 4, 12).expect("valid date"),
        phone: "+15155550134".to_string(),
    }
}

pub(super) fn insurance() -> InsuranceInfo {
    InsuranceInfo {
        payer_id: "PAYER-77".to_string(),
        plan_id: "GOLD-PPO".to_string(),
        group_number: "GRP-4410".to_string(),
    }
}

pub(super) fn provider() -> ProviderInfo {
    ProviderInfo {
        npi: "1234567890".to_string(),
        name: "Dr. Amara Singh".to_string(),
        specialty: "Endocrinology".to_string(),
        phone: "+15155550988".to_string(),
    }
}

pub(super) fn semaglutide() -> MedicationInfo {
    MedicationInfo {
        drug_name: "Semaglutide".to_string(),
        drug_class: "GLP-1 Agonist".to_string(),
        strength: "1 mg/0.74 mL".to_string(),
        quantity: 4,
        days_supply: 28,
    }
}

pub(super) fn adalimumab() -> MedicationInfo {
    MedicationInfo {
        drug_name: "Adalimumab".to_string(),
        drug_class: "TNF Inhibitor".to_string(),
        strength: "40 mg/0.8 mL".to_string(),
        quantity: 2,
        days_supply: 28,
    }
}

/// Clinical payload satisfying every group of the built-in semaglutide rule.
pub(super) fn diabetes_clinical() -> ClinicalInfo {
    ClinicalInfo {
        diagnosis_codes: vec!["E11.9".to_string()],
        lab_results: vec![LabResult {
            loinc_code: "4548-4".to_string(),
            name: "Hemoglobin A1c".to_string(),
            value: 8.2,
            unit: "%".to_string(),
            collected_on: days_ago(30),
        }],
        treatment_history: vec![TreatmentRecord {
            drug_name: "Metformin".to_string(),
            duration_days: 120,
            completed_on: days_ago(60),
            outcome: TreatmentOutcome::Failed,
        }],
        documents: vec![DocumentReference {
            document_type: "chart_notes".to_string(),
            name: "Progress note".to_string(),
            storage_key: "s3://prior-auth/docs/chart.pdf".to_string(),
            effective_on: days_ago(10),
        }],
    }
}

/// Payload for the adalimumab rule with the TB screening document missing.
pub(super) fn ra_clinical_missing_docs() -> ClinicalInfo {
    ClinicalInfo {
        diagnosis_codes: vec!["M06.9".to_string()],
        lab_results: vec![LabResult {
            loinc_code: "1988-5".to_string(),
            name: "C-reactive protein".to_string(),
            value: 24.0,
            unit: "mg/L".to_string(),
            collected_on: days_ago(14),
        }],
        treatment_history: vec![TreatmentRecord {
            drug_name: "Methotrexate".to_string(),
            duration_days: 120,
            completed_on: days_ago(90),
            outcome: TreatmentOutcome::Failed,
        }],
        documents: Vec::new(),
    }
}

pub(super) fn request() -> AuthorizationRequest {
    AuthorizationRequest {
        patient: patient(),
        insurance: insurance(),
        provider: provider(),
        medication: semaglutide(),
        clinical: diabetes_clinical(),
        requested_by: "dr.singh".to_string(),
    }
}

pub(super) fn ra_request() -> AuthorizationRequest {
    AuthorizationRequest {
        patient: patient(),
        insurance: insurance(),
        provider: provider(),
        medication: adalimumab(),
        clinical: ra_clinical_missing_docs(),
        requested_by: "dr.singh".to_string(),
    }
}

pub(super) fn library() -> Arc<CriteriaLibrary> {
    Arc::new(CriteriaLibrary::standard())
}

pub(super) fn settings() -> WorkflowSettings {
    WorkflowSettings {
        max_write_retries: 3,
        retry_backoff: Duration::from_millis(5),
        evaluation_queue_depth: 16,
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifier {
    notices: Arc<Mutex<Vec<StatusChangeNotice>>>,
}

impl MemoryNotifier {
    pub(super) fn notices(&self) -> Vec<StatusChangeNotice> {
        self.notices.lock().expect("notifier mutex poisoned").clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notice: StatusChangeNotice) -> Result<(), NotifyError> {
        self.notices
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryAudit {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemoryAudit {
    pub(super) fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("audit mutex poisoned").clone()
    }

    pub(super) fn actions(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .map(|event| event.action)
            .collect()
    }
}

impl AuditLogger for MemoryAudit {
    fn record(&self, event: AuditEvent) {
        self.events.lock().expect("audit mutex poisoned").push(event);
    }
}

/// Repository whose writes always lose the optimistic race.
pub(super) struct ConflictRepository {
    pub(super) entity: Mutex<Option<Authorization>>,
}

impl ConflictRepository {
    pub(super) fn holding(entity: Authorization) -> Self {
        Self {
            entity: Mutex::new(Some(entity)),
        }
    }
}

impl AuthorizationRepository for ConflictRepository {
    fn load(&self, _id: &AuthorizationId) -> Result<Authorization, RepositoryError> {
        self.entity
            .lock()
            .expect("conflict repository mutex poisoned")
            .clone()
            .ok_or(RepositoryError::NotFound)
    }

    fn save(&self, _entity: &Authorization, expected_version: u64) -> Result<u64, RepositoryError> {
        Err(RepositoryError::VersionConflict {
            expected: expected_version,
            stored: expected_version + 1,
        })
    }

    fn query_by_status(
        &self,
        _status: crate::workflows::authorizations::AuthorizationStatus,
    ) -> Result<Vec<Authorization>, RepositoryError> {
        Ok(Vec::new())
    }

    fn find_pending(&self) -> Result<Vec<Authorization>, RepositoryError> {
        Ok(Vec::new())
    }
}

/// Repository simulating a database outage.
pub(super) struct UnavailableRepository;

impl AuthorizationRepository for UnavailableRepository {
    fn load(&self, _id: &AuthorizationId) -> Result<Authorization, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn save(&self, _entity: &Authorization, _expected_version: u64) -> Result<u64, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn query_by_status(
        &self,
        _status: crate::workflows::authorizations::AuthorizationStatus,
    ) -> Result<Vec<Authorization>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_pending(&self) -> Result<Vec<Authorization>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) type MemoryWorkflow =
    AuthorizationWorkflow<InMemoryAuthorizationRepository, MemoryNotifier, MemoryAudit>;

pub(super) fn build_workflow() -> (
    Arc<MemoryWorkflow>,
    Arc<InMemoryAuthorizationRepository>,
    Arc<MemoryNotifier>,
    Arc<MemoryAudit>,
) {
    let repository = Arc::new(InMemoryAuthorizationRepository::new());
    let notifier = Arc::new(MemoryNotifier::default());
    let audit = Arc::new(MemoryAudit::default());
    let workflow = Arc::new(AuthorizationWorkflow::new(
        repository.clone(),
        notifier.clone(),
        audit.clone(),
        library(),
        Duration::from_secs(30),
        settings(),
    ));
    (workflow, repository, notifier, audit)
}

pub(super) async fn read_json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
