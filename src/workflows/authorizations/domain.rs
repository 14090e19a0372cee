use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier wrapper for prior authorization requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorizationId(pub Uuid);

impl AuthorizationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AuthorizationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AuthorizationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Patient demographics captured at intake; immutable once the request leaves DRAFT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub member_id: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub phone: String,
}

/// Coverage snapshot used when the payer adjudicates the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsuranceInfo {
    pub payer_id: String,
    pub plan_id: String,
    pub group_number: String,
}

/// Prescriber identity; the NPI is format-checked at intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub npi: String,
    pub name: String,
    pub specialty: String,
    pub phone: String,
}

/// Requested drug, dosing, and supply window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationInfo {
    pub drug_name: String,
    pub drug_class: String,
    pub strength: String,
    pub quantity: u32,
    pub days_supply: u32,
}

/// Numeric lab observation attached to the clinical payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabResult {
    pub loinc_code: String,
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub collected_on: NaiveDate,
}

/// Outcome of a prior medication trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentOutcome {
    Failed,
    Intolerant,
    Completed,
    Ongoing,
}

impl TreatmentOutcome {
    /// Whether the record documents a therapeutic failure rather than mere use.
    pub const fn is_documented_failure(self) -> bool {
        matches!(self, TreatmentOutcome::Failed | TreatmentOutcome::Intolerant)
    }
}

/// One entry in the patient's treatment history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentRecord {
    pub drug_name: String,
    pub duration_days: u32,
    pub completed_on: NaiveDate,
    pub outcome: TreatmentOutcome,
}

/// Reference to supporting documentation held by the document service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReference {
    pub document_type: String,
    pub name: String,
    pub storage_key: String,
    pub effective_on: NaiveDate,
}

/// Clinical payload evaluated against the criteria rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalInfo {
    pub diagnosis_codes: Vec<String>,
    pub lab_results: Vec<LabResult>,
    pub treatment_history: Vec<TreatmentRecord>,
    pub documents: Vec<DocumentReference>,
}

/// Append-only record of one committed status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: AuthorizationStatus,
    pub reason: String,
    pub changed_at: DateTime<Utc>,
}

/// Lifecycle states for a prior authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorizationStatus {
    Draft,
    Submitted,
    PendingDocuments,
    UnderReview,
    Approved,
    Denied,
    Cancelled,
}

impl AuthorizationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AuthorizationStatus::Draft => "DRAFT",
            AuthorizationStatus::Submitted => "SUBMITTED",
            AuthorizationStatus::PendingDocuments => "PENDING_DOCUMENTS",
            AuthorizationStatus::UnderReview => "UNDER_REVIEW",
            AuthorizationStatus::Approved => "APPROVED",
            AuthorizationStatus::Denied => "DENIED",
            AuthorizationStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Some(AuthorizationStatus::Draft),
            "SUBMITTED" => Some(AuthorizationStatus::Submitted),
            "PENDING_DOCUMENTS" => Some(AuthorizationStatus::PendingDocuments),
            "UNDER_REVIEW" => Some(AuthorizationStatus::UnderReview),
            "APPROVED" => Some(AuthorizationStatus::Approved),
            "DENIED" => Some(AuthorizationStatus::Denied),
            "CANCELLED" => Some(AuthorizationStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal statuses admit no further transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            AuthorizationStatus::Approved
                | AuthorizationStatus::Denied
                | AuthorizationStatus::Cancelled
        )
    }

    /// Directed transition graph for the authorization lifecycle.
    pub const fn can_transition_to(self, target: AuthorizationStatus) -> bool {
        use AuthorizationStatus::*;
        match self {
            Draft => matches!(target, Submitted | Cancelled),
            Submitted => matches!(target, PendingDocuments | UnderReview | Cancelled),
            PendingDocuments => matches!(target, UnderReview | Cancelled),
            UnderReview => matches!(target, Approved | Denied | PendingDocuments | Cancelled),
            Approved | Denied | Cancelled => false,
        }
    }

    /// Statuses considered part of the active review queue.
    pub const fn is_pending(self) -> bool {
        matches!(
            self,
            AuthorizationStatus::Submitted
                | AuthorizationStatus::PendingDocuments
                | AuthorizationStatus::UnderReview
        )
    }
}

/// Error raised when a requested status change is not an edge of the lifecycle graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid status transition from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: AuthorizationStatus,
    pub to: AuthorizationStatus,
}

/// Aggregate root for one prior authorization request.
///
/// The aggregate is a pure domain object: `transition` only mutates the
/// status, history, and timestamps. Persistence, notification, and audit side
/// effects belong to the workflow service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authorization {
    pub authorization_id: AuthorizationId,
    pub version: u64,
    pub status: AuthorizationStatus,
    pub patient: PatientInfo,
    pub insurance: InsuranceInfo,
    pub provider: ProviderInfo,
    pub medication: MedicationInfo,
    pub clinical: ClinicalInfo,
    pub status_history: Vec<StatusChange>,
    pub evaluation: Option<crate::workflows::authorizations::evaluation::EvaluationOutcome>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub last_modified_by: String,
}

impl Authorization {
    /// Build a new aggregate in DRAFT with the creation recorded in history.
    pub fn new(
        patient: PatientInfo,
        insurance: InsuranceInfo,
        provider: ProviderInfo,
        medication: MedicationInfo,
        clinical: ClinicalInfo,
        created_by: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            authorization_id: AuthorizationId::new(),
            version: 0,
            status: AuthorizationStatus::Draft,
            patient,
            insurance,
            provider,
            medication,
            clinical,
            status_history: vec![StatusChange {
                status: AuthorizationStatus::Draft,
                reason: "Initial creation".to_string(),
                changed_at: now,
            }],
            evaluation: None,
            created_at: now,
            updated_at: now,
            created_by: created_by.to_string(),
            last_modified_by: created_by.to_string(),
        }
    }

    /// Apply a guarded status transition, appending exactly one history record.
    pub fn transition(
        &mut self,
        target: AuthorizationStatus,
        reason: &str,
        actor: &str,
    ) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(target) {
            return Err(InvalidTransition {
                from: self.status,
                to: target,
            });
        }

        let now = Utc::now();
        self.status = target;
        self.updated_at = now;
        self.last_modified_by = actor.to_string();
        self.status_history.push(StatusChange {
            status: target,
            reason: reason.to_string(),
            changed_at: now,
        });
        Ok(())
    }

    /// Timestamp of the most recent committed status change.
    pub fn last_status_change(&self) -> Option<&StatusChange> {
        self.status_history.last()
    }
}
