//! Prior authorization lifecycle: intake, criteria evaluation, status
//! routing, and the caching store behind the workflow orchestrator.

pub mod criteria;
pub mod domain;
pub mod evaluation;
pub mod intake;
pub mod repository;
pub mod router;
pub mod scheduler;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use criteria::{
    ApprovalPolicy, CriteriaError, CriteriaGroup, CriteriaLibrary, CriteriaRuleSet,
    DiagnosisCriteria, DocumentationCriteria, LabCriterion, TreatmentCriterion,
};
pub use domain::{
    Authorization, AuthorizationId, AuthorizationStatus, ClinicalInfo, DocumentReference,
    InsuranceInfo, InvalidTransition, LabResult, MedicationInfo, PatientInfo, ProviderInfo,
    StatusChange, TreatmentOutcome, TreatmentRecord,
};
pub use evaluation::{CriteriaEvaluator, EvaluationOutcome, GroupOutcome, RoutingDecision};
pub use intake::{AuthorizationRequest, IntakeValidator, ValidationError};
pub use repository::{
    AuditEvent, AuditLogger, AuditOutcome, AuthorizationRepository,
    InMemoryAuthorizationRepository, Notifier, NotifyError, RepositoryError, StatusChangeNotice,
};
pub use router::{authorization_router, AuthorizationView};
pub use scheduler::start_evaluation_workers;
pub use service::{AuthorizationWorkflow, ReviewerDecision, WorkflowError, WorkflowSettings};
pub use store::AuthorizationStore;
