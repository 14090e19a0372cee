use super::common::{self, days_ago, today};
use crate::workflows::authorizations::criteria::{CriteriaGroup, CriteriaLibrary};
use crate::workflows::authorizations::domain::{LabResult, TreatmentOutcome};
use crate::workflows::authorizations::evaluation::{CriteriaEvaluator, RoutingDecision};

fn semaglutide_rule() -> std::sync::Arc<crate::workflows::authorizations::CriteriaRuleSet> {
    CriteriaLibrary::standard()
        .lookup("Semaglutide", "GLP-1 Agonist")
        .expect("built-in semaglutide rule")
}

fn adalimumab_rule() -> std::sync::Arc<crate::workflows::authorizations::CriteriaRuleSet> {
    CriteriaLibrary::standard()
        .lookup("Adalimumab", "TNF Inhibitor")
        .expect("built-in adalimumab rule")
}

#[test]
fn complete_diabetes_payload_is_auto_approval_eligible() {
    let outcome = CriteriaEvaluator::evaluate(
        &common::semaglutide(),
        &common::diabetes_clinical(),
        &semaglutide_rule(),
        today(),
    );

    assert_eq!(outcome.rule_id, "glp1-diabetes");
    assert_eq!(outcome.groups.len(), 3);
    assert!((outcome.match_score - 1.0).abs() < f64::EPSILON);
    assert!((outcome.confidence - 1.0).abs() < f64::EPSILON);
    assert!(outcome.auto_approval_eligible);
    assert_eq!(outcome.routing(), RoutingDecision::AutoApprove);
}

#[test]
fn evaluation_is_deterministic() {
    let medication = common::semaglutide();
    let clinical = common::diabetes_clinical();
    let rule = semaglutide_rule();
    let date = today();

    let first = CriteriaEvaluator::evaluate(&medication, &clinical, &rule, date);
    let second = CriteriaEvaluator::evaluate(&medication, &clinical, &rule, date);
    assert_eq!(first, second);
}

#[test]
fn unmet_lab_drops_one_group_and_routes_to_manual_review() {
    let mut clinical = common::diabetes_clinical();
    clinical.lab_results[0].value = 6.1;

    let outcome = CriteriaEvaluator::evaluate(
        &common::semaglutide(),
        &clinical,
        &semaglutide_rule(),
        today(),
    );

    assert!(!outcome.group_satisfied(CriteriaGroup::Labs));
    assert!((outcome.match_score - 2.0 / 3.0).abs() < 1e-9);
    assert!(!outcome.auto_approval_eligible);
    // The rule defines no documentation group, so a shortfall means review.
    assert_eq!(outcome.routing(), RoutingDecision::ManualReview);

    let labs = outcome.group(CriteriaGroup::Labs).expect("labs outcome");
    assert_eq!(labs.criteria_total, 1);
    assert_eq!(labs.criteria_met, 0);
    assert_eq!(labs.unmet.len(), 1);
}

#[test]
fn stale_lab_is_treated_as_missing() {
    let mut clinical = common::diabetes_clinical();
    clinical.lab_results[0].collected_on = days_ago(120);

    let outcome = CriteriaEvaluator::evaluate(
        &common::semaglutide(),
        &clinical,
        &semaglutide_rule(),
        today(),
    );

    assert!(!outcome.group_satisfied(CriteriaGroup::Labs));
    assert!(outcome
        .group(CriteriaGroup::Labs)
        .expect("labs outcome")
        .unmet[0]
        .contains("missing or older than 90 days"));
}

#[test]
fn most_recent_qualifying_lab_decides_the_criterion() {
    let mut clinical = common::diabetes_clinical();
    // Older passing draw plus a recent failing one: the recent value governs.
    clinical.lab_results.push(LabResult {
        loinc_code: "4548-4".to_string(),
        name: "Hemoglobin A1c".to_string(),
        value: 6.4,
        unit: "%".to_string(),
        collected_on: days_ago(5),
    });

    let outcome = CriteriaEvaluator::evaluate(
        &common::semaglutide(),
        &clinical,
        &semaglutide_rule(),
        today(),
    );

    assert!(!outcome.group_satisfied(CriteriaGroup::Labs));
}

#[test]
fn excluded_diagnosis_fails_the_diagnosis_group() {
    let mut clinical = common::diabetes_clinical();
    clinical.diagnosis_codes.push("C25.9".to_string());

    let outcome = CriteriaEvaluator::evaluate(
        &common::semaglutide(),
        &clinical,
        &semaglutide_rule(),
        today(),
    );

    let diagnosis = outcome
        .group(CriteriaGroup::Diagnosis)
        .expect("diagnosis outcome");
    assert!(!diagnosis.satisfied);
    // The required-codes criterion still counts as met.
    assert_eq!(diagnosis.criteria_total, 2);
    assert_eq!(diagnosis.criteria_met, 1);
    assert!(diagnosis.unmet[0].contains("C25.9"));
    assert!(!outcome.auto_approval_eligible);
}

#[test]
fn treatment_without_documented_failure_does_not_qualify() {
    let mut clinical = common::diabetes_clinical();
    clinical.treatment_history[0].outcome = TreatmentOutcome::Completed;

    let outcome = CriteriaEvaluator::evaluate(
        &common::semaglutide(),
        &clinical,
        &semaglutide_rule(),
        today(),
    );

    assert!(!outcome.group_satisfied(CriteriaGroup::TreatmentHistory));
    assert!(outcome
        .group(CriteriaGroup::TreatmentHistory)
        .expect("treatment outcome")
        .unmet[0]
        .contains("documented failure of Metformin"));
}

#[test]
fn treatment_too_short_does_not_qualify() {
    let mut clinical = common::diabetes_clinical();
    clinical.treatment_history[0].duration_days = 30;

    let outcome = CriteriaEvaluator::evaluate(
        &common::semaglutide(),
        &clinical,
        &semaglutide_rule(),
        today(),
    );

    assert!(!outcome.group_satisfied(CriteriaGroup::TreatmentHistory));
}

#[test]
fn missing_required_document_routes_to_request_documents() {
    let outcome = CriteriaEvaluator::evaluate(
        &common::adalimumab(),
        &common::ra_clinical_missing_docs(),
        &adalimumab_rule(),
        today(),
    );

    assert!(!outcome.group_satisfied(CriteriaGroup::Documentation));
    assert!((outcome.match_score - 0.75).abs() < 1e-9);
    assert!(!outcome.auto_approval_eligible);
    assert_eq!(outcome.routing(), RoutingDecision::RequestDocuments);
    assert_eq!(
        outcome.routing().target_status(),
        crate::workflows::authorizations::AuthorizationStatus::PendingDocuments
    );
}

#[test]
fn perfect_score_without_auto_approval_enabled_goes_to_review() {
    let mut clinical = common::ra_clinical_missing_docs();
    clinical.documents.push(crate::workflows::authorizations::DocumentReference {
        document_type: "tb_screening".to_string(),
        name: "QuantiFERON result".to_string(),
        storage_key: "s3://prior-auth/docs/tb.pdf".to_string(),
        effective_on: days_ago(40),
    });

    let outcome = CriteriaEvaluator::evaluate(
        &common::adalimumab(),
        &clinical,
        &adalimumab_rule(),
        today(),
    );

    assert!((outcome.match_score - 1.0).abs() < f64::EPSILON);
    // The biologic rule never auto-approves; a clean payload still gets a reviewer.
    assert!(!outcome.auto_approval_eligible);
    assert_eq!(outcome.routing(), RoutingDecision::ManualReview);
}

#[test]
fn library_falls_back_from_drug_name_to_class() {
    let library = CriteriaLibrary::standard();

    let by_name = library.lookup("semaglutide", "unknown class");
    assert_eq!(
        by_name.expect("name lookup").rule_id,
        "glp1-diabetes"
    );

    let by_class = library.lookup("Tirzepatide", "glp-1 agonist");
    assert_eq!(
        by_class.expect("class fallback").rule_id,
        "glp1-diabetes"
    );

    assert!(library.lookup("Lisinopril", "ACE Inhibitor").is_none());
}

#[test]
fn rule_set_with_invalid_threshold_is_rejected() {
    let mut rule = (*semaglutide_rule()).clone();
    rule.policy.min_criteria_match_score = 1.5;

    let error = CriteriaLibrary::from_rule_sets(vec![rule])
        .expect_err("threshold outside [0,1]");
    assert!(error.to_string().contains("min_criteria_match_score"));
}

#[test]
fn rule_set_without_drug_or_class_is_rejected() {
    let mut rule = (*semaglutide_rule()).clone();
    rule.drug_name = None;
    rule.drug_class = None;

    let error = CriteriaLibrary::from_rule_sets(vec![rule])
        .expect_err("rule set has no lookup key");
    assert!(error.to_string().contains("neither a drug nor a drug class"));
}
