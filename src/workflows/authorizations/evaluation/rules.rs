use chrono::NaiveDate;

use super::super::criteria::{CriteriaGroup, CriteriaRuleSet};
use super::super::domain::ClinicalInfo;
use super::GroupOutcome;

/// Evaluate every criteria group the rule set defines.
pub(super) fn evaluate_groups(
    clinical: &ClinicalInfo,
    rule_set: &CriteriaRuleSet,
    today: NaiveDate,
) -> Vec<GroupOutcome> {
    let mut outcomes = Vec::with_capacity(4);

    if !rule_set.diagnosis.is_empty() {
        outcomes.push(evaluate_diagnosis(clinical, rule_set));
    }
    if !rule_set.labs.is_empty() {
        outcomes.push(evaluate_labs(clinical, rule_set, today));
    }
    if !rule_set.treatments.is_empty() {
        outcomes.push(evaluate_treatments(clinical, rule_set, today));
    }
    if !rule_set.documentation.required_documents.is_empty() {
        outcomes.push(evaluate_documentation(clinical, rule_set, today));
    }

    outcomes
}

fn code_matches(code: &str, candidate: &str) -> bool {
    code.eq_ignore_ascii_case(candidate.trim())
}

fn has_code(clinical: &ClinicalInfo, code: &str) -> bool {
    clinical
        .diagnosis_codes
        .iter()
        .any(|candidate| code_matches(code, candidate))
}

fn evaluate_diagnosis(clinical: &ClinicalInfo, rule_set: &CriteriaRuleSet) -> GroupOutcome {
    let criteria = &rule_set.diagnosis;
    let mut unmet = Vec::new();
    let mut total = 0usize;
    let mut met = 0usize;

    if !criteria.required_codes.is_empty() {
        total += 1;
        if criteria.required_codes.iter().any(|code| has_code(clinical, code)) {
            met += 1;
        } else {
            unmet.push(format!(
                "no qualifying diagnosis among [{}]",
                criteria.required_codes.join(", ")
            ));
        }
    }

    if !criteria.excluded_codes.is_empty() {
        total += 1;
        let present: Vec<&String> = criteria
            .excluded_codes
            .iter()
            .filter(|code| has_code(clinical, code))
            .collect();
        if present.is_empty() {
            met += 1;
        } else {
            for code in present {
                unmet.push(format!("excluded diagnosis {code} present"));
            }
        }
    }

    if !criteria.code_combinations.is_empty() {
        total += 1;
        let combination_met = criteria
            .code_combinations
            .iter()
            .any(|combination| combination.iter().all(|code| has_code(clinical, code)));
        if combination_met {
            met += 1;
        } else {
            unmet.push("no required diagnosis combination fully present".to_string());
        }
    }

    GroupOutcome {
        group: CriteriaGroup::Diagnosis,
        satisfied: unmet.is_empty(),
        criteria_total: total,
        criteria_met: met,
        unmet,
    }
}

fn within_window(event: NaiveDate, today: NaiveDate, window_days: u32) -> bool {
    let elapsed = today.signed_duration_since(event).num_days();
    elapsed >= 0 && elapsed <= window_days as i64
}

fn evaluate_labs(
    clinical: &ClinicalInfo,
    rule_set: &CriteriaRuleSet,
    today: NaiveDate,
) -> GroupOutcome {
    let mut unmet = Vec::new();
    let mut met = 0usize;

    for criterion in &rule_set.labs {
        let result = clinical
            .lab_results
            .iter()
            .filter(|result| result.loinc_code == criterion.loinc_code)
            .filter(|result| within_window(result.collected_on, today, criterion.timeframe_days))
            // Most recent qualifying observation decides the criterion.
            .max_by_key(|result| result.collected_on);

        match result {
            None => unmet.push(format!(
                "{} ({}) missing or older than {} days",
                criterion.name, criterion.loinc_code, criterion.timeframe_days
            )),
            Some(result) => {
                let below = criterion
                    .min_value
                    .map(|min| result.value < min)
                    .unwrap_or(false);
                let above = criterion
                    .max_value
                    .map(|max| result.value > max)
                    .unwrap_or(false);
                if below || above {
                    unmet.push(format!(
                        "{} value {} outside required range [{}, {}]",
                        criterion.name,
                        result.value,
                        criterion
                            .min_value
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "-inf".to_string()),
                        criterion
                            .max_value
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "+inf".to_string()),
                    ));
                } else {
                    met += 1;
                }
            }
        }
    }

    GroupOutcome {
        group: CriteriaGroup::Labs,
        satisfied: unmet.is_empty(),
        criteria_total: rule_set.labs.len(),
        criteria_met: met,
        unmet,
    }
}

fn evaluate_treatments(
    clinical: &ClinicalInfo,
    rule_set: &CriteriaRuleSet,
    today: NaiveDate,
) -> GroupOutcome {
    let mut unmet = Vec::new();
    let mut met = 0usize;

    for criterion in &rule_set.treatments {
        let qualifying = clinical
            .treatment_history
            .iter()
            .filter(|record| record.drug_name.eq_ignore_ascii_case(criterion.drug_name.trim()))
            .filter(|record| within_window(record.completed_on, today, criterion.timeframe_days))
            .find(|record| {
                record.duration_days >= criterion.min_duration_days
                    && (!criterion.failure_required || record.outcome.is_documented_failure())
            });

        match qualifying {
            Some(_) => met += 1,
            None => {
                let requirement = if criterion.failure_required {
                    "documented failure of"
                } else {
                    "trial of"
                };
                unmet.push(format!(
                    "no {} {} for at least {} days within {} days",
                    requirement,
                    criterion.drug_name,
                    criterion.min_duration_days,
                    criterion.timeframe_days
                ));
            }
        }
    }

    GroupOutcome {
        group: CriteriaGroup::TreatmentHistory,
        satisfied: unmet.is_empty(),
        criteria_total: rule_set.treatments.len(),
        criteria_met: met,
        unmet,
    }
}

fn evaluate_documentation(
    clinical: &ClinicalInfo,
    rule_set: &CriteriaRuleSet,
    today: NaiveDate,
) -> GroupOutcome {
    let criteria = &rule_set.documentation;
    let mut unmet = Vec::new();
    let mut met = 0usize;

    for required in &criteria.required_documents {
        let present = clinical.documents.iter().any(|document| {
            document.document_type.eq_ignore_ascii_case(required.trim())
                && within_window(document.effective_on, today, criteria.timeframe_days)
        });
        if present {
            met += 1;
        } else {
            unmet.push(format!(
                "document '{}' missing or older than {} days",
                required, criteria.timeframe_days
            ));
        }
    }

    GroupOutcome {
        group: CriteriaGroup::Documentation,
        satisfied: unmet.is_empty(),
        criteria_total: criteria.required_documents.len(),
        criteria_met: met,
        unmet,
    }
}
