mod policy;
mod rules;

pub use policy::RoutingDecision;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::criteria::{CriteriaGroup, CriteriaRuleSet};
use super::domain::{ClinicalInfo, MedicationInfo};

/// Stateless evaluator scoring a clinical payload against a criteria rule set.
///
/// Evaluation is a pure function of the payload, the rule set, and the
/// evaluation date; no engine state survives a call.
pub struct CriteriaEvaluator;

impl CriteriaEvaluator {
    pub fn evaluate(
        medication: &MedicationInfo,
        clinical: &ClinicalInfo,
        rule_set: &CriteriaRuleSet,
        today: NaiveDate,
    ) -> EvaluationOutcome {
        let groups = rules::evaluate_groups(clinical, rule_set, today);

        let defined = groups.len();
        let satisfied = groups.iter().filter(|group| group.satisfied).count();
        let match_score = if defined == 0 {
            1.0
        } else {
            satisfied as f64 / defined as f64
        };

        let total_criteria: usize = groups.iter().map(|group| group.criteria_total).sum();
        let met_criteria: usize = groups.iter().map(|group| group.criteria_met).sum();
        let confidence = if total_criteria == 0 {
            1.0
        } else {
            met_criteria as f64 / total_criteria as f64
        };

        let required_satisfied = rule_set
            .policy
            .required_criteria_groups
            .iter()
            .all(|required| {
                groups
                    .iter()
                    .find(|group| group.group == *required)
                    .map(|group| group.satisfied)
                    // A required group the rule set never defines counts as satisfied.
                    .unwrap_or(true)
            });

        let auto_approval_eligible = rule_set.policy.auto_approval_enabled
            && match_score >= rule_set.policy.min_criteria_match_score
            && required_satisfied;

        EvaluationOutcome {
            rule_id: rule_set.rule_id.clone(),
            drug_name: medication.drug_name.clone(),
            match_score,
            confidence,
            auto_approval_eligible,
            groups,
            evaluated_on: today,
        }
    }
}

/// Per-group evaluation result with human-readable unmet reasons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupOutcome {
    pub group: CriteriaGroup,
    pub satisfied: bool,
    pub criteria_total: usize,
    pub criteria_met: usize,
    pub unmet: Vec<String>,
}

/// Full evaluation result persisted alongside the authorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub rule_id: String,
    pub drug_name: String,
    /// Fraction of defined criteria groups satisfied, in [0,1].
    pub match_score: f64,
    /// Fraction of individual criteria satisfied across all groups.
    pub confidence: f64,
    pub auto_approval_eligible: bool,
    pub groups: Vec<GroupOutcome>,
    pub evaluated_on: NaiveDate,
}

impl EvaluationOutcome {
    pub fn group(&self, group: CriteriaGroup) -> Option<&GroupOutcome> {
        self.groups.iter().find(|outcome| outcome.group == group)
    }

    pub fn group_satisfied(&self, group: CriteriaGroup) -> bool {
        self.group(group).map(|outcome| outcome.satisfied).unwrap_or(true)
    }

    /// Routing decision for this outcome per the workflow policy.
    pub fn routing(&self) -> RoutingDecision {
        policy::route_outcome(self)
    }

    pub fn summary(&self) -> String {
        let unmet: Vec<&str> = self
            .groups
            .iter()
            .filter(|group| !group.satisfied)
            .map(|group| group.group.label())
            .collect();
        if unmet.is_empty() {
            format!("all criteria groups satisfied (score {:.2})", self.match_score)
        } else {
            format!(
                "score {:.2}; unmet groups: {}",
                self.match_score,
                unmet.join(", ")
            )
        }
    }
}
