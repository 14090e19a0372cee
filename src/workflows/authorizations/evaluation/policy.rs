use serde::{Deserialize, Serialize};

use super::super::criteria::CriteriaGroup;
use super::super::domain::AuthorizationStatus;
use super::EvaluationOutcome;

/// Workflow routing derived from an evaluation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    AutoApprove,
    RequestDocuments,
    ManualReview,
}

impl RoutingDecision {
    /// Target lifecycle status for this decision.
    pub const fn target_status(self) -> AuthorizationStatus {
        match self {
            RoutingDecision::AutoApprove => AuthorizationStatus::Approved,
            RoutingDecision::RequestDocuments => AuthorizationStatus::PendingDocuments,
            RoutingDecision::ManualReview => AuthorizationStatus::UnderReview,
        }
    }

    pub fn reason(self, outcome: &EvaluationOutcome) -> String {
        match self {
            RoutingDecision::AutoApprove => format!(
                "Clinical criteria met (score {:.2}, rule {})",
                outcome.match_score, outcome.rule_id
            ),
            RoutingDecision::RequestDocuments => format!(
                "Additional documentation required ({})",
                outcome.summary()
            ),
            RoutingDecision::ManualReview => {
                format!("Requires clinical review ({})", outcome.summary())
            }
        }
    }
}

/// Route an evaluation outcome.
///
/// Auto-approval-eligible outcomes approve; otherwise an unsatisfied
/// documentation group sends the request back for documents, and everything
/// else lands in manual review.
pub(super) fn route_outcome(outcome: &EvaluationOutcome) -> RoutingDecision {
    if outcome.auto_approval_eligible {
        return RoutingDecision::AutoApprove;
    }

    let documentation_unsatisfied = outcome
        .group(CriteriaGroup::Documentation)
        .map(|group| !group.satisfied)
        .unwrap_or(false);

    if documentation_unsatisfied {
        RoutingDecision::RequestDocuments
    } else {
        RoutingDecision::ManualReview
    }
}
