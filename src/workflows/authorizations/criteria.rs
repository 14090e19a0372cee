use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Criteria groups a rule set may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaGroup {
    Diagnosis,
    Labs,
    TreatmentHistory,
    Documentation,
}

impl CriteriaGroup {
    pub const fn label(self) -> &'static str {
        match self {
            CriteriaGroup::Diagnosis => "diagnosis",
            CriteriaGroup::Labs => "labs",
            CriteriaGroup::TreatmentHistory => "treatment_history",
            CriteriaGroup::Documentation => "documentation",
        }
    }
}

/// Diagnosis-code requirements for one rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisCriteria {
    #[serde(default)]
    pub required_codes: Vec<String>,
    #[serde(default)]
    pub excluded_codes: Vec<String>,
    /// Each inner list is one acceptable combination; at least one full
    /// combination must be present when any are declared.
    #[serde(default)]
    pub code_combinations: Vec<Vec<String>>,
}

impl DiagnosisCriteria {
    pub fn is_empty(&self) -> bool {
        self.required_codes.is_empty()
            && self.excluded_codes.is_empty()
            && self.code_combinations.is_empty()
    }
}

/// One required lab observation with an acceptable range and recency window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabCriterion {
    pub loinc_code: String,
    pub name: String,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    pub timeframe_days: u32,
}

/// One required prior-medication trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentCriterion {
    pub drug_name: String,
    pub min_duration_days: u32,
    pub timeframe_days: u32,
    /// When set, the history entry must document a therapeutic failure.
    #[serde(default)]
    pub failure_required: bool,
}

/// Required documentation types and how recent they must be.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentationCriteria {
    #[serde(default)]
    pub required_documents: Vec<String>,
    #[serde(default = "default_document_timeframe_days")]
    pub timeframe_days: u32,
}

const fn default_document_timeframe_days() -> u32 {
    180
}

/// Auto-approval policy attached to a rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    pub auto_approval_enabled: bool,
    /// Minimum fraction of defined criteria groups that must be satisfied.
    pub min_criteria_match_score: f64,
    /// Groups that must all be satisfied before auto approval applies.
    #[serde(default)]
    pub required_criteria_groups: Vec<CriteriaGroup>,
}

/// Declarative clinical criteria for one drug or drug class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaRuleSet {
    pub rule_id: String,
    #[serde(default)]
    pub drug_name: Option<String>,
    #[serde(default)]
    pub drug_class: Option<String>,
    #[serde(default)]
    pub diagnosis: DiagnosisCriteria,
    #[serde(default)]
    pub labs: Vec<LabCriterion>,
    #[serde(default)]
    pub treatments: Vec<TreatmentCriterion>,
    #[serde(default)]
    pub documentation: DocumentationCriteria,
    pub policy: ApprovalPolicy,
}

impl CriteriaRuleSet {
    /// Criteria groups this rule set actually defines, in evaluation order.
    pub fn defined_groups(&self) -> Vec<CriteriaGroup> {
        let mut groups = Vec::with_capacity(4);
        if !self.diagnosis.is_empty() {
            groups.push(CriteriaGroup::Diagnosis);
        }
        if !self.labs.is_empty() {
            groups.push(CriteriaGroup::Labs);
        }
        if !self.treatments.is_empty() {
            groups.push(CriteriaGroup::TreatmentHistory);
        }
        if !self.documentation.required_documents.is_empty() {
            groups.push(CriteriaGroup::Documentation);
        }
        groups
    }
}

/// Error raised while loading or validating a criteria rule-set file.
#[derive(Debug, thiserror::Error)]
pub enum CriteriaError {
    #[error("failed to read rules file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse rules file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("rule set '{rule_id}' names neither a drug nor a drug class")]
    UnkeyedRuleSet { rule_id: String },
    #[error("rule set '{rule_id}' has min_criteria_match_score {value} outside [0,1]")]
    InvalidThreshold { rule_id: String, value: f64 },
}

/// Immutable library of criteria rule sets, installed once at startup and
/// shared read-only across evaluation workers.
#[derive(Debug, Clone, Default)]
pub struct CriteriaLibrary {
    by_drug: HashMap<String, Arc<CriteriaRuleSet>>,
    by_class: HashMap<String, Arc<CriteriaRuleSet>>,
}

impl CriteriaLibrary {
    pub fn from_rule_sets(rule_sets: Vec<CriteriaRuleSet>) -> Result<Self, CriteriaError> {
        let mut library = Self::default();
        for rule_set in rule_sets {
            let score = rule_set.policy.min_criteria_match_score;
            if !(0.0..=1.0).contains(&score) {
                return Err(CriteriaError::InvalidThreshold {
                    rule_id: rule_set.rule_id,
                    value: score,
                });
            }
            if rule_set.drug_name.is_none() && rule_set.drug_class.is_none() {
                return Err(CriteriaError::UnkeyedRuleSet {
                    rule_id: rule_set.rule_id,
                });
            }

            let shared = Arc::new(rule_set);
            if let Some(drug) = &shared.drug_name {
                library
                    .by_drug
                    .insert(drug.trim().to_ascii_lowercase(), shared.clone());
            }
            if let Some(class) = &shared.drug_class {
                library
                    .by_class
                    .insert(class.trim().to_ascii_lowercase(), shared.clone());
            }
        }
        Ok(library)
    }

    /// Load a JSON array of rule sets from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CriteriaError> {
        let raw = std::fs::read_to_string(path)?;
        let rule_sets: Vec<CriteriaRuleSet> = serde_json::from_str(&raw)?;
        Self::from_rule_sets(rule_sets)
    }

    /// Look up criteria by drug name, falling back to the drug class.
    pub fn lookup(&self, drug_name: &str, drug_class: &str) -> Option<Arc<CriteriaRuleSet>> {
        self.by_drug
            .get(&drug_name.trim().to_ascii_lowercase())
            .or_else(|| self.by_class.get(&drug_class.trim().to_ascii_lowercase()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.by_drug.len() + self.by_class.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_drug.is_empty() && self.by_class.is_empty()
    }

    /// Built-in criteria covering common specialty-drug policies, used when no
    /// rules file is configured.
    pub fn standard() -> Self {
        let rule_sets = vec![
            CriteriaRuleSet {
                rule_id: "glp1-diabetes".to_string(),
                drug_name: Some("Semaglutide".to_string()),
                drug_class: Some("GLP-1 Agonist".to_string()),
                diagnosis: DiagnosisCriteria {
                    required_codes: vec!["E11.9".to_string(), "E11.65".to_string()],
                    excluded_codes: vec!["C25.9".to_string()],
                    code_combinations: Vec::new(),
                },
                labs: vec![LabCriterion {
                    loinc_code: "4548-4".to_string(),
                    name: "Hemoglobin A1c".to_string(),
                    min_value: Some(7.0),
                    max_value: None,
                    timeframe_days: 90,
                }],
                treatments: vec![TreatmentCriterion {
                    drug_name: "Metformin".to_string(),
                    min_duration_days: 90,
                    timeframe_days: 365,
                    failure_required: true,
                }],
                documentation: DocumentationCriteria::default(),
                policy: ApprovalPolicy {
                    auto_approval_enabled: true,
                    min_criteria_match_score: 0.8,
                    required_criteria_groups: vec![CriteriaGroup::Diagnosis, CriteriaGroup::Labs],
                },
            },
            CriteriaRuleSet {
                rule_id: "biologic-ra".to_string(),
                drug_name: Some("Adalimumab".to_string()),
                drug_class: Some("TNF Inhibitor".to_string()),
                diagnosis: DiagnosisCriteria {
                    required_codes: vec!["M05.79".to_string(), "M06.9".to_string()],
                    excluded_codes: vec!["A15.0".to_string(), "B20".to_string()],
                    code_combinations: Vec::new(),
                },
                labs: vec![LabCriterion {
                    loinc_code: "1988-5".to_string(),
                    name: "C-reactive protein".to_string(),
                    min_value: Some(10.0),
                    max_value: None,
                    timeframe_days: 60,
                }],
                treatments: vec![TreatmentCriterion {
                    drug_name: "Methotrexate".to_string(),
                    min_duration_days: 84,
                    timeframe_days: 365,
                    failure_required: true,
                }],
                documentation: DocumentationCriteria {
                    required_documents: vec!["tb_screening".to_string()],
                    timeframe_days: 365,
                },
                policy: ApprovalPolicy {
                    auto_approval_enabled: false,
                    min_criteria_match_score: 1.0,
                    required_criteria_groups: vec![
                        CriteriaGroup::Diagnosis,
                        CriteriaGroup::TreatmentHistory,
                        CriteriaGroup::Documentation,
                    ],
                },
            },
        ];

        Self::from_rule_sets(rule_sets).expect("built-in rule sets are valid")
    }
}
