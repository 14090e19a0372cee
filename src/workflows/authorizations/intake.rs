use regex::Regex;
use serde::{Deserialize, Serialize};

use super::domain::{
    Authorization, ClinicalInfo, InsuranceInfo, MedicationInfo, PatientInfo, ProviderInfo,
};

/// Inbound payload for creating a prior authorization request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub patient: PatientInfo,
    pub insurance: InsuranceInfo,
    pub provider: ProviderInfo,
    pub medication: MedicationInfo,
    pub clinical: ClinicalInfo,
    pub requested_by: String,
}

/// Validation errors raised during intake.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid ICD-10 diagnosis code '{0}'")]
    InvalidDiagnosisCode(String),
    #[error("at least one diagnosis code is required")]
    NoDiagnosisCodes,
    #[error("invalid NPI '{0}': expected 10 digits")]
    InvalidNpi(String),
    #[error("invalid phone number '{0}': expected E.164 format")]
    InvalidPhone(String),
    #[error("invalid LOINC code '{0}'")]
    InvalidLoincCode(String),
    #[error("medication quantity must be greater than zero")]
    InvalidQuantity,
    #[error("days supply {0} outside allowed range 1..=365")]
    InvalidDaysSupply(u32),
}

/// Structural validator applied before an authorization enters the workflow.
///
/// Patterns follow the source intake schemas: ICD-10 `[A-Z]\d{2}(\.\d{1,2})?`,
/// ten-digit NPI, E.164 phone numbers, LOINC `\d{1,5}-\d`.
#[derive(Debug, Clone)]
pub struct IntakeValidator {
    icd10: Regex,
    npi: Regex,
    phone: Regex,
    loinc: Regex,
}

impl Default for IntakeValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl IntakeValidator {
    pub fn new() -> Self {
        Self {
            icd10: Regex::new(r"^[A-Z]\d{2}(\.\d{1,2})?$").expect("valid ICD-10 pattern"),
            npi: Regex::new(r"^\d{10}$").expect("valid NPI pattern"),
            phone: Regex::new(r"^\+[1-9]\d{1,14}$").expect("valid E.164 pattern"),
            loinc: Regex::new(r"^\d{1,5}-\d$").expect("valid LOINC pattern"),
        }
    }

    /// Validate a request and build the DRAFT aggregate from it.
    pub fn authorization_from_request(
        &self,
        request: AuthorizationRequest,
    ) -> Result<Authorization, ValidationError> {
        self.validate(&request)?;

        Ok(Authorization::new(
            request.patient,
            request.insurance,
            request.provider,
            request.medication,
            request.clinical,
            &request.requested_by,
        ))
    }

    pub fn validate(&self, request: &AuthorizationRequest) -> Result<(), ValidationError> {
        if request.patient.member_id.trim().is_empty() {
            return Err(ValidationError::MissingField("patient.member_id"));
        }
        if request.patient.first_name.trim().is_empty()
            || request.patient.last_name.trim().is_empty()
        {
            return Err(ValidationError::MissingField("patient.name"));
        }
        if request.requested_by.trim().is_empty() {
            return Err(ValidationError::MissingField("requested_by"));
        }
        if request.insurance.payer_id.trim().is_empty() {
            return Err(ValidationError::MissingField("insurance.payer_id"));
        }
        if request.medication.drug_name.trim().is_empty() {
            return Err(ValidationError::MissingField("medication.drug_name"));
        }

        if !self.phone.is_match(&request.patient.phone) {
            return Err(ValidationError::InvalidPhone(request.patient.phone.clone()));
        }
        if !self.phone.is_match(&request.provider.phone) {
            return Err(ValidationError::InvalidPhone(
                request.provider.phone.clone(),
            ));
        }
        if !self.npi.is_match(&request.provider.npi) {
            return Err(ValidationError::InvalidNpi(request.provider.npi.clone()));
        }

        if request.medication.quantity == 0 {
            return Err(ValidationError::InvalidQuantity);
        }
        if !(1..=365).contains(&request.medication.days_supply) {
            return Err(ValidationError::InvalidDaysSupply(
                request.medication.days_supply,
            ));
        }

        if request.clinical.diagnosis_codes.is_empty() {
            return Err(ValidationError::NoDiagnosisCodes);
        }
        for code in &request.clinical.diagnosis_codes {
            if !self.icd10.is_match(code) {
                return Err(ValidationError::InvalidDiagnosisCode(code.clone()));
            }
        }
        for result in &request.clinical.lab_results {
            if !self.loinc.is_match(&result.loinc_code) {
                return Err(ValidationError::InvalidLoincCode(result.loinc_code.clone()));
            }
        }

        Ok(())
    }
}
