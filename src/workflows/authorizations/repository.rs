use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Authorization, AuthorizationId, AuthorizationStatus};

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("authorization not found")]
    NotFound,
    #[error("version conflict: expected {expected}, stored {stored}")]
    VersionConflict { expected: u64, stored: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Durable storage abstraction with optimistic concurrency.
///
/// `save` compares the caller's previously-read version against the stored
/// one; a stale version fails with `VersionConflict` and the stored record is
/// left untouched. On success the stored version advances by one and the new
/// version is returned.
pub trait AuthorizationRepository: Send + Sync {
    fn load(&self, id: &AuthorizationId) -> Result<Authorization, RepositoryError>;
    fn save(&self, entity: &Authorization, expected_version: u64) -> Result<u64, RepositoryError>;
    fn query_by_status(
        &self,
        status: AuthorizationStatus,
    ) -> Result<Vec<Authorization>, RepositoryError>;
    fn find_pending(&self) -> Result<Vec<Authorization>, RepositoryError>;
    fn count_by_status(&self, status: AuthorizationStatus) -> Result<usize, RepositoryError> {
        Ok(self.query_by_status(status)?.len())
    }
}

/// Stakeholder notification payload for a committed status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChangeNotice {
    pub authorization_id: AuthorizationId,
    pub old_status: AuthorizationStatus,
    pub new_status: AuthorizationStatus,
    pub reason: String,
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Outbound notification hook (portal, e-mail, or pharmacy adapters).
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: StatusChangeNotice) -> Result<(), NotifyError>;
}

/// Outcome recorded with every audit event; failures are audited distinctly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure { cause: String },
}

/// Compliance audit record emitted for every workflow action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub authorization_id: AuthorizationId,
    pub action: String,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn success(id: AuthorizationId, action: &str, actor: &str) -> Self {
        Self {
            authorization_id: id,
            action: action.to_string(),
            actor: actor.to_string(),
            outcome: AuditOutcome::Success,
            recorded_at: Utc::now(),
        }
    }

    pub fn failure(id: AuthorizationId, action: &str, actor: &str, cause: &str) -> Self {
        Self {
            authorization_id: id,
            action: action.to_string(),
            actor: actor.to_string(),
            outcome: AuditOutcome::Failure {
                cause: cause.to_string(),
            },
            recorded_at: Utc::now(),
        }
    }
}

/// Audit trail sink; implementations must not lose failed-transition records.
pub trait AuditLogger: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Mutex-guarded in-memory repository backing the server binary and tests.
///
/// `save` performs the version compare-and-swap under the map lock, so two
/// concurrent writers with the same stale version cannot both win.
#[derive(Default, Clone)]
pub struct InMemoryAuthorizationRepository {
    records: Arc<Mutex<HashMap<AuthorizationId, Authorization>>>,
}

impl InMemoryAuthorizationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuthorizationRepository for InMemoryAuthorizationRepository {
    fn load(&self, id: &AuthorizationId) -> Result<Authorization, RepositoryError> {
        let guard = self
            .records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))?;
        guard.get(id).cloned().ok_or(RepositoryError::NotFound)
    }

    fn save(&self, entity: &Authorization, expected_version: u64) -> Result<u64, RepositoryError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))?;

        let stored_version = guard
            .get(&entity.authorization_id)
            .map(|stored| stored.version);

        match stored_version {
            None if expected_version == 0 => {}
            None => return Err(RepositoryError::NotFound),
            Some(stored) if stored != expected_version => {
                return Err(RepositoryError::VersionConflict {
                    expected: expected_version,
                    stored,
                })
            }
            Some(_) => {}
        }

        let new_version = expected_version + 1;
        let mut record = entity.clone();
        record.version = new_version;
        guard.insert(entity.authorization_id, record);
        Ok(new_version)
    }

    fn query_by_status(
        &self,
        status: AuthorizationStatus,
    ) -> Result<Vec<Authorization>, RepositoryError> {
        let guard = self
            .records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))?;
        let mut matches: Vec<Authorization> = guard
            .values()
            .filter(|record| record.status == status)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(matches)
    }

    fn find_pending(&self) -> Result<Vec<Authorization>, RepositoryError> {
        let guard = self
            .records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))?;
        let mut matches: Vec<Authorization> = guard
            .values()
            .filter(|record| record.status.is_pending())
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matches)
    }
}
