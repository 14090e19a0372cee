use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::domain::{Authorization, AuthorizationId, AuthorizationStatus};
use super::repository::{AuthorizationRepository, RepositoryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ListKey {
    Status(AuthorizationStatus),
    Pending,
}

struct ListEntry {
    cached_at: Instant,
    records: Vec<Authorization>,
}

/// Read-through cache fronting the durable repository.
///
/// The entity cache always agrees with the repository on `version`: every
/// write evicts the entity key and repopulates it with the stored record.
/// Listing caches are allowed to serve slightly stale results within a short
/// TTL; the single-entity `get` path never is, because it feeds the
/// orchestrator's read-modify-write cycle.
pub struct AuthorizationStore<R> {
    repository: Arc<R>,
    entities: Mutex<HashMap<AuthorizationId, Authorization>>,
    lists: Mutex<HashMap<ListKey, ListEntry>>,
    list_ttl: Duration,
}

impl<R> AuthorizationStore<R>
where
    R: AuthorizationRepository,
{
    pub fn new(repository: Arc<R>, list_ttl: Duration) -> Self {
        Self {
            repository,
            entities: Mutex::new(HashMap::new()),
            lists: Mutex::new(HashMap::new()),
            list_ttl,
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    fn entities_guard(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<AuthorizationId, Authorization>>, RepositoryError>
    {
        self.entities
            .lock()
            .map_err(|_| RepositoryError::Unavailable("entity cache mutex poisoned".to_string()))
    }

    fn lists_guard(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<ListKey, ListEntry>>, RepositoryError> {
        self.lists
            .lock()
            .map_err(|_| RepositoryError::Unavailable("list cache mutex poisoned".to_string()))
    }

    /// Fetch one authorization, populating the entity cache on miss.
    pub fn get(&self, id: &AuthorizationId) -> Result<Authorization, RepositoryError> {
        if let Some(cached) = self.entities_guard()?.get(id).cloned() {
            return Ok(cached);
        }

        let loaded = self.repository.load(id)?;
        self.entities_guard()?.insert(*id, loaded.clone());
        Ok(loaded)
    }

    /// Optimistic-concurrency write-through.
    ///
    /// `expected_version` is the version the caller read via `get`. On
    /// success the returned entity carries the advanced version and the
    /// entity cache holds exactly that record; the listing caches for the old
    /// and new status are both evicted so a status-changing write empties the
    /// source and destination lists.
    pub fn put(
        &self,
        entity: &Authorization,
        expected_version: u64,
    ) -> Result<Authorization, RepositoryError> {
        let old_status = self
            .entities_guard()?
            .get(&entity.authorization_id)
            .map(|cached| cached.status);

        let new_version = self.repository.save(entity, expected_version)?;

        let mut stored = entity.clone();
        stored.version = new_version;

        {
            let mut entities = self.entities_guard()?;
            entities.remove(&entity.authorization_id);
            entities.insert(entity.authorization_id, stored.clone());
        }
        self.evict_lists(old_status, stored.status)?;

        Ok(stored)
    }

    fn evict_lists(
        &self,
        old_status: Option<AuthorizationStatus>,
        new_status: AuthorizationStatus,
    ) -> Result<(), RepositoryError> {
        let mut lists = self.lists_guard()?;
        match old_status {
            Some(old) => {
                lists.remove(&ListKey::Status(old));
                lists.remove(&ListKey::Status(new_status));
                if old.is_pending() || new_status.is_pending() {
                    lists.remove(&ListKey::Pending);
                }
            }
            // Unknown prior status: the write did not come through this
            // store's read path, so drop every list entry.
            None => lists.clear(),
        }
        Ok(())
    }

    fn cached_list(&self, key: ListKey) -> Result<Option<Vec<Authorization>>, RepositoryError> {
        let lists = self.lists_guard()?;
        Ok(lists
            .get(&key)
            .filter(|entry| entry.cached_at.elapsed() <= self.list_ttl)
            .map(|entry| entry.records.clone()))
    }

    fn store_list(&self, key: ListKey, records: Vec<Authorization>) -> Result<(), RepositoryError> {
        self.lists_guard()?.insert(
            key,
            ListEntry {
                cached_at: Instant::now(),
                records,
            },
        );
        Ok(())
    }

    /// Status listing served from the short-TTL cache.
    pub fn find_by_status(
        &self,
        status: AuthorizationStatus,
    ) -> Result<Vec<Authorization>, RepositoryError> {
        let key = ListKey::Status(status);
        if let Some(cached) = self.cached_list(key)? {
            return Ok(cached);
        }

        let records = self.repository.query_by_status(status)?;
        self.store_list(key, records.clone())?;
        Ok(records)
    }

    /// Active review queue, served from the short-TTL cache.
    pub fn find_pending(&self) -> Result<Vec<Authorization>, RepositoryError> {
        if let Some(cached) = self.cached_list(ListKey::Pending)? {
            return Ok(cached);
        }

        let records = self.repository.find_pending()?;
        self.store_list(ListKey::Pending, records.clone())?;
        Ok(records)
    }
}
