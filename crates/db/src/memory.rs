//! In-process stores with the same conditional-update semantics as the
//! Postgres ones. Used when `DATABASE_URL` is unset and throughout tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use flowgate_core::status::JobStatus;
use flowgate_core::types::JobId;

use crate::models::flow_config::{FlowConfig, UpsertFlowConfig};
use crate::models::job::{JobListQuery, JobPatch, JobRecord, NewJob, PageCursor};
use crate::repositories::job_repo::page_bounds;
use crate::store::{check_initial_status, check_transition, FlowConfigStore, JobStore, StoreError};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Internal("store lock poisoned".into()))
}

/// [`JobStore`] holding records in a mutex-guarded map.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<JobId, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: NewJob) -> Result<JobRecord, StoreError> {
        check_initial_status(&job)?;
        let mut jobs = lock(&self.jobs)?;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::Duplicate(format!("job {}", job.id)));
        }

        let now = Utc::now();
        let record = JobRecord {
            id: job.id,
            flow_key: job.flow_key,
            flow_path: job.flow_path,
            identifier_from_purchaser: job.identifier_from_purchaser,
            status: job.status,
            amount: job.amount,
            payment_unit: job.payment_unit,
            agent_identifier: job.agent_identifier,
            blockchain_identifier: job.blockchain_identifier,
            input_hash: job.input_hash,
            pay_by_at: job.pay_by_at,
            submit_by_at: job.submit_by_at,
            unlock_at: job.unlock_at,
            external_dispute_unlock_at: job.external_dispute_unlock_at,
            remote_run_id: None,
            remote_status: None,
            input_data: job.input_data,
            result_data: None,
            result_hash: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        };
        jobs.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        Ok(lock(&self.jobs)?.get(&id).cloned())
    }

    async fn find_by_blockchain_identifier(
        &self,
        blockchain_identifier: &str,
    ) -> Result<Option<JobRecord>, StoreError> {
        let jobs = lock(&self.jobs)?;
        Ok(jobs
            .values()
            .filter(|j| j.blockchain_identifier.as_deref() == Some(blockchain_identifier))
            .max_by_key(|j| j.created_at)
            .cloned())
    }

    async fn list_by_status(
        &self,
        statuses: &[JobStatus],
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<JobRecord>, StoreError> {
        let jobs = lock(&self.jobs)?;
        let mut matching: Vec<JobRecord> = jobs
            .values()
            .filter(|j| statuses.contains(&j.status))
            .filter(|j| after.map_or(true, |cursor| (j.created_at, j.id) > cursor))
            .cloned()
            .collect();
        matching.sort_by_key(|j| (j.created_at, j.id));
        matching.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(matching)
    }

    async fn compare_and_set(
        &self,
        id: JobId,
        expected: JobStatus,
        patch: JobPatch,
    ) -> Result<Option<JobRecord>, StoreError> {
        check_transition(expected, &patch)?;
        let mut jobs = lock(&self.jobs)?;
        match jobs.get_mut(&id) {
            Some(record) if record.status == expected => {
                patch.apply(record, Utc::now());
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list(&self, query: &JobListQuery) -> Result<Vec<JobRecord>, StoreError> {
        let (limit, offset) = page_bounds(query);
        let jobs = lock(&self.jobs)?;
        let mut matching: Vec<JobRecord> = jobs
            .values()
            .filter(|j| query.status.map_or(true, |s| j.status == s))
            .filter(|j| query.flow_key.as_deref().map_or(true, |k| j.flow_key == k))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        lock(&self.jobs).map(|_| ())
    }
}

/// [`FlowConfigStore`] holding overrides in a mutex-guarded map.
#[derive(Default)]
pub struct MemoryFlowConfigStore {
    configs: Mutex<BTreeMap<String, FlowConfig>>,
}

impl MemoryFlowConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlowConfigStore for MemoryFlowConfigStore {
    async fn list(&self) -> Result<Vec<FlowConfig>, StoreError> {
        Ok(lock(&self.configs)?.values().cloned().collect())
    }

    async fn upsert(&self, input: UpsertFlowConfig) -> Result<FlowConfig, StoreError> {
        let mut configs = lock(&self.configs)?;
        let previous_name = configs
            .get(&input.flow_key)
            .and_then(|c| c.flow_name.clone());
        let config = FlowConfig {
            flow_key: input.flow_key.clone(),
            enabled: input.enabled,
            agent_identifier: input.agent_identifier,
            flow_name: input.flow_name.or(previous_name),
            updated_at: Utc::now(),
        };
        configs.insert(input.flow_key, config.clone());
        Ok(config)
    }
}
