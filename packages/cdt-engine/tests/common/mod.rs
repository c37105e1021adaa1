//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use cdt_engine::{Actor, CacheStore, CachedValue, CdtService, EngineConfig, NewCdt};
use cdt_storage::{
    AuditLogEntry, AuditLogStore, Cdt, CdtFilter, CdtPage, CdtStats, CdtStatus, CdtStore,
    InMemoryCdtStore, RenovationOption, StorageError, TransitionStamp,
};
use chrono::{Days, NaiveDate, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

pub struct Harness {
    pub service: CdtService,
    pub store: Arc<InMemoryCdtStore>,
    pub cache: Arc<CacheStore<CachedValue>>,
}

pub fn harness() -> Harness {
    let store = Arc::new(InMemoryCdtStore::new());
    let cache = Arc::new(CacheStore::new().unwrap());
    let service = CdtService::with_store(store.clone(), cache.clone(), EngineConfig::default());
    Harness {
        service,
        store,
        cache,
    }
}

/// Harness whose audit appends always fail
pub fn harness_with_broken_audit() -> Harness {
    let store = Arc::new(InMemoryCdtStore::new());
    let cache = Arc::new(CacheStore::new().unwrap());
    let service = CdtService::new(
        store.clone(),
        Arc::new(BrokenAuditStore),
        cache.clone(),
        EngineConfig::default(),
    );
    Harness {
        service,
        store,
        cache,
    }
}

/// Harness whose status transitions fail for ids marked on the returned store
pub fn harness_with_flaky_transitions() -> (Harness, Arc<FlakyTransitionStore>) {
    let store = Arc::new(InMemoryCdtStore::new());
    let flaky = Arc::new(FlakyTransitionStore {
        inner: store.clone(),
        failing: Mutex::new(HashSet::new()),
    });
    let cache = Arc::new(CacheStore::new().unwrap());
    let service = CdtService::new(
        flaky.clone(),
        store.clone(),
        cache.clone(),
        EngineConfig::default(),
    );
    let harness = Harness {
        service,
        store,
        cache,
    };
    (harness, flaky)
}

/// In-memory store that refuses to transition selected CDTs
pub struct FlakyTransitionStore {
    inner: Arc<InMemoryCdtStore>,
    failing: Mutex<HashSet<String>>,
}

impl FlakyTransitionStore {
    pub fn fail_for(&self, id: &str) {
        self.failing.lock().insert(id.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().clear();
    }
}

#[async_trait]
impl CdtStore for FlakyTransitionStore {
    async fn insert(&self, cdt: &Cdt) -> cdt_storage::Result<()> {
        self.inner.insert(cdt).await
    }

    async fn get(&self, id: &str) -> cdt_storage::Result<Option<Cdt>> {
        self.inner.get(id).await
    }

    async fn update(&self, cdt: &Cdt) -> cdt_storage::Result<()> {
        self.inner.update(cdt).await
    }

    async fn delete(&self, id: &str) -> cdt_storage::Result<bool> {
        self.inner.delete(id).await
    }

    async fn transition_status(
        &self,
        id: &str,
        from: CdtStatus,
        to: CdtStatus,
        stamp: TransitionStamp,
    ) -> cdt_storage::Result<Cdt> {
        if self.failing.lock().contains(id) {
            return Err(StorageError::database("disk I/O error"));
        }
        self.inner.transition_status(id, from, to, stamp).await
    }

    async fn list(&self, filter: &CdtFilter) -> cdt_storage::Result<CdtPage> {
        self.inner.list(filter).await
    }

    async fn list_by_status(&self, status: CdtStatus) -> cdt_storage::Result<Vec<Cdt>> {
        self.inner.list_by_status(status).await
    }

    async fn list_matured(&self, as_of: NaiveDate) -> cdt_storage::Result<Vec<Cdt>> {
        self.inner.list_matured(as_of).await
    }

    async fn stats(&self) -> cdt_storage::Result<CdtStats> {
        self.inner.stats().await
    }
}

pub struct BrokenAuditStore;

#[async_trait]
impl AuditLogStore for BrokenAuditStore {
    async fn append(&self, _entry: &AuditLogEntry) -> cdt_storage::Result<()> {
        Err(StorageError::database("audit table is locked"))
    }

    async fn list_for(&self, _cdt_id: &str) -> cdt_storage::Result<Vec<AuditLogEntry>> {
        Ok(Vec::new())
    }
}

pub fn tomorrow() -> NaiveDate {
    Utc::now().date_naive() + Days::new(1)
}

pub fn owner() -> Actor {
    Actor::user("42")
}

pub fn stranger() -> Actor {
    Actor::user("43")
}

pub fn admin() -> Actor {
    Actor::admin("1")
}

/// 1,000,000 at 5.5 % for 180 days, starting tomorrow
pub fn new_cdt() -> NewCdt {
    NewCdt {
        amount: 1_000_000.0,
        term_days: 180,
        interest_rate: 5.5,
        start_date: tomorrow(),
        renovation_option: RenovationOption::Capital,
    }
}

pub async fn create_draft(h: &Harness, actor: &Actor) -> Cdt {
    h.service.create(actor, new_cdt()).await.unwrap().value
}

pub async fn create_pending(h: &Harness, actor: &Actor) -> Cdt {
    let cdt = create_draft(h, actor).await;
    h.service.submit_for_review(&cdt.id, actor).await.unwrap().value
}

pub async fn create_active(h: &Harness, actor: &Actor) -> Cdt {
    let cdt = create_pending(h, actor).await;
    h.service.approve(&cdt.id, &admin(), None).await.unwrap().value
}
