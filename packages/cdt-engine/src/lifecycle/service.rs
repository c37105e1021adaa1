//! CDT lifecycle service
//!
//! Every mutation runs the same pipeline under one async lock:
//!
//! 1. load + authorize + validate (no side effects on failure)
//! 2. persist to the `CdtStore`
//! 3. append to the audit log (best-effort)
//! 4. apply the mutation's `InvalidationPlan` to the cache
//!
//! Reads are cache-aside. A miss refills the cache while holding the same
//! lock, so a refill can never interleave with a mutation's invalidation.

use cdt_storage::{
    AuditLogEntry, AuditLogStore, Cdt, CdtFilter, CdtId, CdtPage, CdtStats, CdtStatus, CdtStore,
    TransitionStamp,
};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::finance;
use super::input::{Actor, CdtPatch, NewCdt};
use super::transition::validate_transition;
use crate::audit::{actions, AuditLog, AuditWrite};
use crate::cache::{CacheStore, SweeperHandle};
use crate::coherence::{keys, InvalidationPlan};
use crate::config::EngineConfig;
use crate::error::{CdtError, Result};

/// Upper bound on page size for list reads
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Values held by the service cache
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Cdt(Cdt),
    Page(CdtPage),
    Stats(CdtStats),
    Queue(Vec<Cdt>),
}

/// Result of a successful mutation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mutation<T> {
    pub value: T,
    /// Whether the audit entry made it to storage
    pub audit: AuditWrite,
    /// Cache entries dropped by this mutation
    pub invalidation: InvalidationPlan,
}

/// Outcome of `CdtService::complete_matured`
///
/// A CDT that fails to complete is reported in `failed` and left for the
/// next sweep; the rest of the batch still runs.
#[derive(Debug, Default)]
pub struct MaturitySweep {
    pub completed: Vec<Mutation<Cdt>>,
    pub failed: Vec<(CdtId, CdtError)>,
}

impl MaturitySweep {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct CdtService {
    store: Arc<dyn CdtStore>,
    audit: AuditLog,
    cache: Arc<CacheStore<CachedValue>>,
    config: EngineConfig,
    write_lock: Mutex<()>,
}

impl CdtService {
    pub fn new(
        store: Arc<dyn CdtStore>,
        audit_store: Arc<dyn AuditLogStore>,
        cache: Arc<CacheStore<CachedValue>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            audit: AuditLog::new(audit_store),
            cache,
            config,
            write_lock: Mutex::new(()),
        }
    }

    /// Service over a backend that stores both CDTs and their audit log
    pub fn with_store<S>(store: Arc<S>, cache: Arc<CacheStore<CachedValue>>, config: EngineConfig) -> Self
    where
        S: CdtStore + AuditLogStore + 'static,
    {
        Self::new(store.clone(), store, cache, config)
    }

    pub fn cache(&self) -> &Arc<CacheStore<CachedValue>> {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start the cache sweeper at the configured interval
    pub fn spawn_cache_sweeper(&self) -> SweeperHandle {
        self.cache.spawn_sweeper(self.config.cache.sweep_interval())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Mutations
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Create a draft owned by `actor`
    pub async fn create(&self, actor: &Actor, input: NewCdt) -> Result<Mutation<Cdt>> {
        input.validate(&self.config.bounds, today())?;
        let end_date = checked_end_date(input.start_date, input.term_days)?;

        let now = Utc::now();
        let cdt = Cdt {
            id: Cdt::new_id(),
            owner_id: actor.user_id.clone(),
            amount: input.amount,
            term_days: input.term_days,
            interest_rate: input.interest_rate,
            start_date: input.start_date,
            end_date,
            estimated_return: finance::estimated_return(
                input.amount,
                input.interest_rate,
                input.term_days,
            ),
            renovation_option: input.renovation_option,
            status: CdtStatus::Draft,
            admin_notes: None,
            reviewed_by: None,
            reviewed_at: None,
            submitted_at: None,
            created_at: now,
            updated_at: now,
        };

        let _guard = self.write_lock.lock().await;
        self.store.insert(&cdt).await?;
        info!(cdt_id = %cdt.id, owner = %cdt.owner_id, amount = cdt.amount, "CDT created");

        let details = json!({
            "amount": cdt.amount,
            "term_days": cdt.term_days,
            "interest_rate": cdt.interest_rate,
            "start_date": cdt.start_date,
            "estimated_return": cdt.estimated_return,
            "renovation_option": cdt.renovation_option,
        });
        Ok(self.finish(cdt, actions::CREATED, details).await)
    }

    /// Edit a draft; only its owner may do so
    pub async fn update(&self, id: &str, actor: &Actor, patch: CdtPatch) -> Result<Mutation<Cdt>> {
        if patch.is_empty() {
            return Err(CdtError::validation("patch", "no fields to update"));
        }

        let _guard = self.write_lock.lock().await;
        let mut cdt = self.load(id).await?;
        if !actor.owns(&cdt) {
            return Err(CdtError::forbidden(id, &actor.user_id, "update"));
        }
        if cdt.status != CdtStatus::Draft {
            return Err(CdtError::invalid_state(id, cdt.status, "update"));
        }

        let changed = patch.apply_to(&mut cdt, &self.config.bounds, today())?;
        if changed.is_empty() {
            return Err(CdtError::validation("patch", "no field differs from the current value"));
        }
        if changed
            .iter()
            .any(|f| matches!(*f, "amount" | "term_days" | "interest_rate" | "start_date"))
        {
            cdt.end_date = checked_end_date(cdt.start_date, cdt.term_days)?;
            cdt.estimated_return =
                finance::estimated_return(cdt.amount, cdt.interest_rate, cdt.term_days);
        }
        cdt.updated_at = Utc::now();

        self.store.update(&cdt).await?;
        info!(cdt_id = %cdt.id, changed = ?changed, "CDT updated");

        let details = json!({
            "changed": changed,
            "estimated_return": cdt.estimated_return,
        });
        Ok(self.finish(cdt, actions::UPDATED, details).await)
    }

    /// `draft → pending`, by the owner
    pub async fn submit_for_review(&self, id: &str, actor: &Actor) -> Result<Mutation<Cdt>> {
        let _guard = self.write_lock.lock().await;
        let cdt = self.load(id).await?;
        if !actor.owns(&cdt) {
            return Err(CdtError::forbidden(id, &actor.user_id, "submit"));
        }
        ensure_transition(&cdt, CdtStatus::Pending)?;
        ensure_complete(&cdt)?;

        let stamp = TransitionStamp {
            submitted_at: Some(Utc::now()),
            ..TransitionStamp::default()
        };
        self.transition(&cdt, actor, CdtStatus::Pending, stamp, actions::SUBMITTED, json!({}))
            .await
    }

    /// `pending → active`, by an administrator
    pub async fn approve(&self, id: &str, actor: &Actor, notes: Option<String>) -> Result<Mutation<Cdt>> {
        require_admin(id, actor, "approve")?;
        let notes = notes.filter(|n| !n.trim().is_empty());

        let _guard = self.write_lock.lock().await;
        let cdt = self.load(id).await?;
        ensure_transition(&cdt, CdtStatus::Active)?;

        let details = json!({ "notes": notes });
        let stamp = TransitionStamp {
            reviewed_by: Some(actor.user_id.clone()),
            reviewed_at: Some(Utc::now()),
            admin_notes: notes,
            ..TransitionStamp::default()
        };
        self.transition(&cdt, actor, CdtStatus::Active, stamp, actions::APPROVED, details)
            .await
    }

    /// `pending → rejected`, by an administrator; `notes` is mandatory
    pub async fn reject(&self, id: &str, actor: &Actor, notes: &str) -> Result<Mutation<Cdt>> {
        let notes = notes.trim();
        if notes.is_empty() {
            return Err(CdtError::validation("notes", "a rejection needs a reason"));
        }
        require_admin(id, actor, "reject")?;

        let _guard = self.write_lock.lock().await;
        let cdt = self.load(id).await?;
        ensure_transition(&cdt, CdtStatus::Rejected)?;

        let stamp = TransitionStamp {
            reviewed_by: Some(actor.user_id.clone()),
            reviewed_at: Some(Utc::now()),
            admin_notes: Some(notes.to_string()),
            ..TransitionStamp::default()
        };
        self.transition(
            &cdt,
            actor,
            CdtStatus::Rejected,
            stamp,
            actions::REJECTED,
            json!({ "notes": notes }),
        )
        .await
    }

    /// Cancel a pending (owner or admin) or active (admin) CDT
    ///
    /// Drafts are deleted rather than cancelled.
    pub async fn cancel(&self, id: &str, actor: &Actor, reason: &str) -> Result<Mutation<Cdt>> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CdtError::validation("reason", "a cancellation needs a reason"));
        }

        let _guard = self.write_lock.lock().await;
        let cdt = self.load(id).await?;
        if !actor.is_admin() && !actor.owns(&cdt) {
            return Err(CdtError::forbidden(id, &actor.user_id, "cancel"));
        }
        ensure_transition(&cdt, CdtStatus::Cancelled)?;
        match cdt.status {
            CdtStatus::Pending => {}
            CdtStatus::Active if actor.is_admin() => {}
            CdtStatus::Active => return Err(CdtError::forbidden(id, &actor.user_id, "cancel")),
            current => {
                return Err(CdtError::invalid_state(
                    id,
                    current,
                    CdtStatus::Cancelled.as_str(),
                ))
            }
        }

        let details = json!({
            "previous_status": cdt.status,
            "reason": reason,
        });
        self.transition(
            &cdt,
            actor,
            CdtStatus::Cancelled,
            TransitionStamp::default(),
            actions::CANCELLED,
            details,
        )
        .await
    }

    /// `active → completed`, by an administrator
    pub async fn complete(&self, id: &str, actor: &Actor) -> Result<Mutation<Cdt>> {
        require_admin(id, actor, "complete")?;

        let _guard = self.write_lock.lock().await;
        let cdt = self.load(id).await?;
        ensure_transition(&cdt, CdtStatus::Completed)?;

        let details = json!({ "end_date": cdt.end_date, "automatic": false });
        self.transition(
            &cdt,
            actor,
            CdtStatus::Completed,
            TransitionStamp::default(),
            actions::COMPLETED,
            details,
        )
        .await
    }

    /// Complete every active CDT that has reached its end date by `as_of`
    ///
    /// Only listing the matured CDTs can fail the sweep as a whole.
    pub async fn complete_matured(&self, as_of: NaiveDate) -> Result<MaturitySweep> {
        let system = Actor::admin("system");

        let _guard = self.write_lock.lock().await;
        let matured = self.store.list_matured(as_of).await?;
        let mut sweep = MaturitySweep {
            completed: Vec::with_capacity(matured.len()),
            failed: Vec::new(),
        };
        for cdt in matured {
            let details = json!({
                "end_date": cdt.end_date,
                "as_of": as_of,
                "automatic": true,
            });
            let outcome = self
                .transition(
                    &cdt,
                    &system,
                    CdtStatus::Completed,
                    TransitionStamp::default(),
                    actions::COMPLETED,
                    details,
                )
                .await;
            match outcome {
                Ok(mutation) => sweep.completed.push(mutation),
                Err(err) => {
                    warn!(cdt_id = %cdt.id, error = %err, "matured CDT not completed");
                    sweep.failed.push((cdt.id, err));
                }
            }
        }

        if !sweep.completed.is_empty() || !sweep.failed.is_empty() {
            info!(
                %as_of,
                completed = sweep.completed.len(),
                failed = sweep.failed.len(),
                "maturity sweep finished"
            );
        }
        Ok(sweep)
    }

    /// Remove a draft or cancelled CDT, together with its audit history
    ///
    /// The `deleted` entry is appended before the row goes, and the cascade
    /// then removes it with the rest of the history.
    pub async fn delete(&self, id: &str, actor: &Actor) -> Result<Mutation<Cdt>> {
        let _guard = self.write_lock.lock().await;
        let cdt = self.load(id).await?;
        if !actor.is_admin() && !actor.owns(&cdt) {
            return Err(CdtError::forbidden(id, &actor.user_id, "delete"));
        }
        if !matches!(cdt.status, CdtStatus::Draft | CdtStatus::Cancelled) {
            return Err(CdtError::invalid_state(id, cdt.status, "delete"));
        }

        let audit = self
            .audit
            .record(
                &cdt.id,
                actions::DELETED,
                json!({ "status": cdt.status, "deleted_by": actor.user_id }),
            )
            .await;
        if !self.store.delete(&cdt.id).await? {
            return Err(CdtError::not_found(id));
        }
        info!(cdt_id = %cdt.id, actor = %actor.user_id, "CDT deleted");

        let invalidation = self.invalidate(&cdt);
        Ok(Mutation {
            value: cdt,
            audit,
            invalidation,
        })
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Reads
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// One CDT, visible to its owner and to administrators
    pub async fn get_by_id(&self, id: &str, actor: &Actor) -> Result<Cdt> {
        let key = keys::cdt(id);
        let cdt = match self.cached(&key, as_cdt) {
            Some(cdt) => cdt,
            None => {
                let _guard = self.write_lock.lock().await;
                match self.cached(&key, as_cdt) {
                    Some(cdt) => cdt,
                    None => {
                        let cdt = self.load(id).await?;
                        self.cache.set_with_tags(
                            key,
                            CachedValue::Cdt(cdt.clone()),
                            ttl(self.config.cache.entity_ttl()),
                            [keys::tags::cdt(&cdt.id), keys::tags::owner(&cdt.owner_id)],
                        );
                        cdt
                    }
                }
            }
        };

        if !actor.is_admin() && !actor.owns(&cdt) {
            return Err(CdtError::forbidden(id, &actor.user_id, "view"));
        }
        Ok(cdt)
    }

    /// The caller's own CDTs, newest first
    pub async fn list_for_owner(
        &self,
        actor: &Actor,
        status: Option<CdtStatus>,
        page: u32,
        limit: u32,
    ) -> Result<CdtPage> {
        let mut filter = CdtFilter::for_owner(actor.user_id.clone());
        filter.status = status;
        self.list(filter.with_page(page, limit)).await
    }

    /// Every CDT, newest first (administrators only)
    pub async fn list_all(
        &self,
        actor: &Actor,
        status: Option<CdtStatus>,
        page: u32,
        limit: u32,
    ) -> Result<CdtPage> {
        require_admin("*", actor, "list")?;
        let filter = CdtFilter {
            status,
            ..CdtFilter::default()
        };
        self.list(filter.with_page(page, limit)).await
    }

    /// Audit history of one CDT, newest first
    pub async fn get_audit_log(&self, id: &str, actor: &Actor) -> Result<Vec<AuditLogEntry>> {
        let cdt = self.load(id).await?;
        if !actor.is_admin() && !actor.owns(&cdt) {
            return Err(CdtError::forbidden(id, &actor.user_id, "view audit log of"));
        }
        self.audit.list_for(id).await
    }

    /// Dashboard aggregates (administrators only)
    pub async fn admin_stats(&self, actor: &Actor) -> Result<CdtStats> {
        require_admin("*", actor, "view stats of")?;
        if let Some(stats) = self.cached(keys::ADMIN_STATS, as_stats) {
            return Ok(stats);
        }

        let _guard = self.write_lock.lock().await;
        if let Some(stats) = self.cached(keys::ADMIN_STATS, as_stats) {
            return Ok(stats);
        }
        let stats = self.store.stats().await?;
        self.cache.set(
            keys::ADMIN_STATS,
            CachedValue::Stats(stats.clone()),
            ttl(self.config.cache.stats_ttl()),
        );
        Ok(stats)
    }

    /// Review queue, oldest submission first (administrators only)
    pub async fn pending(&self, actor: &Actor) -> Result<Vec<Cdt>> {
        require_admin("*", actor, "review")?;
        if let Some(queue) = self.cached(keys::PENDING_CDTS, as_queue) {
            return Ok(queue);
        }

        let _guard = self.write_lock.lock().await;
        if let Some(queue) = self.cached(keys::PENDING_CDTS, as_queue) {
            return Ok(queue);
        }
        let queue = self.store.list_by_status(CdtStatus::Pending).await?;
        let tags: Vec<String> = queue.iter().map(|c| keys::tags::cdt(&c.id)).collect();
        self.cache.set_with_tags(
            keys::PENDING_CDTS,
            CachedValue::Queue(queue.clone()),
            ttl(self.config.cache.pending_ttl()),
            tags,
        );
        Ok(queue)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Internals
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn list(&self, filter: CdtFilter) -> Result<CdtPage> {
        if filter.page == 0 {
            return Err(CdtError::validation("page", "pages start at 1"));
        }
        if filter.limit == 0 || filter.limit > MAX_PAGE_LIMIT {
            return Err(CdtError::validation(
                "limit",
                format!("must be between 1 and {MAX_PAGE_LIMIT}"),
            ));
        }

        let key = keys::list(&filter);
        if let Some(page) = self.cached(&key, as_page) {
            return Ok(page);
        }

        let _guard = self.write_lock.lock().await;
        if let Some(page) = self.cached(&key, as_page) {
            return Ok(page);
        }
        let page = self.store.list(&filter).await?;

        let mut tags: Vec<String> = page.items.iter().map(|c| keys::tags::cdt(&c.id)).collect();
        if let Some(owner) = &filter.owner_id {
            tags.push(keys::tags::owner(owner));
        }
        self.cache.set_with_tags(
            key,
            CachedValue::Page(page.clone()),
            ttl(self.config.cache.list_ttl()),
            tags,
        );
        Ok(page)
    }

    async fn load(&self, id: &str) -> Result<Cdt> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| CdtError::not_found(id))
    }

    fn cached<T>(&self, key: &str, extract: fn(&CachedValue) -> Option<T>) -> Option<T> {
        let value = self.cache.get(key)?;
        let hit = extract(value.as_ref());
        if hit.is_none() {
            debug!(key, "cache entry has unexpected shape");
        }
        hit
    }

    /// Persist a status change, then audit and invalidate. Caller holds the write lock.
    async fn transition(
        &self,
        cdt: &Cdt,
        actor: &Actor,
        next: CdtStatus,
        stamp: TransitionStamp,
        action: &str,
        mut details: serde_json::Value,
    ) -> Result<Mutation<Cdt>> {
        let updated = self
            .store
            .transition_status(&cdt.id, cdt.status, next, stamp)
            .await?;
        info!(
            cdt_id = %cdt.id,
            from = %cdt.status,
            to = %next,
            actor = %actor.user_id,
            "CDT status changed"
        );

        if let Some(map) = details.as_object_mut() {
            map.insert("from".to_string(), json!(cdt.status));
            map.insert("to".to_string(), json!(next));
            map.insert("actor".to_string(), json!(actor.user_id));
        }
        Ok(self.finish(updated, action, details).await)
    }

    /// Steps 3 and 4 of the mutation pipeline
    async fn finish(&self, cdt: Cdt, action: &str, details: serde_json::Value) -> Mutation<Cdt> {
        let audit = self.audit.record(&cdt.id, action, details).await;
        let invalidation = self.invalidate(&cdt);
        Mutation {
            value: cdt,
            audit,
            invalidation,
        }
    }

    fn invalidate(&self, cdt: &Cdt) -> InvalidationPlan {
        let plan = InvalidationPlan::for_cdt(&cdt.id, &cdt.owner_id);
        let removed = plan.apply(&self.cache);
        debug!(cdt_id = %cdt.id, removed, "cache invalidated");
        plan
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// `Some(ttl)` unless zero, which the cache reads as "never expires"
fn ttl(duration: Duration) -> Option<Duration> {
    Some(duration).filter(|d| !d.is_zero())
}

fn checked_end_date(start_date: NaiveDate, term_days: u32) -> Result<NaiveDate> {
    finance::end_date(start_date, term_days)
        .ok_or_else(|| CdtError::validation("start_date", "end date is out of range"))
}

fn require_admin(id: &str, actor: &Actor, action: &'static str) -> Result<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(CdtError::forbidden(id, &actor.user_id, action))
    }
}

fn ensure_transition(cdt: &Cdt, next: CdtStatus) -> Result<()> {
    if validate_transition(cdt.status, next) {
        Ok(())
    } else {
        Err(CdtError::invalid_state(&cdt.id, cdt.status, next.as_str()))
    }
}

/// A draft is submittable once its terms and derived fields are set
fn ensure_complete(cdt: &Cdt) -> Result<()> {
    if cdt.amount.is_nan() || cdt.amount <= 0.0 {
        return Err(CdtError::validation("amount", "required before submission"));
    }
    if cdt.term_days == 0 {
        return Err(CdtError::validation("term_days", "required before submission"));
    }
    if cdt.interest_rate.is_nan() || cdt.interest_rate <= 0.0 {
        return Err(CdtError::validation("interest_rate", "required before submission"));
    }
    if cdt.end_date <= cdt.start_date {
        return Err(CdtError::validation("end_date", "must follow start_date"));
    }
    Ok(())
}

fn as_cdt(value: &CachedValue) -> Option<Cdt> {
    match value {
        CachedValue::Cdt(cdt) => Some(cdt.clone()),
        _ => None,
    }
}

fn as_page(value: &CachedValue) -> Option<CdtPage> {
    match value {
        CachedValue::Page(page) => Some(page.clone()),
        _ => None,
    }
}

fn as_stats(value: &CachedValue) -> Option<CdtStats> {
    match value {
        CachedValue::Stats(stats) => Some(stats.clone()),
        _ => None,
    }
}

fn as_queue(value: &CachedValue) -> Option<Vec<Cdt>> {
    match value {
        CachedValue::Queue(queue) => Some(queue.clone()),
        _ => None,
    }
}
