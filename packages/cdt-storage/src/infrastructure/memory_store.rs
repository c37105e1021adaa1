//! In-Memory CDT Store (for testing)
//!
//! HashMap-based implementation of both ports behind one lock, so the
//! audit cascade on delete is atomic with the CDT removal.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::models::{
    AuditLogEntry, Cdt, CdtFilter, CdtPage, CdtStats, CdtStatus, TransitionStamp,
};
use crate::domain::ports::{AuditLogStore, CdtStore};
use crate::{Result, StorageError};

#[derive(Default)]
struct Inner {
    /// id → (insertion sequence, row)
    cdts: HashMap<String, (u64, Cdt)>,
    /// cdt id → entries in append order
    audit: HashMap<String, Vec<AuditLogEntry>>,
    next_seq: u64,
}

impl Inner {
    /// Rows sorted newest first (created_at, then insertion order)
    fn sorted_desc<'a>(&'a self, keep: impl Fn(&Cdt) -> bool) -> Vec<&'a Cdt> {
        let mut rows: Vec<&(u64, Cdt)> = self.cdts.values().filter(|(_, c)| keep(c)).collect();
        rows.sort_by(|(sa, a), (sb, b)| b.created_at.cmp(&a.created_at).then(sb.cmp(sa)));
        rows.into_iter().map(|(_, c)| c).collect()
    }

    /// Matching rows ordered by `cmp`, ties broken by insertion order
    fn sorted_by(
        &self,
        keep: impl Fn(&Cdt) -> bool,
        cmp: impl Fn(&Cdt, &Cdt) -> Ordering,
    ) -> Vec<Cdt> {
        let mut rows: Vec<&(u64, Cdt)> = self.cdts.values().filter(|(_, c)| keep(c)).collect();
        rows.sort_by(|(sa, a), (sb, b)| cmp(a, b).then(sa.cmp(sb)));
        rows.into_iter().map(|(_, c)| c.clone()).collect()
    }
}

#[derive(Clone, Default)]
pub struct InMemoryCdtStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryCdtStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored CDTs
    pub fn len(&self) -> usize {
        self.inner.read().cdts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total audit entries across all CDTs
    pub fn audit_len(&self) -> usize {
        self.inner.read().audit.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl CdtStore for InMemoryCdtStore {
    async fn insert(&self, cdt: &Cdt) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.cdts.contains_key(&cdt.id) {
            return Err(StorageError::conflict(format!(
                "CDT already exists: {}",
                cdt.id
            )));
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.cdts.insert(cdt.id.clone(), (seq, cdt.clone()));
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Cdt>> {
        Ok(self.inner.read().cdts.get(id).map(|(_, c)| c.clone()))
    }

    async fn update(&self, cdt: &Cdt) -> Result<()> {
        let mut inner = self.inner.write();
        match inner.cdts.get_mut(&cdt.id) {
            Some((_, stored)) => {
                *stored = cdt.clone();
                Ok(())
            }
            None => Err(StorageError::cdt_not_found(&cdt.id)),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut inner = self.inner.write();
        let removed = inner.cdts.remove(id).is_some();
        if removed {
            inner.audit.remove(id);
        }
        Ok(removed)
    }

    async fn transition_status(
        &self,
        id: &str,
        from: CdtStatus,
        to: CdtStatus,
        stamp: TransitionStamp,
    ) -> Result<Cdt> {
        let mut inner = self.inner.write();
        let (_, cdt) = inner
            .cdts
            .get_mut(id)
            .ok_or_else(|| StorageError::cdt_not_found(id))?;

        if cdt.status != from {
            return Err(StorageError::conflict(format!(
                "CDT {} is {}, expected {}",
                id, cdt.status, from
            )));
        }

        cdt.status = to;
        if stamp.submitted_at.is_some() {
            cdt.submitted_at = stamp.submitted_at;
        }
        if stamp.reviewed_by.is_some() {
            cdt.reviewed_by = stamp.reviewed_by;
        }
        if stamp.reviewed_at.is_some() {
            cdt.reviewed_at = stamp.reviewed_at;
        }
        if stamp.admin_notes.is_some() {
            cdt.admin_notes = stamp.admin_notes;
        }
        cdt.updated_at = Utc::now();
        Ok(cdt.clone())
    }

    async fn list(&self, filter: &CdtFilter) -> Result<CdtPage> {
        let inner = self.inner.read();
        let matching = inner.sorted_desc(|c| {
            filter.owner_id.as_deref().map_or(true, |o| c.owner_id == o)
                && filter.status.map_or(true, |s| c.status == s)
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .cloned()
            .collect();

        Ok(CdtPage {
            items,
            total,
            page: filter.page.max(1),
            limit: filter.limit,
        })
    }

    async fn list_by_status(&self, status: CdtStatus) -> Result<Vec<Cdt>> {
        let inner = self.inner.read();
        Ok(inner.sorted_by(
            |c| c.status == status,
            |a, b| {
                a.submitted_at
                    .cmp(&b.submitted_at)
                    .then(a.created_at.cmp(&b.created_at))
            },
        ))
    }

    async fn list_matured(&self, as_of: NaiveDate) -> Result<Vec<Cdt>> {
        let inner = self.inner.read();
        Ok(inner.sorted_by(
            |c| c.status == CdtStatus::Active && c.end_date <= as_of,
            |a, b| a.end_date.cmp(&b.end_date),
        ))
    }

    async fn stats(&self) -> Result<CdtStats> {
        let inner = self.inner.read();
        let mut stats = CdtStats::default();
        for (_, cdt) in inner.cdts.values() {
            stats.add(cdt);
        }
        Ok(stats)
    }
}

#[async_trait]
impl AuditLogStore for InMemoryCdtStore {
    async fn append(&self, entry: &AuditLogEntry) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.cdts.contains_key(&entry.cdt_id) {
            return Err(StorageError::cdt_not_found(&entry.cdt_id));
        }
        inner
            .audit
            .entry(entry.cdt_id.clone())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn list_for(&self, cdt_id: &str) -> Result<Vec<AuditLogEntry>> {
        let inner = self.inner.read();
        Ok(inner
            .audit
            .get(cdt_id)
            .map(|entries| entries.iter().rev().cloned().collect())
            .unwrap_or_default())
    }
}
