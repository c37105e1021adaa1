//! CDT Domain Models
//!
//! - `Cdt`: fixed-term deposit, the authoritative entity
//! - `CdtStatus`: closed lifecycle enumeration
//! - `AuditLogEntry`: append-only ledger row owned by a CDT
//! - `CdtFilter` / `CdtPage` / `CdtStats`: read-side query shapes

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::StorageError;

/// CDT identifier (UUID v4, hyphenated)
pub type CdtId = String;

/// User identifier handed in by the authentication layer
pub type UserId = String;

/// Lifecycle status
///
/// Closed set: `draft → pending → active → completed`, with `rejected` and
/// `cancelled` as the other two terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CdtStatus {
    Draft,
    Pending,
    Active,
    Rejected,
    Completed,
    Cancelled,
}

impl CdtStatus {
    /// Every status, in lifecycle order
    pub const ALL: [CdtStatus; 6] = [
        CdtStatus::Draft,
        CdtStatus::Pending,
        CdtStatus::Active,
        CdtStatus::Rejected,
        CdtStatus::Completed,
        CdtStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CdtStatus::Draft => "draft",
            CdtStatus::Pending => "pending",
            CdtStatus::Active => "active",
            CdtStatus::Rejected => "rejected",
            CdtStatus::Completed => "completed",
            CdtStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CdtStatus::Rejected | CdtStatus::Completed | CdtStatus::Cancelled
        )
    }
}

impl fmt::Display for CdtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CdtStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CdtStatus::Draft),
            "pending" => Ok(CdtStatus::Pending),
            "active" => Ok(CdtStatus::Active),
            "rejected" => Ok(CdtStatus::Rejected),
            "completed" => Ok(CdtStatus::Completed),
            "cancelled" => Ok(CdtStatus::Cancelled),
            _ => Err(StorageError::corrupted(format!("Invalid CDT status: {}", s))),
        }
    }
}

/// What happens to the deposit at maturity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenovationOption {
    /// Renew the principal only, pay out interest
    Capital,
    /// Renew principal plus accrued interest
    CapitalInterest,
    /// Automatic renewal under the same conditions
    Auto,
}

impl RenovationOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenovationOption::Capital => "capital",
            RenovationOption::CapitalInterest => "capital_interest",
            RenovationOption::Auto => "auto",
        }
    }
}

impl fmt::Display for RenovationOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RenovationOption {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "capital" => Ok(RenovationOption::Capital),
            "capital_interest" => Ok(RenovationOption::CapitalInterest),
            "auto" => Ok(RenovationOption::Auto),
            _ => Err(StorageError::corrupted(format!(
                "Invalid renovation option: {}",
                s
            ))),
        }
    }
}

/// CDT Entity
///
/// `end_date` and `estimated_return` are derived by the lifecycle engine and
/// persisted alongside their inputs; the store never recomputes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cdt {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Identity
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    pub id: CdtId,
    pub owner_id: UserId,

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Contract terms
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    /// Principal in the base currency
    pub amount: f64,
    /// Contractual term in days
    pub term_days: u32,
    /// Annualized rate, percent (5.5 means 5.5 %)
    pub interest_rate: f64,
    pub start_date: NaiveDate,
    /// `start_date + term_days`
    pub end_date: NaiveDate,
    pub estimated_return: f64,
    pub renovation_option: RenovationOption,

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Lifecycle
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    pub status: CdtStatus,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cdt {
    /// Generate a fresh CDT identifier
    pub fn new_id() -> CdtId {
        Uuid::new_v4().to_string()
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }
}

/// Field values stamped by a status transition
///
/// `None` leaves the stored column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionStamp {
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub admin_notes: Option<String>,
}

/// Audit Log Entry (append-only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    /// Owning CDT; the entry is deleted together with it
    pub cdt_id: CdtId,
    /// Free-form action tag (`created`, `approved`, ...)
    pub action: String,
    /// Structured payload
    #[serde(default)]
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        cdt_id: impl Into<CdtId>,
        action: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            cdt_id: cdt_id.into(),
            action: action.into(),
            details,
            created_at: Utc::now(),
        }
    }
}

/// List query (page is 1-indexed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdtFilter {
    pub owner_id: Option<UserId>,
    pub status: Option<CdtStatus>,
    pub page: u32,
    pub limit: u32,
}

impl CdtFilter {
    pub fn for_owner(owner_id: impl Into<UserId>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: CdtStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_page(mut self, page: u32, limit: u32) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }

    /// Row offset of the first item on this page
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit)
    }
}

impl Default for CdtFilter {
    fn default() -> Self {
        Self {
            owner_id: None,
            status: None,
            page: 1,
            limit: 10,
        }
    }
}

/// One page of CDTs, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdtPage {
    pub items: Vec<Cdt>,
    /// Total rows matching the filter, across all pages
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl CdtPage {
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.limit))
    }
}

/// Aggregate statistics for the admin dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CdtStats {
    pub total: u64,
    pub draft: u64,
    pub pending: u64,
    pub active: u64,
    pub rejected: u64,
    pub completed: u64,
    pub cancelled: u64,
    /// Sum of principal over `active` CDTs
    pub active_amount: f64,
    /// Sum of `estimated_return` over `active` CDTs
    pub active_estimated_return: f64,
}

impl CdtStats {
    pub fn count(&self, status: CdtStatus) -> u64 {
        match status {
            CdtStatus::Draft => self.draft,
            CdtStatus::Pending => self.pending,
            CdtStatus::Active => self.active,
            CdtStatus::Rejected => self.rejected,
            CdtStatus::Completed => self.completed,
            CdtStatus::Cancelled => self.cancelled,
        }
    }

    /// Accumulate one CDT into the aggregate
    pub fn add(&mut self, cdt: &Cdt) {
        self.total += 1;
        match cdt.status {
            CdtStatus::Draft => self.draft += 1,
            CdtStatus::Pending => self.pending += 1,
            CdtStatus::Active => {
                self.active += 1;
                self.active_amount += cdt.amount;
                self.active_estimated_return += cdt.estimated_return;
            }
            CdtStatus::Rejected => self.rejected += 1,
            CdtStatus::Completed => self.completed += 1,
            CdtStatus::Cancelled => self.cancelled += 1,
        }
    }
}
