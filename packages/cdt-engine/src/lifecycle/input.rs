//! Caller identity and operation payloads

use cdt_storage::{Cdt, RenovationOption, UserId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::CdtBounds;
use crate::error::{CdtError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

/// Authenticated caller, as handed over by the transport layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn user(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::User,
        }
    }

    pub fn admin(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn owns(&self, cdt: &Cdt) -> bool {
        cdt.is_owned_by(&self.user_id)
    }
}

/// Payload for `CdtService::create`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCdt {
    pub amount: f64,
    pub term_days: u32,
    pub interest_rate: f64,
    pub start_date: NaiveDate,
    pub renovation_option: RenovationOption,
}

/// Partial edit of a draft; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CdtPatch {
    pub amount: Option<f64>,
    pub term_days: Option<u32>,
    pub interest_rate: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub renovation_option: Option<RenovationOption>,
}

impl CdtPatch {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.term_days.is_none()
            && self.interest_rate.is_none()
            && self.start_date.is_none()
            && self.renovation_option.is_none()
    }

    /// Apply to `cdt`, returning the names of fields whose value changed
    ///
    /// Patched values are checked against `bounds` first; on error `cdt` is
    /// left as it was.
    pub(crate) fn apply_to(
        &self,
        cdt: &mut Cdt,
        bounds: &CdtBounds,
        today: NaiveDate,
    ) -> Result<Vec<&'static str>> {
        if let Some(amount) = self.amount {
            check_amount(bounds, amount)?;
        }
        if let Some(term_days) = self.term_days {
            check_term(bounds, term_days)?;
        }
        if let Some(rate) = self.interest_rate {
            check_rate(bounds, rate)?;
        }
        if let Some(start_date) = self.start_date {
            check_start_date(bounds, start_date, today)?;
        }

        let mut changed = Vec::new();
        if let Some(amount) = self.amount.filter(|v| *v != cdt.amount) {
            cdt.amount = amount;
            changed.push("amount");
        }
        if let Some(term_days) = self.term_days.filter(|v| *v != cdt.term_days) {
            cdt.term_days = term_days;
            changed.push("term_days");
        }
        if let Some(rate) = self.interest_rate.filter(|v| *v != cdt.interest_rate) {
            cdt.interest_rate = rate;
            changed.push("interest_rate");
        }
        if let Some(start_date) = self.start_date.filter(|v| *v != cdt.start_date) {
            cdt.start_date = start_date;
            changed.push("start_date");
        }
        if let Some(option) = self.renovation_option.filter(|v| *v != cdt.renovation_option) {
            cdt.renovation_option = option;
            changed.push("renovation_option");
        }
        Ok(changed)
    }
}

impl NewCdt {
    pub(crate) fn validate(&self, bounds: &CdtBounds, today: NaiveDate) -> Result<()> {
        check_amount(bounds, self.amount)?;
        check_term(bounds, self.term_days)?;
        check_rate(bounds, self.interest_rate)?;
        check_start_date(bounds, self.start_date, today)
    }
}

fn check_amount(bounds: &CdtBounds, amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < bounds.min_amount || amount > bounds.max_amount {
        return Err(CdtError::validation(
            "amount",
            format!(
                "must be between {} and {}, got {}",
                bounds.min_amount, bounds.max_amount, amount
            ),
        ));
    }
    Ok(())
}

fn check_term(bounds: &CdtBounds, term_days: u32) -> Result<()> {
    if term_days < bounds.min_term_days || term_days > bounds.max_term_days {
        return Err(CdtError::validation(
            "term_days",
            format!(
                "must be between {} and {} days, got {}",
                bounds.min_term_days, bounds.max_term_days, term_days
            ),
        ));
    }
    Ok(())
}

fn check_rate(bounds: &CdtBounds, rate: f64) -> Result<()> {
    if !rate.is_finite() || rate < bounds.min_interest_rate || rate > bounds.max_interest_rate {
        return Err(CdtError::validation(
            "interest_rate",
            format!(
                "must be between {}% and {}%, got {}%",
                bounds.min_interest_rate, bounds.max_interest_rate, rate
            ),
        ));
    }
    Ok(())
}

fn check_start_date(bounds: &CdtBounds, start_date: NaiveDate, today: NaiveDate) -> Result<()> {
    if !bounds.allow_past_start_date && start_date < today {
        return Err(CdtError::validation(
            "start_date",
            format!("{start_date} is in the past"),
        ));
    }
    Ok(())
}
