//! Fixtures shared by unit tests

use cdt_storage::{Cdt, CdtStatus, RenovationOption};
use chrono::{Days, Utc};

use crate::lifecycle::finance;

/// Draft with default-valid terms, starting tomorrow
pub(crate) fn draft_cdt(owner: &str) -> Cdt {
    let now = Utc::now();
    let start = now.date_naive() + Days::new(1);
    Cdt {
        id: Cdt::new_id(),
        owner_id: owner.to_string(),
        amount: 1_000_000.0,
        term_days: 180,
        interest_rate: 5.5,
        start_date: start,
        end_date: start + Days::new(180),
        estimated_return: finance::estimated_return(1_000_000.0, 5.5, 180),
        renovation_option: RenovationOption::Capital,
        status: CdtStatus::Draft,
        admin_notes: None,
        reviewed_by: None,
        reviewed_at: None,
        submitted_at: None,
        created_at: now,
        updated_at: now,
    }
}
