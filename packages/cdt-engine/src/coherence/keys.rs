//! Cache key conventions
//!
//! | key                                                  | holds                 |
//! |------------------------------------------------------|-----------------------|
//! | `cdt:<id>`                                           | one CDT               |
//! | `cdts:user:<owner>:status:<s\|all>:page:<p>:limit:<l>` | owner's list page     |
//! | `cdts:all:status:<s\|all>:page:<p>:limit:<l>`          | admin list page       |
//! | `admin_stats`                                        | dashboard aggregates  |
//! | `pending_cdts`                                       | review queue          |

use cdt_storage::{CdtFilter, CdtStatus};

pub const ADMIN_STATS: &str = "admin_stats";
pub const PENDING_CDTS: &str = "pending_cdts";
pub const ALL_LISTS_PATTERN: &str = "cdts:all:*";

pub fn cdt(id: &str) -> String {
    format!("cdt:{id}")
}

/// Key for one page of a list query, scoped by owner when the filter has one
pub fn list(filter: &CdtFilter) -> String {
    let scope = match &filter.owner_id {
        Some(owner) => format!("user:{owner}"),
        None => "all".to_string(),
    };
    format!(
        "cdts:{scope}:status:{}:page:{}:limit:{}",
        status_segment(filter.status),
        filter.page,
        filter.limit
    )
}

/// Pattern matching every cached list page of `owner`
pub fn owner_lists_pattern(owner: &str) -> String {
    format!("cdts:user:{owner}:*")
}

fn status_segment(status: Option<CdtStatus>) -> &'static str {
    status.map_or("all", |s| s.as_str())
}

/// Dependency tags
pub mod tags {
    pub fn cdt(id: &str) -> String {
        format!("cdt:{id}")
    }

    pub fn owner(owner: &str) -> String {
        format!("owner:{owner}")
    }
}
