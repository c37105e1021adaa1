//! CDT status state machine
//!
//! ```text
//!   draft ──► pending ──► active ──► completed
//!     │          │ │         │
//!     │          │ └► rejected
//!     └──────────┴───────────┴──► cancelled
//! ```
//!
//! `rejected`, `completed` and `cancelled` are terminal. Role checks live in
//! the service; this table is role-agnostic.

use cdt_storage::CdtStatus;

/// Statuses reachable from `current` in one step
pub fn allowed_next(current: CdtStatus) -> &'static [CdtStatus] {
    use CdtStatus::*;
    match current {
        Draft => &[Pending, Cancelled],
        Pending => &[Active, Rejected, Cancelled],
        Active => &[Completed, Cancelled],
        Rejected | Completed | Cancelled => &[],
    }
}

/// Whether `current → next` is a legal transition
pub fn validate_transition(current: CdtStatus, next: CdtStatus) -> bool {
    allowed_next(current).contains(&next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use CdtStatus::*;

    fn any_status() -> impl Strategy<Value = CdtStatus> {
        prop::sample::select(CdtStatus::ALL.to_vec())
    }

    #[test]
    fn test_table_exhaustively() {
        let legal = [
            (Draft, Pending),
            (Draft, Cancelled),
            (Pending, Active),
            (Pending, Rejected),
            (Pending, Cancelled),
            (Active, Completed),
            (Active, Cancelled),
        ];

        let mut checked = 0;
        for from in CdtStatus::ALL {
            for to in CdtStatus::ALL {
                assert_eq!(
                    validate_transition(from, to),
                    legal.contains(&(from, to)),
                    "{from} -> {to}"
                );
                checked += 1;
            }
        }
        assert_eq!(checked, 36);
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for status in CdtStatus::ALL {
            assert_eq!(allowed_next(status).is_empty(), status.is_terminal());
        }
    }

    proptest! {
        #[test]
        fn prop_no_self_loops(status in any_status()) {
            prop_assert!(!validate_transition(status, status));
        }

        #[test]
        fn prop_nothing_returns_to_draft(status in any_status()) {
            prop_assert!(!validate_transition(status, Draft));
        }

        #[test]
        fn prop_terminal_is_absorbing(from in any_status(), to in any_status()) {
            if from.is_terminal() {
                prop_assert!(!validate_transition(from, to));
            }
        }
    }
}
