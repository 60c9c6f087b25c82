use crate::error::{EngineError, EngineResult};
use crate::model::document::DocStatus;
use crate::model::role::Role;

/// Documents at or above this total require the two-stage path
/// (chairman first, then director). In currency units.
pub const DIRECTOR_APPROVAL_THRESHOLD: i64 = 1_000_000;

/// Outcome of a legal approval step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Approval {
    pub status: DocStatus,
    /// Terminal approvals trigger the ledger side effect exactly once.
    pub terminal: bool,
}

/// The one authoritative transition table. Call sites never compare
/// statuses or read the threshold themselves; the total must be recomputed
/// from the stored expense items, never taken from a cached client value.
pub fn next_status(current: DocStatus, total_amount: i64, role: Role) -> EngineResult<Approval> {
    if !role.is_approver() {
        return Err(EngineError::forbidden("approver role required"));
    }

    match current {
        DocStatus::Pending => {
            if total_amount < DIRECTOR_APPROVAL_THRESHOLD {
                // Either approver capability settles a small document alone.
                Ok(Approval {
                    status: DocStatus::Approved,
                    terminal: true,
                })
            } else {
                match role {
                    Role::Chairman => Ok(Approval {
                        status: DocStatus::ChairmanApproved,
                        terminal: false,
                    }),
                    _ => Err(EngineError::InvalidTransition(
                        "the chairman stage must be signed before director approval".into(),
                    )),
                }
            }
        }
        DocStatus::ChairmanApproved => match role {
            Role::Director => Ok(Approval {
                status: DocStatus::Approved,
                terminal: true,
            }),
            _ => Err(EngineError::InvalidTransition(
                "first stage already signed, director approval required".into(),
            )),
        },
        DocStatus::Approved => Err(EngineError::InvalidTransition(
            "document is already approved".into(),
        )),
        DocStatus::Rejected => Err(EngineError::InvalidTransition(
            "document was rejected".into(),
        )),
    }
}

/// Rejection is legal from pending or chairman_approved only.
pub fn ensure_can_reject(current: DocStatus, role: Role) -> EngineResult<()> {
    if !role.is_approver() {
        return Err(EngineError::forbidden("approver role required"));
    }
    match current {
        DocStatus::Pending | DocStatus::ChairmanApproved => Ok(()),
        _ => Err(EngineError::InvalidTransition(
            "only a pending or chairman-approved document can be rejected".into(),
        )),
    }
}

/// Edit never changes status and is reserved to the drafter while pending.
pub fn ensure_can_edit(current: DocStatus, drafter_id: u64, caller_id: u64) -> EngineResult<()> {
    if caller_id != drafter_id {
        return Err(EngineError::forbidden("only the drafter may edit"));
    }
    if current != DocStatus::Pending {
        return Err(EngineError::forbidden(
            "document is no longer pending and cannot be edited",
        ));
    }
    Ok(())
}

/// Drafters may remove their own pending drafts; approver-role callers may
/// delete a document in any status (the engine then rolls the ledger back).
pub fn ensure_can_delete(
    current: DocStatus,
    drafter_id: u64,
    caller_id: u64,
    role: Role,
) -> EngineResult<()> {
    if role.is_approver() {
        return Ok(());
    }
    if caller_id == drafter_id && current == DocStatus::Pending {
        return Ok(());
    }
    Err(EngineError::forbidden(
        "only the drafter of a pending document or an approver may delete",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_is_single_stage() {
        let a = next_status(DocStatus::Pending, 999_999, Role::Chairman).unwrap();
        assert_eq!(a.status, DocStatus::Approved);
        assert!(a.terminal);

        // The director settles small documents alone just the same.
        let a = next_status(DocStatus::Pending, 999_999, Role::Director).unwrap();
        assert!(a.terminal);
    }

    #[test]
    fn at_threshold_requires_two_stages() {
        let a = next_status(DocStatus::Pending, 1_000_000, Role::Chairman).unwrap();
        assert_eq!(a.status, DocStatus::ChairmanApproved);
        assert!(!a.terminal);

        let a = next_status(DocStatus::ChairmanApproved, 1_000_000, Role::Director).unwrap();
        assert_eq!(a.status, DocStatus::Approved);
        assert!(a.terminal);
    }

    #[test]
    fn director_cannot_skip_the_chairman_stage() {
        let err = next_status(DocStatus::Pending, 1_000_000, Role::Director).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition(_)));
    }

    #[test]
    fn chairman_cannot_sign_twice() {
        let err = next_status(DocStatus::ChairmanApproved, 2_000_000, Role::Chairman).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition(_)));
    }

    #[test]
    fn terminal_statuses_cannot_be_approved_again() {
        for status in [DocStatus::Approved, DocStatus::Rejected] {
            let err = next_status(status, 0, Role::Director).unwrap_err();
            assert!(matches!(err, EngineError::InvalidTransition(_)));
        }
    }

    #[test]
    fn non_approvers_are_forbidden() {
        for role in [Role::Staff, Role::Admin] {
            let err = next_status(DocStatus::Pending, 0, role).unwrap_err();
            assert!(matches!(err, EngineError::Forbidden(_)));
        }
    }

    #[test]
    fn reject_only_from_non_terminal_states() {
        assert!(ensure_can_reject(DocStatus::Pending, Role::Chairman).is_ok());
        assert!(ensure_can_reject(DocStatus::ChairmanApproved, Role::Director).is_ok());
        assert!(matches!(
            ensure_can_reject(DocStatus::Approved, Role::Director),
            Err(EngineError::InvalidTransition(_))
        ));
    }

    #[test]
    fn edit_is_drafter_only_and_pending_only() {
        assert!(ensure_can_edit(DocStatus::Pending, 10, 10).is_ok());
        assert!(matches!(
            ensure_can_edit(DocStatus::Pending, 10, 11),
            Err(EngineError::Forbidden(_))
        ));
        assert!(matches!(
            ensure_can_edit(DocStatus::Approved, 10, 10),
            Err(EngineError::Forbidden(_))
        ));
    }

    #[test]
    fn delete_rules() {
        // drafter, own pending draft
        assert!(ensure_can_delete(DocStatus::Pending, 10, 10, Role::Staff).is_ok());
        // drafter, already approved
        assert!(ensure_can_delete(DocStatus::Approved, 10, 10, Role::Staff).is_err());
        // approver may delete anything
        assert!(ensure_can_delete(DocStatus::Approved, 10, 99, Role::Director).is_ok());
        assert!(ensure_can_delete(DocStatus::Rejected, 10, 99, Role::Chairman).is_ok());
        // admin is not an approver
        assert!(ensure_can_delete(DocStatus::Approved, 10, 99, Role::Admin).is_err());
    }
}
