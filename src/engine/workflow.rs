use chrono::{Datelike, Local, NaiveDate, Utc};
use tracing::info;

use crate::engine::{ledger, leave, policy};
use crate::error::{EngineError, EngineResult};
use crate::model::document::{
    AttendanceClaim, DocStatus, Document, DocumentBody, ExpenseItem, LeaveType,
};
use crate::model::ledger::AnnualLeaveBalance;
use crate::model::leave_request::LeaveRequest;
use crate::model::role::Role;
use crate::store::{Store, UnitOfWork};

/// Who is calling. Built at the HTTP boundary from the verified token;
/// the engine never reads ambient session state.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub user_id: u64,
    pub role: Role,
}

/// Submission input before validation and derivation.
#[derive(Debug, Clone)]
pub struct DocumentDraft {
    pub label_id: u32,
    pub title: String,
    pub content: String,
    pub is_private: bool,
    pub payload: DraftPayload,
}

#[derive(Debug, Clone)]
pub enum DraftPayload {
    Expense {
        items: Vec<ExpenseItem>,
    },
    Overtime {
        extra_work_hours: f64,
    },
    Leave {
        leave_type: LeaveType,
        start_date: NaiveDate,
        /// Defaults to the start date when absent.
        end_date: Option<NaiveDate>,
    },
}

/// Partial edit of a pending document. `payload` replaces the whole claim
/// and must keep the document's kind.
#[derive(Debug, Clone, Default)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_private: Option<bool>,
    pub payload: Option<DraftPayload>,
}

/// Input for the plain leave-request flow.
#[derive(Debug, Clone)]
pub struct LeaveDraft {
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

/// Orchestrates document lifecycles and their ledger side effects.
///
/// Every public operation opens exactly one unit of work against the store
/// and commits it at the end; any error before that point rolls the whole
/// operation back, so a ledger write never lands without its status change.
pub struct WorkflowEngine<S> {
    store: S,
    attendance_label_id: u32,
    default_annual_days: f64,
}

impl<S: Store> WorkflowEngine<S> {
    pub fn new(store: S, attendance_label_id: u32, default_annual_days: f64) -> Self {
        Self {
            store,
            attendance_label_id,
            default_annual_days,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validates a draft, assigns the day-scoped document number and writes
    /// the pending document.
    pub async fn submit(&self, draft: DocumentDraft, caller: &Caller) -> EngineResult<Document> {
        if draft.title.trim().is_empty() {
            return Err(EngineError::validation("title is required"));
        }

        let mut uow = self.store.begin().await?;
        let body = self
            .validated_body(uow.as_mut(), &draft.payload, draft.label_id, caller.user_id)
            .await?;

        let now = Utc::now();
        // Document numbers restart at local midnight.
        let today = Local::now().date_naive();
        let seq = uow.next_doc_seq(today).await?;

        let mut doc = Document {
            id: 0,
            doc_number: format!("{}-{}", today.format("%Y/%m/%d"), seq),
            label_id: draft.label_id,
            drafter_id: caller.user_id,
            status: DocStatus::Pending,
            title: draft.title,
            content: draft.content,
            body,
            is_private: draft.is_private,
            rejected_reason: None,
            approver_id: None,
            created_at: now,
            updated_at: now,
            approved_at: None,
        };
        doc.id = uow.insert_document(&doc).await?;
        uow.commit().await?;

        info!(doc_id = doc.id, doc_number = %doc.doc_number, "document submitted");
        Ok(doc)
    }

    /// Edits a pending document in place. Only the drafter may edit, the
    /// status never changes, and leave days and balances are re-validated
    /// exactly as on submit.
    pub async fn edit(
        &self,
        id: u64,
        patch: DocumentPatch,
        caller: &Caller,
    ) -> EngineResult<Document> {
        let mut uow = self.store.begin().await?;
        let mut doc = uow
            .find_document(id)
            .await?
            .ok_or(EngineError::NotFound("document"))?;

        policy::ensure_can_edit(doc.status, doc.drafter_id, caller.user_id)?;

        if let Some(title) = patch.title {
            if title.trim().is_empty() {
                return Err(EngineError::validation("title is required"));
            }
            doc.title = title;
        }
        if let Some(content) = patch.content {
            doc.content = content;
        }
        if let Some(is_private) = patch.is_private {
            doc.is_private = is_private;
        }
        if let Some(payload) = patch.payload {
            let same_kind = matches!(
                (&doc.body, &payload),
                (DocumentBody::Expense { .. }, DraftPayload::Expense { .. })
                    | (DocumentBody::Attendance(_), DraftPayload::Overtime { .. })
                    | (DocumentBody::Attendance(_), DraftPayload::Leave { .. })
            );
            if !same_kind {
                return Err(EngineError::validation("document kind cannot be changed"));
            }
            doc.body = self
                .validated_body(uow.as_mut(), &payload, doc.label_id, doc.drafter_id)
                .await?;
        }

        doc.updated_at = Utc::now();
        uow.update_document(&doc).await?;
        uow.commit().await?;
        Ok(doc)
    }

    /// Advances a document along its approval path. On the transition into
    /// `approved` the matching ledger side effect runs in the same unit of
    /// work; a second approval call finds a terminal status and fails before
    /// any ledger read, so the side effect can never fire twice.
    pub async fn approve(&self, id: u64, caller: &Caller) -> EngineResult<Document> {
        let mut uow = self.store.begin().await?;
        let mut doc = uow
            .find_document(id)
            .await?
            .ok_or(EngineError::NotFound("document"))?;

        // The authoritative total comes from the stored items, never from
        // anything the client sent along.
        let approval = policy::next_status(doc.status, doc.total_amount(), caller.role)?;

        let now = Utc::now();
        doc.status = approval.status;
        doc.approver_id = Some(caller.user_id);
        doc.updated_at = now;

        if approval.terminal {
            doc.approved_at = Some(now);
            self.apply_ledger_effect(uow.as_mut(), &doc).await?;
        }

        uow.update_document(&doc).await?;
        uow.commit().await?;

        info!(
            doc_id = doc.id,
            status = %doc.status,
            approver_id = caller.user_id,
            "document approval recorded"
        );
        Ok(doc)
    }

    /// Rejects a pending or chairman-approved document. No ledger effect:
    /// a document that never reached `approved` never touched the ledger.
    pub async fn reject(&self, id: u64, reason: &str, caller: &Caller) -> EngineResult<Document> {
        if reason.trim().is_empty() {
            return Err(EngineError::validation("a rejection reason is required"));
        }

        let mut uow = self.store.begin().await?;
        let mut doc = uow
            .find_document(id)
            .await?
            .ok_or(EngineError::NotFound("document"))?;

        policy::ensure_can_reject(doc.status, caller.role)?;

        doc.status = DocStatus::Rejected;
        doc.rejected_reason = Some(reason.trim().to_string());
        doc.approver_id = Some(caller.user_id);
        doc.updated_at = Utc::now();

        uow.update_document(&doc).await?;
        uow.commit().await?;

        info!(doc_id = doc.id, "document rejected");
        Ok(doc)
    }

    /// Deletes a document. If it was approved with a ledger effect, the
    /// matching rollback runs in the same unit of work: deducted days or
    /// hours are restored, granted hours are removed with their grant rows.
    pub async fn delete(&self, id: u64, caller: &Caller) -> EngineResult<()> {
        let mut uow = self.store.begin().await?;
        let doc = uow
            .find_document(id)
            .await?
            .ok_or(EngineError::NotFound("document"))?;

        policy::ensure_can_delete(doc.status, doc.drafter_id, caller.user_id, caller.role)?;

        if doc.status == DocStatus::Approved {
            self.revert_ledger_effect(uow.as_mut(), &doc).await?;
        }

        uow.delete_document(id).await?;
        uow.commit().await?;

        info!(doc_id = id, caller_id = caller.user_id, "document deleted");
        Ok(())
    }

    /// Submits a plain leave request with days precomputed and the balance
    /// pre-checked, mirroring the attendance-document rules.
    pub async fn submit_leave(
        &self,
        draft: LeaveDraft,
        caller: &Caller,
    ) -> EngineResult<LeaveRequest> {
        let end_date = draft.end_date.unwrap_or(draft.start_date);
        let days = leave::leave_days(draft.leave_type, draft.start_date, end_date)?;

        let mut uow = self.store.begin().await?;
        self.check_leave_balance(
            uow.as_mut(),
            caller.user_id,
            draft.leave_type,
            draft.start_date,
            days,
        )
        .await?;

        let now = Utc::now();
        let mut req = LeaveRequest {
            id: 0,
            user_id: caller.user_id,
            leave_type: draft.leave_type,
            start_date: draft.start_date,
            end_date,
            days,
            status: DocStatus::Pending,
            approved_by: None,
            rejected_reason: None,
            created_at: now,
            updated_at: now,
        };
        req.id = uow.insert_leave_request(&req).await?;
        uow.commit().await?;

        info!(leave_id = req.id, user_id = req.user_id, "leave request submitted");
        Ok(req)
    }

    /// Approves a leave request and deducts the ledger in the same unit of
    /// work. Leave requests carry no money, so the single-stage path always
    /// applies.
    pub async fn approve_leave(&self, id: u64, caller: &Caller) -> EngineResult<LeaveRequest> {
        let mut uow = self.store.begin().await?;
        let mut req = uow
            .find_leave_request(id)
            .await?
            .ok_or(EngineError::NotFound("leave request"))?;

        let approval = policy::next_status(req.status, 0, caller.role)?;

        let year = req.start_date.year();
        if req.leave_type == LeaveType::Comp {
            ledger::deduct_comp(uow.as_mut(), req.user_id, year, leave::comp_hours(req.days))
                .await?;
        } else {
            ledger::deduct_annual(
                uow.as_mut(),
                req.user_id,
                year,
                req.days,
                self.default_annual_days,
            )
            .await?;
        }

        req.status = approval.status;
        req.approved_by = Some(caller.user_id);
        req.updated_at = Utc::now();
        uow.update_leave_request(&req).await?;
        uow.commit().await?;

        info!(leave_id = req.id, approver_id = caller.user_id, "leave request approved");
        Ok(req)
    }

    pub async fn reject_leave(
        &self,
        id: u64,
        reason: &str,
        caller: &Caller,
    ) -> EngineResult<LeaveRequest> {
        if reason.trim().is_empty() {
            return Err(EngineError::validation("a rejection reason is required"));
        }

        let mut uow = self.store.begin().await?;
        let mut req = uow
            .find_leave_request(id)
            .await?
            .ok_or(EngineError::NotFound("leave request"))?;

        policy::ensure_can_reject(req.status, caller.role)?;

        req.status = DocStatus::Rejected;
        req.rejected_reason = Some(reason.trim().to_string());
        req.updated_at = Utc::now();
        uow.update_leave_request(&req).await?;
        uow.commit().await?;
        Ok(req)
    }

    /// Administrative override of a user's annual total for a year.
    pub async fn set_annual_total(
        &self,
        user_id: u64,
        year: i32,
        total_days: f64,
        caller: &Caller,
    ) -> EngineResult<AnnualLeaveBalance> {
        if caller.role != Role::Admin {
            return Err(EngineError::forbidden("admin only"));
        }
        if total_days < 0.0 {
            return Err(EngineError::validation("total_days cannot be negative"));
        }

        let mut uow = self.store.begin().await?;
        let balance = ledger::set_annual_total(uow.as_mut(), user_id, year, total_days).await?;
        uow.commit().await?;

        info!(user_id, year, total_days, "annual total overridden");
        Ok(balance)
    }

    /// Turns a raw payload into a validated document body, computing leave
    /// days and pre-checking balances. Attendance claims must carry the
    /// attendance label; expense items must be non-negative.
    async fn validated_body(
        &self,
        uow: &mut dyn UnitOfWork,
        payload: &DraftPayload,
        label_id: u32,
        drafter_id: u64,
    ) -> EngineResult<DocumentBody> {
        match payload {
            DraftPayload::Expense { items } => {
                if items.iter().any(|i| i.amount < 0) {
                    return Err(EngineError::validation(
                        "expense amounts cannot be negative",
                    ));
                }
                Ok(DocumentBody::Expense {
                    items: items.clone(),
                })
            }
            DraftPayload::Overtime { extra_work_hours } => {
                self.ensure_attendance_label(label_id)?;
                if *extra_work_hours < 0.0 {
                    return Err(EngineError::validation(
                        "extra_work_hours cannot be negative",
                    ));
                }
                Ok(DocumentBody::Attendance(AttendanceClaim::Overtime {
                    extra_work_hours: *extra_work_hours,
                }))
            }
            DraftPayload::Leave {
                leave_type,
                start_date,
                end_date,
            } => {
                self.ensure_attendance_label(label_id)?;
                let end_date = end_date.unwrap_or(*start_date);
                let days = leave::leave_days(*leave_type, *start_date, end_date)?;
                self.check_leave_balance(uow, drafter_id, *leave_type, *start_date, days)
                    .await?;
                Ok(DocumentBody::Attendance(AttendanceClaim::Leave {
                    leave_type: *leave_type,
                    start_date: *start_date,
                    end_date,
                    days,
                }))
            }
        }
    }

    fn ensure_attendance_label(&self, label_id: u32) -> EngineResult<()> {
        if label_id != self.attendance_label_id {
            return Err(EngineError::validation(
                "attendance claims must use the attendance label",
            ));
        }
        Ok(())
    }

    /// Submit-time pre-check. The deduction at approval re-checks under the
    /// row lock; this one exists to reject hopeless drafts early.
    async fn check_leave_balance(
        &self,
        uow: &mut dyn UnitOfWork,
        user_id: u64,
        leave_type: LeaveType,
        start_date: NaiveDate,
        days: f64,
    ) -> EngineResult<()> {
        let year = start_date.year();
        if leave_type == LeaveType::Comp {
            let remaining = ledger::remaining_comp(uow, user_id, year).await?;
            let needed = leave::comp_hours(days);
            if remaining < needed {
                return Err(EngineError::InsufficientBalance(format!(
                    "{} comp hours remaining, {} requested",
                    remaining, needed
                )));
            }
        } else {
            let remaining =
                ledger::remaining_annual(uow, user_id, year, self.default_annual_days).await?;
            if remaining < days {
                return Err(EngineError::InsufficientBalance(format!(
                    "{} annual days remaining, {} requested",
                    remaining, days
                )));
            }
        }
        Ok(())
    }

    /// The one place ledger side effects fire. Exactly one branch applies
    /// per document, on the transition into `approved` only.
    async fn apply_ledger_effect(
        &self,
        uow: &mut dyn UnitOfWork,
        doc: &Document,
    ) -> EngineResult<()> {
        match &doc.body {
            DocumentBody::Attendance(AttendanceClaim::Leave {
                leave_type,
                start_date,
                days,
                ..
            }) => {
                let year = start_date.year();
                if *leave_type == LeaveType::Comp {
                    ledger::deduct_comp(uow, doc.drafter_id, year, leave::comp_hours(*days))
                        .await?;
                } else {
                    ledger::deduct_annual(
                        uow,
                        doc.drafter_id,
                        year,
                        *days,
                        self.default_annual_days,
                    )
                    .await?;
                }
            }
            DocumentBody::Attendance(AttendanceClaim::Overtime { extra_work_hours })
                if *extra_work_hours > 0.0 =>
            {
                // A grant, not a consumption: approved overtime creates
                // spendable comp hours linked to this document.
                ledger::grant_comp(
                    uow,
                    doc.drafter_id,
                    doc.approved_at.unwrap_or_else(Utc::now).year(),
                    *extra_work_hours,
                    Some(doc.id),
                    doc.title.clone(),
                )
                .await?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Inverse of `apply_ledger_effect`, run when an approved document is
    /// deleted.
    async fn revert_ledger_effect(
        &self,
        uow: &mut dyn UnitOfWork,
        doc: &Document,
    ) -> EngineResult<()> {
        match &doc.body {
            DocumentBody::Attendance(AttendanceClaim::Leave {
                leave_type,
                start_date,
                days,
                ..
            }) => {
                let year = start_date.year();
                if *leave_type == LeaveType::Comp {
                    ledger::restore_comp(uow, doc.drafter_id, year, leave::comp_hours(*days))
                        .await?;
                } else {
                    ledger::restore_annual(uow, doc.drafter_id, year, *days).await?;
                }
            }
            DocumentBody::Attendance(AttendanceClaim::Overtime { extra_work_hours })
                if *extra_work_hours > 0.0 =>
            {
                uow.delete_comp_entries_for_document(doc.id).await?;
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    const ATTENDANCE_LABEL: u32 = 1;
    const EXPENSE_LABEL: u32 = 2;

    fn engine() -> WorkflowEngine<MemoryStore> {
        WorkflowEngine::new(MemoryStore::new(), ATTENDANCE_LABEL, 15.0)
    }

    fn staff() -> Caller {
        Caller {
            user_id: 10,
            role: Role::Staff,
        }
    }

    fn chairman() -> Caller {
        Caller {
            user_id: 2,
            role: Role::Chairman,
        }
    }

    fn director() -> Caller {
        Caller {
            user_id: 3,
            role: Role::Director,
        }
    }

    fn admin() -> Caller {
        Caller {
            user_id: 1,
            role: Role::Admin,
        }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn expense_draft(amounts: &[i64]) -> DocumentDraft {
        DocumentDraft {
            label_id: EXPENSE_LABEL,
            title: "office expenses".into(),
            content: String::new(),
            is_private: false,
            payload: DraftPayload::Expense {
                items: amounts
                    .iter()
                    .map(|&amount| ExpenseItem {
                        item: "item".into(),
                        category: "supplies".into(),
                        vendor: "vendor".into(),
                        amount,
                        note: String::new(),
                    })
                    .collect(),
            },
        }
    }

    fn full_leave_draft(start: &str, end: &str) -> DocumentDraft {
        DocumentDraft {
            label_id: ATTENDANCE_LABEL,
            title: "annual leave".into(),
            content: String::new(),
            is_private: false,
            payload: DraftPayload::Leave {
                leave_type: LeaveType::Full,
                start_date: d(start),
                end_date: Some(d(end)),
            },
        }
    }

    fn overtime_draft(hours: f64) -> DocumentDraft {
        DocumentDraft {
            label_id: ATTENDANCE_LABEL,
            title: "weekend deployment".into(),
            content: String::new(),
            is_private: false,
            payload: DraftPayload::Overtime {
                extra_work_hours: hours,
            },
        }
    }

    async fn annual_balance(
        engine: &WorkflowEngine<MemoryStore>,
        user_id: u64,
        year: i32,
    ) -> Option<AnnualLeaveBalance> {
        let mut uow = engine.store().begin().await.unwrap();
        uow.find_annual_balance(user_id, year).await.unwrap()
    }

    #[actix_web::test]
    async fn approved_full_leave_deducts_annual_days() {
        let engine = engine();
        let doc = engine
            .submit(full_leave_draft("2025-03-10", "2025-03-12"), &staff())
            .await
            .unwrap();

        match &doc.body {
            DocumentBody::Attendance(AttendanceClaim::Leave { days, .. }) => {
                assert_eq!(*days, 3.0)
            }
            other => panic!("unexpected body: {other:?}"),
        }

        let doc = engine.approve(doc.id, &chairman()).await.unwrap();
        assert_eq!(doc.status, DocStatus::Approved);
        assert!(doc.approved_at.is_some());

        let balance = annual_balance(&engine, 10, 2025).await.unwrap();
        assert_eq!(balance.total_days, 15.0);
        assert_eq!(balance.used_days, 3.0);
    }

    #[actix_web::test]
    async fn approved_overtime_grants_comp_hours() {
        let engine = engine();
        let doc = engine.submit(overtime_draft(16.0), &staff()).await.unwrap();
        let doc = engine.approve(doc.id, &director()).await.unwrap();

        let year = doc.approved_at.unwrap().year();
        let mut uow = engine.store().begin().await.unwrap();
        let entries = uow.comp_entries(10, year).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].total_hours, 16.0);
        assert_eq!(entries[0].used_hours, 0.0);
        assert_eq!(entries[0].document_id, Some(doc.id));
    }

    #[actix_web::test]
    async fn threshold_boundary_selects_the_path() {
        let engine = engine();

        // 999,999 settles in one step
        let doc = engine
            .submit(expense_draft(&[999_999]), &staff())
            .await
            .unwrap();
        let doc = engine.approve(doc.id, &chairman()).await.unwrap();
        assert_eq!(doc.status, DocStatus::Approved);

        // 1,000,000 takes both stages
        let doc = engine
            .submit(expense_draft(&[600_000, 400_000]), &staff())
            .await
            .unwrap();

        let err = engine.approve(doc.id, &director()).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition(_)));

        let doc = engine.approve(doc.id, &chairman()).await.unwrap();
        assert_eq!(doc.status, DocStatus::ChairmanApproved);
        assert!(doc.approved_at.is_none());

        let doc = engine.approve(doc.id, &director()).await.unwrap();
        assert_eq!(doc.status, DocStatus::Approved);
    }

    #[actix_web::test]
    async fn second_approval_fails_without_double_deduction() {
        let engine = engine();
        let doc = engine
            .submit(full_leave_draft("2025-03-10", "2025-03-12"), &staff())
            .await
            .unwrap();
        engine.approve(doc.id, &chairman()).await.unwrap();

        let err = engine.approve(doc.id, &chairman()).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition(_)));

        let balance = annual_balance(&engine, 10, 2025).await.unwrap();
        assert_eq!(balance.used_days, 3.0);
    }

    #[actix_web::test]
    async fn delete_of_approved_leave_restores_the_balance() {
        let engine = engine();
        let doc = engine
            .submit(full_leave_draft("2025-03-10", "2025-03-12"), &staff())
            .await
            .unwrap();
        engine.approve(doc.id, &chairman()).await.unwrap();
        engine.delete(doc.id, &director()).await.unwrap();

        // balance is exactly what it was before the submit
        let balance = annual_balance(&engine, 10, 2025).await.unwrap();
        assert_eq!(balance.used_days, 0.0);

        let mut uow = engine.store().begin().await.unwrap();
        assert!(uow.find_document(doc.id).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn delete_of_approved_overtime_removes_the_grant() {
        let engine = engine();
        let doc = engine.submit(overtime_draft(16.0), &staff()).await.unwrap();
        let doc = engine.approve(doc.id, &chairman()).await.unwrap();
        let year = doc.approved_at.unwrap().year();

        engine.delete(doc.id, &chairman()).await.unwrap();

        let mut uow = engine.store().begin().await.unwrap();
        assert!(uow.comp_entries(10, year).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn comp_leave_consumes_granted_hours() {
        let engine = engine();

        // grant 16 comp hours through an approved overtime document
        let grant = engine.submit(overtime_draft(16.0), &staff()).await.unwrap();
        let grant = engine.approve(grant.id, &chairman()).await.unwrap();
        let year = grant.approved_at.unwrap().year();

        // a two-day comp leave inside the same year consumes all of it
        let start = NaiveDate::from_ymd_opt(year, 11, 3).unwrap();
        let end = NaiveDate::from_ymd_opt(year, 11, 4).unwrap();
        let doc = engine
            .submit(
                DocumentDraft {
                    label_id: ATTENDANCE_LABEL,
                    title: "comp leave".into(),
                    content: String::new(),
                    is_private: false,
                    payload: DraftPayload::Leave {
                        leave_type: LeaveType::Comp,
                        start_date: start,
                        end_date: Some(end),
                    },
                },
                &staff(),
            )
            .await
            .unwrap();
        engine.approve(doc.id, &director()).await.unwrap();

        let mut uow = engine.store().begin().await.unwrap();
        let entries = uow.comp_entries(10, year).await.unwrap();
        assert_eq!(entries[0].used_hours, 16.0);

        // annual balance was never touched
        drop(uow);
        assert!(annual_balance(&engine, 10, year).await.is_none());
    }

    #[actix_web::test]
    async fn comp_leave_without_grants_is_rejected_at_submit() {
        let engine = engine();
        let err = engine
            .submit(
                DocumentDraft {
                    label_id: ATTENDANCE_LABEL,
                    title: "comp leave".into(),
                    content: String::new(),
                    is_private: false,
                    payload: DraftPayload::Leave {
                        leave_type: LeaveType::Comp,
                        start_date: d("2025-11-03"),
                        end_date: None,
                    },
                },
                &staff(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientBalance(_)));
    }

    #[actix_web::test]
    async fn submit_rejects_leave_beyond_the_annual_balance() {
        let engine = engine();
        let err = engine
            .submit(full_leave_draft("2025-03-03", "2025-03-31"), &staff())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientBalance(_)));
    }

    #[actix_web::test]
    async fn rejecting_a_chairman_approved_document_keeps_the_ledger_clean() {
        let engine = engine();
        let doc = engine
            .submit(expense_draft(&[1_500_000]), &staff())
            .await
            .unwrap();
        engine.approve(doc.id, &chairman()).await.unwrap();

        let doc = engine.reject(doc.id, "예산 초과", &director()).await.unwrap();
        assert_eq!(doc.status, DocStatus::Rejected);
        assert_eq!(doc.rejected_reason.as_deref(), Some("예산 초과"));

        assert!(annual_balance(&engine, 10, 2025).await.is_none());
    }

    #[actix_web::test]
    async fn reject_requires_a_reason() {
        let engine = engine();
        let doc = engine
            .submit(expense_draft(&[10_000]), &staff())
            .await
            .unwrap();
        let err = engine.reject(doc.id, "  ", &chairman()).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[actix_web::test]
    async fn edit_after_approval_is_forbidden() {
        let engine = engine();
        let doc = engine
            .submit(expense_draft(&[10_000]), &staff())
            .await
            .unwrap();
        engine.approve(doc.id, &chairman()).await.unwrap();

        let err = engine
            .edit(
                doc.id,
                DocumentPatch {
                    title: Some("edited".into()),
                    ..Default::default()
                },
                &staff(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
    }

    #[actix_web::test]
    async fn edit_recomputes_leave_days() {
        let engine = engine();
        let doc = engine
            .submit(full_leave_draft("2025-03-10", "2025-03-12"), &staff())
            .await
            .unwrap();

        let doc = engine
            .edit(
                doc.id,
                DocumentPatch {
                    payload: Some(DraftPayload::Leave {
                        leave_type: LeaveType::HalfAm,
                        start_date: d("2025-03-10"),
                        end_date: None,
                    }),
                    ..Default::default()
                },
                &staff(),
            )
            .await
            .unwrap();

        match &doc.body {
            DocumentBody::Attendance(AttendanceClaim::Leave { days, .. }) => {
                assert_eq!(*days, 0.5)
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[actix_web::test]
    async fn edit_cannot_change_the_document_kind() {
        let engine = engine();
        let doc = engine
            .submit(expense_draft(&[10_000]), &staff())
            .await
            .unwrap();

        let err = engine
            .edit(
                doc.id,
                DocumentPatch {
                    payload: Some(DraftPayload::Overtime {
                        extra_work_hours: 4.0,
                    }),
                    ..Default::default()
                },
                &staff(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[actix_web::test]
    async fn attendance_claims_must_carry_the_attendance_label() {
        let engine = engine();
        let mut draft = overtime_draft(4.0);
        draft.label_id = EXPENSE_LABEL;

        let err = engine.submit(draft, &staff()).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[actix_web::test]
    async fn drafter_may_delete_own_pending_draft_only() {
        let engine = engine();
        let doc = engine
            .submit(expense_draft(&[10_000]), &staff())
            .await
            .unwrap();
        engine.delete(doc.id, &staff()).await.unwrap();

        let doc = engine
            .submit(expense_draft(&[10_000]), &staff())
            .await
            .unwrap();
        engine.approve(doc.id, &chairman()).await.unwrap();
        let err = engine.delete(doc.id, &staff()).await.unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
    }

    #[actix_web::test]
    async fn document_numbers_count_up_within_the_day() {
        let engine = engine();
        let first = engine
            .submit(expense_draft(&[1_000]), &staff())
            .await
            .unwrap();
        let second = engine
            .submit(expense_draft(&[2_000]), &staff())
            .await
            .unwrap();

        let prefix = Local::now().date_naive().format("%Y/%m/%d").to_string();
        assert_eq!(first.doc_number, format!("{prefix}-1"));
        assert_eq!(second.doc_number, format!("{prefix}-2"));
    }

    #[actix_web::test]
    async fn leave_request_flow_deducts_on_approval() {
        let engine = engine();
        let req = engine
            .submit_leave(
                LeaveDraft {
                    leave_type: LeaveType::Full,
                    start_date: d("2025-07-07"),
                    end_date: Some(d("2025-07-08")),
                },
                &staff(),
            )
            .await
            .unwrap();
        assert_eq!(req.days, 2.0);
        assert_eq!(req.status, DocStatus::Pending);

        let req = engine.approve_leave(req.id, &chairman()).await.unwrap();
        assert_eq!(req.status, DocStatus::Approved);
        assert_eq!(req.approved_by, Some(2));

        let balance = annual_balance(&engine, 10, 2025).await.unwrap();
        assert_eq!(balance.used_days, 2.0);

        // a second approval is rejected and deducts nothing further
        let err = engine.approve_leave(req.id, &chairman()).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition(_)));
        let balance = annual_balance(&engine, 10, 2025).await.unwrap();
        assert_eq!(balance.used_days, 2.0);
    }

    #[actix_web::test]
    async fn leave_request_rejection_needs_a_reason_and_skips_the_ledger() {
        let engine = engine();
        let req = engine
            .submit_leave(
                LeaveDraft {
                    leave_type: LeaveType::HalfPm,
                    start_date: d("2025-07-07"),
                    end_date: None,
                },
                &staff(),
            )
            .await
            .unwrap();

        let err = engine.reject_leave(req.id, "", &chairman()).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let req = engine
            .reject_leave(req.id, "staffing shortage that week", &chairman())
            .await
            .unwrap();
        assert_eq!(req.status, DocStatus::Rejected);
        assert!(annual_balance(&engine, 10, 2025).await.is_none());
    }

    #[actix_web::test]
    async fn set_annual_total_is_admin_only() {
        let engine = engine();
        let err = engine
            .set_annual_total(10, 2025, 20.0, &chairman())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));

        let balance = engine
            .set_annual_total(10, 2025, 20.0, &admin())
            .await
            .unwrap();
        assert_eq!(balance.total_days, 20.0);
    }
}
