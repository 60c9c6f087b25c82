//! sqlx/MySQL store. One database transaction per unit of work; rows the
//! engine intends to mutate are read `FOR UPDATE`, which serializes
//! concurrent transitions per document and per (user, year) ledger key.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::prelude::FromRow;
use sqlx::{MySql, MySqlPool, Transaction};
use std::str::FromStr;

use crate::error::{EngineError, EngineResult};
use crate::model::document::{
    AttendanceClaim, AttendanceType, DocStatus, Document, DocumentBody, ExpenseItem, LeaveType,
};
use crate::model::ledger::{AnnualLeaveBalance, CompLeaveEntry};
use crate::model::leave_request::LeaveRequest;
use crate::store::{Store, UnitOfWork};

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

struct MySqlUow {
    tx: Transaction<'static, MySql>,
}

/// Read-only fetch outside any transaction, for the reporting surface.
pub async fn fetch_document(pool: &MySqlPool, id: u64) -> EngineResult<Option<Document>> {
    let row = sqlx::query_as::<_, DocumentRow>(
        r#"
        SELECT id, doc_number, label_id, drafter_id, status, title, content,
               expense_items, attendance_type, leave_type, leave_start_date,
               leave_end_date, leave_days, extra_work_hours, is_private,
               rejected_reason, approver_id, created_at, updated_at, approved_at
        FROM documents
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(EngineError::from_sqlx)?;

    row.map(DocumentRow::into_document).transpose()
}

#[async_trait]
impl Store for MySqlStore {
    async fn begin(&self) -> EngineResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await.map_err(EngineError::from_sqlx)?;
        Ok(Box::new(MySqlUow { tx }))
    }
}

/// Flat persisted shape of a document. The tagged domain body is folded
/// into optional columns plus the `attendance_type` discriminant.
#[derive(FromRow)]
struct DocumentRow {
    id: u64,
    doc_number: String,
    label_id: u32,
    drafter_id: u64,
    status: String,
    title: String,
    content: String,
    expense_items: String,
    attendance_type: String,
    leave_type: Option<String>,
    leave_start_date: Option<NaiveDate>,
    leave_end_date: Option<NaiveDate>,
    leave_days: Option<f64>,
    extra_work_hours: Option<f64>,
    is_private: bool,
    rejected_reason: Option<String>,
    approver_id: Option<u64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    approved_at: Option<DateTime<Utc>>,
}

impl DocumentRow {
    fn into_document(self) -> EngineResult<Document> {
        let corrupt =
            |what: &str| EngineError::Storage(format!("corrupt document row {}: {}", self.id, what));

        let attendance_type = AttendanceType::from_str(&self.attendance_type)
            .map_err(|_| corrupt("unknown attendance_type"))?;

        let body = match attendance_type {
            AttendanceType::None => DocumentBody::Expense {
                items: serde_json::from_str(&self.expense_items)
                    .map_err(|_| corrupt("unreadable expense_items"))?,
            },
            AttendanceType::Overtime => DocumentBody::Attendance(AttendanceClaim::Overtime {
                extra_work_hours: self.extra_work_hours.ok_or_else(|| corrupt("missing hours"))?,
            }),
            AttendanceType::Leave => DocumentBody::Attendance(AttendanceClaim::Leave {
                leave_type: self
                    .leave_type
                    .as_deref()
                    .and_then(|s| LeaveType::from_str(s).ok())
                    .ok_or_else(|| corrupt("missing leave_type"))?,
                start_date: self
                    .leave_start_date
                    .ok_or_else(|| corrupt("missing leave_start_date"))?,
                end_date: self
                    .leave_end_date
                    .ok_or_else(|| corrupt("missing leave_end_date"))?,
                days: self.leave_days.ok_or_else(|| corrupt("missing leave_days"))?,
            }),
        };

        Ok(Document {
            id: self.id,
            doc_number: self.doc_number,
            label_id: self.label_id,
            drafter_id: self.drafter_id,
            status: DocStatus::from_str(&self.status).map_err(|_| corrupt("unknown status"))?,
            title: self.title,
            content: self.content,
            body,
            is_private: self.is_private,
            rejected_reason: self.rejected_reason,
            approver_id: self.approver_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            approved_at: self.approved_at,
        })
    }
}

/// Column values derived from the tagged body for the flat row.
struct BodyColumns {
    expense_items: String,
    attendance_type: String,
    leave_type: Option<String>,
    leave_start_date: Option<NaiveDate>,
    leave_end_date: Option<NaiveDate>,
    leave_days: Option<f64>,
    extra_work_hours: Option<f64>,
}

fn body_columns(doc: &Document) -> EngineResult<BodyColumns> {
    let items: &[ExpenseItem] = match &doc.body {
        DocumentBody::Expense { items } => items.as_slice(),
        DocumentBody::Attendance(_) => &[],
    };
    let mut cols = BodyColumns {
        expense_items: serde_json::to_string(items)
            .map_err(|e| EngineError::Storage(format!("expense items not serializable: {e}")))?,
        attendance_type: doc.attendance_type().to_string(),
        leave_type: None,
        leave_start_date: None,
        leave_end_date: None,
        leave_days: None,
        extra_work_hours: None,
    };
    match &doc.body {
        DocumentBody::Attendance(AttendanceClaim::Overtime { extra_work_hours }) => {
            cols.extra_work_hours = Some(*extra_work_hours);
        }
        DocumentBody::Attendance(AttendanceClaim::Leave {
            leave_type,
            start_date,
            end_date,
            days,
        }) => {
            cols.leave_type = Some(leave_type.to_string());
            cols.leave_start_date = Some(*start_date);
            cols.leave_end_date = Some(*end_date);
            cols.leave_days = Some(*days);
        }
        DocumentBody::Expense { .. } => {}
    }
    Ok(cols)
}

#[derive(FromRow)]
struct AnnualRow {
    user_id: u64,
    year: i32,
    total_days: f64,
    used_days: f64,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct CompRow {
    id: u64,
    user_id: u64,
    year: i32,
    document_id: Option<u64>,
    total_hours: f64,
    used_hours: f64,
    description: String,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct LeaveRequestRow {
    id: u64,
    user_id: u64,
    leave_type: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    days: f64,
    status: String,
    approved_by: Option<u64>,
    rejected_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl UnitOfWork for MySqlUow {
    async fn find_document(&mut self, id: u64) -> EngineResult<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, doc_number, label_id, drafter_id, status, title, content,
                   expense_items, attendance_type, leave_type, leave_start_date,
                   leave_end_date, leave_days, extra_work_hours, is_private,
                   rejected_reason, approver_id, created_at, updated_at, approved_at
            FROM documents
            WHERE id = ?
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(EngineError::from_sqlx)?;

        row.map(DocumentRow::into_document).transpose()
    }

    async fn insert_document(&mut self, doc: &Document) -> EngineResult<u64> {
        let cols = body_columns(doc)?;
        let result = sqlx::query(
            r#"
            INSERT INTO documents
                (doc_number, label_id, drafter_id, status, title, content,
                 expense_items, total_amount, attendance_type, leave_type,
                 leave_start_date, leave_end_date, leave_days, extra_work_hours,
                 is_private, rejected_reason, approver_id, created_at, updated_at,
                 approved_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.doc_number)
        .bind(doc.label_id)
        .bind(doc.drafter_id)
        .bind(doc.status.to_string())
        .bind(&doc.title)
        .bind(&doc.content)
        .bind(&cols.expense_items)
        .bind(doc.total_amount())
        .bind(&cols.attendance_type)
        .bind(&cols.leave_type)
        .bind(cols.leave_start_date)
        .bind(cols.leave_end_date)
        .bind(cols.leave_days)
        .bind(cols.extra_work_hours)
        .bind(doc.is_private)
        .bind(&doc.rejected_reason)
        .bind(doc.approver_id)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .bind(doc.approved_at)
        .execute(&mut *self.tx)
        .await
        .map_err(EngineError::from_sqlx)?;

        Ok(result.last_insert_id())
    }

    async fn update_document(&mut self, doc: &Document) -> EngineResult<()> {
        let cols = body_columns(doc)?;
        sqlx::query(
            r#"
            UPDATE documents
            SET status = ?, title = ?, content = ?, expense_items = ?,
                total_amount = ?, attendance_type = ?, leave_type = ?,
                leave_start_date = ?, leave_end_date = ?, leave_days = ?,
                extra_work_hours = ?, is_private = ?, rejected_reason = ?,
                approver_id = ?, updated_at = ?, approved_at = ?
            WHERE id = ?
            "#,
        )
        .bind(doc.status.to_string())
        .bind(&doc.title)
        .bind(&doc.content)
        .bind(&cols.expense_items)
        .bind(doc.total_amount())
        .bind(&cols.attendance_type)
        .bind(&cols.leave_type)
        .bind(cols.leave_start_date)
        .bind(cols.leave_end_date)
        .bind(cols.leave_days)
        .bind(cols.extra_work_hours)
        .bind(doc.is_private)
        .bind(&doc.rejected_reason)
        .bind(doc.approver_id)
        .bind(doc.updated_at)
        .bind(doc.approved_at)
        .bind(doc.id)
        .execute(&mut *self.tx)
        .await
        .map_err(EngineError::from_sqlx)?;
        Ok(())
    }

    async fn delete_document(&mut self, id: u64) -> EngineResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(EngineError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn next_doc_seq(&mut self, date: NaiveDate) -> EngineResult<u32> {
        // The upsert takes the row lock, so concurrent submitters queue
        // here instead of racing a count query.
        sqlx::query(
            r#"
            INSERT INTO doc_sequences (seq_date, next_seq)
            VALUES (?, 1)
            ON DUPLICATE KEY UPDATE next_seq = next_seq + 1
            "#,
        )
        .bind(date)
        .execute(&mut *self.tx)
        .await
        .map_err(EngineError::from_sqlx)?;

        sqlx::query_scalar::<_, u32>("SELECT next_seq FROM doc_sequences WHERE seq_date = ?")
            .bind(date)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(EngineError::from_sqlx)
    }

    async fn find_annual_balance(
        &mut self,
        user_id: u64,
        year: i32,
    ) -> EngineResult<Option<AnnualLeaveBalance>> {
        let row = sqlx::query_as::<_, AnnualRow>(
            r#"
            SELECT user_id, year, total_days, used_days, updated_at
            FROM annual_leave_balances
            WHERE user_id = ? AND year = ?
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(year)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(EngineError::from_sqlx)?;

        Ok(row.map(|r| AnnualLeaveBalance {
            user_id: r.user_id,
            year: r.year,
            total_days: r.total_days,
            used_days: r.used_days,
            updated_at: r.updated_at,
        }))
    }

    async fn upsert_annual_balance(&mut self, balance: &AnnualLeaveBalance) -> EngineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO annual_leave_balances (user_id, year, total_days, used_days, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE total_days = ?, used_days = ?, updated_at = ?
            "#,
        )
        .bind(balance.user_id)
        .bind(balance.year)
        .bind(balance.total_days)
        .bind(balance.used_days)
        .bind(balance.updated_at)
        .bind(balance.total_days)
        .bind(balance.used_days)
        .bind(balance.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(EngineError::from_sqlx)?;
        Ok(())
    }

    async fn comp_entries(
        &mut self,
        user_id: u64,
        year: i32,
    ) -> EngineResult<Vec<CompLeaveEntry>> {
        let rows = sqlx::query_as::<_, CompRow>(
            r#"
            SELECT id, user_id, year, document_id, total_hours, used_hours,
                   description, updated_at
            FROM comp_leave_balances
            WHERE user_id = ? AND year = ?
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(year)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(EngineError::from_sqlx)?;

        Ok(rows
            .into_iter()
            .map(|r| CompLeaveEntry {
                id: r.id,
                user_id: r.user_id,
                year: r.year,
                document_id: r.document_id,
                total_hours: r.total_hours,
                used_hours: r.used_hours,
                description: r.description,
                updated_at: r.updated_at,
            })
            .collect())
    }

    async fn insert_comp_entry(&mut self, entry: &CompLeaveEntry) -> EngineResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO comp_leave_balances
                (user_id, year, document_id, total_hours, used_hours, description, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.year)
        .bind(entry.document_id)
        .bind(entry.total_hours)
        .bind(entry.used_hours)
        .bind(&entry.description)
        .bind(entry.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(EngineError::from_sqlx)?;
        Ok(result.last_insert_id())
    }

    async fn update_comp_entry(&mut self, entry: &CompLeaveEntry) -> EngineResult<()> {
        sqlx::query(
            r#"
            UPDATE comp_leave_balances
            SET total_hours = ?, used_hours = ?, description = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(entry.total_hours)
        .bind(entry.used_hours)
        .bind(&entry.description)
        .bind(entry.updated_at)
        .bind(entry.id)
        .execute(&mut *self.tx)
        .await
        .map_err(EngineError::from_sqlx)?;
        Ok(())
    }

    async fn delete_comp_entries_for_document(&mut self, document_id: u64) -> EngineResult<u64> {
        let result = sqlx::query("DELETE FROM comp_leave_balances WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *self.tx)
            .await
            .map_err(EngineError::from_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn find_leave_request(&mut self, id: u64) -> EngineResult<Option<LeaveRequest>> {
        let row = sqlx::query_as::<_, LeaveRequestRow>(
            r#"
            SELECT id, user_id, leave_type, start_date, end_date, days, status,
                   approved_by, rejected_reason, created_at, updated_at
            FROM leave_requests
            WHERE id = ?
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(EngineError::from_sqlx)?;

        row.map(|r| {
            let corrupt = |what: &str| {
                EngineError::Storage(format!("corrupt leave request row {}: {}", r.id, what))
            };
            Ok(LeaveRequest {
                id: r.id,
                user_id: r.user_id,
                leave_type: LeaveType::from_str(&r.leave_type)
                    .map_err(|_| corrupt("unknown leave_type"))?,
                start_date: r.start_date,
                end_date: r.end_date,
                days: r.days,
                status: DocStatus::from_str(&r.status).map_err(|_| corrupt("unknown status"))?,
                approved_by: r.approved_by,
                rejected_reason: r.rejected_reason,
                created_at: r.created_at,
                updated_at: r.updated_at,
            })
        })
        .transpose()
    }

    async fn insert_leave_request(&mut self, req: &LeaveRequest) -> EngineResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (user_id, leave_type, start_date, end_date, days, status,
                 approved_by, rejected_reason, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(req.user_id)
        .bind(req.leave_type.to_string())
        .bind(req.start_date)
        .bind(req.end_date)
        .bind(req.days)
        .bind(req.status.to_string())
        .bind(req.approved_by)
        .bind(&req.rejected_reason)
        .bind(req.created_at)
        .bind(req.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(EngineError::from_sqlx)?;
        Ok(result.last_insert_id())
    }

    async fn update_leave_request(&mut self, req: &LeaveRequest) -> EngineResult<()> {
        sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = ?, approved_by = ?, rejected_reason = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(req.status.to_string())
        .bind(req.approved_by)
        .bind(&req.rejected_reason)
        .bind(req.updated_at)
        .bind(req.id)
        .execute(&mut *self.tx)
        .await
        .map_err(EngineError::from_sqlx)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> EngineResult<()> {
        self.tx.commit().await.map_err(EngineError::from_sqlx)
    }
}
