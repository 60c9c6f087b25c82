use chrono::{DateTime, NaiveDate, Utc};

use super::document::{DocStatus, LeaveType};

/// The plain leave-request flow, separate from approval documents.
/// Days are computed once at submission and never recomputed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaveRequest {
    pub id: u64,
    pub user_id: u64,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: f64,
    pub status: DocStatus,
    pub approved_by: Option<u64>,
    pub rejected_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
