use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// Lifecycle status, shared with plain leave requests.
///
/// Transitions are decided exclusively by `engine::policy`; no call site
/// compares statuses on its own.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocStatus {
    Pending,
    ChairmanApproved,
    Approved,
    Rejected,
}

impl DocStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocStatus::Approved | DocStatus::Rejected)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveType {
    Full,
    HalfAm,
    HalfPm,
    #[serde(rename = "out_1h")]
    #[strum(serialize = "out_1h")]
    Out1h,
    #[serde(rename = "out_2h")]
    #[strum(serialize = "out_2h")]
    Out2h,
    #[serde(rename = "out_3h")]
    #[strum(serialize = "out_3h")]
    Out3h,
    Comp,
}

/// Flat-record discriminant kept for the persisted shape and list filters.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceType {
    None,
    Overtime,
    Leave,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExpenseItem {
    #[schema(example = "Toner cartridge")]
    pub item: String,
    #[schema(example = "office supplies")]
    pub category: String,
    #[schema(example = "OfficeDepot")]
    pub vendor: String,
    /// Non-negative amount in currency units.
    #[schema(example = 45000)]
    pub amount: i64,
    #[schema(example = "for the 2F printer")]
    pub note: String,
}

/// What a document claims, one kind per document.
///
/// The kind is explicit and each variant carries only its own fields; the
/// persisted row stays flat with an `attendance_type` discriminant.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentBody {
    Expense { items: Vec<ExpenseItem> },
    Attendance(AttendanceClaim),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttendanceClaim {
    Overtime {
        extra_work_hours: f64,
    },
    Leave {
        leave_type: LeaveType,
        start_date: NaiveDate,
        end_date: NaiveDate,
        /// Derived at submit/edit time from the leave type and date range.
        days: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: u64,
    /// Human-readable `{YYYY/MM/DD}-{N}`, assigned at creation, never reused.
    pub doc_number: String,
    pub label_id: u32,
    pub drafter_id: u64,
    pub status: DocStatus,
    pub title: String,
    pub content: String,
    pub body: DocumentBody,
    pub is_private: bool,
    pub rejected_reason: Option<String>,
    pub approver_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Sum of expense item amounts; attendance documents carry no money.
    pub fn total_amount(&self) -> i64 {
        match &self.body {
            DocumentBody::Expense { items } => items.iter().map(|i| i.amount).sum(),
            DocumentBody::Attendance(_) => 0,
        }
    }

    pub fn attendance_type(&self) -> AttendanceType {
        match &self.body {
            DocumentBody::Expense { .. } => AttendanceType::None,
            DocumentBody::Attendance(AttendanceClaim::Overtime { .. }) => AttendanceType::Overtime,
            DocumentBody::Attendance(AttendanceClaim::Leave { .. }) => AttendanceType::Leave,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_string_round_trip() {
        assert_eq!(DocStatus::ChairmanApproved.to_string(), "chairman_approved");
        assert_eq!(
            DocStatus::from_str("chairman_approved").unwrap(),
            DocStatus::ChairmanApproved
        );
        assert_eq!(DocStatus::from_str("pending").unwrap(), DocStatus::Pending);
    }

    #[test]
    fn out_leave_types_serialize_with_hour_suffix() {
        assert_eq!(LeaveType::Out1h.to_string(), "out_1h");
        assert_eq!(LeaveType::from_str("out_3h").unwrap(), LeaveType::Out3h);
        assert_eq!(LeaveType::HalfAm.to_string(), "half_am");
    }

    #[test]
    fn terminal_statuses() {
        assert!(DocStatus::Approved.is_terminal());
        assert!(DocStatus::Rejected.is_terminal());
        assert!(!DocStatus::Pending.is_terminal());
        assert!(!DocStatus::ChairmanApproved.is_terminal());
    }
}
