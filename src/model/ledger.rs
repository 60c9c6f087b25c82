use chrono::{DateTime, Utc};

/// Annual leave, tracked in days per user and year.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnualLeaveBalance {
    pub user_id: u64,
    pub year: i32,
    pub total_days: f64,
    pub used_days: f64,
    pub updated_at: DateTime<Utc>,
}

impl AnnualLeaveBalance {
    /// Negative when an administrative override created a deficit.
    pub fn remaining(&self) -> f64 {
        self.total_days - self.used_days
    }
}

/// Compensatory leave, tracked in hours. One entry per grant; entries from
/// approved overtime documents keep the link to their source document so
/// deleting the document can remove the grant.
#[derive(Debug, Clone, PartialEq)]
pub struct CompLeaveEntry {
    pub id: u64,
    pub user_id: u64,
    pub year: i32,
    pub document_id: Option<u64>,
    pub total_hours: f64,
    pub used_hours: f64,
    pub description: String,
    pub updated_at: DateTime<Utc>,
}

impl CompLeaveEntry {
    pub fn remaining(&self) -> f64 {
        self.total_hours - self.used_hours
    }
}
