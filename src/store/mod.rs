pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::EngineResult;
use crate::model::document::Document;
use crate::model::ledger::{AnnualLeaveBalance, CompLeaveEntry};
use crate::model::leave_request::LeaveRequest;

/// Opens units of work. One unit of work per public engine operation.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn begin(&self) -> EngineResult<Box<dyn UnitOfWork>>;
}

/// A single atomic unit over the document, leave-request and ledger tables:
/// either every write lands at `commit`, or none do. Dropping a unit of
/// work without committing rolls everything back.
///
/// `find_*` reads acquire a write lock on the returned rows for the rest of
/// the unit, which serializes concurrent transitions on the same document
/// and concurrent mutations of the same (user, year) ledger key.
#[async_trait]
pub trait UnitOfWork: Send {
    // documents
    async fn find_document(&mut self, id: u64) -> EngineResult<Option<Document>>;
    /// Returns the id assigned by the store.
    async fn insert_document(&mut self, doc: &Document) -> EngineResult<u64>;
    async fn update_document(&mut self, doc: &Document) -> EngineResult<()>;
    async fn delete_document(&mut self, id: u64) -> EngineResult<bool>;
    /// Next value of the per-day document sequence, starting at 1.
    async fn next_doc_seq(&mut self, date: NaiveDate) -> EngineResult<u32>;

    // annual leave balances, keyed (user_id, year)
    async fn find_annual_balance(
        &mut self,
        user_id: u64,
        year: i32,
    ) -> EngineResult<Option<AnnualLeaveBalance>>;
    async fn upsert_annual_balance(&mut self, balance: &AnnualLeaveBalance) -> EngineResult<()>;

    // comp leave entries, keyed (user_id, year), one row per grant
    /// Entries in grant order (oldest first).
    async fn comp_entries(&mut self, user_id: u64, year: i32)
    -> EngineResult<Vec<CompLeaveEntry>>;
    async fn insert_comp_entry(&mut self, entry: &CompLeaveEntry) -> EngineResult<u64>;
    async fn update_comp_entry(&mut self, entry: &CompLeaveEntry) -> EngineResult<()>;
    /// Removes the grant rows sourced from a document. Returns rows removed.
    async fn delete_comp_entries_for_document(&mut self, document_id: u64) -> EngineResult<u64>;

    // plain leave requests
    async fn find_leave_request(&mut self, id: u64) -> EngineResult<Option<LeaveRequest>>;
    async fn insert_leave_request(&mut self, req: &LeaveRequest) -> EngineResult<u64>;
    async fn update_leave_request(&mut self, req: &LeaveRequest) -> EngineResult<()>;

    async fn commit(self: Box<Self>) -> EngineResult<()>;
}
