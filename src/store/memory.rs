//! In-memory store for tests and local development.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::EngineResult;
use crate::model::document::Document;
use crate::model::ledger::{AnnualLeaveBalance, CompLeaveEntry};
use crate::model::leave_request::LeaveRequest;
use crate::store::{Store, UnitOfWork};

#[derive(Debug, Default, Clone)]
struct State {
    documents: HashMap<u64, Document>,
    leave_requests: HashMap<u64, LeaveRequest>,
    annual: HashMap<(u64, i32), AnnualLeaveBalance>,
    comp: HashMap<u64, CompLeaveEntry>,
    doc_seq: HashMap<NaiveDate, u32>,
    next_id: u64,
}

impl State {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// One coarse lock around the whole state: every unit of work serializes
/// against every other, which trivially satisfies the per-document and
/// per-(user, year) exclusion the engine requires. Writes go to a staged
/// copy that is published on commit and discarded on drop.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemoryUow {
    guard: OwnedMutexGuard<State>,
    staged: State,
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> EngineResult<Box<dyn UnitOfWork>> {
        let guard = self.inner.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryUow { guard, staged }))
    }
}

#[async_trait]
impl UnitOfWork for MemoryUow {
    async fn find_document(&mut self, id: u64) -> EngineResult<Option<Document>> {
        Ok(self.staged.documents.get(&id).cloned())
    }

    async fn insert_document(&mut self, doc: &Document) -> EngineResult<u64> {
        let id = self.staged.allocate_id();
        let mut doc = doc.clone();
        doc.id = id;
        self.staged.documents.insert(id, doc);
        Ok(id)
    }

    async fn update_document(&mut self, doc: &Document) -> EngineResult<()> {
        self.staged.documents.insert(doc.id, doc.clone());
        Ok(())
    }

    async fn delete_document(&mut self, id: u64) -> EngineResult<bool> {
        Ok(self.staged.documents.remove(&id).is_some())
    }

    async fn next_doc_seq(&mut self, date: NaiveDate) -> EngineResult<u32> {
        let seq = self.staged.doc_seq.entry(date).or_insert(0);
        *seq += 1;
        Ok(*seq)
    }

    async fn find_annual_balance(
        &mut self,
        user_id: u64,
        year: i32,
    ) -> EngineResult<Option<AnnualLeaveBalance>> {
        Ok(self.staged.annual.get(&(user_id, year)).cloned())
    }

    async fn upsert_annual_balance(&mut self, balance: &AnnualLeaveBalance) -> EngineResult<()> {
        self.staged
            .annual
            .insert((balance.user_id, balance.year), balance.clone());
        Ok(())
    }

    async fn comp_entries(
        &mut self,
        user_id: u64,
        year: i32,
    ) -> EngineResult<Vec<CompLeaveEntry>> {
        let mut entries: Vec<CompLeaveEntry> = self
            .staged
            .comp
            .values()
            .filter(|e| e.user_id == user_id && e.year == year)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    async fn insert_comp_entry(&mut self, entry: &CompLeaveEntry) -> EngineResult<u64> {
        let id = self.staged.allocate_id();
        let mut entry = entry.clone();
        entry.id = id;
        self.staged.comp.insert(id, entry);
        Ok(id)
    }

    async fn update_comp_entry(&mut self, entry: &CompLeaveEntry) -> EngineResult<()> {
        self.staged.comp.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn delete_comp_entries_for_document(&mut self, document_id: u64) -> EngineResult<u64> {
        let before = self.staged.comp.len();
        self.staged
            .comp
            .retain(|_, e| e.document_id != Some(document_id));
        Ok((before - self.staged.comp.len()) as u64)
    }

    async fn find_leave_request(&mut self, id: u64) -> EngineResult<Option<LeaveRequest>> {
        Ok(self.staged.leave_requests.get(&id).cloned())
    }

    async fn insert_leave_request(&mut self, req: &LeaveRequest) -> EngineResult<u64> {
        let id = self.staged.allocate_id();
        let mut req = req.clone();
        req.id = id;
        self.staged.leave_requests.insert(id, req);
        Ok(id)
    }

    async fn update_leave_request(&mut self, req: &LeaveRequest) -> EngineResult<()> {
        self.staged.leave_requests.insert(req.id, req.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> EngineResult<()> {
        let MemoryUow { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::document::{DocStatus, DocumentBody, ExpenseItem};
    use chrono::Utc;

    fn sample_document() -> Document {
        Document {
            id: 0,
            doc_number: "2026/01/05-1".into(),
            label_id: 2,
            drafter_id: 10,
            status: DocStatus::Pending,
            title: "printer toner".into(),
            content: String::new(),
            body: DocumentBody::Expense {
                items: vec![ExpenseItem {
                    item: "toner".into(),
                    category: "supplies".into(),
                    vendor: "OfficeDepot".into(),
                    amount: 45_000,
                    note: String::new(),
                }],
            },
            is_private: false,
            rejected_reason: None,
            approver_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            approved_at: None,
        }
    }

    #[actix_web::test]
    async fn uncommitted_writes_are_discarded() {
        let store = MemoryStore::new();

        {
            let mut uow = store.begin().await.unwrap();
            uow.insert_document(&sample_document()).await.unwrap();
            // dropped without commit
        }

        let mut uow = store.begin().await.unwrap();
        assert!(uow.find_document(1).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn committed_writes_are_visible() {
        let store = MemoryStore::new();

        let mut uow = store.begin().await.unwrap();
        let id = uow.insert_document(&sample_document()).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let found = uow.find_document(id).await.unwrap().unwrap();
        assert_eq!(found.title, "printer toner");
    }

    #[actix_web::test]
    async fn doc_seq_counts_per_day() {
        let store = MemoryStore::new();
        let day1 = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();

        let mut uow = store.begin().await.unwrap();
        assert_eq!(uow.next_doc_seq(day1).await.unwrap(), 1);
        assert_eq!(uow.next_doc_seq(day1).await.unwrap(), 2);
        assert_eq!(uow.next_doc_seq(day2).await.unwrap(), 1);
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        assert_eq!(uow.next_doc_seq(day1).await.unwrap(), 3);
    }
}
