pub mod ledger;
pub mod leave;
pub mod policy;
mod workflow;

pub use workflow::{
    Caller, DocumentDraft, DocumentPatch, DraftPayload, LeaveDraft, WorkflowEngine,
};
