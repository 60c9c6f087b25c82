pub mod document;
pub mod ledger;
pub mod leave_request;
pub mod role;
