use crate::api::document::{
    DocumentFilter, DocumentListResponse, DocumentPayload, DocumentResponse, DocumentSummary,
    EditDocumentRequest, RejectDocumentRequest, SubmitDocumentRequest,
};
use crate::api::ledger::{
    AnnualBalanceResponse, BalanceQuery, CompBalanceResponse, CompEntryResponse,
    SetAnnualTotalRequest,
};
use crate::api::leave_request::{
    CreateLeave, LeaveFilter, LeaveListResponse, LeaveResponse, RejectLeave,
};
use crate::model::document::{AttendanceType, DocStatus, ExpenseItem, LeaveType};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Groupware Approval API",
        version = "1.0.0",
        description = r#"
## Organization Intranet: Document Approval & Leave Ledger

This API powers the approval backend of an organizational intranet.

### 🔹 Key Features
- **Document Approval**
  - Draft expense and attendance documents, approve in one or two stages,
    reject with a reason, delete with automatic ledger rollback
- **Leave Requests**
  - Apply for leave, approve/reject requests; approval deducts the balance
    in the same transaction
- **Leave Ledger**
  - Per-user annual-day and comp-hour balances, administrative overrides

### 🔐 Security
Endpoints are protected using **JWT Bearer authentication**. Approval
actions require the **chairman** or **director** capability; ledger
overrides require **Admin**.

### 📦 Response Format
- JSON-based RESTful responses
- Pagination supported for list endpoints

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::document::submit_document,
        crate::api::document::document_list,
        crate::api::document::get_document,
        crate::api::document::edit_document,
        crate::api::document::approve_document,
        crate::api::document::reject_document,
        crate::api::document::delete_document,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,

        crate::api::ledger::annual_balance,
        crate::api::ledger::comp_balance,
        crate::api::ledger::set_annual_total
    ),
    components(
        schemas(
            SubmitDocumentRequest,
            EditDocumentRequest,
            RejectDocumentRequest,
            DocumentPayload,
            DocumentResponse,
            DocumentSummary,
            DocumentListResponse,
            DocumentFilter,
            ExpenseItem,
            DocStatus,
            AttendanceType,
            LeaveType,
            CreateLeave,
            RejectLeave,
            LeaveResponse,
            LeaveListResponse,
            LeaveFilter,
            BalanceQuery,
            AnnualBalanceResponse,
            CompEntryResponse,
            CompBalanceResponse,
            SetAnnualTotalRequest
        )
    ),
    tags(
        (name = "Document", description = "Document drafting and approval APIs"),
        (name = "Leave", description = "Leave request APIs"),
        (name = "Ledger", description = "Leave ledger APIs"),
    )
)]
pub struct ApiDoc;
