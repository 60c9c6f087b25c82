use crate::auth::auth::AuthUser;
use crate::engine::{DocumentPatch, DocumentDraft, DraftPayload, WorkflowEngine};
use crate::model::document::{AttendanceType, DocStatus, Document, DocumentBody, ExpenseItem, LeaveType};
use crate::store::mysql::{MySqlStore, fetch_document};
use crate::utils::user_cache;
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{MySqlPool, prelude::FromRow};
use utoipa::{IntoParams, ToSchema};

/// The claim carried by a draft; exactly one kind per document.
#[derive(Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentPayload {
    Expense {
        expense_items: Vec<ExpenseItem>,
    },
    Overtime {
        extra_work_hours: f64,
    },
    Leave {
        leave_type: LeaveType,
        #[schema(value_type = String)]
        leave_start_date: NaiveDate,
        #[schema(value_type = Option<String>)]
        leave_end_date: Option<NaiveDate>,
    },
}

impl From<DocumentPayload> for DraftPayload {
    fn from(payload: DocumentPayload) -> Self {
        match payload {
            DocumentPayload::Expense { expense_items } => DraftPayload::Expense {
                items: expense_items,
            },
            DocumentPayload::Overtime { extra_work_hours } => {
                DraftPayload::Overtime { extra_work_hours }
            }
            DocumentPayload::Leave {
                leave_type,
                leave_start_date,
                leave_end_date,
            } => DraftPayload::Leave {
                leave_type,
                start_date: leave_start_date,
                end_date: leave_end_date,
            },
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitDocumentRequest {
    #[schema(example = 2)]
    pub label_id: u32,
    #[schema(example = "Office supplies for March")]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(flatten)]
    pub payload: DocumentPayload,
}

#[derive(Deserialize, ToSchema)]
pub struct EditDocumentRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_private: Option<bool>,
    #[serde(flatten)]
    pub payload: Option<DocumentPayload>,
}

#[derive(Deserialize, ToSchema)]
pub struct RejectDocumentRequest {
    #[schema(example = "예산 초과")]
    pub reason: String,
}

/// Full flat view of a document, shaped like the stored record.
#[derive(Serialize, ToSchema)]
pub struct DocumentResponse {
    pub id: u64,
    #[schema(example = "2025/03/05-3")]
    pub doc_number: String,
    pub label_id: u32,
    pub drafter_id: u64,
    pub drafter_name: Option<String>,
    pub status: DocStatus,
    pub title: String,
    pub content: String,
    pub expense_items: Vec<ExpenseItem>,
    pub total_amount: i64,
    pub attendance_type: AttendanceType,
    pub leave_type: Option<LeaveType>,
    #[schema(format = "date", value_type = Option<String>)]
    pub leave_start_date: Option<NaiveDate>,
    #[schema(format = "date", value_type = Option<String>)]
    pub leave_end_date: Option<NaiveDate>,
    pub leave_days: Option<f64>,
    pub extra_work_hours: Option<f64>,
    pub is_private: bool,
    pub rejected_reason: Option<String>,
    pub approver_id: Option<u64>,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(format = "date-time", value_type = String)]
    pub updated_at: DateTime<Utc>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub approved_at: Option<DateTime<Utc>>,
}

impl DocumentResponse {
    fn new(doc: Document, drafter_name: Option<String>) -> Self {
        let total_amount = doc.total_amount();
        let attendance_type = doc.attendance_type();
        let mut response = DocumentResponse {
            id: doc.id,
            doc_number: doc.doc_number,
            label_id: doc.label_id,
            drafter_id: doc.drafter_id,
            drafter_name,
            status: doc.status,
            title: doc.title,
            content: doc.content,
            expense_items: Vec::new(),
            total_amount,
            attendance_type,
            leave_type: None,
            leave_start_date: None,
            leave_end_date: None,
            leave_days: None,
            extra_work_hours: None,
            is_private: doc.is_private,
            rejected_reason: doc.rejected_reason,
            approver_id: doc.approver_id,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
            approved_at: doc.approved_at,
        };
        match doc.body {
            DocumentBody::Expense { items } => response.expense_items = items,
            DocumentBody::Attendance(claim) => match claim {
                crate::model::document::AttendanceClaim::Overtime { extra_work_hours } => {
                    response.extra_work_hours = Some(extra_work_hours);
                }
                crate::model::document::AttendanceClaim::Leave {
                    leave_type,
                    start_date,
                    end_date,
                    days,
                } => {
                    response.leave_type = Some(leave_type);
                    response.leave_start_date = Some(start_date);
                    response.leave_end_date = Some(end_date);
                    response.leave_days = Some(days);
                }
            },
        }
        response
    }
}

async fn respond_with(pool: &MySqlPool, doc: Document) -> DocumentResponse {
    let drafter_name = user_cache::display_name(pool, doc.drafter_id).await;
    DocumentResponse::new(doc, drafter_name)
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct DocumentFilter {
    /// Filter by drafter
    pub drafter_id: Option<u64>,
    #[schema(example = "pending")]
    /// Filter by status
    pub status: Option<String>,
    /// Filter by category label
    pub label_id: Option<u32>,
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    /// Pagination per page number
    pub per_page: Option<u64>,
}

// Helper enum for typed SQLx binding
enum FilterValue<'a> {
    U64(u64),
    U32(u32),
    Str(&'a str),
}

#[derive(Serialize, FromRow, ToSchema)]
pub struct DocumentSummary {
    pub id: u64,
    pub doc_number: String,
    pub label_id: u32,
    pub drafter_id: u64,
    #[sqlx(default)]
    pub drafter_name: Option<String>,
    pub status: String,
    pub title: String,
    pub total_amount: i64,
    pub attendance_type: String,
    pub is_private: bool,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentListResponse {
    pub data: Vec<DocumentSummary>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

/* =========================
Submit a draft document
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/document",
    request_body(
        content = SubmitDocumentRequest,
        description = "Draft payload: an expense draft, an overtime claim or a leave claim",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Document submitted", body = DocumentResponse),
        (status = 400, description = "Validation failed or balance insufficient"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Document"
)]
pub async fn submit_document(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine<MySqlStore>>,
    pool: web::Data<MySqlPool>,
    payload: web::Json<SubmitDocumentRequest>,
) -> actix_web::Result<impl Responder> {
    let request = payload.into_inner();
    let draft = DocumentDraft {
        label_id: request.label_id,
        title: request.title,
        content: request.content,
        is_private: request.is_private,
        payload: request.payload.into(),
    };

    let doc = engine.submit(draft, &auth.caller()).await?;
    Ok(HttpResponse::Ok().json(respond_with(pool.get_ref(), doc).await))
}

/* =========================
Edit a pending document
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/document/{id}",
    params(("id" = u64, Path, description = "Document id")),
    request_body = EditDocumentRequest,
    responses(
        (status = 200, description = "Document updated", body = DocumentResponse),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Not the drafter, or no longer pending"),
        (status = 404, description = "Document not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Document"
)]
pub async fn edit_document(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine<MySqlStore>>,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<EditDocumentRequest>,
) -> actix_web::Result<impl Responder> {
    let request = payload.into_inner();
    let patch = DocumentPatch {
        title: request.title,
        content: request.content,
        is_private: request.is_private,
        payload: request.payload.map(Into::into),
    };

    let doc = engine.edit(path.into_inner(), patch, &auth.caller()).await?;
    Ok(HttpResponse::Ok().json(respond_with(pool.get_ref(), doc).await))
}

/* =========================
Approve (single or staged)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/document/{id}/approve",
    params(("id" = u64, Path, description = "Document id")),
    responses(
        (status = 200, description = "Approval recorded", body = DocumentResponse),
        (status = 400, description = "Transition not legal for this status/role"),
        (status = 403, description = "Caller is not an approver"),
        (status = 404, description = "Document not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Document"
)]
pub async fn approve_document(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine<MySqlStore>>,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let doc = engine.approve(path.into_inner(), &auth.caller()).await?;
    Ok(HttpResponse::Ok().json(respond_with(pool.get_ref(), doc).await))
}

/* =========================
Reject with a reason
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/document/{id}/reject",
    params(("id" = u64, Path, description = "Document id")),
    request_body = RejectDocumentRequest,
    responses(
        (status = 200, description = "Document rejected", body = DocumentResponse),
        (status = 400, description = "Missing reason or transition not legal"),
        (status = 403, description = "Caller is not an approver"),
        (status = 404, description = "Document not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Document"
)]
pub async fn reject_document(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine<MySqlStore>>,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<RejectDocumentRequest>,
) -> actix_web::Result<impl Responder> {
    let doc = engine
        .reject(path.into_inner(), &payload.reason, &auth.caller())
        .await?;
    Ok(HttpResponse::Ok().json(respond_with(pool.get_ref(), doc).await))
}

/* =========================
Delete (with ledger rollback)
========================= */
#[utoipa::path(
    delete,
    path = "/api/v1/document/{id}",
    params(("id" = u64, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document deleted", body = Object, example = json!({
            "message": "Document deleted"
        })),
        (status = 403, description = "Caller may not delete this document"),
        (status = 404, description = "Document not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Document"
)]
pub async fn delete_document(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine<MySqlStore>>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    engine.delete(path.into_inner(), &auth.caller()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Document deleted"
    })))
}

/* =========================
Fetch one document
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/document/{id}",
    params(("id" = u64, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document found", body = DocumentResponse),
        (status = 403, description = "Private document of another drafter"),
        (status = 404, description = "Document not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Document"
)]
pub async fn get_document(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let doc = match fetch_document(pool.get_ref(), path.into_inner()).await? {
        Some(doc) => doc,
        None => {
            return Ok(HttpResponse::NotFound().json(serde_json::json!({
                "message": "Document not found"
            })));
        }
    };

    if doc.is_private && doc.drafter_id != auth.user_id && !auth.can_view_all() {
        return Err(actix_web::error::ErrorForbidden("Private document"));
    }

    Ok(HttpResponse::Ok().json(respond_with(pool.get_ref(), doc).await))
}

/* =========================
Paginated document list
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/document",
    params(DocumentFilter),
    responses(
        (status = 200, description = "Paginated document list", body = DocumentListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Document"
)]
pub async fn document_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DocumentFilter>,
) -> actix_web::Result<impl Responder> {
    // -------------------------
    // Pagination
    // -------------------------
    let per_page = query.per_page.unwrap_or(10).min(100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    // -------------------------
    // WHERE clause
    // -------------------------
    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(drafter_id) = query.drafter_id {
        where_sql.push_str(" AND drafter_id = ?");
        args.push(FilterValue::U64(drafter_id));
    }

    if let Some(status) = query.status.as_deref() {
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status));
    }

    if let Some(label_id) = query.label_id {
        where_sql.push_str(" AND label_id = ?");
        args.push(FilterValue::U32(label_id));
    }

    // drafters see their own private documents, approvers see everything
    if !auth.can_view_all() {
        where_sql.push_str(" AND (is_private = FALSE OR drafter_id = ?)");
        args.push(FilterValue::U64(auth.user_id));
    }

    // -------------------------
    // COUNT query
    // -------------------------
    let count_sql = format!("SELECT COUNT(*) FROM documents{}", where_sql);

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::U32(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(*s),
        };
    }

    let total = count_q.fetch_one(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error=%e, "Failed to count documents");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    // -------------------------
    // DATA query
    // -------------------------
    let data_sql = format!(
        r#"
        SELECT id, doc_number, label_id, drafter_id, status, title, total_amount,
               attendance_type, is_private, created_at
        FROM documents
        {}
        ORDER BY created_at DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, DocumentSummary>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::U32(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
        };
    }

    let mut documents = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error=%e, "Failed to fetch document list");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    for doc in &mut documents {
        doc.drafter_name = user_cache::display_name(pool.get_ref(), doc.drafter_id).await;
    }

    // -------------------------
    // Response
    // -------------------------
    let response = DocumentListResponse {
        data: documents,
        page: page as u32,
        per_page: per_page as u32,
        total,
    };

    Ok(HttpResponse::Ok().json(response))
}
