use crate::auth::auth::AuthUser;
use crate::engine::{LeaveDraft, WorkflowEngine};
use crate::model::document::LeaveType;
use crate::model::leave_request::LeaveRequest;
use crate::store::mysql::MySqlStore;
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{MySqlPool, prelude::FromRow};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "full")]
    pub leave_type: LeaveType,
    #[schema(example = "2025-07-07", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    /// Defaults to the start date.
    #[schema(example = "2025-07-08", format = "date", value_type = String)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct RejectLeave {
    #[schema(example = "staffing shortage that week")]
    pub reason: String,
}

#[derive(Serialize, Deserialize, FromRow, ToSchema)]
pub struct LeaveResponse {
    #[schema(example = 1)]
    /// leave application id
    pub id: u64,
    /// user the leave is applied for
    #[schema(example = 1000)]
    pub user_id: u64,
    #[schema(example = "full", value_type = String)]
    pub leave_type: String,
    #[schema(example = "2025-07-07", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2025-07-08", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = 2.0)]
    pub days: f64,
    #[schema(example = "pending", value_type = String)]
    pub status: String,
    pub approved_by: Option<u64>,
    pub rejected_reason: Option<String>,
    #[schema(example = "2025-07-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<LeaveRequest> for LeaveResponse {
    fn from(req: LeaveRequest) -> Self {
        LeaveResponse {
            id: req.id,
            user_id: req.user_id,
            leave_type: req.leave_type.to_string(),
            start_date: req.start_date,
            end_date: req.end_date,
            days: req.days,
            status: req.status.to_string(),
            approved_by: req.approved_by,
            rejected_reason: req.rejected_reason,
            created_at: Some(req.created_at),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveResponse>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    #[schema(example = 123)]
    /// Filter by user ID
    pub user_id: Option<u64>,
    #[schema(example = "pending")]
    /// Filter by leave status
    pub status: Option<String>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    #[schema(example = 3)]
    /// Pagination per page number
    pub per_page: Option<u64>,
}

// Helper enum for typed SQLx binding
enum FilterValue<'a> {
    U64(u64),
    Str(&'a str),
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Leave request submitted successfully", body = LeaveResponse),
        (status = 400, description = "Bad request or insufficient balance"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine<MySqlStore>>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let request = payload.into_inner();
    let req = engine
        .submit_leave(
            LeaveDraft {
                leave_type: request.leave_type,
                start_date: request.start_date,
                end_date: request.end_date,
            },
            &auth.caller(),
        )
        .await?;

    Ok(HttpResponse::Ok().json(LeaveResponse::from(req)))
}

/* =========================
Approve leave (chairman/director)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    responses(
        (status = 200, description = "Leave approved; the ledger is deducted in the same transaction",
         body = LeaveResponse),
        (status = 400, description = "Already processed or balance insufficient"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine<MySqlStore>>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let req = engine
        .approve_leave(path.into_inner(), &auth.caller())
        .await?;
    Ok(HttpResponse::Ok().json(LeaveResponse::from(req)))
}

/* =========================
Reject leave (chairman/director)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    request_body = RejectLeave,
    responses(
        (status = 200, description = "Leave rejected", body = LeaveResponse),
        (status = 400, description = "Missing reason or already processed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine<MySqlStore>>,
    path: web::Path<u64>,
    payload: web::Json<RejectLeave>,
) -> actix_web::Result<impl Responder> {
    let req = engine
        .reject_leave(path.into_inner(), &payload.reason, &auth.caller())
        .await?;
    Ok(HttpResponse::Ok().json(LeaveResponse::from(req)))
}

/// for getting a leave application details endpoint
#[utoipa::path(
    get,
    path = "/api/v1/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();

    let leave = sqlx::query_as::<_, LeaveResponse>(
        r#"
        SELECT id, user_id, leave_type, start_date, end_date, days, status,
               approved_by, rejected_reason, created_at
        FROM leave_requests
        WHERE id = ?
        "#,
    )
    .bind(leave_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, leave_id, "Failed to fetch leave request");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    match leave {
        Some(data) => {
            if data.user_id != auth.user_id && !auth.can_view_all() {
                return Err(actix_web::error::ErrorForbidden("Not your leave request"));
            }
            Ok(HttpResponse::Ok().json(data))
        }
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Leave request not found"
        }))),
    }
}

/// for getting leave applications endpoint
#[utoipa::path(
    get,
    path = "/api/v1/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
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

    // staff only ever see their own requests
    let user_filter = if auth.can_view_all() {
        query.user_id
    } else {
        Some(auth.user_id)
    };

    if let Some(user_id) = user_filter {
        where_sql.push_str(" AND user_id = ?");
        args.push(FilterValue::U64(user_id));
    }

    if let Some(status) = query.status.as_deref() {
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status));
    }

    // -------------------------
    // COUNT query
    // -------------------------
    let count_sql = format!("SELECT COUNT(*) FROM leave_requests{}", where_sql);

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(*s),
        };
    }

    let total = count_q.fetch_one(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error=%e, "Failed to count leave requests");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    // -------------------------
    // DATA query
    // -------------------------
    let data_sql = format!(
        r#"
        SELECT id, user_id, leave_type, start_date, end_date, days, status,
               approved_by, rejected_reason, created_at
        FROM leave_requests
        {}
        ORDER BY created_at DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, LeaveResponse>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
        };
    }

    let leaves = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error=%e, "Failed to fetch leave list");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    // -------------------------
    // Response
    // -------------------------
    let response = LeaveListResponse {
        data: leaves,
        page: page as u32,
        per_page: per_page as u32,
        total,
    };

    Ok(HttpResponse::Ok().json(response))
}
