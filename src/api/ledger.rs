use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::engine::WorkflowEngine;
use crate::store::mysql::MySqlStore;
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{MySqlPool, prelude::FromRow};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct BalanceQuery {
    /// Defaults to the caller.
    pub user_id: Option<u64>,
    /// Defaults to the current year.
    pub year: Option<i32>,
}

impl BalanceQuery {
    /// Staff may only look at their own ledger.
    fn resolve(&self, auth: &AuthUser) -> actix_web::Result<(u64, i32)> {
        let user_id = self.user_id.unwrap_or(auth.user_id);
        if user_id != auth.user_id && !auth.can_view_all() {
            return Err(actix_web::error::ErrorForbidden("Not your ledger"));
        }
        Ok((user_id, self.year.unwrap_or_else(|| Utc::now().year())))
    }
}

#[derive(Serialize, ToSchema)]
pub struct AnnualBalanceResponse {
    pub user_id: u64,
    #[schema(example = 2025)]
    pub year: i32,
    #[schema(example = 15.0)]
    pub total_days: f64,
    #[schema(example = 3.0)]
    pub used_days: f64,
    #[schema(example = 12.0)]
    pub remaining_days: f64,
}

#[derive(FromRow)]
struct AnnualRow {
    total_days: f64,
    used_days: f64,
}

#[derive(Serialize, FromRow, ToSchema)]
pub struct CompEntryResponse {
    pub id: u64,
    pub document_id: Option<u64>,
    #[schema(example = 16.0)]
    pub total_hours: f64,
    #[schema(example = 0.0)]
    pub used_hours: f64,
    pub description: String,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct CompBalanceResponse {
    pub user_id: u64,
    #[schema(example = 2025)]
    pub year: i32,
    pub total_hours: f64,
    pub used_hours: f64,
    pub remaining_hours: f64,
    pub entries: Vec<CompEntryResponse>,
}

#[derive(Deserialize, ToSchema)]
pub struct SetAnnualTotalRequest {
    pub user_id: u64,
    #[schema(example = 2025)]
    pub year: i32,
    /// New grand total. May drop below the days already used; the deficit
    /// is surfaced in the response rather than rejected.
    #[schema(example = 20.0)]
    pub total_days: f64,
}

/* =========================
Annual balance for a user/year
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/ledger/annual",
    params(BalanceQuery),
    responses(
        (status = 200, description = "Annual leave balance", body = AnnualBalanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Ledger"
)]
pub async fn annual_balance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<BalanceQuery>,
) -> actix_web::Result<impl Responder> {
    let (user_id, year) = query.resolve(&auth)?;

    let row = sqlx::query_as::<_, AnnualRow>(
        r#"
        SELECT total_days, used_days
        FROM annual_leave_balances
        WHERE user_id = ? AND year = ?
        "#,
    )
    .bind(user_id)
    .bind(year)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, user_id, year, "Failed to fetch annual balance");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    // no row yet means the default grant, untouched
    let (total_days, used_days) = row
        .map(|r| (r.total_days, r.used_days))
        .unwrap_or((config.default_annual_days, 0.0));

    Ok(HttpResponse::Ok().json(AnnualBalanceResponse {
        user_id,
        year,
        total_days,
        used_days,
        remaining_days: total_days - used_days,
    }))
}

/* =========================
Comp entries for a user/year
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/ledger/comp",
    params(BalanceQuery),
    responses(
        (status = 200, description = "Comp leave entries and totals", body = CompBalanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Ledger"
)]
pub async fn comp_balance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<BalanceQuery>,
) -> actix_web::Result<impl Responder> {
    let (user_id, year) = query.resolve(&auth)?;

    let entries = sqlx::query_as::<_, CompEntryResponse>(
        r#"
        SELECT id, document_id, total_hours, used_hours, description, updated_at
        FROM comp_leave_balances
        WHERE user_id = ? AND year = ?
        ORDER BY id
        "#,
    )
    .bind(user_id)
    .bind(year)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, user_id, year, "Failed to fetch comp entries");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let total_hours: f64 = entries.iter().map(|e| e.total_hours).sum();
    let used_hours: f64 = entries.iter().map(|e| e.used_hours).sum();

    Ok(HttpResponse::Ok().json(CompBalanceResponse {
        user_id,
        year,
        total_hours,
        used_hours,
        remaining_hours: total_hours - used_hours,
        entries,
    }))
}

/* =========================
Admin override of an annual total
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/ledger/annual",
    request_body = SetAnnualTotalRequest,
    responses(
        (status = 200, description = "Total overridden", body = AnnualBalanceResponse),
        (status = 400, description = "Negative total"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Ledger"
)]
pub async fn set_annual_total(
    auth: AuthUser,
    engine: web::Data<WorkflowEngine<MySqlStore>>,
    payload: web::Json<SetAnnualTotalRequest>,
) -> actix_web::Result<impl Responder> {
    let balance = engine
        .set_annual_total(
            payload.user_id,
            payload.year,
            payload.total_days,
            &auth.caller(),
        )
        .await?;

    Ok(HttpResponse::Ok().json(AnnualBalanceResponse {
        user_id: balance.user_id,
        year: balance.year,
        total_days: balance.total_days,
        used_days: balance.used_days,
        remaining_days: balance.remaining(),
    }))
}
