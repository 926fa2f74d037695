//! Admin dashboards, contestant management and export.
//!
//! Every handler here requires [`AdminUser`].

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use pageant_core::{
    Account, AccountId, AdminAccountQuery, AdminSort, CategoryReport, DailyVotes,
    DashboardOverview, PageRequest, PaymentStat, PaymentStatus, RegistrationStatus,
    RevenueBucket, SortOrder, Timeframe, VoteRecord,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::{ApiJson, ApiQuery, ContestantList};
use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResponse, ApiResult};
use crate::mailer::payment_status_email;
use crate::state::AppState;

const CSV_HEADER: &str = "name,email,paymentStatus,category,votes";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminListParams {
    /// Registration status
    pub status: Option<RegistrationStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub category: Option<String>,
    pub search: Option<String>,
    #[serde(default)]
    pub sort_by: AdminSort,
    #[serde(default)]
    pub order: SortOrder,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl From<AdminListParams> for AdminAccountQuery {
    fn from(params: AdminListParams) -> Self {
        Self {
            registration_status: params.status,
            payment_status: params.payment_status,
            category: params.category,
            search: params.search,
            sort: params.sort_by,
            order: params.order,
            page: PageRequest::new(params.page, params.limit),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportParams {
    #[serde(default)]
    pub format: ExportFormat,
    /// Payment status filter
    #[serde(alias = "paymentStatus")]
    pub status: Option<PaymentStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateRequest {
    #[serde(default)]
    pub contestant_ids: Vec<AccountId>,
    pub payment_status: Option<PaymentStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateResult {
    pub modified_count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestantUpdate {
    pub payment_status: Option<PaymentStatus>,
    pub notes: Option<String>,
    pub is_publicly_visible: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ContestantDetail {
    pub contestant: Account,
    pub votes: Vec<VoteRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VotingParams {
    pub category: Option<String>,
    pub timeframe: Option<Timeframe>,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Contestant not found".to_string())
}

fn contestant_id(raw: &str) -> Result<AccountId, ApiError> {
    raw.parse().map_err(|_| not_found())
}

/// RFC 3339 timestamp or a bare `YYYY-MM-DD`. A bare date used as an upper
/// bound covers the whole day.
fn parse_bound(raw: &str, upper: bool) -> Result<DateTime<Utc>, ApiError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::Validation(format!("Invalid date: {raw}")))?;
    let time = if upper {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| ApiError::Internal("invalid time of day".to_string()))?;
    Ok(date.and_time(time).and_utc())
}

/// Range filter only applies when both bounds are given
fn revenue_range(
    params: &RevenueParams,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, ApiError> {
    match (params.start_date.as_deref(), params.end_date.as_deref()) {
        (Some(start), Some(end)) if !start.trim().is_empty() && !end.trim().is_empty() => {
            Ok(Some((parse_bound(start, false)?, parse_bound(end, true)?)))
        }
        _ => Ok(None),
    }
}

/// Cells opening with a formula trigger are neutralised with a leading `'`
fn csv_field(raw: &str) -> String {
    let cell = if raw.starts_with(['=', '+', '-', '@']) {
        format!("'{raw}")
    } else {
        raw.to_string()
    };
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell
    }
}

fn to_csv(accounts: &[Account]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for account in accounts {
        let registration = &account.competition_registration;
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            csv_field(&account.name),
            csv_field(&account.email),
            account.payment.status,
            csv_field(registration.category.as_deref().unwrap_or("")),
            registration.votes_count,
        ));
    }
    out
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> ApiResult<DashboardOverview> {
    let overview = state
        .with_store(|store| store.dashboard_overview())
        .await?;
    Ok(ApiResponse::ok(overview))
}

pub async fn contestants(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiQuery(params): ApiQuery<AdminListParams>,
) -> ApiResult<ContestantList<Account>> {
    let query = AdminAccountQuery::from(params);
    let page = state
        .with_store(move |store| store.admin_accounts(&query))
        .await?;
    Ok(ApiResponse::ok(page.into()))
}

pub async fn export(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ApiQuery(params): ApiQuery<ExportParams>,
) -> Result<Response, ApiError> {
    let status = params.status;
    let accounts = state
        .with_store(move |store| store.export_accounts(status))
        .await?;

    info!(
        admin_id = %admin.id,
        rows = accounts.len(),
        format = ?params.format,
        "Contestant export"
    );

    let response = match params.format {
        ExportFormat::Csv => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (header::CONTENT_DISPOSITION, "attachment; filename=contestants.csv"),
            ],
            to_csv(&accounts),
        )
            .into_response(),
        ExportFormat::Json => (
            [(header::CONTENT_DISPOSITION, "attachment; filename=contestants.json")],
            ApiResponse::ok(accounts),
        )
            .into_response(),
    };
    Ok(response)
}

pub async fn bulk_update(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ApiJson(body): ApiJson<BulkUpdateRequest>,
) -> ApiResult<BulkUpdateResult> {
    let status = body
        .payment_status
        .ok_or_else(|| ApiError::Validation("Please provide paymentStatus".to_string()))?;
    if body.contestant_ids.is_empty() {
        return Err(ApiError::Validation(
            "Please provide contestantIds".to_string(),
        ));
    }

    let ids = body.contestant_ids;
    let notes = body.notes;
    let updated = state
        .with_store(move |store| store.bulk_review_payments(&ids, status, notes, Utc::now()))
        .await?;

    for account in &updated {
        state.notify(payment_status_email(account, status, Utc::now()));
    }

    let modified_count = updated.len();
    info!(admin_id = %admin.id, modified_count, status = %status, "Bulk update");

    Ok(ApiResponse::with_message(
        BulkUpdateResult { modified_count },
        format!("Updated {modified_count} contestants"),
    ))
}

pub async fn detail(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<ContestantDetail> {
    let id = contestant_id(&id)?;
    let detail = state
        .with_store(move |store| {
            let Some(contestant) = store.find_account(id)? else {
                return Ok(None);
            };
            let votes = store.votes_for_contestant(id)?;
            Ok(Some(ContestantDetail { contestant, votes }))
        })
        .await?
        .ok_or_else(not_found)?;
    Ok(ApiResponse::ok(detail))
}

pub async fn update_contestant(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ContestantUpdate>,
) -> ApiResult<Account> {
    let id = contestant_id(&id)?;
    let status = body.payment_status;

    let (account, ()) = state
        .update_account(id, move |account| {
            let now = Utc::now();
            if let Some(status) = body.payment_status {
                account.review_payment(status, body.notes, now);
            }
            if let Some(visible) = body.is_publicly_visible {
                account.set_public_visibility(visible, now);
            }
            Ok(())
        })
        .await
        .map_err(|e| match e {
            ApiError::NotFound(_) => not_found(),
            other => other,
        })?;

    info!(
        admin_id = %admin.id,
        account_id = %account.id,
        payment_status = %account.payment.status,
        visible = account.competition_registration.is_publicly_visible,
        "Contestant updated"
    );
    if let Some(status) = status {
        state.notify(payment_status_email(&account, status, Utc::now()));
    }

    Ok(ApiResponse::with_message(
        account,
        "Contestant status updated successfully",
    ))
}

pub async fn payment_stats(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> ApiResult<Vec<PaymentStat>> {
    let stats = state.with_store(|store| store.payment_stats()).await?;
    Ok(ApiResponse::ok(stats))
}

pub async fn revenue_analytics(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiQuery(params): ApiQuery<RevenueParams>,
) -> ApiResult<Vec<RevenueBucket>> {
    let range = revenue_range(&params)?;
    let buckets = state
        .with_store(move |store| store.revenue_by_month(range))
        .await?;
    Ok(ApiResponse::ok(buckets))
}

pub async fn categories(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> ApiResult<Vec<CategoryReport>> {
    let reports = state.with_store(|store| store.category_reports()).await?;
    Ok(ApiResponse::ok(reports))
}

pub async fn voting_analytics(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiQuery(params): ApiQuery<VotingParams>,
) -> ApiResult<Vec<DailyVotes>> {
    let votes = state
        .with_store(move |store| {
            store.votes_by_day(params.category.as_deref(), params.timeframe, Utc::now())
        })
        .await?;
    Ok(ApiResponse::ok(votes))
}
