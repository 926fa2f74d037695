use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use pageant_core::{normalize_email, normalize_name, Account, AccountId, PaymentStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::ApiJson;
use crate::auth::{AdminUser, AuthUser};
use crate::error::{ApiError, ApiResponse, ApiResult};
use crate::mailer::payment_status_email;
use crate::state::AppState;

/// Only identity fields are writable through the profile endpoint
#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPaymentRequest {
    pub payment_id: Option<String>,
    pub amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReviewRequest {
    pub payment_status: Option<PaymentStatus>,
    pub payment_id: Option<String>,
    pub payment_notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_amount: Option<f64>,
}

pub async fn get_me(AuthUser(user): AuthUser) -> ApiResult<Account> {
    Ok(ApiResponse::ok(user))
}

pub async fn update_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiJson(body): ApiJson<UpdateMeRequest>,
) -> ApiResult<Account> {
    let name = body.name.as_deref().map(normalize_name).transpose()?;
    let email = body.email.as_deref().map(normalize_email).transpose()?;

    let (account, ()) = state
        .update_account(user.id, move |account| {
            if let Some(name) = name {
                account.name = name;
            }
            if let Some(email) = email {
                account.email = email;
            }
            account.updated_at = Utc::now();
            Ok(())
        })
        .await?;

    Ok(ApiResponse::ok(account))
}

pub async fn submit_payment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiJson(body): ApiJson<SubmitPaymentRequest>,
) -> ApiResult<PaymentView> {
    let payment_id = body.payment_id.unwrap_or_default();
    let amount = body
        .amount
        .ok_or_else(|| ApiError::Validation("Please provide paymentId and amount".to_string()))?;

    let (account, ()) = state
        .update_account(user.id, move |account| {
            account.submit_payment(&payment_id, amount, Utc::now())?;
            Ok(())
        })
        .await?;

    info!(account_id = %account.id, amount, "Payment submitted");
    state.notify(payment_status_email(&account, PaymentStatus::Processing, Utc::now()));

    Ok(ApiResponse::with_message(
        PaymentView {
            payment_status: account.payment.status,
            payment_id: account.payment.payment_id,
            payment_date: None,
            payment_amount: None,
        },
        "Payment submitted successfully",
    ))
}

pub async fn payment_status(AuthUser(user): AuthUser) -> ApiResult<PaymentView> {
    Ok(ApiResponse::ok(PaymentView {
        payment_status: user.payment.status,
        payment_id: user.payment.payment_id,
        payment_date: user.payment.date,
        payment_amount: Some(user.payment.amount),
    }))
}

pub async fn update_payment_status(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<String>,
    ApiJson(body): ApiJson<PaymentReviewRequest>,
) -> ApiResult<Account> {
    let user_id: AccountId = user_id
        .parse()
        .map_err(|_| ApiError::NotFound("User not found".to_string()))?;
    let status = body
        .payment_status
        .ok_or_else(|| ApiError::Validation("Please provide paymentStatus".to_string()))?;
    let payment_id = body.payment_id.filter(|id| !id.trim().is_empty());
    let notes = body.payment_notes;

    let (account, ()) = state
        .update_account(user_id, move |account| {
            let now = Utc::now();
            if payment_id.is_some() {
                account.set_payment_id(payment_id, now);
            }
            account.review_payment(status, notes, now);
            Ok(())
        })
        .await?;

    info!(
        admin_id = %admin.id,
        account_id = %account.id,
        status = %status,
        "Payment status updated"
    );
    state.notify(payment_status_email(&account, status, Utc::now()));

    Ok(ApiResponse::with_message(
        account,
        format!("Payment status updated to {status}"),
    ))
}
