use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use pageant_core::{normalize_email, validate_password, Account, NewAccount, Role};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::{required, ApiJson};
use crate::auth::{hash_password, verify_password, AuthUser};
use crate::error::{ApiError, ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIdRequest {
    pub payment_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Session {
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Account>,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Session>>), ApiError> {
    let message = "Please provide name, email and password";
    let name = required(&body.name, message)?;
    let email = required(&body.email, message)?;
    let password = body
        .password
        .clone()
        .ok_or_else(|| ApiError::Validation(message.to_string()))?;

    validate_password(&password)?;
    let new = NewAccount::new(name, email, String::new(), Role::User)?;
    let password_hash = hash_password(&state, password).await?;

    let account = state
        .with_store(move |store| {
            store.create_account(NewAccount { password_hash, ..new }, Utc::now())
        })
        .await?;

    info!(account_id = %account.id, "User registered");

    let token = state.sessions.issue(account.id, Utc::now());
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(Session {
            token,
            user: Some(account),
        }),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> ApiResult<Session> {
    let message = "Please provide email and password";
    let email = required(&body.email, message)?;
    let password = body
        .password
        .clone()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::Validation(message.to_string()))?;

    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());

    let email = normalize_email(email).map_err(|_| invalid())?;
    let account = state
        .with_store(move |store| store.find_by_email(&email))
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&state, password, account.password_hash.clone()).await? {
        warn!(account_id = %account.id, "Login rejected: wrong password");
        return Err(invalid());
    }

    Ok(ApiResponse::ok(Session {
        token: state.sessions.issue(account.id, Utc::now()),
        user: None,
    }))
}

pub async fn update_payment_id(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiJson(body): ApiJson<PaymentIdRequest>,
) -> ApiResult<Account> {
    let payment_id = body
        .payment_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());

    let (account, ()) = state
        .update_account(user.id, move |account| {
            account.set_payment_id(payment_id, Utc::now());
            Ok(())
        })
        .await?;

    Ok(ApiResponse::ok(account))
}
