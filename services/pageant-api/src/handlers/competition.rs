use axum::extract::State;
use chrono::Utc;
use pageant_core::{
    Account, CompetitionRegistration, PaymentStatus, RegistrationDetails, RegistrationStatus,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::ApiJson;
use crate::auth::AuthUser;
use crate::error::{ApiResponse, ApiResult};
use crate::mailer::registration_email;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationView {
    pub registration_status: RegistrationStatus,
    pub payment_status: PaymentStatus,
    pub competition_registration: CompetitionRegistration,
}

impl From<Account> for RegistrationView {
    fn from(account: Account) -> Self {
        Self {
            registration_status: account.competition_registration.status,
            payment_status: account.payment.status,
            competition_registration: account.competition_registration,
        }
    }
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiJson(details): ApiJson<RegistrationDetails>,
) -> ApiResult<Account> {
    let (account, ()) = state
        .update_account(user.id, move |account| {
            account.complete_registration(details, Utc::now())?;
            Ok(())
        })
        .await?;

    info!(
        account_id = %account.id,
        category = account.competition_registration.category.as_deref().unwrap_or("-"),
        "Competition registration completed"
    );
    state.notify(registration_email(&account, Utc::now()));

    Ok(ApiResponse::with_message(
        account,
        "Competition registration completed successfully",
    ))
}

pub async fn registration_status(AuthUser(user): AuthUser) -> ApiResult<RegistrationView> {
    Ok(ApiResponse::ok(RegistrationView::from(user)))
}
