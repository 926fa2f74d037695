use axum::extract::{ConnectInfo, Path, State};
use axum::http::HeaderMap;
use chrono::Utc;
use pageant_core::{
    AccountId, PageRequest, PublicCategoryStats, PublicContestant, PublicContestantQuery,
    PublicSort, SortOrder, VoteReceipt,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use super::{client_ip, ApiQuery, ContestantList};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub category: Option<String>,
    pub search: Option<String>,
    #[serde(default)]
    pub sort_by: PublicSort,
    #[serde(default)]
    pub order: SortOrder,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl From<ListParams> for PublicContestantQuery {
    fn from(params: ListParams) -> Self {
        Self {
            category: params.category,
            search: params.search,
            sort: params.sort_by,
            order: params.order,
            page: PageRequest::new(params.page, params.limit),
        }
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Contestant not found".to_string())
}

/// Malformed ids are reported the same way as unknown ones
fn contestant_id(raw: &str) -> Result<AccountId, ApiError> {
    raw.parse().map_err(|_| not_found())
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<ContestantList<PublicContestant>> {
    let query = PublicContestantQuery::from(params);
    let page = state
        .with_store(move |store| store.public_contestants(&query))
        .await?;
    Ok(ApiResponse::ok(page.into()))
}

pub async fn stats(State(state): State<Arc<AppState>>) -> ApiResult<Vec<PublicCategoryStats>> {
    let stats = state
        .with_store(|store| store.public_category_stats())
        .await?;
    Ok(ApiResponse::ok(stats))
}

pub async fn detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<PublicContestant> {
    let id = contestant_id(&id)?;
    let contestant = state
        .with_store(move |store| store.public_contestant(id))
        .await?
        .ok_or_else(not_found)?;
    Ok(ApiResponse::ok(contestant))
}

pub async fn vote(
    State(state): State<Arc<AppState>>,
    AuthUser(voter): AuthUser,
    Path(id): Path<String>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> ApiResult<VoteReceipt> {
    let contestant = contestant_id(&id)?;
    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));

    let voter_id = voter.id;
    let receipt = state
        .with_store(move |store| {
            store.cast_vote(contestant, voter_id, ip.as_deref(), Utc::now())
        })
        .await?;

    info!(
        contestant_id = %contestant,
        voter_id = %voter_id,
        votes = receipt.votes_count,
        "Vote recorded"
    );

    Ok(ApiResponse::with_message(receipt, "Vote recorded successfully"))
}
