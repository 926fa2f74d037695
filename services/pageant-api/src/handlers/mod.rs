//! HTTP handlers, grouped by route prefix.

pub mod admin;
pub mod auth;
pub mod competition;
pub mod contestants;
pub mod upload;
pub mod users;

use async_trait::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::Json;
use pageant_core::Page;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};

use crate::error::ApiError;

/// JSON body whose rejection uses the API error shape
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::Validation(rejection.body_text())),
        }
    }
}

/// Query string whose rejection uses the API error shape
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(ApiError::Validation(rejection.body_text())),
        }
    }
}

/// Pagination block of listing responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current: u32,
    pub total: u64,
    pub total_contestants: u64,
}

#[derive(Debug, Serialize)]
pub struct ContestantList<T> {
    pub contestants: Vec<T>,
    pub pagination: Pagination,
}

impl<T> From<Page<T>> for ContestantList<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            pagination: Pagination {
                current: page.current,
                total: page.total,
                total_contestants: page.total_items,
            },
            contestants: page.items,
        }
    }
}

/// Best-effort client address: proxy headers first, then the socket peer
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim);
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim);

    forwarded
        .into_iter()
        .chain(real_ip)
        .find_map(|raw| raw.parse::<IpAddr>().ok())
        .or_else(|| peer.map(|addr| addr.ip()))
        .map(|ip| ip.to_string())
}

/// Required string field: present and non-blank
pub(crate) fn required<'a>(value: &'a Option<String>, message: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Validation(message.to_string()))
}
