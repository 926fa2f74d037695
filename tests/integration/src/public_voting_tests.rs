//! Public contestant reads and voting over HTTP.

use crate::test_utils::TestApp;
use axum::http::StatusCode;
use serde_json::{json, Value};

fn ids(body: &Value) -> Vec<String> {
    body["data"]["contestants"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_voting_scenario() {
    let app = TestApp::new().await;
    let (_, contestant) = app
        .contestant("Cleo", "cleo@example.com", "Miss", true)
        .await;
    let (voter, _) = app.register("Vic", "vic@example.com").await;
    let uri = format!("/api/contestants/{contestant}/vote");

    let (status, body) = app.post(&uri, Some(&voter), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Vote recorded successfully");
    assert_eq!(body["data"]["votesCount"], 1);

    let (status, body) = app.post(&uri, Some(&voter), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You have already voted for this contestant");

    let (_, body) = app.get(&format!("/api/contestants/{contestant}"), None).await;
    assert_eq!(body["data"]["competitionRegistration"]["votesCount"], 1);
}

#[tokio::test]
async fn test_vote_requires_authentication() {
    let app = TestApp::new().await;
    let (_, contestant) = app
        .contestant("Cleo", "cleo@example.com", "Miss", true)
        .await;

    let (status, _) = app
        .post(&format!("/api/contestants/{contestant}/vote"), None, json!({}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_vote_for_unapproved_or_unknown_contestant() {
    let app = TestApp::new().await;
    let (voter, _) = app.register("Vic", "vic@example.com").await;
    let (_, pending) = app.register("Pat", "pat@example.com").await;

    for target in [pending.as_str(), "4a1e3c5e-0000-4000-8000-000000000000", "nope"] {
        let (status, body) = app
            .post(&format!("/api/contestants/{target}/vote"), Some(&voter), json!({}))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "target {target}");
        assert_eq!(body["message"], "Contestant not found");
    }
}

#[tokio::test]
async fn test_hidden_contestant_never_public() {
    let app = TestApp::new().await;
    let (_, shown) = app
        .contestant("Shown", "shown@example.com", "Miss", true)
        .await;
    let (_, hidden) = app
        .contestant("Hidden", "hidden@example.com", "Miss", false)
        .await;
    let (_, unregistered) = app.register("Paid", "paid@example.com").await;
    app.approve_payment(&unregistered).await;

    let (status, body) = app.get("/api/contestants", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![shown.clone()]);
    assert_eq!(body["data"]["pagination"]["totalContestants"], 1);

    let (status, _) = app.get(&format!("/api/contestants/{hidden}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.get("/api/contestants/stats", None).await;
    assert_eq!(body["data"][0]["category"], "Miss");
    assert_eq!(body["data"][0]["count"], 1);

    // Hidden but approved contestants can still receive votes.
    let (voter, _) = app.register("Vic", "vic@example.com").await;
    let (status, _) = app
        .post(&format!("/api/contestants/{hidden}/vote"), Some(&voter), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_public_payload_omits_private_fields() {
    let app = TestApp::new().await;
    let (_, id) = app
        .contestant("Cleo", "cleo@example.com", "Miss", true)
        .await;

    let (_, list) = app.get("/api/contestants", None).await;
    let (_, detail) = app.get(&format!("/api/contestants/{id}"), None).await;

    for payload in [list.to_string(), detail.to_string()] {
        assert!(!payload.contains("cleo@example.com"));
        assert!(!payload.contains("paymentStatus"));
        assert!(!payload.contains("paymentAmount"));
    }
}

#[tokio::test]
async fn test_listing_filters_sorting_and_paging() {
    let app = TestApp::new().await;
    let (_, a) = app.contestant("Alma", "alma@example.com", "Miss", true).await;
    let (_, b) = app.contestant("Bea", "bea@example.com", "Teen", true).await;
    let (_, c) = app.contestant("Cora", "cora@example.com", "Miss", true).await;

    let (voter, _) = app.register("Vic", "vic@example.com").await;
    let (other, _) = app.register("Val", "val@example.com").await;
    for token in [&voter, &other] {
        app.post(&format!("/api/contestants/{c}/vote"), Some(token.as_str()), json!({}))
            .await;
    }
    app.post(&format!("/api/contestants/{b}/vote"), Some(&voter), json!({}))
        .await;

    let (_, body) = app.get("/api/contestants?sortBy=votes&order=desc", None).await;
    assert_eq!(ids(&body), vec![c.clone(), b.clone(), a.clone()]);

    let (_, body) = app.get("/api/contestants?sortBy=name&order=asc", None).await;
    assert_eq!(ids(&body), vec![a.clone(), b.clone(), c.clone()]);

    let (_, body) = app.get("/api/contestants?category=Miss&sortBy=name&order=asc", None).await;
    assert_eq!(ids(&body), vec![a.clone(), c.clone()]);

    let (_, body) = app.get("/api/contestants?search=BEA", None).await;
    assert_eq!(ids(&body), vec![b.clone()]);

    let (_, body) = app
        .get("/api/contestants?sortBy=name&order=asc&page=2&limit=2", None)
        .await;
    assert_eq!(ids(&body), vec![c]);
    assert_eq!(
        body["data"]["pagination"],
        json!({ "current": 2, "total": 2, "totalContestants": 3 })
    );

    let (status, body) = app.get("/api/contestants?sortBy=shoeSize", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}
