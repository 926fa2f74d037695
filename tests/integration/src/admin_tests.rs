//! Admin surface over HTTP: role checks, contestant management, analytics
//! and export.

use crate::test_utils::TestApp;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::json;

#[tokio::test]
async fn test_admin_routes_forbidden_for_users() {
    let app = TestApp::new().await;
    let (token, id) = app.register("Ada", "ada@example.com").await;

    for uri in [
        "/api/admin/dashboard",
        "/api/admin/contestants",
        "/api/admin/payment-stats",
        "/api/admin/categories",
    ] {
        let (status, body) = app.get(uri, Some(&token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(
            body["message"],
            "You do not have permission to perform this action"
        );
    }

    let (status, _) = app
        .patch(
            &format!("/api/users/payment-status/{id}"),
            Some(&token),
            json!({ "paymentStatus": "approved" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_payment_review_with_malformed_user_id() {
    let app = TestApp::new().await;

    let (status, body) = app
        .patch(
            "/api/users/payment-status/not-a-uuid",
            Some(&app.admin_token),
            json!({ "paymentStatus": "approved" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "User not found");
    assert_eq!(body["statusCode"], 404);
}

#[tokio::test]
async fn test_dashboard_and_reports() {
    let app = TestApp::new().await;
    let (_, cleo) = app.contestant("Cleo", "cleo@example.com", "Miss", true).await;
    app.contestant("Dana", "dana@example.com", "Teen", false).await;
    let (voter, _) = app.register("Vic", "vic@example.com").await;
    app.post(&format!("/api/contestants/{cleo}/vote"), Some(&voter), json!({}))
        .await;

    let admin = Some(app.admin_token.as_str());

    let (status, body) = app.get("/api/admin/dashboard", admin).await;
    assert_eq!(status, StatusCode::OK);
    let recent = body["data"]["recentRegistrations"].as_array().unwrap();
    assert_eq!(recent.len(), 2);
    assert!(recent.iter().all(|r| r["email"].is_string()));

    let (_, body) = app.get("/api/admin/categories", admin).await;
    let categories = body["data"].as_array().unwrap();
    let miss = categories.iter().find(|c| c["category"] == "Miss").unwrap();
    assert_eq!(miss["contestantCount"], 1);
    assert_eq!(miss["totalVotes"], 1);
    assert_eq!(miss["approvalRate"], 100.0);

    let (status, body) = app
        .get("/api/admin/voting-analytics?timeframe=week", admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["voteCount"], 1);
    assert_eq!(body["data"][0]["category"], "Miss");

    let (status, _) = app
        .get("/api/admin/voting-analytics?timeframe=decade", admin)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.get("/api/admin/payment-stats", admin).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_array());

    let (status, body) = app
        .get(
            "/api/admin/revenue-analytics?startDate=2000-01-01&endDate=2999-12-31",
            admin,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_array());

    let (status, _) = app
        .get(
            "/api/admin/revenue-analytics?startDate=yesterday&endDate=today",
            admin,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_contestant_listing_and_detail() {
    let app = TestApp::new().await;
    let (_, cleo) = app.contestant("Cleo", "cleo@example.com", "Miss", true).await;
    app.register("Pat", "pat@example.com").await;
    let (voter, _) = app.register("Vic", "vic@example.com").await;
    app.post(&format!("/api/contestants/{cleo}/vote"), Some(&voter), json!({}))
        .await;

    let admin = Some(app.admin_token.as_str());

    let (_, body) = app
        .get("/api/admin/contestants?paymentStatus=pending&search=example.com&sortBy=name&order=asc", admin)
        .await;
    let names: Vec<_> = body["data"]["contestants"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Pat", "Vic"]);

    let (_, body) = app
        .get("/api/admin/contestants?status=completed", admin)
        .await;
    assert_eq!(body["data"]["pagination"]["totalContestants"], 1);
    assert_eq!(body["data"]["contestants"][0]["email"], "cleo@example.com");

    let (status, body) = app
        .get(&format!("/api/admin/contestants/{cleo}"), admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["contestant"]["name"], "Cleo");
    let votes = body["data"]["votes"].as_array().unwrap();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0]["voterEmail"], "vic@example.com");

    let (status, body) = app
        .get("/api/admin/contestants/4a1e3c5e-0000-4000-8000-000000000000", admin)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Contestant not found");
}

#[tokio::test]
async fn test_contestant_update_and_bulk_update() {
    let app = TestApp::new().await;
    let (_, a) = app.register("Ann", "ann@example.com").await;
    let (_, b) = app.register("Bo", "bo@example.com").await;
    let admin = Some(app.admin_token.as_str());

    let (status, body) = app
        .patch(
            &format!("/api/admin/contestants/{a}"),
            admin,
            json!({ "paymentStatus": "rejected", "notes": "blurry receipt" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Contestant status updated successfully");
    assert_eq!(body["data"]["paymentStatus"], "rejected");
    assert_eq!(body["data"]["paymentNotes"], "blurry receipt");

    let (status, body) = app
        .post(
            "/api/admin/contestants/bulk-update",
            admin,
            json!({
                "contestantIds": [a, b, "4a1e3c5e-0000-4000-8000-000000000000"],
                "paymentStatus": "approved",
                "notes": "batch"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["modifiedCount"], 2);
    assert_eq!(body["message"], "Updated 2 contestants");

    let (_, body) = app
        .get(&format!("/api/admin/contestants/{b}"), admin)
        .await;
    assert_eq!(body["data"]["contestant"]["paymentStatus"], "approved");
    assert!(body["data"]["contestant"]["competitionRegistration"]["approvalDate"].is_string());

    let mails = app.wait_for_mail(3).await;
    assert!(mails.iter().any(|m| m.to == "bo@example.com"
        && m.subject == "Welcome to Global Heritage Pageant - Payment Approved!"));
}

#[tokio::test]
async fn test_export_formats() {
    let app = TestApp::new().await;
    app.contestant("Cleo", "cleo@example.com", "Miss", true).await;
    app.register("Pat, Jr.", "pat@example.com").await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/admin/contestants/export?format=csv")
        .header(header::AUTHORIZATION, format!("Bearer {}", app.admin_token))
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.headers[header::CONTENT_DISPOSITION],
        "attachment; filename=contestants.csv"
    );

    let csv = response.text();
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines[0], "name,email,paymentStatus,category,votes");
    assert!(lines.contains(&"Cleo,cleo@example.com,approved,Miss,0"));
    assert!(lines.contains(&"\"Pat, Jr.\",pat@example.com,pending,,0"));

    let (status, body) = app
        .get(
            "/api/admin/contestants/export?status=approved",
            Some(&app.admin_token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["email"], "cleo@example.com");
}
