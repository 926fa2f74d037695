//! Account lifecycle over HTTP: register, login, profile, payment and
//! competition registration.

use crate::test_utils::{TestApp, PASSWORD};
use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_register_and_login() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({ "name": "  Ada Lovelace ", "email": "ADA@Example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    let user = &body["data"]["user"];
    assert_eq!(user["name"], "Ada Lovelace");
    assert_eq!(user["email"], "ada@example.com");
    assert_eq!(user["role"], "user");
    assert!(user.get("passwordHash").is_none());
    assert!(user.get("password_hash").is_none());

    let token = app.login("ada@example.com", PASSWORD).await;
    let (status, me) = app.get("/api/users/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["email"], "ada@example.com");
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_short_passwords() {
    let app = TestApp::new().await;
    app.register("Ada", "ada@example.com").await;

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({ "name": "Other", "email": "ada@example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Email already registered");

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({ "name": "Bob", "email": "bob@example.com", "password": "short" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["statusCode"], 400);
}

#[tokio::test]
async fn test_login_failures() {
    let app = TestApp::new().await;
    app.register("Ada", "ada@example.com").await;

    let (status, body) = app
        .post("/api/auth/login", None, json!({ "email": "ada@example.com" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please provide email and password");

    for (email, password) in [
        ("ada@example.com", "wrong-password"),
        ("nobody@example.com", PASSWORD),
    ] {
        let (status, body) = app
            .post(
                "/api/auth/login",
                None,
                json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials");
    }
}

#[tokio::test]
async fn test_protected_routes_need_a_valid_token() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/users/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body,
        json!({
            "success": false,
            "message": "Not authorized to access this route",
            "statusCode": 401
        })
    );

    let (status, _) = app.get("/api/users/me", Some("garbage.token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_me_only_touches_identity_fields() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Ada", "ada@example.com").await;

    let (status, body) = app
        .patch(
            "/api/users/me",
            Some(&token),
            json!({ "name": "Ada King", "role": "admin", "paymentStatus": "approved" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Ada King");
    assert_eq!(body["data"]["role"], "user");
    assert_eq!(body["data"]["paymentStatus"], "pending");

    let (status, body) = app
        .patch("/api/users/updateme", Some(&token), json!({ "email": "ada@king.org" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "ada@king.org");
}

#[tokio::test]
async fn test_payment_submission_and_review() {
    let app = TestApp::new().await;
    let (token, id) = app.register("Ada", "ada@example.com").await;

    let (status, body) = app
        .post(
            "/api/users/submit-payment",
            Some(&token),
            json!({ "paymentId": "PAY-1", "amount": 150.0 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Payment submitted successfully");
    assert_eq!(body["data"]["paymentStatus"], "processing");
    assert_eq!(body["data"]["paymentId"], "PAY-1");

    let (status, body) = app
        .patch(
            &format!("/api/users/payment-status/{id}"),
            Some(&app.admin_token),
            json!({ "paymentStatus": "approved", "paymentNotes": "ok" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Payment status updated to approved");

    let (_, body) = app.get("/api/users/payment-status", Some(&token)).await;
    assert_eq!(body["data"]["paymentStatus"], "approved");
    assert_eq!(body["data"]["paymentAmount"], 150.0);
    assert!(body["data"]["paymentDate"].is_string());

    app.wait_for_mail(2).await;
    let subjects: Vec<_> = app
        .mailer
        .sent_to("ada@example.com")
        .into_iter()
        .map(|m| m.subject)
        .collect();
    assert!(subjects.contains(&"Payment Processing - Global Heritage Pageant".to_string()));
    assert!(subjects
        .contains(&"Welcome to Global Heritage Pageant - Payment Approved!".to_string()));
}

#[tokio::test]
async fn test_update_payment_id_and_alias() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Ada", "ada@example.com").await;

    let (status, body) = app
        .post(
            "/api/auth/update-payment-id",
            Some(&token),
            json!({ "paymentId": " REF-9 " }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["paymentId"], "REF-9");

    let (status, _) = app
        .post(
            "/api/auth/updatePaymentId",
            Some(&token),
            json!({ "paymentId": "REF-10" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_registration_requires_approved_payment() {
    let app = TestApp::new().await;
    let (token, id) = app.register("Ada", "ada@example.com").await;

    let (status, body) = app
        .post(
            "/api/competition/register",
            Some(&token),
            json!({ "category": "Miss" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please complete payment before registration");

    app.approve_payment(&id).await;
    let (status, body) = app
        .post(
            "/api/competition/register",
            Some(&token),
            json!({ "category": "Miss", "age": 23, "talents": ["singing"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["message"],
        "Competition registration completed successfully"
    );

    let (_, body) = app
        .get("/api/competition/registration-status", Some(&token))
        .await;
    assert_eq!(body["data"]["registrationStatus"], "completed");
    assert_eq!(body["data"]["paymentStatus"], "approved");
    assert_eq!(body["data"]["competitionRegistration"]["category"], "Miss");
}

#[tokio::test]
async fn test_health_probe() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_unknown_route_uses_error_shape() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/api/nowhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({ "success": false, "message": "Route not found", "statusCode": 404 })
    );
}
