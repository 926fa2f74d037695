//! Photo uploads over multipart/form-data.

use crate::test_utils::{multipart_request, Part, TestApp};
use axum::http::{Method, StatusCode};
use pageant_api::media::MAX_PHOTO_BYTES;

fn png(size: usize) -> Vec<u8> {
    let mut data = vec![0x89, b'P', b'N', b'G'];
    data.resize(size.max(4), 0);
    data
}

#[tokio::test]
async fn test_profile_photo_replaces_previous() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Ada", "ada@example.com").await;

    let upload = |name: &'static str| {
        multipart_request(
            Method::POST,
            "/api/upload/profile-photo",
            &token,
            &[Part::file("photo", name, "image/png", png(64))],
        )
    };

    let first = app.send(upload("first.png")).await;
    assert_eq!(first.status, StatusCode::OK);
    let first_id = first.json()["data"]["id"].as_str().unwrap().to_string();
    assert!(first_id.starts_with("profile-photos/"));
    assert!(first_id.ends_with(".png"));
    assert!(app.photos.contains(&first_id));

    let second = app.send(upload("second.png")).await;
    assert_eq!(second.status, StatusCode::OK);
    let second_id = second.json()["data"]["id"].as_str().unwrap().to_string();

    assert!(!app.photos.contains(&first_id));
    assert!(app.photos.contains(&second_id));
    assert_eq!(app.photos.len(), 1);

    let third = app.send(upload("third.png")).await;
    assert_eq!(third.status, StatusCode::OK);
    let third_id = third.json()["data"]["id"].as_str().unwrap().to_string();
    assert!(!app.photos.contains(&second_id));
    assert_eq!(app.photos.len(), 1);

    let (_, me) = app.get("/api/users/me", Some(&token)).await;
    assert_eq!(
        me["data"]["competitionRegistration"]["profilePhoto"]["id"],
        third_id.as_str()
    );
}

#[tokio::test]
async fn test_upload_rejects_non_images_and_oversized_files() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Ada", "ada@example.com").await;

    let response = app
        .send(multipart_request(
            Method::POST,
            "/api/upload/profile-photo",
            &token,
            &[Part::file("photo", "notes.txt", "text/plain", b"hello".to_vec())],
        ))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json()["message"],
        "Not an image! Please upload only images."
    );

    let response = app
        .send(multipart_request(
            Method::POST,
            "/api/upload/profile-photo",
            &token,
            &[Part::file("photo", "huge.png", "image/png", png(MAX_PHOTO_BYTES + 1))],
        ))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .send(multipart_request(
            Method::POST,
            "/api/upload/profile-photo",
            &token,
            &[Part::text("caption", "no file")],
        ))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["message"], "Please upload an image");
    assert!(app.photos.is_empty());
}

#[tokio::test]
async fn test_competition_photos_and_delete() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Ada", "ada@example.com").await;

    let response = app
        .send(multipart_request(
            Method::POST,
            "/api/upload/competition-photos",
            &token,
            &[
                Part::file("photos", "a.jpg", "image/jpeg", png(32)),
                Part::file("photos", "b.jpg", "image/jpeg", png(32)),
                Part::text("captions", "On stage"),
            ],
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    let photos = body["data"].as_array().unwrap();
    assert_eq!(photos.len(), 2);
    assert_eq!(photos[0]["caption"], "On stage");
    assert_eq!(photos[1]["caption"], "");
    let first = photos[0]["id"].as_str().unwrap().to_string();
    assert!(first.starts_with("competition-photos/"));

    let (status, body) = app
        .request(
            Method::DELETE,
            &format!("/api/upload/competition-photos/{first}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Photo deleted successfully");
    assert!(!app.photos.contains(&first));

    let (_, me) = app.get("/api/users/me", Some(&token)).await;
    let gallery = me["data"]["competitionRegistration"]["photos"]
        .as_array()
        .unwrap();
    assert_eq!(gallery.len(), 1);

    let (status, body) = app
        .request(
            Method::DELETE,
            &format!("/api/upload/competition-photos/{first}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Photo not found");
}

#[tokio::test]
async fn test_gallery_upload_limit() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Ada", "ada@example.com").await;

    let parts: Vec<_> = (0..6)
        .map(|_| Part::file("photos", "p.png", "image/png", png(16)))
        .collect();
    let response = app
        .send(multipart_request(
            Method::POST,
            "/api/upload/competition-photos",
            &token,
            &parts,
        ))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(app.photos.is_empty());

    let response = app
        .send(multipart_request(
            Method::POST,
            "/api/upload/competition-photos",
            &token,
            &[Part::text("captions", "orphan caption")],
        ))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json()["message"],
        "Please upload at least one image"
    );
}
