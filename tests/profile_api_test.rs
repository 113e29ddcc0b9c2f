mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn create_and_list_profiles() {
    let app = TestApp::spawn();
    let alice = app.user("alice", false);

    let (status, body) = app
        .post(
            "/api/baby-profiles",
            Some(&alice.token),
            json!({
                "name": "Mia",
                "birthdate": "2024-01-15T06:00:00Z",
                "is_premature": true,
                "premature_weeks": 4
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["birthdate"], "2024-01-15");
    assert_eq!(body["data"]["premature_weeks"], 4);
    assert!(body["data"].get("user_id").is_none());
    assert!(body["meta"]["createdAt"].is_string());

    app.profile(&alice.token, "Leo").await;

    let (status, body) = app.get("/api/baby-profiles/me", &alice.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 2);
    assert_eq!(body["data"][1]["name"], "Leo");
}

#[tokio::test]
async fn create_validation_errors() {
    let app = TestApp::spawn();
    let alice = app.user("alice", false);

    let cases = [
        (json!({ "name": "Mia" }), "Name and birthdate are required"),
        (
            json!({ "name": "Mia", "birthdate": "January" }),
            "Invalid birthdate format. Use YYYY-MM-DD",
        ),
        (
            json!({ "name": "Mia", "birthdate": "2024-01-15", "is_premature": true }),
            "premature_weeks must be between 1 and 20 when is_premature is true",
        ),
    ];
    for (body, message) in cases {
        let (status, response) = app.post("/api/baby-profiles", Some(&alice.token), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"]["message"], message);
    }
    assert_eq!(app.count("SELECT COUNT(*) FROM baby_profiles"), 0);
}

#[tokio::test]
async fn update_is_partial_and_owner_only() {
    let app = TestApp::spawn();
    let alice = app.user("alice", false);
    let bob = app.user("bob", false);
    let profile = app.profile(&alice.token, "Mia").await;
    let uri = format!("/api/baby-profiles/{}", profile);

    let (status, body) = app
        .request(
            Method::PUT,
            &uri,
            Some(&alice.token),
            Some(json!({ "avatar_url": "https://img/mia.png" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["name"], "Mia");
    assert_eq!(body["data"]["avatar_url"], "https://img/mia.png");

    let (status, body) = app
        .request(
            Method::PUT,
            &uri,
            Some(&alice.token),
            Some(json!({ "is_premature": true, "premature_weeks": 30 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "premature_weeks must be between 1 and 20 when is_premature is true"
    );

    let (status, body) = app
        .request(Method::PUT, &uri, Some(&bob.token), Some(json!({ "name": "Mine" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["error"]["message"],
        "You are not authorized to update this profile"
    );

    let (status, _) = app.get(&uri, &bob.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app.get(&uri, &alice.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["documentId"], profile.as_str());
}

#[tokio::test]
async fn delete_cascades_to_activities() {
    let app = TestApp::spawn();
    let alice = app.user("alice", false);
    let profile = app.profile(&alice.token, "Mia").await;
    let other = app.profile(&alice.token, "Leo").await;

    for (p, local) in [(&profile, "a"), (&profile, "b"), (&other, "c")] {
        let (status, _) = app
            .post(
                "/api/baby-activities/sync",
                Some(&alice.token),
                json!({
                    "baby_profile_id": p,
                    "activities": [{
                        "local_id": local,
                        "type": "pee",
                        "timestamp": "2024-05-01T08:30:00Z",
                        "data": { "wetLevel": "normal" }
                    }]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let uri = format!("/api/baby-profiles/{}", profile);
    let (status, body) = app.request(Method::DELETE, &uri, Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], serde_json::Value::Null);
    assert_eq!(body["meta"]["activitiesDeleted"], 2);

    assert_eq!(app.count("SELECT COUNT(*) FROM baby_activities"), 1);
    let (status, _) = app.get(&uri, &alice.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profiles_require_a_session() {
    let app = TestApp::spawn();
    let (status, body) = app
        .request(Method::GET, "/api/baby-profiles/me", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "You must be logged in");

    let (status, _) = app
        .request(Method::GET, "/api/baby-profiles/me", Some("bogus-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_typed_field_is_a_json_bad_request() {
    let app = TestApp::spawn();
    let alice = app.user("alice", false);

    let (status, body) = app
        .post(
            "/api/baby-profiles",
            Some(&alice.token),
            json!({ "name": "Mia", "birthdate": "2024-01-15", "premature_weeks": "4" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["status"], 400);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("premature_weeks"));
    assert_eq!(app.count("SELECT COUNT(*) FROM baby_profiles"), 0);
}
