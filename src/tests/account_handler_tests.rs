use super::{TestApp, TestBody};
use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

fn user_data() -> Value {
    json!({
        "email": "test_user@email.com",
        "username": "testinger",
        "password": "12345678!",
        "password2": "12345678!",
        "first_name": "Tester",
        "last_name": "Testerov",
    })
}

async fn register(app: &TestApp, data: Value) -> (StatusCode, Value) {
    app.request(Method::POST, "/auth/register", None, TestBody::Json(data))
        .await
}

async fn login(app: &TestApp, email: &str, password: &str) -> (StatusCode, Value) {
    app.request(
        Method::POST,
        "/auth/login",
        None,
        TestBody::Json(json!({ "email": email, "password": password })),
    )
    .await
}

#[tokio::test]
async fn register_returns_user_without_password() {
    let app = TestApp::new().await;

    let (status, body) = register(&app, user_data()).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body,
        json!({
            "email": "test_user@email.com",
            "username": "testinger",
            "first_name": "Tester",
            "last_name": "Testerov",
        })
    );
    assert_eq!(app.count("users").await, 1);
}

#[tokio::test]
async fn register_reports_every_taken_field() {
    let app = TestApp::new().await;
    assert_eq!(register(&app, user_data()).await.0, StatusCode::CREATED);

    let (status, body) = register(&app, user_data()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({
            "username": ["A user with that username already exists."],
            "email": ["This field must be unique."],
        })
    );

    let mut other_username = user_data();
    other_username["username"] = json!("testingerd");
    let (status, body) = register(&app, other_username).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "email": ["This field must be unique."] }));
    assert_eq!(app.count("users").await, 1);
}

#[tokio::test]
async fn register_validates_required_fields_and_confirmation() {
    let app = TestApp::new().await;

    let (status, body) = register(&app, json!({ "email": "not-an-email", "username": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({
            "email": ["Enter a valid email address."],
            "username": ["This field may not be blank."],
            "password": ["This field is required."],
        })
    );

    let mut mismatch = user_data();
    mismatch["password2"] = json!("something else");
    let (status, body) = register(&app, mismatch).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "password": ["Password fields didn't match."] }));
    assert_eq!(app.count("users").await, 0);
}

#[tokio::test]
async fn login_issues_one_token_per_user() {
    let app = TestApp::new().await;
    register(&app, user_data()).await;

    let (status, first) = login(&app, "test_user@email.com", "12345678!").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["email"], "test_user@email.com");
    let token = first["token"].as_str().unwrap();
    assert!(!token.is_empty());

    let (_, second) = login(&app, "test_user@email.com", "12345678!").await;
    assert_eq!(second["token"], first["token"]);
    assert_eq!(app.count("auth_tokens").await, 1);
}

#[tokio::test]
async fn login_rejects_wrong_password_and_unknown_email() {
    let app = TestApp::new().await;
    register(&app, user_data()).await;

    let (status, body) = login(&app, "test_user@email.com", "12345678!!INCORRECT_PASS!").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "detail": "Password is incorrect." }));

    let (status, body) = login(&app, "nobody@email.com", "12345678!").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "Not found." }));
    assert_eq!(app.count("auth_tokens").await, 0);
}

#[tokio::test]
async fn profile_requires_a_valid_token() {
    let app = TestApp::new().await;
    register(&app, user_data()).await;
    let (_, login_body) = login(&app, "test_user@email.com", "12345678!").await;
    let token = login_body["token"].as_str().unwrap().to_string();

    let (status, mut body) = app.get("/auth/profile", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["id"].is_i64());
    assert!(body["date_joined"].is_string());
    let object = body.as_object_mut().unwrap();
    object.remove("id");
    object.remove("date_joined");
    assert_eq!(
        body,
        json!({
            "username": "testinger",
            "first_name": "Tester",
            "last_name": "Testerov",
            "email": "test_user@email.com",
        })
    );

    let (status, body) = app
        .request(Method::GET, "/auth/profile", None, TestBody::Empty)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body,
        json!({ "detail": "Authentication credentials were not provided." })
    );

    let (status, body) = app.get("/auth/profile", "bogus").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "detail": "Invalid token." }));
}

#[tokio::test]
async fn promoted_user_becomes_staff() {
    let app = TestApp::new().await;
    let (user, _) = app.create_user("boss@email.com", "boss", false).await;
    assert!(!user.is_staff);

    let promoted = app
        .state
        .accounts
        .promote_admin("boss@email.com")
        .await
        .unwrap();
    assert!(promoted.is_staff);
    assert!(app.state.accounts.promote_admin("ghost@email.com").await.is_err());
}

#[tokio::test]
async fn malformed_account_bodies_are_json_400s() {
    let app = TestApp::new().await;

    for uri in ["/auth/register", "/auth/login"] {
        let (status, body) = app
            .request(
                Method::POST,
                uri,
                None,
                TestBody::Raw(Some("application/json".into()), b"not json".to_vec()),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string(), "unexpected body {}", body);

        let (status, body) = app.request(Method::POST, uri, None, TestBody::Empty).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string(), "unexpected body {}", body);
    }

    let mut numeric_email = user_data();
    numeric_email["email"] = json!(42);
    let (status, _) = register(&app, numeric_email).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.count("users").await, 0);
}
