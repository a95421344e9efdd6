mod common;

use assert_matches::assert_matches;
use crux_kv::KeyValueOperation;
use serde_json::json;

use shared::capabilities::{KvOutput, KvValue};
use shared::model::{AppState, AuthScreen, Role};
use shared::{ErrorKind, Event, Model};

use common::{header, json_body, respond, secret, signed_in, user_json, Effects, Tester};

#[test]
fn test_start_without_stored_token_shows_login() {
    let app = Tester::default();
    let mut model = Model::default();

    let update = app.update(Event::AppStarted, &mut model);
    assert_eq!(model.state, AppState::Loading);
    let mut keys = update.kv_keys();
    keys.sort();
    assert_eq!(keys, vec!["session:token", "settings:preferences"]);
    assert!(update.has_render());

    let update = app.update(
        Event::StoredTokenLoaded(Box::new(Ok(KvOutput::Value { value: None }))),
        &mut model,
    );
    assert_eq!(model.state, AppState::Unauthenticated);
    assert!(update.http().is_empty());
}

#[test]
fn test_stored_token_is_validated_against_me() {
    let app = Tester::default();
    let mut model = Model::default();
    app.update(Event::AppStarted, &mut model);

    let stored = KvValue::new(b"token-abc".to_vec()).unwrap();
    let update = app.update(
        Event::StoredTokenLoaded(Box::new(Ok(KvOutput::Value { value: Some(stored) }))),
        &mut model,
    );
    let me = update.find_http("/auth/me").expect("me request");
    assert_eq!(header(me, "Authorization"), Some("Bearer token-abc"));

    let update = app.update(
        Event::CurrentUserResponse(respond(200, json!({ "user": user_json(7, "user") }))),
        &mut model,
    );
    assert_eq!(model.state, AppState::Ready);
    assert!(model.is_authenticated());
    assert!(update.find_http("/incidents/mine").is_some());
    assert!(update.find_http("/users/points").is_some());
}

#[test]
fn test_rejected_stored_token_is_cleared() {
    let app = Tester::default();
    let mut model = Model::default();
    let stored = KvValue::new(b"expired".to_vec()).unwrap();
    app.update(
        Event::StoredTokenLoaded(Box::new(Ok(KvOutput::Value { value: Some(stored) }))),
        &mut model,
    );

    let update = app.update(
        Event::CurrentUserResponse(respond(401, json!({ "msg": "Token has expired" }))),
        &mut model,
    );
    assert_eq!(model.state, AppState::Unauthenticated);
    assert!(model.token.is_none());
    assert_matches!(update.kv()[..], [KeyValueOperation::Delete { .. }]);
}

#[test]
fn test_login_validation_happens_before_any_request() {
    let app = Tester::default();
    let mut model = Model::default();
    model.state = AppState::Unauthenticated;

    let update = app.update(
        Event::LoginRequested {
            email: "not-an-email".into(),
            password: secret("hunter22"),
        },
        &mut model,
    );
    assert!(update.http().is_empty());
    assert_eq!(model.active_error.as_ref().map(|e| e.kind), Some(ErrorKind::Validation));
    assert_eq!(model.state, AppState::Unauthenticated);
}

#[test]
fn test_login_persists_token_and_opens_dashboard() {
    let app = Tester::default();
    let mut model = Model::default();
    model.state = AppState::Unauthenticated;

    let update = app.update(
        Event::LoginRequested {
            email: " amina@example.com ".into(),
            password: secret("hunter22"),
        },
        &mut model,
    );
    assert_eq!(model.state, AppState::Authenticating);
    let login = update.find_http("/auth/login").expect("login request");
    assert_eq!(login.method, "POST");
    let body = json_body(login);
    assert_eq!(body, json!({ "email": "amina@example.com", "password": "hunter22" }));

    let update = app.update(
        Event::LoginResponse(respond(
            200,
            json!({ "access_token": "jwt-123", "user": user_json(3, "admin") }),
        )),
        &mut model,
    );
    assert_eq!(model.state, AppState::Ready);
    assert_eq!(model.role(), Some(Role::Admin));

    let persist = update
        .kv()
        .into_iter()
        .find(|op| matches!(op, KeyValueOperation::Set { key, .. } if key == "session:token"))
        .expect("persist");
    assert_matches!(persist, KeyValueOperation::Set { value, .. } if value.as_slice() == b"jwt-123");
    // Admins see every incident and have no points tile.
    assert!(update.find_http("/incidents").is_some());
    assert!(update.find_http("/users/points").is_none());
}

#[test]
fn test_failed_login_surfaces_server_message() {
    let app = Tester::default();
    let mut model = Model::default();
    model.state = AppState::Authenticating;

    app.update(
        Event::LoginResponse(respond(401, json!({ "msg": "Invalid credentials" }))),
        &mut model,
    );
    assert_eq!(model.state, AppState::Unauthenticated);
    let error = model.active_error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::Authentication);
    assert_eq!(error.user_facing_message(), "Invalid credentials");
}

#[test]
fn test_signup_success_returns_to_login() {
    let app = Tester::default();
    let mut model = Model::default();
    model.state = AppState::Unauthenticated;
    model.auth_screen = AuthScreen::Signup;

    let update = app.update(
        Event::SignupRequested {
            name: "Amina".into(),
            email: "amina@example.com".into(),
            phone: Some("  ".into()),
            password: secret("secret1"),
        },
        &mut model,
    );
    let body = json_body(update.find_http("/auth/signup").unwrap());
    assert!(body.get("phone").is_none());

    app.update(
        Event::SignupResponse(respond(201, json!({ "msg": "User registered successfully" }))),
        &mut model,
    );
    assert_eq!(model.auth_screen, AuthScreen::Login);
    assert_eq!(model.auth_notice.as_deref(), Some("User registered successfully"));
}

#[test]
fn test_short_signup_password_rejected() {
    let app = Tester::default();
    let mut model = Model::default();

    let update = app.update(
        Event::SignupRequested {
            name: "Amina".into(),
            email: "amina@example.com".into(),
            phone: None,
            password: secret("123"),
        },
        &mut model,
    );
    assert!(update.http().is_empty());
    assert!(model
        .active_error
        .as_ref()
        .unwrap()
        .message
        .contains("at least 6"));
}

#[test]
fn test_password_change_requires_matching_confirmation() {
    let app = Tester::default();
    let mut model = signed_in("user");

    let update = app.update(
        Event::ChangePasswordRequested {
            current_password: secret("oldpass"),
            new_password: secret("newpass1"),
            confirm_password: secret("newpass2"),
        },
        &mut model,
    );
    assert!(update.http().is_empty());
    assert_eq!(model.active_error.as_ref().unwrap().message, "Passwords do not match");

    let update = app.update(
        Event::ChangePasswordRequested {
            current_password: secret("oldpass"),
            new_password: secret("newpass1"),
            confirm_password: secret("newpass1"),
        },
        &mut model,
    );
    let change = update.find_http("/auth/change-password").unwrap();
    assert_eq!(change.method, "PUT");
}

#[test]
fn test_any_401_ends_the_session() {
    let app = Tester::default();
    let mut model = signed_in("user");

    let update = app.update(
        Event::PointsResponse(respond(401, json!({ "msg": "Token has expired" }))),
        &mut model,
    );
    assert_eq!(model.state, AppState::Unauthenticated);
    assert!(!model.is_authenticated());
    assert!(model.auth_notice.as_deref().unwrap().contains("expired"));
    assert_matches!(update.kv()[..], [KeyValueOperation::Delete { .. }]);
}

#[test]
fn test_logout_clears_everything() {
    let app = Tester::default();
    let mut model = signed_in("admin");

    let update = app.update(Event::LogoutRequested, &mut model);
    assert_eq!(model.state, AppState::Unauthenticated);
    assert!(model.user.is_none());
    assert!(model.incidents.is_empty());
    let deleted: Vec<String> = update.kv_keys();
    assert_eq!(deleted, vec!["session:token"]);
}
