#![cfg(feature = "shell")]

mod common;

use async_trait::async_trait;
use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use shared::shell::{HttpExecutor, KvStore, MemoryKvStore, Shell};
use shared::view::{PageView, ViewModel, ViewState};
use shared::{AppConfig, Event};

use common::{incident_json, secret, user_json};

/// Answers from a fixed route table and records what was asked.
struct ScriptedBackend {
    routes: Vec<(&'static str, &'static str, u16, Value)>,
    seen: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn new(routes: Vec<(&'static str, &'static str, u16, Value)>) -> Self {
        Self {
            routes,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpExecutor for ScriptedBackend {
    async fn execute(&self, request: HttpRequest) -> HttpResult {
        let path = url::Url::parse(&request.url).unwrap().path().to_string();
        self.seen.lock().unwrap().push(format!("{} {path}", request.method));

        let route = self
            .routes
            .iter()
            .find(|(method, suffix, _, _)| *method == request.method && path.ends_with(suffix));
        let (status, body) = match route {
            Some((_, _, status, body)) => (*status, body.clone()),
            None => (404, json!({ "msg": "Not found" })),
        };
        HttpResult::Ok(
            HttpResponse::status(status)
                .body(serde_json::to_vec(&body).unwrap())
                .build(),
        )
    }
}

struct SharedBackend(Arc<ScriptedBackend>);

#[async_trait]
impl HttpExecutor for SharedBackend {
    async fn execute(&self, request: HttpRequest) -> HttpResult {
        self.0.execute(request).await
    }
}

fn backend(role: &str) -> ScriptedBackend {
    ScriptedBackend::new(vec![
        (
            "POST",
            "/auth/login",
            200,
            json!({ "access_token": "jwt-shell", "user": user_json(7, role) }),
        ),
        ("GET", "/auth/me", 200, json!({ "user": user_json(7, role) })),
        (
            "GET",
            "/incidents/mine",
            200,
            json!([incident_json(1, 7, "pending"), incident_json(2, 7, "resolved")]),
        ),
        ("GET", "/users/points", 200, json!({ "points": 40 })),
    ])
}

async fn stored_token(token: &[u8]) -> MemoryKvStore {
    let kv = MemoryKvStore::new();
    kv.set("session:token", token.to_vec()).await.unwrap();
    kv
}

/// Incident count and point balance shown on the citizen dashboard.
fn dashboard_summary(view: &ViewModel) -> Option<(usize, Option<u32>)> {
    match &view.state {
        ViewState::Dashboard { page, .. } => match page.as_ref() {
            PageView::Incidents { total, points, .. } => {
                Some((*total, points.as_ref().map(|p| p.points)))
            }
            _ => None,
        },
        _ => None,
    }
}

#[tokio::test]
async fn test_first_launch_then_login() {
    let mut shell = Shell::new(AppConfig::default(), backend("user"), MemoryKvStore::new());

    let view = shell.dispatch(Event::AppStarted).await;
    assert!(matches!(view.state, ViewState::Unauthenticated { .. }));
    assert!(!view.is_authenticated);

    let view = shell
        .dispatch(Event::LoginRequested {
            email: "user7@example.com".into(),
            password: secret("hunter22"),
        })
        .await;
    assert!(view.is_authenticated);
    assert_eq!(dashboard_summary(&view), Some((2, Some(40))));
    assert_eq!(shell.kv().get("session:token").await.unwrap(), Some(b"jwt-shell".to_vec()));
    assert!(shell.renders() > 0);
}

#[tokio::test]
async fn test_stored_session_is_resumed() {
    let kv = stored_token(b"jwt-stored").await;

    let mut shell = Shell::new(AppConfig::default(), backend("user"), kv);
    let view = shell.dispatch(Event::AppStarted).await;

    assert!(view.is_authenticated);
    assert_eq!(view.user.as_ref().map(|u| u.name.as_str()), Some("User 7"));
    assert_eq!(dashboard_summary(&view).map(|(total, _)| total), Some(2));
}

#[tokio::test]
async fn test_logout_removes_stored_token() {
    let mut shell = Shell::new(AppConfig::default(), backend("user"), MemoryKvStore::new());
    shell.dispatch(Event::AppStarted).await;
    shell
        .dispatch(Event::LoginRequested {
            email: "user7@example.com".into(),
            password: secret("hunter22"),
        })
        .await;
    assert!(shell.kv().exists("session:token").await.unwrap());

    let view = shell.dispatch(Event::LogoutRequested).await;
    assert!(!view.is_authenticated);
    assert!(!shell.kv().exists("session:token").await.unwrap());
}

#[tokio::test]
async fn test_expired_session_on_resume_returns_to_login() {
    let kv = stored_token(b"jwt-old").await;
    let backend = ScriptedBackend::new(vec![("GET", "/auth/me", 401, json!({ "msg": "Token has expired" }))]);

    let mut shell = Shell::new(AppConfig::default(), backend, kv);
    let view = shell.dispatch(Event::AppStarted).await;

    assert!(matches!(view.state, ViewState::Unauthenticated { .. }));
    assert!(!shell.kv().exists("session:token").await.unwrap());
}

#[tokio::test]
async fn test_backend_sees_expected_calls() {
    let backend = Arc::new(backend("user"));
    let mut shell = Shell::new(
        AppConfig::default(),
        SharedBackend(Arc::clone(&backend)),
        MemoryKvStore::new(),
    );
    shell.dispatch(Event::AppStarted).await;
    shell
        .dispatch(Event::LoginRequested {
            email: "user7@example.com".into(),
            password: secret("hunter22"),
        })
        .await;

    let mut seen = backend.seen();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            "GET /api/v1/incidents/mine",
            "GET /api/v1/users/points",
            "POST /api/v1/auth/login",
        ]
    );
}
