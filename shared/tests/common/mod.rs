#![allow(dead_code)]

use crux_core::testing::{AppTester, Update};
use crux_http::protocol::HttpRequest;
use crux_kv::KeyValueOperation;
use secrecy::SecretString;
use serde_json::{json, Value};

use shared::capabilities::{HttpError, HttpResponse, HttpResult};
use shared::model::{AppState, User};
use shared::{App, AppConfig, Effect, Event, Model};

pub type Tester = AppTester<App, Effect>;

/// Lookups over the effects one `update` produced.
pub trait Effects {
    fn has_render(&self) -> bool;
    fn http(&self) -> Vec<&HttpRequest>;
    fn kv(&self) -> Vec<&KeyValueOperation>;
    fn kv_keys(&self) -> Vec<String>;

    /// First request whose URL path, query excluded, ends with `path`.
    fn find_http(&self, path: &str) -> Option<&HttpRequest> {
        self.http().into_iter().find(|r| path_of(r).ends_with(path))
    }
}

impl Effects for Update<Effect, Event> {
    fn has_render(&self) -> bool {
        self.effects.iter().any(|e| matches!(e, Effect::Render(_)))
    }

    fn http(&self) -> Vec<&HttpRequest> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::Http(request) => Some(&request.operation),
                _ => None,
            })
            .collect()
    }

    fn kv(&self) -> Vec<&KeyValueOperation> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::KeyValue(request) => Some(&request.operation),
                _ => None,
            })
            .collect()
    }

    fn kv_keys(&self) -> Vec<String> {
        self.kv()
            .into_iter()
            .map(|op| match op {
                KeyValueOperation::Get { key }
                | KeyValueOperation::Set { key, .. }
                | KeyValueOperation::Delete { key }
                | KeyValueOperation::Exists { key } => key.clone(),
                KeyValueOperation::ListKeys { prefix, .. } => prefix.clone(),
            })
            .collect()
    }
}

pub fn path_of(request: &HttpRequest) -> String {
    url::Url::parse(&request.url)
        .map(|u| u.path().to_string())
        .unwrap_or_default()
}

pub fn header<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
    request
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

pub fn json_body(request: &HttpRequest) -> Value {
    serde_json::from_slice(&request.body).unwrap()
}

pub fn respond(status: u16, body: Value) -> Box<HttpResult> {
    Box::new(Ok(HttpResponse::json_response(status, &body)))
}

pub fn offline() -> Box<HttpResult> {
    Box::new(Err(HttpError::ConnectionError {
        host: "127.0.0.1".into(),
        message: "connection refused".into(),
    }))
}

pub fn user_json(id: u32, role: &str) -> Value {
    json!({
        "id": id,
        "name": format!("User {id}"),
        "email": format!("user{id}@example.com"),
        "role": role,
        "points": 40,
    })
}

pub fn incident_json(id: u32, created_by: u32, status: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Incident {id}"),
        "description": "Lorry overturned on Mombasa Road",
        "location": "Mombasa Road",
        "category": "Traffic Accident",
        "severity": "high",
        "status": status,
        "created_by": created_by,
        "created_at": "2024-03-01T10:00:00Z",
    })
}

/// A model already past login, seeded so marker jitter is repeatable.
pub fn signed_in(role: &str) -> Model {
    let mut model = Model::new(AppConfig::default()).with_rng_seed(7);
    let user: User = serde_json::from_value(user_json(7, role)).unwrap();
    model.state = AppState::Ready;
    model.token = Some(SecretString::new("token-abc".into()));
    model.user = Some(user);
    model
}

pub fn secret(value: &str) -> SecretString {
    SecretString::new(value.to_string())
}
