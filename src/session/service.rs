use std::sync::{Arc, Mutex};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::session::claim::{ClaimError, decode_claim};
use crate::session::events::{EventBus, RequestEvent};
use crate::session::store::{StoreError, TokenStore};
use crate::session::transport::{ApiRequest, ApiResponse, Method, Transport};
use crate::timezone::model::{AuthResponse, Credentials, ErrorBody, NewUser, Timezone, UserClaim};

pub const TOKEN_HEADER: &str = "JWT";

// encodeURIComponent leaves these untouched
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{method} {path} failed with status {}: {}", .response.status, describe_failure(.response))]
    Failed {
        method: Method,
        path: String,
        response: ApiResponse,
    },
    #[error("unexpected response body from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unable to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("timezone has no id yet; create it before updating")]
    Unsaved,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RequestError {
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Failed { response, .. } => Some(response.status),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Claim(#[from] ClaimError),
}

pub fn describe_failure(response: &ApiResponse) -> String {
    let body = ErrorBody::from_value(&response.body);
    match body.description {
        Some(description) => description,
        None if response.status == 0 => "no response from server".to_string(),
        None => "request failed".to_string(),
    }
}

/// Owns the token store, the request event bus and the log of failed
/// requests. Every server call goes through [`SessionService::request`].
pub struct SessionService {
    transport: Box<dyn Transport>,
    tokens: Arc<TokenStore>,
    events: EventBus,
    errors: Mutex<Vec<ApiResponse>>,
}

impl SessionService {
    pub fn new(transport: Box<dyn Transport>, tokens: Arc<TokenStore>) -> Self {
        Self {
            transport,
            tokens,
            events: EventBus::new(),
            errors: Mutex::new(Vec::new()),
        }
    }

    pub fn token_store(&self) -> Arc<TokenStore> {
        Arc::clone(&self.tokens)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn errors(&self) -> Vec<ApiResponse> {
        self.errors
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn clear_errors(&self) {
        if let Ok(mut guard) = self.errors.lock() {
            guard.clear();
        }
    }

    pub fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: Vec<(String, String)>,
    ) -> Result<Value, RequestError> {
        let request = ApiRequest {
            method,
            path: path.to_string(),
            body,
            headers,
        };
        let response = self.transport.send(&request);
        if response.is_success() {
            let body = response.body.clone();
            self.events.emit(&RequestEvent::Succeeded(response));
            return Ok(body);
        }

        warn!(
            %method,
            path,
            status = response.status,
            reason = %describe_failure(&response),
            "request failed"
        );
        if let Ok(mut guard) = self.errors.lock() {
            guard.push(response.clone());
        }
        self.events.emit(&RequestEvent::Failed(response.clone()));
        Err(RequestError::Failed {
            method,
            path: path.to_string(),
            response,
        })
    }

    /// Attaches the current token, if any. A logged-out caller still reaches
    /// the server and gets the server's answer.
    pub fn authenticated_request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, RequestError> {
        let headers = match self.tokens.token()? {
            Some(token) => vec![(TOKEN_HEADER.to_string(), token)],
            None => {
                debug!(%method, path, "no token for authenticated request");
                Vec::new()
            }
        };
        self.request(method, path, body, headers)
    }

    pub fn login(&self, login: &str, password: &str, remember: bool) -> Result<(), RequestError> {
        if self.is_logged_in() {
            self.logout()?;
        }
        let body = encode(&Credentials { login, password })?;
        let value = self.request(Method::Post, "/auth", Some(body), Vec::new())?;
        let auth: AuthResponse = decode("/auth", value)?;
        self.tokens.save(&auth.token, remember)?;
        info!(login, remember, "logged in");
        Ok(())
    }

    pub fn logout(&self) -> Result<(), StoreError> {
        self.tokens.clear()?;
        info!("logged out");
        Ok(())
    }

    pub fn is_logged_in(&self) -> bool {
        match self.tokens.token() {
            Ok(token) => token.is_some(),
            Err(err) => {
                warn!(error = %err, "token store unreadable, treating as logged out");
                false
            }
        }
    }

    pub fn get_user(&self) -> Result<Option<UserClaim>, SessionError> {
        let Some(token) = self.tokens.token()? else {
            return Ok(None);
        };
        Ok(Some(decode_claim(&token)?.user))
    }

    pub fn register_user(&self, user: &NewUser) -> Result<Value, RequestError> {
        self.authenticated_request(Method::Post, "/users", Some(encode(user)?))
    }

    pub fn list(&self, query: Option<&str>) -> Result<Vec<Timezone>, RequestError> {
        let path = list_path(query);
        let value = self.authenticated_request(Method::Get, &path, None)?;
        decode(&path, value)
    }

    pub fn get(&self, id: i64) -> Result<Timezone, RequestError> {
        let path = timezone_path(id);
        let value = self.authenticated_request(Method::Get, &path, None)?;
        decode(&path, value)
    }

    pub fn create(&self, timezone: &Timezone) -> Result<Timezone, RequestError> {
        let value =
            self.authenticated_request(Method::Post, "/timezones", Some(encode(timezone)?))?;
        decode("/timezones", value)
    }

    pub fn update(&self, timezone: &Timezone) -> Result<Timezone, RequestError> {
        let id = timezone.id.ok_or(RequestError::Unsaved)?;
        let path = timezone_path(id);
        let value = self.authenticated_request(Method::Put, &path, Some(encode(timezone)?))?;
        decode(&path, value)
    }

    pub fn remove(&self, id: i64) -> Result<(), RequestError> {
        self.authenticated_request(Method::Delete, &timezone_path(id), None)?;
        Ok(())
    }
}

pub(crate) fn encode_query_component(text: &str) -> String {
    utf8_percent_encode(text, QUERY_COMPONENT).to_string()
}

fn list_path(query: Option<&str>) -> String {
    match query {
        Some(text) if !text.is_empty() => format!("/timezones?q={}", encode_query_component(text)),
        _ => "/timezones".to_string(),
    }
}

fn timezone_path(id: i64) -> String {
    format!("/timezones/{id}")
}

fn encode<T: Serialize>(value: &T) -> Result<Value, RequestError> {
    serde_json::to_value(value).map_err(RequestError::Encode)
}

fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, RequestError> {
    serde_json::from_value(value).map_err(|source| RequestError::Decode {
        path: path.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::router::{Navigator, Route};
    use crate::session::claim::encode_test_token;
    use crate::session::events::install_session_guard;
    use crate::session::testing::ScriptedTransport;

    fn service_with(transport: &ScriptedTransport) -> SessionService {
        SessionService::new(Box::new(transport.clone()), Arc::new(TokenStore::in_memory()))
    }

    fn alice_token() -> String {
        encode_test_token(&json!({"user": {"id": 1, "login": "alice", "name": "Alice"}}))
    }

    #[test]
    fn fresh_session_is_logged_out() {
        let transport = ScriptedTransport::new();
        let session = service_with(&transport);
        assert!(!session.is_logged_in());
        assert_eq!(session.get_user().expect("no token is not an error"), None);
    }

    #[test]
    fn login_stores_token_and_logout_clears_it() {
        let transport = ScriptedTransport::new();
        transport.push(200, json!({"token": alice_token()}));
        let session = service_with(&transport);

        session.login("alice", "secret", false).expect("login");
        assert!(session.is_logged_in());
        let user = session.get_user().expect("decode").expect("user");
        assert_eq!(user.login, "alice");

        let sent = transport.requests();
        assert_eq!(sent[0].method, Method::Post);
        assert_eq!(sent[0].path, "/auth");
        assert_eq!(sent[0].body, Some(json!({"login": "alice", "password": "secret"})));
        assert_eq!(sent[0].header(TOKEN_HEADER), None);

        session.logout().expect("logout");
        assert!(!session.is_logged_in());
        session.logout().expect("logout is idempotent");
    }

    #[test]
    fn failed_login_leaves_session_logged_out() {
        let transport = ScriptedTransport::new();
        transport.push(200, json!({"token": alice_token()}));
        transport.push(403, json!({"description": "bad credentials", "code": 403}));
        let session = service_with(&transport);

        session.login("alice", "secret", true).expect("first login");
        let err = session.login("alice", "wrong", true).expect_err("second login");
        assert_eq!(err.status(), Some(403));
        assert!(err.to_string().contains("bad credentials"));
        assert!(!session.is_logged_in());
    }

    #[test]
    fn malformed_token_is_a_claim_error() {
        let transport = ScriptedTransport::new();
        transport.push(200, json!({"token": "not-a-jwt"}));
        let session = service_with(&transport);
        session.login("alice", "secret", false).expect("login");
        assert!(matches!(session.get_user(), Err(SessionError::Claim(_))));
    }

    #[test]
    fn authenticated_requests_carry_the_token_header() {
        let transport = ScriptedTransport::new();
        let token = alice_token();
        transport.push(200, json!({"token": token}));
        transport.push(200, json!([]));
        let session = service_with(&transport);

        session.login("alice", "secret", false).expect("login");
        session.list(None).expect("list");
        assert_eq!(transport.requests()[1].header(TOKEN_HEADER), Some(token.as_str()));
    }

    #[test]
    fn logged_out_authenticated_request_omits_header() {
        let transport = ScriptedTransport::new();
        transport.push(200, json!([]));
        let session = service_with(&transport);
        session.list(Some("")).expect("list");
        let sent = transport.requests();
        assert_eq!(sent[0].path, "/timezones");
        assert!(sent[0].headers.is_empty());
    }

    #[test]
    fn crud_helpers_use_fixed_paths() {
        let transport = ScriptedTransport::new();
        let record = json!({"id": 5, "city": "Kathmandu", "gmt_delta_seconds": 20_700});
        transport.push(200, json!([record.clone()]));
        transport.push(200, record.clone());
        transport.push(200, record.clone());
        transport.push(200, record.clone());
        transport.push(204, Value::Null);
        transport.push(200, json!({"login": "bob"}));
        let session = service_with(&transport);

        let listed = session.list(Some("new york/ü&x")).expect("list");
        assert_eq!(listed[0].city, "Kathmandu");
        let fetched = session.get(5).expect("get");
        session.create(&Timezone::new("Kathmandu", 20_700)).expect("create");
        session.update(&fetched).expect("update");
        session.remove(5).expect("remove");
        session.register_user(&NewUser::default()).expect("register");

        let sent = transport
            .requests()
            .into_iter()
            .map(|request| (request.method, request.path))
            .collect::<Vec<_>>();
        assert_eq!(
            sent,
            vec![
                (Method::Get, "/timezones?q=new%20york%2F%C3%BC%26x".to_string()),
                (Method::Get, "/timezones/5".to_string()),
                (Method::Post, "/timezones".to_string()),
                (Method::Put, "/timezones/5".to_string()),
                (Method::Delete, "/timezones/5".to_string()),
                (Method::Post, "/users".to_string()),
            ]
        );
        assert_eq!(
            transport.requests()[2].body,
            Some(json!({"city": "Kathmandu", "gmt_delta_seconds": 20_700}))
        );
    }

    #[test]
    fn update_without_id_never_reaches_the_server() {
        let transport = ScriptedTransport::new();
        let session = service_with(&transport);
        let err = session
            .update(&Timezone::new("Nowhere", 0))
            .expect_err("unsaved");
        assert!(matches!(err, RequestError::Unsaved));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn unexpected_body_is_a_decode_error() {
        let transport = ScriptedTransport::new();
        transport.push(200, json!({"not": "a list"}));
        let session = service_with(&transport);
        let err = session.list(None).expect_err("decode");
        assert!(matches!(err, RequestError::Decode { .. }));
    }

    #[test]
    fn failures_are_logged_and_broadcast() {
        let transport = ScriptedTransport::new();
        transport.push(500, json!({"description": "boom", "code": 500}));
        transport.push(200, json!([]));
        let session = service_with(&transport);

        let failures = Arc::new(AtomicUsize::new(0));
        let successes = Arc::new(AtomicUsize::new(0));
        let failure_counter = Arc::clone(&failures);
        let success_counter = Arc::clone(&successes);
        session.events().subscribe(move |event| match event {
            RequestEvent::Failed(_) => {
                failure_counter.fetch_add(1, Ordering::SeqCst);
            }
            RequestEvent::Succeeded(_) => {
                success_counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        assert!(session.get(1).is_err());
        session.list(None).expect("list");
        assert_eq!(failures.load(Ordering::SeqCst), 1);
        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(session.errors().len(), 1);
        assert_eq!(describe_failure(&session.errors()[0]), "boom");

        session.clear_errors();
        assert!(session.errors().is_empty());
    }

    #[test]
    fn unauthorized_response_forces_logout_and_login_route() {
        let transport = ScriptedTransport::new();
        transport.push(200, json!({"token": alice_token()}));
        transport.push(401, json!({"description": "expired", "code": 401}));
        let session = service_with(&transport);
        let navigator = Navigator::new(Route::TimezoneList { query: None });
        install_session_guard(&session, navigator.clone());

        session.login("alice", "secret", true).expect("login");
        assert!(session.is_logged_in());

        let err = session.list(None).expect_err("401");
        assert_eq!(err.status(), Some(401));
        assert!(!session.is_logged_in());
        assert_eq!(navigator.current(), Route::Login);
    }

    #[test]
    fn network_failure_is_reported_once() {
        let transport = ScriptedTransport::new();
        transport.push_response(ApiResponse::network_failure("connection refused"));
        let session = service_with(&transport);
        let err = session.list(None).expect_err("offline");
        assert_eq!(err.status(), Some(0));
        assert_eq!(session.errors().len(), 1);
    }
}
