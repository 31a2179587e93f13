use std::fmt;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::debug;

use crate::session::service::TOKEN_HEADER;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Whole-request limit; matches reqwest's blocking default.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    /// Stand-in response for requests that never got an HTTP status back.
    pub fn network_failure(message: impl fmt::Display) -> Self {
        Self {
            status: 0,
            body: json!({ "description": message.to_string(), "code": 0 }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait Transport: Send + Sync {
    fn send(&self, request: &ApiRequest) -> ApiResponse;
}

pub struct HttpTransport {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> reqwest::Result<Self> {
        Self::with_timeouts(base_url, CONNECT_TIMEOUT, REQUEST_TIMEOUT)
    }

    pub fn with_timeouts(
        base_url: &str,
        connect: Duration,
        request: Duration,
    ) -> reqwest::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect)
            .timeout(request)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn execute(&self, request: &ApiRequest) -> reqwest::Result<ApiResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self
            .client
            .request(method, &url)
            .header(reqwest::header::ACCEPT, "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let text = response.text()?;
        Ok(ApiResponse {
            status,
            body: decode_body(&text),
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> ApiResponse {
        debug!(
            method = %request.method,
            path = %request.path,
            authenticated = request.header(TOKEN_HEADER).is_some(),
            "sending request"
        );
        match self.execute(request) {
            Ok(response) => {
                debug!(status = response.status, path = %request.path, "response received");
                response
            }
            Err(err) => ApiResponse::network_failure(err),
        }
    }
}

fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
