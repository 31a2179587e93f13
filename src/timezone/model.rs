use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timezone {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub city: String,
    pub gmt_delta_seconds: i64,
}

impl Timezone {
    pub fn new(city: impl Into<String>, gmt_delta_seconds: i64) -> Self {
        Self {
            id: None,
            city: city.into(),
            gmt_delta_seconds,
        }
    }
}

/// Registration payload for `POST /users`. Never stored locally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewUser {
    pub name: String,
    pub login: String,
    pub email: String,
    pub password: String,
    pub check_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials<'a> {
    pub login: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}

/// The `user` object the backend signs into every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaim {
    #[serde(default)]
    pub id: Option<i64>,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl UserClaim {
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.login,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaim {
    pub user: UserClaim,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Error payload as sent by the backend: `{"description": ..., "code": ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
}

impl ErrorBody {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(_) => serde_json::from_value(value.clone()).unwrap_or_default(),
            Value::String(text) if !text.is_empty() => Self {
                description: Some(text.clone()),
                code: None,
            },
            _ => Self::default(),
        }
    }
}
