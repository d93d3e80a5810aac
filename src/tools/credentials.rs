//! Caller-supplied secrets that gate conditional tools.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Opaque secret string. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// `None` for empty or whitespace-only input.
    pub fn new(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Credential fields as they appear on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialFields {
    #[serde(
        default,
        alias = "google_acces_token",
        skip_serializing_if = "Option::is_none"
    )]
    pub google_access_token: Option<String>,
    #[serde(
        default,
        alias = "pyjiit_login_responce",
        skip_serializing_if = "Option::is_none"
    )]
    pub pyjiit_login_response: Option<Value>,
}

impl CredentialFields {
    /// Field-by-field merge where `self` wins over `base`.
    pub fn over(self, base: CredentialFields) -> CredentialFields {
        CredentialFields {
            google_access_token: self.google_access_token.or(base.google_access_token),
            pyjiit_login_response: self.pyjiit_login_response.or(base.pyjiit_login_response),
        }
    }
}

/// Normalized credentials for one invocation.
#[derive(Clone, Default)]
pub struct CredentialContext {
    google_access_token: Option<Secret>,
    portal_session: Option<Value>,
}

impl CredentialContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: CredentialFields) -> Self {
        let mut context = Self::new();
        if let Some(token) = fields.google_access_token.as_deref() {
            context = context.with_google_token(token);
        }
        if let Some(session) = fields.pyjiit_login_response {
            context = context.with_portal_session(session);
        }
        context
    }

    /// Combine top-level request fields with a nested `credentials` object.
    pub fn from_request(top_level: CredentialFields, nested: Option<CredentialFields>) -> Self {
        let fields = match nested {
            Some(nested) => nested.over(top_level),
            None => top_level,
        };
        Self::from_fields(fields)
    }

    pub fn with_google_token(mut self, token: &str) -> Self {
        self.google_access_token = Secret::new(token);
        self
    }

    /// Store a portal session payload. `null`, `{}` and blank strings count as absent;
    /// a string holding JSON is decoded.
    pub fn with_portal_session(mut self, session: Value) -> Self {
        let session = match session {
            Value::String(raw) => {
                let raw = raw.trim();
                if raw.is_empty() {
                    Value::Null
                } else {
                    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
                }
            }
            other => other,
        };
        self.portal_session = match &session {
            Value::Null => None,
            Value::Object(map) if map.is_empty() => None,
            _ => Some(session),
        };
        self
    }

    pub fn google_access_token(&self) -> Option<&Secret> {
        self.google_access_token.as_ref()
    }

    pub fn portal_session(&self) -> Option<&Value> {
        self.portal_session.as_ref()
    }
}

impl fmt::Debug for CredentialContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialContext")
            .field("google_access_token", &self.google_access_token.is_some())
            .field("portal_session", &self.portal_session.is_some())
            .finish()
    }
}
