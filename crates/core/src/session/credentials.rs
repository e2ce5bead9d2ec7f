//! Credential snapshot taken once per acquisition run.

use std::fmt;

use log::{debug, warn};
use serde_json::Value;

use super::SessionStore;
use crate::constants::SESSION_RECORD_KEY;

/// Access token and login id read from the session store.
///
/// A snapshot: the orchestrator reads it once at the start of a run and
/// passes the same value to every call, even if the store changes meanwhile.
/// Either field may be absent; the remote service then rejects the request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionCredentials {
    pub access_token: Option<String>,
    pub login_id: Option<String>,
}

impl SessionCredentials {
    pub fn new(access_token: impl Into<String>, login_id: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            login_id: Some(login_id.into()),
        }
    }

    /// Read the composite session record from `store`.
    ///
    /// Never fails: a missing key, an unreadable store or a malformed record
    /// all produce credentials with absent fields.
    pub fn read(store: &dyn SessionStore) -> Self {
        let raw = match store.get(SESSION_RECORD_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("[Session] No '{}' record in store", SESSION_RECORD_KEY);
                return Self::default();
            }
            Err(e) => {
                warn!("[Session] Failed to read session store: {}", e);
                return Self::default();
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(record) => Self {
                access_token: string_field(&record, "access_token"),
                login_id: string_field(&record, "login_id"),
            },
            Err(e) => {
                warn!("[Session] Session record is not valid JSON: {}", e);
                Self::default()
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.access_token.is_some() && self.login_id.is_some()
    }
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("login_id", &self.login_id)
            .finish()
    }
}

fn string_field(record: &Value, name: &str) -> Option<String> {
    match record.get(name)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
