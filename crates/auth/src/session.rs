use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use genera_core::UserId;

/// Minimal identity carried by the auth provider's session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl SessionUser {
    pub fn new(id: UserId, email: Option<String>) -> Self {
        Self {
            id,
            email,
            user_metadata: serde_json::Value::Null,
        }
    }

    /// Part of the email before `@`, used as a display fallback.
    pub fn email_local_part(&self) -> Option<&str> {
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|s| !s.is_empty())
    }
}

/// Authentication session as reported by the session provider.
///
/// Owned and refreshed by the provider; the application only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub user: SessionUser,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session has expired")]
    Expired,

    #[error("session carries an empty access token")]
    MissingToken,
}

/// Check that a session can still be used to call the backend.
pub fn validate_session(session: &Session, now: DateTime<Utc>) -> Result<(), SessionError> {
    if session.access_token.trim().is_empty() {
        return Err(SessionError::MissingToken);
    }
    if now >= session.expires_at {
        return Err(SessionError::Expired);
    }
    Ok(())
}

/// Role strings found in provider metadata (`role` plus `roles[]`).
///
/// The singular `role` comes first; duplicates and non-string entries are
/// dropped.
pub fn metadata_roles(metadata: &serde_json::Value) -> Vec<String> {
    let mut roles: Vec<String> = Vec::new();

    if let Some(role) = metadata.get("role").and_then(|v| v.as_str()) {
        if !role.is_empty() {
            roles.push(role.to_string());
        }
    }

    if let Some(list) = metadata.get("roles").and_then(|v| v.as_array()) {
        for role in list.iter().filter_map(|v| v.as_str()) {
            if !roles.iter().any(|r| r == role) {
                roles.push(role.to_string());
            }
        }
    }

    roles
}

/// Highest-priority metadata role: `admin` when present, otherwise the first.
pub fn primary_metadata_role(metadata: &serde_json::Value) -> Option<String> {
    let roles = metadata_roles(metadata);
    if roles.iter().any(|r| r == "admin") {
        return Some("admin".to_string());
    }
    roles.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn session(expires_in: Duration) -> Session {
        Session {
            access_token: "token".to_string(),
            refresh_token: None,
            expires_at: Utc::now() + expires_in,
            user: SessionUser::new(UserId::new(), Some("ana@example.com".to_string())),
        }
    }

    #[test]
    fn live_session_is_valid() {
        assert_eq!(validate_session(&session(Duration::minutes(5)), Utc::now()), Ok(()));
    }

    #[test]
    fn expired_session_is_rejected() {
        let s = session(Duration::minutes(-1));
        assert_eq!(validate_session(&s, Utc::now()), Err(SessionError::Expired));
    }

    #[test]
    fn blank_token_is_rejected() {
        let mut s = session(Duration::minutes(5));
        s.access_token = "  ".to_string();
        assert_eq!(validate_session(&s, Utc::now()), Err(SessionError::MissingToken));
    }

    #[test]
    fn metadata_roles_put_singular_role_first() {
        let meta = json!({ "role": "docente", "roles": ["consultor", "docente", 3] });
        assert_eq!(metadata_roles(&meta), vec!["docente", "consultor"]);
        assert!(metadata_roles(&serde_json::Value::Null).is_empty());
    }

    #[test]
    fn primary_metadata_role_prefers_admin() {
        let meta = json!({ "role": "docente", "roles": ["admin"] });
        assert_eq!(primary_metadata_role(&meta).as_deref(), Some("admin"));
        let meta = json!({ "roles": ["consultor"] });
        assert_eq!(primary_metadata_role(&meta).as_deref(), Some("consultor"));
        assert_eq!(primary_metadata_role(&json!({})), None);
    }

    #[test]
    fn email_local_part_fallback() {
        let user = SessionUser::new(UserId::new(), Some("maria.p@colegio.cl".to_string()));
        assert_eq!(user.email_local_part(), Some("maria.p"));
        assert_eq!(SessionUser::new(UserId::new(), None).email_local_part(), None);
    }
}
