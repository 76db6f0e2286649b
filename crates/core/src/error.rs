//! Domain error model.

use thiserror::Error;

/// Deterministic failures of the domain model.
///
/// Storage and transport failures live in the crates that own them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("unknown role type: {0}")]
    UnknownRole(String),

    /// A role assignment lacks an organizational unit its role needs.
    #[error("Role \"{role}\" requires a {unit} assignment")]
    MissingScope { role: &'static str, unit: &'static str },
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_scope_names_role_and_unit() {
        let err = DomainError::MissingScope {
            role: "Docente",
            unit: "school",
        };
        assert_eq!(err.to_string(), "Role \"Docente\" requires a school assignment");
        assert_eq!(
            DomainError::UnknownRole("rector".into()).to_string(),
            "unknown role type: rector"
        );
    }
}
