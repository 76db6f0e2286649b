use serde::{Deserialize, Serialize};

use genera_core::{CommunityId, GenerationId, SchoolId, UserId};

use crate::organization::{Generation, GrowthCommunity, School};
use crate::roles::LegacyRole;

/// Extended per-user record (`profiles` row with its organizational joins).
///
/// Created at signup by the backend; this crate only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Deprecated single-role column, kept for backward compatibility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<SchoolId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<GenerationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community_id: Option<CommunityId>,
    /// Informational school affiliation for consultants outside the platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_school_affiliation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school: Option<School>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<Generation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community: Option<GrowthCommunity>,
}

impl Profile {
    /// An otherwise empty profile for `id`.
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            email: None,
            first_name: None,
            last_name: None,
            avatar_url: None,
            role: None,
            school_id: None,
            generation_id: None,
            community_id: None,
            external_school_affiliation: None,
            school: None,
            generation: None,
            community: None,
        }
    }

    /// Parsed legacy role column, if it holds a value that still means something.
    pub fn legacy_role(&self) -> Option<LegacyRole> {
        self.role.as_deref().and_then(LegacyRole::from_column)
    }

    pub fn is_legacy_admin(&self) -> bool {
        self.legacy_role() == Some(LegacyRole::Admin)
    }

    /// "First Last", falling back to the email's local part.
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if !parts.is_empty() {
            return Some(parts.join(" "));
        }

        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}
