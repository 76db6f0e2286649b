use serde::{Deserialize, Serialize};

use genera_core::{CommunityId, GenerationId, SchoolId};

/// A school (the main organizational unit roles are scoped to).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct School {
    pub id: SchoolId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_generations: Option<bool>,
}

/// A generation inside a school ("Tractor" or "Innova").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    pub id: GenerationId,
    pub school_id: SchoolId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_range: Option<String>,
}

/// A growth community (2-16 teachers led by a `lider_comunidad`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowthCommunity {
    pub id: CommunityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<SchoolId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<GenerationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_teachers: Option<i32>,
}
